// Resume and cover letter generation.
// Implements: prompt assembly, recipient autofill, LLM generation.
// All LLM calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod recipient;
