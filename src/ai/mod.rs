//! Language-model plumbing: the completion client and the prompt templates
//!
//! Every model call in the crate goes through [`CompletionClient`], so the
//! campaign and reply paths can be driven by a stub in tests.

pub mod client;
pub mod prompts;

pub use client::{CompletionClient, CompletionRequest, OpenAiClient, Purpose};
pub use prompts::Persona;
