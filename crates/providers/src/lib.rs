//! LLM provider implementations for Nippo.
//!
//! All providers implement the `nippo_core::Provider` trait.
//! The router selects the correct provider for a model identifier.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
