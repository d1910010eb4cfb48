//! Completion provider implementations for voxturn.
//!
//! All providers implement the `voxturn_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
