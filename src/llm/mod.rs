//! Language model side of a turn.

pub mod generator;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use generator::{Generator, ScriptedGenerator, TokenEvent, TokenStream, spawn_token_producer};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaGenerator};
