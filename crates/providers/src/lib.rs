//! Backend transports for parley.
//!
//! All providers implement the `parley_core::Provider` trait. The factory
//! maps a profile's backend family onto the matching transport.

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai_compat;
mod sse;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, default_base_url};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
