//! # parley core
//!
//! Domain types, traits, and error definitions for the parley conversation engine.
//! Nothing here talks to a network; the crates that do (providers, agent, cli)
//! depend inward on this one.
//!
//! ## Layout
//!
//! - [`message`] and [`conversation`]: the message history and its role-ordering invariant
//! - [`provider`]: the wire-level backend trait and its request/response/fragment types
//! - [`tool`]: host tools and the closed registry that dispatches them
//! - [`context`], [`render`], [`prompt`]: collaborators injected from the entry point

pub mod context;
pub mod conversation;
pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::ContextProvider;
pub use conversation::Conversation;
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Message, Role, ToolCall};
pub use prompt::PromptRunner;
pub use provider::{
    FinishReason, FragmentReceiver, Provider, ProviderRequest, ProviderResponse, StreamFragment,
    ToolCallFragment, Usage,
};
pub use render::Render;
pub use tool::{Tool, ToolDescriptor, ToolRegistry};
