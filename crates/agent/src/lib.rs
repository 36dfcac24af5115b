//! The parley conversation engine.
//!
//! A [`ProviderAdapter`] wraps one configured backend behind a uniform
//! facade. Requests run through the tool loop:
//!
//! 1. **Send** the conversation (with tool descriptors when enabled)
//! 2. **Reassemble** the answer, whole or from streamed fragments
//! 3. **If tool calls**: record them, dispatch each, append the results, go to 1
//! 4. **If text**: hand it to the caller
//!
//! A [`BattleOrchestrator`] runs several adapters against each other in
//! fixed turn order.

pub mod adapter;
pub mod battle;
pub mod factory;
mod orchestrator;
pub mod reassembler;

#[cfg(test)]
mod test_helpers;

pub use adapter::{AdapterSettings, MessageUpdate, ProviderAdapter, RequestOptions, collect_text};
pub use battle::{AgentSlot, BattleOrchestrator, BattleTurn};
pub use factory::{AdapterFactory, ProfilePromptRunner};
pub use reassembler::{AssembledTurn, StreamReassembler};
