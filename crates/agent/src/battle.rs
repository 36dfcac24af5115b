//! Battle: fixed-round turn taking between independent model-backed agents.
//!
//! Participants act strictly in slot order every round. Before its turn a
//! participant receives every peer's latest response as a user turn, starting
//! with the slot after its own, so inputs arrive in the order they were produced.

use std::sync::Arc;

use parley_core::error::Result;
use parley_core::render::Render;
use tracing::info;
use uuid::Uuid;

use crate::adapter::{MessageUpdate, ProviderAdapter, RequestOptions, collect_text};

/// One participant.
pub struct AgentSlot {
    identity: String,
    adapter: ProviderAdapter,
    last_response: Option<String>,
}

impl AgentSlot {
    /// Identity is the adapter's `{family}-{model}` plus a short random suffix,
    /// so two slots on the same model stay distinguishable.
    pub fn new(adapter: ProviderAdapter) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            identity: format!("{}-{}", adapter.identity(), &suffix[..8]),
            adapter,
            last_response: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn adapter(&self) -> &ProviderAdapter {
        &self.adapter
    }

    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }
}

/// A completed turn, in the order turns were taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleTurn {
    pub round: usize,
    pub identity: String,
    pub response: String,
    /// The turn was the seed text, not a model call.
    pub seeded: bool,
}

pub struct BattleOrchestrator {
    slots: Vec<AgentSlot>,
    options: RequestOptions,
    render: Option<Arc<dyn Render>>,
}

impl BattleOrchestrator {
    pub fn new(slots: Vec<AgentSlot>) -> Self {
        Self {
            slots,
            options: RequestOptions::default(),
            render: None,
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_render(mut self, render: Arc<dyn Render>) -> Self {
        self.render = Some(render);
        self
    }

    pub fn slots(&self) -> &[AgentSlot] {
        &self.slots
    }

    /// Latest non-empty responses of every slot but `index`.
    ///
    /// Peers are taken in slot order rotated to start just after `index`, not
    /// in plain slot order. For slot B of `[A, B, C]` that is C then A, which
    /// is the order those responses were produced in.
    fn peer_inputs(&self, index: usize) -> Vec<String> {
        let n = self.slots.len();
        (1..n)
            .map(|offset| &self.slots[(index + offset) % n])
            .filter_map(|slot| slot.last_response.clone())
            .filter(|text| !text.is_empty())
            .collect()
    }

    fn publish(&self, turns: &mut Vec<BattleTurn>, turn: BattleTurn) {
        info!(round = turn.round, identity = %turn.identity, seeded = turn.seeded, "Battle turn");
        if let Some(render) = &self.render {
            render.render(&format!("{}:\n{}", turn.identity.to_uppercase(), turn.response));
        }
        turns.push(turn);
    }

    /// Play `rounds` rounds. A non-empty `seed` stands in for the first
    /// participant's first turn.
    pub async fn run(&mut self, rounds: usize, seed: Option<&str>) -> Result<Vec<BattleTurn>> {
        let seed = seed.filter(|s| !s.is_empty());
        let mut turns = Vec::with_capacity(rounds * self.slots.len());

        for round in 0..rounds {
            for index in 0..self.slots.len() {
                if round == 0 && index == 0 {
                    if let Some(seed) = seed {
                        let slot = &mut self.slots[0];
                        slot.adapter.update_messages(MessageUpdate::assistant(seed));
                        slot.last_response = Some(seed.to_string());
                        let turn = BattleTurn {
                            round,
                            identity: slot.identity.clone(),
                            response: seed.to_string(),
                            seeded: true,
                        };
                        self.publish(&mut turns, turn);
                        continue;
                    }
                }

                let peers = self.peer_inputs(index);
                let options = self.options;
                let slot = &mut self.slots[index];
                for input in peers {
                    slot.adapter.update_messages(MessageUpdate::user(input));
                }

                let response = collect_text(slot.adapter.make_assistant_request(options)).await?;
                slot.adapter
                    .update_messages(MessageUpdate::assistant(response.clone()));
                slot.last_response = Some(response.clone());

                let turn = BattleTurn {
                    round,
                    identity: slot.identity.clone(),
                    response,
                    seeded: false,
                };
                self.publish(&mut turns, turn);
            }
        }

        Ok(turns)
    }
}
