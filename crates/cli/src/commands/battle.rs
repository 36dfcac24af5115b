//! `parley battle`: profiles take turns answering each other.

use std::sync::Arc;

use parley_agent::{AgentSlot, BattleOrchestrator};
use parley_config::AppConfig;

use super::adapter_factory;
use super::render::TerminalRender;

pub async fn run(
    config: AppConfig,
    profiles: Vec<String>,
    rounds: usize,
    seed: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profiles = if profiles.is_empty() {
        config.battle.profiles.clone()
    } else {
        profiles
    };
    if profiles.is_empty() {
        return Err("no battle participants: pass --profiles or set [battle].profiles".into());
    }

    let factory = adapter_factory(Arc::new(config), false);
    let slots = profiles
        .iter()
        .map(|name| factory.build(name, None).map(AgentSlot::new))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(participants = slots.len(), rounds, "Starting battle");

    let mut battle = BattleOrchestrator::new(slots).with_render(Arc::new(TerminalRender));
    battle.run(rounds, seed.as_deref()).await?;
    Ok(())
}
