//! Command implementations for the parley CLI.

pub mod ask;
pub mod battle;
pub mod chat;
pub mod joke;
pub mod profiles;
pub mod render;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use parley_agent::{AdapterFactory, ProfilePromptRunner};
use parley_config::{AppConfig, ConfigError};
use parley_core::tool::ToolRegistry;
use parley_tools::default_registry;

/// `--config PATH` reads that file; otherwise `~/.parley/config.toml`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => AppConfig::load(),
    }
}

/// A factory whose adapters carry the host tools, or none at all.
pub fn adapter_factory(config: Arc<AppConfig>, with_tools: bool) -> AdapterFactory {
    let registry = if with_tools {
        let runner = Arc::new(ProfilePromptRunner::new(config.clone()));
        default_registry(Some(runner), &config.profile_names())
    } else {
        ToolRegistry::new()
    };
    AdapterFactory::new(config, Arc::new(registry))
}

/// Print chunks as they arrive and hand back the whole answer.
pub async fn print_stream(
    mut stream: BoxStream<'_, parley_core::Result<String>>,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    let mut answer = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        print!("{chunk}");
        stdout.flush()?;
        answer.push_str(&chunk);
    }
    if !answer.ends_with('\n') {
        println!();
    }
    Ok(answer)
}
