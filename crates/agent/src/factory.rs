//! Builds adapters from configured profiles and keeps them for reuse.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use parley_config::AppConfig;
use parley_core::context::ContextProvider;
use parley_core::error::{Error, Result};
use parley_core::prompt::PromptRunner;
use parley_core::tool::ToolRegistry;
use tracing::debug;

use crate::adapter::{ProviderAdapter, RequestOptions, collect_text};

fn build_adapter(
    config: &AppConfig,
    tools: &Arc<ToolRegistry>,
    context: Option<&Arc<dyn ContextProvider>>,
    profile: &str,
    tone: Option<&str>,
) -> Result<ProviderAdapter> {
    let profile_config = config.profile(profile).map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    let mut adapter = ProviderAdapter::from_profile(profile_config, tools.clone())?;
    if let Some(tone) = tone.filter(|t| !t.is_empty()) {
        adapter = adapter.with_persona(tone);
    }
    if let Some(context) = context {
        adapter = adapter.with_context(context.clone());
    }

    debug!(profile, identity = %adapter.identity(), "Adapter built");
    Ok(adapter)
}

pub struct AdapterFactory {
    config: Arc<AppConfig>,
    tools: Arc<ToolRegistry>,
    context: Option<Arc<dyn ContextProvider>>,
    cache: HashMap<String, ProviderAdapter>,
}

impl AdapterFactory {
    pub fn new(config: Arc<AppConfig>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config,
            tools,
            context: None,
            cache: HashMap::new(),
        }
    }

    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A fresh adapter for `profile` (`-` means the default profile).
    /// A non-empty `tone` replaces the profile's persona.
    pub fn build(&self, profile: &str, tone: Option<&str>) -> Result<ProviderAdapter> {
        build_adapter(&self.config, &self.tools, self.context.as_ref(), profile, tone)
    }

    /// The cached adapter under `key` (or the resolved profile name), built on first use.
    pub fn get(
        &mut self,
        profile: &str,
        tone: Option<&str>,
        key: Option<&str>,
    ) -> Result<&mut ProviderAdapter> {
        let key = key
            .unwrap_or_else(|| self.config.resolve_name(profile))
            .to_string();

        match self.cache.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let adapter = build_adapter(
                    &self.config,
                    &self.tools,
                    self.context.as_ref(),
                    profile,
                    tone,
                )?;
                Ok(entry.insert(adapter))
            }
        }
    }
}

/// Runs one-shot prompts against named profiles, without tools.
pub struct ProfilePromptRunner {
    config: Arc<AppConfig>,
}

impl ProfilePromptRunner {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PromptRunner for ProfilePromptRunner {
    async fn run_prompt(&self, profile: &str, persona: &str, request: &str) -> Result<String> {
        let tools = Arc::new(ToolRegistry::new());
        let mut adapter = build_adapter(&self.config, &tools, None, profile, None)?;
        collect_text(adapter.make_request(persona, request, RequestOptions::default())).await
    }
}
