//! `parley joke`: the joke prompt, sent straight to a profile.

use std::sync::Arc;

use parley_agent::RequestOptions;
use parley_config::AppConfig;
use parley_tools::joke_prompt;

use super::{adapter_factory, print_stream};

pub async fn run(
    config: AppConfig,
    profile: &str,
    joke_type: &str,
    audience: &str,
    tone: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let factory = adapter_factory(Arc::new(config), false);
    let mut adapter = factory.build(profile, None)?;

    let (persona, request) = joke_prompt(joke_type, audience, tone);
    print_stream(adapter.make_request(&persona, &request, RequestOptions::streaming())).await?;
    Ok(())
}
