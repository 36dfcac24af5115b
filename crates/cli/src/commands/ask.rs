//! `parley ask`: one-shot request.

use std::sync::Arc;

use parley_agent::RequestOptions;
use parley_config::AppConfig;

use super::{adapter_factory, print_stream};

pub struct AskArgs {
    pub request: String,
    pub profile: String,
    pub system: String,
    pub json: bool,
    pub stream: bool,
    pub tools: bool,
}

pub async fn run(config: AppConfig, args: AskArgs) -> Result<(), Box<dyn std::error::Error>> {
    let factory = adapter_factory(Arc::new(config), args.tools);
    let mut adapter = factory.build(&args.profile, None)?;

    let options = RequestOptions {
        json: args.json,
        stream: args.stream,
        tools: args.tools,
    };
    print_stream(adapter.make_request(&args.system, &args.request, options)).await?;
    Ok(())
}
