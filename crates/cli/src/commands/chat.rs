//! `parley chat`: interactive multi-turn conversation.

use std::io::Write;
use std::sync::Arc;

use parley_agent::{MessageUpdate, RequestOptions, collect_text};
use parley_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{adapter_factory, print_stream};

pub async fn run(
    config: AppConfig,
    profile: &str,
    tools: bool,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = config.resolve_name(profile).to_string();
    let tone = config.profile(&name)?.base().tone.clone();
    let model_names = config.profile_names().join(", ");

    let factory = adapter_factory(Arc::new(config), tools);
    // tool schemas ask the model to fill `model`; tell it which one it is
    let persona = if tools {
        format!("{tone}\n\nmodel={name} (available: {model_names})")
    } else {
        tone
    };
    let mut adapter = factory.build(&name, Some(persona.as_str()))?;

    println!("Chatting with {} (empty line or 'exit' to quit)", adapter.identity());

    let options = RequestOptions {
        json: false,
        stream,
        tools,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() || line == "exit" {
            break;
        }

        adapter.update_messages(MessageUpdate::user(line));
        let answer = if stream {
            print_stream(adapter.make_assistant_request(options)).await?
        } else {
            let answer = collect_text(adapter.make_assistant_request(options)).await?;
            println!("{answer}");
            answer
        };
        adapter.update_messages(MessageUpdate::assistant(answer));
    }

    Ok(())
}
