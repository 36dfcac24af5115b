//! Ticket price tool: fixed fare table for a handful of destinations.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, parse_arguments};
use serde::Deserialize;

const FARES: &[(&str, &str)] = &[
    ("london", "$799"),
    ("paris", "$899"),
    ("tokyo", "$1400"),
    ("berlin", "$499"),
];

pub struct TicketPriceTool;

#[derive(Deserialize)]
struct Args {
    destination_city: String,
}

/// Return fare for `city`, matched case-insensitively.
pub fn ticket_price(city: &str) -> &'static str {
    let city = city.trim().to_lowercase();
    FARES
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, price)| *price)
        .unwrap_or("Unknown")
}

#[async_trait]
impl Tool for TicketPriceTool {
    fn name(&self) -> &str {
        "get_ticket_price"
    }

    fn description(&self) -> &str {
        "Get the price of a return ticket to the destination city. Call this whenever you need to know \
         the ticket price, for example when a customer asks 'How much is a ticket to this city'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "destination_city": {
                    "type": "string",
                    "description": "The city that the customer wants to travel to"
                }
            },
            "required": ["destination_city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: Args = parse_arguments(arguments)?;
        Ok(ticket_price(&args.destination_city).to_string())
    }
}
