//! Search commands: ask a question, print the tool schema

use anyhow::{Context, Result};
use ledgerlens_core::filters::{filter_tool_schema, FILTER_TOOL_DESCRIPTION, FILTER_TOOL_NAME};
use ledgerlens_core::{Reply, SearchService};
use serde_json::json;

/// Run one search for `user` and print the JSON body
///
/// Returns the reply so callers can map non-200 statuses to an exit code.
pub async fn cmd_ask(service: &SearchService, user: &str, question: &str) -> Result<Reply> {
    let reply = service.handle(Some(user), question).await;
    let body =
        serde_json::to_string_pretty(&reply.body).context("Failed to render search response")?;
    println!("{}", body);
    Ok(reply)
}

/// The tool definition the model is forced to call
pub fn tool_definition() -> serde_json::Value {
    json!({
        "name": FILTER_TOOL_NAME,
        "description": FILTER_TOOL_DESCRIPTION,
        "input_schema": filter_tool_schema(),
    })
}

pub fn cmd_schema() -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(&tool_definition()).context("Failed to render schema")?;
    println!("{}", rendered);
    Ok(())
}
