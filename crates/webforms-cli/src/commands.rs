//! Command handlers for the WebForms CLI

use std::path::Path;

use serde::Serialize;
use tracing::info;
use webforms_core::page::{EVENT_ARGUMENT_FIELD, EVENT_TARGET_FIELD};
use webforms_core::viewstate::CompressionKind;
use webforms_core::{FormCollection, PageRequest, ViewStateManager};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::demo::{hidden_fields, todo_page};
use crate::error::{CliError, Result};

/// Header of a verified token, as printed by `inspect`
#[derive(Debug, Serialize)]
pub struct TokenReport {
    pub compression: CompressionKind,
    pub raw_length: u16,
    pub control_count: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command, returning what should be printed
    pub fn execute(cli: &Cli, config: &AppConfig) -> Result<String> {
        let manager = ViewStateManager::new(config.view_state.clone())?;

        match &cli.command {
            Commands::Render { items } => Self::handle_render_command(&manager, items.clone()),
            Commands::Postback {
                html,
                target,
                argument,
                fields,
                fields_json,
            } => {
                let mut form = hidden_fields(&std::fs::read_to_string(html)?);
                if let Some(path) = fields_json {
                    for (name, value) in read_json_fields(path)?.iter() {
                        form.insert(name, value);
                    }
                }
                for (name, value) in fields {
                    form.insert(name.as_str(), value.as_str());
                }
                if let Some(target) = target {
                    form.insert(EVENT_TARGET_FIELD, target.as_str());
                }
                if let Some(argument) = argument {
                    form.insert(EVENT_ARGUMENT_FIELD, argument.as_str());
                }
                Self::handle_postback_command(&manager, form)
            }
            Commands::Inspect { token, payload } => {
                Self::handle_inspect_command(&manager, token, *payload)
            }
        }
    }

    /// Render the demo page for a first visit
    fn handle_render_command(manager: &ViewStateManager, items: Vec<String>) -> Result<String> {
        info!(items = items.len(), "rendering demo page");
        let mut page = todo_page(items)?;
        page.process_request(&PageRequest::get(), manager)?;
        Ok(page.render(manager)?)
    }

    /// Replay a postback against a freshly built demo page
    fn handle_postback_command(manager: &ViewStateManager, form: FormCollection) -> Result<String> {
        info!(fields = form.len(), "posting back demo page");
        let mut page = todo_page(Vec::new())?;
        page.process_request(&PageRequest::post(form), manager)?;
        if !page.is_post_back() {
            info!("submitted state was rejected; rendered a fresh page");
        }
        Ok(page.render(manager)?)
    }

    /// Verify a token and describe its header
    fn handle_inspect_command(
        manager: &ViewStateManager,
        token: &str,
        with_payload: bool,
    ) -> Result<String> {
        let decoded = manager.deserialize(token.trim())?;
        let report = TokenReport {
            compression: decoded.compression(),
            raw_length: decoded.raw_length(),
            control_count: decoded.control_count(),
            payload: with_payload.then(|| hex::encode(decoded.payload())),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

/// Read a JSON object of string values
fn read_json_fields(path: &Path) -> Result<FormCollection> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|error| {
        CliError::FormInput(format!(
            "{} must hold a JSON object of strings: {}",
            path.display(),
            error
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(args: &[&str]) -> Result<String> {
        let cli = Cli::parse_from(args);
        CommandDispatcher::execute(&cli, &AppConfig::default())
    }

    #[test]
    fn test_render_then_inspect() {
        let html = run(&["webforms", "render", "--item", "milk"]).unwrap();
        let form = hidden_fields(&html);
        let token = form.get(webforms_core::page::FORM_STATE_FIELD).unwrap();

        let report = run(&["webforms", "inspect", token, "--payload"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert!(value["control_count"].as_u64().unwrap() > 0);
        assert!(value["payload"].is_string());
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        let result = run(&["webforms", "inspect", "not-a-token"]);
        assert!(matches!(result, Err(CliError::ViewState(_))));
    }
}
