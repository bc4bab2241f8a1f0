//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./webforms.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Key for HMAC-protected state tokens
    #[arg(long)]
    pub hash_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the demo todo page for a first visit
    Render {
        /// Initial todo items
        #[arg(short, long = "item")]
        items: Vec<String>,
    },
    /// Post a previously rendered page back and print the result
    Postback {
        /// HTML of the previous response; its hidden fields are submitted
        #[arg(long)]
        html: PathBuf,
        /// `UniqueID` of the control raising the postback event
        #[arg(short, long)]
        target: Option<String>,
        /// Event argument passed to the target
        #[arg(short, long)]
        argument: Option<String>,
        /// Additional form values as `name=value`
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// JSON object with additional form values
        #[arg(long)]
        fields_json: Option<PathBuf>,
    },
    /// Verify a state token and print its header as JSON
    Inspect {
        /// Base64 token as found in `__PAGESTATE` or `__FORMSTATE`
        token: String,
        /// Include the decompressed payload as hex
        #[arg(long)]
        payload: bool,
    },
}

/// Parse `name=value`
fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))
}
