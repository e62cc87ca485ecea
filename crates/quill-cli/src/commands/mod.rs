//! Command implementations for Quill CLI

pub mod generate;
pub mod info;

use anyhow::Result;
use async_trait::async_trait;
use quill_core::ModelFamily;

/// Trait for CLI command execution
#[async_trait]
pub trait Command {
    /// Execute the command
    async fn execute(&self, config: &crate::config::Config, json_output: bool) -> Result<()>;
}

/// Parse `--model-type` while clap reads the arguments, before any file is opened
pub fn parse_family(value: &str) -> std::result::Result<ModelFamily, String> {
    value.parse().map_err(|e: quill_core::CoreError| e.to_string())
}
