//! Info command: describe a model directory as the generate command would load it

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use tracing::debug;

use quill_core::prelude::*;

use crate::commands::{parse_family, Command};
use crate::config::Config;
use crate::utils::print_output;

#[derive(Args, Debug)]
pub struct InfoCommand {
    /// Model family (gpt2, distilgpt2, ctrl, openai-gpt, xlnet, transfo-xl, xlm)
    #[arg(long, value_parser = parse_family)]
    pub model_type: ModelFamily,

    /// Model directory, or a model name in the configured model directories
    #[arg(short, long)]
    pub model: Option<String>,

    /// Requested length to resolve against the model capacity
    #[arg(long, allow_negative_numbers = true)]
    pub length: Option<i64>,

    /// Language for language-tagged families
    #[arg(long)]
    pub xlm_language: Option<String>,
}

#[async_trait]
impl Command for InfoCommand {
    async fn execute(&self, config: &Config, json_output: bool) -> Result<()> {
        debug!("Executing info command: {:?}", self);

        let family = self.model_type;
        let mut generation = config.generation.clone();
        if let Some(length) = self.length {
            generation.length = length;
        }
        if self.xlm_language.is_some() {
            generation.language = self.xlm_language.clone();
        }

        let model_dir = config.resolve_model(self.model.as_deref())?;
        let context = GenerationContext::load(family, &model_dir, generation)
            .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;

        print_output(&describe(&context, &model_dir.to_string_lossy()), json_output)
    }
}

/// Summary of a loaded generation context
fn describe(context: &GenerationContext, model_dir: &str) -> serde_json::Value {
    let model = context.model();
    let codec = context.codec();

    let mut languages: Vec<&str> = model
        .languages()
        .map(|langs| langs.keys().map(String::as_str).collect())
        .unwrap_or_default();
    languages.sort_unstable();

    let mut control_codes: Vec<&str> = codec.control_codes().keys().map(String::as_str).collect();
    control_codes.sort_unstable();

    json!({
        "model_dir": model_dir,
        "model_name": model.name(),
        "family": context.family().as_str(),
        "preprocessing": context.family().preprocessor_kind(),
        "capacity": model.max_position_embeddings(),
        "vocab_size": model.vocab_size(),
        "languages": languages,
        "control_codes": control_codes,
        "resolved_length": context.max_length(),
        "device": context.device(),
    })
}
