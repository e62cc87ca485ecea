//! Generate command: batch generation over a prompt table, or an interactive loop

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use quill_core::prelude::*;

use crate::commands::{parse_family, Command};
use crate::config::Config;
use crate::utils::{format_duration, print_output, print_success, RowProgress};

#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Model family (gpt2, distilgpt2, ctrl, openai-gpt, xlnet, transfo-xl, xlm)
    #[arg(long, value_parser = parse_family)]
    pub model_type: ModelFamily,

    /// Model directory, or a model name in the configured model directories
    #[arg(short, long)]
    pub model: Option<String>,

    /// Tab-separated prompt table with `title` and `content` columns
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Results file written in batch mode
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Total sequence length in tokens, prompt included (negative = model maximum)
    #[arg(long, allow_negative_numbers = true)]
    pub length: Option<i64>,

    /// Temperature for sampling
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Top-k sampling limit (0 = disabled)
    #[arg(long)]
    pub k: Option<usize>,

    /// Top-p (nucleus) sampling threshold
    #[arg(long)]
    pub p: Option<f32>,

    /// Repetition penalty (1.0 = none)
    #[arg(long)]
    pub repetition_penalty: Option<f32>,

    /// Text at which the output is cut
    #[arg(long)]
    pub stop_token: Option<String>,

    /// Padding passage for padding-dependent families
    #[arg(long)]
    pub padding_text: Option<String>,

    /// Language for language-tagged families
    #[arg(long)]
    pub xlm_language: Option<String>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Never use an accelerator
    #[arg(long)]
    pub no_cuda: bool,

    /// Read prompts interactively instead of from a prompt table
    #[arg(long)]
    pub no_file: bool,
}

/// Where prompts come from
#[derive(Debug)]
enum Mode {
    Batch { input: PathBuf, output: PathBuf },
    Interactive,
}

#[async_trait]
impl Command for GenerateCommand {
    async fn execute(&self, config: &Config, json_output: bool) -> Result<()> {
        debug!("Executing generate command: {:?}", self);

        // Everything below is rejected before a single file is opened.
        let family = self.model_type;
        let generation = self.generation_config(&config.generation);
        generation.validate()?;
        let mode = self.mode()?;

        let model_dir = config
            .resolve_model(self.model.as_deref())
            .context("Model path resolution failed")?;
        info!("Using {} model from {}", family, model_dir.display());

        let start_time = Instant::now();
        let mut context = GenerationContext::load(family, &model_dir, generation)
            .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;
        debug!("Model loaded in {}", format_duration(start_time.elapsed()));

        match mode {
            Mode::Batch { input, output } => self.run_batch(&mut context, &input, &output, json_output),
            Mode::Interactive => self.run_interactive(&mut context, json_output),
        }
    }
}

impl GenerateCommand {
    /// Overlay command-line flags on the configured defaults
    fn generation_config(&self, defaults: &GenerationConfig) -> GenerationConfig {
        let mut config = defaults.clone();
        if let Some(length) = self.length {
            config.length = length;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(k) = self.k {
            config.top_k = k;
        }
        if let Some(p) = self.p {
            config.top_p = p;
        }
        if let Some(penalty) = self.repetition_penalty {
            config.repetition_penalty = penalty;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.stop_token.is_some() {
            config.stop_token = self.stop_token.clone();
        }
        if self.padding_text.is_some() {
            config.padding_text = self.padding_text.clone();
        }
        if self.xlm_language.is_some() {
            config.language = self.xlm_language.clone();
        }
        if self.no_cuda {
            config.device = DeviceConfig::cpu();
        }
        config
    }

    fn mode(&self) -> Result<Mode> {
        if self.no_file {
            return Ok(Mode::Interactive);
        }
        match (&self.prompt_file, &self.output_file) {
            (Some(input), Some(output)) => Ok(Mode::Batch {
                input: input.clone(),
                output: output.clone(),
            }),
            _ => anyhow::bail!(
                "Batch mode needs both --prompt-file and --output-file\n\
                Suggestion: Pass both files, or use --no-file for interactive mode"
            ),
        }
    }

    fn run_batch(
        &self,
        context: &mut GenerationContext,
        input: &Path,
        output: &Path,
        json_output: bool,
    ) -> Result<()> {
        let start_time = Instant::now();
        let progress = RowProgress::new("generating", json_output);
        let rows = BatchDriver::new(context)
            .run(input, output, &progress)
            .with_context(|| format!("Batch generation from {} failed", input.display()))?;
        let elapsed = start_time.elapsed();

        if json_output {
            print_output(
                &json!({
                    "mode": "batch",
                    "rows": rows,
                    "output_file": output.to_string_lossy(),
                    "elapsed_ms": elapsed.as_millis() as u64,
                }),
                true,
            )?;
        } else {
            print_success(&format!(
                "Wrote {} rows to {} in {}",
                rows,
                output.display(),
                format_duration(elapsed)
            ));
        }
        Ok(())
    }

    fn run_interactive(&self, context: &mut GenerationContext, json_output: bool) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let summary = InteractiveDriver::new(context)
            .run(stdin.lock(), stdout.lock())
            .context("Interactive session failed")?;

        if json_output {
            print_output(
                &json!({
                    "mode": "interactive",
                    "prompts": summary.prompts_processed,
                    "generated_tokens": summary.generated_tokens,
                }),
                true,
            )?;
        } else {
            debug!(
                "Processed {} prompts, {} tokens generated",
                summary.prompts_processed, summary.generated_tokens
            );
        }
        Ok(())
    }
}
