//! Operator-driven generation loop

use crate::{
    context::{GenerationContext, GenerationRequest},
    postprocess, Result,
};
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Text written before each operator line
pub const PROMPT_STRING: &str = "Prompt Text>> ";

/// Lines that end the session by default
pub const DEFAULT_SENTINELS: &[&str] = &["exit", "quit"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractiveSummary {
    pub prompts_processed: usize,

    /// Tokens sampled across the session, prompts excluded
    pub generated_tokens: usize,
}

/// Reads prompts line by line and prints one continuation per prompt.
///
/// The session ends at end of input or on a sentinel line. An error from any
/// request ends the session and is returned to the caller.
pub struct InteractiveDriver<'a> {
    context: &'a mut GenerationContext,
    sentinels: Vec<String>,
}

impl<'a> InteractiveDriver<'a> {
    pub fn new(context: &'a mut GenerationContext) -> Self {
        Self {
            context,
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the lines that end the session
    pub fn with_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentinels = sentinels.into_iter().map(Into::into).collect();
        self
    }

    fn is_sentinel(&self, line: &str) -> bool {
        self.sentinels.iter().any(|s| s.eq_ignore_ascii_case(line))
    }

    pub fn run<R: BufRead, W: Write>(&mut self, mut reader: R, mut writer: W) -> Result<InteractiveSummary> {
        let mut summary = InteractiveSummary::default();
        let mut line = String::new();

        loop {
            write!(writer, "{}", PROMPT_STRING)?;
            writer.flush()?;

            line.clear();
            if reader.read_line(&mut line)? == 0 {
                writeln!(writer)?;
                break;
            }

            let prompt = line.trim();
            if prompt.is_empty() {
                continue;
            }
            if self.is_sentinel(prompt) {
                debug!("Sentinel line received");
                break;
            }

            let (text, generated) = self.respond_counted(prompt)?;
            writeln!(writer, "{}", text)?;
            summary.prompts_processed += 1;
            summary.generated_tokens += generated;
        }

        info!(
            "Interactive session ended after {} prompts ({} tokens generated)",
            summary.prompts_processed, summary.generated_tokens
        );
        Ok(summary)
    }

    /// Generate and post-process the continuation for one operator prompt
    pub fn respond(&mut self, prompt: &str) -> Result<String> {
        self.respond_counted(prompt).map(|(text, _)| text)
    }

    fn respond_counted(&mut self, prompt: &str) -> Result<(String, usize)> {
        let output = self.context.generate(&GenerationRequest::interactive(prompt))?;
        debug!(
            "Prompt answered: {} new tokens, finish_reason={:?}",
            output.result.stats.generated_tokens, output.result.finish_reason
        );

        // The padding passage may itself contain the stop token.
        let text = self.context.strip_padding(&output.result.text);
        let text = postprocess::truncate_at_stop(text, self.context.config().stop_token());
        Ok((postprocess::clean(text), output.result.stats.generated_tokens))
    }
}
