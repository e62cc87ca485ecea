//! Batch generation from a prompt table
//!
//! The input is a tab-separated table with a header row naming at least the
//! `title` (prompt) and `content` (reference) columns. Each row produces one
//! output row, written in input order under a fixed header. The table is
//! validated before the output file is created, and any generation error
//! aborts the run.

use crate::{
    context::{GenerationContext, GenerationRequest},
    postprocess::{self, REFERENCE_WORD_LIMIT},
    CoreError, Result,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Header line of the results file
pub const OUTPUT_HEADER: &str = "prompt\tref_fact\tref\tgen\tstyle_label";

/// Column holding the prompt text
pub const TITLE_COLUMN: &str = "title";

/// Column holding the reference text
pub const CONTENT_COLUMN: &str = "content";

/// Value written to the `style_label` column of every row
pub const STYLE_LABEL: u8 = 1;

/// One input table entry
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRecord {
    pub title: String,
    pub content: String,
}

/// One results row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub prompt: String,
    pub ref_fact: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub gen: String,
    pub style_label: u8,
}

impl BatchRow {
    /// Format as one tab-separated line, without the trailing newline
    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            postprocess::sanitize_field(&self.prompt),
            postprocess::sanitize_field(&self.ref_fact),
            postprocess::sanitize_field(&self.reference),
            postprocess::sanitize_field(&self.gen),
            self.style_label
        )
    }
}

/// Receives one notification per completed row
pub trait BatchProgress {
    fn start(&self, _total: usize) {}

    fn advance(&self);

    fn finish(&self) {}
}

/// Progress sink that ignores every notification
pub struct NoProgress;

impl BatchProgress for NoProgress {
    fn advance(&self) {}
}

/// Read and validate the prompt table
pub fn read_prompt_table(path: &Path) -> Result<Vec<PromptRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io_with_path(e, path))?;
    parse_prompt_table(&content, path)
}

fn parse_prompt_table(content: &str, path: &Path) -> Result<Vec<PromptRecord>> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(CoreError::configuration_field(
            "BATCH_EMPTY_TABLE",
            "Prompt table is empty",
            "Reading prompt table",
            "Provide a tab-separated file with a `title` and `content` header",
            path,
            TITLE_COLUMN,
        ));
    };

    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let column_index = |name: &str| {
        columns.iter().position(|&c| c == name).ok_or_else(|| {
            CoreError::configuration_field(
                "BATCH_MISSING_COLUMN",
                format!("Prompt table has no `{}` column", name),
                format!("Reading table header (found: {})", columns.join(", ")),
                "The table must be tab-separated with `title` and `content` columns",
                path,
                name,
            )
        })
    };
    let title_idx = column_index(TITLE_COLUMN)?;
    let content_idx = column_index(CONTENT_COLUMN)?;

    lines
        .map(|(line_no, line)| {
            let fields: Vec<&str> = line.split('\t').collect();
            match (fields.get(title_idx), fields.get(content_idx)) {
                (Some(title), Some(content)) => Ok(PromptRecord {
                    title: title.to_string(),
                    content: content.to_string(),
                }),
                _ => Err(CoreError::configuration_field(
                    "BATCH_SHORT_ROW",
                    format!(
                        "Line {} has {} fields but the header has {}",
                        line_no + 1,
                        fields.len(),
                        columns.len()
                    ),
                    "Reading prompt table",
                    "Check that every row is tab-separated like the header",
                    path,
                    TITLE_COLUMN,
                )),
            }
        })
        .collect()
}

/// Runs every table row through a [`GenerationContext`]
pub struct BatchDriver<'a> {
    context: &'a mut GenerationContext,
}

impl<'a> BatchDriver<'a> {
    pub fn new(context: &'a mut GenerationContext) -> Self {
        Self { context }
    }

    /// Generate one output row per input row. Returns the number of rows written.
    pub fn run(&mut self, input_path: &Path, output_path: &Path, progress: &dyn BatchProgress) -> Result<usize> {
        let records = read_prompt_table(input_path)?;
        info!("Read {} prompts from {}", records.len(), input_path.display());

        let file = File::create(output_path).map_err(|e| CoreError::io_with_path(e, output_path))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", OUTPUT_HEADER).map_err(|e| CoreError::io_with_path(e, output_path))?;

        progress.start(records.len());
        for (index, record) in records.iter().enumerate() {
            let row = self.generate_row(record)?;
            writeln!(writer, "{}", row.to_tsv()).map_err(|e| CoreError::io_with_path(e, output_path))?;
            debug!("Row {} done", index + 1);
            progress.advance();
        }
        writer.flush().map_err(|e| CoreError::io_with_path(e, output_path))?;
        progress.finish();

        info!("Wrote {} rows to {}", records.len(), output_path.display());
        Ok(records.len())
    }

    /// Generate the results row for one record
    pub fn generate_row(&mut self, record: &PromptRecord) -> Result<BatchRow> {
        let output = self.context.generate(&GenerationRequest::batch(record.title.as_str()))?;
        debug!(
            "Row generated: {} new tokens, finish_reason={:?}, {:.1} tok/s",
            output.result.stats.generated_tokens, output.result.finish_reason, output.result.stats.tokens_per_second
        );
        let stop_token = self.context.config().stop_token();

        let text = self.context.strip_padding(&output.result.text);
        let gen = postprocess::clean(postprocess::extract_continuation(text, stop_token));

        let prompt_text = self.context.codec().decode(&output.encoded.prompt_tokens)?;

        Ok(BatchRow {
            prompt: postprocess::clean(&prompt_text),
            ref_fact: record.title.clone(),
            reference: postprocess::truncate_words(&record.content, REFERENCE_WORD_LIMIT),
            gen,
            style_label: STYLE_LABEL,
        })
    }
}
