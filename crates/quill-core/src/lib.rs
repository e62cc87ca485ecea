//! Quill Core - conditional text generation
//!
//! This crate provides the decoding layer of the Quill system: per-family
//! prompt preprocessing, length resolution, the sampling policy, and the batch
//! and interactive generation drivers built on top of them.

// Module declarations
pub mod batch;
pub mod config;
pub mod context;
pub mod family;
pub mod generation;
pub mod interactive;
pub mod length;
pub mod model;
pub mod postprocess;
pub mod preprocess;
pub mod sampling;
pub mod tokenizer;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Model loading or validation errors
    #[error("Model error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Model {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
    },

    /// Codec loading or operation errors
    #[error("Tokenizer error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Tokenizer {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
    },

    /// Failures inside the decode loop
    #[error("Generation error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Generation {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
    },

    /// A sampling or length parameter outside its valid range
    #[error("Invalid input [{code}]: {message} ({parameter} = {value}, expected {valid_range})\nContext: {context}\nSuggestion: {suggestion}")]
    InvalidInput {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        parameter: String,
        value: String,
        valid_range: String,
    },

    /// Configuration errors detected before any generation work starts
    #[error("Configuration error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Configuration {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
    },

    /// File system and I/O errors
    #[error("IO error [{code}]: {message}\nPath: {path:?}\nSuggestion: {suggestion}")]
    Io {
        code: &'static str,
        message: String,
        path: Option<PathBuf>,
        suggestion: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Append the offending file to an error context
fn with_path(context: impl Into<String>, path: &Path) -> String {
    format!("{} ({})", context.into(), path.display())
}

impl CoreError {
    /// Create a model error with context
    pub fn model<S1, S2, S3>(code: &'static str, message: S1, context: S2, suggestion: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Model {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a model error naming the model file involved
    pub fn model_with_path<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        path: &Path,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::model(code, message, with_path(context, path), suggestion)
    }

    /// Create a tokenizer error
    pub fn tokenizer<S1, S2, S3>(code: &'static str, message: S1, context: S2, suggestion: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Tokenizer {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a tokenizer error naming the vocabulary file involved
    pub fn tokenizer_with_path<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        path: &Path,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::tokenizer(code, message, with_path(context, path), suggestion)
    }

    /// Create a generation error
    pub fn generation<S1, S2, S3>(code: &'static str, message: S1, context: S2, suggestion: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Generation {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error with parameter validation details
    pub fn invalid_parameter<S1, S2, S3, S4, S5, S6>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        parameter: S4,
        value: S5,
        valid_range: S6,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
        S5: Into<String>,
        S6: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            parameter: parameter.into(),
            value: value.into(),
            valid_range: valid_range.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S1, S2, S3>(code: &'static str, message: S1, context: S2, suggestion: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Configuration {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a configuration error tied to a file and field
    pub fn configuration_field<S1, S2, S3, S4>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        path: &Path,
        field_name: S4,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        let context = format!("{}, field `{}`", with_path(context, path), field_name.into());
        Self::configuration(code, message, context, suggestion)
    }

    /// Attach a path to an I/O error
    pub fn io_with_path(err: std::io::Error, path: &Path) -> Self {
        match Self::from(err) {
            Self::Io {
                code,
                message,
                suggestion,
                source,
                ..
            } => Self::Io {
                code,
                message,
                path: Some(path.to_path_buf()),
                suggestion,
                source,
            },
            other => other,
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::Model { code, .. } => code,
            Self::Tokenizer { code, .. } => code,
            Self::Generation { code, .. } => code,
            Self::InvalidInput { code, .. } => code,
            Self::Configuration { code, .. } => code,
            Self::Io { code, .. } => code,
        }
    }

    /// Whether this error was raised before any generation work began
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::InvalidInput { .. })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        let (code, suggestion) = match err.kind() {
            std::io::ErrorKind::NotFound => (
                "IO_FILE_NOT_FOUND",
                "Check that the file path is correct and the file exists",
            ),
            std::io::ErrorKind::PermissionDenied => (
                "IO_PERMISSION_DENIED",
                "Check file permissions or run with appropriate privileges",
            ),
            std::io::ErrorKind::BrokenPipe => (
                "IO_BROKEN_PIPE",
                "The output stream was closed before generation finished",
            ),
            _ => ("IO_UNKNOWN", "Check the file system and try the operation again"),
        };

        Self::Io {
            code,
            message: err.to_string(),
            path: None,
            suggestion: suggestion.to_string(),
            source: err,
        }
    }
}


/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        batch::{BatchDriver, BatchProgress, BatchRow},
        config::{DeviceConfig, DeviceType, GenerationConfig},
        context::{GenerationContext, GenerationRequest},
        family::{ModelFamily, PreprocessorKind},
        generation::{FinishReason, GenerationResult, GenerationStats},
        interactive::{InteractiveDriver, InteractiveSummary},
        length::{resolve_length, MAX_LENGTH},
        model::{bigram::BigramModel, LanguageModel},
        preprocess::{PreparedPrompt, PromptPreprocessor},
        sampling::Sampler,
        tokenizer::{vocab::VocabCodec, Codec},
        Result, CoreError,
    };
}

// Re-export key types at the crate root
pub use config::GenerationConfig;
pub use context::GenerationContext;
pub use family::ModelFamily;
pub use length::resolve_length;

pub mod error {
    pub use super::{CoreError, Result};
}
