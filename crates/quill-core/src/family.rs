//! Supported model families and their preprocessing kinds

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model families accepted by `--model-type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    Gpt2,
    DistilGpt2,
    Ctrl,
    OpenAiGpt,
    XlNet,
    TransfoXl,
    Xlm,
}

/// How prompts are prepared before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessorKind {
    /// Prompt used as-is
    Plain,
    /// Prompt expected to start with a reserved control code
    ControlCoded,
    /// Prompt prefixed with a long padding passage
    PaddingDependent,
    /// Language id passed alongside the prompt
    LanguageTagged,
}

impl ModelFamily {
    /// All supported families, in the order they are listed to users
    pub const ALL: [ModelFamily; 7] = [
        ModelFamily::Gpt2,
        ModelFamily::DistilGpt2,
        ModelFamily::Ctrl,
        ModelFamily::OpenAiGpt,
        ModelFamily::XlNet,
        ModelFamily::TransfoXl,
        ModelFamily::Xlm,
    ];

    /// Selector string for this family
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Gpt2 => "gpt2",
            ModelFamily::DistilGpt2 => "distilgpt2",
            ModelFamily::Ctrl => "ctrl",
            ModelFamily::OpenAiGpt => "openai-gpt",
            ModelFamily::XlNet => "xlnet",
            ModelFamily::TransfoXl => "transfo-xl",
            ModelFamily::Xlm => "xlm",
        }
    }

    /// Preprocessing applied to prompts for this family
    pub fn preprocessor_kind(&self) -> PreprocessorKind {
        match self {
            ModelFamily::Ctrl => PreprocessorKind::ControlCoded,
            ModelFamily::XlNet | ModelFamily::TransfoXl => PreprocessorKind::PaddingDependent,
            ModelFamily::Xlm => PreprocessorKind::LanguageTagged,
            ModelFamily::Gpt2 | ModelFamily::DistilGpt2 | ModelFamily::OpenAiGpt => {
                PreprocessorKind::Plain
            }
        }
    }

    /// Comma-separated list of selectors for help and error messages
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|family| family.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let selector = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|family| family.as_str() == selector)
            .ok_or_else(|| {
                CoreError::configuration(
                    "CONFIG_UNSUPPORTED_MODEL_FAMILY",
                    format!("The model family '{}' is not supported", s),
                    "Resolving the model family selector",
                    format!("Use one of: {}", Self::supported_list()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("GPT2".parse::<ModelFamily>().unwrap(), ModelFamily::Gpt2);
        assert_eq!("Transfo-XL".parse::<ModelFamily>().unwrap(), ModelFamily::TransfoXl);
        assert_eq!(" xlm ".parse::<ModelFamily>().unwrap(), ModelFamily::Xlm);
    }

    #[test]
    fn test_unknown_family() {
        let err = "bert".parse::<ModelFamily>().unwrap_err();
        assert_eq!(err.code(), "CONFIG_UNSUPPORTED_MODEL_FAMILY");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("openai-gpt"));
    }

    #[test]
    fn test_selectors_round_trip() {
        for family in ModelFamily::ALL {
            assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
        }
    }

    #[test]
    fn test_preprocessor_kinds() {
        assert_eq!(ModelFamily::Gpt2.preprocessor_kind(), PreprocessorKind::Plain);
        assert_eq!(ModelFamily::Ctrl.preprocessor_kind(), PreprocessorKind::ControlCoded);
        assert_eq!(ModelFamily::XlNet.preprocessor_kind(), PreprocessorKind::PaddingDependent);
        assert_eq!(ModelFamily::TransfoXl.preprocessor_kind(), PreprocessorKind::PaddingDependent);
        assert_eq!(ModelFamily::Xlm.preprocessor_kind(), PreprocessorKind::LanguageTagged);
    }
}
