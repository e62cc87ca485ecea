//! Family-specific prompt preparation
//!
//! One [`PromptPreprocessor`] is chosen per run from the model family and
//! applied to every prompt before it is encoded.

use crate::config::GenerationConfig;
use crate::family::PreprocessorKind;
use crate::model::LanguageModel;
use crate::tokenizer::Codec;
use crate::{CoreError, Result};
use tracing::warn;

/// Temperatures above this degrade control-coded models
pub const CONTROL_CODED_MAX_TEMPERATURE: f32 = 0.7;

/// Passage prepended for models that produce degenerate text on short contexts
pub const DEFAULT_PADDING_TEXT: &str = " In 1991, the remains of Russian Tsar Nicholas II and his family
(except for Alexei and Maria) are discovered.
The voice of Nicholas's young son, Tsarevich Alexei Nikolaevich, narrates the
remainder of the story. 1883 Western Siberia,
a young Grigori Rasputin is asked by his father and a group of men to perform magic.
Rasputin has a vision and denounces one of the men as a horse thief. Although his
father initially slaps him for making such an accusation, Rasputin watches as the
man is chased outside and beaten. Twenty years later, Rasputin sees a vision of
the Virgin Mary, prompting him to become a priest. Rasputin quickly becomes famous,
with people, even a bishop, begging for his blessing. <eod> </s> <eos>";

/// A prompt ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPrompt {
    /// The caller's prompt text
    pub text: String,

    /// Passage to place in front of the prompt, never shown in output
    pub padding: Option<String>,

    /// Language id passed to the model with every forward pass
    pub language: Option<u32>,
}

impl PreparedPrompt {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            padding: None,
            language: None,
        }
    }

    /// Padding and prompt as one string
    pub fn full_text(&self) -> String {
        match &self.padding {
            Some(padding) => format!("{}{}", padding, self.text),
            None => self.text.clone(),
        }
    }
}

/// Prompt transformation applied before encoding
pub trait PromptPreprocessor: Send + Sync {
    fn kind(&self) -> PreprocessorKind;

    /// Prepare one prompt. May log advisory warnings; never blocks.
    fn prepare(&self, prompt: &str, codec: &dyn Codec) -> Result<PreparedPrompt>;

    /// Passage placed in front of every prompt, if any
    fn padding(&self) -> Option<&str> {
        None
    }
}

/// Identity transform
pub struct PlainPreprocessor;

impl PromptPreprocessor for PlainPreprocessor {
    fn kind(&self) -> PreprocessorKind {
        PreprocessorKind::Plain
    }

    fn prepare(&self, prompt: &str, _codec: &dyn Codec) -> Result<PreparedPrompt> {
        Ok(PreparedPrompt::plain(prompt))
    }
}

/// Checks sampling temperature and the leading control code
pub struct ControlCodedPreprocessor {
    temperature: f32,
}

impl ControlCodedPreprocessor {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    /// Whether the configured temperature triggers the advisory warning
    pub fn temperature_too_high(&self) -> bool {
        self.temperature > CONTROL_CODED_MAX_TEMPERATURE
    }

    /// Whether the prompt opens with a reserved control code
    pub fn starts_with_control_code(prompt: &str, codec: &dyn Codec) -> Result<bool> {
        let encoded = codec.encode(prompt)?;
        Ok(encoded.first().is_some_and(|&id| codec.is_control_code(id)))
    }
}

impl PromptPreprocessor for ControlCodedPreprocessor {
    fn kind(&self) -> PreprocessorKind {
        PreprocessorKind::ControlCoded
    }

    fn prepare(&self, prompt: &str, codec: &dyn Codec) -> Result<PreparedPrompt> {
        if self.temperature_too_high() {
            warn!(
                "Control-coded models work better with lower temperatures (got {}, suggest <= {})",
                self.temperature, CONTROL_CODED_MAX_TEMPERATURE
            );
        }

        if !Self::starts_with_control_code(prompt, codec)? {
            warn!("Prompt does not start with a control code; generation quality may suffer");
        }

        Ok(PreparedPrompt::plain(prompt))
    }
}

/// Prepends a padding passage to every prompt
pub struct PaddingPreprocessor {
    padding: String,
}

impl PaddingPreprocessor {
    /// Use `padding_override` when given, the default passage otherwise
    pub fn new(padding_override: Option<&str>) -> Self {
        Self {
            padding: padding_override.unwrap_or(DEFAULT_PADDING_TEXT).to_string(),
        }
    }
}

impl PromptPreprocessor for PaddingPreprocessor {
    fn kind(&self) -> PreprocessorKind {
        PreprocessorKind::PaddingDependent
    }

    fn padding(&self) -> Option<&str> {
        Some(&self.padding)
    }

    fn prepare(&self, prompt: &str, _codec: &dyn Codec) -> Result<PreparedPrompt> {
        Ok(PreparedPrompt {
            text: prompt.to_string(),
            padding: Some(self.padding.clone()),
            language: None,
        })
    }
}

/// Attaches a language id resolved once at startup
pub struct LanguageTaggedPreprocessor {
    language: Option<u32>,
}

impl LanguageTaggedPreprocessor {
    /// Resolve the language hint against the model's known languages.
    ///
    /// Models without language embeddings ignore the hint. Otherwise a missing
    /// or unknown hint is a configuration error.
    pub fn new(model: &dyn LanguageModel, hint: Option<&str>) -> Result<Self> {
        let Some(languages) = model.languages() else {
            if let Some(hint) = hint {
                warn!("Model has no language embeddings; ignoring language '{}'", hint);
            }
            return Ok(Self { language: None });
        };

        let mut known: Vec<&str> = languages.keys().map(|s| s.as_str()).collect();
        known.sort_unstable();

        match hint.and_then(|code| languages.get(code).map(|&id| (code, id))) {
            Some((code, id)) => {
                tracing::info!("Using language '{}' (id {})", code, id);
                Ok(Self { language: Some(id) })
            }
            None => Err(CoreError::configuration(
                "CONFIG_UNKNOWN_LANGUAGE",
                match hint {
                    Some(code) => format!("Language '{}' is not known to the model", code),
                    None => "The model requires a language but none was given".to_string(),
                },
                "Resolving language for a language-tagged model",
                format!("Select a language with --xlm-language, one of: {}", known.join(", ")),
            )),
        }
    }

    pub fn language(&self) -> Option<u32> {
        self.language
    }
}

impl PromptPreprocessor for LanguageTaggedPreprocessor {
    fn kind(&self) -> PreprocessorKind {
        PreprocessorKind::LanguageTagged
    }

    fn prepare(&self, prompt: &str, _codec: &dyn Codec) -> Result<PreparedPrompt> {
        Ok(PreparedPrompt {
            language: self.language,
            ..PreparedPrompt::plain(prompt)
        })
    }
}

/// Build the preprocessor for a family, once per run
pub fn build_preprocessor(
    kind: PreprocessorKind,
    config: &GenerationConfig,
    model: &dyn LanguageModel,
) -> Result<Box<dyn PromptPreprocessor>> {
    Ok(match kind {
        PreprocessorKind::Plain => Box::new(PlainPreprocessor),
        PreprocessorKind::ControlCoded => Box::new(ControlCodedPreprocessor::new(config.temperature)),
        PreprocessorKind::PaddingDependent => {
            Box::new(PaddingPreprocessor::new(config.padding_override()))
        }
        PreprocessorKind::LanguageTagged => Box::new(LanguageTaggedPreprocessor::new(
            model,
            config.language.as_deref().filter(|code| !code.is_empty()),
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct WordCodec {
        controls: HashMap<String, u32>,
    }

    impl Codec for WordCodec {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text
                .split_whitespace()
                .map(|w| if w == "Links" { 7 } else { 1 })
                .collect())
        }

        fn decode(&self, tokens: &[u32]) -> Result<String> {
            Ok(format!("{} tokens", tokens.len()))
        }

        fn vocab_size(&self) -> usize {
            8
        }

        fn eos_token_id(&self) -> Option<u32> {
            None
        }

        fn pad_token_id(&self) -> Option<u32> {
            None
        }

        fn control_codes(&self) -> &HashMap<String, u32> {
            &self.controls
        }
    }

    struct LangModel {
        languages: Option<HashMap<String, u32>>,
    }

    impl LanguageModel for LangModel {
        fn name(&self) -> &str {
            "lang"
        }

        fn vocab_size(&self) -> usize {
            8
        }

        fn max_position_embeddings(&self) -> Option<usize> {
            Some(16)
        }

        fn languages(&self) -> Option<&HashMap<String, u32>> {
            self.languages.as_ref()
        }

        fn forward(&self, _input_ids: &[u32], _language: Option<u32>) -> Result<Vec<f32>> {
            Ok(vec![0.0; 8])
        }
    }

    fn codec() -> WordCodec {
        WordCodec {
            controls: HashMap::from([("Links".to_string(), 7)]),
        }
    }

    fn bilingual() -> LangModel {
        LangModel {
            languages: Some(HashMap::from([("en".to_string(), 0), ("fr".to_string(), 1)])),
        }
    }

    #[test]
    fn test_plain_is_identity() {
        let prepared = PlainPreprocessor.prepare("Hello world", &codec()).unwrap();
        assert_eq!(prepared.full_text(), "Hello world");
        assert_eq!(prepared.language, None);
    }

    #[test]
    fn test_control_code_detection() {
        let codec = codec();
        assert!(ControlCodedPreprocessor::starts_with_control_code("Links Hello", &codec).unwrap());
        assert!(!ControlCodedPreprocessor::starts_with_control_code("Hello Links", &codec).unwrap());
        assert!(!ControlCodedPreprocessor::starts_with_control_code("", &codec).unwrap());
    }

    #[test]
    fn test_control_coded_never_blocks() {
        let preprocessor = ControlCodedPreprocessor::new(1.0);
        assert!(preprocessor.temperature_too_high());
        assert!(!ControlCodedPreprocessor::new(0.7).temperature_too_high());

        let prepared = preprocessor.prepare("Hello world", &codec()).unwrap();
        assert_eq!(prepared.text, "Hello world");
    }

    #[test]
    fn test_padding_default_and_override() {
        let prepared = PaddingPreprocessor::new(None).prepare("Hello world", &codec()).unwrap();
        assert_eq!(prepared.full_text(), format!("{}Hello world", DEFAULT_PADDING_TEXT));

        let prepared = PaddingPreprocessor::new(Some("Once upon a time. "))
            .prepare("Hello world", &codec())
            .unwrap();
        assert_eq!(prepared.full_text(), "Once upon a time. Hello world");
        assert_eq!(prepared.text, "Hello world");
    }

    #[test]
    fn test_language_resolution() {
        let preprocessor = LanguageTaggedPreprocessor::new(&bilingual(), Some("fr")).unwrap();
        assert_eq!(preprocessor.language(), Some(1));
        let prepared = preprocessor.prepare("Bonjour", &codec()).unwrap();
        assert_eq!(prepared.language, Some(1));
        assert_eq!(prepared.full_text(), "Bonjour");
    }

    #[test]
    fn test_unknown_language_is_configuration_error() {
        let err = LanguageTaggedPreprocessor::new(&bilingual(), Some("de")).err().unwrap();
        assert_eq!(err.code(), "CONFIG_UNKNOWN_LANGUAGE");
        assert!(err.to_string().contains("en, fr"));

        let err = LanguageTaggedPreprocessor::new(&bilingual(), None).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_model_without_language_embeddings_ignores_hint() {
        let model = LangModel { languages: None };
        let preprocessor = LanguageTaggedPreprocessor::new(&model, Some("de")).unwrap();
        assert_eq!(preprocessor.language(), None);
    }

    #[test]
    fn test_build_preprocessor_per_kind() {
        let config = GenerationConfig {
            language: Some("en".to_string()),
            ..Default::default()
        };
        for kind in [
            PreprocessorKind::Plain,
            PreprocessorKind::ControlCoded,
            PreprocessorKind::PaddingDependent,
            PreprocessorKind::LanguageTagged,
        ] {
            let preprocessor = build_preprocessor(kind, &config, &bilingual()).unwrap();
            assert_eq!(preprocessor.kind(), kind);
        }
    }
}
