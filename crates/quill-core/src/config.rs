//! Configuration for generation runs

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sampling and decoding configuration shared by every request of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Requested generation length in tokens, prompt included (negative = model default)
    pub length: i64,

    /// Temperature for sampling (1.0 = no change)
    pub temperature: f32,

    /// Top-k sampling limit (0 = disabled)
    pub top_k: usize,

    /// Top-p (nucleus) sampling threshold (1.0 = disabled)
    pub top_p: f32,

    /// Repetition penalty (1.0 = no penalty)
    pub repetition_penalty: f32,

    /// Text at which generation stops and output is truncated
    pub stop_token: Option<String>,

    /// Replacement for the default padding passage
    pub padding_text: Option<String>,

    /// Language hint for language-tagged model families
    pub language: Option<String>,

    /// Seed for the sampler, applied once per run
    pub seed: u64,

    /// Device configuration
    pub device: DeviceConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            length: 20,
            temperature: 1.0,
            top_k: 0,
            top_p: 0.9,
            repetition_penalty: 1.0,
            stop_token: None,
            padding_text: None,
            language: None,
            seed: 42,
            device: DeviceConfig::default(),
        }
    }
}

/// Device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Preferred device type
    pub device_type: DeviceType,

    /// Whether to fall back to the CPU when the preferred device is unavailable
    pub cpu_fallback: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Cuda,
            cpu_fallback: true,
        }
    }
}

/// Device types a run can ask for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Cpu,
    Cuda,
}

impl DeviceConfig {
    /// CPU only, as selected by `--no-cuda`
    pub fn cpu() -> Self {
        Self {
            device_type: DeviceType::Cpu,
            cpu_fallback: true,
        }
    }

    /// Pick the device generation will actually run on.
    ///
    /// The bundled adapters only execute on the CPU, so an accelerator request
    /// falls back when allowed and is rejected otherwise.
    pub fn select(&self, accelerator_available: bool) -> Result<DeviceType> {
        match self.device_type {
            DeviceType::Cpu => Ok(DeviceType::Cpu),
            DeviceType::Cuda if accelerator_available => Ok(DeviceType::Cuda),
            DeviceType::Cuda if self.cpu_fallback => {
                tracing::debug!("No accelerator available, falling back to CPU");
                Ok(DeviceType::Cpu)
            }
            DeviceType::Cuda => Err(CoreError::configuration(
                "DEVICE_UNAVAILABLE",
                "Accelerator requested but none is available",
                "Selecting compute device",
                "Enable CPU fallback or run with --no-cuda",
            )),
        }
    }
}

impl GenerationConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io_with_path(e, path))?;
        toml::from_str(&content).map_err(|e| {
            CoreError::configuration_field(
                "CONFIG_PARSE_ERROR",
                format!("Failed to parse generation config: {}", e),
                "Loading generation configuration",
                "Check the TOML syntax and field names",
                path,
                "generation",
            )
        })
    }

    /// Validate sampling parameters
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 {
            return Err(CoreError::invalid_parameter(
                "CONFIG_INVALID_LENGTH",
                "Generation length cannot be zero",
                "Generation configuration validation",
                "Use a positive length, or a negative value for the model default",
                "length",
                self.length.to_string(),
                "non-zero integer",
            ));
        }

        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(CoreError::invalid_parameter(
                "CONFIG_INVALID_TEMPERATURE",
                "Temperature must be a positive number",
                "Generation configuration validation",
                "Use 1.0 for the unmodified distribution, lower values for sharper sampling",
                "temperature",
                self.temperature.to_string(),
                "> 0.0",
            ));
        }

        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(CoreError::invalid_parameter(
                "CONFIG_INVALID_TOP_P",
                "Top-p must lie in (0, 1]",
                "Generation configuration validation",
                "Use 1.0 to disable nucleus filtering",
                "top_p",
                self.top_p.to_string(),
                "(0.0, 1.0]",
            ));
        }

        if !self.repetition_penalty.is_finite() || self.repetition_penalty < 1.0 {
            return Err(CoreError::invalid_parameter(
                "CONFIG_INVALID_REPETITION_PENALTY",
                "Repetition penalty must be at least 1.0",
                "Generation configuration validation",
                "Use 1.0 for no penalty; 1.2 is a common choice for control-coded models",
                "repetition_penalty",
                self.repetition_penalty.to_string(),
                ">= 1.0",
            ));
        }

        if matches!(self.stop_token.as_deref(), Some("")) {
            return Err(CoreError::invalid_parameter(
                "CONFIG_EMPTY_STOP_TOKEN",
                "Stop token cannot be empty",
                "Generation configuration validation",
                "Omit the stop token to generate up to the full length",
                "stop_token",
                "",
                "non-empty string",
            ));
        }

        Ok(())
    }

    /// The padding passage override, ignoring empty values
    pub fn padding_override(&self) -> Option<&str> {
        self.padding_text.as_deref().filter(|text| !text.is_empty())
    }

    /// The stop token, ignoring empty values
    pub fn stop_token(&self) -> Option<&str> {
        self.stop_token.as_deref().filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenerationConfig::default();
        assert_eq!(config.length, 20);
        assert_eq!(config.temperature, 1.0);
        assert_eq!(config.top_k, 0);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GenerationConfig::default();
        config.temperature = 0.0;
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_INVALID_TEMPERATURE");

        let mut config = GenerationConfig::default();
        config.top_p = 1.5;
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_INVALID_TOP_P");

        let mut config = GenerationConfig::default();
        config.repetition_penalty = 0.5;
        assert_eq!(
            config.validate().unwrap_err().code(),
            "CONFIG_INVALID_REPETITION_PENALTY"
        );

        let mut config = GenerationConfig::default();
        config.length = 0;
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_INVALID_LENGTH");

        let mut config = GenerationConfig::default();
        config.length = -1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let config = GenerationConfig {
            padding_text: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.padding_override(), None);
        assert_eq!(config.stop_token(), None);
    }

    #[test]
    fn test_device_selection() {
        let device = DeviceConfig::default();
        assert_eq!(device.select(false).unwrap(), DeviceType::Cpu);
        assert_eq!(device.select(true).unwrap(), DeviceType::Cuda);
        assert_eq!(DeviceConfig::cpu().select(true).unwrap(), DeviceType::Cpu);

        let strict = DeviceConfig {
            device_type: DeviceType::Cuda,
            cpu_fallback: false,
        };
        assert!(strict.select(false).is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generation.toml");
        std::fs::write(&path, "temperature = 0.5\ntop_k = 10\nstop_token = \"<eos>\"\n").unwrap();

        let config = GenerationConfig::from_file(&path).unwrap();
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.stop_token(), Some("<eos>"));
        assert_eq!(config.length, 20);
    }
}
