use crate::classifier::ClassifierConfig;
use crate::hybrid::CombinationWeights;
use crate::patterns::PatternPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Analyze loops on the rayon pool.
    #[serde(default = "default_parallel_execution")]
    pub parallel_execution: bool,

    #[serde(default)]
    pub policy: PatternPolicy,

    #[serde(default)]
    pub weights: CombinationWeights,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Extra external pattern signatures, loaded once per process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures_path: Option<PathBuf>,
}

fn default_parallel_execution() -> bool {
    true
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            parallel_execution: default_parallel_execution(),
            policy: PatternPolicy::default(),
            weights: CombinationWeights::default(),
            classifier: ClassifierConfig::default(),
            signatures_path: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content).context("Failed to parse JSON config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.weights.validate()?;
        if self.classifier.batch_size == 0 {
            anyhow::bail!("classifier.batch_size must be at least 1");
        }
        if self.classifier.timeout_ms == 0 {
            anyhow::bail!("classifier.timeout_ms must be at least 1");
        }
        Ok(())
    }
}

pub const EXAMPLE_CONFIG: &str = r#"
# Loop analysis configuration
parallel_execution: true
policy:
  version: 1
  order:
    - matrix_multiply
    - convolution_2d
    - image_processing
    - stencil
    - matrix_addition
    - matrix_scaling
    - frobenius_norm
    - complex_reduction
    - prefix_sum
    - reduction
    - filter
    - embarrassingly_parallel
    - vectorizable
    - map
    - simple_parallel
weights:
  static_weight: 0.6
  external_weight: 0.4
  disagreement_threshold: 0.3
classifier:
  enabled: false
  timeout_ms: 30000
  batch_size: 50
  cache_size: 256
  # model: gpt-4o
  # endpoint: https://api.openai.com/v1
  # api_key: sk-...
# signatures_path: signatures.json
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert!(config.parallel_execution);
        assert_eq!(config.policy, PatternPolicy::default());
        assert!(!config.classifier.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = AnalyzerConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn test_partial_yaml_takes_defaults() {
        let config = AnalyzerConfig::from_yaml_str(
            "weights:\n  static_weight: 0.8\n  external_weight: 0.2\nclassifier:\n  enabled: true\n",
        )
        .unwrap();
        assert_eq!(config.weights.disagreement_threshold, 0.3);
        assert!(config.classifier.enabled);
        assert_eq!(config.classifier.batch_size, 50);
    }

    #[test]
    fn test_validation_failures() {
        assert!(AnalyzerConfig::from_yaml_str("weights:\n  static_weight: 0.9\n").is_err());
        assert!(AnalyzerConfig::from_yaml_str("policy:\n  order: [map, map]\n").is_err());
        assert!(AnalyzerConfig::from_yaml_str("classifier:\n  batch_size: 0\n").is_err());
    }
}
