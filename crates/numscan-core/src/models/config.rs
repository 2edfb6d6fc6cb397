//! Configuration structures for the extraction pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NumscanError;
use crate::number::rules::{
    ConfusableMap, DigitGrouping, IdentifierGrammar, NormalizationPolicy, TemplateMode,
    WhitespaceMode, DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_GROUP_SEPARATOR, DEFAULT_PLACEHOLDER,
    PLATE_GRAMMAR,
};
use crate::number::{ExtractionPolicy, PipelineConfig};
use crate::pdf::DEFAULT_MIN_TEXT_LENGTH;

/// Main configuration for numscan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumscanConfig {
    /// Template compilation settings.
    pub template: TemplateConfig,

    /// Text normalization settings.
    pub normalization: NormalizationConfig,

    /// Matching, validation and dedupe settings.
    pub extraction: ExtractionConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Model configuration.
    pub models: ModelConfig,
}

/// Template compilation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Symbol standing for one digit.
    pub placeholder: char,

    /// Whether template whitespace matches zero or more (`lenient`) or one
    /// or more (`strict`) whitespace characters.
    pub whitespace: WhitespaceMode,

    /// Template convention used when none is given on the command line.
    pub mode: TemplateMode,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER,
            whitespace: WhitespaceMode::Lenient,
            mode: TemplateMode::GroupLengths,
        }
    }
}

/// Text normalization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Join (`tight`) or keep (`preserve`) whitespace between digits.
    pub digit_grouping: DigitGrouping,

    /// Apply the confusable table before matching.
    pub remap_confusables: bool,

    /// Letter to digit substitutions, used when `remap_confusables` is set.
    pub confusables: ConfusableMap,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            digit_grouping: DigitGrouping::Tight,
            remap_confusables: false,
            confusables: ConfusableMap::numeric(),
        }
    }
}

impl NormalizationConfig {
    /// The normalization policy these settings describe.
    pub fn policy(&self) -> NormalizationPolicy {
        NormalizationPolicy {
            digit_grouping: self.digit_grouping,
            confusables: self.remap_confusables.then(|| self.confusables.clone()),
        }
    }
}

/// Matching, validation and dedupe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Return the first match only, or all matches.
    pub policy: ExtractionPolicy,

    /// Validate matches against `grammar`.
    pub validate: bool,

    /// Identifier grammar as digit-group ranges.
    pub grammar: String,

    /// Separator between groups of validated identifiers.
    pub separator: String,

    /// Drop near-duplicate matches.
    pub dedupe: bool,

    /// Similarity (0.0 - 1.0) at or above which two matches are duplicates.
    pub duplicate_threshold: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            policy: ExtractionPolicy::FirstOnly,
            validate: false,
            grammar: PLATE_GRAMMAR.to_string(),
            separator: DEFAULT_GROUP_SEPARATOR.to_string(),
            dedupe: true,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Try to extract embedded text before falling back to OCR.
    pub prefer_embedded_text: bool,

    /// Minimum text length to consider PDF as text-based.
    pub min_text_length: usize,

    /// Maximum pages to OCR (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            prefer_embedded_text: true,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
            max_pages: 10,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Keep `[UNK]` tokens in recognized text instead of blanking them.
    pub keep_unk: bool,
}

/// Model file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Host the model variants are published on, as `<url>/<variant>/<file>`.
    pub download_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            download_url: None,
        }
    }
}

impl NumscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, NumscanError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| NumscanError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), NumscanError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| NumscanError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot: grammar syntax, threshold range and
    /// the confusable table.
    pub fn validate(&self) -> Result<(), NumscanError> {
        if self.template.placeholder.is_whitespace() || self.template.placeholder == '-' {
            return Err(NumscanError::Config(format!(
                "'{}' cannot be used as a placeholder",
                self.template.placeholder
            )));
        }

        if !(0.0..=1.0).contains(&self.extraction.duplicate_threshold) {
            return Err(NumscanError::Config(format!(
                "extraction.duplicate_threshold must be within 0..=1, got {}",
                self.extraction.duplicate_threshold
            )));
        }

        IdentifierGrammar::parse(&self.extraction.grammar)?;

        if self.normalization.remap_confusables {
            self.normalization.confusables.validate()?;
        }

        Ok(())
    }

    /// Pipeline settings described by this configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            placeholder: self.template.placeholder,
            whitespace: self.template.whitespace,
            normalization: self.normalization.policy(),
            policy: self.extraction.policy,
            validate: self.extraction.validate,
            grammar: self.extraction.grammar.clone(),
            separator: self.extraction.separator.clone(),
            dedupe: self.extraction.dedupe,
            duplicate_threshold: self.extraction.duplicate_threshold,
        }
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }

    /// Look up a value by dotted key, e.g. `extraction.duplicate_threshold`.
    pub fn get_value(&self, key: &str) -> Result<Value, NumscanError> {
        let json = serde_json::to_value(self).map_err(|e| NumscanError::Config(e.to_string()))?;

        key.split('.')
            .try_fold(&json, |node, part| node.get(part))
            .cloned()
            .ok_or_else(|| NumscanError::Config(format!("unknown configuration key: {}", key)))
    }

    /// Set a value by dotted key.
    ///
    /// `value` is parsed as JSON and taken as a plain string when that fails,
    /// so `set("template.mode", "placeholder")` works without quoting.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<Value, NumscanError> {
        let parsed: Value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

        let mut json =
            serde_json::to_value(&*self).map_err(|e| NumscanError::Config(e.to_string()))?;

        let (parent, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };

        let mut node = &mut json;
        for part in parent.into_iter().flat_map(|p| p.split('.')) {
            node = node
                .get_mut(part)
                .ok_or_else(|| NumscanError::Config(format!("unknown configuration key: {}", key)))?;
        }

        let slot = node
            .as_object_mut()
            .and_then(|object| object.get_mut(leaf))
            .ok_or_else(|| NumscanError::Config(format!("unknown configuration key: {}", key)))?;
        *slot = parsed.clone();

        *self = serde_json::from_value(json)
            .map_err(|e| NumscanError::Config(format!("invalid value for {}: {}", key, e)))?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        NumscanConfig::default().validate().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NumscanConfig::default();
        config.extraction.validate = true;
        config.extraction.duplicate_threshold = 0.88;
        config.normalization.remap_confusables = true;
        config.save(&path).unwrap();

        let loaded = NumscanConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "template": { "placeholder": "X" } }"#).unwrap();

        let config = NumscanConfig::from_file(&path).unwrap();
        assert_eq!(config.template.placeholder, 'X');
        assert_eq!(config.template.mode, TemplateMode::GroupLengths);
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            NumscanConfig::from_file(&missing),
            Err(NumscanError::Io(_))
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            NumscanConfig::from_file(&broken),
            Err(NumscanError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NumscanConfig::default();
        config.extraction.duplicate_threshold = 1.2;
        assert!(config.validate().is_err());

        let mut config = NumscanConfig::default();
        config.extraction.grammar = "5..x".to_string();
        assert!(matches!(config.validate(), Err(NumscanError::Compile(_))));

        let mut config = NumscanConfig::default();
        config.template.placeholder = ' ';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_config() {
        let mut config = NumscanConfig::default();
        config.template.whitespace = WhitespaceMode::Strict;
        config.normalization.remap_confusables = true;
        config.extraction.policy = ExtractionPolicy::All;

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.whitespace, WhitespaceMode::Strict);
        assert_eq!(pipeline.policy, ExtractionPolicy::All);
        assert_eq!(pipeline.normalization.confusables, Some(ConfusableMap::numeric()));

        config.normalization.remap_confusables = false;
        assert_eq!(config.pipeline_config().normalization.confusables, None);
    }

    #[test]
    fn test_get_and_set_value() {
        let mut config = NumscanConfig::default();
        assert_eq!(
            config.get_value("extraction.duplicate_threshold").unwrap(),
            serde_json::json!(DEFAULT_DUPLICATE_THRESHOLD)
        );

        config.set_value("extraction.duplicate_threshold", "0.88").unwrap();
        assert_eq!(config.extraction.duplicate_threshold, 0.88);

        config.set_value("template.mode", "placeholder").unwrap();
        assert_eq!(config.template.mode, TemplateMode::Placeholder);

        config.set_value("models.model_dir", "/opt/models").unwrap();
        assert_eq!(config.model_path("det.onnx"), PathBuf::from("/opt/models/det.onnx"));

        assert_eq!(config.get_value("models.download_url").unwrap(), serde_json::Value::Null);
        config
            .set_value("models.download_url", "https://models.example.org/numscan")
            .unwrap();
        assert_eq!(
            config.models.download_url.as_deref(),
            Some("https://models.example.org/numscan")
        );

        assert!(config.get_value("extraction.nope").is_err());
        assert!(config.set_value("nope.value", "1").is_err());
        assert!(config.set_value("extraction.validate", "\"sometimes\"").is_err());
    }
}
