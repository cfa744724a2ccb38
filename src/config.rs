// WHY: detection options are an explicit value passed into every call so one
// detector can serve callers with different settings concurrently

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::citation_detector::StyleId;
use crate::error::ConfigurationError;

/// Tolerance used when checking that the scoring weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Default margin under which the top two candidates are reported as ambiguous
pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.05;

/// Default confidence a structurally valid candidate needs to become the best style
pub const DEFAULT_VALIDITY_THRESHOLD: f64 = 0.45;

/// Relative weight of each scoring component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub pattern_weight: f64,
    pub corroboration_weight: f64,
    pub validity_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            pattern_weight: 0.4,
            corroboration_weight: 0.2,
            validity_weight: 0.4,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let named = [
            ("pattern_weight", self.pattern_weight),
            ("corroboration_weight", self.corroboration_weight),
            ("validity_weight", self.validity_weight),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::WeightOutOfRange { name, value });
            }
        }

        let sum = self.pattern_weight + self.corroboration_weight + self.validity_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigurationError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

/// Options for a single detection call or batch
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOptions {
    /// Restrict evaluation to these styles; `None` evaluates every known style
    pub styles: Option<Vec<StyleId>>,
    pub scoring_weights: ScoringWeights,
    /// Candidates scoring below this are flagged low-confidence
    pub min_confidence: f64,
    pub ambiguity_margin: f64,
    pub validity_threshold: f64,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            styles: None,
            scoring_weights: ScoringWeights::default(),
            min_confidence: 0.0,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            validity_threshold: DEFAULT_VALIDITY_THRESHOLD,
        }
    }
}

impl DetectionOptions {
    /// Restrict detection to styles named by the caller, e.g. `["apa", "ieee"]`
    pub fn with_style_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, ConfigurationError> {
        let styles = names
            .iter()
            .map(|name| parse_requested_style(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.styles = Some(styles);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.scoring_weights.validate()?;

        if let Some(styles) = &self.styles {
            if styles.is_empty() {
                return Err(ConfigurationError::EmptyStyleSet);
            }
            if let Some(pseudo) = styles.iter().find(|s| !s.is_known()) {
                return Err(ConfigurationError::UnknownStyle(pseudo.as_str().to_string()));
            }
        }

        let bounded = [
            ("min_confidence", self.min_confidence),
            ("ambiguity_margin", self.ambiguity_margin),
            ("validity_threshold", self.validity_threshold),
        ];
        for (name, value) in bounded {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::ValueOutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Styles to evaluate, deduplicated, in canonical order
    pub fn requested_styles(&self) -> Vec<StyleId> {
        let mut styles = match &self.styles {
            Some(styles) => styles.clone(),
            None => StyleId::KNOWN.to_vec(),
        };
        styles.sort();
        styles.dedup();
        styles
    }
}

fn parse_requested_style(name: &str) -> Result<StyleId, ConfigurationError> {
    match name.parse::<StyleId>() {
        Ok(style) if style.is_known() => Ok(style),
        _ => Err(ConfigurationError::UnknownStyle(name.to_string())),
    }
}

/// On-disk form of [`DetectionOptions`] (TOML)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsFile {
    pub styles: Option<Vec<String>>,
    pub scoring_weights: Option<ScoringWeights>,
    pub min_confidence: Option<f64>,
    pub ambiguity_margin: Option<f64>,
    pub validity_threshold: Option<f64>,
}

impl OptionsFile {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(content).map_err(|e| ConfigurationError::OptionsFile(e.to_string()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::OptionsFile(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Resolve into validated options, falling back to defaults for unset keys
    pub fn into_options(self) -> Result<DetectionOptions, ConfigurationError> {
        let defaults = DetectionOptions::default();
        let mut options = DetectionOptions {
            styles: None,
            scoring_weights: self.scoring_weights.unwrap_or(defaults.scoring_weights),
            min_confidence: self.min_confidence.unwrap_or(defaults.min_confidence),
            ambiguity_margin: self.ambiguity_margin.unwrap_or(defaults.ambiguity_margin),
            validity_threshold: self.validity_threshold.unwrap_or(defaults.validity_threshold),
        };
        if let Some(names) = self.styles {
            options = options.with_style_names(&names)?;
        }
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let options = DetectionOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.requested_styles(), StyleId::KNOWN.to_vec());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let options = DetectionOptions {
            scoring_weights: ScoringWeights {
                pattern_weight: 0.5,
                corroboration_weight: 0.5,
                validity_weight: 0.5,
            },
            ..Default::default()
        };
        match options.validate() {
            Err(ConfigurationError::WeightsDoNotSumToOne { sum }) => assert!((sum - 1.5).abs() < 1e-9),
            other => panic!("expected WeightsDoNotSumToOne, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_weight_rejected() {
        let weights = ScoringWeights {
            pattern_weight: -0.2,
            corroboration_weight: 0.6,
            validity_weight: 0.6,
        };
        assert!(matches!(
            weights.validate(),
            Err(ConfigurationError::WeightOutOfRange { name: "pattern_weight", .. })
        ));
    }

    #[test]
    fn test_style_names_parse_case_insensitively() {
        let options = DetectionOptions::default()
            .with_style_names(&["IEEE", "apa", "ieee"])
            .unwrap();
        assert_eq!(options.requested_styles(), vec![StyleId::Apa, StyleId::Ieee]);
    }

    #[test]
    fn test_unknown_style_name_rejected() {
        let result = DetectionOptions::default().with_style_names(&["turabian"]);
        assert_eq!(result, Err(ConfigurationError::UnknownStyle("turabian".to_string())));

        // the pseudo-style is not a valid restriction either
        let result = DetectionOptions::default().with_style_names(&["unknown"]);
        assert!(matches!(result, Err(ConfigurationError::UnknownStyle(_))));
    }

    #[test]
    fn test_empty_style_set_rejected() {
        let options = DetectionOptions {
            styles: Some(Vec::new()),
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(ConfigurationError::EmptyStyleSet));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let options = DetectionOptions {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigurationError::ValueOutOfRange { name: "min_confidence", .. })
        ));
    }

    #[test]
    fn test_options_file_round_into_options() {
        let toml = r#"
styles = ["apa", "harvard"]
min_confidence = 0.3

[scoring_weights]
pattern_weight = 0.5
corroboration_weight = 0.1
validity_weight = 0.4
"#;
        let options = OptionsFile::from_toml_str(toml).unwrap().into_options().unwrap();
        assert_eq!(options.requested_styles(), vec![StyleId::Apa, StyleId::Harvard]);
        assert_eq!(options.min_confidence, 0.3);
        assert_eq!(options.scoring_weights.pattern_weight, 0.5);
        assert_eq!(options.ambiguity_margin, DEFAULT_AMBIGUITY_MARGIN);
    }

    #[test]
    fn test_options_file_rejects_unknown_keys() {
        let result = OptionsFile::from_toml_str("threshold = 0.2");
        assert!(matches!(result, Err(ConfigurationError::OptionsFile(_))));
    }
}
