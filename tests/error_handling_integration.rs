// Error taxonomy at the library boundary
// WHY: Configuration and data-source errors must surface before any detection work

use citestyle::citation_detector::knowledge_base::builtin_snapshot;
use citestyle::citation_detector::patterns::builtin_specs;
use citestyle::{
    CitationStyleDetector, ConfigurationError, DataSourceError, DetectError, DetectionOptions, InputError,
    KnowledgeBase, OptionsFile, PatternLibrary, RawCitation, ScoringWeights,
};

#[path = "integration/mod.rs"]
mod test_utils;
use test_utils::{shared_detector, TestFixture};

#[path = "integration/fixtures/mod.rs"]
mod fixtures;
use fixtures::APA_JOURNAL;

#[test]
fn test_weights_not_summing_to_one() {
    let options = DetectionOptions {
        scoring_weights: ScoringWeights {
            pattern_weight: 0.5,
            corroboration_weight: 0.5,
            validity_weight: 0.5,
        },
        ..Default::default()
    };
    let err = shared_detector().detect_text(APA_JOURNAL, &options).unwrap_err();
    assert!(matches!(err, ConfigurationError::WeightsDoNotSumToOne { .. }));
    assert!(err.to_string().contains("sum to 1.0"));
}

#[test]
fn test_unknown_style_restriction() {
    let err = DetectionOptions::default().with_style_names(&["apa", "bluebook"]).unwrap_err();
    assert_eq!(err, ConfigurationError::UnknownStyle("bluebook".to_string()));
}

#[test]
fn test_batch_rejects_invalid_options_without_results() {
    let options = DetectionOptions {
        styles: Some(Vec::new()),
        ..Default::default()
    };
    let raws = vec![RawCitation::new(APA_JOURNAL); 3];
    assert_eq!(
        shared_detector().detect_all(&raws, &options).unwrap_err(),
        ConfigurationError::EmptyStyleSet
    );
}

#[test]
fn test_options_file_errors() {
    let fixture = TestFixture::new();

    let bad_weights = fixture.create_file(
        "weights.toml",
        b"[scoring_weights]\npattern_weight = 0.9\ncorroboration_weight = 0.9\nvalidity_weight = 0.9\n",
    );
    let err = OptionsFile::from_path(&bad_weights).unwrap().into_options().unwrap_err();
    assert!(matches!(err, ConfigurationError::WeightsDoNotSumToOne { .. }));

    let malformed = fixture.create_file("broken.toml", b"styles = [apa");
    assert!(matches!(OptionsFile::from_path(&malformed), Err(ConfigurationError::OptionsFile(_))));

    let missing = fixture.root_path.join("missing.toml");
    assert!(matches!(OptionsFile::from_path(missing), Err(ConfigurationError::OptionsFile(_))));
}

#[test]
fn test_input_errors_at_boundary() {
    assert_eq!(RawCitation::from_optional(None), Err(InputError::Absent));
    assert!(matches!(
        RawCitation::from_bytes(&[b'S', 0xC3, 0x28]),
        Err(InputError::NotUtf8 { valid_up_to: 1 })
    ));

    // empty text is valid input and simply detects nothing
    let result = shared_detector().detect_text("", &DetectionOptions::default()).unwrap();
    assert!(!result.best_style().is_known());
}

#[test]
fn test_knowledge_base_file_errors() {
    let fixture = TestFixture::new();

    let missing = fixture.root_path.join("kb.json");
    assert!(matches!(KnowledgeBase::from_json_file(&missing), Err(DataSourceError::Io { .. })));

    let malformed = fixture.create_file("bad.json", b"{\"records\": [");
    assert!(matches!(KnowledgeBase::from_json_file(&malformed), Err(DataSourceError::Json(_))));

    let mut snapshot = builtin_snapshot();
    snapshot.rule_sets.push(snapshot.rule_sets[0].clone());
    let duplicate = fixture.create_json_file("dup.json", &snapshot);
    assert!(matches!(
        KnowledgeBase::from_json_file(&duplicate),
        Err(DataSourceError::DuplicateRuleSet(_))
    ));
}

#[test]
fn test_pattern_library_file_errors() {
    let fixture = TestFixture::new();

    let empty = fixture.create_file("empty.json", b"[]");
    assert!(matches!(PatternLibrary::from_json_file(&empty), Err(DataSourceError::EmptyLibrary)));

    let mut specs = builtin_specs();
    specs[0].grammar = "(?P<author>[A-Z".to_string();
    let broken = fixture.create_json_file("broken.json", &specs);
    match PatternLibrary::from_json_file(&broken) {
        Err(DataSourceError::InvalidPattern { template, .. }) => assert_eq!(template, specs[0].name),
        other => panic!("expected InvalidPattern, got {other:?}"),
    }

    let mut specs = builtin_specs();
    specs[0].grammar = "(?P<journal>.+)".to_string();
    let unknown = fixture.create_json_file("unknown.json", &specs);
    assert!(matches!(
        PatternLibrary::from_json_file(&unknown),
        Err(DataSourceError::UnknownField { .. })
    ));
}

#[test]
fn test_detect_error_umbrella() {
    fn load(path: &std::path::Path) -> Result<CitationStyleDetector, DetectError> {
        let knowledge = KnowledgeBase::from_json_file(path)?;
        Ok(CitationStyleDetector::new(knowledge, PatternLibrary::builtin()?)?)
    }

    let fixture = TestFixture::new();
    let err = load(&fixture.root_path.join("absent.json")).unwrap_err();
    assert!(matches!(err, DetectError::DataSource(DataSourceError::Io { .. })));

    let err: DetectError = InputError::Absent.into();
    assert_eq!(err.to_string(), "citation input is absent");
}
