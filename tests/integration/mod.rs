#![allow(dead_code)]

// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

use citestyle::CitationStyleDetector;

/// Test fixture helper for creating temporary citation inputs and snapshots
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self { temp_dir, root_path }
    }

    /// Create a citation file with one citation per line
    pub fn create_citation_file<P: AsRef<Path>>(&self, relative_path: P, citations: &[&str]) -> PathBuf {
        let mut content = citations.join("\n");
        content.push('\n');
        self.create_file(relative_path, content.as_bytes())
    }

    /// Create a file with raw bytes, e.g. to exercise invalid UTF-8
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &[u8]) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// Serialize a value as a JSON snapshot file
    pub fn create_json_file<P: AsRef<Path>, T: serde::Serialize>(&self, relative_path: P, value: &T) -> PathBuf {
        let json = serde_json::to_vec_pretty(value).expect("Failed to serialize snapshot");
        self.create_file(relative_path, &json)
    }

    /// Read a file written by the code under test
    pub fn read_file<P: AsRef<Path>>(&self, relative_path: P) -> Result<String, std::io::Error> {
        fs::read_to_string(self.root_path.join(relative_path))
    }
}

static SHARED_DETECTOR: OnceLock<CitationStyleDetector> = OnceLock::new();

/// Detector over the built-in data, shared across tests in one binary
pub fn shared_detector() -> &'static CitationStyleDetector {
    SHARED_DETECTOR.get_or_init(|| CitationStyleDetector::with_builtin_data().expect("built-in data loads"))
}
