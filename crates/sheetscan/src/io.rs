//! JSON configuration and report documents for a set of answer sheets.

use crate::core::io::{read_json, write_json_pretty};
use crate::core::JsonIoError;
use crate::grading::ProblemSpec;
use crate::reader::{ClassifierKind, ExtractorParams, RecognizedSheet};
use crate::recovery::RectifierParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stage settings shared by every sheet of a set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub rectifier: RectifierParams,
    pub extractor: ExtractorParams,
    pub classifier: ClassifierKind,
}

/// One problem set: layout, scans, classifier, problems and output paths.
///
/// [`SheetSetConfig::load_json`] resolves relative paths against the config
/// file's directory, including the default output names. A config built in
/// code keeps its paths as given, i.e. relative to the working directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SheetSetConfig {
    pub layout_path: String,
    #[serde(default)]
    pub scans: Vec<String>,
    #[serde(default)]
    pub params: PipelineParams,
    #[serde(default)]
    pub problems: Vec<ProblemSpec>,
    #[serde(default)]
    pub answers_path: Option<String>,
    #[serde(default)]
    pub report_path: Option<String>,
    #[serde(default)]
    pub scores_path: Option<String>,
}

impl SheetSetConfig {
    /// Load a JSON config from disk and resolve its paths against its directory.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, JsonIoError> {
        let path = path.as_ref();
        let mut config: Self = read_json(path)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Make every relative path absolute under `base`; unset outputs get
    /// their default names under `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &str| {
            let p = Path::new(p);
            if p.is_absolute() {
                p.display().to_string()
            } else {
                base.join(p).display().to_string()
            }
        };
        self.layout_path = join(&self.layout_path);
        for scan in &mut self.scans {
            *scan = join(scan);
        }
        self.answers_path = Some(join(&self.answers_path().display().to_string()));
        self.report_path = Some(join(&self.report_path().display().to_string()));
        self.scores_path = Some(join(&self.scores_path().display().to_string()));
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), JsonIoError> {
        write_json_pretty(path, self)
    }

    /// Answer table path (default `answers.json`).
    pub fn answers_path(&self) -> PathBuf {
        self.answers_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("answers.json"))
    }

    /// Read report path (default `read_report.json`).
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("read_report.json"))
    }

    /// Score report path (default `scores.json`).
    pub fn scores_path(&self) -> PathBuf {
        self.scores_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("scores.json"))
    }
}

/// A sheet that was read, with its per-cell detail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub source: String,
    /// Recovery warnings (e.g. a sheet rectified from two anchors).
    pub warnings: Vec<String>,
    pub sheet: RecognizedSheet,
}

/// A sheet excluded from the answer table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetFailure {
    pub source: String,
    pub code: Option<String>,
    pub error: String,
}

/// Everything the `read` stage learned about a set of scans.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadReport {
    pub sheets: Vec<SheetRecord>,
    pub failures: Vec<SheetFailure>,
}

impl ReadReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, JsonIoError> {
        read_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), JsonIoError> {
        write_json_pretty(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaded_config_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("set");
        std::fs::create_dir(&sub).expect("mkdir");
        let abs_scan = dir.path().join("elsewhere.png").display().to_string();
        let raw = serde_json::json!({
            "layout_path": "layout.json",
            "scans": ["scans/09-01.png", abs_scan],
            "scores_path": "out/scores.json"
        });
        let path = sub.join("config.json");
        std::fs::write(&path, raw.to_string()).expect("write");

        let config = SheetSetConfig::load_json(&path).expect("config");
        assert_eq!(Path::new(&config.layout_path), sub.join("layout.json"));
        assert_eq!(Path::new(&config.scans[0]), sub.join("scans/09-01.png"));
        assert_eq!(config.scans[1], abs_scan);
        assert_eq!(config.answers_path(), sub.join("answers.json"));
        assert_eq!(config.report_path(), sub.join("read_report.json"));
        assert_eq!(config.scores_path(), sub.join("out/scores.json"));
    }

    #[test]
    fn config_built_in_code_keeps_its_paths() {
        let config = SheetSetConfig {
            layout_path: "layout.json".into(),
            scans: vec!["a.png".into()],
            params: PipelineParams::default(),
            problems: Vec::new(),
            answers_path: None,
            report_path: None,
            scores_path: None,
        };
        assert_eq!(config.layout_path, "layout.json");
        assert_eq!(config.answers_path(), PathBuf::from("answers.json"));
    }
}
