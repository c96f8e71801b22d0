//! Catalog of known marker patterns.
//!
//! Two on-disk formats are accepted:
//! - the ARToolKit multi-object text format (count, then name / pattern file /
//!   side length / centre per pattern, `#` comments allowed),
//! - a JSON list of [`PatternEntry`] values (any path ending in `.json`).
//!
//! Text-format ids are assigned in file order starting at 0, matching the
//! order in which the detector loads the pattern files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("catalog has no patterns")]
    Empty,
    #[error("pattern {name:?}: side length must be finite and > 0")]
    InvalidSideLength { name: String },
    #[error("duplicate pattern id {id}")]
    DuplicateId { id: i32 },
}

/// One pre-registered planar marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub id: i32,
    pub name: String,
    /// Appearance data, only consumed by the detector.
    pub pattern_file: PathBuf,
    /// Physical side length in metres.
    pub side_length: f64,
    /// Whether the pattern was seen in the last processed frame.
    #[serde(skip)]
    pub visible: bool,
}

/// Ordered, immutable set of patterns (apart from the `visible` flags).
#[derive(Clone, Debug, Default)]
pub struct PatternCatalog {
    entries: Vec<PatternEntry>,
}

impl PatternCatalog {
    /// Validate and wrap a list of entries.
    pub fn new(entries: Vec<PatternEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if !entry.side_length.is_finite() || entry.side_length <= 0.0 {
                return Err(CatalogError::InvalidSideLength {
                    name: entry.name.clone(),
                });
            }
            if !seen.insert(entry.id) {
                return Err(CatalogError::DuplicateId { id: entry.id });
            }
        }
        Ok(Self { entries })
    }

    /// Load a catalog from disk; pattern files are resolved against `data_dir`.
    pub fn load(path: impl AsRef<Path>, data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let mut entries = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str::<Vec<PatternEntry>>(&raw)?
        } else {
            parse_object_data(&raw)?
        };
        for entry in &mut entries {
            entry.pattern_file = data_dir.as_ref().join(&entry.pattern_file);
        }
        Self::new(entries)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&PatternEntry> {
        self.entries.get(index)
    }

    /// Set the visibility flag of the entry at `index`.
    pub fn set_visible(&mut self, index: usize, visible: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.visible = visible;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternEntry> {
        self.entries.iter()
    }
}

/// Parse the ARToolKit multi-object description.
pub(crate) fn parse_object_data(raw: &str) -> Result<Vec<PatternEntry>, CatalogError> {
    let mut lines = raw
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let mut next = |what: &str| {
        lines.next().ok_or_else(|| CatalogError::Parse {
            line: 0,
            message: format!("unexpected end of file, expected {what}"),
        })
    };

    let (line, count) = next("pattern count")?;
    let count: usize = count.parse().map_err(|_| CatalogError::Parse {
        line,
        message: format!("invalid pattern count {count:?}"),
    })?;

    let mut entries = Vec::with_capacity(count);
    for id in 0..count {
        let (_, name) = next("pattern name")?;
        let (_, pattern_file) = next("pattern file")?;
        let (line, width) = next("side length")?;
        let side_length: f64 = width.parse().map_err(|_| CatalogError::Parse {
            line,
            message: format!("invalid side length {width:?}"),
        })?;
        let (line, center) = next("pattern centre")?;
        let coords: Vec<&str> = center.split_whitespace().collect();
        if coords.len() != 2 || coords.iter().any(|c| c.parse::<f64>().is_err()) {
            return Err(CatalogError::Parse {
                line,
                message: format!("invalid pattern centre {center:?}"),
            });
        }

        entries.push(PatternEntry {
            id: id as i32,
            name: name.to_string(),
            pattern_file: PathBuf::from(pattern_file),
            side_length,
            visible: false,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const OBJECTS: &str = "\
#the number of patterns to be recognized
2

#pattern 1
robot_a
data/4x4/4x4_1.patt
0.08
0.0 0.0

#pattern 2
robot_b
data/4x4/4x4_2.patt
0.12
0.0 0.0
";

    #[test]
    fn parses_object_data_in_file_order() {
        let entries = parse_object_data(OBJECTS).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 0);
        assert_eq!(entries[0].name, "robot_a");
        assert_eq!(entries[1].id, 1);
        assert_eq!(entries[1].side_length, 0.12);
        assert!(!entries[1].visible);
    }

    #[test]
    fn truncated_object_data_is_rejected() {
        let err = parse_object_data("2\nrobot_a\nfile.patt\n0.08\n0 0\n").unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn bad_centre_reports_line() {
        let err = parse_object_data("1\nrobot_a\nfile.patt\n0.08\n0\n").unwrap_err();
        match err {
            CatalogError::Parse { line, .. } => assert_eq!(line, 5),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn load_resolves_pattern_files_against_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("objects_kinect");
        fs::File::create(&path)
            .and_then(|mut f| f.write_all(OBJECTS.as_bytes()))
            .expect("write catalog");

        let catalog = PatternCatalog::load(&path, "/opt/markers").expect("load");
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.entries()[0].pattern_file,
            PathBuf::from("/opt/markers/data/4x4/4x4_1.patt")
        );
    }

    #[test]
    fn load_accepts_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patterns.json");
        let json = r#"[
            {"id": 7, "name": "dock", "pattern_file": "dock.patt", "side_length": 0.2}
        ]"#;
        fs::write(&path, json).expect("write catalog");

        let catalog = PatternCatalog::load(&path, dir.path()).expect("load");
        assert_eq!(catalog.get(0).map(|e| e.id), Some(7));
    }

    #[test]
    fn validation_rejects_duplicates_and_bad_sizes() {
        let entry = |id, side_length| PatternEntry {
            id,
            name: format!("p{id}"),
            pattern_file: PathBuf::new(),
            side_length,
            visible: false,
        };
        assert!(matches!(
            PatternCatalog::new(Vec::new()),
            Err(CatalogError::Empty)
        ));
        assert!(matches!(
            PatternCatalog::new(vec![entry(1, 0.1), entry(1, 0.1)]),
            Err(CatalogError::DuplicateId { id: 1 })
        ));
        assert!(matches!(
            PatternCatalog::new(vec![entry(1, -0.1)]),
            Err(CatalogError::InvalidSideLength { .. })
        ));
    }
}
