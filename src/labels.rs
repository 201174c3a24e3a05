use crate::error::LabelsError;
use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
    ops::Index,
    path::Path,
};

/// Disease names in model output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Result<Self, LabelsError> {
        if labels.is_empty() {
            return Err(LabelsError::Empty);
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(LabelsError::Duplicate(label.clone()));
            }
        }

        Ok(Self { labels })
    }

    /// Reads one label per line. Blank lines and `#` comments are skipped.
    pub fn from_file(filepath: &Path) -> Result<Self, LabelsError> {
        let io_error = |source| LabelsError::Io {
            path: filepath.to_path_buf(),
            source,
        };

        let file = File::open(filepath).map_err(io_error)?;
        let reader = BufReader::new(file);
        let mut labels = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(io_error)?;
            let label = line.trim();
            if label.is_empty() || label.starts_with('#') {
                continue;
            }
            labels.push(label.to_string());
        }

        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Index<usize> for ClassLabels {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.labels[index]
    }
}
