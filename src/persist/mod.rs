//! Output sinks for `saveToFile`
//!
//! The executor only sees the [`Persistence`] trait. [`FileSink`] writes CSV
//! and JSON files under an output directory; [`MemorySink`] keeps everything
//! in memory for dry runs and tests.

use crate::error::{FlowError, Result};
use crate::table::TabularResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Output encoding selected by `fileType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
}

impl FileType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "json" => Some(FileType::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Json => "json",
        }
    }
}

/// Where and how a single `saveToFile` writes its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSpec {
    /// Base file name, without extension
    pub to: String,
    pub file_type: FileType,
    /// Append the document name and a timestamp to the file name
    pub long_name: bool,
    /// Subdirectory of the output directory
    pub dir: Option<String>,
}

/// Destination for flow output
pub trait Persistence: Send + Sync {
    /// Write a table, returning the location written
    fn write_tabular(&self, table: &TabularResult, spec: &SaveSpec) -> Result<PathBuf>;

    /// Write a JSON document, returning the location written
    fn write_structured(&self, value: &serde_json::Value, spec: &SaveSpec) -> Result<PathBuf>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes files below an output directory
#[derive(Debug)]
pub struct FileSink {
    output_dir: PathBuf,
    source_name: String,
    written: Mutex<Vec<PathBuf>>,
}

impl FileSink {
    /// `source_name` is used in long file names, usually the document's file name
    pub fn new(output_dir: impl Into<PathBuf>, source_name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            source_name: source_name.into(),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Paths written so far, in write order
    pub fn written(&self) -> Vec<PathBuf> {
        lock(&self.written).clone()
    }

    /// Compute the target path for a save
    ///
    /// `{to}.{ext}`, or `{to}-{source}-{timestamp}.{ext}` with `long_name`.
    pub fn target_path(&self, spec: &SaveSpec) -> PathBuf {
        let stem = if spec.long_name {
            let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            format!("{}-{}-{}", spec.to, self.source_name, timestamp)
        } else {
            spec.to.clone()
        };
        let file_name = format!("{}.{}", stem, spec.file_type.extension());
        match &spec.dir {
            Some(dir) => self.output_dir.join(dir).join(file_name),
            None => self.output_dir.join(file_name),
        }
    }

    fn prepare(&self, spec: &SaveSpec) -> Result<PathBuf> {
        let path = self.target_path(spec);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FlowError::persistence(parent, e))?;
        }
        Ok(path)
    }

    fn record(&self, path: &Path) {
        info!("Wrote {}", path.display());
        lock(&self.written).push(path.to_path_buf());
    }
}

impl Persistence for FileSink {
    fn write_tabular(&self, table: &TabularResult, spec: &SaveSpec) -> Result<PathBuf> {
        let path = self.prepare(spec)?;
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|e| FlowError::persistence(&path, e))?;
        writer
            .write_record(&table.header)
            .map_err(|e| FlowError::persistence(&path, e))?;
        for row in &table.rows {
            writer
                .write_record(row)
                .map_err(|e| FlowError::persistence(&path, e))?;
        }
        writer.flush().map_err(|e| FlowError::persistence(&path, e))?;
        debug!("Wrote {} rows to {}", table.rows.len(), path.display());
        self.record(&path);
        Ok(path)
    }

    fn write_structured(&self, value: &serde_json::Value, spec: &SaveSpec) -> Result<PathBuf> {
        let path = self.prepare(spec)?;
        let content =
            serde_json::to_string_pretty(value).map_err(|e| FlowError::persistence(&path, e))?;
        fs::write(&path, content).map_err(|e| FlowError::persistence(&path, e))?;
        self.record(&path);
        Ok(path)
    }
}

/// Content captured by a [`MemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SavedContent {
    Table(TabularResult),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedOutput {
    pub spec: SaveSpec,
    pub content: SavedContent,
}

/// Keeps every save in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<SavedOutput>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<SavedOutput> {
        lock(&self.saved).clone()
    }

    /// Locations the saves would have been written to, relative to the output directory
    pub fn written(&self) -> Vec<PathBuf> {
        lock(&self.saved)
            .iter()
            .map(|output| Self::relative_path(&output.spec))
            .collect()
    }

    fn relative_path(spec: &SaveSpec) -> PathBuf {
        let file_name = format!("{}.{}", spec.to, spec.file_type.extension());
        match &spec.dir {
            Some(dir) => Path::new(dir).join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    fn push(&self, spec: &SaveSpec, content: SavedContent) -> PathBuf {
        lock(&self.saved).push(SavedOutput {
            spec: spec.clone(),
            content,
        });
        Self::relative_path(spec)
    }
}

impl Persistence for MemorySink {
    fn write_tabular(&self, table: &TabularResult, spec: &SaveSpec) -> Result<PathBuf> {
        Ok(self.push(spec, SavedContent::Table(table.clone())))
    }

    fn write_structured(&self, value: &serde_json::Value, spec: &SaveSpec) -> Result<PathBuf> {
        Ok(self.push(spec, SavedContent::Json(value.clone())))
    }
}
