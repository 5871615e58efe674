//! Storage layer
//!
//! Reads the cereal CSV into a [`CerealTable`] and keeps the loaded table
//! for the lifetime of the process. The cache loads on first request and is
//! only invalidated by an explicit [`TableCache::refresh`].

use crate::error::{DashboardError, Result};
use crate::table::CerealTable;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Table reader trait
///
/// Abstracts where the table comes from.
pub trait TableReader: Send + Sync {
    fn read(&self) -> Result<CerealTable>;

    /// Human readable source, used in logs.
    fn source(&self) -> String;
}

/// CSV table reader
pub struct CsvTableReader {
    path: PathBuf,
    infer_schema_length: Option<usize>,
    separator: u8,
}

impl CsvTableReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            infer_schema_length: None,
            separator: b',',
        }
    }

    /// Rows scanned to infer column types. `None` scans the whole file.
    pub fn with_infer_schema_length(mut self, length: Option<usize>) -> Self {
        self.infer_schema_length = length;
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableReader for CsvTableReader {
    fn read(&self) -> Result<CerealTable> {
        if !self.path.is_file() {
            return Err(DashboardError::FileNotFound(self.path.clone()));
        }

        let df = LazyCsvReader::new(&self.path)
            .with_has_header(true)
            .with_separator(self.separator)
            .with_infer_schema_length(self.infer_schema_length)
            .finish()
            .map_err(|e| DashboardError::Malformed(format!("Failed to scan CSV: {}", e)))?
            .collect()
            .map_err(|e| DashboardError::Malformed(format!("Failed to read CSV: {}", e)))?;
        debug!(rows = df.height(), columns = df.width(), "csv parsed");

        let table = CerealTable::from_dataframe(df)?;
        info!(path = %self.path.display(), rows = table.len(), "loaded cereal table");
        Ok(table)
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Reader over a frame already in memory.
pub struct FrameReader {
    df: DataFrame,
}

impl FrameReader {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }
}

impl TableReader for FrameReader {
    fn read(&self) -> Result<CerealTable> {
        CerealTable::from_dataframe(self.df.clone())
    }

    fn source(&self) -> String {
        "<memory>".to_string()
    }
}

#[derive(Clone)]
struct Loaded {
    table: Arc<CerealTable>,
    loaded_at: DateTime<Utc>,
}

/// Process-wide holder of the loaded table.
pub struct TableCache {
    reader: Box<dyn TableReader>,
    slot: RwLock<Option<Loaded>>,
}

impl TableCache {
    pub fn new(reader: Box<dyn TableReader>) -> Self {
        Self {
            reader,
            slot: RwLock::new(None),
        }
    }

    /// Return the cached table, loading it on the first call.
    pub fn get(&self) -> Result<Arc<CerealTable>> {
        {
            let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
            if let Some(loaded) = slot.as_ref() {
                return Ok(Arc::clone(&loaded.table));
            }
        }

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have loaded while we waited for the write lock.
        if let Some(loaded) = slot.as_ref() {
            return Ok(Arc::clone(&loaded.table));
        }
        let loaded = self.load()?;
        let table = Arc::clone(&loaded.table);
        *slot = Some(loaded);
        Ok(table)
    }

    /// Reload from the source, replacing the cached table. On failure the
    /// previous table stays cached.
    pub fn refresh(&self) -> Result<Arc<CerealTable>> {
        let loaded = self.load()?;
        let table = Arc::clone(&loaded.table);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(loaded);
        info!(source = %self.reader.source(), "table cache refreshed");
        Ok(table)
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|l| l.loaded_at)
    }

    pub fn source(&self) -> String {
        self.reader.source()
    }

    fn load(&self) -> Result<Loaded> {
        let table = self.reader.read()?;
        Ok(Loaded {
            table: Arc::new(table),
            loaded_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_util::sample_frame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReader {
        reads: Arc<AtomicUsize>,
    }

    impl TableReader for CountingReader {
        fn read(&self) -> Result<CerealTable> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            CerealTable::from_dataframe(sample_frame())
        }

        fn source(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_cache_loads_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let cache = TableCache::new(Box::new(CountingReader {
            reads: Arc::clone(&reads),
        }));
        assert!(cache.loaded_at().is_none());

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(cache.loaded_at().is_some());

        cache.refresh().unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_file() {
        let reader = CsvTableReader::new("/definitely/not/here.csv");
        let err = reader.read().unwrap_err();
        assert!(matches!(err, DashboardError::FileNotFound(_)));
    }

    #[test]
    fn test_frame_reader() {
        let table = FrameReader::new(sample_frame()).read().unwrap();
        assert_eq!(table.len(), 5);
    }
}
