//! Swappable holder for the current scan result.
//!
//! The scan engine itself is stateless; the calling layer (dashboard,
//! chat) owns one `ScanContext` and reads whatever report is current.
//! A refresh installs a brand-new report wholesale; readers holding the
//! previous `Arc` keep a consistent snapshot, and nothing ever mutates a
//! published report in place.

use std::sync::{Arc, RwLock};

use crate::models::MetadataReport;

/// Thread-safe, atomically swappable reference to the latest scan result.
#[derive(Debug, Default)]
pub struct ScanContext {
    current: RwLock<Option<Arc<MetadataReport>>>,
}

impl ScanContext {
    /// Creates an empty context (no scan yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current report, if a scan has completed.
    pub fn current(&self) -> Option<Arc<MetadataReport>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Installs a new report, replacing any previous one.
    ///
    /// Returns the shared handle so the caller can keep using the report
    /// it just installed without a second lookup.
    pub fn replace(&self, report: MetadataReport) -> Arc<MetadataReport> {
        let report = Arc::new(report);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::clone(&report));
        report
    }

    /// Clears the context (e.g. after disconnecting from a source).
    pub fn clear(&self) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}
