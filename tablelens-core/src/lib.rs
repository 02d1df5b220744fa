//! Core engine for tablelens: schema introspection, bounded data sampling,
//! quality profiling, and metadata assembly.
//!
//! A scan runs introspect → sample → profile → assemble over every table of
//! a relational data source and produces an immutable [`MetadataReport`],
//! the stable contract consumed by the dashboard and by prompt
//! construction. Failures are isolated per table: one unreadable table
//! degrades its own record, never the scan.
//!
//! # Architecture
//! - Object-safe [`introspect::SchemaIntrospector`] adapters per backend,
//!   created from the connection string by a factory
//! - Pure profiling functions (deterministic for a fixed sample)
//! - Stateless scan engine; callers own the swappable
//!   [`context::ScanContext`]
//! - Summarization behind an opaque [`summarize::TextBackend`] trait

pub mod context;
pub mod error;
pub mod export;
pub mod introspect;
pub mod logging;
pub mod models;
pub mod profile;
pub mod scan;
pub mod summarize;

// Re-export commonly used types
pub use context::ScanContext;
pub use error::{Result, TableLensError, redact_database_url};
pub use introspect::{SchemaIntrospector, create_introspector, detect_backend};
pub use logging::init_logging;
pub use models::{
    BackendKind, ColumnDescriptor, ColumnStats, ForeignKeyRef, MetadataReport, QualityMetrics,
    ScanInfo, SourceInfo, TableMetadata, TypeCategory,
};
pub use scan::{DEFAULT_SAMPLE_CAP, ScanOptions, scan};
pub use summarize::{SUMMARIZER_ERROR_TAG, SummaryEngine, TextBackend};
