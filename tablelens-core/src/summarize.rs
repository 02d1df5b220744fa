//! Summarizer adapter: metadata in, business-readable text out.
//!
//! The text-generation backend is opaque: anything implementing
//! [`TextBackend`] plugs in. Both operations always return a string:
//! backend failures come back as a tagged error string (see
//! [`SUMMARIZER_ERROR_TAG`]) so a broken backend renders inline instead of
//! taking the caller down.

use async_trait::async_trait;

use crate::Result;
use crate::models::{MetadataReport, TableMetadata};

/// Prefix carried by every failure string the summarizer emits.
pub const SUMMARIZER_ERROR_TAG: &str = "[summarizer error]";

/// Opaque text-generation backend.
///
/// Implementations may take arbitrary latency; callers own any timeout.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Generates text for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Turns metadata records into business-readable text via a [`TextBackend`].
#[derive(Debug, Clone)]
pub struct SummaryEngine<B> {
    backend: B,
}

impl<B: TextBackend> SummaryEngine<B> {
    /// Creates an engine over the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Produces a business-oriented description of one table.
    ///
    /// Never fails: backend errors are rendered as a
    /// `"[summarizer error] ..."` string.
    pub async fn summarize_table(&self, table: &TableMetadata) -> String {
        let prompt = build_table_prompt(table);
        self.relay(&prompt).await
    }

    /// Answers a free-form question grounded in the full schema context.
    ///
    /// Never fails: backend errors are rendered as a
    /// `"[summarizer error] ..."` string.
    pub async fn answer_question(&self, question: &str, report: &MetadataReport) -> String {
        let prompt = build_question_prompt(question, report);
        self.relay(&prompt).await
    }

    async fn relay(&self, prompt: &str) -> String {
        match self.backend.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("text backend failed: {e}");
                format!("{SUMMARIZER_ERROR_TAG} {e}")
            }
        }
    }
}

/// Builds the per-table business-summary prompt.
pub fn build_table_prompt(table: &TableMetadata) -> String {
    let metadata = serde_json::to_string_pretty(table)
        .unwrap_or_else(|_| format!("{{\"name\": \"{}\"}}", table.name));

    format!(
        "You are a senior data architect reviewing one table of a relational \
         database.\n\n\
         Table metadata (schema, sampled rows, quality metrics, numeric \
         statistics):\n{metadata}\n\n\
         Provide, formatted for a dashboard card:\n\
         1. **Business purpose**: a two-line summary of what this table represents.\n\
         2. **Stakeholders**: which teams would use this data.\n\
         3. **Statistical insight**: interpret the mean/std-dev figures, if any.\n\
         4. **Data risk**: one concrete risk suggested by the quality metrics.\n\n\
         Keep it crisp and professional."
    )
}

/// Builds the schema-grounded Q&A prompt.
pub fn build_question_prompt(question: &str, report: &MetadataReport) -> String {
    format!(
        "You are an expert SQL assistant for the '{}' database ({}).\n\n\
         Schema context (all tables, columns, and keys):\n{}\n\n\
         User question: {question}\n\n\
         Instructions:\n\
         - Provide accurate SQL for the target backend.\n\
         - Use JOINs over the listed foreign keys where needed.\n\
         - Explain the logic in two simple sentences.\n\
         - If the question is not about this data, politely decline.",
        report.source.name,
        report.source.backend,
        schema_context(report)
    )
}

/// Renders a compact textual schema context: one line per table.
fn schema_context(report: &MetadataReport) -> String {
    let mut out = String::new();
    for table in &report.tables {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.declared_type))
            .collect();
        out.push_str(&format!("- {} ({})", table.name, columns.join(", ")));
        if !table.primary_key.is_empty() {
            out.push_str(&format!(" pk: {}", table.primary_key.join("+")));
        }
        for fk in &table.foreign_keys {
            out.push_str(&format!(
                " fk: {} -> {}({})",
                fk.columns.join("+"),
                fk.referred_table,
                fk.referred_columns.join("+")
            ));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableLensError;
    use crate::models::{
        BackendKind, ColumnDescriptor, FORMAT_VERSION, ForeignKeyRef, ScanInfo, SourceInfo,
        TypeCategory,
    };

    struct CannedBackend {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl TextBackend for CannedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(TableLensError::summarizer("backend timed out")),
            }
        }
    }

    /// Echoes the prompt back, for asserting prompt contents.
    struct EchoBackend;

    #[async_trait]
    impl TextBackend for EchoBackend {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn fixture_report() -> MetadataReport {
        let mut orders = TableMetadata::new("orders");
        orders.columns = vec![ColumnDescriptor {
            name: "customer_id".to_string(),
            declared_type: "TEXT".to_string(),
            category: TypeCategory::Text,
            nullable: false,
            ordinal: 0,
        }];
        orders.foreign_keys = vec![ForeignKeyRef {
            columns: vec!["customer_id".to_string()],
            referred_table: "customers".to_string(),
            referred_columns: vec!["id".to_string()],
        }];

        MetadataReport {
            format_version: FORMAT_VERSION.to_string(),
            source: SourceInfo {
                name: "shop".to_string(),
                backend: BackendKind::SQLite,
                version: None,
            },
            tables: vec![orders],
            scan: ScanInfo {
                scan_id: uuid::Uuid::new_v4(),
                scanned_at: chrono::Utc::now(),
                duration_ms: 1,
                sample_cap: 1000,
                warnings: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_summarize_table_relays_backend_text() {
        let engine = SummaryEngine::new(CannedBackend {
            reply: Some("Orders placed by customers."),
        });
        let table = TableMetadata::new("orders");

        let summary = engine.summarize_table(&table).await;
        assert_eq!(summary, "Orders placed by customers.");
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_tagged_string() {
        let engine = SummaryEngine::new(CannedBackend { reply: None });
        let table = TableMetadata::new("orders");

        let summary = engine.summarize_table(&table).await;
        assert!(summary.starts_with(SUMMARIZER_ERROR_TAG));
        assert!(summary.contains("timed out"));
    }

    #[tokio::test]
    async fn test_question_failure_becomes_tagged_string() {
        let engine = SummaryEngine::new(CannedBackend { reply: None });
        let report = fixture_report();

        let answer = engine.answer_question("how many orders?", &report).await;
        assert!(answer.starts_with(SUMMARIZER_ERROR_TAG));
    }

    #[tokio::test]
    async fn test_table_prompt_carries_metadata() {
        let engine = SummaryEngine::new(EchoBackend);
        let report = fixture_report();

        let prompt = engine.summarize_table(&report.tables[0]).await;
        assert!(prompt.contains("orders"));
        assert!(prompt.contains("customer_id"));
        assert!(prompt.contains("Business purpose"));
    }

    #[tokio::test]
    async fn test_question_prompt_grounds_in_schema() {
        let engine = SummaryEngine::new(EchoBackend);
        let report = fixture_report();

        let prompt = engine
            .answer_question("join orders to customers", &report)
            .await;
        assert!(prompt.contains("join orders to customers"));
        assert!(prompt.contains("fk: customer_id -> customers(id)"));
        assert!(prompt.contains("SQLite"));
    }

    #[test]
    fn test_schema_context_one_line_per_table() {
        let report = fixture_report();
        let context = schema_context(&report);
        assert_eq!(context.lines().count(), 1);
        assert!(context.contains("- orders (customer_id TEXT)"));
    }
}
