//! Sync command implementation.

use crate::config_file::FileConfig;
use crate::logging;
use netsync_engine::{
    ordered, ForwardClient, NetboxClient, PassReport, ReqwestClient, SyncPipeline, SyncResult,
};
use netsync_protocol::EntityKind;
use std::fmt::{self, Write as _};
use std::path::Path;
use tracing::info;

/// One line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// Entity kind.
    pub kind: EntityKind,
    /// Records fetched from the source.
    pub fetched: usize,
    /// Records created (or planned for creation).
    pub created: usize,
    /// Records updated (or planned for update).
    pub updated: usize,
    /// Records deleted (or planned for deletion).
    pub deleted: usize,
    /// Records carried by failed apply calls.
    pub failed: usize,
    /// Unresolved references.
    pub unresolved: usize,
    /// Error that aborted the pass.
    pub error: Option<String>,
}

impl SummaryRow {
    /// Builds a row from a pass result.
    pub fn from_result(kind: EntityKind, result: &SyncResult<PassReport>) -> Self {
        match result {
            Ok(report) => Self {
                kind,
                fetched: report.fetched,
                created: report.outcome.created.len(),
                updated: report.outcome.updated.len(),
                deleted: report.outcome.deleted.len(),
                failed: report.outcome.failed(),
                unresolved: report.unresolved.len(),
                error: None,
            },
            Err(e) => Self {
                kind,
                fetched: 0,
                created: 0,
                updated: 0,
                deleted: 0,
                failed: 0,
                unresolved: 0,
                error: Some(e.to_string()),
            },
        }
    }

    /// Returns true if the pass aborted or an apply call failed.
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.failed > 0
    }
}

/// Renders the summary table.
pub fn render_summary(rows: &[SummaryRow], dry_run: bool) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "{:<26}{:>9}{:>9}{:>9}{:>9}{:>9}{:>12}",
        "Kind", "Fetched", "Created", "Updated", "Deleted", "Failed", "Unresolved"
    )?;
    for row in rows {
        match &row.error {
            Some(error) => writeln!(out, "{:<26}  error: {}", row.kind.as_str(), error)?,
            None => writeln!(
                out,
                "{:<26}{:>9}{:>9}{:>9}{:>9}{:>9}{:>12}",
                row.kind.as_str(),
                row.fetched,
                row.created,
                row.updated,
                row.deleted,
                row.failed,
                row.unresolved
            )?,
        }
    }
    if dry_run {
        writeln!(out, "(dry run - no changes were made)")?;
    }
    Ok(out)
}

/// Runs the sync command.
pub fn run(
    config_path: &Path,
    only: &[EntityKind],
    dry_run: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = FileConfig::load(config_path)?;
    let debug = verbose || config.debug;
    logging::init(debug);

    let kinds = if only.is_empty() {
        config.enabled_kinds()
    } else {
        ordered(only)
    };
    if kinds.is_empty() {
        println!("No entity kinds enabled; set add_* flags in {} or pass --only", config_path.display());
        return Ok(());
    }

    let source_config = config.source_config()?;
    let sink_config = config.sink_config()?;
    let source_http = ReqwestClient::new(source_config.timeout, source_config.verify_tls)?;
    let sink_http = ReqwestClient::new(sink_config.timeout, sink_config.verify_tls)?;
    let pipeline = SyncPipeline::new(
        ForwardClient::new(source_config, source_http),
        NetboxClient::new(sink_config, sink_http),
    )
    .with_dry_run(dry_run);

    let rows: Vec<_> = pipeline
        .run_each(&kinds, |kind, pass| {
            info!("========> Updating NetBox {}...", kind.label());
            logging::scoped(config.log_dir.as_deref(), debug, kind, pass)
        })
        .iter()
        .map(|(kind, result)| SummaryRow::from_result(*kind, result))
        .collect();

    println!();
    print!("{}", render_summary(&rows, dry_run)?);

    let failed: Vec<_> = rows
        .iter()
        .filter(|row| row.is_failure())
        .map(|row| row.kind.as_str())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("sync failed for: {}", failed.join(", ")).into())
    }
}
