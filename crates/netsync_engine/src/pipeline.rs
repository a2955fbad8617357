//! Per-kind sync pass: fetch → reference maps → adapt → reconcile.

use crate::adapt::{
    adapt_device_types, adapt_devices, adapt_interfaces, adapt_manufacturers, adapt_roles,
    adapt_sites, adapt_virtual_chassis, adapt_virtual_device_contexts, Adapted, Unresolved,
};
use crate::error::SyncResult;
use crate::reconcile::{ReconcileOptions, ReconcileOutcome, Reconciler};
use crate::sink::NetboxClient;
use crate::source::{Fetched, ForwardClient};
use crate::transport::HttpClient;
use netsync_protocol::{EntityKind, Record};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

/// Result of one pass over an entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// Entity kind processed.
    pub kind: EntityKind,
    /// Records fetched from the source.
    pub fetched: usize,
    /// Whether the source returned its full result set.
    pub complete: bool,
    /// Records left after adaptation.
    pub adapted: usize,
    /// References the adapters could not resolve.
    pub unresolved: Vec<Unresolved>,
    /// Reconciliation result.
    pub outcome: ReconcileOutcome,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl PassReport {
    /// Returns true if no apply call failed.
    pub fn is_clean(&self) -> bool {
        self.outcome.is_clean()
    }
}

/// Sorts `kinds` into dependency order and removes duplicates.
///
/// Referenced collections come first: sites, manufacturers, device roles,
/// device types, devices, virtual device contexts, virtual chassis,
/// interfaces.
pub fn ordered(kinds: &[EntityKind]) -> Vec<EntityKind> {
    let mut kinds = kinds.to_vec();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Chains the source, the adapters and the reconciliation engine.
pub struct SyncPipeline<S: HttpClient, K: HttpClient> {
    source: ForwardClient<S>,
    sink: NetboxClient<K>,
    options: ReconcileOptions,
}

impl<S: HttpClient, K: HttpClient> SyncPipeline<S, K> {
    /// Creates a pipeline; apply options come from the sink configuration.
    pub fn new(source: ForwardClient<S>, sink: NetboxClient<K>) -> Self {
        let options = ReconcileOptions::from(sink.config());
        Self {
            source,
            sink,
            options,
        }
    }

    /// Computes plans only; the sink is never mutated.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    /// Returns the apply options.
    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Returns the source client.
    pub fn source(&self) -> &ForwardClient<S> {
        &self.source
    }

    /// Returns the sink client.
    pub fn sink(&self) -> &NetboxClient<K> {
        &self.sink
    }

    /// Runs one pass for `kind`.
    ///
    /// Stale records are never deleted when the source stopped before the
    /// end of its result set.
    pub fn run_kind(&self, kind: EntityKind) -> SyncResult<PassReport> {
        let span = info_span!("pass", kind = %kind);
        let _enter = span.enter();
        let start = Instant::now();

        let Fetched {
            records: raw,
            complete,
        } = self.source.fetch(kind)?;
        let fetched = raw.len();
        info!(fetched, complete, "fetched from source");

        let mut options = self.options;
        if !complete && options.allow_deletes {
            warn!(fetched, "source results are incomplete, skipping deletes");
            options.allow_deletes = false;
        }

        let Adapted {
            records,
            unresolved,
        } = self.adapt(kind, raw)?;
        let adapted = records.len();

        let outcome = Reconciler::new(&self.sink)
            .with_options(options)
            .reconcile(kind, records)?;

        let report = PassReport {
            kind,
            fetched,
            complete,
            adapted,
            unresolved,
            outcome,
            duration: start.elapsed(),
        };
        info!(
            created = report.outcome.created.len(),
            updated = report.outcome.updated.len(),
            deleted = report.outcome.deleted.len(),
            failed = report.outcome.failed(),
            elapsed_ms = report.duration.as_millis() as u64,
            "pass complete"
        );
        Ok(report)
    }

    /// Runs every kind in dependency order. A failed pass does not stop the next one.
    pub fn run(&self, kinds: &[EntityKind]) -> Vec<(EntityKind, SyncResult<PassReport>)> {
        self.run_each(kinds, |_, pass| pass())
    }

    /// Like [`run`](Self::run), but each pass is invoked through `scope`,
    /// which receives the kind and the pass to call.
    pub fn run_each<F>(
        &self,
        kinds: &[EntityKind],
        mut scope: F,
    ) -> Vec<(EntityKind, SyncResult<PassReport>)>
    where
        F: FnMut(EntityKind, &dyn Fn() -> SyncResult<PassReport>) -> SyncResult<PassReport>,
    {
        ordered(kinds)
            .into_iter()
            .map(|kind| {
                let result = scope(kind, &|| self.run_kind(kind));
                if let Err(e) = &result {
                    error!(kind = %kind, error = %e, "pass failed");
                }
                (kind, result)
            })
            .collect()
    }

    fn adapt(&self, kind: EntityKind, raw: Vec<Record>) -> SyncResult<Adapted> {
        Ok(match kind {
            EntityKind::Site => adapt_sites(raw),
            EntityKind::Manufacturer => adapt_manufacturers(raw),
            EntityKind::DeviceRole => adapt_roles(raw),
            EntityKind::DeviceType => adapt_device_types(raw, &self.sink.manufacturer_map()?),
            EntityKind::Device => adapt_devices(
                raw,
                &self.sink.device_type_map()?,
                &self.sink.site_map()?,
                &self.sink.role_map()?,
                self.sink.config().default_device_role.as_deref(),
            ),
            EntityKind::VirtualDeviceContext => {
                adapt_virtual_device_contexts(raw, &self.sink.device_map()?)
            }
            EntityKind::VirtualChassis => adapt_virtual_chassis(raw),
            EntityKind::Interface => adapt_interfaces(raw, &self.sink.device_map()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_run_in_dependency_order() {
        let kinds = ordered(&[
            EntityKind::Interface,
            EntityKind::Device,
            EntityKind::Site,
            EntityKind::Device,
            EntityKind::VirtualChassis,
            EntityKind::VirtualDeviceContext,
            EntityKind::DeviceType,
        ]);
        assert_eq!(
            kinds,
            vec![
                EntityKind::Site,
                EntityKind::DeviceType,
                EntityKind::Device,
                EntityKind::VirtualDeviceContext,
                EntityKind::VirtualChassis,
                EntityKind::Interface,
            ]
        );
        assert_eq!(ordered(&EntityKind::ALL), EntityKind::ALL.to_vec());
    }
}
