//! Reconciliation engine: match incoming records against the sink's
//! collection, then apply updates, creates and (optionally) deletes.
//!
//! ## Matching
//!
//! Existing records are indexed by natural key before matching. When several
//! existing records share a key, the last one listed wins; every incoming
//! record still lands in exactly one of the update or create sets.
//!
//! ## Failure semantics
//!
//! Listing the existing collection is the baseline; if it fails the pass
//! fails. Every apply call afterwards is best-effort: a failed chunk is
//! logged and counted, and the remaining chunks are still sent.

use crate::config::SinkConfig;
use crate::error::SyncResult;
use crate::sink::{ApplyReport, NetboxClient};
use crate::transport::HttpClient;
use netsync_protocol::{
    display_name, normalize, EntityKind, NaturalKey, Record, UNKNOWN_NAME, UNKNOWN_SLUG,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, info_span, warn};

/// The create / update / delete partition of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Records with no existing counterpart. Never carry an `id`.
    pub create: Vec<Record>,
    /// Records matched to an existing one. Always carry its `id`.
    pub update: Vec<Record>,
    /// Ids of existing records no incoming record matched.
    pub stale: Vec<i64>,
    /// Incoming records whose key matched more than one existing record.
    pub duplicate_keys: usize,
}

fn unknown_site_key() -> NaturalKey {
    NaturalKey::Name(normalize(UNKNOWN_NAME))
}

/// Partitions `incoming` against `existing` by natural key.
///
/// Any `id` carried by an incoming record is discarded first. For sites, a
/// canonical Unknown site is appended to the create set when neither side
/// has one. `stale` is only computed when `track_stale` is set, and never
/// includes the Unknown site.
pub fn plan(
    kind: EntityKind,
    incoming: Vec<Record>,
    existing: &[Record],
    track_stale: bool,
) -> ReconcilePlan {
    let mut index: HashMap<NaturalKey, Vec<i64>> = HashMap::new();
    for record in existing {
        let id = record.get("id").and_then(Value::as_i64);
        if let (Some(key), Some(id)) = (kind.natural_key(record), id) {
            index.entry(key).or_default().push(id);
        }
    }

    let mut result = ReconcilePlan::default();
    let mut matched: HashSet<NaturalKey> = HashSet::new();

    for mut record in incoming {
        record.remove("id");
        let key = kind.natural_key(&record);
        let candidates = key.as_ref().and_then(|key| index.get(key));

        match (key, candidates.and_then(|ids| ids.last().copied())) {
            (Some(key), Some(id)) => {
                if let Some(ids) = candidates.filter(|ids| ids.len() > 1) {
                    warn!(
                        kind = %kind,
                        key = %key,
                        candidates = ids.len(),
                        chosen = id,
                        "natural key matches several existing records, using the last"
                    );
                    result.duplicate_keys += 1;
                }
                record.insert("id".into(), Value::from(id));
                result.update.push(record);
                matched.insert(key);
            }
            _ => result.create.push(record),
        }
    }

    if kind == EntityKind::Site {
        let unknown = unknown_site_key();
        let present = index.contains_key(&unknown)
            || result
                .create
                .iter()
                .any(|r| kind.natural_key(r).as_ref() == Some(&unknown));
        if !present {
            debug!("injecting the Unknown site");
            let mut site = Record::new();
            site.insert("name".into(), Value::String(UNKNOWN_NAME.into()));
            site.insert("slug".into(), Value::String(UNKNOWN_SLUG.into()));
            result.create.push(site);
        }
    }

    if track_stale {
        let protected = (kind == EntityKind::Site).then(unknown_site_key);
        result.stale = index
            .into_iter()
            .filter(|(key, _)| !matched.contains(key) && protected.as_ref() != Some(key))
            .flat_map(|(_, ids)| ids)
            .collect();
        result.stale.sort_unstable();
    }

    result
}

/// Options controlling the apply phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Delete stale sink records.
    pub allow_deletes: bool,
    /// Create with chunked bulk POSTs instead of one POST per record.
    pub bulk_create: bool,
    /// Compute the plan without mutating the sink.
    pub dry_run: bool,
}

impl From<&SinkConfig> for ReconcileOptions {
    fn from(config: &SinkConfig) -> Self {
        Self {
            allow_deletes: config.allow_deletes,
            bulk_create: config.bulk_create,
            dry_run: false,
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Entity kind reconciled.
    pub kind: EntityKind,
    /// Records sent for creation, with sink ids where the sink echoed them.
    pub created: Vec<Record>,
    /// Records sent for update, each with its matched `id`.
    pub updated: Vec<Record>,
    /// Ids sent for deletion.
    pub deleted: Vec<i64>,
    /// Incoming records that matched several existing records.
    pub duplicate_keys: usize,
    /// Whether the sink was left untouched.
    pub dry_run: bool,
    /// Apply report of the update phase.
    pub updates: ApplyReport,
    /// Apply report of the create phase.
    pub creates: ApplyReport,
    /// Apply report of the delete phase.
    pub deletes: ApplyReport,
}

impl ReconcileOutcome {
    /// Records carried by failed apply calls.
    pub fn failed(&self) -> usize {
        self.updates.failed_records + self.creates.failed_records + self.deletes.failed_records
    }

    /// Returns true if every apply call succeeded.
    pub fn is_clean(&self) -> bool {
        self.updates.is_clean() && self.creates.is_clean() && self.deletes.is_clean()
    }
}

/// Runs reconciliation passes against one sink.
pub struct Reconciler<'a, C: HttpClient> {
    sink: &'a NetboxClient<C>,
    options: ReconcileOptions,
}

impl<'a, C: HttpClient> Reconciler<'a, C> {
    /// Creates a reconciler with options taken from the sink configuration.
    pub fn new(sink: &'a NetboxClient<C>) -> Self {
        Self {
            sink,
            options: ReconcileOptions::from(sink.config()),
        }
    }

    /// Overrides the options.
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the options in effect.
    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Reconciles `incoming` into the sink collection for `kind`.
    ///
    /// Only a failure to list the existing collection is returned as an
    /// error; apply failures are reported in the outcome.
    pub fn reconcile(&self, kind: EntityKind, incoming: Vec<Record>) -> SyncResult<ReconcileOutcome> {
        let span = info_span!("reconcile", kind = %kind);
        let _enter = span.enter();

        let existing = self.sink.list(kind)?;
        let ReconcilePlan {
            mut create,
            update,
            stale,
            duplicate_keys,
        } = plan(kind, incoming, &existing, self.options.allow_deletes);

        info!(
            existing = existing.len(),
            update = update.len(),
            create = create.len(),
            stale = stale.len(),
            dry_run = self.options.dry_run,
            "reconciliation plan"
        );

        let mut outcome = ReconcileOutcome {
            kind,
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            duplicate_keys,
            dry_run: self.options.dry_run,
            updates: ApplyReport::default(),
            creates: ApplyReport::default(),
            deletes: ApplyReport::default(),
        };

        if self.options.dry_run {
            outcome.created = create;
            outcome.updated = update;
            if self.options.allow_deletes {
                outcome.deleted = stale;
            }
            return Ok(outcome);
        }

        if !update.is_empty() {
            outcome.updates = self.sink.bulk_update(kind, &update);
            for record in &update {
                debug!(record = %display_name(record), "updated");
            }
            info!(count = update.len(), failed = outcome.updates.failed_records, "updated records");
        }

        if !create.is_empty() {
            outcome.creates = if self.options.bulk_create {
                self.sink.bulk_create(kind, &create)
            } else {
                self.sink.create_each(kind, &create)
            };
            for (record, id) in create.iter_mut().zip(&outcome.creates.ids) {
                if let Some(id) = id {
                    record.insert("id".into(), Value::from(*id));
                    info!(record = %display_name(record), id, "added");
                }
            }
            info!(count = create.len(), failed = outcome.creates.failed_records, "created records");
        }

        if self.options.allow_deletes && !stale.is_empty() {
            outcome.deletes = self.sink.bulk_delete(kind, &stale);
            info!(count = stale.len(), failed = outcome.deletes.failed_records, "deleted stale records");
        }

        outcome.created = create;
        outcome.updated = update;
        outcome.deleted = stale;
        if !outcome.is_clean() {
            warn!(failed = outcome.failed(), "reconciliation finished with failures");
        }
        Ok(outcome)
    }
}
