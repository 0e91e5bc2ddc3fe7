//! The keyed replica of live price levels plus book-level summary fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::anomaly::AnomalyReport;
use super::types::{Entry, EntryKey, Fields, MutationKind, MutationRecord};

/// Handling of an `Update` that names a key the replica does not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownUpdatePolicy {
    /// Insert the entry as if the record were an `Add`.
    #[default]
    ImplicitAdd,
    /// Leave the replica untouched and count the record.
    Reject,
}

/// What applying one mutation did to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AppliedEffect {
    /// `Add` created a new entry.
    Inserted,
    /// `Add` overwrote an existing entry.
    Replaced,
    /// `Update` replaced the fields of an existing entry.
    Updated,
    /// `Update` for an unknown key created the entry.
    ImplicitInsert,
    /// `Delete` removed the entry.
    Removed,
    /// `Delete` for a key that was already absent.
    AlreadyAbsent,
    /// `Update` for an unknown key under [`UnknownUpdatePolicy::Reject`].
    RejectedUnknown,
    /// The record lacked the fields its kind requires.
    Malformed,
}

impl AppliedEffect {
    /// Whether the store accepted the record.
    pub fn is_applied(&self) -> bool {
        !matches!(
            self,
            AppliedEffect::RejectedUnknown | AppliedEffect::Malformed
        )
    }

    /// Whether the record was counted as an anomaly.
    pub fn is_anomaly(&self) -> bool {
        !matches!(
            self,
            AppliedEffect::Inserted | AppliedEffect::Updated | AppliedEffect::Removed
        )
    }
}

/// Read-only copy of the replica taken by [`ReplicaStore::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSnapshot {
    pub entries: HashMap<EntryKey, Entry>,
    pub summary: Fields,
    /// Whether anything was applied since the previous snapshot.
    pub dirty: bool,
}

/// Owns the entry map, the summary fields and the dirty flag.
#[derive(Debug)]
pub struct ReplicaStore {
    entries: HashMap<EntryKey, Entry>,
    summary: Fields,
    dirty: bool,
    policy: UnknownUpdatePolicy,
    anomalies: AnomalyReport,
}

impl ReplicaStore {
    pub fn new(policy: UnknownUpdatePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            summary: Fields::new(),
            dirty: false,
            policy,
            anomalies: AnomalyReport::default(),
        }
    }

    /// Applies one mutation record.
    pub fn apply(&mut self, record: MutationRecord) -> AppliedEffect {
        self.apply_mutation(record.key, record.kind, record.fields)
    }

    /// Applies one add/update/delete to the entry named by `key`.
    ///
    /// Never fails: duplicate adds, unknown-key updates and deletes, and
    /// records missing their fields are corrected or skipped and counted.
    pub fn apply_mutation(
        &mut self,
        key: EntryKey,
        kind: MutationKind,
        fields: Option<Fields>,
    ) -> AppliedEffect {
        let effect = match (kind, fields) {
            (MutationKind::Delete, _) => {
                if self.entries.remove(&key).is_some() {
                    AppliedEffect::Removed
                } else {
                    self.anomalies.unknown_deletes += 1;
                    debug!(key = %key, "Delete for absent key");
                    AppliedEffect::AlreadyAbsent
                }
            }
            (_, None) => {
                self.anomalies.malformed += 1;
                warn!(key = %key, kind = %kind, "Mutation without fields rejected");
                return AppliedEffect::Malformed;
            }
            (MutationKind::Add, Some(fields)) => {
                let previous = self.entries.insert(key.clone(), Entry { key: key.clone(), fields });
                if previous.is_some() {
                    self.anomalies.duplicate_adds += 1;
                    debug!(key = %key, "Add for existing key, entry overwritten");
                    AppliedEffect::Replaced
                } else {
                    AppliedEffect::Inserted
                }
            }
            (MutationKind::Update, Some(fields)) => {
                if let Some(entry) = self.entries.get_mut(&key) {
                    entry.fields = fields;
                    AppliedEffect::Updated
                } else {
                    self.anomalies.unknown_updates += 1;
                    match self.policy {
                        UnknownUpdatePolicy::ImplicitAdd => {
                            debug!(key = %key, "Update for unknown key applied as add");
                            self.entries.insert(key.clone(), Entry { key, fields });
                            AppliedEffect::ImplicitInsert
                        }
                        UnknownUpdatePolicy::Reject => {
                            warn!(key = %key, "Update for unknown key rejected");
                            return AppliedEffect::RejectedUnknown;
                        }
                    }
                }
            }
        };

        self.dirty = true;
        effect
    }

    /// Overwrites each incoming summary field; fields not present in
    /// `fields` keep their previous value.
    pub fn merge_summary(&mut self, fields: Fields) {
        for (name, value) in fields {
            self.summary.insert(name, value);
        }
        self.dirty = true;
    }

    /// Copies the replica and clears the dirty flag in one step.
    pub fn snapshot(&mut self) -> ReplicaSnapshot {
        let dirty = std::mem::replace(&mut self.dirty, false);
        ReplicaSnapshot {
            entries: self.entries.clone(),
            summary: self.summary.clone(),
            dirty,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn summary(&self) -> &Fields {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn policy(&self) -> UnknownUpdatePolicy {
        self.policy
    }

    /// Anomalies detected while applying records.
    pub fn anomalies(&self) -> AnomalyReport {
        self.anomalies
    }
}

impl Default for ReplicaStore {
    fn default() -> Self {
        Self::new(UnknownUpdatePolicy::default())
    }
}
