//! Generic enumeration engine

use super::traits::{EnumerationAdapter, ResourceProbe};
use crate::error::Result;
use log::{debug, warn};
use std::collections::HashMap;

/// Outcome counters for one update cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Instances created this cycle
    pub added: usize,
    /// Instances dropped because their identity disappeared
    pub removed: usize,
    /// Instances refreshed in place
    pub updated: usize,
    /// Instances whose refresh failed (kept, left as they were)
    pub failed: usize,
    /// Newly observed records refused by the acceptance filter
    pub rejected: usize,
    /// Snapshot records ignored because an earlier record had the same identity
    pub duplicates: usize,
    /// Existing instances without a matching record (refresh path only)
    pub unmatched: usize,
}

impl SyncSummary {
    /// Whether set membership changed
    pub fn membership_changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

struct Entry<I> {
    id: String,
    instance: Box<I>,
}

/// Ordered, identity-keyed set of instances synchronized against a probe.
///
/// Not safe for concurrent mutation; callers serialize `init`/`update`.
pub struct EntityEnumeration<A, P>
where
    A: EnumerationAdapter,
    P: ResourceProbe<Record = A::Record>,
{
    adapter: A,
    probe: P,
    entries: Vec<Entry<A::Instance>>,
    cycles: u64,
}

impl<A, P> EntityEnumeration<A, P>
where
    A: EnumerationAdapter,
    P: ResourceProbe<Record = A::Record>,
{
    /// Create an empty enumeration; call [`init`](Self::init) before use
    pub fn new(adapter: A, probe: P) -> Self {
        Self {
            adapter,
            probe,
            entries: Vec::new(),
            cycles: 0,
        }
    }

    /// Populate the set with one full synchronization
    pub fn init(&mut self) -> Result<SyncSummary> {
        if !self.entries.is_empty() {
            warn!(
                "init called on an enumeration holding {} instances, resynchronizing",
                self.entries.len()
            );
        }
        self.synchronize()
    }

    /// Run the cheap refresh path (`true`) or a full synchronization (`false`)
    pub fn update(&mut self, update_instances: bool) -> Result<SyncSummary> {
        if update_instances {
            self.refresh_instances()
        } else {
            self.synchronize()
        }
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of completed update cycles (full or cheap)
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instance at a position in insertion order
    pub fn get(&self, index: usize) -> Option<&A::Instance> {
        self.entries.get(index).map(|e| e.instance.as_ref())
    }

    /// Instance with the given identity
    pub fn get_by_id(&self, id: &str) -> Option<&A::Instance> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.instance.as_ref())
    }

    /// Mutable access to the instance with the given identity
    pub fn get_mut_by_id(&mut self, id: &str) -> Option<&mut A::Instance> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| e.instance.as_mut())
    }

    /// Whether an instance with the given identity exists
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Identities in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// `(identity, instance)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &A::Instance)> {
        self.entries
            .iter()
            .map(|e| (e.id.as_str(), e.instance.as_ref()))
    }

    /// Instances in insertion order
    pub fn instances(&self) -> impl Iterator<Item = &A::Instance> {
        self.entries.iter().map(|e| e.instance.as_ref())
    }

    /// Domain adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Resource probe
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Make the set correspond to the latest snapshot.
    ///
    /// Nothing is mutated until the probe has returned a snapshot.
    fn synchronize(&mut self) -> Result<SyncSummary> {
        let snapshot = self.take_snapshot()?;
        let mut summary = SyncSummary::default();

        let ids: Vec<String> = snapshot.iter().map(|r| self.adapter.identity(r)).collect();
        let mut index = build_index(&ids, &mut summary);

        // Reverse insertion order; removals are applied after the walk.
        let mut keep = vec![true; self.entries.len()];
        for (pos, entry) in self.entries.iter_mut().enumerate().rev() {
            match index.remove(entry.id.as_str()) {
                Some(rec) => {
                    match self.adapter.refresh(&mut entry.instance, &snapshot[rec]) {
                        Ok(()) => summary.updated += 1,
                        Err(e) => {
                            warn!("Failed to refresh {}: {}", entry.id, e);
                            summary.failed += 1;
                        }
                    }
                }
                None => {
                    debug!("Removing {}", entry.id);
                    keep[pos] = false;
                    summary.removed += 1;
                }
            }
        }
        let mut flags = keep.into_iter();
        self.entries.retain(|_| flags.next().unwrap_or(true));

        // Identities left in the index are new this cycle; admit them in
        // snapshot order.
        for (pos, id) in ids.iter().enumerate() {
            if index.get(id.as_str()) != Some(&pos) {
                continue;
            }
            let record = &snapshot[pos];
            if self.adapter.accept(record) {
                debug!("Adding {}", id);
                self.entries.push(Entry {
                    id: id.clone(),
                    instance: Box::new(self.adapter.create(record)),
                });
                summary.added += 1;
            } else {
                debug!("Filtered out {}", id);
                summary.rejected += 1;
            }
        }

        self.cycles += 1;
        debug!(
            "Full sync #{}: {} instances (+{} -{} ~{} !{})",
            self.cycles,
            self.entries.len(),
            summary.added,
            summary.removed,
            summary.updated,
            summary.failed
        );
        Ok(summary)
    }

    /// Refresh existing instances without touching membership
    fn refresh_instances(&mut self) -> Result<SyncSummary> {
        let snapshot = self.take_snapshot()?;
        let mut summary = SyncSummary::default();

        let ids: Vec<String> = snapshot.iter().map(|r| self.adapter.identity(r)).collect();
        let index = build_index(&ids, &mut summary);

        for entry in self.entries.iter_mut() {
            let Some(&rec) = index.get(entry.id.as_str()) else {
                summary.unmatched += 1;
                continue;
            };
            match self.adapter.refresh(&mut entry.instance, &snapshot[rec]) {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    warn!("Failed to refresh {}: {}", entry.id, e);
                    summary.failed += 1;
                }
            }
        }

        self.cycles += 1;
        debug!(
            "Instance refresh #{}: {} refreshed, {} failed, {} unmatched",
            self.cycles, summary.updated, summary.failed, summary.unmatched
        );
        Ok(summary)
    }

    fn take_snapshot(&self) -> Result<Vec<A::Record>> {
        self.probe.probe().map_err(|e| {
            warn!("Discovery failed, keeping {} instances: {}", self.entries.len(), e);
            e
        })
    }
}

/// Identity -> snapshot position; the first record seen for an identity wins.
fn build_index<'a>(ids: &'a [String], summary: &mut SyncSummary) -> HashMap<&'a str, usize> {
    let mut index = HashMap::with_capacity(ids.len());
    for (pos, id) in ids.iter().enumerate() {
        if index.contains_key(id.as_str()) {
            debug!("Duplicate identity {} at position {}, ignored", id, pos);
            summary.duplicates += 1;
        } else {
            index.insert(id.as_str(), pos);
        }
    }
    index
}
