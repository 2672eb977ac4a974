//! Signature registries.
//!
//! A [`Registry`] is an insertion-ordered set of signatures keyed by slot.
//! Registering a signature whose slot is already present replaces it in
//! place. Every mutation draws a fresh stamp from a process-wide counter, so
//! versions from different registries can be compared with `max`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::signature::{Signature, SlotKey};

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);
static NEXT_SOURCE: AtomicU64 = AtomicU64::new(1);

/// Draw a fresh version stamp.
pub(crate) fn next_stamp() -> u64 {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// Identity of the registry that contributed a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceId(u64);

impl SourceId {
    fn fresh() -> Self {
        SourceId(NEXT_SOURCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Not yet registered anywhere.
    pub fn is_anonymous(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src{}", self.0)
    }
}

/// Result of [`Registry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    Replaced,
}

pub(crate) type Slots = IndexMap<SlotKey, Arc<Signature>>;

/// Insert into a slot map. An existing slot keeps its index.
pub(crate) fn insert_slot(slots: &mut Slots, signature: Arc<Signature>) -> Registration {
    match slots.insert(signature.slot_key(), signature) {
        Some(_) => Registration::Replaced,
        None => Registration::Added,
    }
}

/// The signatures of one operation, or a reusable partial set of them.
#[derive(Debug, Clone)]
pub struct Registry {
    name: String,
    source: SourceId,
    slots: Slots,
    version: u64,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SourceId::fresh(),
            slots: IndexMap::new(),
            version: next_stamp(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Arc<Signature>> {
        self.slots.values()
    }

    /// Add a signature, replacing any signature in the same slot.
    pub fn register(&mut self, signature: Signature) -> Registration {
        let signature = if signature.source().is_anonymous() {
            signature.with_source(self.source)
        } else {
            signature
        };
        let label = signature.label().to_string();
        let outcome = insert_slot(&mut self.slots, Arc::new(signature));
        self.touch();
        debug!(
            registry = %self.name,
            %label,
            ?outcome,
            version = self.version,
            "registered signature"
        );
        outcome
    }

    /// Union in the signatures of other registries. The last registry to
    /// supply a slot wins.
    pub fn merge(&mut self, others: &[&Registry]) {
        for other in others {
            for signature in other.slots.values() {
                insert_slot(&mut self.slots, Arc::clone(signature));
            }
            debug!(
                registry = %self.name,
                from = %other.name,
                count = other.len(),
                "merged registry"
            );
        }
        self.touch();
    }

    /// Remove every signature with the given label.
    pub fn unregister(&mut self, label: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|_, s| s.label() != label);
        let removed = self.slots.len() != before;
        if removed {
            self.touch();
            debug!(registry = %self.name, %label, version = self.version, "unregistered signature");
        }
        removed
    }

    /// Advance the version without changing the contents.
    pub(crate) fn touch(&mut self) {
        self.version = next_stamp();
    }

    /// Immutable view of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            signatures: self.slots.values().cloned().collect(),
        }
    }
}

/// Read-only view of a registry at one version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    signatures: Arc<[Arc<Signature>]>,
}

impl Snapshot {
    pub(crate) fn new(version: u64, signatures: Arc<[Arc<Signature>]>) -> Self {
        Self {
            version,
            signatures,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn signatures(&self) -> &[Arc<Signature>] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
