//! Resolution chains.
//!
//! For one observed [`TypeSignature`], the chain lists every bound-matching
//! signature in try order. It is stored as a sequence of [`Group`]s: priority
//! classes, highest first, each split into the topological layers of the
//! "more specific than" relation. Selection walks the groups in order.
//!
//! # Group kinds
//!
//! - [`GroupKind::Single`]: one plain member, always selects.
//! - [`GroupKind::Guarded`]: guards decide. Exactly one acceptance selects,
//!   none falls through, more than one is a runtime ambiguity. When every
//!   guarded member is an equality test on the same argument with disjoint
//!   values, the group answers with one hash lookup instead.
//! - [`GroupKind::Ambiguous`]: two or more plain members that nothing
//!   orders. Reaching it is a static ambiguity.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{Candidate, DispatchError};
use crate::order::Relation;
use crate::shape::{BoundArgs, TypeSignature};
use crate::signature::{ArgPosition, Signature};
use crate::types::Value;

/// How a group selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Single,
    Guarded,
    Ambiguous,
}

/// Equality lookup for a guarded group.
#[derive(Debug, Clone)]
struct KeyIndex {
    position: ArgPosition,
    /// Accepted value to member index.
    keys: FxHashMap<Value, usize>,
    /// The group's plain member, which accepts every value.
    plain: Option<usize>,
}

impl KeyIndex {
    /// Index `members` if every dependent one tests equality at one shared
    /// position and no value is claimed twice.
    fn build(members: &[Arc<Signature>], types: &TypeSignature) -> Option<Self> {
        let mut position: Option<ArgPosition> = None;
        let mut keys = FxHashMap::default();
        let mut plain = None;
        let mut keyed = 0;

        for (index, sig) in members.iter().enumerate() {
            let mut dependent = sig.patterns_for(types).filter(|(_, p)| p.is_dependent());
            let Some((at, pattern)) = dependent.next() else {
                plain = Some(index);
                continue;
            };
            if dependent.next().is_some() || position.as_ref().is_some_and(|p| *p != at) {
                return None;
            }
            for value in pattern.literal_keys()? {
                if keys.insert(value.clone(), index).is_some() {
                    return None;
                }
            }
            position = Some(at);
            keyed += 1;
        }

        if keyed < 2 {
            return None;
        }
        Some(Self {
            position: position?,
            keys,
            plain,
        })
    }

    fn accepted<'g>(
        &self,
        members: &'g [Arc<Signature>],
        args: &BoundArgs,
    ) -> Vec<&'g Arc<Signature>> {
        let hit = args
            .get(&self.position)
            .and_then(|value| self.keys.get(value))
            .copied();
        let mut indices: Vec<usize> = hit.into_iter().chain(self.plain).collect();
        indices.sort_unstable();
        indices.into_iter().map(|index| &members[index]).collect()
    }
}

/// Candidates that share a priority and a specificity layer.
#[derive(Debug, Clone)]
pub struct Group {
    priority: i32,
    kind: GroupKind,
    members: Vec<Arc<Signature>>,
    index: Option<KeyIndex>,
}

impl Group {
    fn new(priority: i32, members: Vec<Arc<Signature>>, types: &TypeSignature) -> Self {
        let plain = members.iter().filter(|s| !s.is_dependent_for(types)).count();
        let kind = if plain >= 2 {
            GroupKind::Ambiguous
        } else if plain < members.len() {
            GroupKind::Guarded
        } else {
            GroupKind::Single
        };
        let index = match kind {
            GroupKind::Guarded => KeyIndex::build(&members, types),
            _ => None,
        };
        Self {
            priority,
            kind,
            members,
            index,
        }
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn members(&self) -> &[Arc<Signature>] {
        &self.members
    }

    /// Whether the group selects by value lookup rather than by running guards.
    pub fn is_keyed(&self) -> bool {
        self.index.is_some()
    }

    fn accepted(
        &self,
        operation: &str,
        args: &BoundArgs,
        types: &TypeSignature,
    ) -> Vec<&Arc<Signature>> {
        if let Some(index) = &self.index {
            let accepted = index.accepted(&self.members, args);
            trace!(operation, hits = accepted.len(), "looked up guard keys");
            return accepted;
        }
        self.members
            .iter()
            .filter(|s| {
                let ok = s.accepts_typed(args, types);
                trace!(operation, label = s.label(), accepted = ok, "evaluated guard");
                ok
            })
            .collect()
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.members.iter().map(|s| Candidate::of(s)).collect()
    }
}

/// The signature picked by [`ResolutionChain::select`].
#[derive(Debug, Clone)]
pub struct Selection {
    pub group: usize,
    pub signature: Arc<Signature>,
}

/// Ordered candidates for one observed type signature.
#[derive(Debug, Clone)]
pub struct ResolutionChain {
    operation: Arc<str>,
    types: TypeSignature,
    groups: Vec<Group>,
}

impl ResolutionChain {
    /// Filter `signatures` to those whose bound matches `types` and order them.
    pub fn build(
        operation: &str,
        signatures: &[Arc<Signature>],
        types: &TypeSignature,
    ) -> Self {
        let mut classes: BTreeMap<Reverse<i32>, Vec<Arc<Signature>>> = BTreeMap::new();
        for sig in signatures {
            if sig.mismatch(types).is_none() {
                classes
                    .entry(Reverse(sig.priority()))
                    .or_default()
                    .push(Arc::clone(sig));
            }
        }

        let mut groups = Vec::new();
        for (Reverse(priority), members) in classes {
            for layer in layers(&members, types) {
                let group = Group::new(priority, layer, types);
                if group.kind == GroupKind::Ambiguous {
                    warn!(
                        operation,
                        types = %types,
                        priority,
                        candidates = ?group
                            .members
                            .iter()
                            .map(|s| s.label())
                            .collect::<Vec<_>>(),
                        "statically ambiguous candidates"
                    );
                }
                groups.push(group);
            }
        }

        debug!(operation, types = %types, groups = groups.len(), "built resolution chain");
        Self {
            operation: Arc::from(operation),
            types: types.clone(),
            groups,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn types(&self) -> &TypeSignature {
        &self.types
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Every candidate in try order.
    pub fn signatures(&self) -> impl Iterator<Item = &Arc<Signature>> {
        self.groups.iter().flat_map(|g| g.members.iter())
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Index of the group holding the signature with the given label.
    pub fn rank_of(&self, label: &str) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.members.iter().any(|s| s.label() == label))
    }

    /// A static ambiguity reached before any guard can run.
    pub(crate) fn leading_ambiguity(&self) -> Option<DispatchError> {
        match self.groups.first() {
            Some(group) if group.kind == GroupKind::Ambiguous => {
                Some(self.static_ambiguity(group))
            }
            _ => None,
        }
    }

    /// Pick the first selecting group at or after `start`.
    pub fn select(
        &self,
        start: usize,
        args: &BoundArgs,
    ) -> Result<Option<Selection>, DispatchError> {
        for (index, group) in self.groups.iter().enumerate().skip(start) {
            match group.kind {
                GroupKind::Single => {
                    return Ok(Some(Selection {
                        group: index,
                        signature: Arc::clone(&group.members[0]),
                    }));
                }
                GroupKind::Ambiguous => return Err(self.static_ambiguity(group)),
                GroupKind::Guarded => {
                    let accepted = group.accepted(&self.operation, args, &self.types);
                    match accepted.as_slice() {
                        [] => continue,
                        [only] => {
                            return Ok(Some(Selection {
                                group: index,
                                signature: Arc::clone(only),
                            }));
                        }
                        several => {
                            return Err(DispatchError::RuntimeAmbiguity {
                                operation: self.operation.to_string(),
                                arg_types: self.types.to_string(),
                                candidates: several.iter().map(|s| Candidate::of(s)).collect(),
                            });
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    fn static_ambiguity(&self, group: &Group) -> DispatchError {
        DispatchError::StaticAmbiguity {
            operation: self.operation.to_string(),
            arg_types: self.types.to_string(),
            candidates: group.candidates(),
        }
    }

    /// The error for a call that nothing selected.
    pub(crate) fn no_match(&self) -> DispatchError {
        DispatchError::NoMatch {
            operation: self.operation.to_string(),
            arg_types: self.types.to_string(),
            candidates: self.signatures().map(|s| Candidate::of(s)).collect(),
        }
    }
}

/// Split one priority class into topological layers. Members stay in
/// registration order within a layer.
fn layers(members: &[Arc<Signature>], types: &TypeSignature) -> Vec<Vec<Arc<Signature>>> {
    let n = members.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i != j && members[j].compare_for(&members[i], types) == Relation::MoreSpecific {
                dominated_by[i].push(j);
            }
        }
    }

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut out = Vec::new();
    while !remaining.is_empty() {
        let mut layer: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|i| !dominated_by[*i].iter().any(|j| remaining.contains(j)))
            .collect();
        if layer.is_empty() {
            layer = remaining.clone();
        }
        remaining.retain(|i| !layer.contains(i));
        out.push(layer.into_iter().map(|i| Arc::clone(&members[i])).collect());
    }
    out
}
