//! Resolution traces.
//!
//! A [`Trace`] replays selection for one bound call without running any
//! implementation. Guards are evaluated exactly as dispatch would evaluate
//! them, so the trace shows which candidates were considered, which guards
//! passed, and why the others never applied.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::order::Relation;
use crate::resolve::{GroupKind, ResolutionChain};
use crate::shape::BoundArgs;
use crate::signature::Signature;

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Selected,
    /// Ranked after the selected candidate; reachable through `call_next`.
    Shadowed,
    GuardRejected,
    Ambiguous,
    /// Ranked after an ambiguity that ends the call.
    Unreached,
    NotApplicable { reason: String },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Selected => f.write_str("selected"),
            Status::Shadowed => f.write_str("shadowed"),
            Status::GuardRejected => f.write_str("guard rejected"),
            Status::Ambiguous => f.write_str("ambiguous"),
            Status::Unreached => f.write_str("unreached"),
            Status::NotApplicable { reason } => write!(f, "not applicable: {reason}"),
        }
    }
}

/// Final result of the traced call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Selected { label: String },
    Failed { kind: ErrorKind },
}

/// One registered signature, as seen by the traced call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub label: String,
    pub signature: String,
    pub priority: i32,
    /// Group index in the chain, for bound-matching candidates.
    pub rank: Option<usize>,
    /// Guard result, when the guards were evaluated.
    pub guard: Option<bool>,
    /// Specificity against the selected candidate.
    pub relation: Option<Relation>,
    #[serde(flatten)]
    pub status: Status,
}

/// How one call would be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub operation: String,
    pub arg_types: String,
    pub entries: Vec<TraceEntry>,
    pub outcome: Outcome,
}

impl Trace {
    pub(crate) fn build(
        signatures: &[Arc<Signature>],
        chain: &ResolutionChain,
        args: &BoundArgs,
    ) -> Self {
        let types = chain.types();
        let mut ranked: Vec<(Arc<Signature>, TraceEntry)> = Vec::new();
        let mut outcome: Option<Outcome> = None;
        let mut winner: Option<Arc<Signature>> = None;

        for (rank, group) in chain.groups().iter().enumerate() {
            let mut decided: Vec<(Status, Option<bool>)> =
                Vec::with_capacity(group.members().len());
            match &outcome {
                Some(Outcome::Selected { .. }) => {
                    decided.extend(group.members().iter().map(|_| (Status::Shadowed, None)));
                }
                Some(Outcome::Failed { .. }) => {
                    decided.extend(group.members().iter().map(|_| (Status::Unreached, None)));
                }
                None => match group.kind() {
                    GroupKind::Single => {
                        decided.push((Status::Selected, None));
                        winner = Some(Arc::clone(&group.members()[0]));
                    }
                    GroupKind::Ambiguous => {
                        decided.extend(group.members().iter().map(|_| (Status::Ambiguous, None)));
                        outcome = Some(Outcome::Failed {
                            kind: ErrorKind::StaticAmbiguity,
                        });
                    }
                    GroupKind::Guarded => {
                        let results: Vec<(bool, Option<bool>)> = group
                            .members()
                            .iter()
                            .map(|s| {
                                let accepted = s.accepts_typed(args, types);
                                let guard = s.is_dependent_for(types).then_some(accepted);
                                (accepted, guard)
                            })
                            .collect();
                        let accepted = results.iter().filter(|(ok, _)| *ok).count();
                        for (i, (ok, guard)) in results.into_iter().enumerate() {
                            let status = match (ok, accepted) {
                                (false, _) => Status::GuardRejected,
                                (true, 1) => {
                                    winner = Some(Arc::clone(&group.members()[i]));
                                    Status::Selected
                                }
                                (true, _) => Status::Ambiguous,
                            };
                            decided.push((status, guard));
                        }
                        if accepted > 1 {
                            outcome = Some(Outcome::Failed {
                                kind: ErrorKind::RuntimeAmbiguity,
                            });
                        }
                    }
                },
            }
            if outcome.is_none() {
                if let Some(w) = &winner {
                    outcome = Some(Outcome::Selected {
                        label: w.label().to_string(),
                    });
                }
            }

            for (signature, (status, guard)) in group.members().iter().zip(decided) {
                ranked.push((
                    Arc::clone(signature),
                    TraceEntry {
                        label: signature.label().to_string(),
                        signature: signature.to_string(),
                        priority: signature.priority(),
                        rank: Some(rank),
                        guard,
                        relation: None,
                        status,
                    },
                ));
            }
        }

        let mut entries: Vec<TraceEntry> = ranked
            .into_iter()
            .map(|(signature, mut entry)| {
                if let Some(w) = &winner {
                    entry.relation = Some(signature.compare_for(w, types));
                }
                entry
            })
            .collect();

        for signature in signatures {
            if chain.signatures().any(|s| Arc::ptr_eq(s, signature)) {
                continue;
            }
            let reason = signature
                .mismatch(types)
                .map(|m| m.to_string())
                .unwrap_or_default();
            entries.push(TraceEntry {
                label: signature.label().to_string(),
                signature: signature.to_string(),
                priority: signature.priority(),
                rank: None,
                guard: None,
                relation: None,
                status: Status::NotApplicable { reason },
            });
        }

        Trace {
            operation: chain.operation().to_string(),
            arg_types: types.to_string(),
            entries,
            outcome: outcome.unwrap_or(Outcome::Failed {
                kind: ErrorKind::NoMatch,
            }),
        }
    }

    /// Label of the selected candidate, if any.
    pub fn selected(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Selected { label } => Some(label),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn entry(&self, label: &str) -> Option<&TraceEntry> {
        self.entries.iter().find(|e| e.label == label)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}({})", self.operation, self.arg_types)?;
        let width = self.entries.iter().map(|e| e.label.len()).max().unwrap_or(0);
        for entry in &self.entries {
            let rank = entry.rank.map_or_else(|| "-".to_string(), |r| r.to_string());
            write!(
                f,
                "  {rank:>3}  {priority:>4}  {label:<width$}  {status}",
                priority = entry.priority,
                label = entry.label,
                status = entry.status,
            )?;
            if let Some(guard) = entry.guard {
                write!(f, ", guard {}", if guard { "passed" } else { "failed" })?;
            }
            if let Some(relation) = entry.relation {
                if entry.status != Status::Selected {
                    write!(f, ", {relation}")?;
                }
            }
            writeln!(f)?;
        }
        match &self.outcome {
            Outcome::Selected { label } => write!(f, "=> `{label}`"),
            Outcome::Failed { kind } => write!(f, "=> {kind:?}"),
        }
    }
}
