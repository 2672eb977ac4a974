//! Specificity order over patterns.
//!
//! [`compare`] is a partial order. It tells whether one pattern matches a
//! strictly narrower set of arguments than another. [`Relation::merge`]
//! combines per-position results into a whole-signature result.

use std::fmt;
use std::slice;

use serde::Serialize;

use crate::pattern::{GuardArg, Pattern, Protocol};
use crate::types::{builtin, TypeRef};

/// Outcome of comparing two patterns or two signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    MoreSpecific,
    LessSpecific,
    Equal,
    Incomparable,
}

impl Relation {
    /// The same relation seen from the other side.
    pub fn opposite(self) -> Self {
        match self {
            Relation::MoreSpecific => Relation::LessSpecific,
            Relation::LessSpecific => Relation::MoreSpecific,
            other => other,
        }
    }

    /// Combine pointwise relations.
    ///
    /// More specific iff more-or-equal everywhere and strictly more at one
    /// position. Mixed directions are incomparable. An empty tuple is equal.
    pub fn merge(relations: impl IntoIterator<Item = Relation>) -> Relation {
        let mut acc = Relation::Equal;
        for rel in relations {
            acc = match (acc, rel) {
                (Relation::Incomparable, _) | (_, Relation::Incomparable) => {
                    return Relation::Incomparable
                }
                (acc, Relation::Equal) => acc,
                (Relation::Equal, rel) => rel,
                (a, b) if a == b => a,
                _ => return Relation::Incomparable,
            };
        }
        acc
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::MoreSpecific => "more specific",
            Relation::LessSpecific => "less specific",
            Relation::Equal => "equal",
            Relation::Incomparable => "incomparable",
        })
    }
}

/// Compare two patterns.
pub fn compare(a: &Pattern, b: &Pattern) -> Relation {
    if a == b {
        return Relation::Equal;
    }

    match (a, b) {
        (Pattern::Wildcard, _) => return Relation::LessSpecific,
        (_, Pattern::Wildcard) => return Relation::MoreSpecific,
        (Pattern::Union(xs), Pattern::Union(ys)) => return union_order(xs, ys),
        (Pattern::Union(xs), _) => return union_order(xs, slice::from_ref(b)),
        (_, Pattern::Union(ys)) => return union_order(slice::from_ref(a), ys),
        (Pattern::Intersection(xs), Pattern::Intersection(ys)) => {
            return intersection_order(xs, ys)
        }
        (Pattern::Intersection(xs), _) => return intersection_order(xs, slice::from_ref(b)),
        (_, Pattern::Intersection(ys)) => return intersection_order(slice::from_ref(a), ys),
        _ => {}
    }

    match (a.guarded_bound(), b.guarded_bound()) {
        (Some(bound_a), Some(bound_b)) => {
            return compare_guarded_pair(a, &bound_a, b, &bound_b)
        }
        (Some(bound_a), None) => return guarded_over(&bound_a, b),
        (None, Some(bound_b)) => return guarded_over(&bound_b, a).opposite(),
        (None, None) => {}
    }

    match (a, b) {
        (Pattern::TypeOfType(x), Pattern::TypeOfType(y)) => compare(x, y),
        (Pattern::TypeOfType(_), other) => type_of_type_over(other),
        (other, Pattern::TypeOfType(_)) => type_of_type_over(other).opposite(),
        (Pattern::Protocol(p), Pattern::Protocol(q)) => protocol_order(p, q),
        (Pattern::Protocol(p), other) => protocol_over(p, other),
        (other, Pattern::Protocol(p)) => protocol_over(p, other).opposite(),
        _ => nominal_order(a, b),
    }
}

/// Both sides carry a guard: rank by bound, then by guard placeholders or
/// element-wise for products.
fn compare_guarded_pair(
    a: &Pattern,
    bound_a: &Pattern,
    b: &Pattern,
    bound_b: &Pattern,
) -> Relation {
    match compare(bound_a, bound_b) {
        Relation::Equal => match (a, b) {
            (Pattern::Dependent { guard: ga, .. }, Pattern::Dependent { guard: gb, .. }) => {
                placeholder_order(ga.name(), ga.args(), gb.name(), gb.args())
            }
            (Pattern::Product(xs), Pattern::Product(ys)) if xs.len() == ys.len() => {
                Relation::merge(xs.iter().zip(ys).map(|(x, y)| compare(x, y)))
            }
            _ => Relation::Incomparable,
        },
        rel => rel,
    }
}

/// A guarded pattern ranks before any nominal pattern its bound overlaps.
fn guarded_over(bound: &Pattern, other: &Pattern) -> Relation {
    match compare(bound, other) {
        Relation::Incomparable => Relation::Incomparable,
        _ => Relation::MoreSpecific,
    }
}

fn placeholder_order(
    name_a: &str,
    args_a: &[GuardArg],
    name_b: &str,
    args_b: &[GuardArg],
) -> Relation {
    if name_a != name_b || args_a.len() != args_b.len() {
        return Relation::Incomparable;
    }
    let mut a_open = false;
    let mut b_open = false;
    for (x, y) in args_a.iter().zip(args_b) {
        match (x, y) {
            (GuardArg::Any, GuardArg::Value(_)) => a_open = true,
            (GuardArg::Value(_), GuardArg::Any) => b_open = true,
            _ => {}
        }
    }
    match (a_open, b_open) {
        (false, true) => Relation::MoreSpecific,
        (true, false) => Relation::LessSpecific,
        _ => Relation::Incomparable,
    }
}

/// Turn the two inclusion tests into a relation.
fn inclusion(a_within_b: bool, b_within_a: bool) -> Relation {
    match (a_within_b, b_within_a) {
        (true, true) => Relation::Equal,
        (true, false) => Relation::MoreSpecific,
        (false, true) => Relation::LessSpecific,
        (false, false) => Relation::Incomparable,
    }
}

fn at_least_as_narrow(x: &Pattern, y: &Pattern) -> bool {
    matches!(compare(x, y), Relation::MoreSpecific | Relation::Equal)
}

/// Unions as sets of alternatives.
///
/// `xs` is within `ys` iff every member of `xs` is within some member of
/// `ys`. A non-union side is passed as a one-member slice.
fn union_order(xs: &[Pattern], ys: &[Pattern]) -> Relation {
    let within = |xs: &[Pattern], ys: &[Pattern]| {
        xs.iter().all(|x| ys.iter().any(|y| at_least_as_narrow(x, y)))
    };
    inclusion(within(xs, ys), within(ys, xs))
}

/// Intersections as sets of requirements.
///
/// `xs` is within `ys` iff every requirement in `ys` is met at least as
/// tightly by some member of `xs`.
fn intersection_order(xs: &[Pattern], ys: &[Pattern]) -> Relation {
    let within = |xs: &[Pattern], ys: &[Pattern]| {
        ys.iter().all(|y| xs.iter().any(|x| at_least_as_narrow(x, y)))
    };
    inclusion(within(xs, ys), within(ys, xs))
}

fn type_of_type_over(other: &Pattern) -> Relation {
    let admits_types = match other {
        Pattern::SubclassOf(t) => builtin::type_().is_subtype_of(t),
        Pattern::Exact(t) => t == builtin::type_(),
        Pattern::StrictSubclassOf(t) => builtin::type_().is_strict_subtype_of(t),
        _ => false,
    };
    if admits_types {
        Relation::MoreSpecific
    } else {
        Relation::Incomparable
    }
}

fn protocol_order(p: &Protocol, q: &Protocol) -> Relation {
    match (p, q) {
        (Protocol::Methods(a), Protocol::Methods(b)) => {
            if a.is_superset(b) {
                Relation::MoreSpecific
            } else if b.is_superset(a) {
                Relation::LessSpecific
            } else {
                Relation::Incomparable
            }
        }
        _ => Relation::Incomparable,
    }
}

/// A protocol against a nominal pattern.
fn protocol_over(p: &Protocol, other: &Pattern) -> Relation {
    let Some(ty) = nominal_type(other) else {
        return Relation::Incomparable;
    };
    if p.satisfied_by(ty) {
        Relation::LessSpecific
    } else if ty == builtin::object() {
        Relation::MoreSpecific
    } else {
        Relation::Incomparable
    }
}

fn nominal_type(p: &Pattern) -> Option<&TypeRef> {
    match p {
        Pattern::Exact(t) | Pattern::SubclassOf(t) | Pattern::StrictSubclassOf(t) => Some(t),
        _ => None,
    }
}

fn nominal_order(a: &Pattern, b: &Pattern) -> Relation {
    use Pattern::{Exact, StrictSubclassOf, SubclassOf};

    match (a, b) {
        (Exact(_), Exact(_)) => Relation::Incomparable,
        (Exact(t), SubclassOf(u)) | (StrictSubclassOf(t), SubclassOf(u)) if t == u => {
            Relation::MoreSpecific
        }
        (SubclassOf(t), Exact(u)) | (SubclassOf(t), StrictSubclassOf(u)) if t == u => {
            Relation::LessSpecific
        }
        (Exact(t), StrictSubclassOf(u)) | (StrictSubclassOf(t), Exact(u)) if t == u => {
            Relation::Incomparable
        }
        (
            Exact(t) | SubclassOf(t) | StrictSubclassOf(t),
            Exact(u) | SubclassOf(u) | StrictSubclassOf(u),
        ) => subtype_order(t, u),
        _ => Relation::Incomparable,
    }
}

fn subtype_order(t: &TypeRef, u: &TypeRef) -> Relation {
    if t == u {
        Relation::Equal
    } else if t.is_subtype_of(u) {
        Relation::MoreSpecific
    } else if u.is_subtype_of(t) {
        Relation::LessSpecific
    } else {
        Relation::Incomparable
    }
}
