//! Call shapes: which positions may be passed by keyword, and argument binding.
//!
//! [`CallShape::classify`] looks at every signature of an operation at once
//! and settles a per-position [`PositionPolicy`]. [`CallShape::bind`] then
//! turns an incoming [`Call`] into canonical [`BoundArgs`]: keyword-passed
//! positionals are moved into their slots, and the remaining keywords are
//! sorted by name. This runs before any type matching.

use std::fmt;

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use thiserror::Error;

use crate::signature::{ArgPosition, Signature};
use crate::types::{RuntimeType, Value};

/// Errors from binding a call to an operation's call shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallShapeError {
    #[error("takes at most {max} positional argument(s), {given} given")]
    TooManyPositional { max: usize, given: usize },

    #[error("takes at least {min} positional argument(s), {given} given")]
    TooFewPositional { min: usize, given: usize },

    #[error("`{0}` cannot be passed by keyword")]
    PositionalOnly(String),

    #[error("`{0}` given more than once")]
    DuplicateArgument(String),

    #[error("unexpected keyword argument `{0}`")]
    UnknownKeyword(String),

    #[error("keyword `{name}` fills position {position}, but an earlier position is missing")]
    NonContiguous { name: String, position: usize },
}

/// How one positional slot may be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionPolicy {
    PositionalOnly,
    KeywordEligible(String),
}

/// A call as made by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Call {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Call {
    pub fn new(positional: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: positional.into_iter().collect(),
            keywords: Vec::new(),
        }
    }

    /// Add a keyword argument.
    pub fn kw(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keywords
    }
}

impl From<Vec<Value>> for Call {
    fn from(positional: Vec<Value>) -> Self {
        Call::new(positional)
    }
}

/// Canonical arguments: positionals in order, keyword-only arguments by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl BoundArgs {
    pub fn new(positional: Vec<Value>, mut keywords: Vec<(String, Value)>) -> Self {
        keywords.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            positional,
            keywords,
        }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keywords
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get(&self, position: &ArgPosition) -> Option<&Value> {
        match position {
            ArgPosition::Index(i) => self.arg(*i),
            ArgPosition::Keyword(name) => self.kwarg(name),
        }
    }

    /// The runtime types, which is what chains are cached under.
    pub fn type_signature(&self) -> TypeSignature {
        TypeSignature {
            positional: self.positional.iter().map(Value::runtime_type).collect(),
            keywords: self
                .keywords
                .iter()
                .map(|(name, value)| (name.clone(), value.runtime_type()))
                .collect(),
        }
    }

    /// Rebuild a call with the same arguments.
    pub fn to_call(&self) -> Call {
        Call {
            positional: self.positional.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

/// Observed runtime types of a bound call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSignature {
    pub(crate) positional: Vec<RuntimeType>,
    /// Sorted by name.
    pub(crate) keywords: Vec<(String, RuntimeType)>,
}

impl TypeSignature {
    pub fn new(positional: impl IntoIterator<Item = RuntimeType>) -> Self {
        Self {
            positional: positional.into_iter().collect(),
            keywords: Vec::new(),
        }
    }

    /// Add a keyword type.
    pub fn keyword(mut self, name: impl Into<String>, ty: RuntimeType) -> Self {
        let name = name.into();
        let at = self.keywords.partition_point(|(n, _)| *n < name);
        self.keywords.insert(at, (name, ty));
        self
    }

    /// Types of the given values.
    pub fn of(positional: &[Value], keywords: &[(String, Value)]) -> Self {
        BoundArgs::new(positional.to_vec(), keywords.to_vec()).type_signature()
    }

    pub fn positional(&self) -> &[RuntimeType] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, RuntimeType)] {
        &self.keywords
    }

    pub fn get(&self, position: &ArgPosition) -> Option<&RuntimeType> {
        match position {
            ArgPosition::Index(i) => self.positional.get(*i),
            ArgPosition::Keyword(name) => self
                .keywords
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, t)| t),
        }
    }

    pub fn keyword_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.keywords.iter().map(|(n, _)| n.as_str())
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self
            .positional
            .iter()
            .map(ToString::to_string)
            .chain(self.keywords.iter().map(|(n, t)| format!("{n}={t}")));
        if let Some(first) = parts.next() {
            f.write_str(&first)?;
            for part in parts {
                write!(f, ", {part}")?;
            }
        }
        Ok(())
    }
}

/// Per-position keyword policy for one operation.
#[derive(Debug, Clone, Default)]
pub struct CallShape {
    positions: Vec<PositionPolicy>,
    min_positional: usize,
    keyword_only: FxHashSet<String>,
    positional_names: FxHashSet<String>,
    /// No signatures yet; binding passes every argument through.
    open: bool,
}

impl CallShape {
    /// Decide the policy for every position across all signatures.
    pub fn classify<'a>(signatures: impl IntoIterator<Item = &'a Signature>) -> Self {
        let signatures: Vec<&Signature> = signatures.into_iter().collect();
        if signatures.is_empty() {
            return Self {
                open: true,
                ..Self::default()
            };
        }

        let max = signatures.iter().map(|s| s.max_positional()).max().unwrap_or(0);
        let min = signatures
            .iter()
            .map(|s| s.required_positional())
            .min()
            .unwrap_or(0);

        let mut names_at: Vec<IndexSet<Option<&str>>> = vec![IndexSet::new(); max];
        let mut positions_of: FxHashMap<&str, FxHashSet<usize>> = FxHashMap::default();
        let mut keyword_only = FxHashSet::default();
        for sig in &signatures {
            for (i, p) in sig.positional().iter().enumerate() {
                names_at[i].insert(p.name.as_deref());
                if let Some(name) = &p.name {
                    positions_of.entry(name.as_str()).or_default().insert(i);
                }
            }
            for k in sig.keywords() {
                keyword_only.insert(k.name.clone());
            }
        }

        let spread_too_wide = max - min > 1;
        let forced_through = names_at.iter().rposition(|names| names.len() > 1);

        let positions = names_at
            .iter()
            .enumerate()
            .map(|(i, names)| {
                if spread_too_wide || forced_through.is_some_and(|f| i <= f) {
                    return PositionPolicy::PositionalOnly;
                }
                match names.first() {
                    Some(Some(name))
                        if names.len() == 1
                            && !keyword_only.contains(*name)
                            && positions_of.get(name).is_some_and(|at| at.len() == 1) =>
                    {
                        PositionPolicy::KeywordEligible((*name).to_string())
                    }
                    _ => PositionPolicy::PositionalOnly,
                }
            })
            .collect();

        Self {
            positions,
            min_positional: min,
            keyword_only,
            positional_names: positions_of.keys().map(|n| (*n).to_string()).collect(),
            open: false,
        }
    }

    pub fn positions(&self) -> &[PositionPolicy] {
        &self.positions
    }

    pub fn policy(&self, index: usize) -> Option<&PositionPolicy> {
        self.positions.get(index)
    }

    fn eligible_position(&self, name: &str) -> Option<usize> {
        self.positions
            .iter()
            .position(|p| matches!(p, PositionPolicy::KeywordEligible(n) if n == name))
    }

    /// Validate a call and produce canonical arguments.
    pub fn bind(&self, call: Call) -> Result<BoundArgs, CallShapeError> {
        let Call {
            positional,
            keywords,
        } = call;

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for (name, _) in &keywords {
            if !seen.insert(name.as_str()) {
                return Err(CallShapeError::DuplicateArgument(name.clone()));
            }
        }

        if self.open {
            return Ok(BoundArgs::new(positional, keywords));
        }

        let max = self.positions.len();
        let given = positional.len();
        if given > max {
            return Err(CallShapeError::TooManyPositional { max, given });
        }

        let mut slots: Vec<Option<Value>> = positional.into_iter().map(Some).collect();
        slots.resize(max, None);
        let mut filled_by: FxHashMap<usize, String> = FxHashMap::default();
        let mut rest = Vec::new();

        for (name, value) in keywords {
            if let Some(at) = self.eligible_position(&name) {
                if at < given {
                    return Err(CallShapeError::DuplicateArgument(name));
                }
                slots[at] = Some(value);
                filled_by.insert(at, name);
            } else if self.keyword_only.contains(&name) {
                rest.push((name, value));
            } else if self.positional_names.contains(&name) {
                return Err(CallShapeError::PositionalOnly(name));
            } else {
                return Err(CallShapeError::UnknownKeyword(name));
            }
        }

        let filled = slots.iter().take_while(|s| s.is_some()).count();
        if let Some(position) = (filled..max).find(|i| slots[*i].is_some()) {
            let name = filled_by.remove(&position).unwrap_or_default();
            return Err(CallShapeError::NonContiguous { name, position });
        }
        if filled < self.min_positional {
            return Err(CallShapeError::TooFewPositional {
                min: self.min_positional,
                given: filled,
            });
        }

        let positional = slots.into_iter().flatten().collect();
        Ok(BoundArgs::new(positional, rest))
    }
}
