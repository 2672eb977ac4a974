//! Signatures: one registered implementation of an operation.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::context::CallContext;
use crate::error::DispatchError;
use crate::order::{compare, Relation};
use crate::pattern::Pattern;
use crate::registry::SourceId;
use crate::shape::{BoundArgs, TypeSignature};
use crate::types::Value;

/// The callable body of a signature.
pub type Implementation =
    Arc<dyn Fn(&CallContext<'_>) -> Result<Value, DispatchError> + Send + Sync>;

/// A positional parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    /// Set when the parameter may also be passed by keyword.
    pub name: Option<String>,
    pub pattern: Pattern,
    /// False for a trailing parameter the call may omit.
    pub required: bool,
}

/// A keyword-only parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeywordParam {
    pub name: String,
    pub pattern: Pattern,
    /// False when the call may leave the keyword out.
    pub required: bool,
}

/// Where an argument sits in a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgPosition {
    Index(usize),
    Keyword(String),
}

impl fmt::Display for ArgPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPosition::Index(i) => write!(f, "#{i}"),
            ArgPosition::Keyword(name) => write!(f, "{name}="),
        }
    }
}

/// Structural identity of a signature, used for override detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    positional: Vec<Pattern>,
    keywords: Vec<(String, Pattern)>,
    priority: i32,
}

/// Why a signature does not apply to a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Arity { min: usize, max: usize, given: usize },
    MissingKeyword(String),
    UnexpectedKeyword(String),
    Bound {
        position: ArgPosition,
        expected: String,
        found: String,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Arity { min, max, given } if min == max => {
                write!(f, "takes {min} positional argument(s), {given} given")
            }
            Mismatch::Arity { min, max, given } => {
                write!(f, "takes {min} to {max} positional arguments, {given} given")
            }
            Mismatch::MissingKeyword(name) => write!(f, "missing keyword `{name}`"),
            Mismatch::UnexpectedKeyword(name) => write!(f, "no keyword `{name}`"),
            Mismatch::Bound {
                position,
                expected,
                found,
            } => write!(f, "{position} expects {expected}, found {found}"),
        }
    }
}

/// Errors from declaring a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("`{label}`: required parameter #{index} follows an optional one")]
    RequiredAfterOptional { label: String, index: usize },

    #[error("`{label}`: parameter `{name}` is declared twice")]
    DuplicateName { label: String, name: String },

    #[error("`{label}`: `{name}` is declared both positionally and as a keyword")]
    PositionalAndKeyword { label: String, name: String },
}

/// One registered implementation.
#[derive(Clone)]
pub struct Signature {
    label: Arc<str>,
    positional: Vec<Param>,
    /// Sorted by name.
    keywords: Vec<KeywordParam>,
    priority: i32,
    implementation: Implementation,
    source: SourceId,
}

impl Signature {
    /// Start declaring a signature. The label names it in errors and traces.
    pub fn build(label: impl Into<String>) -> SignatureBuilder {
        SignatureBuilder {
            label: label.into(),
            positional: Vec::new(),
            keywords: Vec::new(),
            priority: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub(crate) fn with_source(mut self, source: SourceId) -> Self {
        self.source = source;
        self
    }

    pub fn positional(&self) -> &[Param] {
        &self.positional
    }

    pub fn keywords(&self) -> &[KeywordParam] {
        &self.keywords
    }

    pub(crate) fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    pub fn required_positional(&self) -> usize {
        self.positional.iter().take_while(|p| p.required).count()
    }

    pub fn max_positional(&self) -> usize {
        self.positional.len()
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            positional: self.positional.iter().map(|p| p.pattern.clone()).collect(),
            keywords: self
                .keywords
                .iter()
                .map(|k| (k.name.clone(), k.pattern.clone()))
                .collect(),
            priority: self.priority,
        }
    }

    fn keyword(&self, name: &str) -> Option<&KeywordParam> {
        self.keywords
            .binary_search_by(|k| k.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.keywords[i])
    }

    /// Check arity and keyword shape, without looking at types.
    pub fn check_shape<'a>(
        &self,
        positional: usize,
        keywords: impl IntoIterator<Item = &'a str> + Clone,
    ) -> Result<(), Mismatch> {
        let min = self.required_positional();
        let max = self.max_positional();
        if positional < min || positional > max {
            return Err(Mismatch::Arity {
                min,
                max,
                given: positional,
            });
        }
        for name in keywords.clone() {
            if self.keyword(name).is_none() {
                return Err(Mismatch::UnexpectedKeyword(name.to_string()));
            }
        }
        for kw in self.keywords.iter().filter(|k| k.required) {
            if !keywords.clone().into_iter().any(|name| name == kw.name) {
                return Err(Mismatch::MissingKeyword(kw.name.clone()));
            }
        }
        Ok(())
    }

    /// The patterns that take part in matching a call of the given shape,
    /// positional first, then keywords in name order.
    ///
    /// Assumes [`Signature::check_shape`] passed.
    pub(crate) fn patterns_for<'s>(
        &'s self,
        types: &'s TypeSignature,
    ) -> impl Iterator<Item = (ArgPosition, &'s Pattern)> + 's {
        let positional = self.positional[..types.positional.len().min(self.positional.len())]
            .iter()
            .enumerate()
            .map(|(i, p)| (ArgPosition::Index(i), &p.pattern));
        let keywords = types.keywords.iter().filter_map(|(name, _)| {
            self.keyword(name)
                .map(|k| (ArgPosition::Keyword(name.clone()), &k.pattern))
        });
        positional.chain(keywords)
    }

    /// Why this signature does not bound-match the observed types, if it doesn't.
    pub fn mismatch(&self, types: &TypeSignature) -> Option<Mismatch> {
        if let Err(mismatch) = self.check_shape(
            types.positional.len(),
            types.keywords.iter().map(|(name, _)| name.as_str()),
        ) {
            return Some(mismatch);
        }
        self.patterns_for(types).find_map(|(position, pattern)| {
            let rt = types.get(&position)?;
            if pattern.admits(rt) {
                None
            } else {
                Some(Mismatch::Bound {
                    position,
                    expected: pattern.to_string(),
                    found: rt.to_string(),
                })
            }
        })
    }

    /// Whether dispatch must evaluate guards for a call of this shape.
    pub fn is_dependent_for(&self, types: &TypeSignature) -> bool {
        self.patterns_for(types).any(|(_, p)| p.is_dependent())
    }

    /// Whether any parameter pattern carries a guard.
    pub fn is_dependent(&self) -> bool {
        self.positional.iter().any(|p| p.pattern.is_dependent())
            || self.keywords.iter().any(|k| k.pattern.is_dependent())
    }

    /// Evaluate guards against bound argument values.
    pub fn accepts(&self, args: &BoundArgs) -> bool {
        self.accepts_typed(args, &args.type_signature())
    }

    pub(crate) fn accepts_typed(&self, args: &BoundArgs, types: &TypeSignature) -> bool {
        self.patterns_for(types).all(|(position, pattern)| {
            if !pattern.is_dependent() {
                return true;
            }
            match (args.get(&position), types.get(&position)) {
                (Some(value), Some(rt)) => pattern.guards_hold(value, rt),
                _ => false,
            }
        })
    }

    /// Rank two signatures for calls of the given shape.
    pub fn compare_for(&self, other: &Signature, types: &TypeSignature) -> Relation {
        Relation::merge(
            self.patterns_for(types)
                .zip(other.patterns_for(types))
                .map(|((_, a), (_, b))| compare(a, b)),
        )
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("label", &self.label)
            .field("positional", &self.positional)
            .field("keywords", &self.keywords)
            .field("priority", &self.priority)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.label)?;
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            Ok(())
        };
        for p in &self.positional {
            sep(f)?;
            if let Some(name) = &p.name {
                write!(f, "{name}: ")?;
            }
            write!(f, "{}", p.pattern)?;
            if !p.required {
                f.write_str(" = ?")?;
            }
        }
        if !self.keywords.is_empty() {
            sep(f)?;
            f.write_str("*")?;
        }
        for k in &self.keywords {
            sep(f)?;
            write!(f, "{}: {}", k.name, k.pattern)?;
            if !k.required {
                f.write_str(" = ?")?;
            }
        }
        f.write_str(")")?;
        if self.priority != 0 {
            write!(f, " [priority {}]", self.priority)?;
        }
        Ok(())
    }
}

/// Builder for [`Signature`].
#[derive(Debug)]
pub struct SignatureBuilder {
    label: String,
    positional: Vec<Param>,
    keywords: Vec<KeywordParam>,
    priority: i32,
}

impl SignatureBuilder {
    /// An unnamed required positional parameter.
    pub fn param(mut self, pattern: Pattern) -> Self {
        self.positional.push(Param {
            name: None,
            pattern,
            required: true,
        });
        self
    }

    /// A named required positional parameter.
    pub fn named(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.positional.push(Param {
            name: Some(name.into()),
            pattern,
            required: true,
        });
        self
    }

    /// A named optional positional parameter.
    pub fn optional(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.positional.push(Param {
            name: Some(name.into()),
            pattern,
            required: false,
        });
        self
    }

    pub fn keyword(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.keywords.push(KeywordParam {
            name: name.into(),
            pattern,
            required: true,
        });
        self
    }

    pub fn optional_keyword(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.keywords.push(KeywordParam {
            name: name.into(),
            pattern,
            required: false,
        });
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach the implementation and validate the declaration.
    pub fn body<F>(mut self, body: F) -> Result<Signature, SignatureError>
    where
        F: Fn(&CallContext<'_>) -> Result<Value, DispatchError> + Send + Sync + 'static,
    {
        self.validate()?;
        self.keywords.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Signature {
            label: Arc::from(self.label),
            positional: self.positional,
            keywords: self.keywords,
            priority: self.priority,
            implementation: Arc::new(body),
            source: SourceId::default(),
        })
    }

    fn validate(&self) -> Result<(), SignatureError> {
        let mut seen_optional = false;
        let mut names: Vec<&str> = Vec::new();
        for (index, p) in self.positional.iter().enumerate() {
            if p.required && seen_optional {
                return Err(SignatureError::RequiredAfterOptional {
                    label: self.label.clone(),
                    index,
                });
            }
            seen_optional |= !p.required;
            if let Some(name) = &p.name {
                if names.contains(&name.as_str()) {
                    return Err(SignatureError::DuplicateName {
                        label: self.label.clone(),
                        name: name.clone(),
                    });
                }
                names.push(name);
            }
        }

        let positional_names = names.len();
        for k in &self.keywords {
            if let Some(i) = names.iter().position(|n| *n == k.name) {
                let label = self.label.clone();
                let name = k.name.clone();
                return Err(if i < positional_names {
                    SignatureError::PositionalAndKeyword { label, name }
                } else {
                    SignatureError::DuplicateName { label, name }
                });
            }
            names.push(&k.name);
        }
        Ok(())
    }
}
