//! Ready-made value-dependent patterns.
//!
//! Each constructor returns an ordinary [`Pattern`], so the results rank and
//! dispatch like hand-written [`Guard`]s. Parameterized guards carry their
//! parameters as [`GuardArg`]s and order by placeholders.

use regex::Regex;
use thiserror::Error;

use crate::pattern::{Guard, GuardArg, Pattern};
use crate::types::{builtin, Value};

/// Errors from building a pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regular expression `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

fn text_arg(args: &[GuardArg]) -> Option<&str> {
    match args.first() {
        Some(GuardArg::Value(v)) => v.as_str(),
        _ => None,
    }
}

impl Pattern {
    /// Any one of the given values.
    ///
    /// A single value is a [`Pattern::Literal`]; several become a union of
    /// literals, which guarded groups resolve by hash lookup.
    pub fn equals<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut literals: Vec<Pattern> = values.into_iter().map(Pattern::literal).collect();
        if literals.len() == 1 {
            literals.remove(0)
        } else {
            Pattern::Union(literals)
        }
    }

    /// A string with the given prefix.
    pub fn starts_with(prefix: &str) -> Self {
        let guard = Guard::with_args(
            "StartsWith",
            vec![GuardArg::Value(Value::str(prefix))],
            |v, args| match (v.as_str(), text_arg(args)) {
                (Some(s), Some(prefix)) => s.starts_with(prefix),
                _ => false,
            },
        );
        Pattern::dependent(Pattern::of(builtin::str()), guard)
    }

    /// A string with the given suffix.
    pub fn ends_with(suffix: &str) -> Self {
        let guard = Guard::with_args(
            "EndsWith",
            vec![GuardArg::Value(Value::str(suffix))],
            |v, args| match (v.as_str(), text_arg(args)) {
                (Some(s), Some(suffix)) => s.ends_with(suffix),
                _ => false,
            },
        );
        Pattern::dependent(Pattern::of(builtin::str()), guard)
    }

    /// A string containing a match for `pattern` anywhere.
    pub fn regexp(pattern: &str) -> Result<Self, PatternError> {
        let rx = Regex::new(pattern).map_err(|source| PatternError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        let guard = Guard::with_args(
            "Regexp",
            vec![GuardArg::Value(Value::str(pattern))],
            move |v, _| v.as_str().is_some_and(|s| rx.is_match(s)),
        );
        Ok(Pattern::dependent(Pattern::of(builtin::str()), guard))
    }

    /// An instance carrying every named field.
    pub fn has_key<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = keys
            .into_iter()
            .map(|k| GuardArg::Value(Value::str(k)))
            .collect();
        let guard = Guard::with_args("HasKey", args, |v, args| {
            let Some(instance) = v.as_instance() else {
                return false;
            };
            args.iter().all(|arg| match arg {
                GuardArg::Value(key) => key.as_str().is_some_and(|k| instance.field(k).is_some()),
                GuardArg::Any => true,
            })
        });
        Pattern::dependent(Pattern::of(builtin::object()), guard)
    }

    /// A list of exactly this length whose elements match pointwise.
    pub fn product(items: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Product(items.into_iter().collect())
    }
}
