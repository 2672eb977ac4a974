//! Polydispatch
//!
//! Multiple dispatch over runtime types, argument values and priorities.
//!
//! An [`Operation`] holds signatures: parameter patterns, optional
//! keyword parameters, a priority and an implementation. A call binds its
//! arguments against the operation's call shape, observes their runtime
//! types and runs the most specific applicable signature. Implementations
//! can continue to the next candidate with [`CallContext::call_next`] or
//! dispatch again with [`CallContext::recurse`].
//!
//! # Features
//!
//! - Nominal patterns with subtype ordering
//! - Literal and guarded (dependent) patterns, resolved at run time
//! - A library of common guards: value sets, prefixes, regexes, fields, tuples
//! - Unions, intersections, protocols and type-of-type patterns
//! - Priority classes and next-candidate chaining
//! - Variants and mixins that compose signature sets
//! - Resolution chains cached per type signature and version
//! - Traces that explain a call without running it
//!
//! # Example
//!
//! ```rust
//! use polydispatch::{builtin, Operation, Pattern, Signature, Value};
//!
//! let describe = Operation::new("describe");
//! describe.register(
//!     Signature::build("number")
//!         .param(Pattern::of(builtin::number()))
//!         .body(|_| Ok(Value::str("a number")))
//!         .unwrap(),
//! );
//! describe.register(
//!     Signature::build("integer")
//!         .param(Pattern::of(builtin::integer()))
//!         .body(|ctx| {
//!             let rest = ctx.call_next()?;
//!             Ok(Value::str(format!("an integer, {}", rest.as_str().unwrap_or(""))))
//!         })
//!         .unwrap(),
//! );
//!
//! let out = describe.call(vec![Value::int(3)]).unwrap();
//! assert_eq!(out, Value::str("an integer, a number"));
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod dependent;
pub mod engine;
pub mod error;
pub mod explain;
pub mod operation;
pub mod order;
pub mod pattern;
pub mod registry;
pub mod resolve;
pub mod shape;
pub mod signature;
pub mod types;

pub use cache::CacheStats;
pub use config::{ConfigError, EngineConfig};
pub use context::CallContext;
pub use dependent::PatternError;
pub use engine::Engine;
pub use error::{Candidate, DispatchError, ErrorKind};
pub use explain::{Outcome, Status, Trace, TraceEntry};
pub use operation::Operation;
pub use order::{compare, Relation};
pub use pattern::{Guard, GuardArg, Pattern, Protocol};
pub use registry::{Registration, Registry, Snapshot, SourceId};
pub use resolve::{GroupKind, ResolutionChain};
pub use shape::{BoundArgs, Call, CallShape, CallShapeError, PositionPolicy, TypeSignature};
pub use signature::{ArgPosition, Mismatch, Signature, SignatureBuilder, SignatureError};
pub use types::{builtin, Instance, RuntimeType, TypeDef, TypeRef, Value};
