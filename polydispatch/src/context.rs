//! The context handed to a running implementation.
//!
//! A [`CallContext`] knows which chain and group the running signature was
//! selected from, so [`CallContext::call_next`] can resume selection after
//! it. It also carries the *active* operation: the one that received the
//! top-level call, and the one whose chain is running. Signatures
//! inherited from a parent or a mixin run under it too.
//! [`CallContext::recurse`] dispatches against that operation, which is how
//! a variant keeps every internal recursive call inside itself. The binding
//! is a plain field, so concurrent top-level calls cannot see each other's.

use std::sync::Arc;

use tracing::trace;

use crate::error::DispatchError;
use crate::operation::Operation;
use crate::resolve::ResolutionChain;
use crate::shape::{BoundArgs, Call};
use crate::signature::Signature;
use crate::types::Value;

/// Access to arguments and continuation from inside an implementation.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    operation: &'a Arc<Operation>,
    chain: &'a ResolutionChain,
    group: usize,
    signature: &'a Signature,
    args: &'a BoundArgs,
    depth: usize,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        operation: &'a Arc<Operation>,
        chain: &'a ResolutionChain,
        group: usize,
        signature: &'a Signature,
        args: &'a BoundArgs,
        depth: usize,
    ) -> Self {
        Self {
            operation,
            chain,
            group,
            signature,
            args,
            depth,
        }
    }

    /// Run the selected implementation.
    pub(crate) fn enter(&self) -> Result<Value, DispatchError> {
        trace!(
            operation = self.operation.name(),
            label = self.signature.label(),
            group = self.group,
            depth = self.depth,
            "invoking"
        );
        (self.signature.implementation())(self)
    }

    pub fn args(&self) -> &BoundArgs {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.arg(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.args.kwarg(name)
    }

    /// Like [`CallContext::arg`], but a missing argument is an error.
    pub fn require(&self, index: usize) -> Result<&Value, DispatchError> {
        self.args.arg(index).ok_or_else(|| {
            DispatchError::raised(format!(
                "`{}` has no argument #{index}",
                self.signature.label()
            ))
        })
    }

    /// Name of the active operation.
    pub fn operation_name(&self) -> &str {
        self.operation.name()
    }

    /// The operation that received the top-level call.
    pub fn operation(&self) -> &Arc<Operation> {
        self.operation
    }

    /// The running signature.
    pub fn signature(&self) -> &Signature {
        self.signature
    }

    /// Redirect depth: 0 for a top-level call.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Invoke the next candidate after the running one, with the same arguments.
    pub fn call_next(&self) -> Result<Value, DispatchError> {
        let selection = self
            .chain
            .select(self.group + 1, self.args)?
            .ok_or_else(|| DispatchError::ExhaustedChain {
                operation: self.operation.name().to_string(),
                arg_types: self.chain.types().to_string(),
                after: self.signature.label().to_string(),
            })?;
        let next = CallContext {
            group: selection.group,
            signature: &selection.signature,
            operation: self.operation,
            chain: self.chain,
            args: self.args,
            depth: self.depth,
        };
        next.enter()
    }

    /// Dispatch again against the active operation.
    pub fn recurse(&self, call: impl Into<Call>) -> Result<Value, DispatchError> {
        self.operation.invoke(self.depth + 1, call.into())
    }
}
