//! A namespace of operations sharing one configuration.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::DispatchError;
use crate::explain::Trace;
use crate::operation::Operation;
use crate::registry::{Registration, Registry};
use crate::resolve::ResolutionChain;
use crate::shape::{Call, TypeSignature};
use crate::signature::Signature;
use crate::types::Value;

/// Operations by name.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    operations: RwLock<FxHashMap<String, Arc<Operation>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            operations: RwLock::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The operation called `name`, created empty on first use.
    pub fn operation(&self, name: &str) -> Arc<Operation> {
        if let Some(op) = self.operations.read().get(name) {
            return Arc::clone(op);
        }
        let mut operations = self.operations.write();
        let op = operations.entry(name.to_string()).or_insert_with(|| {
            debug!(operation = name, "created operation");
            Operation::with_config(name, self.config.clone())
        });
        Arc::clone(op)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Operation>> {
        self.operations.read().get(name).cloned()
    }

    /// Install an operation built elsewhere, returning the one it replaces.
    pub fn insert(&self, operation: Arc<Operation>) -> Option<Arc<Operation>> {
        self.operations
            .write()
            .insert(operation.name().to_string(), operation)
    }

    pub fn register(&self, name: &str, signature: Signature) -> Registration {
        self.operation(name).register(signature)
    }

    pub fn merge(&self, name: &str, registries: &[&Registry]) {
        self.operation(name).merge(registries);
    }

    /// Create a variant of `base` under `name` and install it.
    pub fn variant(&self, base: &str, name: &str) -> Result<Arc<Operation>, DispatchError> {
        let base = self.require(base)?;
        let variant = base.variant(name);
        self.insert(Arc::clone(&variant));
        Ok(variant)
    }

    pub fn dispatch(&self, name: &str, call: impl Into<Call>) -> Result<Value, DispatchError> {
        self.require(name)?.call(call)
    }

    pub fn resolve(
        &self,
        name: &str,
        types: &TypeSignature,
    ) -> Result<Arc<ResolutionChain>, DispatchError> {
        Ok(self.require(name)?.resolve(types))
    }

    pub fn explain(&self, name: &str, call: impl Into<Call>) -> Result<Trace, DispatchError> {
        self.require(name)?.explain(call)
    }

    /// Operation names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn require(&self, name: &str) -> Result<Arc<Operation>, DispatchError> {
        self.get(name)
            .ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))
    }
}
