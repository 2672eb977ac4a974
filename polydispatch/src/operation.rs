//! Operations: the callable object for one operation name.
//!
//! An [`Operation`] owns a registry, an ordered list of mixins and a
//! dispatch cache. Its effective signature set is every mixin's set, in
//! mixin order, followed by its own registry, later slots replacing earlier
//! ones. A variant is an operation whose first mixin is its parent, so it
//! inherits everything, overrides what it registers, and sees later changes
//! to the parent through the version check.
//!
//! # Dispatch
//!
//! 1. Compile (or reuse) the effective snapshot and its call shape.
//! 2. Bind the call against the shape.
//! 3. Look up the chain for the observed types in the cache, building it on
//!    a miss.
//! 4. Select and run, with a [`CallContext`] bound to the chain.

use std::ptr;
use std::sync::Arc;

use parking_lot::{const_mutex, Mutex, RwLock};
use tracing::debug;

use crate::cache::{CacheKey, CacheStats, DispatchCache};
use crate::config::EngineConfig;
use crate::context::CallContext;
use crate::error::DispatchError;
use crate::explain::Trace;
use crate::registry::{insert_slot, Registration, Registry, Slots, Snapshot};
use crate::resolve::ResolutionChain;
use crate::shape::{BoundArgs, Call, CallShape, TypeSignature};
use crate::signature::Signature;
use crate::types::Value;

/// Serializes mixin edits so the cycle check and the insert see the same graph.
static COMPOSITION: Mutex<()> = const_mutex(());

/// Snapshot plus call shape, rebuilt when the effective version moves.
#[derive(Debug)]
struct Compiled {
    snapshot: Snapshot,
    shape: CallShape,
}

/// A named, dispatchable operation.
#[derive(Debug)]
pub struct Operation {
    name: String,
    config: EngineConfig,
    registry: RwLock<Registry>,
    mixins: RwLock<Vec<Arc<Operation>>>,
    compiled: RwLock<Option<Arc<Compiled>>>,
    cache: DispatchCache,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_config(name, EngineConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: EngineConfig) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            registry: RwLock::new(Registry::new(name.clone())),
            cache: DispatchCache::new(config.cache_capacity),
            mixins: RwLock::new(Vec::new()),
            compiled: RwLock::new(None),
            config,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a signature to this operation's own registry.
    pub fn register(&self, signature: Signature) -> Registration {
        self.registry.write().register(signature)
    }

    /// Union other registries into this operation's own registry.
    pub fn merge(&self, registries: &[&Registry]) {
        self.registry.write().merge(registries);
    }

    /// Remove signatures by label from this operation's own registry.
    pub fn unregister(&self, label: &str) -> bool {
        self.registry.write().unregister(label)
    }

    /// Compose another operation's signatures into this one.
    pub fn add_mixin(self: &Arc<Self>, mixin: Arc<Operation>) -> Result<(), DispatchError> {
        let _composing = COMPOSITION.lock();
        if mixin.includes(self) {
            return Err(DispatchError::CompositionCycle {
                operation: self.name.clone(),
                mixin: mixin.name.clone(),
            });
        }
        debug!(operation = %self.name, mixin = %mixin.name, "added mixin");
        self.mixins.write().push(mixin);
        self.registry.write().touch();
        Ok(())
    }

    pub fn mixins(&self) -> Vec<Arc<Operation>> {
        self.mixins.read().clone()
    }

    fn includes(&self, other: &Operation) -> bool {
        ptr::eq(self, other) || self.mixins.read().iter().any(|m| m.includes(other))
    }

    /// A new operation with the same name that starts out equal to this one.
    pub fn copy(self: &Arc<Self>) -> Arc<Self> {
        self.variant(self.name.clone())
    }

    /// A new operation that inherits this one's signatures. Signatures
    /// registered on the variant do not affect this operation.
    pub fn variant(self: &Arc<Self>, name: impl Into<String>) -> Arc<Self> {
        let variant = Self::with_config(name, self.config.clone());
        variant.mixins.write().push(Arc::clone(self));
        debug!(operation = %variant.name, parent = %self.name, "created variant");
        variant
    }

    /// Effective version: the newest stamp across this registry and all mixins.
    pub fn version(&self) -> u64 {
        let own = self.registry.read().version();
        self.mixins
            .read()
            .iter()
            .map(|m| m.version())
            .fold(own, u64::max)
    }

    fn collect_slots(&self, slots: &mut Slots) {
        for mixin in self.mixins.read().iter() {
            mixin.collect_slots(slots);
        }
        for signature in self.registry.read().signatures() {
            insert_slot(slots, Arc::clone(signature));
        }
    }

    fn compiled(&self) -> Arc<Compiled> {
        let version = self.version();
        if let Some(compiled) = self.compiled.read().as_ref() {
            if compiled.snapshot.version() == version {
                return Arc::clone(compiled);
            }
        }

        let mut slots = Slots::new();
        self.collect_slots(&mut slots);
        let signatures: Arc<[Arc<Signature>]> = slots.into_values().collect();
        let shape = CallShape::classify(signatures.iter().map(|s| &**s));
        let compiled = Arc::new(Compiled {
            snapshot: Snapshot::new(version, signatures),
            shape,
        });
        debug!(
            operation = %self.name,
            version,
            signatures = compiled.snapshot.len(),
            "compiled operation"
        );

        let mut slot = self.compiled.write();
        match slot.as_ref() {
            Some(current) if current.snapshot.version() > version => {}
            _ => *slot = Some(Arc::clone(&compiled)),
        }
        compiled
    }

    /// The effective signature set.
    pub fn snapshot(&self) -> Snapshot {
        self.compiled().snapshot.clone()
    }

    /// The per-position keyword policy.
    pub fn call_shape(&self) -> CallShape {
        self.compiled().shape.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn chain_for(&self, compiled: &Compiled, types: &TypeSignature) -> Arc<ResolutionChain> {
        let key = CacheKey {
            version: compiled.snapshot.version(),
            types: types.clone(),
        };
        self.cache.get_or_build(key, |types| {
            ResolutionChain::build(&self.name, compiled.snapshot.signatures(), types)
        })
    }

    fn bind(&self, compiled: &Compiled, call: Call) -> Result<BoundArgs, DispatchError> {
        compiled
            .shape
            .bind(call)
            .map_err(|source| DispatchError::MalformedCallShape {
                operation: self.name.clone(),
                source,
            })
    }

    /// What would be tried for these types, in order, without calling anything.
    pub fn resolve(&self, types: &TypeSignature) -> Arc<ResolutionChain> {
        let compiled = self.compiled();
        self.chain_for(&compiled, types)
    }

    /// Trace how a call would be resolved, evaluating guards but running nothing.
    pub fn explain(&self, call: impl Into<Call>) -> Result<Trace, DispatchError> {
        let compiled = self.compiled();
        let args = self.bind(&compiled, call.into())?;
        let chain = self.chain_for(&compiled, &args.type_signature());
        Ok(Trace::build(compiled.snapshot.signatures(), &chain, &args))
    }

    /// Make a top-level call. This operation becomes the active one.
    pub fn call(self: &Arc<Self>, call: impl Into<Call>) -> Result<Value, DispatchError> {
        self.invoke(0, call.into())
    }

    pub(crate) fn invoke(
        self: &Arc<Self>,
        depth: usize,
        call: Call,
    ) -> Result<Value, DispatchError> {
        if depth > self.config.max_recursion_depth {
            return Err(DispatchError::RecursionLimit {
                operation: self.name.clone(),
                limit: self.config.max_recursion_depth,
            });
        }

        let compiled = self.compiled();
        let args = self.bind(&compiled, call)?;
        let chain = self.chain_for(&compiled, &args.type_signature());
        if let Some(err) = chain.leading_ambiguity() {
            return Err(err);
        }

        let selection = chain.select(0, &args)?.ok_or_else(|| chain.no_match())?;
        CallContext::new(
            self,
            &chain,
            selection.group,
            &selection.signature,
            &args,
            depth,
        )
        .enter()
    }
}
