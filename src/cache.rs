use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Mutex;

use rhai::{Engine, Scope};

use crate::error::LoadError;
use crate::loader::{ScriptDescriptor, ScriptLoader};

/// Index of a descriptor within its owning cache. Descriptors are never
/// removed or reordered, so a ref stays valid for the cache's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRef(usize);

#[derive(Default)]
struct CacheInner {
    by_name: HashMap<String, ScriptRef>,
    descriptors: Vec<Rc<ScriptDescriptor>>,
}

/// Load-once script cache owned by a single worker.
///
/// The first `ensure_loaded` for a name compiles the script and runs its
/// top-level body; every later call returns the stored descriptor without
/// re-executing anything. The internal mutex only guards the growth path:
/// each cache is private to one worker thread under the current
/// population-then-run sequencing, so the lock is a deliberate
/// invariant-holder rather than a cross-thread ordering point. Scripts are
/// not deduplicated across workers; every worker initializes its own copy.
pub struct ScriptCache {
    loader: ScriptLoader,
    inner: Mutex<CacheInner>,
}

impl ScriptCache {
    pub fn new(loader: ScriptLoader) -> Self {
        Self { loader, inner: Mutex::new(CacheInner::default()) }
    }

    /// Returns the ref for `name`, loading and initializing the script on the
    /// first request. Idempotent per name: the initializer runs exactly once
    /// no matter how many calls follow.
    pub fn ensure_loaded(
        &self,
        engine: &Engine,
        scope: &mut Scope,
        name: &str,
    ) -> Result<ScriptRef, LoadError> {
        let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(script) = inner.by_name.get(name) {
            return Ok(*script);
        }
        let descriptor = self.loader.load_and_initialize(engine, scope, name)?;
        let script = ScriptRef(inner.descriptors.len());
        inner.descriptors.push(Rc::new(descriptor));
        inner.by_name.insert(name.to_string(), script);
        Ok(script)
    }

    /// Resolves a ref handed out by this cache. Cheap: clones the `Rc`, never
    /// the descriptor.
    pub fn descriptor(&self, script: ScriptRef) -> Rc<ScriptDescriptor> {
        let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        Rc::clone(&inner.descriptors[script.0])
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|err| err.into_inner()).descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
