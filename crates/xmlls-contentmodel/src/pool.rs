//! Grammar pool: the cache of parsed grammars shared across documents.
//!
//! [`XmlGrammarPool`] is the shared store. A validation pass talks to it
//! through a [`GrammarPoolWrapper`], which remembers what the pass cached
//! so a failed pass can take it back out.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::grammar::{Grammar, GrammarDescription, GrammarType};

pub trait GrammarPool: Send + Sync {
    /// Every cached grammar of `grammar_type`.
    fn retrieve_initial_grammar_set(&self, grammar_type: GrammarType) -> Vec<Arc<Grammar>>;

    /// Add grammars; ignored while the pool is locked.
    fn cache_grammars(&self, grammar_type: GrammarType, grammars: &[Arc<Grammar>]);

    fn retrieve_grammar(&self, description: &GrammarDescription) -> Option<Arc<Grammar>>;

    /// Remove a grammar and every grammar derived from it.
    fn remove_grammar(&self, description: &GrammarDescription) -> Option<Arc<Grammar>>;

    fn clear(&self);

    /// Remove `descriptions` with everything derived from them, then every
    /// other grammar, as one update.
    fn remove_all(&self, descriptions: &[GrammarDescription]);

    fn lock_pool(&self);

    fn unlock_pool(&self);

    /// Whether two descriptions name the same grammar.
    fn equals(&self, a: &GrammarDescription, b: &GrammarDescription) -> bool {
        PoolKey::of(a) == PoolKey::of(b)
    }

    fn hash_code(&self, description: &GrammarDescription) -> u64 {
        let mut hasher = DefaultHasher::new();
        PoolKey::of(description).hash(&mut hasher);
        hasher.finish()
    }
}

/// What the pool compares descriptions by: schemas by namespace and
/// location, DTDs by location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    grammar_type: GrammarType,
    namespace: Option<String>,
    expanded_system_id: Option<String>,
}

impl PoolKey {
    fn of(description: &GrammarDescription) -> Self {
        let namespace = match description.grammar_type {
            GrammarType::Dtd => None,
            _ => description.namespace.clone(),
        };
        Self {
            grammar_type: description.grammar_type,
            namespace,
            expanded_system_id: description.expanded_system_id.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    grammars: IndexMap<PoolKey, Arc<Grammar>>,
    locked: bool,
}

/// Shared grammar store. Every call takes the lock once, so concurrent
/// readers see the state before or after a mutation, never part of one.
#[derive(Debug, Default)]
pub struct XmlGrammarPool {
    state: RwLock<PoolState>,
}

impl XmlGrammarPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GrammarPool for XmlGrammarPool {
    fn retrieve_initial_grammar_set(&self, grammar_type: GrammarType) -> Vec<Arc<Grammar>> {
        self.state
            .read()
            .grammars
            .values()
            .filter(|grammar| grammar.grammar_type() == grammar_type)
            .cloned()
            .collect()
    }

    fn cache_grammars(&self, grammar_type: GrammarType, grammars: &[Arc<Grammar>]) {
        let mut state = self.state.write();
        if state.locked {
            return;
        }
        for grammar in grammars {
            if grammar.grammar_type() != grammar_type {
                continue;
            }
            let key = PoolKey::of(grammar.description());
            state.grammars.insert(key, Arc::clone(grammar));
        }
    }

    fn retrieve_grammar(&self, description: &GrammarDescription) -> Option<Arc<Grammar>> {
        self.state.read().grammars.get(&PoolKey::of(description)).cloned()
    }

    fn remove_grammar(&self, description: &GrammarDescription) -> Option<Arc<Grammar>> {
        remove_cascading(&mut self.state.write(), description)
    }

    fn clear(&self) {
        self.state.write().grammars.clear();
    }

    fn remove_all(&self, descriptions: &[GrammarDescription]) {
        let mut state = self.state.write();
        for description in descriptions {
            remove_cascading(&mut state, description);
        }
        state.grammars.clear();
    }

    fn lock_pool(&self) {
        self.state.write().locked = true;
    }

    fn unlock_pool(&self) {
        self.state.write().locked = false;
    }
}

fn remove_cascading(state: &mut PoolState, description: &GrammarDescription) -> Option<Arc<Grammar>> {
    let key = PoolKey::of(description);
    let removed = state.grammars.shift_remove(&key);
    state.grammars.retain(|_, grammar| {
        !grammar
            .derived_from()
            .iter()
            .any(|source| PoolKey::of(source) == key)
    });
    if let Some(grammar) = &removed {
        tracing::debug!(
            system_id = ?grammar.description().expanded_system_id,
            "removed grammar from pool"
        );
    }
    removed
}

/// Pool view for one validation pass that tracks the grammars the pass
/// caches.
pub struct GrammarPoolWrapper {
    delegate: Arc<dyn GrammarPool>,
    tracked: Mutex<Vec<GrammarDescription>>,
}

impl GrammarPoolWrapper {
    pub fn new(delegate: Arc<dyn GrammarPool>) -> Self {
        Self {
            delegate,
            tracked: Mutex::new(Vec::new()),
        }
    }

    /// Descriptions of the grammars cached through this wrapper.
    pub fn tracked(&self) -> Vec<GrammarDescription> {
        self.tracked.lock().clone()
    }
}

impl GrammarPool for GrammarPoolWrapper {
    fn retrieve_initial_grammar_set(&self, grammar_type: GrammarType) -> Vec<Arc<Grammar>> {
        self.delegate.retrieve_initial_grammar_set(grammar_type)
    }

    fn cache_grammars(&self, grammar_type: GrammarType, grammars: &[Arc<Grammar>]) {
        let mut tracked = self.tracked.lock();
        tracked.extend(
            grammars
                .iter()
                .filter(|grammar| grammar.grammar_type() == grammar_type)
                .map(|grammar| grammar.description().clone()),
        );
        self.delegate.cache_grammars(grammar_type, grammars);
    }

    fn retrieve_grammar(&self, description: &GrammarDescription) -> Option<Arc<Grammar>> {
        self.delegate.retrieve_grammar(description)
    }

    fn remove_grammar(&self, description: &GrammarDescription) -> Option<Arc<Grammar>> {
        self.delegate.remove_grammar(description)
    }

    /// Remove every tracked grammar and clear the delegate in one update.
    fn clear(&self) {
        let tracked: Vec<GrammarDescription> = self.tracked.lock().drain(..).collect();
        self.delegate.remove_all(&tracked);
    }

    fn remove_all(&self, descriptions: &[GrammarDescription]) {
        self.tracked.lock().clear();
        self.delegate.remove_all(descriptions);
    }

    fn lock_pool(&self) {
        self.delegate.lock_pool();
    }

    fn unlock_pool(&self) {
        self.delegate.unlock_pool();
    }

    fn equals(&self, a: &GrammarDescription, b: &GrammarDescription) -> bool {
        self.delegate.equals(a, b)
    }

    fn hash_code(&self, description: &GrammarDescription) -> u64 {
        self.delegate.hash_code(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CMDocument;

    fn grammar(system_id: &str) -> Arc<Grammar> {
        let description = GrammarDescription::new(GrammarType::Xsd, system_id);
        let cm = Arc::new(CMDocument::new(system_id, GrammarType::Xsd));
        Arc::new(Grammar::new(description, cm))
    }

    fn derived(system_id: &str, source: &str) -> Arc<Grammar> {
        let description = GrammarDescription::new(GrammarType::Xsd, system_id);
        let cm = Arc::new(CMDocument::new(system_id, GrammarType::Xsd));
        Arc::new(
            Grammar::new(description, cm)
                .with_source(GrammarDescription::new(GrammarType::Xsd, source)),
        )
    }

    #[test]
    fn test_cache_and_retrieve() {
        let pool = XmlGrammarPool::new();
        pool.cache_grammars(GrammarType::Xsd, &[grammar("file:///a.xsd")]);
        let desc = GrammarDescription::new(GrammarType::Xsd, "file:///a.xsd");
        assert!(pool.retrieve_grammar(&desc).is_some());
        assert_eq!(pool.retrieve_initial_grammar_set(GrammarType::Xsd).len(), 1);
        assert!(pool.retrieve_initial_grammar_set(GrammarType::Dtd).is_empty());
    }

    #[test]
    fn test_locked_pool_ignores_cache() {
        let pool = XmlGrammarPool::new();
        pool.lock_pool();
        pool.cache_grammars(GrammarType::Xsd, &[grammar("file:///a.xsd")]);
        assert!(pool.is_empty());
        pool.unlock_pool();
        pool.cache_grammars(GrammarType::Xsd, &[grammar("file:///a.xsd")]);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_cascades_to_derived_grammars() {
        let pool = XmlGrammarPool::new();
        pool.cache_grammars(
            GrammarType::Xsd,
            &[
                grammar("file:///common.xsd"),
                derived("file:///main.xsd", "file:///common.xsd"),
                grammar("file:///other.xsd"),
            ],
        );
        let removed =
            pool.remove_grammar(&GrammarDescription::new(GrammarType::Xsd, "file:///common.xsd"));
        assert!(removed.is_some());
        assert_eq!(pool.len(), 1);
        let other = GrammarDescription::new(GrammarType::Xsd, "file:///other.xsd");
        assert!(pool.retrieve_grammar(&other).is_some());
    }

    #[test]
    fn test_dtd_equality_ignores_namespace() {
        let pool = XmlGrammarPool::new();
        let a = GrammarDescription::new(GrammarType::Dtd, "file:///a.dtd")
            .with_namespace(Some("urn:x".into()));
        let b = GrammarDescription::new(GrammarType::Dtd, "file:///a.dtd");
        assert!(pool.equals(&a, &b));
        assert_eq!(pool.hash_code(&a), pool.hash_code(&b));
        let c = GrammarDescription::new(GrammarType::Xsd, "file:///a.dtd")
            .with_namespace(Some("urn:x".into()));
        assert!(!pool.equals(&a, &c));
    }

    #[test]
    fn test_wrapper_clear_removes_tracked_then_delegate() {
        let shared = Arc::new(XmlGrammarPool::new());
        shared.cache_grammars(GrammarType::Xsd, &[grammar("file:///before.xsd")]);

        let wrapper = GrammarPoolWrapper::new(shared.clone());
        wrapper.cache_grammars(GrammarType::Xsd, &[grammar("file:///pass.xsd")]);
        assert_eq!(wrapper.tracked().len(), 1);
        assert_eq!(shared.len(), 2);

        wrapper.clear();
        assert!(wrapper.tracked().is_empty());
        assert!(shared.is_empty());
    }

    #[test]
    fn test_readers_never_see_a_partly_cleared_pool() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let shared = Arc::new(XmlGrammarPool::new());
        let done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let len = shared.retrieve_initial_grammar_set(GrammarType::Xsd).len();
                    if len != 0 && len != 3 {
                        return Some(len);
                    }
                }
                None
            });
            for _ in 0..500 {
                let wrapper = GrammarPoolWrapper::new(shared.clone());
                wrapper.cache_grammars(
                    GrammarType::Xsd,
                    &[
                        grammar("file:///common.xsd"),
                        derived("file:///main.xsd", "file:///common.xsd"),
                        grammar("file:///sibling.xsd"),
                    ],
                );
                wrapper.clear();
            }
            done.store(true, Ordering::Release);
            assert_eq!(reader.join().unwrap(), None);
        });
        assert!(shared.is_empty());
    }
}
