//! Control reuse across requests
//!
//! Frequently created controls can be drawn from a [`ControlPool`] shared by
//! all requests. A control goes back into the pool when it is disposed and is
//! reset to its default state when it is handed out again.

use core::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::control::Control;

/// Idle controls kept per concrete type by default
pub const DEFAULT_MAX_IDLE_PER_TYPE: usize = 128;

/// Controls that may be recycled through a [`ControlPool`]
pub trait Poolable: Control + Default {
    /// Return to the freshly constructed state
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reuse statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub released: u64,
}

/// Arena of idle controls keyed by concrete type
#[derive(Debug)]
pub struct ControlPool {
    idle: Mutex<HashMap<TypeId, Vec<Box<dyn Control>>>>,
    max_idle_per_type: usize,
    created: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
}

impl ControlPool {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE_PER_TYPE)
    }

    pub fn with_max_idle(max_idle_per_type: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_type,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Take an idle `C`, reset, or construct a new one
    pub fn acquire<C: Poolable>(&self) -> Box<C> {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_mut(&TypeId::of::<C>())
            .and_then(Vec::pop);

        if let Some(control) = recycled {
            if let Ok(mut control) = control.into_any().downcast::<C>() {
                control.reset();
                self.reused.fetch_add(1, Ordering::Relaxed);
                return control;
            }
        }

        self.created.fetch_add(1, Ordering::Relaxed);
        Box::new(C::default())
    }

    /// Hand a disposed control back for reuse
    pub fn release(&self, control: Box<dyn Control>) {
        let type_id = (*control).as_any().type_id();
        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = idle.entry(type_id).or_default();
        if bucket.len() < self.max_idle_per_type {
            bucket.push(control);
            self.released.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Idle controls of type `C`
    pub fn idle_count<C: Poolable>(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&TypeId::of::<C>())
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}

impl Default for ControlPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlId, ControlState, ControlTree};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    impl Control for Counter {}
    impl Poolable for Counter {}

    #[derive(Default)]
    struct Root;
    impl Control for Root {}

    #[test]
    fn test_acquire_resets_recycled_control() {
        let pool = ControlPool::new();
        let mut counter = pool.acquire::<Counter>();
        counter.hits = 5;
        pool.release(counter);
        assert_eq!(pool.idle_count::<Counter>(), 1);

        let counter = pool.acquire::<Counter>();
        assert_eq!(counter.hits, 0);
        assert_eq!(
            pool.stats(),
            PoolStats {
                created: 1,
                reused: 1,
                released: 1
            }
        );
    }

    #[test]
    fn test_disposal_returns_pooled_controls() {
        let pool = Arc::new(ControlPool::new());
        let mut tree = ControlTree::new(Root);
        tree.set_pool(Arc::clone(&pool));
        let root = tree.root();

        let pooled = tree.acquire::<Counter>();
        tree.add_child(root, pooled).unwrap();
        tree.advance_subtree(root, ControlState::Loaded).unwrap();
        assert_eq!(pool.idle_count::<Counter>(), 0);

        tree.advance_subtree(root, ControlState::Disposed).unwrap();
        assert_eq!(pool.idle_count::<Counter>(), 1);
        assert_eq!(tree.state(pooled).unwrap(), ControlState::Disposed);
    }

    /// Removes itself while its own `on_load` hook runs
    #[derive(Default)]
    struct SelfRemover {
        disposed: Option<Arc<AtomicUsize>>,
    }

    impl Control for SelfRemover {
        fn on_load(&mut self, tree: &mut ControlTree, id: ControlId) -> crate::Result<()> {
            tree.remove(id)
        }

        fn on_dispose(&mut self) {
            if let Some(disposed) = &self.disposed {
                disposed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl Poolable for SelfRemover {}

    #[test]
    fn test_control_removed_by_own_hook_is_released() {
        let pool = Arc::new(ControlPool::new());
        let disposed = Arc::new(AtomicUsize::new(0));
        let mut tree = ControlTree::new(Root);
        tree.set_pool(Arc::clone(&pool));
        let root = tree.root();

        let remover = tree.acquire::<SelfRemover>();
        if let Some(control) = tree.get_mut::<SelfRemover>(remover) {
            control.disposed = Some(Arc::clone(&disposed));
        }
        tree.add_child(root, remover).unwrap();
        tree.advance_subtree(root, ControlState::Loaded).unwrap();

        assert!(!tree.contains(remover));
        assert!(tree.children(root).is_empty());
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count::<SelfRemover>(), 1);
        assert_eq!(pool.stats().released, 1);
    }

    #[test]
    fn test_idle_limit_per_type() {
        let pool = ControlPool::with_max_idle(1);
        pool.release(Box::new(Counter::default()));
        pool.release(Box::new(Counter::default()));
        assert_eq!(pool.idle_count::<Counter>(), 1);
    }
}
