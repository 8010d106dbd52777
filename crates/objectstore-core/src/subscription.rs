//! Put/delete listeners for a single store
//!
//! Listeners are weakly referenced. The registry never keeps a listener
//! alive: hold on to the `Rc` returned when creating the listener for as
//! long as notifications should arrive. Handles whose listener has been
//! dropped are pruned lazily, at the end of the next notification pass.
//!
//! A panicking listener is not caught: the panic propagates to the caller
//! of the notify method and the listener stays registered.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use objectstore_core::{PutListener, Record, SubscriptionRegistry};
//!
//! let registry = SubscriptionRegistry::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! let counter = seen.clone();
//! let listener: PutListener = Rc::new(move |_: &Record| counter.set(counter.get() + 1));
//! registry.subscribe_put(&listener);
//!
//! registry.notify_put(&Default::default());
//! assert_eq!(seen.get(), 1);
//!
//! drop(listener);
//! registry.notify_put(&Default::default());
//! assert_eq!(seen.get(), 1);
//! assert_eq!(registry.put_listener_count(), 0);
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::key::{Key, Record};

/// Listener invoked with the record that was written.
pub type PutListener = Rc<dyn Fn(&Record)>;

/// Listener invoked with the key that was deleted.
pub type DeleteListener = Rc<dyn Fn(&Key)>;

/// Ordered list of weak listener handles.
struct WeakListeners<T: ?Sized> {
    handles: RefCell<Vec<Weak<T>>>,
}

impl<T: ?Sized> WeakListeners<T> {
    fn new() -> Self {
        Self {
            handles: RefCell::new(Vec::new()),
        }
    }

    fn subscribe(&self, listener: &Rc<T>) {
        self.handles.borrow_mut().push(Rc::downgrade(listener));
    }

    fn len(&self) -> usize {
        self.handles.borrow().len()
    }

    /// Invoke every live listener in subscription order, then prune the
    /// handles found dead during this pass.
    ///
    /// Live listeners are collected before any of them runs, so a listener
    /// may subscribe more listeners without conflicting with the pass.
    /// Those are only invoked from the next pass on.
    fn notify(&self, mut invoke: impl FnMut(&T)) -> usize {
        let mut live = Vec::new();
        let mut dead = Vec::new();
        for handle in self.handles.borrow().iter() {
            match handle.upgrade() {
                Some(listener) => live.push(listener),
                None => dead.push(handle.clone()),
            }
        }

        for listener in &live {
            invoke(listener.as_ref());
        }

        if !dead.is_empty() {
            self.handles
                .borrow_mut()
                .retain(|handle| !dead.iter().any(|d| Weak::ptr_eq(d, handle)));
        }
        dead.len()
    }
}

/// Put and delete listeners registered for one store.
pub struct SubscriptionRegistry {
    put_listeners: WeakListeners<dyn Fn(&Record)>,
    delete_listeners: WeakListeners<dyn Fn(&Key)>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            put_listeners: WeakListeners::new(),
            delete_listeners: WeakListeners::new(),
        }
    }

    /// Register a weak handle to a put listener.
    pub fn subscribe_put(&self, listener: &PutListener) {
        self.put_listeners.subscribe(listener);
    }

    /// Register a weak handle to a delete listener.
    pub fn subscribe_delete(&self, listener: &DeleteListener) {
        self.delete_listeners.subscribe(listener);
    }

    /// Register both listeners at once.
    pub fn subscribe(&self, put: &PutListener, delete: &DeleteListener) {
        self.subscribe_put(put);
        self.subscribe_delete(delete);
    }

    /// Notify put listeners about a written record.
    pub fn notify_put(&self, record: &Record) {
        let pruned = self.put_listeners.notify(|listener| listener(record));
        if pruned > 0 {
            debug!(pruned, "Pruned dropped put listeners");
        }
    }

    /// Notify delete listeners about a deleted key.
    pub fn notify_delete(&self, key: &Key) {
        let pruned = self.delete_listeners.notify(|listener| listener(key));
        if pruned > 0 {
            debug!(pruned, "Pruned dropped delete listeners");
        }
    }

    /// Put handles currently held, including dropped ones not yet pruned.
    pub fn put_listener_count(&self) -> usize {
        self.put_listeners.len()
    }

    /// Delete handles currently held, including dropped ones not yet pruned.
    pub fn delete_listener_count(&self) -> usize {
        self.delete_listeners.len()
    }
}
