//! The live filter.
//!
//! A [`LiveFilter`] keeps the rows of a keyed source that pass a predicate.
//! Steady-state changes arrive as insert/update/delete events and are applied
//! one row at a time. A predicate change or a refetch signal only marks the
//! view dirty; the next read or event performs a single full refilter over
//! the source.
//!
//! Nothing is scanned until the first read, the first event, or an explicit
//! [`LiveFilter::populate`]. Without a predicate the output stays empty and
//! events are ignored.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::error::{ViewError, ViewResult};
use crate::source::{EventSource, Registration};
use crate::storage::{FilterStorage, MapStorage};

/// Row predicate. Two predicates are the same if they are the same `Arc`.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Wraps a closure as a [`Predicate`].
pub fn predicate<T>(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Predicate<T> {
    Arc::new(f)
}

/// Returns the full contents of the source collection.
pub type SourceFn<K, T> = Box<dyn Fn() -> Vec<(K, T)> + Send + Sync>;

struct FilterState<S, T> {
    storage: S,
    predicate: Option<Predicate<T>>,
    initialized: bool,
    dirty: bool,
    disposed: bool,
    refilters: u64,
}

type StateGuard<'a, S, T> = MutexGuard<'a, FilterState<S, T>>;

struct Shared<K, T, S> {
    state: Mutex<FilterState<S, T>>,
    source: SourceFn<K, T>,
}

impl<K, T, S> Shared<K, T, S>
where
    K: Clone,
    T: Clone,
    S: FilterStorage<K, T>,
{
    /// Runs the pending full refilter, if any.
    fn refresh(&self, state: &mut FilterState<S, T>) {
        if state.initialized && !state.dirty {
            return;
        }
        state.initialized = true;
        state.dirty = false;
        state.storage.clear();

        let Some(predicate) = state.predicate.clone() else {
            return;
        };
        for (key, row) in (self.source)() {
            if predicate(&row) {
                state.storage.set(key, row);
            }
        }
        state.refilters += 1;
        debug!(rows = state.storage.len(), pass = state.refilters, "full refilter");
    }

    /// Locks the state for an event; `None` if the event should be ignored.
    fn prepare(&self) -> Option<(StateGuard<'_, S, T>, Predicate<T>)> {
        let mut state = self.state.lock();
        if state.disposed {
            trace!("event after dispose ignored");
            return None;
        }
        let predicate = state.predicate.clone()?;
        self.refresh(&mut state);
        Some((state, predicate))
    }

    fn on_insert(&self, key: &K, row: &T) {
        if let Some((mut state, predicate)) = self.prepare() {
            if predicate(row) {
                state.storage.set(key.clone(), row.clone());
            }
        }
    }

    fn on_update(&self, old_key: &K, new_key: &K, row: &T) {
        if let Some((mut state, predicate)) = self.prepare() {
            if predicate(row) {
                state.storage.update(old_key, new_key.clone(), row.clone());
            } else {
                state.storage.delete(old_key);
            }
        }
    }

    fn on_delete(&self, key: &K) {
        if let Some((mut state, _)) = self.prepare() {
            state.storage.delete(key);
        }
    }

    fn on_refetch(&self) {
        let mut state = self.state.lock();
        if !state.disposed {
            state.dirty = true;
        }
    }
}

/// A filtered view over a keyed source, maintained incrementally.
///
/// Dropping the filter disposes it.
pub struct LiveFilter<K, T, S = MapStorage<K, T>> {
    shared: Arc<Shared<K, T, S>>,
    events: Box<dyn EventSource<K, T>>,
    registrations: Mutex<Vec<Registration>>,
}

impl<K, T, S> LiveFilter<K, T, S>
where
    K: Clone + 'static,
    T: Clone + 'static,
    S: FilterStorage<K, T> + Send + 'static,
{
    /// Creates a filter and registers its handlers with `events`.
    ///
    /// `source` must return the current contents of the source collection;
    /// it is called only for full refilters. Predicates and the source must
    /// not call back into this filter.
    pub fn new(
        source: impl Fn() -> Vec<(K, T)> + Send + Sync + 'static,
        predicate: Option<Predicate<T>>,
        events: impl EventSource<K, T> + 'static,
        storage: S,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(FilterState {
                storage,
                predicate,
                initialized: false,
                dirty: false,
                disposed: false,
                refilters: 0,
            }),
            source: Box::new(source),
        });

        let mut registrations = Vec::new();
        let weak = Arc::downgrade(&shared);
        registrations.extend(events.register_insert(Box::new(move |key: &K, row: &T| {
            if let Some(shared) = weak.upgrade() {
                shared.on_insert(key, row);
            }
        })));
        let weak = Arc::downgrade(&shared);
        registrations.extend(events.register_update(Box::new(
            move |old_key: &K, new_key: &K, row: &T| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_update(old_key, new_key, row);
                }
            },
        )));
        let weak = Arc::downgrade(&shared);
        registrations.extend(events.register_delete(Box::new(move |key: &K| {
            if let Some(shared) = weak.upgrade() {
                shared.on_delete(key);
            }
        })));
        let weak: Weak<Shared<K, T, S>> = Arc::downgrade(&shared);
        registrations.extend(events.register_refetch(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_refetch();
            }
        })));

        Self {
            shared,
            events: Box::new(events),
            registrations: Mutex::new(registrations),
        }
    }

    /// Replaces the predicate.
    ///
    /// Passing the predicate already in use is not a change. Removing the
    /// predicate empties the output at once; setting a new one schedules a
    /// full refilter.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn set_predicate(&self, predicate: Option<Predicate<T>>) -> ViewResult<()> {
        let mut state = self.live_state()?;
        let unchanged = match (&state.predicate, &predicate) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        state.predicate = predicate;
        if state.predicate.is_none() {
            state.storage.clear();
            state.dirty = false;
            state.initialized = true;
        } else {
            state.dirty = true;
        }
        Ok(())
    }

    /// Marks the source as replaced; the next read recomputes the output.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn refetch(&self) -> ViewResult<()> {
        self.live_state()?.dirty = true;
        Ok(())
    }

    /// Runs the initial population (or any pending refilter) now.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn populate(&self) -> ViewResult<()> {
        self.with_output(|_| ())
    }

    /// A copy of the filtered output.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn snapshot(&self) -> ViewResult<S::Snapshot> {
        self.with_output(|storage| storage.snapshot())
    }

    /// Number of rows in the output.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn len(&self) -> ViewResult<usize> {
        self.with_output(|storage| storage.len())
    }

    /// Returns true if the output is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn is_empty(&self) -> ViewResult<bool> {
        self.with_output(|storage| storage.is_empty())
    }

    /// Returns true if `key` is in the output.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn contains(&self, key: &K) -> ViewResult<bool> {
        self.with_output(|storage| storage.contains(key))
    }

    /// Reads the output in place.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Disposed`] after [`LiveFilter::dispose`].
    pub fn with_output<R>(&self, f: impl FnOnce(&S) -> R) -> ViewResult<R> {
        let mut state = self.live_state()?;
        self.shared.refresh(&mut state);
        Ok(f(&state.storage))
    }

    fn live_state(&self) -> ViewResult<StateGuard<'_, S, T>> {
        let state = self.shared.state.lock();
        if state.disposed {
            return Err(ViewError::Disposed);
        }
        Ok(state)
    }
}

impl<K, T, S> LiveFilter<K, T, S> {
    /// The predicate in use.
    pub fn predicate(&self) -> Option<Predicate<T>> {
        self.shared.state.lock().predicate.clone()
    }

    /// Returns true if a full refilter is pending.
    pub fn is_dirty(&self) -> bool {
        self.shared.state.lock().dirty
    }

    /// Number of full refilter passes run so far.
    pub fn refilter_count(&self) -> u64 {
        self.shared.state.lock().refilters
    }

    /// Returns true once the filter has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    /// Removes every event registration and runs the source's cleanup hook.
    ///
    /// Later events are ignored and reads fail. Calling this twice is a no-op.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
        }

        let registrations = std::mem::take(&mut *self.registrations.lock());
        let count = registrations.len();
        for unregister in registrations {
            unregister();
        }
        self.events.cleanup();
        debug!(registrations = count, "live filter disposed");
    }
}

impl<K, T, S> Drop for LiveFilter<K, T, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<K, T, S> std::fmt::Debug for LiveFilter<K, T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("LiveFilter")
            .field("has_predicate", &state.predicate.is_some())
            .field("initialized", &state.initialized)
            .field("dirty", &state.dirty)
            .field("disposed", &state.disposed)
            .finish()
    }
}
