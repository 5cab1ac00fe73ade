//! Account change notifications
//!
//! Each backend owns a [`ListenerRegistry`]. Subscribing returns an
//! [`Unwatch`] handle; the controller combines one handle per backend into an
//! [`AccountWatch`]. [`AccountChangeStream`] adapts the callback API to an
//! async stream.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use tokio::sync::mpsc;

use crate::types::Account;

/// Callback invoked with `(current, previous)` account state
pub type AccountListener = Arc<dyn Fn(&Account, &Account) + Send + Sync>;

/// Lock a mutex, recovering the data if a listener panicked while it was held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, AccountListener)>,
}

/// Listener list owned by one backend
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: AccountListener) -> Unwatch {
        let mut listeners = lock(&self.inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));

        Unwatch {
            target: Some((Arc::downgrade(&self.inner), id)),
            done: AtomicBool::new(false),
        }
    }

    /// Invoke every listener in subscription order.
    ///
    /// The list is snapshotted first so listeners may subscribe or unwatch
    /// from inside the callback.
    pub fn notify(&self, current: &Account, previous: &Account) {
        let snapshot: Vec<AccountListener> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(current, previous);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle removing one listener from one backend
pub struct Unwatch {
    target: Option<(Weak<Mutex<Listeners>>, u64)>,
    done: AtomicBool,
}

impl Unwatch {
    /// Handle for a backend that never emits changes
    pub fn inert() -> Self {
        Self {
            target: None,
            done: AtomicBool::new(false),
        }
    }

    /// Remove the listener. Later calls do nothing.
    pub fn unwatch(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some((registry, id)) = &self.target else {
            return;
        };
        if let Some(registry) = registry.upgrade() {
            lock(&registry).entries.retain(|(entry, _)| entry != id);
        }
    }

    pub fn is_unwatched(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Unwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unwatch")
            .field("id", &self.target.as_ref().map(|(_, id)| *id))
            .field("done", &self.is_unwatched())
            .finish()
    }
}

/// Combined watch over every configured backend
#[derive(Debug, Default)]
pub struct AccountWatch {
    handles: Vec<Unwatch>,
}

impl AccountWatch {
    pub(crate) fn new(handles: Vec<Unwatch>) -> Self {
        Self { handles }
    }

    /// Unwatch every backend, in the order they were subscribed
    pub fn unwatch(&self) {
        for handle in &self.handles {
            handle.unwatch();
        }
    }

    /// Number of backends watched
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

// =========================================================================
// Stream Adapter
// =========================================================================

/// One observed account change
#[derive(Debug, Clone)]
pub struct AccountChange {
    pub current: Account,
    pub previous: Account,
    pub observed_at: DateTime<Utc>,
}

/// Stream of account changes across all backends
pub type AccountChangeStream = Pin<Box<dyn Stream<Item = AccountChange> + Send>>;

struct UnwatchOnDrop(AccountWatch);

impl Drop for UnwatchOnDrop {
    fn drop(&mut self) {
        self.0.unwatch();
    }
}

/// Bridge a callback subscription into a stream that unwatches when dropped
pub(crate) fn change_stream(
    subscribe: impl FnOnce(AccountListener) -> AccountWatch,
) -> AccountChangeStream {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener: AccountListener = Arc::new(move |current: &Account, previous: &Account| {
        let _ = tx.send(AccountChange {
            current: current.clone(),
            previous: previous.clone(),
            observed_at: Utc::now(),
        });
    });
    let guard = UnwatchOnDrop(subscribe(listener));

    Box::pin(async_stream::stream! {
        let _guard = guard;
        while let Some(change) = rx.recv().await {
            yield change;
        }
    })
}
