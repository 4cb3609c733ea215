//! Listener registries for change notifications.
//!
//! Every observable object in the crate owns an [`Emitter`]. Observers
//! register closures and get back a [`ListenerId`]; long-lived observers keep
//! a [`Subscription`], which holds only a weak handle to the emitter and
//! unregisters itself when dropped.
//!
//! Emission is synchronous. Handlers may register or unregister listeners
//! (including themselves) while an event is being delivered; such changes
//! take effect once the current emission finishes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifier of a registered listener, unique within its emitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Handler<E> = Box<dyn FnMut(&E) -> bool>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(ListenerId, Handler<E>)>,
    // Listeners checked out by a running `emit`.
    emitting: Vec<ListenerId>,
    // Listeners removed while their handler list was checked out by `emit`.
    removed: Vec<ListenerId>,
    depth: usize,
}

/// Synchronous event channel with an explicit listener registry.
pub struct Emitter<E> {
    registry: RefCell<Registry<E>>,
}

impl<E> Emitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(Registry {
                next_id: 1,
                listeners: Vec::new(),
                emitting: Vec::new(),
                removed: Vec::new(),
                depth: 0,
            }),
        }
    }

    /// Register a handler that stays until [`off`](Self::off) is called.
    pub fn on<F>(&self, mut handler: F) -> ListenerId
    where
        F: FnMut(&E) + 'static,
    {
        self.on_while(move |event| {
            handler(event);
            true
        })
    }

    /// Register a handler that unregisters itself by returning `false`.
    ///
    /// Observers holding weak references use this to drop out once their
    /// target is gone.
    pub fn on_while<F>(&self, handler: F) -> ListenerId
    where
        F: FnMut(&E) -> bool + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, Box::new(handler)));
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        if let Some(index) = registry.listeners.iter().position(|(lid, _)| *lid == id) {
            registry.listeners.remove(index);
            return true;
        }
        if registry.emitting.contains(&id) && !registry.removed.contains(&id) {
            registry.removed.push(id);
            return true;
        }
        false
    }

    /// Deliver an event to every listener in registration order.
    pub fn emit(&self, event: &E) {
        let (mut active, taken) = {
            let mut registry = self.registry.borrow_mut();
            registry.depth += 1;
            let active = std::mem::take(&mut registry.listeners);
            let taken: Vec<ListenerId> = active.iter().map(|(id, _)| *id).collect();
            registry.emitting.extend_from_slice(&taken);
            (active, taken)
        };

        active.retain_mut(|(id, handler)| {
            if self.registry.borrow().removed.contains(id) {
                return false;
            }
            let keep = handler(event);
            if !keep {
                self.registry.borrow_mut().emitting.retain(|live| *live != *id);
            }
            keep
        });

        let mut registry = self.registry.borrow_mut();
        registry.depth -= 1;
        registry.emitting.retain(|id| !taken.contains(id));
        active.append(&mut registry.listeners);
        if registry.depth == 0 {
            let removed = std::mem::take(&mut registry.removed);
            active.retain(|(id, _)| !removed.contains(id));
        }
        registry.listeners = active;
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.len())
            .finish()
    }
}

/// A registered listener on a shared emitter.
///
/// Holds the emitter weakly: the subscription never keeps the observed
/// object alive. Dropping the subscription unregisters the listener.
pub struct Subscription<E> {
    channel: Weak<Emitter<E>>,
    id: ListenerId,
}

impl<E> Subscription<E> {
    #[must_use]
    pub fn new(channel: &Rc<Emitter<E>>, id: ListenerId) -> Self {
        Self {
            channel: Rc::downgrade(channel),
            id,
        }
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether this subscription listens on `channel`.
    #[must_use]
    pub fn is_on(&self, channel: &Rc<Emitter<E>>) -> bool {
        Weak::ptr_eq(&self.channel, &Rc::downgrade(channel))
    }

    /// Whether the observed emitter still exists.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.channel.strong_count() > 0
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.off(self.id);
        }
    }
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}
