//! # Event Bus
//!
//! Explicit publish/subscribe channels keyed by event kind.
//!
//! Each kind's subscribers live in a [`DenseSet`] walked with its cursor, so a
//! listener may unsubscribe itself or any other listener while being notified.
//! Publishing a kind that is already being notified is deferred and delivered
//! once the outermost notification returns, in publication order.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::collections::DenseSet;
use crate::error::CoreError;
use crate::schedule::TypeKey;
use crate::usage;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw id value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a listener learns about the event besides its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext<K> {
    kind: K,
    sender: Option<TypeKey>,
}

impl<K: Copy> EventContext<K> {
    /// The event kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> K {
        self.kind
    }

    /// Type of the publisher, when published with [`EventBus::publish_from`].
    #[inline]
    #[must_use]
    pub fn sender(&self) -> Option<TypeKey> {
        self.sender
    }
}

type Listener<K, P> = Rc<RefCell<dyn FnMut(&EventContext<K>, &P)>>;

/// Publish/subscribe channels keyed by `K`, carrying payloads of type `P`.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use orrery_core::EventBus;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Kind { Launched }
///
/// let bus: EventBus<Kind, u32> = EventBus::new();
/// let total = Rc::new(Cell::new(0));
/// let sink = Rc::clone(&total);
/// bus.subscribe(Kind::Launched, move |_, count| sink.set(sink.get() + count));
///
/// assert_eq!(bus.publish(Kind::Launched, 3), 1);
/// assert_eq!(total.get(), 3);
/// ```
pub struct EventBus<K, P> {
    next_id: Cell<u64>,
    listeners: RefCell<HashMap<SubscriptionId, (K, Listener<K, P>)>>,
    channels: RefCell<HashMap<K, DenseSet<SubscriptionId>>>,
    deferred: RefCell<VecDeque<(EventContext<K>, P)>>,
    /// Number of notifications in progress.
    depth: Cell<usize>,
}

impl<K, P> Default for EventBus<K, P> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(HashMap::new()),
            channels: RefCell::new(HashMap::new()),
            deferred: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
        }
    }
}

impl<K, P> EventBus<K, P>
where
    K: Copy + Eq + Hash + fmt::Debug + 'static,
    P: 'static,
{
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `kind`.
    ///
    /// A listener added while `kind` is being notified receives the event in
    /// progress too.
    pub fn subscribe(
        &self,
        kind: K,
        listener: impl FnMut(&EventContext<K>, &P) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let listener: Listener<K, P> = Rc::new(RefCell::new(listener));
        self.listeners.borrow_mut().insert(id, (kind, listener));
        self.channels.borrow_mut().entry(kind).or_default().add(id);

        tracing::trace!(?kind, subscription = %id, "subscribed");
        id
    }

    /// Removes a subscription. Safe from inside any listener.
    ///
    /// # Returns
    ///
    /// `false` if the subscription was unknown (already removed).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some((kind, _)) = self.listeners.borrow_mut().remove(&id) else {
            return false;
        };
        if let Some(set) = self.channels.borrow_mut().get_mut(&kind) {
            set.remove(&id);
        }
        tracing::trace!(?kind, subscription = %id, "unsubscribed");
        true
    }

    /// Publishes an anonymous event.
    ///
    /// # Returns
    ///
    /// Listeners notified by this call; 0 when delivery was deferred.
    pub fn publish(&self, kind: K, payload: P) -> usize {
        self.dispatch(EventContext { kind, sender: None }, payload)
    }

    /// Publishes an event on behalf of `sender`.
    pub fn publish_from(&self, sender: TypeKey, kind: K, payload: P) -> usize {
        self.dispatch(
            EventContext {
                kind,
                sender: Some(sender),
            },
            payload,
        )
    }

    /// Number of listeners subscribed to `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: K) -> usize {
        self.channels.borrow().get(&kind).map_or(0, DenseSet::len)
    }

    /// Number of events waiting for the outermost notification to return.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Removes every subscription. Pending events are dropped.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
        for set in self.channels.borrow_mut().values_mut() {
            set.clear();
        }
        self.deferred.borrow_mut().clear();
    }

    fn dispatch(&self, ctx: EventContext<K>, payload: P) -> usize {
        let delivered = self.deliver(ctx, payload);
        if self.depth.get() == 0 {
            self.drain_deferred();
        }
        delivered
    }

    fn drain_deferred(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some((ctx, payload)) = next else {
                break;
            };
            self.deliver(ctx, payload);
        }
    }

    fn deliver(&self, ctx: EventContext<K>, payload: P) -> usize {
        {
            let mut channels = self.channels.borrow_mut();
            let Some(set) = channels.get_mut(&ctx.kind) else {
                return 0;
            };
            if set.is_empty() {
                return 0;
            }
            if set.is_enumerating() {
                drop(channels);
                tracing::trace!(kind = ?ctx.kind, "deferring event published during its own notification");
                self.deferred.borrow_mut().push_back((ctx, payload));
                return 0;
            }
            if let Err(error) = set.begin_enumeration() {
                usage::report(&error);
                return 0;
            }
        }

        self.depth.set(self.depth.get() + 1);
        let mut delivered = 0;
        loop {
            let next = self
                .channels
                .borrow_mut()
                .get_mut(&ctx.kind)
                .and_then(DenseSet::next_enumerated);
            let Some(id) = next else {
                break;
            };

            let listener = self
                .listeners
                .borrow()
                .get(&id)
                .map(|(_, listener)| Rc::clone(listener));
            let Some(listener) = listener else {
                continue;
            };

            match listener.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(&ctx, &payload);
                    delivered += 1;
                }
                Err(_) => usage::report(&CoreError::ReentrantListener { subscription: id.raw() }),
            };
        }
        self.depth.set(self.depth.get() - 1);

        if let Some(set) = self.channels.borrow_mut().get_mut(&ctx.kind) {
            set.end_enumeration();
        }
        delivered
    }
}

impl<K: fmt::Debug, P> fmt::Debug for EventBus<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.listeners.borrow().len())
            .field("channels", &self.channels.borrow().keys().collect::<Vec<_>>())
            .field("pending", &self.deferred.borrow().len())
            .finish()
    }
}
