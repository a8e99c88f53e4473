//! Queued publish/subscribe event bus
//!
//! `publish` appends to a FIFO queue. When no drain is running the queue is
//! drained immediately in a flat loop: each popped event is dispatched to a
//! snapshot of its subscribers taken at pop time, so handlers may publish,
//! subscribe or unsubscribe freely. Events published from inside a handler
//! are delivered after the current event, before the outermost `publish`
//! returns.
//!
//! The bus is a cheap `Rc` handle and deliberately `!Send`: every call must
//! come from the one context that owns the simulation tick.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{error, trace};

use crate::game::entity::{EntityId, EntityKind};
use crate::game::state::{EndReason, Stat};
use crate::util::vec2::Vec2;

/// A simulation event
///
/// Immutable once queued; identity is its position in the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new run began and stats were reset
    RunStarted,
    /// The active run ended
    GameOver {
        reason: EndReason,
        level: u32,
        currency_earned: u64,
    },
    /// The parasite reached a new level
    LevelUp { level: u32 },
    /// Biomass was added to the run
    BiomassGained { amount: f32, total: f32 },
    /// The parasite size multiplier changed
    SizeChanged { old: f32, new: f32 },
    /// A stat was modified by an upgrade
    StatChanged { stat: Stat, value: f32 },
    /// A body lost health
    Damaged {
        entity: EntityId,
        amount: f32,
        health: f32,
    },
    /// The parasite regained health
    Healed { amount: f32, health: f32 },
    /// A body reached zero health
    EntityDied { entity: EntityId, kind: EntityKind },
    /// A nutrient was consumed
    PickupCollected { entity: EntityId, biomass: f32 },
    /// A hostile cell was destroyed during the run
    CellCleared { total: u32 },
    /// A body bounced off an arena wall hard enough to report
    WallHit {
        entity: EntityId,
        point: Vec2,
        /// Speed along the wall normal after the bounce, not `|velocity|`;
        /// a glancing hit reports a small value even when the body is fast
        speed: f32,
    },
    /// A named global force was added, replaced (`Some`) or removed (`None`)
    GlobalForceChanged { id: String, force: Option<Vec2> },
    /// An unlock was bought with persistent currency
    UnlockPurchased { id: String, remaining_currency: u64 },
    Paused,
    Resumed,
}

/// Event type tag used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStarted,
    GameOver,
    LevelUp,
    BiomassGained,
    SizeChanged,
    StatChanged,
    Damaged,
    Healed,
    EntityDied,
    PickupCollected,
    CellCleared,
    WallHit,
    GlobalForceChanged,
    UnlockPurchased,
    Paused,
    Resumed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RunStarted => EventKind::RunStarted,
            Event::GameOver { .. } => EventKind::GameOver,
            Event::LevelUp { .. } => EventKind::LevelUp,
            Event::BiomassGained { .. } => EventKind::BiomassGained,
            Event::SizeChanged { .. } => EventKind::SizeChanged,
            Event::StatChanged { .. } => EventKind::StatChanged,
            Event::Damaged { .. } => EventKind::Damaged,
            Event::Healed { .. } => EventKind::Healed,
            Event::EntityDied { .. } => EventKind::EntityDied,
            Event::PickupCollected { .. } => EventKind::PickupCollected,
            Event::CellCleared { .. } => EventKind::CellCleared,
            Event::WallHit { .. } => EventKind::WallHit,
            Event::GlobalForceChanged { .. } => EventKind::GlobalForceChanged,
            Event::UnlockPurchased { .. } => EventKind::UnlockPurchased,
            Event::Paused => EventKind::Paused,
            Event::Resumed => EventKind::Resumed,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler = Rc<RefCell<dyn FnMut(&Event)>>;

struct Subscriber {
    token: SubscriptionToken,
    once: bool,
    handler: Handler,
}

/// Subscribers invoked for one event, captured when the event is popped
type Snapshot = SmallVec<[(SubscriptionToken, bool, Handler); 4]>;

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<EventKind, Vec<Subscriber>>,
    queue: VecDeque<Event>,
    draining: bool,
    holds: u32,
    next_token: u64,
    handler_failures: u64,
    delivered: u64,
}

/// Queued, reentrant-safe event bus
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every future event of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + 'static,
    {
        self.add_subscriber(kind, Rc::new(RefCell::new(handler)), false)
    }

    /// Register a handler removed right after its first invocation
    pub fn subscribe_once<F>(&self, kind: EventKind, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + 'static,
    {
        self.add_subscriber(kind, Rc::new(RefCell::new(handler)), true)
    }

    fn add_subscriber(&self, kind: EventKind, handler: Handler, once: bool) -> SubscriptionToken {
        let mut inner = self.inner.borrow_mut();
        inner.next_token += 1;
        let token = SubscriptionToken(inner.next_token);
        inner.subscribers.entry(kind).or_default().push(Subscriber {
            token,
            once,
            handler,
        });
        token
    }

    /// Remove a subscription; returns false when the token is unknown or already removed
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut inner = self.inner.borrow_mut();
        for subscribers in inner.subscribers.values_mut() {
            if let Some(idx) = subscribers.iter().position(|s| s.token == token) {
                subscribers.remove(idx);
                return true;
            }
        }
        false
    }

    /// Queue an event, draining immediately unless a drain or hold is active
    ///
    /// Outside a drain or hold the event and everything its handlers publish
    /// are delivered before `publish` returns. So with no hold, publishing A
    /// then B where handling A publishes C delivers A, C, B. Publish under
    /// `hold()` to have a batch delivered in publish order (A, B, C).
    pub fn publish(&self, event: Event) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.queue.push_back(event);
            if inner.draining || inner.holds > 0 {
                return;
            }
            inner.draining = true;
        }
        self.drain();
    }

    /// Defer draining until the returned guard (and any nested guards) drop
    ///
    /// Events published meanwhile are delivered in publish order when the
    /// last guard is released.
    pub fn hold(&self) -> DrainHold {
        self.inner.borrow_mut().holds += 1;
        DrainHold { bus: self.clone() }
    }

    fn release(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.holds = inner.holds.saturating_sub(1);
            if inner.holds > 0 || inner.draining || inner.queue.is_empty() {
                return;
            }
            inner.draining = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let (event, snapshot) = {
                let mut inner = self.inner.borrow_mut();
                let Some(event) = inner.queue.pop_front() else {
                    inner.draining = false;
                    return;
                };
                let snapshot: Snapshot = inner
                    .subscribers
                    .get(&event.kind())
                    .map(|subs| {
                        subs.iter()
                            .map(|s| (s.token, s.once, s.handler.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                inner.delivered += 1;
                (event, snapshot)
            };

            trace!(kind = ?event.kind(), subscribers = snapshot.len(), "dispatching event");

            for (token, once, handler) in snapshot {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    let mut handler = handler.borrow_mut();
                    (&mut *handler)(&event)
                }));

                if once {
                    self.unsubscribe(token);
                }

                if result.is_err() {
                    self.inner.borrow_mut().handler_failures += 1;
                    error!(kind = ?event.kind(), ?token, "event handler panicked; continuing drain");
                }
            }
        }
    }

    /// Drop every subscriber and every pending event
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.clear();
        inner.queue.clear();
    }

    /// Number of queued, undelivered events
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .borrow()
            .subscribers
            .get(&kind)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Handler invocations that panicked and were isolated
    pub fn handler_failures(&self) -> u64 {
        self.inner.borrow().handler_failures
    }

    /// Events popped from the queue so far
    pub fn delivered(&self) -> u64 {
        self.inner.borrow().delivered
    }
}

/// Guard returned by `EventBus::hold`
pub struct DrainHold {
    bus: EventBus,
}

impl Drop for DrainHold {
    fn drop(&mut self) {
        self.bus.release();
    }
}
