//! Debounced publish/subscribe.
//!
//! Deliveries are spaced by at least `interval`. A notification arriving inside
//! the window schedules a single deferred flush that delivers the latest state
//! once the window has elapsed. Later notifications inside the same window are
//! coalesced into that flush.
//!
//! `publish_now` and `cancel_pending` start a new generation: a flush scheduled
//! by an older generation wakes up and does nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::warn;

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/** returned by `subscribe`, used to unsubscribe */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Inner<T> {
    /// latest state and its sequence number
    latest: T,
    seq: u64,
    subscribers: Vec<(u64, Subscriber<T>)>,
    next_token: u64,
    last_delivery: Option<Instant>,
    /// a deferred flush is scheduled
    pending: bool,
    /// bumped each time a flush is scheduled or superseded
    generation: u64,
}

/** debounced publisher. Clones share the same subscribers and state. */
pub struct Publisher<T> {
    inner: Arc<Mutex<Inner<T>>>,
    /// sequence number of the last delivered state (deliveries never go backwards)
    delivered: Arc<Mutex<u64>>,
    interval: Duration,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), delivered: self.delivered.clone(), interval: self.interval }
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Publisher")
            .field("interval", &self.interval)
            .field("subscribers", &inner.subscribers.len())
            .field("pending", &inner.pending)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Publisher<T> {
    pub fn new(interval:Duration, initial:T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                latest: initial,
                seq: 0,
                subscribers: Vec::new(),
                next_token: 0,
                last_delivery: None,
                pending: false,
                generation: 0,
            })),
            delivered: Arc::new(Mutex::new(0)),
            interval,
        }
    }

    /** registers an observer. Observers are called from the publishing task
    and must not publish themselves. */
    pub fn subscribe<F>(&self, observer:F) -> SubscriptionToken
    where F: Fn(&T) + Send + Sync + 'static {
        let mut inner = self.inner.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.subscribers.push((token, Arc::new(observer)));
        SubscriptionToken(token)
    }

    /// removes an observer. Returns false if the token is unknown
    pub fn unsubscribe(&self, token:SubscriptionToken) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(t,_)| *t != token.0);
        inner.subscribers.len() != before
    }

    /// latest state (delivered or not)
    pub fn latest(&self) -> T { self.inner.lock().latest.clone() }

    /** publishes a state, rate-limited. Needs a tokio runtime to schedule the
    deferred flush (without one, the state is delivered right away). */
    pub fn notify(&self, state:T) {
        self.notify_unless(state, || false);
    }

    /** like `notify`, but drops the state if `stopped` holds. `stopped` is
    evaluated under the publisher lock, so a producer stopped before a
    `cancel_pending` can never publish after it. Returns false if dropped. */
    pub fn notify_unless<F: FnOnce() -> bool>(&self, state:T, stopped:F) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if stopped() {
            return false;
        }
        inner.seq += 1;
        inner.latest = state;
        if inner.pending {
            return true; // coalesced into the scheduled flush
        }
        if let Some(last) = inner.last_delivery {
            let deadline = last + self.interval;
            if now < deadline {
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        inner.pending = true;
                        inner.generation += 1;
                        let generation = inner.generation;
                        let publisher = self.clone();
                        handle.spawn(async move {
                            sleep_until(deadline).await;
                            publisher.flush_pending(generation);
                        });
                        return true;
                    }
                    Err(_) => warn!("publisher: no runtime to defer the flush, delivering now"),
                }
            }
        }
        inner.last_delivery = Some(now);
        let delivery = (inner.seq, inner.latest.clone(), Self::observers(&inner));
        drop(inner);
        self.deliver(delivery);
        true
    }

    /// delivers a state immediately (final updates), cancelling any pending flush
    pub fn publish_now(&self, state:T) {
        self.publish_now_unless(state, || false);
    }

    /// like `publish_now`, but drops the state if `stopped` holds (see `notify_unless`)
    pub fn publish_now_unless<F: FnOnce() -> bool>(&self, state:T, stopped:F) -> bool {
        let mut inner = self.inner.lock();
        if stopped() {
            return false;
        }
        inner.seq += 1;
        inner.latest = state;
        inner.pending = false;
        inner.generation += 1;
        inner.last_delivery = Some(Instant::now());
        let delivery = (inner.seq, inner.latest.clone(), Self::observers(&inner));
        drop(inner);
        self.deliver(delivery);
        true
    }

    /// drops the pending flush, if any
    pub fn cancel_pending(&self) {
        let mut inner = self.inner.lock();
        inner.pending = false;
        inner.generation += 1;
    }

    fn flush_pending(&self, generation:u64) {
        let mut inner = self.inner.lock();
        if !inner.pending || inner.generation != generation {
            return;
        }
        inner.pending = false;
        inner.last_delivery = Some(Instant::now());
        let delivery = (inner.seq, inner.latest.clone(), Self::observers(&inner));
        drop(inner);
        self.deliver(delivery);
    }

    fn observers(inner:&Inner<T>) -> Vec<Subscriber<T>> {
        inner.subscribers.iter().map(|(_,s)| s.clone()).collect()
    }

    fn deliver(&self, (seq, state, observers):(u64, T, Vec<Subscriber<T>>)) {
        let mut delivered = self.delivered.lock();
        if seq <= *delivered {
            return;
        }
        *delivered = seq;
        for observer in observers {
            observer(&state);
        }
    }
}
