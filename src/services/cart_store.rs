//! Shared cart store.
//!
//! A [`CartStore`] owns one [`Cart`] and is the only way to mutate it. Every
//! mutation publishes the new [`CartState`] on a watch channel, so the header
//! badge, the drawer and each "add to cart" button observe the same state.
//! [`CartSessions`] keeps one store per visitor session for the HTTP surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::domain::aggregates::{Cart, CartLineItem, CartState};
use crate::domain::events::DomainEvent;

#[derive(Debug)]
pub struct CartStore {
    cart: Mutex<Cart>,
    state_tx: watch::Sender<CartState>,
}

impl Default for CartStore {
    fn default() -> Self { Self::new() }
}

impl CartStore {
    pub fn new() -> Self { Self::from_cart(Cart::new()) }

    pub fn from_cart(cart: Cart) -> Self {
        let (state_tx, _) = watch::channel(cart.state());
        Self { cart: Mutex::new(cart), state_tx }
    }

    /// Restores a store from a local snapshot; unreadable snapshots start empty.
    pub fn restore(snapshot: &str) -> Self { Self::from_cart(Cart::restore(snapshot)) }

    pub fn state(&self) -> CartState { self.state_tx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<CartState> { self.state_tx.subscribe() }

    pub fn snapshot(&self) -> String { self.with_cart(|cart| cart.snapshot()) }

    pub fn add_item(&self, candidate: CartLineItem, quantity: i64) -> CartState {
        self.mutate(|cart| cart.add_item(candidate, quantity))
    }

    pub fn remove_item(&self, product_id: &str) -> CartState {
        self.mutate(|cart| {
            cart.remove_item(product_id);
        })
    }

    pub fn update_quantity(&self, product_id: &str, quantity: i64) -> CartState {
        self.mutate(|cart| {
            cart.update_quantity(product_id, quantity);
        })
    }

    pub fn open(&self) -> CartState { self.mutate(Cart::open) }

    pub fn close(&self) -> CartState { self.mutate(Cart::close) }

    pub fn clear(&self) -> CartState { self.mutate(Cart::clear) }

    fn with_cart<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cart)
    }

    fn mutate(&self, f: impl FnOnce(&mut Cart)) -> CartState {
        let (state, events) = self.with_cart(|cart| {
            f(cart);
            (cart.state(), cart.take_events())
        });
        for event in &events {
            log_event(event);
        }
        // Published after the lock is released; subscribers may read back immediately.
        self.state_tx.send_replace(state.clone());
        state
    }
}

fn log_event(event: &DomainEvent) {
    tracing::debug!(?event, "cart changed");
}

/// Sessions idle for longer than this are dropped on the next sweep.
pub const CART_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct SessionEntry {
    store: Arc<CartStore>,
    touched: Instant,
}

/// One cart per visitor session, held in memory only.
///
/// Sessions are created by [`CartSessions::get_or_create`] and expire after
/// `idle_ttl` without access. Expired entries are swept whenever a new
/// session is registered, which bounds the map by recent activity.
#[derive(Debug)]
pub struct CartSessions {
    carts: Mutex<HashMap<String, SessionEntry>>,
    idle_ttl: Duration,
}

impl Default for CartSessions {
    fn default() -> Self { Self::with_idle_ttl(CART_IDLE_TTL) }
}

impl CartSessions {
    pub fn new() -> Self { Self::default() }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self { Self { carts: Mutex::new(HashMap::new()), idle_ttl } }

    /// Returns the live store for `session`, refreshing its idle timer.
    pub fn get(&self, session: &str) -> Option<Arc<CartStore>> {
        let mut carts = self.lock();
        let now = Instant::now();
        let entry = carts.get_mut(session)?;
        if now.duration_since(entry.touched) < self.idle_ttl {
            entry.touched = now;
            return Some(entry.store.clone());
        }
        carts.remove(session);
        tracing::debug!(session, "cart session expired");
        None
    }

    pub fn get_or_create(&self, session: &str) -> Arc<CartStore> {
        if let Some(store) = self.get(session) {
            return store;
        }
        let mut carts = self.lock();
        let now = Instant::now();
        let evicted = Self::sweep(&mut carts, now, self.idle_ttl);
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle cart sessions");
        }
        tracing::debug!(session, "new cart session");
        let entry = carts
            .entry(session.to_string())
            .or_insert_with(|| SessionEntry { store: Arc::new(CartStore::new()), touched: now });
        entry.touched = now;
        entry.store.clone()
    }

    pub fn remove(&self, session: &str) -> Option<Arc<CartStore>> { self.lock().remove(session).map(|e| e.store) }

    /// Drops every session idle for longer than the TTL and returns how many went.
    pub fn evict_idle(&self) -> usize { Self::sweep(&mut self.lock(), Instant::now(), self.idle_ttl) }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn sweep(carts: &mut HashMap<String, SessionEntry>, now: Instant, idle_ttl: Duration) -> usize {
        let before = carts.len();
        carts.retain(|_, entry| now.duration_since(entry.touched) < idle_ttl);
        before - carts.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
