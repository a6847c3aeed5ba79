//! Places: insertion-ordered token containers with optional capacity bounds

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::error::NetError;
use super::token::Token;

/// Maximum occupancy of a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    /// At most this many tokens may be resident.
    Bounded(usize),
    /// No bound.
    Unbounded,
}

impl Capacity {
    /// True when `count` tokens fit under this bound.
    pub fn can_hold(&self, count: usize) -> bool {
        match self {
            Capacity::Bounded(limit) => count <= *limit,
            Capacity::Unbounded => true,
        }
    }
}

/// The lockable interior of a place.
///
/// `reserved` counts output slots claimed by in-flight firings: the
/// firing algorithm releases the place locks while a user action runs,
/// and the reservation keeps concurrent firings and direct deposits from
/// overfilling a bounded place in that window.
#[derive(Debug, Default)]
pub(crate) struct TokenStore {
    pub(crate) tokens: VecDeque<Token>,
    pub(crate) reserved: usize,
}

/// A token container holding an insertion-ordered sequence.
///
/// Tokens are appended at the tail and consumed from the head (FIFO).
/// Every operation serializes on the place's own lock; transitions that
/// coordinate across several places acquire the raw token stores through
/// [`Place::lock`] in a deterministic order instead (see
/// [`Transition::fire`](super::Transition::fire)).
#[derive(Debug)]
pub struct Place {
    id: String,
    name: String,
    capacity: Capacity,
    store: Mutex<TokenStore>,
}

impl Place {
    /// Create an empty place.
    pub fn new(id: impl Into<String>, name: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capacity,
            store: Mutex::new(TokenStore::default()),
        }
    }

    /// Create a place pre-populated with tokens, for compile-time seeding.
    ///
    /// Callers must not seed beyond a bounded capacity; the compiler seeds
    /// resource places with exactly `capacity` permits.
    pub fn with_tokens(
        id: impl Into<String>,
        name: impl Into<String>,
        capacity: Capacity,
        tokens: Vec<Token>,
    ) -> Self {
        debug_assert!(capacity.can_hold(tokens.len()));
        Self {
            id: id.into(),
            name: name.into(),
            capacity,
            store: Mutex::new(TokenStore {
                tokens: tokens.into(),
                reserved: 0,
            }),
        }
    }

    /// Unique identifier within the owning net.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The occupancy bound.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Append tokens in order.
    ///
    /// Fails with [`NetError::CapacityExceeded`] without mutating the
    /// place when a bounded place would overflow, counting slots reserved
    /// by in-flight firings.
    pub async fn add_tokens(&self, tokens: Vec<Token>) -> Result<(), NetError> {
        let mut store = self.store.lock().await;
        if let Capacity::Bounded(limit) = self.capacity {
            if store.tokens.len() + store.reserved + tokens.len() > limit {
                return Err(NetError::CapacityExceeded {
                    place: self.id.clone(),
                    capacity: limit,
                });
            }
        }
        store.tokens.extend(tokens);
        Ok(())
    }

    /// Remove and return the first `count` tokens in head order.
    ///
    /// Fails with [`NetError::Underflow`] without mutating the place when
    /// fewer than `count` tokens are present.
    pub async fn remove_tokens(&self, count: usize) -> Result<Vec<Token>, NetError> {
        let mut store = self.store.lock().await;
        if store.tokens.len() < count {
            return Err(NetError::Underflow {
                place: self.id.clone(),
                have: store.tokens.len(),
                need: count,
            });
        }
        Ok(store.tokens.drain(..count).collect())
    }

    /// Current number of resident tokens.
    pub async fn token_count(&self) -> usize {
        self.store.lock().await.tokens.len()
    }

    /// Clones of the resident tokens in head-to-tail order, for
    /// observation and assertions. Context payloads share their mapping
    /// with the resident token.
    pub async fn tokens(&self) -> Vec<Token> {
        self.store.lock().await.tokens.iter().cloned().collect()
    }

    /// Identifiers of the resident tokens in head-to-tail order.
    pub async fn token_ids(&self) -> Vec<String> {
        self.store
            .lock()
            .await
            .tokens
            .iter()
            .map(|token| token.id().to_string())
            .collect()
    }

    /// True iff the place can accept `count` more tokens, counting slots
    /// reserved by in-flight firings.
    pub async fn can_accept(&self, count: usize) -> bool {
        let store = self.store.lock().await;
        self.capacity
            .can_hold(store.tokens.len() + store.reserved + count)
    }

    /// Exclusive access to the raw token store, for multi-place
    /// coordination during firing.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, TokenStore> {
        self.store.lock().await
    }
}
