//! Bounded per-conversation memory.
//!
//! A [`ContextStore`] keeps the most recent turns of one conversation and
//! evicts the oldest once its capacity is reached. The
//! [`ContextStoreRegistry`] hands out one store per conversation id, each
//! behind its own async mutex.
//!
//! # Examples
//!
//! ```
//! use tripcast::conversation::{ContextStore, ConversationTurn};
//!
//! let mut store = ContextStore::new(2);
//! store.append(ConversationTurn::user("first", None));
//! store.append(ConversationTurn::assistant("second", None));
//! store.append(ConversationTurn::user("third", None));
//!
//! let texts: Vec<&str> = store.window().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, vec!["second", "third"]);
//! ```

use crate::partners::PartnerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

pub const DEFAULT_CONTEXT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Partner this turn is about, always an already-resolved record.
    pub referenced_partner: Option<PartnerRecord>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, referenced_partner: Option<PartnerRecord>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            timestamp: Utc::now(),
            referenced_partner,
        }
    }

    pub fn assistant(text: impl Into<String>, referenced_partner: Option<PartnerRecord>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            referenced_partner,
        }
    }
}

/// The last `capacity` turns of a conversation, oldest first.
#[derive(Debug, Clone)]
pub struct ContextStore {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ContextStore {
    /// Create a store holding at most `capacity` turns (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Retained turns in chronological order.
    pub fn window(&self) -> impl Iterator<Item = &ConversationTurn> + '_ {
        self.turns.iter()
    }

    /// Partner of the most recent turn in the window that references one.
    pub fn last_referenced_partner(&self) -> Option<&PartnerRecord> {
        self.turns
            .iter()
            .rev()
            .find_map(|t| t.referenced_partner.as_ref())
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_WINDOW)
    }
}

pub type SharedContextStore = Arc<AsyncMutex<ContextStore>>;

/// Per-conversation stores, created on first use.
///
/// Cloning the registry shares the same set of conversations.
#[derive(Debug, Clone)]
pub struct ContextStoreRegistry {
    stores: Arc<Mutex<HashMap<String, SharedContextStore>>>,
    capacity: usize,
}

impl ContextStoreRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            stores: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// The store for `conversation_id`, created empty if unknown.
    pub fn store(&self, conversation_id: &str) -> SharedContextStore {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        stores
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "Starting conversation memory");
                Arc::new(AsyncMutex::new(ContextStore::new(self.capacity)))
            })
            .clone()
    }

    /// Forget a conversation. Returns whether it existed.
    pub fn end_conversation(&self, conversation_id: &str) -> bool {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        stores.remove(conversation_id).is_some()
    }

    /// Whether `store` is still the live store for `conversation_id`.
    pub fn is_current(&self, conversation_id: &str, store: &SharedContextStore) -> bool {
        let stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        stores
            .get(conversation_id)
            .is_some_and(|current| Arc::ptr_eq(current, store))
    }

    pub fn conversation_count(&self) -> usize {
        self.stores.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ContextStoreRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_WINDOW)
    }
}
