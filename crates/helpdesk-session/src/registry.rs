//! Process-local map from chat id to its live [`BotInstance`].
//!
//! The map lock only covers finding or inserting a per-chat slot. Building
//! the instance (a store read plus knowledge-base flattening) happens inside
//! the slot's `OnceCell`, so concurrent callers for the same chat wait on a
//! single construction and no caller ever sees a half-built instance.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;
use tracing::debug;

use helpdesk_core::error::Result;
use helpdesk_core::types::ChatId;

use crate::bot::BotInstance;

type Slot = Arc<OnceCell<Arc<BotInstance>>>;

#[derive(Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<ChatId, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ChatId, Slot>> {
        match self.slots.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Return the live instance for `chat_id`, constructing it with `init`
    /// if there is none. A failed `init` leaves the chat without an instance
    /// and the next caller tries again.
    pub async fn get_or_create<F, Fut>(&self, chat_id: &ChatId, init: F) -> Result<Arc<BotInstance>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BotInstance>>,
    {
        let slot = Arc::clone(self.slots().entry(chat_id.clone()).or_default());
        let built = slot
            .get_or_try_init(|| async {
                debug!(chat_id = %chat_id, "Constructing bot instance");
                init().await.map(Arc::new)
            })
            .await
            .cloned();

        if built.is_err() {
            self.discard_empty_slot(chat_id, &slot);
        }
        built
    }

    /// Drop a slot left empty by a failed construction. A slot another
    /// caller is still waiting on stays, so that caller's retry lands in the
    /// map.
    fn discard_empty_slot(&self, chat_id: &ChatId, slot: &Slot) {
        let mut slots = self.slots();
        let unused = slots.get(chat_id).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(slot) == 2
        });
        if unused {
            slots.remove(chat_id);
        }
    }

    /// Non-creating read.
    pub fn lookup(&self, chat_id: &ChatId) -> Option<Arc<BotInstance>> {
        self.slots().get(chat_id).and_then(|slot| slot.get().cloned())
    }

    /// Evict the chat's instance, returning it if one was live.
    pub fn remove(&self, chat_id: &ChatId) -> Option<Arc<BotInstance>> {
        let slot = self.slots().remove(chat_id)?;
        let instance = slot.get().cloned();
        if instance.is_some() {
            debug!(chat_id = %chat_id, "Evicted bot instance");
        }
        instance
    }

    /// Drop every instance. Returns how many were live.
    pub fn clear(&self) -> usize {
        let drained: Vec<Slot> = self.slots().drain().map(|(_, slot)| slot).collect();
        drained.iter().filter(|slot| slot.initialized()).count()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots held in the map, initialized or not.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots().len()
    }
}
