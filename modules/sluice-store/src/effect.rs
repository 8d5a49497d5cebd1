//! What an effect body gets to work with.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use sluice_core::{AsyncOp, Scheduler};

use crate::store::Store;

/// Handed to every effect invocation: the triggering action's name plus
/// the store handle for dispatching and state reads. Timed work goes
/// through the store's scheduler so it stays deterministic under test.
pub struct EffectCtx {
    action: String,
    store: Store,
}

impl EffectCtx {
    pub(crate) fn new(action: impl Into<String>, store: Store) -> Self {
        Self {
            action: action.into(),
            store,
        }
    }

    /// The action that triggered this effect.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Dispatch through the store (middleware included).
    pub fn call(&self, action: &str, payload: Value) {
        self.store.call(action, payload);
    }

    pub fn get(&self) -> Value {
        self.store.get()
    }

    pub fn get_prop(&self, key: &str) -> Value {
        self.store.get_prop(key)
    }

    /// An operation resolving with `value` after `ms` on the store clock.
    pub fn delay(&self, ms: u64, value: Value) -> AsyncOp {
        AsyncOp::delayed(&self.store.scheduler(), ms, value)
    }

    /// Scratch storage shared by every effect on this store.
    pub fn data(&self) -> Rc<RefCell<HashMap<String, Value>>> {
        self.store.data()
    }

    pub fn scheduler(&self) -> Scheduler {
        self.store.scheduler()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
