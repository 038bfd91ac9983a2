//! Channel bindings and in-flight calls, owned by the session task.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::RpcError;

/// Invoked with the parameters of every event on a bound channel.
pub type ChannelCallback = Box<dyn FnMut(Vec<Value>) + Send>;

/// Invoked exactly once with the outcome of a call.
pub type RpcCallback = Box<dyn FnOnce(Result<Vec<Value>, RpcError>) + Send>;

/// Channel name → callback. Binding a name again replaces its callback.
#[derive(Default)]
pub struct ChannelBindings {
    bindings: HashMap<String, ChannelCallback>,
}

impl ChannelBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier binding was replaced.
    pub fn bind(&mut self, channel: String, callback: ChannelCallback) -> bool {
        self.bindings.insert(channel, callback).is_some()
    }

    pub fn unbind(&mut self, channel: &str) -> bool {
        self.bindings.remove(channel).is_some()
    }

    /// Invokes the binding for `channel`; `false` when there is none.
    pub fn dispatch(&mut self, channel: &str, params: Vec<Value>) -> bool {
        match self.bindings.get_mut(channel) {
            Some(callback) => {
                callback(params);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Calls awaiting a reply, keyed by id.
///
/// Ids start at 1 and increase for the lifetime of the registry; they are
/// never reused, even across reconnects.
pub struct PendingCalls {
    next_id: u64,
    pending: BTreeMap<u64, RpcCallback>,
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
        }
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id and stores `callback` under it.
    pub fn register(&mut self, callback: RpcCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, callback);
        id
    }

    /// Removes the entry for `id` and hands back its callback.
    pub fn take(&mut self, id: u64) -> Option<RpcCallback> {
        self.pending.remove(&id)
    }

    /// Resolves the call `id`; `false` when it is not pending.
    pub fn resolve(&mut self, id: u64, outcome: Result<Vec<Value>, RpcError>) -> bool {
        match self.take(id) {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    /// Fails every pending call with `error`, oldest first. Returns how many.
    pub fn fail_all(&mut self, error: RpcError) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for (_, callback) in pending {
            callback(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    #[test]
    fn test_rebind_replaces_callback() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut bindings = ChannelBindings::new();

        let first = hits.clone();
        assert!(!bindings.bind(
            "chat".to_string(),
            Box::new(move |_| first.lock().unwrap().push("first"))
        ));
        let second = hits.clone();
        assert!(bindings.bind(
            "chat".to_string(),
            Box::new(move |_| second.lock().unwrap().push("second"))
        ));

        assert!(bindings.dispatch("chat", vec![json!("hello")]));
        assert!(!bindings.dispatch("news", Vec::new()));
        assert_eq!(*hits.lock().unwrap(), vec!["second"]);
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn test_ids_increase_and_resolve_once() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut calls = PendingCalls::new();

        let sink = results.clone();
        let first = calls.register(Box::new(move |r| sink.lock().unwrap().push(r)));
        let second = calls.register(Box::new(|_| {}));
        assert_eq!((first, second), (1, 2));

        assert!(calls.resolve(1, Ok(vec![json!(5)])));
        assert!(!calls.resolve(1, Ok(vec![json!(6)])));
        assert_eq!(*results.lock().unwrap(), vec![Ok(vec![json!(5)])]);

        assert_eq!(calls.fail_all(RpcError::ConnectionLost), 1);
        assert!(calls.is_empty());
        assert_eq!(calls.register(Box::new(|_| {})), 3);
    }
}
