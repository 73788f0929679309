//! C10: Receiver (§4.10).
//!
//! Multiplexes one subschema's `@defer`/streamed `AsyncIterable<Patch>` so
//! that resolvers which ask for a field before its patch has arrived can
//! subscribe and be woken later, while resolvers that ask after it arrived
//! get it immediately.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json_bytes::Value as JsonValue;
use tokio::sync::{broadcast, Mutex};
use tracing::trace;

use crate::error::PathSegment;
use crate::subschema::{ExecutionResult, Patch, SubschemaError};

fn path_key(path: &[PathSegment]) -> String {
    path.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(".")
}

struct ReceiverInner {
    stream: Pin<Box<dyn Stream<Item = Patch> + Send>>,
    /// Values for a path-key that have already arrived, so a late subscriber
    /// gets them without waiting on the pubsub (§4.10 `externalValues`).
    arrived: HashMap<String, JsonValue>,
    topics: HashMap<String, broadcast::Sender<JsonValue>>,
    done: bool,
}

/// Per-stream state, shared by every resolver that asked for a field served
/// by this subschema's deferred delivery (§3 "Receiver state").
pub struct Receiver {
    subschema: usize,
    inner: Arc<Mutex<ReceiverInner>>,
    /// Number of resolvers still waiting on a patch; the iterator stops being
    /// pumped further once this reaches zero (§4.10 cancellation). Tracked
    /// outside the stream's own mutex with a plain atomic so a cancelled
    /// `request()` future decrements it from `Drop` without needing to
    /// acquire an async lock.
    num_requests: Arc<AtomicUsize>,
}

impl Clone for Receiver {
    fn clone(&self) -> Self {
        Self {
            subschema: self.subschema,
            inner: self.inner.clone(),
            num_requests: self.num_requests.clone(),
        }
    }
}

/// Decrements [`Receiver::num_requests`] when a `request()` call ends, by any
/// path -- a resolved value, an exhausted stream, or the calling future being
/// dropped mid-wait (§4.10 cancellation).
struct RequestGuard(Arc<AtomicUsize>);

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver").field("subschema", &self.subschema).finish()
    }
}

impl Receiver {
    pub fn new(stream: Pin<Box<dyn Stream<Item = Patch> + Send>>, subschema: usize) -> Self {
        Self {
            subschema,
            inner: Arc::new(Mutex::new(ReceiverInner {
                stream,
                arrived: HashMap::new(),
                topics: HashMap::new(),
                done: false,
            })),
            num_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subschema(&self) -> usize {
        self.subschema
    }

    /// Awaits the stream's first item and treats it as the initial result
    /// (§6 executor contract: "the first item... is the initial result").
    /// Returns it as an [`ExecutionResult`] so the caller can reuse the same
    /// error-relocation path as a synchronous execution.
    pub async fn initial_result(&mut self) -> (ExecutionResult, Vec<SubschemaError>) {
        let mut guard = self.inner.lock().await;
        let Some(first) = guard.stream.next().await else {
            guard.done = true;
            return (ExecutionResult::default(), Vec::new());
        };
        if let Some(data) = &first.data {
            guard.arrived.insert(path_key(&first.path), data.clone());
        }
        if !first.has_next {
            guard.done = true;
        }
        (
            ExecutionResult {
                data: first.data,
                errors: first.errors,
            },
            Vec::new(),
        )
    }

    /// A resolver's request for the value at `path` (§4.10 `request`). If the
    /// patch already arrived, resolves immediately; otherwise subscribes and
    /// waits, pumping the stream itself if no one else is doing so.
    pub async fn request(&self, path: Vec<PathSegment>) -> Option<JsonValue> {
        let key = path_key(&path);
        {
            let guard = self.inner.lock().await;
            if let Some(value) = guard.arrived.get(&key) {
                return Some(value.clone());
            }
            if guard.done {
                return None;
            }
        }

        self.num_requests.fetch_add(1, Ordering::SeqCst);
        let _guard = RequestGuard(self.num_requests.clone());

        let mut receiver = {
            let mut guard = self.inner.lock().await;
            let sender = guard
                .topics
                .entry(key.clone())
                .or_insert_with(|| broadcast::channel(16).0)
                .clone();
            sender.subscribe()
        };

        self.pump_until(&key).await;

        match receiver.recv().await {
            Ok(value) => Some(value),
            Err(_) => {
                let guard = self.inner.lock().await;
                guard.arrived.get(&key).cloned()
            }
        }
    }

    /// Drives the underlying stream forward until either `key` has arrived or
    /// the stream is exhausted (§4.10 `_iterate`). Only one task actually
    /// polls the stream at a time; concurrent callers simply wait on the
    /// mutex and then observe whatever arrived.
    async fn pump_until(&self, key: &str) {
        loop {
            if self.num_requests.load(Ordering::SeqCst) == 0 {
                return;
            }
            let mut guard = self.inner.lock().await;
            if guard.arrived.contains_key(key) || guard.done {
                return;
            }
            let Some(patch) = guard.stream.next().await else {
                guard.done = true;
                return;
            };
            let patch_key = path_key(&patch.path);
            if let Some(data) = patch.data.clone() {
                // A resolver asks for a *field's* path (object path plus its
                // response key, §4.9's `deferred_path`), while the patch
                // itself is addressed at the *object's* path (§6 `Patch.path`).
                // Publish both granularities: the whole patch object at its
                // own path-key, and each of its top-level keys at their own
                // deeper path-key, so a resolver waiting on either is woken.
                if let Some(obj) = data.as_object() {
                    for (field_key, value) in obj.iter() {
                        let mut field_path = patch.path.clone();
                        field_path.push(PathSegment::Field(field_key.as_str().to_owned()));
                        let field_path_key = path_key(&field_path);
                        guard.arrived.insert(field_path_key.clone(), value.clone());
                        if let Some(sender) = guard.topics.get(&field_path_key) {
                            let _ = sender.send(value.clone());
                        }
                    }
                }
                guard.arrived.insert(patch_key.clone(), data.clone());
                if let Some(sender) = guard.topics.get(&patch_key) {
                    let _ = sender.send(data);
                }
            }
            if !patch.has_next {
                guard.done = true;
            }
            trace!(path = %patch_key, "receiver delivered patch");
        }
    }
}

