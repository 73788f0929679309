//! C8: Per-Parent Batch Loader (§4.8).
//!
//! Coalesces sibling field resolves on the same parent into a single
//! [`crate::planner`] invocation per event-loop tick, the same way a classic
//! GraphQL dataloader coalesces sibling key lookups. Keyed by the parent's
//! identity (its `Arc` pointer), so two different parents of the same merged
//! type never share a batch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use apollo_compiler::Name;
use dashmap::DashMap;
use futures::future::{FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;

use crate::external_object::ExternalObject;

type DispatchFuture = Shared<Pin<Box<dyn Future<Output = Arc<ExternalObject>> + Send>>>;

struct PendingBatch {
    fields: Vec<Name>,
    dispatch: Option<DispatchFuture>,
}

/// One loader per parent identity. Weakly associated in spirit — in practice
/// the map entry is removed once the batch dispatches, so nothing outlives
/// the tick that created it (§4.8 "eligible for GC when the parent is").
#[derive(Default)]
pub struct BatchLoaderRegistry {
    batches: DashMap<usize, Arc<AsyncMutex<PendingBatch>>>,
}

impl BatchLoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field` as wanted on the parent identified by `parent_key`,
    /// and returns the eventual merged parent. `dispatch` is invoked exactly
    /// once per batch, with every field name registered before the tick
    /// boundary (one `tokio::task::yield_now` — §4.8 "deferred to the end of
    /// the current event-loop microtask tick").
    pub async fn load<F>(&self, parent_key: usize, field: Name, dispatch: F) -> Arc<ExternalObject>
    where
        F: FnOnce(Vec<Name>) -> Pin<Box<dyn Future<Output = ExternalObject> + Send>> + Send + 'static,
    {
        let entry = self
            .batches
            .entry(parent_key)
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(PendingBatch {
                    fields: Vec::new(),
                    dispatch: None,
                }))
            })
            .clone();

        let is_first;
        {
            let mut batch = entry.lock().await;
            if !batch.fields.contains(&field) {
                batch.fields.push(field.clone());
            }
            is_first = batch.dispatch.is_none();
            if is_first {
                let entry_for_task = entry.clone();
                let registry_key = parent_key;
                let fut: Pin<Box<dyn Future<Output = Arc<ExternalObject>> + Send>> = Box::pin(async move {
                    tokio::task::yield_now().await;
                    let fields = {
                        let batch = entry_for_task.lock().await;
                        batch.fields.clone()
                    };
                    let result = Arc::new(dispatch(fields).await);
                    let _ = registry_key;
                    result
                });
                batch.dispatch = Some(fut.shared());
            }
        }

        let dispatch_future = {
            let batch = entry.lock().await;
            batch.dispatch.clone().expect("dispatch scheduled above")
        };
        let result = dispatch_future.await;
        self.batches.remove(&parent_key);
        result
    }
}

pub fn parent_key(parent: &Arc<ExternalObject>) -> usize {
    Arc::as_ptr(parent) as usize
}
