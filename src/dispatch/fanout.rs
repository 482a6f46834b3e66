//! Concurrent fan-out with an order-preserving join.
//!
//! One task per batch element; each task closes over its originating index
//! and reports an [`IndexedResult`] on an mpsc channel. The collector
//! writes results into a pre-sized slot buffer and releases it only once
//! every slot is filled. Tasks never block each other; the only contract is
//! that result order equals submission order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use super::single::Dispatcher;
use crate::api::models::{RequestDescriptor, ResponseRecord, ResponseWrapper};

/// Pairs a wrapper with its original batch position. Exists only between a
/// task's completion and the collector writing its slot.
struct IndexedResult {
    index: usize,
    wrapper: ResponseWrapper,
}

/// Dispatch every descriptor concurrently, returning wrappers in the
/// submitted order.
///
/// A failing task, including one that panics, only affects its own slot,
/// which is filled with a status-0 record; siblings always complete.
pub async fn dispatch_all(
    dispatcher: Arc<Dispatcher>,
    descriptors: Vec<RequestDescriptor>,
) -> Vec<ResponseWrapper> {
    let total = descriptors.len();
    if total == 0 {
        return Vec::new();
    }

    dispatcher.metrics().batch_dispatched();

    let (tx, mut rx) = mpsc::channel::<IndexedResult>(total);

    for (index, descriptor) in descriptors.into_iter().enumerate() {
        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        tokio::spawn(async move {
            let wrapper = super::execute(&dispatcher, descriptor).await;
            // the collector hanging up early is not this task's problem
            let _ = tx.send(IndexedResult { index, wrapper }).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<ResponseWrapper>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    let mut filled = 0;
    while filled < total {
        match rx.recv().await {
            Some(result) => {
                if slots[result.index].is_none() {
                    filled += 1;
                }
                slots[result.index] = Some(result.wrapper);
            }
            // every sender dropped without reporting: a task died mid-flight
            None => break,
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                warn!(index, "dispatch task aborted before reporting");
                ResponseWrapper::single(ResponseRecord::error(
                    None,
                    "dispatch task aborted before producing a result",
                ))
            })
        })
        .collect()
}
