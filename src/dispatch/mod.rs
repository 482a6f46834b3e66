//! Dispatch core: single dispatch, redirect walking, concurrent fan-out,
//! response normalization.

pub mod fanout;
pub mod history;
pub mod normalize;
mod single;

pub use single::Dispatcher;

use crate::api::models::{RequestDescriptor, ResponseWrapper};

/// Run one descriptor to a wrapper, choosing between a plain dispatch and a
/// history walk based on its own flags. With redirects disabled, history
/// tracking is meaningless and a single dispatch is used regardless of
/// `wantHistory`.
pub async fn execute(
    dispatcher: &Dispatcher,
    mut descriptor: RequestDescriptor,
) -> ResponseWrapper {
    if descriptor.want_history && descriptor.follow_redirects {
        ResponseWrapper::history(history::walk(dispatcher, &mut descriptor).await)
    } else {
        ResponseWrapper::single(dispatcher.dispatch(&descriptor).await)
    }
}
