//! Apply-then-confirm updates for admin lists.

use std::future::Future;

use crate::Result;

/// Applies `apply` to `state` right away, then awaits `remote`. If the remote
/// write fails, `state` is restored to what it was before and the error is
/// returned for the caller to surface.
pub async fn optimistic_update<S, F, Fut, T>(state: &mut S, apply: F, remote: Fut) -> Result<T>
where
    S: Clone,
    F: FnOnce(&mut S),
    Fut: Future<Output = Result<T>>,
{
    let previous = state.clone();
    apply(state);
    match remote.await {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(error = %err, "remote write rejected; rolling back local change");
            *state = previous;
            Err(err)
        }
    }
}
