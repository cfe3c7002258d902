use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    hash::Hash,
};

use futures::future::try_join_all;
use tracing::debug;

use crate::error::SessionResult;

/// Issues `per_id` for every id concurrently and joins the results.
///
/// One in-flight call per id with no cap; bound the id set upstream. The join
/// is all-or-nothing: the first failure to complete is returned and every
/// other result is dropped. Results come back in processing order, use
/// [`reorder_by_ids`] when id order matters.
pub async fn for_each<I, T, F, Fut>(ids: &[I], per_id: F) -> SessionResult<Vec<T>>
where
    I: Copy,
    F: Fn(I) -> Fut,
    Fut: Future<Output = SessionResult<T>>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    debug!(count = ids.len(), "fan_out: issuing calls");
    try_join_all(ids.iter().copied().map(per_id)).await
}

/// Re-keys joined results to follow `ids`. A repeated id takes the next item
/// with that key; items whose key is not in `ids` are dropped.
pub fn reorder_by_ids<I, T, K>(ids: &[I], items: Vec<T>, key: K) -> Vec<T>
where
    I: Copy + Eq + Hash,
    K: Fn(&T) -> I,
{
    let mut by_id: HashMap<I, VecDeque<T>> = HashMap::new();
    for item in items {
        by_id.entry(key(&item)).or_default().push_back(item);
    }
    ids.iter()
        .filter_map(|id| by_id.get_mut(id).and_then(VecDeque::pop_front))
        .collect()
}

#[cfg(test)]
#[path = "tests/fan_out_tests.rs"]
mod tests;
