//! Round-robin assignment of pending items to worker slots

use crate::CrawlerError;

/// Splits `items` into `slots` ordered subsequences
///
/// Item `i` goes to slot `i % slots`, and each slot keeps the original relative order.
/// The same input always produces the same assignment, so a re-run over the
/// remaining items of an interrupted run is reproducible.
///
/// Slots may be empty when there are fewer items than slots.
///
/// # Errors
///
/// Returns [`CrawlerError::InvalidWorkerCount`] when `slots` is zero.
///
/// # Examples
///
/// ```
/// use series_crawler::partition;
///
/// let slots = partition(vec!["a", "b", "c", "d"], 3).unwrap();
/// assert_eq!(slots, vec![vec!["a", "d"], vec!["b"], vec!["c"]]);
/// ```
pub fn partition<T>(items: Vec<T>, slots: usize) -> Result<Vec<Vec<T>>, CrawlerError> {
    if slots == 0 {
        return Err(CrawlerError::InvalidWorkerCount(0));
    }

    let per_slot = items.len().div_ceil(slots);
    let mut assigned: Vec<Vec<T>> = (0..slots).map(|_| Vec::with_capacity(per_slot)).collect();

    for (i, item) in items.into_iter().enumerate() {
        assigned[i % slots].push(item);
    }

    Ok(assigned)
}
