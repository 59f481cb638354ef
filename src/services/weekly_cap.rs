use std::collections::HashMap;

use crate::models::schedule::WeekKey;

/// Keeps at most `limit` items per week, in the order given.
///
/// Returns `(kept, discarded)`; both preserve the input order. Items past the
/// limit are discarded outright, never moved to another week.
pub fn enforce_weekly_cap<T, F>(items: Vec<T>, limit: usize, week_of: F) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> WeekKey,
{
    let mut counts: HashMap<WeekKey, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(items.len());
    let mut discarded = Vec::new();

    for item in items {
        let count = counts.entry(week_of(&item)).or_insert(0);
        if *count < limit {
            *count += 1;
            kept.push(item);
        } else {
            discarded.push(item);
        }
    }

    (kept, discarded)
}
