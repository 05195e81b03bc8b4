use std::collections::HashSet;
use std::hash::Hash;

use crate::shape::ActionShape;

/// Keep only the last action per key among actions of `function_id`.
///
/// Actions of other commands are always kept. Earlier same-key actions are
/// dropped regardless of what lies between them.
pub fn last_only<A, K, F>(path: &[A], function_id: &str, to_key: F) -> Vec<A>
where
    A: ActionShape + Clone,
    K: Eq + Hash,
    F: Fn(&A) -> K,
{
    let mut seen = HashSet::new();
    let mut keep = vec![true; path.len()];
    for (i, action) in path.iter().enumerate().rev() {
        if action.f_id() == function_id && !seen.insert(to_key(action)) {
            keep[i] = false;
        }
    }
    path.iter()
        .zip(keep)
        .filter_map(|(action, kept)| kept.then(|| action.clone()))
        .collect()
}
