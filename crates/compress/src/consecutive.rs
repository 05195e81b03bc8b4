use crate::shape::ActionShape;

/// Collapse runs of directly adjacent `function_id` actions with equal keys,
/// keeping the last action of each run.
///
/// Unlike [`last_only`](crate::last_only), same-key actions separated by any
/// other action are all kept.
pub fn last_consecutive<A, K, F>(path: &[A], function_id: &str, to_key: F) -> Vec<A>
where
    A: ActionShape + Clone,
    K: Eq,
    F: Fn(&A) -> K,
{
    // Walk backwards so each action is compared with its successor in the
    // original order; a run keeps its last element.
    let mut reversed: Vec<A> = Vec::with_capacity(path.len());
    let mut follower: Option<K> = None;
    for action in path.iter().rev() {
        if action.f_id() != function_id {
            follower = None;
            reversed.push(action.clone());
            continue;
        }
        let key = to_key(action);
        let redundant = follower.as_ref() == Some(&key);
        follower = Some(key);
        if !redundant {
            reversed.push(action.clone());
        }
    }
    reversed.reverse();
    reversed
}

/// Alias of [`last_consecutive`].
pub fn remove_consecutive_nodes<A, K, F>(path: &[A], function_id: &str, to_key: F) -> Vec<A>
where
    A: ActionShape + Clone,
    K: Eq,
    F: Fn(&A) -> K,
{
    last_consecutive(path, function_id, to_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{action, keyed, Fixture};

    fn key(a: &Fixture) -> String {
        a.key.clone()
    }

    #[test]
    fn collapses_adjacent_pair() {
        let path = vec![keyed("f", "a"), keyed("f", "a"), keyed("f", "b")];
        assert_eq!(
            last_consecutive(&path, "f", key),
            vec![path[1].clone(), path[2].clone()]
        );
    }

    #[test]
    fn separated_duplicates_survive() {
        let path = vec![keyed("f", "a"), action("x"), keyed("f", "a")];
        assert_eq!(last_consecutive(&path, "f", key), path);
    }

    #[test]
    fn run_of_three_keeps_last() {
        let path = vec![
            action("x"),
            keyed("f", "a"),
            keyed("f", "a"),
            keyed("f", "a"),
            action("y"),
        ];
        let out = last_consecutive(&path, "f", key);
        assert_eq!(out.len(), path.len() - 2);
        assert_eq!(out, vec![path[0].clone(), path[3].clone(), path[4].clone()]);
    }

    #[test]
    fn different_function_breaks_run() {
        let path = vec![keyed("f", "a"), keyed("g", "a"), keyed("f", "a")];
        assert_eq!(last_consecutive(&path, "f", key), path);
    }

    #[test]
    fn alias_matches() {
        let path = vec![keyed("f", "a"), keyed("f", "a")];
        assert_eq!(
            remove_consecutive_nodes(&path, "f", key),
            last_consecutive(&path, "f", key)
        );
    }
}
