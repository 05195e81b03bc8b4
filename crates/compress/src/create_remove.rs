use crate::shape::ActionShape;

/// Cancel matching create/remove pairs.
///
/// On every `remove_function_id` action, the already accepted actions are
/// walked backwards: actions requiring the removed object are dropped, and
/// when the `create_function_id` action that created the object is found,
/// it is dropped together with the remove action itself. A remove whose
/// creation is not part of the path is kept.
pub fn create_remove<A>(path: &[A], create_function_id: &str, remove_function_id: &str) -> Vec<A>
where
    A: ActionShape + Clone,
{
    let mut accepted: Vec<A> = Vec::with_capacity(path.len());
    'outer: for action in path {
        if action.f_id() == remove_function_id {
            if let Some(removed) = action.removes().first().copied() {
                for j in (0..accepted.len()).rev() {
                    let previous = &accepted[j];
                    if previous.requires().contains(&removed) {
                        accepted.remove(j);
                    } else if previous.f_id() == create_function_id
                        && previous.creates().first() == Some(&removed)
                    {
                        accepted.remove(j);
                        continue 'outer;
                    }
                }
            }
        }
        accepted.push(action.clone());
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{action, create, remove, touch};

    #[test]
    fn create_touch_remove_cancels() {
        let path = vec![create(1), touch(1), remove(1)];
        assert!(create_remove(&path, "create", "remove").is_empty());
    }

    #[test]
    fn remove_of_external_object_is_kept() {
        let path = vec![touch(1), remove(1)];
        let out = create_remove(&path, "create", "remove");
        assert_eq!(out, vec![path[1].clone()]);
    }

    #[test]
    fn unrelated_objects_survive() {
        let path = vec![
            create(1),
            create(2),
            touch(2),
            touch(1),
            action("noise"),
            remove(1),
        ];
        let out = create_remove(&path, "create", "remove");
        assert_eq!(out, vec![path[1].clone(), path[2].clone(), path[4].clone()]);
    }

    #[test]
    fn order_is_preserved() {
        let path = vec![action("a"), create(3), action("b"), remove(3), action("c")];
        let out = create_remove(&path, "create", "remove");
        let names: Vec<&str> = out.iter().map(|a| a.f_id.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn recreated_object_cancels_latest_creation() {
        let path = vec![create(1), remove(1), create(1), touch(1)];
        let out = create_remove(&path, "create", "remove");
        assert_eq!(out, vec![path[2].clone(), path[3].clone()]);
    }
}
