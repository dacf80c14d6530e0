//! Non-recursive listing and bounded-depth traversal across either backend
//! (§4.13).

use std::collections::{HashSet, VecDeque};

use crate::backend::Backend;
use crate::error::StoraxError;
use crate::location::Location;
use crate::node::Node;

pub fn list_directory(backend: &dyn Backend, target: &str) -> Result<Vec<Node>, StoraxError> {
    Ok(backend.list(target)?)
}

/// Breadth-first traversal with visited-set cycle protection. `max_depth < 0`
/// means unlimited (the default); `max_depth == 0` returns only `target`'s
/// immediate children.
pub fn traverse_directory(backend: &dyn Backend, target: &str, max_depth: i64) -> Result<Vec<Node>, StoraxError> {
    let mut results = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(Location::parse(target).canonical_key());

    let mut queue: VecDeque<(String, i64)> = VecDeque::new();
    queue.push_back((target.to_string(), 0));

    while let Some((location, depth)) = queue.pop_front() {
        let children = backend.list(&location)?;
        for child in children {
            let key = Location::parse(&child.location).canonical_key();
            let already_visited = !visited.insert(key);
            let child_is_directory = child.is_directory;
            let child_location = child.location.clone();
            results.push(child);

            if child_is_directory && !already_visited {
                let next_depth = depth + 1;
                let within_bound = max_depth < 0 || next_depth <= max_depth;
                if within_bound {
                    queue.push_back((child_location, next_depth));
                }
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PathBackend;
    use tempfile::tempdir;

    #[test]
    fn traverse_collects_nested_entries() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/file.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("top.txt"), b"y").unwrap();

        let backend = PathBackend::new();
        let results = traverse_directory(&backend, &dir.path().to_string_lossy(), -1).unwrap();
        let names: Vec<_> = results.iter().map(|n| n.name.clone()).collect();
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"top.txt".to_string()));
        assert!(names.contains(&"file.txt".to_string()));
    }

    #[test]
    fn traverse_respects_max_depth_zero() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/file.txt"), b"x").unwrap();

        let backend = PathBackend::new();
        let results = traverse_directory(&backend, &dir.path().to_string_lossy(), 0).unwrap();
        let names: Vec<_> = results.iter().map(|n| n.name.clone()).collect();
        assert_eq!(names, vec!["a".to_string()]);
    }
}
