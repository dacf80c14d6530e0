//! Conflict resolution: given a name-existence predicate, a policy, and an
//! optional manual name, decides the final name for a create/rename/copy target.
//!
//! The resolver performs no I/O; `exists` is supplied by the caller.

use serde::{Deserialize, Serialize};

/// Stable integer codes per the method surface: `0 FAIL, 1 REPLACE, 2 RENAME_NEW, 3 RENAME_MANUAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConflictPolicy {
    Fail = 0,
    Replace = 1,
    RenameNew = 2,
    RenameManual = 3,
}

/// Resolves `base` against `exists` under `policy`.
///
/// Returns `None` when the resolver declines (FAIL with a conflict, or
/// RENAME_MANUAL with no usable manual name).
pub fn resolve_name(
    exists: impl Fn(&str) -> bool,
    base: &str,
    policy: ConflictPolicy,
    manual: Option<&str>,
) -> Option<String> {
    if !exists(base) {
        return Some(base.to_string());
    }

    match policy {
        ConflictPolicy::Fail => None,
        ConflictPolicy::Replace => Some(base.to_string()),
        ConflictPolicy::RenameNew => {
            let mut k = 1u64;
            loop {
                let candidate = format!("{} ({})", base, k);
                if !exists(&candidate) {
                    return Some(candidate);
                }
                k += 1;
            }
        }
        ConflictPolicy::RenameManual => match manual {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => None,
        },
    }
}
