use crate::domain::entities::Record;
use std::cmp::Ordering;

/// Which side of a same-identity comparison holds the authoritative version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Last-write-wins resolution between two versions of the same record.
///
/// Strictly greater `updated_at` wins. Equal timestamps are broken by the
/// origin device id, so every replica reaches the same verdict without
/// coordination. An exact tie (same timestamp, same origin) keeps the local
/// copy, which makes replaying an already-applied pull batch a no-op.
pub fn resolve(local: &Record, remote: &Record) -> Winner {
    debug_assert_eq!(local.identity(), remote.identity());

    match remote.updated_at.cmp(&local.updated_at) {
        Ordering::Greater => Winner::Remote,
        Ordering::Less => Winner::Local,
        Ordering::Equal => {
            if remote.origin > local.origin {
                Winner::Remote
            } else {
                Winner::Local
            }
        }
    }
}
