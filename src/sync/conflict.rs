//! Conflict policy.
//!
//! Last-writer-wins by version: whichever side holds the strictly greater
//! version wins. Equal versions keep the local row, which the push then
//! reconciles against the remote's version check. Wall-clock time is never
//! consulted.

/// Which side of a conflicting edit survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The remote row replaces the local one and the local edit is dropped.
    RemoteWins,
    /// The remote row is ignored; the local row stays dirty and is pushed.
    LocalWins,
}

/// Decide a conflict from the two versions alone.
#[must_use]
pub const fn resolve(local_version: i64, remote_version: i64) -> Resolution {
    if remote_version > local_version {
        Resolution::RemoteWins
    } else {
        Resolution::LocalWins
    }
}
