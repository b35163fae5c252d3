//! Message identifier codec.
//!
//! ezmlm stores message `n` as file `n % 100` (zero-padded to two digits)
//! inside subfolder `n / 100`. Both directions of that mapping live here,
//! as pure functions with no filesystem access.

use crate::error::{ArchiveError, Result};

/// Map a message id to its `(subfolder, file name)` location.
///
/// Fails with `InvalidId` for id 0 — archive ordinals start at 1.
pub fn locate(id: u64) -> Result<(u64, String)> {
    if id == 0 {
        return Err(ArchiveError::InvalidId("0".to_string()));
    }
    let subfolder = id / 100;
    let suffix = id % 100;
    Ok((subfolder, format!("{suffix:02}")))
}

/// Recover a message id from its `(subfolder, file name)` location.
///
/// Exact inverse of [`locate`]. Fails with `InvalidId` when the suffix is
/// not a one- or two-digit number, or when the composed id would be 0.
pub fn compose(subfolder: u64, suffix: &str) -> Result<u64> {
    if suffix.is_empty() || suffix.len() > 2 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArchiveError::InvalidId(format!("{subfolder}/{suffix}")));
    }
    let n: u64 = suffix
        .parse()
        .map_err(|_| ArchiveError::InvalidId(format!("{subfolder}/{suffix}")))?;
    let id = subfolder * 100 + n;
    if id == 0 {
        return Err(ArchiveError::InvalidId(format!("{subfolder}/{suffix}")));
    }
    Ok(id)
}
