//! File naming helpers.
//!
//! Every engine file is derived from one path prefix plus a fixed suffix,
//! for example `data/strata` becomes `data/strata.db`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Appends `suffix` to the final component of `prefix`.
///
/// ```rust
/// use std::path::Path;
/// use strata_common::path::with_suffix;
///
/// let path = with_suffix(Path::new("/tmp/db/strata"), ".log");
/// assert_eq!(path, Path::new("/tmp/db/strata.log"));
/// ```
#[must_use]
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix_keeps_dots() {
        let path = with_suffix(Path::new("dir/my.store"), ".xid");
        assert_eq!(path, Path::new("dir/my.store.xid"));
    }
}
