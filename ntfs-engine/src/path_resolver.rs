//! Case-insensitive path resolution (C10).
//!
//! Generalises `path_resolver.rs::resolve_path`'s linear component walk
//! from `eq_ignore_ascii_case` to full NTFS collation via the B+-tree
//! lookup in [`crate::index`]. Unlike the teacher, which owns an
//! `&mut NtfsReader` directly, resolution here is expressed against the
//! [`DirectoryLookup`] trait so it can be driven by whatever owns I/O
//! (the volume layer) without this module touching a `ByteReader`.

use ntfs_core::Result;

use crate::structures::FileReference;

/// Everything path resolution needs from the volume: "is this entry a
/// directory" and "find this entry's child by name", both by MFT index.
pub trait DirectoryLookup {
    fn is_directory(&mut self, index: u64) -> Result<bool>;
    fn lookup_child(&mut self, directory_index: u64, name: &str) -> Result<Option<FileReference>>;
}

/// Resolve `path` starting from `root` (ordinarily MFT index 5).
///
/// Returns `Ok(None)` for "not found" rather than an error — a missing
/// segment or a non-directory encountered mid-path are not failures
/// (spec §4.7).
pub fn resolve_path(
    path: &str,
    root: FileReference,
    lookup: &mut impl DirectoryLookup,
) -> Result<Option<FileReference>> {
    let trimmed = path.trim_start_matches('\\');
    if trimmed.is_empty() {
        return Ok(Some(root));
    }

    let mut current = root;
    for segment in trimmed.split('\\').filter(|s| !s.is_empty()) {
        if !lookup.is_directory(current.index())? {
            return Ok(None);
        }
        match lookup.lookup_child(current.index(), segment)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
