//! Filesystem walking: every regular file under a root, one pass.

use crate::error::{Error, Result};
use crate::file_ref::FileRef;
use std::fs;
use std::path::Path;

/// Lazy sequence of the regular files under a root.
///
/// Each directory is listed completely before any of its entries is yielded,
/// so a file renamed inside a directory that is already listed is not seen
/// a second time. Symlinks are not followed.
pub struct FileWalk {
    inner: ignore::Walk,
}

/// Start walking `root`.
///
/// Fails with [`Error::NotADirectory`] when `root` is missing or not a directory.
pub fn enumerate(root: &Path) -> Result<FileWalk> {
    let is_dir = fs::metadata(root).map(|m| m.is_dir()).unwrap_or(false);
    if !is_dir {
        return Err(Error::not_a_directory(root));
    }

    let inner = ignore::WalkBuilder::new(root)
        .standard_filters(false) // Hidden and ignored files are eligible too
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    Ok(FileWalk { inner })
}

impl Iterator for FileWalk {
    type Item = Result<FileRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file {
                return Some(FileRef::new(entry.into_path()));
            }
        }
    }
}
