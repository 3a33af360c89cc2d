//! Per-file decision: leave alone, rename to the canonical name, or delete as a duplicate.

use crate::claim::{ClaimOutcome, NameClaim};
use crate::digest::{ContentDigest, DigestLength};
use crate::error::{Error, Result};
use crate::file_ref::FileRef;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Terminal state of one file after a successful resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Already named after its digest.
    NoOp,
    /// Moved to its canonical name.
    Renamed { to: PathBuf },
    /// Another file already held the canonical name; this one was removed.
    DeletedAsDuplicate { canonical: PathBuf },
}

/// Applies dispositions using a claim strategy.
#[derive(Clone)]
pub struct Resolver {
    claim: Arc<dyn NameClaim>,
    length: DigestLength,
}

impl Resolver {
    pub fn new(claim: Arc<dyn NameClaim>, length: DigestLength) -> Self {
        Self { claim, length }
    }

    /// Digest length used by [`Resolver::process`].
    pub fn length(&self) -> DigestLength {
        self.length
    }

    /// Digest a file and resolve it.
    pub fn process(&self, file: &FileRef) -> Result<Disposition> {
        let digest = ContentDigest::of_file(file.path(), self.length)?;
        self.resolve(file, &digest)
    }

    /// Resolve a file whose digest is already known.
    ///
    /// Equal digests at the configured length are treated as equal content;
    /// the occupant of a canonical name is never compared byte for byte.
    pub fn resolve(&self, file: &FileRef, digest: &ContentDigest) -> Result<Disposition> {
        let canonical_name = digest.canonical_name(file.extension());
        if file.name() == canonical_name {
            debug!(path = %file.path().display(), "Already canonical");
            return Ok(Disposition::NoOp);
        }

        let target = file.sibling(&canonical_name);
        match self.claim.claim(file.path(), &target)? {
            ClaimOutcome::Claimed => {
                debug!(
                    from = %file.path().display(),
                    to = %target.display(),
                    "Renamed"
                );
                Ok(Disposition::Renamed { to: target })
            }
            ClaimOutcome::Occupied => self.drop_duplicate(file, target),
        }
    }

    fn drop_duplicate(&self, file: &FileRef, target: PathBuf) -> Result<Disposition> {
        let occupant = fs::symlink_metadata(&target).map_err(|e| Error::path_io(&target, e))?;
        if !occupant.is_file() {
            return Err(Error::occupied_by_non_file(&target));
        }

        if is_same_entry(file.path(), &target)? {
            // Case-insensitive filesystems can match a differently cased name
            debug!(path = %file.path().display(), "Canonical name resolves to this file");
            return Ok(Disposition::NoOp);
        }

        fs::remove_file(file.path()).map_err(|e| Error::path_io(file.path(), e))?;
        debug!(
            path = %file.path().display(),
            canonical = %target.display(),
            "Deleted duplicate"
        );
        Ok(Disposition::DeletedAsDuplicate { canonical: target })
    }
}

/// Whether both paths are the same directory entry.
///
/// A second hard link to the same inode is a separate entry and may be removed.
#[cfg(unix)]
fn is_same_entry(a: &Path, b: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let ma = fs::symlink_metadata(a).map_err(|e| Error::path_io(a, e))?;
    let mb = fs::symlink_metadata(b).map_err(|e| Error::path_io(b, e))?;
    Ok(ma.dev() == mb.dev() && ma.ino() == mb.ino() && ma.nlink() == 1)
}

#[cfg(not(unix))]
fn is_same_entry(a: &Path, b: &Path) -> Result<bool> {
    let ca = fs::canonicalize(a).map_err(|e| Error::path_io(a, e))?;
    let cb = fs::canonicalize(b).map_err(|e| Error::path_io(b, e))?;
    Ok(ca == cb)
}
