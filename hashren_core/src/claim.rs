//! Atomic claiming of canonical names.
//!
//! A claim moves a file onto a target name only if that name is free, as one
//! step. There is never a separate "does it exist" check followed by a rename
//! that another worker could slip in between.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of trying to claim a target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The source now lives at the target; the source name is gone.
    Claimed,
    /// The target name was already taken; nothing was changed.
    Occupied,
}

/// Moves a file onto a name only if the name is free.
pub trait NameClaim: Send + Sync {
    /// Try to move `source` to `target`.
    fn claim(&self, source: &Path, target: &Path) -> Result<ClaimOutcome>;
}

/// Claims by creating a hard link, which the OS refuses if the target exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExclusiveLink;

impl ExclusiveLink {
    fn link(&self, source: &Path, target: &Path) -> std::io::Result<ClaimOutcome> {
        link_outcome(fs::hard_link(source, target))
    }

    fn unlink_source(&self, source: &Path, target: &Path) -> Result<()> {
        if let Err(e) = fs::remove_file(source) {
            // Both names point at the same content; drop the new one again
            if let Err(undo) = fs::remove_file(target) {
                warn!(
                    target = %target.display(),
                    error = %undo,
                    "Failed to roll back canonical link"
                );
            }
            return Err(Error::path_io(source, e));
        }
        Ok(())
    }
}

impl NameClaim for ExclusiveLink {
    fn claim(&self, source: &Path, target: &Path) -> Result<ClaimOutcome> {
        let outcome = self
            .link(source, target)
            .map_err(|e| Error::path_io(source, e))?;
        if outcome == ClaimOutcome::Claimed {
            self.unlink_source(source, target)?;
        }
        Ok(outcome)
    }
}

/// Claims by renaming while holding a lock on the target name.
///
/// For filesystems without hard links. Atomicity holds only among claims
/// made through the same instance.
#[derive(Debug, Default)]
pub struct SerializedRename {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SerializedRename {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a target name.
    fn lock_for(&self, target: &Path) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(target.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the table entry once no other claim holds a handle to it.
    fn release(&self, target: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // One reference in the table, one in `lock`
        if Arc::strong_count(&lock) == 2 {
            locks.remove(target);
        }
    }

    /// Number of target names with a live lock.
    pub fn pending(&self) -> usize {
        self.locks.lock().len()
    }

    fn rename_if_free(&self, source: &Path, target: &Path) -> Result<ClaimOutcome> {
        match fs::symlink_metadata(target) {
            Ok(_) => return Ok(ClaimOutcome::Occupied),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::path_io(target, e)),
        }
        fs::rename(source, target).map_err(|e| Error::path_io(source, e))?;
        Ok(ClaimOutcome::Claimed)
    }
}

impl NameClaim for SerializedRename {
    fn claim(&self, source: &Path, target: &Path) -> Result<ClaimOutcome> {
        let lock = self.lock_for(target);
        let outcome = {
            let _guard = lock.lock();
            self.rename_if_free(source, target)
        };
        self.release(target, lock);
        outcome
    }
}

/// Links when the filesystem supports it, otherwise serializes renames.
///
/// Both paths run under the fallback's per-name lock, so a rename that found
/// the name free cannot overwrite a link made to it meanwhile.
#[derive(Debug)]
pub struct AutoClaim {
    hard_link: fn(&Path, &Path) -> std::io::Result<()>,
    link: ExclusiveLink,
    fallback: SerializedRename,
}

impl Default for AutoClaim {
    fn default() -> Self {
        Self {
            hard_link: system_hard_link,
            link: ExclusiveLink,
            fallback: SerializedRename::new(),
        }
    }
}

impl AutoClaim {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_hard_link(hard_link: fn(&Path, &Path) -> std::io::Result<()>) -> Self {
        Self {
            hard_link,
            ..Self::default()
        }
    }

    fn claim_locked(&self, source: &Path, target: &Path) -> Result<ClaimOutcome> {
        match link_outcome((self.hard_link)(source, target)) {
            Ok(ClaimOutcome::Claimed) => {
                self.link.unlink_source(source, target)?;
                Ok(ClaimOutcome::Claimed)
            }
            Ok(ClaimOutcome::Occupied) => Ok(ClaimOutcome::Occupied),
            Err(e) if links_unsupported(&e) => {
                debug!(
                    path = %source.display(),
                    error = %e,
                    "Hard links unavailable, using serialized rename"
                );
                self.fallback.rename_if_free(source, target)
            }
            Err(e) => Err(Error::path_io(source, e)),
        }
    }
}

impl NameClaim for AutoClaim {
    fn claim(&self, source: &Path, target: &Path) -> Result<ClaimOutcome> {
        let lock = self.fallback.lock_for(target);
        let outcome = {
            let _guard = lock.lock();
            self.claim_locked(source, target)
        };
        self.fallback.release(target, lock);
        outcome
    }
}

fn system_hard_link(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::hard_link(source, target)
}

/// Map a `link` result: an existing target means the name is taken.
fn link_outcome(result: std::io::Result<()>) -> std::io::Result<ClaimOutcome> {
    match result {
        Ok(()) => Ok(ClaimOutcome::Claimed),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(ClaimOutcome::Occupied),
        Err(e) => Err(e),
    }
}

/// Whether a failed `link` means the filesystem cannot hard link at all.
fn links_unsupported(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Unsupported | ErrorKind::PermissionDenied
    )
}

/// Which claim strategy a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClaimMode {
    #[default]
    Auto,
    Link,
    Serialized,
}

impl ClaimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimMode::Auto => "auto",
            ClaimMode::Link => "link",
            ClaimMode::Serialized => "serialized",
        }
    }

    /// Build the claim strategy for a run.
    pub fn build(&self) -> Arc<dyn NameClaim> {
        match self {
            ClaimMode::Auto => Arc::new(AutoClaim::new()),
            ClaimMode::Link => Arc::new(ExclusiveLink),
            ClaimMode::Serialized => Arc::new(SerializedRename::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn strategies() -> Vec<(&'static str, Arc<dyn NameClaim>)> {
        vec![
            ("link", ClaimMode::Link.build()),
            ("serialized", ClaimMode::Serialized.build()),
            ("auto", ClaimMode::Auto.build()),
        ]
    }

    #[test]
    fn test_claim_free_name_moves_file() {
        for (label, claim) in strategies() {
            let temp_dir = TempDir::new().unwrap();
            let source = temp_dir.path().join("a.txt");
            let target = temp_dir.path().join("canon.txt");
            fs::write(&source, b"hello").unwrap();

            let outcome = claim.claim(&source, &target).unwrap();
            assert_eq!(outcome, ClaimOutcome::Claimed, "{label}");
            assert!(!source.exists(), "{label}");
            assert_eq!(fs::read(&target).unwrap(), b"hello", "{label}");
        }
    }

    #[test]
    fn test_claim_occupied_name_changes_nothing() {
        for (label, claim) in strategies() {
            let temp_dir = TempDir::new().unwrap();
            let source = temp_dir.path().join("a.txt");
            let target = temp_dir.path().join("canon.txt");
            fs::write(&source, b"mine").unwrap();
            fs::write(&target, b"theirs").unwrap();

            let outcome = claim.claim(&source, &target).unwrap();
            assert_eq!(outcome, ClaimOutcome::Occupied, "{label}");
            assert_eq!(fs::read(&source).unwrap(), b"mine", "{label}");
            assert_eq!(fs::read(&target).unwrap(), b"theirs", "{label}");
        }
    }

    #[test]
    fn test_claim_missing_source_fails() {
        for (label, claim) in strategies() {
            let temp_dir = TempDir::new().unwrap();
            let source = temp_dir.path().join("vanished.txt");
            let target = temp_dir.path().join("canon.txt");

            assert!(claim.claim(&source, &target).is_err(), "{label}");
            assert!(!target.exists(), "{label}");
        }
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        const CONTENDERS: usize = 8;

        for (label, claim) in strategies() {
            let temp_dir = TempDir::new().unwrap();
            let target = temp_dir.path().join("canon.bin");
            let sources: Vec<PathBuf> = (0..CONTENDERS)
                .map(|i| {
                    let path = temp_dir.path().join(format!("copy{i}.bin"));
                    fs::write(&path, b"same").unwrap();
                    path
                })
                .collect();

            let barrier = Barrier::new(CONTENDERS);
            let outcomes: Vec<ClaimOutcome> = thread::scope(|s| {
                let handles: Vec<_> = sources
                    .iter()
                    .map(|source| {
                        let claim = Arc::clone(&claim);
                        let barrier = &barrier;
                        let target = &target;
                        s.spawn(move || {
                            barrier.wait();
                            claim.claim(source, target).unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let winners = outcomes
                .iter()
                .filter(|o| **o == ClaimOutcome::Claimed)
                .count();
            assert_eq!(winners, 1, "{label}");
            assert_eq!(fs::read(&target).unwrap(), b"same", "{label}");
            let remaining = sources.iter().filter(|p| p.exists()).count();
            assert_eq!(remaining, CONTENDERS - 1, "{label}");
        }
    }

    #[test]
    fn test_serialized_rename_releases_locks() {
        let temp_dir = TempDir::new().unwrap();
        let claim = SerializedRename::new();
        for i in 0..4 {
            let source = temp_dir.path().join(format!("{i}.txt"));
            fs::write(&source, i.to_string()).unwrap();
            claim
                .claim(&source, &temp_dir.path().join(format!("canon{i}.txt")))
                .unwrap();
        }
        assert_eq!(claim.pending(), 0);
    }

    fn link_unless_nolink(source: &Path, target: &Path) -> std::io::Result<()> {
        let name = source.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("nolink") {
            return Err(std::io::Error::new(ErrorKind::Unsupported, "no links here"));
        }
        fs::hard_link(source, target)
    }

    #[test]
    fn test_auto_claim_mixed_link_and_rename_have_one_winner() {
        const CONTENDERS: usize = 16;

        for round in 0..8 {
            let temp_dir = TempDir::new().unwrap();
            let target = temp_dir.path().join("canon.bin");
            let sources: Vec<PathBuf> = (0..CONTENDERS)
                .map(|i| {
                    let prefix = if i % 2 == 0 { "nolink" } else { "copy" };
                    let path = temp_dir.path().join(format!("{prefix}{i}.bin"));
                    fs::write(&path, b"same").unwrap();
                    path
                })
                .collect();

            let claim = AutoClaim::with_hard_link(link_unless_nolink);
            let barrier = Barrier::new(CONTENDERS);
            let outcomes: Vec<ClaimOutcome> = thread::scope(|s| {
                let handles: Vec<_> = sources
                    .iter()
                    .map(|source| {
                        let (claim, barrier, target) = (&claim, &barrier, &target);
                        s.spawn(move || {
                            barrier.wait();
                            claim.claim(source, target).unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let winners = outcomes
                .iter()
                .filter(|o| **o == ClaimOutcome::Claimed)
                .count();
            assert_eq!(winners, 1, "round {round}");
            assert_eq!(fs::read(&target).unwrap(), b"same", "round {round}");
            let remaining = sources.iter().filter(|p| p.exists()).count();
            assert_eq!(remaining, CONTENDERS - 1, "round {round}");
            assert_eq!(claim.fallback.pending(), 0, "round {round}");
        }
    }

    #[test]
    fn test_auto_claim_rename_respects_linked_target() {
        let temp_dir = TempDir::new().unwrap();
        let linked = temp_dir.path().join("copy.bin");
        let renamed = temp_dir.path().join("nolink.bin");
        let target = temp_dir.path().join("canon.bin");
        fs::write(&linked, b"first").unwrap();
        fs::write(&renamed, b"second").unwrap();

        let claim = AutoClaim::with_hard_link(link_unless_nolink);
        assert_eq!(claim.claim(&linked, &target).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(claim.claim(&renamed, &target).unwrap(), ClaimOutcome::Occupied);
        assert_eq!(fs::read(&target).unwrap(), b"first");
        assert_eq!(fs::read(&renamed).unwrap(), b"second");
    }

    #[test]
    fn test_claim_mode_names() {
        assert_eq!(ClaimMode::default(), ClaimMode::Auto);
        assert_eq!(ClaimMode::Link.as_str(), "link");
        assert_eq!(ClaimMode::Serialized.as_str(), "serialized");
    }
}
