//! # hashren core
//!
//! Renames every file in a directory tree to a digest of its content and
//! removes duplicates.
//!
//! A file's canonical name is the hex form of a SHAKE-128 digest of its
//! bytes (12 bytes by default) followed by its original extension. Files that
//! already carry their canonical name are left alone. When two files with the
//! same extension in the same directory digest the same, one of them takes the
//! canonical name and the other is deleted. Which one survives is not defined.
//!
//! ## Features
//!
//! - Streaming digests with configurable length
//! - Atomic claiming of canonical names (hard link, or per-name locking where
//!   links are unavailable)
//! - Bounded worker pool; one file's failure never stops the others
//! - Idempotent: a second run over the same tree changes nothing
//!
//! ## Example
//!
//! ```no_run
//! use hashren_core::{Coordinator, DigestLength, RunConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new("./downloads").with_digest_length(DigestLength::new(16)?);
//! let summary = Coordinator::new(config).run()?;
//! println!(
//!     "renamed {}, deleted {}, failed {}",
//!     summary.renamed, summary.deleted, summary.failed
//! );
//! # Ok(())
//! # }
//! ```

mod claim;
mod coordinator;
mod digest;
mod error;
mod file_ref;
mod resolve;
mod summary;
mod walk;

pub use claim::{AutoClaim, ClaimMode, ClaimOutcome, ExclusiveLink, NameClaim, SerializedRename};
pub use coordinator::{Coordinator, Observer, RunConfig, default_concurrency, run};
pub use digest::{Algorithm, CHUNK_SIZE, ContentDigest, DigestLength};
pub use error::{Error, Result};
pub use file_ref::{FileRef, split_extension};
pub use resolve::{Disposition, Resolver};
pub use summary::{Failure, Summary};
pub use walk::{FileWalk, enumerate};
