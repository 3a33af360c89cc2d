//! Run coordinator - walks the root and resolves files on a bounded worker pool
//!
//! The coordinator is responsible for:
//! - Validating the root before anything is touched
//! - Feeding files to a fixed number of workers through a bounded queue
//! - Stopping dispatch when the shutdown flag is raised
//! - Merging per-worker tallies into the final summary
//!
//! Duplicates race for the canonical name; which copy survives is not defined.

use crate::claim::{ClaimMode, NameClaim};
use crate::digest::DigestLength;
use crate::error::{Error, Result};
use crate::file_ref::FileRef;
use crate::resolve::{Disposition, Resolver};
use crate::summary::Summary;
use crate::walk::{FileWalk, enumerate};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// Upper bound on files queued ahead of the workers.
const MAX_QUEUED: usize = 1024;

/// Callback invoked once per finished file.
pub type Observer = Arc<dyn Fn(&Path, &Result<Disposition>) + Send + Sync>;

/// Settings for one run. Fixed once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub root: PathBuf,
    pub digest_length: DigestLength,
    pub concurrency: NonZeroUsize,
    pub claim_mode: ClaimMode,
}

impl RunConfig {
    /// Defaults: 12-byte digests, one worker per available CPU, automatic claims.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            digest_length: DigestLength::DEFAULT,
            concurrency: default_concurrency(),
            claim_mode: ClaimMode::default(),
        }
    }

    pub fn with_digest_length(mut self, length: DigestLength) -> Self {
        self.digest_length = length;
        self
    }

    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_claim_mode(mut self, mode: ClaimMode) -> Self {
        self.claim_mode = mode;
        self
    }
}

/// Worker count used when none is given.
pub fn default_concurrency() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Canonicalize every file under `root` with default claim handling.
pub fn run(root: &Path, digest_length: DigestLength, concurrency: NonZeroUsize) -> Result<Summary> {
    let config = RunConfig::new(root)
        .with_digest_length(digest_length)
        .with_concurrency(concurrency);
    Coordinator::new(config).run()
}

/// Two queued files per worker, capped at [`MAX_QUEUED`].
fn queue_capacity(workers: usize) -> usize {
    workers.saturating_mul(2).min(MAX_QUEUED)
}

/// Drives one run over a directory tree.
pub struct Coordinator {
    config: Arc<RunConfig>,
    resolver: Resolver,
    shutdown: Arc<AtomicBool>,
    observer: Option<Observer>,
}

impl Coordinator {
    pub fn new(config: RunConfig) -> Self {
        let resolver = Resolver::new(config.claim_mode.build(), config.digest_length);
        Self {
            config: Arc::new(config),
            resolver,
            shutdown: Arc::new(AtomicBool::new(false)),
            observer: None,
        }
    }

    /// Use a specific claim strategy instead of the configured mode.
    pub fn with_claim(mut self, claim: Arc<dyn NameClaim>) -> Self {
        self.resolver = Resolver::new(claim, self.config.digest_length);
        self
    }

    /// Get notified as each file finishes.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run to completion and return the tallies.
    ///
    /// Fails only if the root is not a directory or a worker cannot be run;
    /// per-file problems end up in [`Summary::failures`].
    pub fn run(&self) -> Result<Summary> {
        let start = Instant::now();
        let files = enumerate(&self.config.root)?;
        let workers = self.config.concurrency.get();

        info!(
            root = %self.config.root.display(),
            workers,
            digest_bytes = self.config.digest_length.get(),
            claim = self.config.claim_mode.as_str(),
            "Starting run"
        );

        let summary = thread::scope(|s| -> Result<Summary> {
            // Both channel ends live in this closure so an early return
            // disconnects the queue and lets started workers exit
            let (tx, rx) = bounded::<FileRef>(queue_capacity(workers));

            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let rx = rx.clone();
                let handle = thread::Builder::new()
                    .name(format!("hashren-{id}"))
                    .spawn_scoped(s, move || self.worker_loop(rx))
                    .map_err(|e| Error::worker(id, e.to_string()))?;
                handles.push(handle);
            }
            drop(rx);

            let mut summary = Summary::default();
            self.dispatch(files, tx, &mut summary);

            let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            for (id, result) in joined.into_iter().enumerate() {
                match result {
                    Ok(worker_summary) => summary.merge(worker_summary),
                    Err(_) => return Err(Error::worker(id, "panicked")),
                }
            }
            Ok(summary)
        })?;

        info!(
            no_op = summary.no_op,
            renamed = summary.renamed,
            deleted = summary.deleted,
            failed = summary.failed,
            interrupted = summary.interrupted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run finished"
        );

        Ok(summary)
    }

    /// Push every enumerated file onto the queue; the queue closes on return.
    fn dispatch(&self, files: FileWalk, tx: Sender<FileRef>, summary: &mut Summary) {
        for item in files {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested, no further files dispatched");
                summary.interrupted = true;
                break;
            }

            match item {
                Ok(file) => {
                    if let Err(returned) = tx.send(file) {
                        // Every worker is gone
                        summary.record_failure(returned.0.path(), "no worker available");
                        break;
                    }
                }
                Err(e) => {
                    let path = e.path().unwrap_or(self.config.root.as_path()).to_path_buf();
                    warn!(path = %path.display(), error = %e, "Failed to enumerate entry");
                    let result = Err(e);
                    self.notify(&path, &result);
                    summary.record(&path, &result);
                }
            }
        }
    }

    fn worker_loop(&self, rx: Receiver<FileRef>) -> Summary {
        let mut summary = Summary::default();
        for file in rx.iter() {
            let result = self.resolver.process(&file);
            if let Err(e) = &result {
                warn!(path = %file.path().display(), error = %e, "Failed to resolve file");
            }
            self.notify(file.path(), &result);
            summary.record(file.path(), &result);
        }
        summary
    }

    fn notify(&self, path: &Path, result: &Result<Disposition>) {
        if let Some(observer) = &self.observer {
            observer(path, result);
        }
    }
}
