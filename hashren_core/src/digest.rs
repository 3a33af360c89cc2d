//! Content digests using SHAKE-128 (extendable output).

use crate::error::{Error, Result};
use serde::Serialize;
use sha3::Shake128;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

/// Read buffer size for streaming file content into the hasher.
pub const CHUNK_SIZE: usize = 128 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Algorithm {
    /// SHAKE-128 with variable-length output.
    #[serde(rename = "shake128")]
    Shake128,
}

impl Algorithm {
    /// Returns the string representation of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Shake128 => "shake128",
        }
    }

    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "shake128" | "shake-128" => Ok(Algorithm::Shake128),
            _ => Err(Error::unsupported_algorithm(s)),
        }
    }
}

/// Number of digest bytes used for canonical names.
///
/// Accepted range is `1..=64`; the hex form is twice as long, so the largest
/// canonical name stays well under the usual 255-byte file name limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DigestLength(usize);

impl DigestLength {
    pub const MIN: usize = 1;
    pub const MAX: usize = 64;
    pub const DEFAULT: DigestLength = DigestLength(12);

    /// Validate a byte count.
    pub fn new(bytes: usize) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&bytes) {
            Ok(DigestLength(bytes))
        } else {
            Err(Error::invalid_digest_length(
                bytes.to_string(),
                Self::MIN,
                Self::MAX,
            ))
        }
    }

    /// Number of digest bytes.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Number of hex characters in a digest of this length.
    pub fn hex_len(&self) -> usize {
        self.0 * 2
    }
}

impl Default for DigestLength {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for DigestLength {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::invalid_digest_length(s, Self::MIN, Self::MAX))?;
        Self::new(bytes)
    }
}

impl fmt::Display for DigestLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lowercase hex digest of file content.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Digest raw bytes.
    pub fn of_bytes(data: &[u8], length: DigestLength) -> Self {
        let mut hasher = Shake128::default();
        hasher.update(data);
        Self::finish(hasher, length)
    }

    /// Digest everything a reader yields, one chunk at a time.
    pub fn of_reader<R: Read>(mut reader: R, length: DigestLength) -> Result<Self> {
        let mut hasher = Shake128::default();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
        }
        Ok(Self::finish(hasher, length))
    }

    /// Digest a file's content.
    ///
    /// Opens the file read-only; neither content nor metadata is touched.
    pub fn of_file(path: &Path, length: DigestLength) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::path_io(path, e))?;
        Self::of_reader(file, length).map_err(|e| match e {
            Error::Io { source } => Error::path_io(path, source),
            other => other,
        })
    }

    /// Parse a hex digest of the given length.
    pub fn from_hex(hex_str: &str, length: DigestLength) -> Result<Self> {
        if hex_str.len() != length.hex_len() {
            return Err(Error::invalid_digest(format!(
                "Expected {} hex characters, got {}",
                length.hex_len(),
                hex_str.len()
            )));
        }
        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::invalid_digest(format!("Invalid hex: {}", e)))?;
        Ok(ContentDigest(hex::encode(bytes)))
    }

    /// The hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digest bytes.
    pub fn byte_len(&self) -> usize {
        self.0.len() / 2
    }

    /// File name made of this digest plus `extension` (which carries its own dot).
    pub fn canonical_name(&self, extension: &str) -> String {
        format!("{}{}", self.0, extension)
    }

    fn finish(hasher: Shake128, length: DigestLength) -> Self {
        let mut out = vec![0u8; length.get()];
        XofReader::read(&mut hasher.finalize_xof(), &mut out);
        ContentDigest(hex::encode(out))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.0)
    }
}
