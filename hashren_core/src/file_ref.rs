//! A discovered file and the name parts the resolver works with.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A regular file found under the run root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    path: PathBuf,
    dir: PathBuf,
    name: String,
    extension: String,
}

impl FileRef {
    /// Build from a file path.
    ///
    /// Fails if the path has no final component or its name is not UTF-8.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::invalid_file_name(&path))?
            .to_string();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let extension = split_extension(&name).to_string();

        Ok(Self {
            path,
            dir,
            name,
            extension,
        })
    }

    /// Full path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of a sibling entry in the same directory.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Extension of a base name, including the dot.
///
/// Leading dots belong to the stem, so `.bashrc` has no extension, while
/// `a.tar.gz` yields `.gz` and `notes.` yields `.`.
pub fn split_extension(name: &str) -> &str {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(idx) => &name[stem_start + idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("song.mp3"), ".mp3");
        assert_eq!(split_extension("archive.tar.gz"), ".gz");
        assert_eq!(split_extension("README"), "");
        assert_eq!(split_extension(".bashrc"), "");
        assert_eq!(split_extension("..hidden.txt"), ".txt");
        assert_eq!(split_extension("notes."), ".");
        assert_eq!(split_extension("..."), "");
        assert_eq!(split_extension("Photo.JPG"), ".JPG");
    }

    #[test]
    fn test_file_ref_parts() {
        let file = FileRef::new("/music/album/Track 01.FLAC").unwrap();
        assert_eq!(file.path(), Path::new("/music/album/Track 01.FLAC"));
        assert_eq!(file.dir(), Path::new("/music/album"));
        assert_eq!(file.name(), "Track 01.FLAC");
        assert_eq!(file.extension(), ".FLAC");
        assert_eq!(
            file.sibling("abc.FLAC"),
            PathBuf::from("/music/album/abc.FLAC")
        );
    }

    #[test]
    fn test_file_ref_rejects_rootless_path() {
        assert!(FileRef::new("/").is_err());
        assert!(FileRef::new("..").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_file_ref_rejects_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/tmp").join(OsStr::from_bytes(b"bad\xff.txt"));
        assert!(matches!(
            FileRef::new(path),
            Err(Error::InvalidFileName { .. })
        ));
    }

    use proptest::prelude::*;

    proptest! {
        /// The extension is always a suffix of the name and starts with a dot when present
        #[test]
        fn prop_extension_is_dotted_suffix(name in "[.]{0,2}[a-zA-Z0-9 _.-]{0,20}") {
            let ext = split_extension(&name);
            prop_assert!(name.ends_with(ext));
            if !ext.is_empty() {
                prop_assert!(ext.starts_with('.'));
                prop_assert!(!ext[1..].contains('.'));
            }
        }
    }
}
