use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};

/// On-disk cache of the padded source of each evaluated block, keyed by a
/// content hash. Purely a diagnostic aid: a trace names a block by its
/// scratch file, and the file holds the exact text that produced it.
/// Callers treat write failures as non-fatal.
#[derive(Debug, Clone)]
pub struct Scratch {
    root: PathBuf,
}

impl Scratch {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Scratch { root })
    }

    /// A scratch directory under the system temp dir.
    pub fn in_temp_dir() -> io::Result<Self> {
        Self::new(std::env::temp_dir().join("rill-scratch"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the padded block source to a content-addressed file and return
    /// its path. Identical content reuses the existing file.
    pub fn stash(&self, padded_source: &str) -> io::Result<PathBuf> {
        let path = self
            .root
            .join(format!("interactive_{:016x}", content_key(padded_source)));
        if !path.exists() {
            std::fs::write(&path, padded_source)?;
        }
        Ok(path)
    }
}

fn content_key(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_maps_to_one_file() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let scratch = Scratch::new(dir.path().join("scratch")).expect("scratch failed");
        let a = scratch.stash("\n\nx = 1").expect("stash failed");
        let b = scratch.stash("\n\nx = 1").expect("stash failed");
        assert_eq!(a, b);
        assert_eq!(
            std::fs::read_to_string(&a).expect("read failed"),
            "\n\nx = 1"
        );
    }

    #[test]
    fn different_content_maps_to_different_files() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let scratch = Scratch::new(dir.path().join("scratch")).expect("scratch failed");
        let a = scratch.stash("x = 1").expect("stash failed");
        let b = scratch.stash("x = 2").expect("stash failed");
        assert_ne!(a, b);
    }
}
