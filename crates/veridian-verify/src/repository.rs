//! Content-addressed on-disk archive of verified artifacts.
//!
//! Layout, rooted at the repository directory:
//!
//! ```text
//! ipfs/<metadata-ipfs-hash>                      full match
//! swarm/bzzr0/<hash>, swarm/bzzr1/<hash>         full match, Swarm-indexed
//! partial_matches/<chain>/<address>/metadata.json
//! sources/<keccak256-of-content>                 archived source texts
//! ```
//!
//! Writes are atomic (temp file then rename) and idempotent: re-archiving
//! identical bytes under an existing key is a no-op.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use tempfile::NamedTempFile;

use veridian_core::{SourceAddress, SourceOrigin};

use crate::error::{Error, Result};

pub struct RepositoryStore {
    root: PathBuf,
}

impl RepositoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive a full match under its metadata content address.
    pub fn store_perfect(&self, address: &SourceAddress, metadata: &[u8]) -> Result<PathBuf> {
        let key = plain_file_name(&address.id)?;
        let path = match address.origin {
            SourceOrigin::Ipfs => self.root.join("ipfs").join(key),
            SourceOrigin::Bzzr0 => self.root.join("swarm").join("bzzr0").join(key),
            SourceOrigin::Bzzr1 => self.root.join("swarm").join("bzzr1").join(key),
        };
        self.write(&path, metadata)?;
        Ok(path)
    }

    /// Archive a partial match under its chain and address.
    pub fn store_partial(&self, chain: u64, address: Address, metadata: &[u8]) -> Result<PathBuf> {
        let path = self
            .root
            .join("partial_matches")
            .join(chain.to_string())
            .join(format!("{address:#x}"))
            .join("metadata.json");
        self.write(&path, metadata)?;
        Ok(path)
    }

    /// Archive a source text under its keccak256; metadata is the index
    /// back to it.
    pub fn store_source(&self, keccak256: &str, content: &str) -> Result<PathBuf> {
        let key = plain_file_name(keccak256)?;
        let path = self.root.join("sources").join(key);
        self.write(&path, content.as_bytes())?;
        Ok(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Ok(existing) = fs::read(path)
            && existing == content
        {
            return Ok(());
        }

        let parent = path.parent().ok_or_else(|| Error::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other("no parent directory"),
        })?;
        fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        tmp.write_all(content).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        tmp.persist(path).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Content-hash keys become file names verbatim; reject anything that
/// could escape the repository tree.
fn plain_file_name(key: &str) -> Result<&str> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
    {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, RepositoryStore) {
        let dir = tempdir().unwrap();
        let store = RepositoryStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_store_perfect_layout() {
        let (_dir, store) = store();
        let ipfs = SourceAddress::new(SourceOrigin::Ipfs, "QmHash");
        let path = store.store_perfect(&ipfs, b"metadata").unwrap();
        assert!(path.ends_with("ipfs/QmHash"));
        assert_eq!(fs::read(&path).unwrap(), b"metadata");

        let bzzr0 = SourceAddress::new(SourceOrigin::Bzzr0, "abcd");
        let path = store.store_perfect(&bzzr0, b"metadata").unwrap();
        assert!(path.ends_with("swarm/bzzr0/abcd"));
    }

    #[test]
    fn test_store_partial_layout() {
        let (_dir, store) = store();
        let address = Address::repeat_byte(0xab);
        let path = store.store_partial(5, address, b"{}").unwrap();
        assert!(path.ends_with(format!("partial_matches/5/{address:#x}/metadata.json")));
    }

    #[test]
    fn test_identical_rewrite_is_noop() {
        let (_dir, store) = store();
        let address = SourceAddress::new(SourceOrigin::Ipfs, "QmSame");
        let first = store.store_perfect(&address, b"bytes").unwrap();
        let before = fs::metadata(&first).unwrap().modified().unwrap();
        let second = store.store_perfect(&address, b"bytes").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::metadata(&second).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_store_source() {
        let (_dir, store) = store();
        let path = store.store_source("deadbeef", "contract A {}").unwrap();
        assert!(path.ends_with("sources/deadbeef"));
        assert_eq!(fs::read_to_string(path).unwrap(), "contract A {}");
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let (_dir, store) = store();
        for key in ["", ".", "..", "a/b", "a\\b"] {
            let address = SourceAddress::new(SourceOrigin::Ipfs, key);
            assert!(store.store_perfect(&address, b"x").is_err(), "key {key:?}");
        }
    }
}
