//! Checksummed input datasets.
//!
//! Fetching the reference datasets is done outside of this crate. Before any
//! simulation is run, every declared file is hashed and compared against its known
//! SHA-256 digest so that a truncated or swapped download aborts the ensemble early.

use crate::errors::{EnsembleError, EnsembleResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A file the ensemble depends on and its expected SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Compute the SHA-256 hex digest of a file without loading it into memory.
pub fn sha256_file<P: AsRef<Path>>(path: P) -> EnsembleResult<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| EnsembleError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| EnsembleError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// The set of datasets declared for an ensemble.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    root: PathBuf,
    datasets: Vec<DatasetSpec>,
}

impl DatasetRegistry {
    /// Relative dataset paths are resolved against `root`
    pub fn new<P: Into<PathBuf>>(root: P, datasets: Vec<DatasetSpec>) -> Self {
        Self {
            root: root.into(),
            datasets,
        }
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Location of a dataset on disk
    pub fn path_of(&self, dataset: &DatasetSpec) -> PathBuf {
        if dataset.path.is_absolute() {
            dataset.path.clone()
        } else {
            self.root.join(&dataset.path)
        }
    }

    /// Verify a single dataset
    pub fn verify(&self, dataset: &DatasetSpec) -> EnsembleResult<()> {
        let path = self.path_of(dataset);
        let actual = sha256_file(&path)?;
        let expected = dataset.sha256.to_lowercase();

        if actual != expected {
            return Err(EnsembleError::ChecksumMismatch {
                name: dataset.name.clone(),
                expected,
                actual,
            });
        }
        debug!(dataset = %dataset.name, path = %path.display(), "checksum verified");
        Ok(())
    }

    /// Verify every dataset, stopping at the first missing or mismatched file
    pub fn verify_all(&self) -> EnsembleResult<()> {
        for dataset in &self.datasets {
            self.verify(dataset)?;
        }
        info!(n_datasets = self.datasets.len(), "all datasets verified");
        Ok(())
    }
}
