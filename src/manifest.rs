//! Summary of a completed ensemble, written next to the result archives

use ensmip_core::errors::{EnsembleError, EnsembleResult};
use ensmip_core::job::ScenarioJob;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the manifest inside the results directory
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub label: String,
    pub model: String,
    pub scenario_base: String,
    /// Archive file name, relative to the results directory
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub n_configs: usize,
    pub variants: Vec<String>,
    pub jobs: Vec<ManifestEntry>,
}

impl Manifest {
    /// Pair every job with the archive it wrote, both in job order
    pub fn new(
        n_configs: usize,
        variants: Vec<String>,
        jobs: &[ScenarioJob],
        archives: &[PathBuf],
    ) -> Self {
        let jobs = jobs
            .iter()
            .zip(archives)
            .map(|(job, path)| ManifestEntry {
                index: job.index,
                label: job.label(),
                model: job.model.clone(),
                scenario_base: job.scenario_base.clone(),
                file: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| job.archive_name()),
            })
            .collect();

        Self {
            n_configs,
            variants,
            jobs,
        }
    }

    /// Write `manifest.json` into `dir`
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> EnsembleResult<PathBuf> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(|source| EnsembleError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, contents).map_err(|e| EnsembleError::io(&path, e))?;
        Ok(path)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| EnsembleError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|source| EnsembleError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_entries() {
        let jobs = vec![
            ScenarioJob::new("AIM", "SSP3", 0),
            ScenarioJob::new("GAINS", "SSP1", 1),
        ];
        let archives = vec![
            PathBuf::from("/results/AIM_SSP3.bin"),
            PathBuf::from("/results/GAINS_SSP1.bin"),
        ];

        let manifest = Manifest::new(3, vec!["Baseline_CLE".to_string()], &jobs, &archives);

        assert_eq!(manifest.jobs.len(), 2);
        assert_eq!(manifest.jobs[1].label, "GAINS_SSP1");
        assert_eq!(manifest.jobs[1].file, "GAINS_SSP1.bin");
        assert_eq!(manifest.jobs[0].index, 0);
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![ScenarioJob::new("AIM", "SSP3", 0)];
        let manifest = Manifest::new(
            2,
            vec!["Baseline_CLE".to_string(), "MFR_tech".to_string()],
            &jobs,
            &[dir.path().join("AIM_SSP3.bin")],
        );

        let path = manifest.write(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(MANIFEST_FILE));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["n_configs"], 2);
        assert_eq!(json["jobs"][0]["file"], "AIM_SSP3.bin");

        assert_eq!(Manifest::read(&path).unwrap(), manifest);
    }

    #[test]
    fn test_read_invalid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, "{\"n_configs\": 2, \"jobs\": [").unwrap();

        match Manifest::read(&path) {
            Err(EnsembleError::Json { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            Manifest::read(dir.path().join("missing.json")),
            Err(EnsembleError::Io { .. })
        ));
    }
}
