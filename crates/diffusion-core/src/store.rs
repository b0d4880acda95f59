//! File-based persistence of run results.
//!
//! Each run is one pretty-printed JSON file named
//! `<prefix>_<YYYYMMDDHHMMSS>.json` in the store directory. A second save in
//! the same second gets a numeric suffix (`<prefix>_<stamp>_1.json`, ...)
//! rather than replacing the first. Writes go to a temporary file in the same
//! directory first and are linked into place only if the name is still free,
//! so a crash mid-write never leaves a truncated run behind and an existing
//! run is never overwritten.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use diffusion_types::RunMetadata;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{SimulationConfig, ValidationError};
use crate::results::SimulationResults;

/// Extension of saved run files.
pub const RUN_EXTENSION: &str = "json";

/// Timestamp layout used in run file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Suffixed names tried for one timestamp before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Errors from the result store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("result store I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file is not a valid run document.
    #[error("result file could not be (de)serialized: {source}")]
    Serde {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// The stored config no longer validates.
    #[error("stored config is invalid: {source}")]
    Validation {
        /// The violated invariant.
        #[from]
        source: ValidationError,
    },

    /// No run exists at the given location.
    #[error("no saved run at {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A run id that would escape the store directory.
    #[error("invalid run id: {id}")]
    InvalidId {
        /// The rejected id.
        id: String,
    },

    /// Every candidate name for this save is already taken.
    #[error("no free run file name for {stem}")]
    Conflict {
        /// The timestamped name without suffix or extension.
        stem: String,
    },
}

/// A directory of saved runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// A store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `results` under a timestamped name and return the file path.
    ///
    /// The saved copy carries fresh [`RunMetadata`]; `results` itself is not
    /// modified.
    pub fn save(&self, results: &SimulationResults, prefix: &str) -> Result<PathBuf, StoreError> {
        let description = format!("Simulation run: {}", results.config.name);
        self.save_with_description(results, prefix, &description)
    }

    /// [`Self::save`] with an explicit metadata description.
    pub fn save_with_description(
        &self,
        results: &SimulationResults,
        prefix: &str,
        description: &str,
    ) -> Result<PathBuf, StoreError> {
        validate_id(prefix)?;
        fs::create_dir_all(&self.dir)?;

        let now = Utc::now();
        let mut stamped = results.clone();
        stamped.metadata = Some(RunMetadata {
            save_date: now,
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            description: description.to_owned(),
            simulation_time: results.simulation_time,
            total_agents: results.config.num_agents,
            config_name: results.config.name.clone(),
        });

        let stem = format!("{prefix}_{}", now.format(TIMESTAMP_FORMAT));
        let body = serde_json::to_vec_pretty(&stamped)?;
        let path = write_atomic(&self.dir, &stem, &body)?;

        info!(path = %path.display(), steps = results.adoption_history.len(), "Saved simulation results");
        Ok(path)
    }

    /// Load a run and re-validate its config.
    ///
    /// `path` may be absolute, relative to the working directory, or a file
    /// name inside the store directory.
    pub fn load(&self, path: &Path) -> Result<(SimulationResults, SimulationConfig), StoreError> {
        let resolved = self.resolve(path)?;
        let contents = fs::read(&resolved)?;
        let results: SimulationResults = serde_json::from_slice(&contents)?;
        let config = results.config.clone().validated()?;
        debug!(path = %resolved.display(), "Loaded simulation results");
        Ok((results, config))
    }

    /// Saved run file names, most recent first.
    ///
    /// A missing store directory is an empty store.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_run = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(RUN_EXTENSION);
            if let (true, Some(name)) = (is_run, path.file_name().and_then(|n| n.to_str())) {
                names.push(name.to_owned());
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Delete the run named `id` from the store directory.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        validate_id(id)?;
        let path = self.dir.join(id);
        if !path.is_file() {
            return Err(StoreError::NotFound { path });
        }
        fs::remove_file(&path)?;
        info!(path = %path.display(), "Deleted saved run");
        Ok(())
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, StoreError> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        let inside = self.dir.join(path);
        if inside.is_file() {
            Ok(inside)
        } else {
            Err(StoreError::NotFound {
                path: path.to_path_buf(),
            })
        }
    }
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']);
    if bad {
        Err(StoreError::InvalidId { id: id.to_owned() })
    } else {
        Ok(())
    }
}

/// Write `body` to the first free name derived from `stem` and return it.
fn write_atomic(dir: &Path, stem: &str, body: &[u8]) -> Result<PathBuf, StoreError> {
    let temp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
    let published = write_temp(&temp, body)
        .map_err(StoreError::from)
        .and_then(|()| publish(dir, &temp, stem));
    // Best effort; on success the data lives on under the published name.
    let _ = fs::remove_file(&temp);
    published
}

fn write_temp(temp: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp)?;
    file.write_all(body)?;
    file.sync_all()
}

/// Link `temp` under `stem.json`, then `stem_1.json`, `stem_2.json`, ...
///
/// `hard_link` fails if the name exists, so a concurrent or same-second
/// save can never replace a stored run.
fn publish(dir: &Path, temp: &Path, stem: &str) -> Result<PathBuf, StoreError> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let name = if n == 0 {
            format!("{stem}.{RUN_EXTENSION}")
        } else {
            format!("{stem}_{n}.{RUN_EXTENSION}")
        };
        let target = dir.join(name);
        match fs::hard_link(temp, &target) {
            Ok(()) => return Ok(target),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %target.display(), "Run file name taken");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(StoreError::Conflict {
        stem: stem.to_owned(),
    })
}
