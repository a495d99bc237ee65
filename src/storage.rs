use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::StorageError;

pub const CONFIG_FILE: &str = "config.csv";
pub const CODESET_FILE: &str = "codesetvalues.csv";
const BACKUP_DIR: &str = "_backups";

/// Outcome of writing one physical location during a logical save.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReceipt {
    pub location: PathBuf,
    pub error: Option<String>,
}

impl WriteReceipt {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Disk layout and persistence for configuration and codeset files.
///
/// Files live at `{data_dir}/{org_key}/{module_key}/config.csv` (and
/// `codesetvalues.csv`). Every overwrite is preceded by a timestamped
/// backup of the existing content under `{data_dir}/_backups/`, and a
/// logical save can fan out to a legacy mirror directory; each location
/// gets its own receipt so a partial failure is attributable.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    mirror_dir: Option<PathBuf>,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Storage {
            data_dir: data_dir.into(),
            mirror_dir: None,
        }
    }

    pub fn with_mirror(mut self, mirror_dir: impl Into<PathBuf>) -> Self {
        self.mirror_dir = Some(mirror_dir.into());
        self
    }

    pub fn config_path(&self, org_key: &str, module_key: &str) -> PathBuf {
        self.data_dir.join(org_key).join(module_key).join(CONFIG_FILE)
    }

    pub fn codeset_path(&self, org_key: &str, module_key: &str) -> PathBuf {
        self.data_dir.join(org_key).join(module_key).join(CODESET_FILE)
    }

    pub fn config_exists(&self, org_key: &str, module_key: &str) -> bool {
        self.config_path(org_key, module_key).is_file()
    }

    /// Read raw configuration text.
    ///
    /// # Errors
    /// `StorageError::NotFound` when the file does not exist; `Io` for any
    /// other read failure.
    pub fn load_config(&self, org_key: &str, module_key: &str) -> Result<String, StorageError> {
        self.read_file(&self.config_path(org_key, module_key))
    }

    pub fn load_codesets(&self, org_key: &str, module_key: &str) -> Result<String, StorageError> {
        self.read_file(&self.codeset_path(org_key, module_key))
    }

    fn read_file(&self, path: &Path) -> Result<String, StorageError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Persist configuration text: backup, primary write, mirror write.
    ///
    /// Returns one receipt per attempted location. A backup failure aborts
    /// the whole save (never overwrite without a recovery copy); location
    /// write failures are captured in their receipts instead of aborting,
    /// so a mirror failure cannot block the primary and vice versa.
    pub fn save_config(
        &self,
        org_key: &str,
        module_key: &str,
        content: &str,
    ) -> Result<Vec<WriteReceipt>, StorageError> {
        let primary = self.config_path(org_key, module_key);
        self.backup_existing(&primary, module_key)?;

        let mut receipts = vec![self.write_location(&primary, content)];
        if let Some(mirror_dir) = &self.mirror_dir {
            let mirror = mirror_dir.join(org_key).join(module_key).join(CONFIG_FILE);
            receipts.push(self.write_location(&mirror, content));
        }
        Ok(receipts)
    }

    /// Persist codeset text with the same backup-then-write discipline.
    /// Codesets have no legacy mirror.
    pub fn save_codesets(
        &self,
        org_key: &str,
        module_key: &str,
        content: &str,
    ) -> Result<WriteReceipt, StorageError> {
        let path = self.codeset_path(org_key, module_key);
        self.backup_existing(&path, module_key)?;
        Ok(self.write_location(&path, content))
    }

    fn write_location(&self, path: &Path, content: &str) -> WriteReceipt {
        let result = path
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| fs::write(path, content));
        match result {
            Ok(()) => {
                info!("Wrote {}", path.display());
                WriteReceipt {
                    location: path.to_path_buf(),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Write failed for {}: {}", path.display(), e);
                WriteReceipt {
                    location: path.to_path_buf(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    // Copy the current content of `path` into the backup directory before
    // it gets overwritten. First-time writes have nothing to back up.
    fn backup_existing(&self, path: &Path, module_key: &str) -> Result<(), StorageError> {
        if !path.is_file() {
            return Ok(());
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");
        let backup_dir = self.data_dir.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir)?;
        let backup_path = backup_dir.join(format!("{}_{}_{}.csv", module_key, stem, stamp));
        fs::copy(path, &backup_path)?;
        info!("Backup created at {}", backup_path.display());
        Ok(())
    }
}
