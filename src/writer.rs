use crate::{
    config::Config,
    error::{Error, Result},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info};

/// Writes the rendered digest to its destination.
///
/// File output is atomic (temp file + rename) with an optional timestamped
/// backup of an existing file; without a configured path the document goes
/// to stdout.
pub struct Writer {
    output_path: Option<PathBuf>,
    backup_existing: bool,
}

impl Writer {
    /// Creates a new writer from configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            output_path: config.output_path.clone(),
            backup_existing: config.backup_existing,
        }
    }

    /// Writes the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the output file or its parent directory cannot be
    /// written.
    pub fn write(&self, document: &str) -> Result<()> {
        match &self.output_path {
            Some(path) => {
                self.write_file_atomic(path, document)?;
                info!("Wrote digest to {}", path.display());
                Ok(())
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(document.as_bytes())
                    .map_err(|e| Error::io("stdout", e))?;
                Ok(())
            }
        }
    }

    /// Writes a file atomically with optional backup.
    ///
    /// # Process
    ///
    /// 1. Creates parent directories
    /// 2. Creates backup if file exists and backup is enabled
    /// 3. Writes content to temporary file and syncs it to disk
    /// 4. Atomically renames temporary file to target path
    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        if path.exists() && self.backup_existing {
            self.backup_file(path)?;
        }

        let temp_path = path.with_extension("tmp");
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;

        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

        drop(temp_file);

        fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

        Ok(())
    }

    /// Creates a timestamped backup of an existing file.
    fn backup_file(&self, path: &Path) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| Error::config(format!("System time error: {e}")))?
            .as_nanos();

        let filename = path
            .file_name()
            .ok_or_else(|| Error::config("Invalid file path"))?
            .to_string_lossy();

        let backup_name = format!("{filename}.backup.{timestamp}");
        let backup_path = path
            .parent()
            .ok_or_else(|| Error::config("Invalid file path"))?
            .join(backup_name);

        fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

        debug!("Created backup: {}", backup_path.display());
        Ok(())
    }
}
