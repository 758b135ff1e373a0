use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::auth::Session;
use crate::errors::{Result, ServiceError};
use crate::models::{Assembly, Customer, Product, Repair, Sale, User};
use crate::store::Record;

/// Every entity file a backup copies when present.
pub const ENTITY_FILES: [&str; 6] = [
    Product::FILE_NAME,
    Customer::FILE_NAME,
    Sale::FILE_NAME,
    User::FILE_NAME,
    Repair::FILE_NAME,
    Assembly::FILE_NAME,
];

const BACKUP_DIR_FORMAT: &str = "backup_%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub directory: PathBuf,
    pub files: Vec<String>,
}

/// Copies the record files into timestamped directories
pub struct BackupService {
    data_dir: PathBuf,
    backup_root: PathBuf,
}

impl BackupService {
    pub fn new(data_dir: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_root: backup_root.into(),
        }
    }

    /// Copies every existing entity file into `backup_<YYYYmmdd_HHMMSS>`
    /// under the backup root. Fails if that directory already exists.
    #[instrument(skip(self, session), fields(user_id = session.user_id()))]
    pub fn create_backup(&self, session: &Session) -> Result<BackupReport> {
        let name = Local::now().format(BACKUP_DIR_FORMAT).to_string();
        self.backup_into(&name)
    }

    fn backup_into(&self, name: &str) -> Result<BackupReport> {
        fs::create_dir_all(&self.backup_root)?;
        let directory = self.backup_root.join(name);
        fs::create_dir(&directory).map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => ServiceError::ValidationError(format!(
                "backup directory {} already exists",
                directory.display()
            )),
            _ => ServiceError::Io(err),
        })?;

        let mut files = Vec::new();
        for file_name in ENTITY_FILES {
            if copy_if_present(&self.data_dir.join(file_name), &directory.join(file_name))? {
                files.push(file_name.to_string());
            }
        }

        info!(directory = %directory.display(), copied = files.len(), "backup created");
        Ok(BackupReport { directory, files })
    }
}

fn copy_if_present(source: &Path, target: &Path) -> Result<bool> {
    match fs::copy(source, target) {
        Ok(bytes) => {
            debug!(file = %source.display(), bytes, "copied");
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Permissions;
    use crate::services::testing::session;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn copies_only_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("products.csv"), "1,a\n").unwrap();
        fs::write(dir.path().join("users.csv"), "1,admin\n").unwrap();

        let service = BackupService::new(dir.path(), dir.path().join("backups"));
        let report = service.backup_into("backup_20240501_120000").unwrap();

        assert_eq!(report.files, vec!["products.csv", "users.csv"]);
        assert_eq!(
            fs::read_to_string(report.directory.join("products.csv")).unwrap(),
            "1,a\n"
        );
    }

    #[test]
    fn existing_target_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let service = BackupService::new(dir.path(), dir.path().join("backups"));
        service.backup_into("backup_x").unwrap();
        assert_matches!(
            service.backup_into("backup_x"),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn create_backup_uses_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let service = BackupService::new(dir.path(), dir.path().join("backups"));
        let report = service.create_backup(&session(Permissions::default())).unwrap();
        let name = report.directory.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("backup_"));
        assert_eq!(name.len(), "backup_YYYYmmdd_HHMMSS".len());
        assert!(report.files.is_empty());
    }
}
