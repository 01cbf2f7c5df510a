//! High-level Data Mart client with file-like access to remote objects.
//!
//! The [`Client`] turns Data Mart objects into readable streams, write
//! handles with an explicit commit, and typed values saved in the object
//! format from [`codec`](crate::codec).
//!
//! # Object names
//!
//! ```text
//! survey-results.rds     saved with `save_object`, read with `load_object`
//! survey-results         saved as survey-results.rds
//! notes.txt              plain file, use `open` / `open_read` / `open_write`
//! ```

use std::ffi::OsStr;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::api::DataMartApi;
use crate::codec::{self, OBJECT_CONTENT_TYPE, OBJECT_EXTENSION};
use crate::config::ClientConfig;
use crate::error::DataMartError;
use crate::stream::{DataMartHandle, DataMartReader, DataMartWriter, OpenMode};

const TEMP_PREFIX: &str = "datamart-";

/// High-level Data Mart client.
///
/// Cloning is cheap; clones share the underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    api: Arc<DataMartApi>,
    temp_dir: Option<PathBuf>,
}

impl Client {
    /// Create a new client for the given configuration.
    ///
    /// # Errors
    /// Returns [`DataMartError::InvalidUrl`] if the base URL is malformed.
    pub fn new(config: ClientConfig) -> Result<Self, DataMartError> {
        let api = DataMartApi::new(&config)?;
        Ok(Self {
            api: Arc::new(api),
            temp_dir: config.temp_dir,
        })
    }

    /// Create a client configured from the process environment.
    pub fn from_env() -> Result<Self, DataMartError> {
        Self::new(ClientConfig::from_env())
    }

    /// Check whether `filename` exists in the Data Mart.
    ///
    /// Never fails: any error or non-`200` answer is logged as a warning and
    /// reported as `false`.
    pub async fn exists(&self, filename: &str) -> bool {
        match self.api.head_object(filename).await {
            Ok(status) if status == reqwest::StatusCode::OK => true,
            Ok(status) => {
                warn!(filename, %status, "Data Mart object does not exist");
                false
            }
            Err(e) => {
                warn!(filename, error = %e, "Data Mart existence check failed");
                false
            }
        }
    }

    /// Open `filename` with a mode string (`r`, `rb`, `w` or `wb`).
    ///
    /// The mode is validated before any network or disk activity.
    pub async fn open(&self, filename: &str, mode: &str) -> Result<DataMartHandle, DataMartError> {
        let mode: OpenMode = mode.parse()?;
        if mode.is_write() {
            self.open_write(filename).map(DataMartHandle::Write)
        } else {
            self.open_read(filename).await.map(DataMartHandle::Read)
        }
    }

    /// Open a streaming reader on `filename`.
    ///
    /// # Errors
    /// Returns [`DataMartError::NotFound`] if the request fails or the
    /// server does not answer `200 OK`.
    pub async fn open_read(&self, filename: &str) -> Result<DataMartReader, DataMartError> {
        let resp = self.api.download_object(filename).await?;
        Ok(DataMartReader::new(filename, resp))
    }

    /// Open a write handle on `filename`.
    ///
    /// Nothing is sent until [`DataMartWriter::commit`] is called.
    ///
    /// # Errors
    /// Returns [`DataMartError::Connection`] if credentials are missing.
    pub fn open_write(&self, filename: &str) -> Result<DataMartWriter, DataMartError> {
        self.api.check_credentials()?;
        let (file, temp_path) = self.temp_file(extension_of(filename))?.into_parts();
        Ok(DataMartWriter::new(
            self.clone(),
            filename,
            tokio::fs::File::from_std(file),
            temp_path,
        ))
    }

    /// Serialize `value` and store it as `filename`.
    ///
    /// A name without extension gets `.rds` appended. Returns the name the
    /// object was stored under.
    ///
    /// # Errors
    /// Returns [`DataMartError::InvalidExtension`] before any I/O if the
    /// name carries another extension.
    pub async fn save_object<T>(&self, value: &T, filename: &str) -> Result<String, DataMartError>
    where
        T: Serialize + ?Sized,
    {
        let filename = object_name_for_save(filename)?;
        self.api.check_credentials()?;

        let (file, temp_path) = self.temp_file(Some(OBJECT_EXTENSION))?.into_parts();
        let mut writer = BufWriter::new(file);
        codec::encode(value, &mut writer)?;
        writer.flush()?;
        drop(writer);

        let result = self
            .upload_path(&temp_path, &filename, OBJECT_CONTENT_TYPE)
            .await;
        remove_temp(temp_path);
        result?;

        info!(
            filename = %filename,
            "Object saved to Data Mart; reload it with `client.load_object(\"{}\")`",
            filename
        );
        Ok(filename)
    }

    /// Download `filename` and deserialize it.
    ///
    /// # Errors
    /// Returns [`DataMartError::InvalidExtension`] before any I/O unless the
    /// name ends in `.rds`, and [`DataMartError::NotFound`] if the download
    /// fails.
    pub async fn load_object<T>(&self, filename: &str) -> Result<T, DataMartError>
    where
        T: DeserializeOwned,
    {
        check_object_name_for_load(filename)?;

        let temp_path = self.temp_file(Some(OBJECT_EXTENSION))?.into_temp_path();
        let result = async {
            self.download_to(filename, &temp_path).await?;
            let bytes = read_downloaded(filename, &temp_path).await?;
            codec::decode(bytes.as_slice())
        }
        .await;

        remove_temp(temp_path);
        result
    }

    /// Upload an existing local file as `filename`.
    ///
    /// The content type is inferred from the extension of `filename`.
    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        filename: &str,
    ) -> Result<(), DataMartError> {
        self.api.check_credentials()?;
        self.upload_path(local_path.as_ref(), filename, &content_type_for(filename))
            .await
    }

    /// Download `filename` to `local_path`.
    ///
    /// The body is staged next to `local_path` and moved into place only
    /// once complete, so a failed download leaves nothing behind.
    pub async fn download_file(
        &self,
        filename: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<(), DataMartError> {
        let local_path = local_path.as_ref();
        let dir = local_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)?
            .into_temp_path();

        self.download_to(filename, &staging).await?;
        staging
            .persist(local_path)
            .map_err(|e| DataMartError::Io(e.error))?;
        Ok(())
    }

    /// Get the underlying HTTP API for raw requests.
    pub fn api(&self) -> &DataMartApi {
        &self.api
    }

    pub(crate) async fn upload_path(
        &self,
        path: &Path,
        filename: &str,
        content_type: &str,
    ) -> Result<(), DataMartError> {
        let body = tokio::fs::read(path).await?;
        let size = body.len();
        self.api.upload_object(filename, body, content_type).await?;
        info!(filename, bytes = size, "Uploaded to Data Mart");
        Ok(())
    }

    async fn download_to(&self, filename: &str, dest: &Path) -> Result<(), DataMartError> {
        let resp = self.api.download_object(filename).await?;

        let body = resp.bytes_stream();
        futures::pin_mut!(body);

        let mut file = tokio::fs::File::create(dest).await?;
        // A body cut off mid-transfer counts as a failed download; local
        // write errors stay I/O errors.
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            debug!(filename, error = %e, "GET body transfer failed");
            DataMartError::not_found(filename)
        })? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    fn temp_file(&self, extension: Option<&str>) -> std::io::Result<NamedTempFile> {
        let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(&suffix);
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

/// Read back a file written by `download_to`.
///
/// The file is gone only if something removed it between the download and
/// this read, which is reported as [`DataMartError::ReadFailed`].
async fn read_downloaded(filename: &str, path: &Path) -> Result<Vec<u8>, DataMartError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DataMartError::ReadFailed {
            filename: filename.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Delete a temporary file, logging instead of failing.
pub(crate) fn remove_temp(path: TempPath) {
    let shown = path.to_path_buf();
    if let Err(e) = path.close() {
        warn!(path = %shown.display(), error = %e, "Failed to remove temporary file");
    }
}

/// MIME type for a remote filename, by extension.
pub(crate) fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename)
        .extension()
        .and_then(OsStr::to_str)
        .filter(|ext| !ext.is_empty())
}

/// Resolve the name a saved object is stored under.
///
/// # Errors
/// Returns [`DataMartError::InvalidExtension`] for any extension other than
/// `rds`.
fn object_name_for_save(filename: &str) -> Result<String, DataMartError> {
    match extension_of(filename) {
        None => Ok(format!("{filename}.{OBJECT_EXTENSION}")),
        Some(OBJECT_EXTENSION) => Ok(filename.to_string()),
        Some(_) => Err(invalid_extension(filename)),
    }
}

fn check_object_name_for_load(filename: &str) -> Result<(), DataMartError> {
    match extension_of(filename) {
        Some(OBJECT_EXTENSION) => Ok(()),
        _ => Err(invalid_extension(filename)),
    }
}

fn invalid_extension(filename: &str) -> DataMartError {
    DataMartError::InvalidExtension {
        filename: filename.to_string(),
        expected: OBJECT_EXTENSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_name_without_extension() {
        assert_eq!(object_name_for_save("survey").unwrap(), "survey.rds");
    }

    #[test]
    fn test_save_name_with_rds_extension() {
        assert_eq!(object_name_for_save("survey.rds").unwrap(), "survey.rds");
    }

    #[test]
    fn test_save_name_wrong_extension() {
        let result = object_name_for_save("survey.txt");
        assert!(matches!(
            result,
            Err(DataMartError::InvalidExtension { ref filename, .. }) if filename == "survey.txt"
        ));
    }

    #[test]
    fn test_save_name_is_case_sensitive() {
        assert!(object_name_for_save("survey.RDS").is_err());
    }

    #[test]
    fn test_save_name_nested_dots() {
        assert!(object_name_for_save("wave.2.rds").is_ok());
        assert!(object_name_for_save("archive.tar.gz").is_err());
    }

    #[test]
    fn test_load_name_requires_rds() {
        assert!(check_object_name_for_load("survey.rds").is_ok());
        assert!(check_object_name_for_load("survey").is_err());
        assert!(check_object_name_for_load("survey.txt").is_err());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.csv"), Some("csv"));
        assert_eq!(extension_of("a"), None);
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("notes.txt"), "text/plain");
        assert_eq!(content_type_for("table.csv"), "text/csv");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn test_temp_file_mirrors_extension() {
        let dir = tempfile::tempdir().unwrap();
        let client = Client::new(
            ClientConfig::new("http://localhost", "secret", "1").with_temp_dir(dir.path()),
        )
        .unwrap();

        let temp = client.temp_file(extension_of("table.csv")).unwrap();
        let name = temp.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(TEMP_PREFIX));
        assert!(name.ends_with(".csv"));
        assert_eq!(temp.path().parent().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn test_read_downloaded_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("vanished.rds");

        let result = read_downloaded("vanished.rds", &gone).await;
        assert!(matches!(
            result,
            Err(DataMartError::ReadFailed { ref filename }) if filename == "vanished.rds"
        ));
    }

    #[tokio::test]
    async fn test_read_downloaded_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present.rds");
        std::fs::write(&path, b"payload").unwrap();

        assert_eq!(read_downloaded("present.rds", &path).await.unwrap(), b"payload");
    }

    #[test]
    fn test_remove_temp_deletes_file() {
        let temp = NamedTempFile::new().unwrap().into_temp_path();
        let path = temp.to_path_buf();
        assert!(path.exists());
        remove_temp(temp);
        assert!(!path.exists());
    }
}
