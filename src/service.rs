use tracing::{info, warn};

use crate::cleanup::{remove_files, CleanupReport, FileCleaner, FsFileCleaner};
use crate::config::PhotoConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::NewProperty;
use crate::photos::PhotoStore;
use crate::repository::PropertyRepository;
use crate::validation::{IdentityValidator, InputValidator};

/// A photo already written to storage by the upload collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Where the bytes were written
    pub path: String,
    /// Size of the written file
    pub size_bytes: u64,
}

/// Pairs record changes with photo file cleanup
pub struct CadastreService {
    properties: PropertyRepository,
    photos: PhotoStore,
    cleaner: Box<dyn FileCleaner>,
    photo_policy: PhotoConfig,
}

impl CadastreService {
    pub fn new(database: Database) -> Self {
        Self::with_cleaner(database, Box::new(FsFileCleaner))
    }

    pub fn with_cleaner(database: Database, cleaner: Box<dyn FileCleaner>) -> Self {
        Self {
            properties: PropertyRepository::new(database.clone()),
            photos: PhotoStore::new(database),
            cleaner,
            photo_policy: PhotoConfig::default(),
        }
    }

    /// Replace the upload policy used by [`CadastreService::attach_uploads`]
    #[must_use]
    pub fn with_photo_policy(mut self, policy: PhotoConfig) -> Self {
        self.photo_policy = policy;
        self
    }

    pub const fn properties(&self) -> &PropertyRepository {
        &self.properties
    }

    pub const fn photos(&self) -> &PhotoStore {
        &self.photos
    }

    /// Validate `record` and upsert it with its identity number in canonical form
    pub fn register(&self, record: &NewProperty) -> Result<i64> {
        InputValidator::validate_property(record)?;
        self.properties.upsert(&canonicalized(record))
    }

    /// Validate `record` and overwrite the property `id` with it
    pub fn edit(&self, id: i64, record: &NewProperty) -> Result<()> {
        InputValidator::validate_property(record)?;
        self.properties.update(id, &canonicalized(record))
    }

    /// Delete a property with its photos, then remove the photo files.
    ///
    /// File failures are reported in the returned report; the records stay deleted.
    pub fn delete_property(&self, id: i64) -> Result<CleanupReport> {
        let paths = self.properties.delete_property_cascade(id)?;
        let report = remove_files(self.cleaner.as_ref(), &paths);
        if !report.is_clean() {
            warn!(id, failed = report.failures.len(), "Property deleted but photo files remain");
        }
        Ok(report)
    }

    /// Remove one photo reference, then its file
    pub fn remove_photo(&self, property_id: i64, index: usize) -> Result<CleanupReport> {
        let path = self.photos.remove_photo(property_id, index)?;
        Ok(remove_files(self.cleaner.as_ref(), &[path]))
    }

    /// Attach uploaded photos that satisfy the photo policy.
    ///
    /// Rejected uploads are skipped with a warning; returns the accepted paths.
    /// When attaching fails, every upload file is removed before the error is
    /// returned.
    pub fn attach_uploads(&self, property_id: i64, uploads: &[StoredUpload]) -> Result<Vec<String>> {
        let accepted: Vec<String> = uploads
            .iter()
            .filter(|upload| {
                match InputValidator::validate_photo_upload(&upload.path, upload.size_bytes, &self.photo_policy) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(path = %upload.path, error = %e, "Skipping photo upload");
                        false
                    },
                }
            })
            .map(|upload| upload.path.clone())
            .collect();

        if !accepted.is_empty() {
            match self.photos.append(property_id, &accepted) {
                Ok(total) => info!(property_id, added = accepted.len(), total, "Attached photos"),
                Err(e) => {
                    let paths: Vec<String> = uploads.iter().map(|upload| upload.path.clone()).collect();
                    let report = remove_files(self.cleaner.as_ref(), &paths);
                    warn!(
                        property_id,
                        error = %e,
                        left_behind = report.failures.len(),
                        "Attaching photos failed, uploads discarded"
                    );
                    return Err(e);
                },
            }
        }
        Ok(accepted)
    }
}

fn canonicalized(record: &NewProperty) -> NewProperty {
    NewProperty {
        identity_number: IdentityValidator::canonical(&record.identity_number),
        ..record.clone()
    }
}
