//! Photo references owned by a property.
//!
//! Only paths are stored here; the image bytes belong to whoever wrote them.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::info;

use crate::db::Database;
use crate::error::{CatastroError, Result};
use crate::metrics::instrumented;
use crate::models::Photo;
use crate::repository::property_exists;
use crate::schema::photos;
use crate::validation::IdentityValidator;

/// Store for the ordered photo list of each property
#[derive(Debug, Clone)]
pub struct PhotoStore {
    database: Database,
}

impl PhotoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Replace the full photo list of a property (clear, then insert in order)
    pub fn replace_all<S: AsRef<str>>(&self, property_id: i64, paths: &[S]) -> Result<()> {
        instrumented("replace_photos", || {
            let mut conn = self.database.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_property(&tx, property_id)?;

            tx.execute(
                &format!("DELETE FROM {} WHERE {} = ?", photos::TABLE, photos::PROPERTY_ID),
                params![property_id],
            )?;
            insert_paths(&tx, property_id, paths)?;
            tx.commit()?;

            info!(property_id, count = paths.len(), "Replaced property photos");
            Ok(())
        })
    }

    /// Add photos after the existing ones. Returns the new photo count.
    pub fn append<S: AsRef<str>>(&self, property_id: i64, paths: &[S]) -> Result<usize> {
        instrumented("append_photos", || {
            let mut conn = self.database.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_property(&tx, property_id)?;

            insert_paths(&tx, property_id, paths)?;
            let count = load_paths(&tx, property_id)?.len();
            tx.commit()?;

            info!(property_id, added = paths.len(), count, "Appended property photos");
            Ok(count)
        })
    }

    /// Photo paths of a property in insertion order
    pub fn list_for(&self, property_id: i64) -> Result<Vec<String>> {
        instrumented("list_photos", || {
            let conn = self.database.get_connection()?;
            ensure_property(&conn, property_id)?;
            Ok(load_paths(&conn, property_id)?)
        })
    }

    /// Full photo rows of a property in insertion order
    pub fn photos_for(&self, property_id: i64) -> Result<Vec<Photo>> {
        instrumented("list_photos", || {
            let conn = self.database.get_connection()?;
            ensure_property(&conn, property_id)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {}, {}, {} FROM {} WHERE {} = ? ORDER BY {}",
                photos::ID,
                photos::PROPERTY_ID,
                photos::FILE_PATH,
                photos::UPLOADED_AT,
                photos::TABLE,
                photos::PROPERTY_ID,
                photos::ID
            ))?;
            let rows = stmt.query_map(params![property_id], |row| {
                Ok(Photo {
                    id: row.get(0)?,
                    property_id: row.get(1)?,
                    file_path: row.get(2)?,
                    uploaded_at: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Remove the photo at `index` (0-based) in one transaction.
    ///
    /// Returns the removed path so the caller can delete the file.
    pub fn remove_photo(&self, property_id: i64, index: usize) -> Result<String> {
        instrumented("remove_photo", || {
            let mut conn = self.database.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_property(&tx, property_id)?;

            let (photo_id, path) = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {}, {} FROM {} WHERE {} = ? ORDER BY {}",
                    photos::ID,
                    photos::FILE_PATH,
                    photos::TABLE,
                    photos::PROPERTY_ID,
                    photos::ID
                ))?;
                let rows = stmt
                    .query_map(params![property_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let len = rows.len();
                rows.into_iter()
                    .nth(index)
                    .ok_or(CatastroError::PhotoIndexOutOfRange { property_id, index, len })?
            };

            tx.execute(
                &format!("DELETE FROM {} WHERE {} = ?", photos::TABLE, photos::ID),
                params![photo_id],
            )?;
            tx.commit()?;

            info!(property_id, index, %path, "Removed property photo");
            Ok(path)
        })
    }
}

/// Destination file name for an uploaded photo: `<identity>_<unix ts>_<seq><.ext>`
#[must_use]
pub fn upload_file_name(identity_number: &str, timestamp: i64, sequence: usize, original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!(
        "{}_{timestamp}_{sequence}{extension}",
        IdentityValidator::normalize(identity_number)
    )
}

/// Photo paths of a property in insertion order, without an existence check
pub(crate) fn load_paths(conn: &Connection, property_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
        photos::FILE_PATH,
        photos::TABLE,
        photos::PROPERTY_ID,
        photos::ID
    ))?;
    let rows = stmt.query_map(params![property_id], |row| row.get(0))?;
    rows.collect()
}

fn ensure_property(conn: &Connection, property_id: i64) -> Result<()> {
    if property_exists(conn, property_id)? {
        Ok(())
    } else {
        Err(CatastroError::PropertyNotFound(property_id))
    }
}

fn insert_paths<S: AsRef<str>>(conn: &Connection, property_id: i64, paths: &[S]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?)",
        photos::TABLE,
        photos::PROPERTY_ID,
        photos::FILE_PATH,
        photos::UPLOADED_AT
    ))?;

    let now = Utc::now().naive_utc();
    for path in paths {
        stmt.execute(params![property_id, path.as_ref(), now])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_name() {
        assert_eq!(
            upload_file_name("12.345.678-5", 1_716_200_000, 2, "Fachada.JPG"),
            "123456785_1716200000_2.jpg"
        );
        assert_eq!(upload_file_name("123456785", 7, 1, "noext"), "123456785_7_1");
    }
}
