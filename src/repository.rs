//! Property repository: upsert, full-record update, filtered paginated reads
//! and cascading delete.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{is_unique_violation, CatastroError, Result};
use crate::metrics::instrumented;
use crate::models::{NewProperty, Page, Property, PropertyFilter, PropertyListing};
use crate::photos::load_paths;
use crate::schema::{photos, properties as p};
use crate::validation::{CoordinateParser, IdentityValidator};

/// Columns written by inserts and full-record overwrites, in parameter order
const WRITABLE_COLUMNS: [&str; 17] = [
    p::IDENTITY_NUMBER,
    p::OWNER_NAME,
    p::CONTACT_NUMBER,
    p::ADDRESS,
    p::PROPERTY_ROLE_CODE,
    p::TOTAL_ASSESSED_VALUE,
    p::TAX_USE_CODE,
    p::MUNICIPAL_USE_CODE,
    p::COMMERCIAL_LICENSE_STATUS,
    p::INSPECTION_STATUS,
    p::COORDINATES,
    p::LAND_AREA_M2,
    p::BUILT_AREA_M2,
    p::CONSTRUCTION_LINE,
    p::CONSTRUCTION_YEAR,
    p::DOM_FILE_NUMBER,
    p::OBSERVATIONS,
];

/// Boxed query parameters, built up alongside a WHERE clause
type QueryParams = Vec<Box<dyn ToSql>>;

/// Repository for property records
#[derive(Debug, Clone)]
pub struct PropertyRepository {
    database: Database,
}

impl PropertyRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Insert `record`, or overwrite the record with the same identity number
    /// (separators ignored) and role code. Returns the record's id.
    pub fn upsert(&self, record: &NewProperty) -> Result<i64> {
        instrumented("upsert", || {
            let mut conn = self.database.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<i64> = tx
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE {} = ? AND {} = ? ORDER BY {} LIMIT 1",
                        p::ID,
                        p::TABLE,
                        normalized_identity_sql(),
                        p::PROPERTY_ROLE_CODE,
                        p::ID
                    ),
                    params![
                        IdentityValidator::normalize(&record.identity_number),
                        record.property_role_code
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            let now = Utc::now().naive_utc();
            let id = if let Some(id) = existing {
                overwrite_property(&tx, id, record, now).map_err(|e| write_error(e, record))?;
                info!(id, identity_number = %record.identity_number, "Updated property");
                id
            } else {
                let id = insert_property(&tx, record, now).map_err(|e| write_error(e, record))?;
                info!(id, identity_number = %record.identity_number, "Inserted property");
                id
            };

            tx.commit()?;
            Ok(id)
        })
    }

    /// Overwrite every field of the property `id`
    pub fn update(&self, id: i64, record: &NewProperty) -> Result<()> {
        instrumented("update", || {
            let mut conn = self.database.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !property_exists(&tx, id)? {
                return Err(CatastroError::PropertyNotFound(id));
            }

            overwrite_property(&tx, id, record, Utc::now().naive_utc()).map_err(|e| write_error(e, record))?;
            tx.commit()?;
            info!(id, "Updated property");
            Ok(())
        })
    }

    /// Get a property by id
    pub fn get(&self, id: i64) -> Result<Option<Property>> {
        instrumented("get", || {
            let conn = self.database.get_connection()?;
            let property = conn
                .query_row(
                    &format!("SELECT * FROM {} WHERE {} = ?", p::TABLE, p::ID),
                    params![id],
                    map_property,
                )
                .optional()?;
            Ok(property)
        })
    }

    /// All properties registered under an owner's identity number, however
    /// either side is punctuated
    pub fn find_by_identity_number(&self, identity_number: &str) -> Result<Vec<Property>> {
        instrumented("find_by_identity_number", || {
            let conn = self.database.get_connection()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} WHERE {} = ? ORDER BY {} DESC, {} DESC",
                p::TABLE,
                normalized_identity_sql(),
                p::CREATED_AT,
                p::ID
            ))?;
            let rows = stmt.query_map(params![IdentityValidator::normalize(identity_number)], map_property)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// One page of properties matching every field of `filter`, newest first
    pub fn list(&self, page: u32, page_size: u32, filter: &PropertyFilter) -> Result<Page<Property>> {
        instrumented("list", || {
            let conn = self.database.get_connection()?;
            let (conditions, params) = filter_conditions(filter);
            query_page(&conn, &conditions, params, page, page_size)
        })
    }

    /// One page of properties whose identity number, owner, address or role
    /// code contains `term`. A blank term matches everything.
    pub fn search(&self, term: &str, page: u32, page_size: u32) -> Result<Page<Property>> {
        instrumented("search", || {
            let conn = self.database.get_connection()?;
            let term = term.trim();
            let (conditions, params) = if term.is_empty() {
                (Vec::new(), Vec::new())
            } else {
                let (identity_clause, identity_param) = identity_condition(term);
                let mut clauses = vec![identity_clause];
                let mut params: QueryParams = vec![Box::new(identity_param)];
                for column in [p::OWNER_NAME, p::ADDRESS, p::PROPERTY_ROLE_CODE] {
                    clauses.push(like_clause(column));
                    params.push(Box::new(like_pattern(term)));
                }
                (vec![format!("({})", clauses.join(" OR "))], params)
            };
            query_page(&conn, &conditions, params, page, page_size)
        })
    }

    /// Like [`PropertyRepository::list`], pairing each record with its photos
    pub fn list_with_photos(
        &self,
        page: u32,
        page_size: u32,
        filter: &PropertyFilter,
    ) -> Result<Page<PropertyListing>> {
        instrumented("list_with_photos", || {
            let conn = self.database.get_connection()?;
            let (conditions, params) = filter_conditions(filter);
            let page = query_page(&conn, &conditions, params, page, page_size)?;

            let mut photo_lists = Vec::with_capacity(page.records.len());
            for property in &page.records {
                photo_lists.push(load_paths(&conn, property.id)?);
            }

            let mut photo_lists = photo_lists.into_iter();
            Ok(page.map(|property| PropertyListing {
                property,
                photos: photo_lists.next().unwrap_or_default(),
            }))
        })
    }

    /// Delete a property and all of its photos in one transaction.
    ///
    /// Returns the photo paths that were referenced so the caller can remove
    /// the files.
    pub fn delete_property_cascade(&self, id: i64) -> Result<Vec<String>> {
        instrumented("delete", || {
            let mut conn = self.database.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !property_exists(&tx, id)? {
                return Err(CatastroError::PropertyNotFound(id));
            }

            let paths = load_paths(&tx, id)?;
            tx.execute(
                &format!("DELETE FROM {} WHERE {} = ?", photos::TABLE, photos::PROPERTY_ID),
                params![id],
            )?;
            tx.execute(&format!("DELETE FROM {} WHERE {} = ?", p::TABLE, p::ID), params![id])?;
            tx.commit()?;

            info!(id, photos = paths.len(), "Deleted property");
            Ok(paths)
        })
    }

    /// Alias of [`PropertyRepository::delete_property_cascade`]
    pub fn delete(&self, id: i64) -> Result<Vec<String>> {
        self.delete_property_cascade(id)
    }

    /// Number of registered properties
    pub fn total_count(&self) -> Result<u64> {
        instrumented("total_count", || {
            let conn = self.database.get_connection()?;
            let total: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", p::TABLE), [], |row| row.get(0))?;
            Ok(u64::try_from(total).unwrap_or_default())
        })
    }
}

/// True when a property row with `id` exists
pub(crate) fn property_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)", p::TABLE, p::ID),
        params![id],
        |row| row.get(0),
    )
}

fn query_page(
    conn: &Connection,
    conditions: &[String],
    mut params: QueryParams,
    page: u32,
    page_size: u32,
) -> Result<Page<Property>> {
    if page == 0 || page_size == 0 {
        return Err(CatastroError::InvalidPagination { page, page_size });
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}{}", p::TABLE, where_clause),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let total = u64::try_from(total).unwrap_or_default();

    // (2^32 - 1)^2 fits in u64; SQLite's OFFSET does not go past i64::MAX
    let offset = u64::from(page - 1) * u64::from(page_size);
    let offset = match i64::try_from(offset) {
        Ok(sql_offset) if offset < total => sql_offset,
        _ => {
            debug!(page, page_size, total, "Page starts past the last record");
            return Ok(Page::new(Vec::new(), total, page, page_size));
        },
    };

    let query = format!(
        "SELECT * FROM {}{} ORDER BY {} DESC, {} DESC LIMIT ? OFFSET ?",
        p::TABLE,
        where_clause,
        p::CREATED_AT,
        p::ID
    );
    debug!(%query, page, page_size, "Listing properties");

    params.push(Box::new(i64::from(page_size)));
    params.push(Box::new(offset));

    let mut stmt = conn.prepare(&query)?;
    let records = stmt
        .query_map(params_from_iter(params.iter()), map_property)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Page::new(records, total, page, page_size))
}

fn filter_conditions(filter: &PropertyFilter) -> (Vec<String>, QueryParams) {
    let mut conditions = Vec::new();
    let mut params: QueryParams = Vec::new();

    for (column, pattern) in filter.text_patterns() {
        let (clause, param) = if column == p::IDENTITY_NUMBER {
            identity_condition(pattern)
        } else {
            (like_clause(column), like_pattern(pattern))
        };
        conditions.push(clause);
        params.push(Box::new(param));
    }

    if let Some(status) = filter.commercial_license_status {
        conditions.push(format!("{} = ?", p::COMMERCIAL_LICENSE_STATUS));
        params.push(Box::new(status));
    }

    if let Some(status) = filter.inspection_status {
        conditions.push(format!("{} = ?", p::INSPECTION_STATUS));
        params.push(Box::new(status));
    }

    (conditions, params)
}

// SQLite LIKE is case-insensitive for ASCII letters only.
fn like_clause(column: &str) -> String {
    format!("{column} LIKE ? ESCAPE '\\'")
}

/// SQL expression equal to [`IdentityValidator::normalize`] of the stored value
fn normalized_identity_sql() -> String {
    format!(
        "REPLACE(REPLACE(REPLACE(UPPER(TRIM({})), '.', ''), '-', ''), ' ', '')",
        p::IDENTITY_NUMBER
    )
}

/// Substring match on identity numbers, ignoring separators on both sides.
///
/// A pattern made only of separators falls back to a plain substring match.
fn identity_condition(pattern: &str) -> (String, String) {
    let normalized = IdentityValidator::normalize(pattern);
    if normalized.is_empty() {
        (like_clause(p::IDENTITY_NUMBER), like_pattern(pattern))
    } else {
        (
            format!("{} LIKE ? ESCAPE '\\'", normalized_identity_sql()),
            like_pattern(&normalized),
        )
    }
}

fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn record_params<'a>(record: &'a NewProperty, coordinates: &'a Option<String>) -> Vec<&'a dyn ToSql> {
    let values: [&dyn ToSql; WRITABLE_COLUMNS.len()] = [
        &record.identity_number,
        &record.owner_name,
        &record.contact_number,
        &record.address,
        &record.property_role_code,
        &record.total_assessed_value,
        &record.tax_use_code,
        &record.municipal_use_code,
        &record.commercial_license_status,
        &record.inspection_status,
        coordinates,
        &record.land_area_m2,
        &record.built_area_m2,
        &record.construction_line,
        &record.construction_year,
        &record.dom_file_number,
        &record.observations,
    ];
    values.to_vec()
}

fn insert_property(conn: &Connection, record: &NewProperty, now: NaiveDateTime) -> rusqlite::Result<i64> {
    let coordinates = record.coordinates.map(|c| c.to_string());
    let mut values = record_params(record, &coordinates);
    values.push(&now);
    values.push(&now);

    let placeholders = vec!["?"; values.len()].join(", ");
    conn.execute(
        &format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({})",
            p::TABLE,
            WRITABLE_COLUMNS.join(", "),
            p::CREATED_AT,
            p::UPDATED_AT,
            placeholders
        ),
        params_from_iter(values),
    )?;

    Ok(conn.last_insert_rowid())
}

fn overwrite_property(conn: &Connection, id: i64, record: &NewProperty, now: NaiveDateTime) -> rusqlite::Result<usize> {
    let coordinates = record.coordinates.map(|c| c.to_string());
    let mut values = record_params(record, &coordinates);
    values.push(&now);
    values.push(&id);

    let assignments = WRITABLE_COLUMNS
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute(
        &format!(
            "UPDATE {} SET {}, {} = ? WHERE {} = ?",
            p::TABLE,
            assignments,
            p::UPDATED_AT,
            p::ID
        ),
        params_from_iter(values),
    )
}

fn write_error(err: rusqlite::Error, record: &NewProperty) -> CatastroError {
    if is_unique_violation(&err) {
        CatastroError::DuplicateRecord {
            identity_number: record.identity_number.clone(),
            property_role_code: record.property_role_code.clone(),
        }
    } else {
        err.into()
    }
}

/// Map a database row to a Property
fn map_property(row: &Row) -> rusqlite::Result<Property> {
    let coordinates: Option<String> = row.get(p::COORDINATES)?;

    Ok(Property {
        id: row.get(p::ID)?,
        identity_number: row.get(p::IDENTITY_NUMBER)?,
        owner_name: row.get(p::OWNER_NAME)?,
        contact_number: row.get(p::CONTACT_NUMBER)?,
        address: row.get(p::ADDRESS)?,
        property_role_code: row.get(p::PROPERTY_ROLE_CODE)?,
        total_assessed_value: row.get(p::TOTAL_ASSESSED_VALUE)?,
        tax_use_code: row.get(p::TAX_USE_CODE)?,
        municipal_use_code: row.get(p::MUNICIPAL_USE_CODE)?,
        commercial_license_status: row.get(p::COMMERCIAL_LICENSE_STATUS)?,
        inspection_status: row.get(p::INSPECTION_STATUS)?,
        coordinates: coordinates.as_deref().and_then(CoordinateParser::parse),
        land_area_m2: row.get(p::LAND_AREA_M2)?,
        built_area_m2: row.get(p::BUILT_AREA_M2)?,
        construction_line: row.get(p::CONSTRUCTION_LINE)?,
        construction_year: row.get(p::CONSTRUCTION_YEAR)?,
        dom_file_number: row.get(p::DOM_FILE_NUMBER)?,
        observations: row.get(p::OBSERVATIONS)?,
        created_at: row.get(p::CREATED_AT)?,
        updated_at: row.get(p::UPDATED_AT)?,
    })
}
