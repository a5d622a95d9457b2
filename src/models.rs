//! Data models for property records and their photos
//!
//! This module contains the record types handed to and returned from the
//! repository, the typed listing filter, and the construction line builder.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CatastroError, Result};

/// Maximum number of material/year/area entries in a construction line
pub const MAX_CONSTRUCTION_ENTRIES: usize = 6;

/// Separator placed between construction line entries
pub const CONSTRUCTION_LINE_SEPARATOR: &str = " | ";

/// A bounded latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees, -90..=90
    pub lat: f64,
    /// Longitude in degrees, -180..=180
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

/// Unrecognized status label read from storage or user input
#[derive(Debug, Error)]
#[error("unknown {kind} status: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Commercial license standing of the parcel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommercialLicenseStatus {
    /// License paid and current
    Current,
    /// License payments overdue
    Delinquent,
    /// No commercial license
    None,
}

impl CommercialLicenseStatus {
    /// Storage label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Delinquent => "delinquent",
            Self::None => "none",
        }
    }
}

impl FromStr for CommercialLicenseStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "delinquent" => Ok(Self::Delinquent),
            "none" => Ok(Self::None),
            _ => Err(ParseStatusError {
                kind: "commercial license",
                value: s.to_string(),
            }),
        }
    }
}

impl ToSql for CommercialLicenseStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CommercialLicenseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Outcome of the municipal works inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionStatus {
    /// Construction matches the permits on file
    Regularized,
    /// Construction deviates from the permits on file
    Irregular,
}

impl InspectionStatus {
    /// Storage label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regularized => "regularized",
            Self::Irregular => "irregular",
        }
    }
}

impl FromStr for InspectionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regularized" => Ok(Self::Regularized),
            "irregular" => Ok(Self::Irregular),
            _ => Err(ParseStatusError {
                kind: "inspection",
                value: s.to_string(),
            }),
        }
    }
}

impl ToSql for InspectionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for InspectionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// One material/year/area row of the construction details form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionEntry {
    /// Main construction material (e.g. "Hormigón", "Madera")
    pub material: Option<String>,
    /// Year this section was built
    pub year: Option<i32>,
    /// Built area of this section in square meters
    pub area_m2: Option<f64>,
}

impl ConstructionEntry {
    /// True when no field carries a value
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.material.as_deref().map_or(true, |m| m.trim().is_empty())
            && self.year.is_none()
            && self.area_m2.is_none()
    }

    /// Render as `"<material> <year> <area> m²"`, omitting missing parts
    #[must_use]
    pub fn render(&self) -> String {
        let parts = [
            self.material.as_deref().map(|m| m.trim().to_string()),
            self.year.map(|y| y.to_string()),
            self.area_m2.map(|a| format!("{a:.2} m²")),
        ];

        parts
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build the construction line summary stored on a property.
///
/// Blank entries are skipped; at most [`MAX_CONSTRUCTION_ENTRIES`] may be given.
pub fn construction_line(entries: &[ConstructionEntry]) -> Result<String> {
    if entries.len() > MAX_CONSTRUCTION_ENTRIES {
        return Err(CatastroError::invalid_field(
            "construction_line",
            format!("at most {MAX_CONSTRUCTION_ENTRIES} entries allowed, got {}", entries.len()),
        ));
    }

    let rendered: Vec<String> = entries
        .iter()
        .filter(|e| !e.is_blank())
        .map(ConstructionEntry::render)
        .filter(|s| !s.is_empty())
        .collect();

    Ok(rendered.join(CONSTRUCTION_LINE_SEPARATOR))
}

/// Field values for creating or overwriting a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProperty {
    /// Owner national identity number (digits + check character)
    pub identity_number: String,
    /// Owner full name
    pub owner_name: String,
    /// Owner contact phone number
    pub contact_number: String,
    /// Street address of the parcel
    pub address: String,
    /// Municipal parcel role code
    pub property_role_code: String,
    /// Total fiscal valuation
    pub total_assessed_value: f64,
    /// Tax office use classification
    pub tax_use_code: Option<String>,
    /// Municipal works use classification
    pub municipal_use_code: Option<String>,
    /// Commercial license standing
    pub commercial_license_status: Option<CommercialLicenseStatus>,
    /// Municipal inspection outcome
    pub inspection_status: Option<InspectionStatus>,
    /// Location of the parcel
    pub coordinates: Option<Coordinates>,
    /// Land area in square meters
    pub land_area_m2: f64,
    /// Built area in square meters
    pub built_area_m2: f64,
    /// Construction line summary (see [`construction_line`])
    pub construction_line: String,
    /// Year of construction
    pub construction_year: Option<i32>,
    /// Municipal works file number
    pub dom_file_number: Option<String>,
    /// Free-text observations
    pub observations: Option<String>,
}

/// Database representation of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Database primary key
    pub id: i64,
    /// Owner national identity number
    pub identity_number: String,
    /// Owner full name
    pub owner_name: String,
    /// Owner contact phone number
    pub contact_number: String,
    /// Street address of the parcel
    pub address: String,
    /// Municipal parcel role code
    pub property_role_code: String,
    /// Total fiscal valuation
    pub total_assessed_value: f64,
    /// Tax office use classification
    pub tax_use_code: Option<String>,
    /// Municipal works use classification
    pub municipal_use_code: Option<String>,
    /// Commercial license standing
    pub commercial_license_status: Option<CommercialLicenseStatus>,
    /// Municipal inspection outcome
    pub inspection_status: Option<InspectionStatus>,
    /// Location of the parcel
    pub coordinates: Option<Coordinates>,
    /// Land area in square meters
    pub land_area_m2: f64,
    /// Built area in square meters
    pub built_area_m2: f64,
    /// Construction line summary
    pub construction_line: String,
    /// Year of construction
    pub construction_year: Option<i32>,
    /// Municipal works file number
    pub dom_file_number: Option<String>,
    /// Free-text observations
    pub observations: Option<String>,
    /// Timestamp when the record was inserted
    pub created_at: NaiveDateTime,
    /// Timestamp of the last overwrite
    pub updated_at: NaiveDateTime,
}

impl Property {
    /// Strip generated fields, leaving the values a caller supplied
    #[must_use]
    pub fn to_new_property(&self) -> NewProperty {
        NewProperty {
            identity_number: self.identity_number.clone(),
            owner_name: self.owner_name.clone(),
            contact_number: self.contact_number.clone(),
            address: self.address.clone(),
            property_role_code: self.property_role_code.clone(),
            total_assessed_value: self.total_assessed_value,
            tax_use_code: self.tax_use_code.clone(),
            municipal_use_code: self.municipal_use_code.clone(),
            commercial_license_status: self.commercial_license_status,
            inspection_status: self.inspection_status,
            coordinates: self.coordinates,
            land_area_m2: self.land_area_m2,
            built_area_m2: self.built_area_m2,
            construction_line: self.construction_line.clone(),
            construction_year: self.construction_year,
            dom_file_number: self.dom_file_number.clone(),
            observations: self.observations.clone(),
        }
    }
}

/// Database representation of a photo reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Database primary key
    pub id: i64,
    /// Owning property
    pub property_id: i64,
    /// Path of the stored image
    pub file_path: String,
    /// Timestamp when the reference was stored
    pub uploaded_at: NaiveDateTime,
}

/// Listing filters; every present, non-empty value is ANDed.
///
/// Text fields match as ASCII-case-insensitive substrings; statuses match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilter {
    /// Substring of the owner identity number
    pub identity_number: Option<String>,
    /// Substring of the owner name
    pub owner_name: Option<String>,
    /// Substring of the address
    pub address: Option<String>,
    /// Substring of the role code
    pub property_role_code: Option<String>,
    /// Substring of the tax use code
    pub tax_use_code: Option<String>,
    /// Substring of the municipal use code
    pub municipal_use_code: Option<String>,
    /// Exact commercial license status
    pub commercial_license_status: Option<CommercialLicenseStatus>,
    /// Exact inspection status
    pub inspection_status: Option<InspectionStatus>,
}

impl PropertyFilter {
    /// Create an empty filter matching every record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to addresses containing `pattern`
    #[must_use]
    pub fn address(mut self, pattern: impl Into<String>) -> Self {
        self.address = Some(pattern.into());
        self
    }

    /// Restrict to owner names containing `pattern`
    #[must_use]
    pub fn owner_name(mut self, pattern: impl Into<String>) -> Self {
        self.owner_name = Some(pattern.into());
        self
    }

    /// Restrict to identity numbers containing `pattern`
    #[must_use]
    pub fn identity_number(mut self, pattern: impl Into<String>) -> Self {
        self.identity_number = Some(pattern.into());
        self
    }

    /// Restrict to role codes containing `pattern`
    #[must_use]
    pub fn property_role_code(mut self, pattern: impl Into<String>) -> Self {
        self.property_role_code = Some(pattern.into());
        self
    }

    /// Substring patterns paired with their column, skipping empty values
    pub(crate) fn text_patterns(&self) -> Vec<(&'static str, &str)> {
        use crate::schema::properties as p;

        [
            (p::IDENTITY_NUMBER, &self.identity_number),
            (p::OWNER_NAME, &self.owner_name),
            (p::ADDRESS, &self.address),
            (p::PROPERTY_ROLE_CODE, &self.property_role_code),
            (p::TAX_USE_CODE, &self.tax_use_code),
            (p::MUNICIPAL_USE_CODE, &self.municipal_use_code),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (column, v))
        })
        .collect()
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records on this page
    pub records: Vec<T>,
    /// Number of matching records before pagination
    pub total: u64,
    /// `ceil(total / page_size)`
    pub total_pages: u64,
    /// Requested page (1-based)
    pub page: u32,
    /// Requested page size
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Assemble a page, deriving `total_pages`
    #[must_use]
    pub fn new(records: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        Self {
            records,
            total,
            total_pages: total.div_ceil(u64::from(page_size.max(1))),
            page,
            page_size,
        }
    }

    /// Transform every record, keeping the pagination fields
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            total: self.total,
            total_pages: self.total_pages,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// A property paired with its photo paths, as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyListing {
    /// The property record
    pub property: Property,
    /// Photo paths in insertion order
    pub photos: Vec<String>,
}

impl PropertyListing {
    /// First photo, used as the listing thumbnail
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }
}
