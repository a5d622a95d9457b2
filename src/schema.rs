//! Database schema definitions
//!
//! Constants for table and column names used with rusqlite. The DDL lives in
//! `migrations/` and must stay in sync with these names.

/// Properties table schema
pub mod properties {
    /// Table name
    pub const TABLE: &str = "properties";
    /// Primary key column
    pub const ID: &str = "id";
    /// Owner national identity number column
    pub const IDENTITY_NUMBER: &str = "identity_number";
    /// Owner name column
    pub const OWNER_NAME: &str = "owner_name";
    /// Contact phone number column
    pub const CONTACT_NUMBER: &str = "contact_number";
    /// Street address column
    pub const ADDRESS: &str = "address";
    /// Municipal parcel role column
    pub const PROPERTY_ROLE_CODE: &str = "property_role_code";
    /// Total fiscal valuation column
    pub const TOTAL_ASSESSED_VALUE: &str = "total_assessed_value";
    /// Tax office use classification column
    pub const TAX_USE_CODE: &str = "tax_use_code";
    /// Municipal works use classification column
    pub const MUNICIPAL_USE_CODE: &str = "municipal_use_code";
    /// Commercial license status column
    pub const COMMERCIAL_LICENSE_STATUS: &str = "commercial_license_status";
    /// Municipal inspection status column
    pub const INSPECTION_STATUS: &str = "inspection_status";
    /// Formatted "lat, lon" column
    pub const COORDINATES: &str = "coordinates";
    /// Land area in square meters column
    pub const LAND_AREA_M2: &str = "land_area_m2";
    /// Built area in square meters column
    pub const BUILT_AREA_M2: &str = "built_area_m2";
    /// Construction line summary column
    pub const CONSTRUCTION_LINE: &str = "construction_line";
    /// Construction year column
    pub const CONSTRUCTION_YEAR: &str = "construction_year";
    /// Municipal works file number column
    pub const DOM_FILE_NUMBER: &str = "dom_file_number";
    /// Free-text observations column
    pub const OBSERVATIONS: &str = "observations";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp column
    pub const UPDATED_AT: &str = "updated_at";
}

/// Photos table schema
pub mod photos {
    /// Table name
    pub const TABLE: &str = "photos";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to properties table
    pub const PROPERTY_ID: &str = "property_id";
    /// Stored image path column
    pub const FILE_PATH: &str = "file_path";
    /// Upload timestamp column
    pub const UPLOADED_AT: &str = "uploaded_at";
}
