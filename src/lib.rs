//! Catastro Registry - Municipal Property Cadastre Core
//!
//! A Rust library for registering properties, their owners and their photo
//! references in a local SQLite store.
//!
//! # Features
//!
//! - National identity number (mod-11) validation
//! - Free-text coordinate parsing
//! - Property upsert, filtered pagination and cascading delete
//! - Ordered photo lists with atomic single-photo removal
//! - Photo file cleanup reported per file

/// Photo file removal after record deletion
pub mod cleanup;
/// Configuration management
pub mod config;
/// Database connection handling
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Photo reference storage
pub mod photos;
/// Repository pattern for data access
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Record operations paired with file cleanup
pub mod service;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{CatastroError, Result};
pub use models::{
    CommercialLicenseStatus, Coordinates, InspectionStatus, NewProperty, Page, Property, PropertyFilter,
    PropertyListing,
};
pub use photos::PhotoStore;
pub use repository::PropertyRepository;
pub use service::CadastreService;
pub use validation::{CoordinateParser, IdentityValidator};
