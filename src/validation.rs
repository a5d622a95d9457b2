//! Field validation for property records.
//!
//! Identity numbers and coordinates are validated with cheap, composable
//! `bool` / `Option` results; whole-record checks return a [`CatastroError`].

use std::path::Path;

use chrono::{Datelike, Local};

use crate::config::PhotoConfig;
use crate::error::{CatastroError, Result};
use crate::models::{Coordinates, NewProperty, CONSTRUCTION_LINE_SEPARATOR, MAX_CONSTRUCTION_ENTRIES};

/// Earliest construction year accepted by the registry
pub const MIN_CONSTRUCTION_YEAR: i32 = 1800;

/// National identity number validator (mod-11 check character)
#[derive(Debug, Copy, Clone)]
pub struct IdentityValidator;

impl IdentityValidator {
    /// Canonical form: separators (dots, dashes, spaces) removed, upper-cased
    #[must_use]
    pub fn normalize(raw: &str) -> String {
        raw.trim()
            .to_uppercase()
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | ' '))
            .collect()
    }

    /// Stored form: `<digits>-<check>`, e.g. `12345678-5` for `12.345.678-5`
    #[must_use]
    pub fn canonical(raw: &str) -> String {
        let normalized = Self::normalize(raw);
        match normalized.char_indices().last() {
            Some((split, _)) if split > 0 => format!("{}-{}", &normalized[..split], &normalized[split..]),
            _ => normalized,
        }
    }

    /// Expected check character for a body of ASCII digits.
    ///
    /// Returns `None` when `body` is empty or contains anything but digits.
    #[must_use]
    pub fn check_character(body: &str) -> Option<char> {
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut sum: u32 = 0;
        for (i, digit) in body.bytes().rev().enumerate() {
            let weight = 2 + (i % 6) as u32;
            sum = (sum + u32::from(digit - b'0') * weight) % 11;
        }

        match 11 - sum {
            11 => Some('0'),
            10 => Some('K'),
            n => char::from_digit(n, 10),
        }
    }

    /// True when `raw` carries a correct check character.
    ///
    /// Accepts `12345678-5`, `12.345.678-5` and `123456785` alike; never panics.
    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        let normalized = Self::normalize(raw);
        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() < 2 {
            return false;
        }

        let (body, check) = chars.split_at(chars.len() - 1);
        let check = check[0];
        if !(check.is_ascii_digit() || check == 'K') {
            return false;
        }

        let body: String = body.iter().collect();
        Self::check_character(&body) == Some(check)
    }
}

/// Free-text "lat, lon" parser
#[derive(Debug, Copy, Clone)]
pub struct CoordinateParser;

impl CoordinateParser {
    /// Parse `raw` into a bounded coordinate pair.
    ///
    /// Every failure yields `None`, which callers treat as "location unset".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Coordinates> {
        if !raw.contains(',') {
            return None;
        }

        let cleaned: String = raw
            .trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace())
            .chars()
            .filter(|c| *c != ' ')
            .collect();

        let (lat, lon) = cleaned.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;

        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
            Some(Coordinates { lat, lon })
        } else {
            None
        }
    }
}

/// Form-contract validation for whole records and uploads
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate every field of a record before it reaches the repository
    pub fn validate_property(record: &NewProperty) -> Result<()> {
        if !IdentityValidator::is_valid(&record.identity_number) {
            return Err(CatastroError::invalid_field(
                "identity_number",
                format!("'{}' has a wrong format or check character", record.identity_number),
            ));
        }

        Self::require_text("owner_name", &record.owner_name)?;
        Self::require_text("contact_number", &record.contact_number)?;
        Self::require_text("address", &record.address)?;
        Self::require_text("property_role_code", &record.property_role_code)?;

        if !record.total_assessed_value.is_finite() || record.total_assessed_value <= 0.0 {
            return Err(CatastroError::invalid_field(
                "total_assessed_value",
                "must be a number greater than zero",
            ));
        }

        Self::require_area("land_area_m2", record.land_area_m2)?;
        Self::require_area("built_area_m2", record.built_area_m2)?;

        if let Some(year) = record.construction_year {
            Self::validate_construction_year(year)?;
        }

        let entries = if record.construction_line.trim().is_empty() {
            0
        } else {
            record.construction_line.split(CONSTRUCTION_LINE_SEPARATOR).count()
        };
        if entries > MAX_CONSTRUCTION_ENTRIES {
            return Err(CatastroError::invalid_field(
                "construction_line",
                format!("at most {MAX_CONSTRUCTION_ENTRIES} entries allowed, got {entries}"),
            ));
        }

        Ok(())
    }

    /// Construction year must fall in 1800..=current year
    pub fn validate_construction_year(year: i32) -> Result<()> {
        let current = Local::now().year();
        if !(MIN_CONSTRUCTION_YEAR..=current).contains(&year) {
            return Err(CatastroError::invalid_field(
                "construction_year",
                format!("{year} is outside {MIN_CONSTRUCTION_YEAR}..={current}"),
            ));
        }
        Ok(())
    }

    /// Validate an uploaded photo's name and size against the photo policy
    pub fn validate_photo_upload(file_name: &str, size_bytes: u64, policy: &PhotoConfig) -> Result<()> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !policy.allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&extension)) {
            return Err(CatastroError::invalid_field(
                "photo",
                format!(
                    "{file_name}: extension '{extension}' not in {:?}",
                    policy.allowed_extensions
                ),
            ));
        }

        let max_bytes = policy.max_file_size_mb * 1024 * 1024;
        if size_bytes > max_bytes {
            return Err(CatastroError::invalid_field(
                "photo",
                format!("{file_name}: exceeds the {} MB limit", policy.max_file_size_mb),
            ));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn require_text(field: &'static str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(CatastroError::invalid_field(field, "cannot be empty"));
        }
        Ok(())
    }

    fn require_area(field: &'static str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(CatastroError::invalid_field(field, "must be zero or positive"));
        }
        Ok(())
    }
}
