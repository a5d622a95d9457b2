//! Tests for identity number, coordinate and record validation

use catastro_registry::config::PhotoConfig;
use catastro_registry::error::CatastroError;
use catastro_registry::models::{construction_line, ConstructionEntry, Coordinates, NewProperty};
use catastro_registry::validation::{CoordinateParser, IdentityValidator, InputValidator};
use proptest::prelude::*;

fn valid_record() -> NewProperty {
    NewProperty {
        identity_number: "12.345.678-5".to_string(),
        owner_name: "Juan Pérez".to_string(),
        contact_number: "+56987654321".to_string(),
        address: "Calle Independencia 456".to_string(),
        property_role_code: "0456-12".to_string(),
        total_assessed_value: 38_500_000.0,
        tax_use_code: None,
        municipal_use_code: None,
        commercial_license_status: None,
        inspection_status: None,
        coordinates: None,
        land_area_m2: 180.0,
        built_area_m2: 95.0,
        construction_line: String::new(),
        construction_year: None,
        dom_file_number: None,
        observations: None,
    }
}

#[test]
fn test_identity_valid_in_every_format() {
    assert!(IdentityValidator::is_valid("12345678-5"));
    assert!(IdentityValidator::is_valid("12.345.678-5"));
    assert!(IdentityValidator::is_valid("123456785"));
    assert!(IdentityValidator::is_valid(" 12 345 678-5 "));
}

#[test]
fn test_identity_wrong_check_character() {
    assert!(!IdentityValidator::is_valid("12345678-9"));
    assert!(!IdentityValidator::is_valid("12.345.678-K"));
}

#[test]
fn test_identity_check_character_zero() {
    assert_eq!(IdentityValidator::check_character("10000004"), Some('0'));
    assert!(IdentityValidator::is_valid("10.000.004-0"));
}

#[test]
fn test_identity_check_character_k_either_case() {
    assert_eq!(IdentityValidator::check_character("10000013"), Some('K'));
    assert!(IdentityValidator::is_valid("10000013-K"));
    assert!(IdentityValidator::is_valid("10000013-k"));
}

#[test]
fn test_identity_rejects_malformed_input() {
    assert!(!IdentityValidator::is_valid(""));
    assert!(!IdentityValidator::is_valid("5"));
    assert!(!IdentityValidator::is_valid("-"));
    assert!(!IdentityValidator::is_valid("12a45678-5"));
    assert!(!IdentityValidator::is_valid("12345678-X"));
    assert!(!IdentityValidator::is_valid("١٢٣٤٥٦٧٨-5"));
}

#[test]
fn test_identity_normalize() {
    assert_eq!(IdentityValidator::normalize("10.000.013-k"), "10000013K");
}

#[test]
fn test_coordinates_plain_and_parenthesized() {
    let expected = Some(Coordinates {
        lat: -33.45,
        lon: -70.66,
    });
    assert_eq!(CoordinateParser::parse("-33.45, -70.66"), expected);
    assert_eq!(CoordinateParser::parse("(-33.45,-70.66)"), expected);
    assert_eq!(CoordinateParser::parse("  ( -33.45 ,  -70.66 )  "), expected);
}

#[test]
fn test_coordinates_missing_comma() {
    assert_eq!(CoordinateParser::parse("-33.45 -70.66"), None);
}

#[test]
fn test_coordinates_out_of_range() {
    assert_eq!(CoordinateParser::parse("91, 0"), None);
    assert_eq!(CoordinateParser::parse("0, -180.5"), None);
    assert_eq!(CoordinateParser::parse("NaN, 0"), None);
}

#[test]
fn test_coordinates_bounds_are_inclusive() {
    assert_eq!(
        CoordinateParser::parse("90, -180"),
        Some(Coordinates {
            lat: 90.0,
            lon: -180.0
        })
    );
}

#[test]
fn test_coordinates_garbage() {
    assert_eq!(CoordinateParser::parse(""), None);
    assert_eq!(CoordinateParser::parse(","), None);
    assert_eq!(CoordinateParser::parse("north, south"), None);
}

#[test]
fn test_validate_property_accepts_valid_record() {
    assert!(InputValidator::validate_property(&valid_record()).is_ok());
}

#[test]
fn test_validate_property_requires_owner_name() {
    let mut record = valid_record();
    record.owner_name = "   ".to_string();
    assert!(matches!(
        InputValidator::validate_property(&record),
        Err(CatastroError::InvalidField {
            field: "owner_name",
            ..
        })
    ));
}

#[test]
fn test_validate_property_requires_positive_value() {
    let mut record = valid_record();
    record.total_assessed_value = 0.0;
    assert!(InputValidator::validate_property(&record).is_err());
}

#[test]
fn test_validate_property_rejects_negative_area() {
    let mut record = valid_record();
    record.built_area_m2 = -1.0;
    assert!(InputValidator::validate_property(&record).is_err());
}

#[test]
fn test_validate_construction_year_bounds() {
    assert!(InputValidator::validate_construction_year(1800).is_ok());
    assert!(InputValidator::validate_construction_year(1799).is_err());
    assert!(InputValidator::validate_construction_year(3000).is_err());
}

#[test]
fn test_validate_photo_upload() {
    let policy = PhotoConfig::default();
    assert!(InputValidator::validate_photo_upload("fachada.JPG", 1024, &policy).is_ok());
    assert!(InputValidator::validate_photo_upload("plano.pdf", 1024, &policy).is_err());
    assert!(InputValidator::validate_photo_upload("sin_extension", 1024, &policy).is_err());
    assert!(InputValidator::validate_photo_upload("grande.png", 10 * 1024 * 1024 + 1, &policy).is_err());
}

#[test]
fn test_sanitize_text() {
    assert_eq!(InputValidator::sanitize_text("  Av. Matta\u{0} 120 "), "Av. Matta 120");
}

#[test]
fn test_construction_line_joins_entries() {
    let entries = vec![
        ConstructionEntry {
            material: Some("Albañilería".to_string()),
            year: Some(1990),
            area_m2: Some(80.0),
        },
        ConstructionEntry {
            material: Some("Madera".to_string()),
            year: None,
            area_m2: Some(15.5),
        },
    ];
    assert_eq!(
        construction_line(&entries).unwrap(),
        "Albañilería 1990 80.00 m² | Madera 15.50 m²"
    );
}

#[test]
fn test_construction_line_rejects_more_than_six_entries() {
    let entries = vec![ConstructionEntry::default(); 7];
    assert!(construction_line(&entries).is_err());
}

proptest! {
    #[test]
    fn identity_validation_never_panics(raw in "\\PC{0,24}") {
        let _ = IdentityValidator::is_valid(&raw);
    }

    #[test]
    fn identity_validation_ignores_formatting(body in 1_000_000u32..99_999_999u32) {
        let body = body.to_string();
        let check = IdentityValidator::check_character(&body).unwrap();

        let plain = format!("{body}{check}");
        let dashed = format!("{body}-{check}");
        let dotted = format!("{}.{}-{}", &body[..body.len() - 3], &body[body.len() - 3..], check);

        prop_assert!(IdentityValidator::is_valid(&plain));
        prop_assert!(IdentityValidator::is_valid(&dashed));
        prop_assert!(IdentityValidator::is_valid(&dotted));
    }

    #[test]
    fn coordinate_parsing_never_panics(raw in "\\PC{0,32}") {
        if let Some(c) = CoordinateParser::parse(&raw) {
            prop_assert!((-90.0..=90.0).contains(&c.lat));
            prop_assert!((-180.0..=180.0).contains(&c.lon));
        }
    }

    #[test]
    fn coordinates_in_range_round_trip_through_display(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
        let parsed = CoordinateParser::parse(&Coordinates { lat, lon }.to_string());
        prop_assert_eq!(parsed, Some(Coordinates { lat, lon }));
    }
}
