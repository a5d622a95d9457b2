//! Integration tests for the property repository

use std::collections::HashSet;

use catastro_registry::error::CatastroError;
use catastro_registry::models::{
    CommercialLicenseStatus, Coordinates, InspectionStatus, NewProperty, PropertyFilter,
};
use catastro_registry::{Database, PhotoStore, PropertyRepository};
use tempfile::TempDir;

fn setup() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = format!("sqlite://{}", temp_dir.path().join("catastro.db").display());
    let db = Database::new(&db_url).expect("Failed to create database");
    (temp_dir, db)
}

fn record(identity_number: &str, role: &str, owner: &str, address: &str) -> NewProperty {
    NewProperty {
        identity_number: identity_number.to_string(),
        owner_name: owner.to_string(),
        contact_number: "+56911112222".to_string(),
        address: address.to_string(),
        property_role_code: role.to_string(),
        total_assessed_value: 52_000_000.0,
        tax_use_code: Some("Habitacional".to_string()),
        municipal_use_code: Some("Residencial".to_string()),
        commercial_license_status: None,
        inspection_status: None,
        coordinates: None,
        land_area_m2: 300.0,
        built_area_m2: 140.0,
        construction_line: String::new(),
        construction_year: Some(2001),
        dom_file_number: None,
        observations: None,
    }
}

#[test]
fn test_upsert_then_get_round_trips_every_field() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let mut new = record("12.345.678-5", "123-4", "María González", "Av. Independencia 1234");
    new.commercial_license_status = Some(CommercialLicenseStatus::Current);
    new.inspection_status = Some(InspectionStatus::Irregular);
    new.coordinates = Some(Coordinates {
        lat: -33.4172,
        lon: -70.6506,
    });
    new.construction_line = "Hormigón 1995 120.50 m²".to_string();
    new.dom_file_number = Some("DOM-778".to_string());
    new.observations = Some("Ampliación sin permiso".to_string());

    let id = repo.upsert(&new).expect("Failed to save property");
    let stored = repo.get(id).unwrap().expect("Property should exist");

    assert_eq!(stored.id, id);
    assert_eq!(stored.to_new_property(), new);
    assert_eq!(stored.created_at, stored.updated_at);
}

#[test]
fn test_upsert_same_owner_and_role_overwrites() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let first = record("12.345.678-5", "123-4", "María González", "Av. Independencia 1234");
    let id = repo.upsert(&first).unwrap();

    let mut second = first.clone();
    second.owner_name = "María González Rojas".to_string();
    second.total_assessed_value = 60_000_000.0;
    let same_id = repo.upsert(&second).unwrap();

    assert_eq!(id, same_id);
    assert_eq!(repo.total_count().unwrap(), 1);

    let stored = repo.get(id).unwrap().unwrap();
    assert_eq!(stored.owner_name, "María González Rojas");
    assert_eq!(stored.total_assessed_value, 60_000_000.0);
    assert!(stored.updated_at >= stored.created_at);
}

#[test]
fn test_same_owner_different_role_creates_second_record() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let a = repo
        .upsert(&record("12.345.678-5", "123-4", "María González", "Av. Independencia 1234"))
        .unwrap();
    let b = repo
        .upsert(&record("12.345.678-5", "999-1", "María González", "Los Aromos 55"))
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(repo.find_by_identity_number("12.345.678-5").unwrap().len(), 2);
}

#[test]
fn test_update_into_existing_owner_and_role_is_duplicate() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    repo.upsert(&record("12.345.678-5", "123-4", "María González", "Av. Independencia 1234"))
        .unwrap();
    let other = repo
        .upsert(&record("12.345.678-5", "999-1", "María González", "Los Aromos 55"))
        .unwrap();

    let clash = record("12.345.678-5", "123-4", "María González", "Los Aromos 55");
    let err = repo.update(other, &clash).unwrap_err();
    assert!(matches!(err, CatastroError::DuplicateRecord { .. }));

    // The failed update left the record untouched
    assert_eq!(repo.get(other).unwrap().unwrap().property_role_code, "999-1");
}

#[test]
fn test_update_missing_property() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let err = repo
        .update(42, &record("12.345.678-5", "123-4", "María González", "Centro"))
        .unwrap_err();
    assert!(matches!(err, CatastroError::PropertyNotFound(42)));
}

#[test]
fn test_list_filters_address_case_insensitively() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Av. Independencia 1234"))
        .unwrap();
    repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "calle independencia 77"))
        .unwrap();
    repo.upsert(&record("10.000.004-0", "2-1", "Luis Rivas", "Pasaje Los Olmos 9"))
        .unwrap();

    let page = repo
        .list(1, 10, &PropertyFilter::new().address("Independencia"))
        .unwrap();

    assert_eq!(page.total, 2);
    assert!(page
        .records
        .iter()
        .all(|p| p.address.to_lowercase().contains("independencia")));
}

#[test]
fn test_list_ands_every_filter() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let mut licensed = record("11.111.111-1", "1-1", "Ana Soto", "Av. Independencia 1234");
    licensed.commercial_license_status = Some(CommercialLicenseStatus::Delinquent);
    repo.upsert(&licensed).unwrap();
    repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "Av. Independencia 99"))
        .unwrap();
    repo.upsert(&record("10.000.004-0", "2-1", "Luis Rivas", "Av. Independencia 5"))
        .unwrap();

    let filter = PropertyFilter {
        commercial_license_status: Some(CommercialLicenseStatus::Delinquent),
        ..PropertyFilter::new().owner_name("ana").address("independencia")
    };
    let page = repo.list(1, 10, &filter).unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].property_role_code, "1-1");
}

#[test]
fn test_list_treats_wildcards_literally() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Lote 50% norte"))
        .unwrap();
    repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "Lote 500 sur"))
        .unwrap();

    let page = repo.list(1, 10, &PropertyFilter::new().address("50%")).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].address, "Lote 50% norte");
}

#[test]
fn test_list_empty_filter_values_are_ignored() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();

    let page = repo
        .list(1, 10, &PropertyFilter::new().address("").owner_name(""))
        .unwrap();
    assert_eq!(page.total, 1);
}

#[test]
fn test_pagination_covers_every_record_once() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    for i in 0..23 {
        repo.upsert(&record("11.111.111-1", &format!("R-{i}"), "Ana Soto", "Centro"))
            .unwrap();
    }

    let mut seen = HashSet::new();
    let first = repo.list(1, 5, &PropertyFilter::new()).unwrap();
    assert_eq!(first.total, 23);
    assert_eq!(first.total_pages, 5);

    for page in 1..=first.total_pages {
        let page = u32::try_from(page).unwrap();
        let result = repo.list(page, 5, &PropertyFilter::new()).unwrap();
        let expected = if page == 5 { 3 } else { 5 };
        assert_eq!(result.records.len(), expected);
        for property in result.records {
            assert!(seen.insert(property.id), "record {} listed twice", property.id);
        }
    }
    assert_eq!(seen.len(), 23);

    let beyond = repo.list(6, 5, &PropertyFilter::new()).unwrap();
    assert!(beyond.records.is_empty());
    assert_eq!(beyond.total, 23);
}

#[test]
fn test_list_newest_first() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let older = repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();
    let newer = repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "Centro")).unwrap();

    let page = repo.list(1, 10, &PropertyFilter::new()).unwrap();
    let ids: Vec<i64> = page.records.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![newer, older]);
}

#[test]
fn test_list_rejects_zero_page_or_size() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    assert!(matches!(
        repo.list(0, 10, &PropertyFilter::new()),
        Err(CatastroError::InvalidPagination { page: 0, .. })
    ));
    assert!(matches!(
        repo.list(1, 0, &PropertyFilter::new()),
        Err(CatastroError::InvalidPagination { page_size: 0, .. })
    ));
}

#[test]
fn test_list_far_past_the_end_is_empty() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();
    repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "Centro")).unwrap();

    let page = repo.list(u32::MAX, u32::MAX, &PropertyFilter::new()).unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 1);

    let page = repo.search("soto", u32::MAX, 2).unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.total, 2);

    let page = repo
        .list_with_photos(u32::MAX, u32::MAX, &PropertyFilter::new())
        .unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.total, 2);
}

#[test]
fn test_identity_lookups_ignore_separators() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    let id = repo.upsert(&record("12.345.678-5", "123-4", "María González", "Centro"))
        .unwrap();
    repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();

    for spelling in ["12.345.678-5", "12345678-5", "123456785", " 12.345.678-5 "] {
        let found = repo.find_by_identity_number(spelling).unwrap();
        assert_eq!(found.len(), 1, "lookup by {spelling:?}");
        assert_eq!(found[0].id, id);
    }

    let filtered = repo
        .list(1, 10, &PropertyFilter::new().identity_number("12345678"))
        .unwrap();
    assert_eq!(filtered.total, 1);
    assert_eq!(repo.search("12345678", 1, 10).unwrap().total, 1);

    // Same owner spelled without separators lands on the existing row
    let again = repo.upsert(&record("123456785", "123-4", "María González", "Centro"))
        .unwrap();
    assert_eq!(again, id);
    assert_eq!(repo.total_count().unwrap(), 2);
}

#[test]
fn test_search_matches_any_field() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Av. Matta 10")).unwrap();
    repo.upsert(&record("10.000.004-0", "2-1", "Luis Rivas", "Pasaje Soto 4"))
        .unwrap();
    repo.upsert(&record("10.000.013-K", "3-1", "Pedro Lagos", "Centro")).unwrap();

    assert_eq!(repo.search("soto", 1, 10).unwrap().total, 2);
    assert_eq!(repo.search("10.000.013", 1, 10).unwrap().total, 1);
    assert_eq!(repo.search("2-1", 1, 10).unwrap().total, 1);
    assert_eq!(repo.search("  ", 1, 10).unwrap().total, 3);
}

#[test]
fn test_list_with_photos_pairs_each_record() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db.clone());
    let photos = PhotoStore::new(db);

    let with = repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();
    let without = repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "Centro")).unwrap();
    photos
        .replace_all(with, &["uploads/front.jpg", "uploads/back.jpg"])
        .unwrap();

    let page = repo.list_with_photos(1, 10, &PropertyFilter::new()).unwrap();
    assert_eq!(page.records.len(), 2);

    for listing in &page.records {
        if listing.property.id == with {
            assert_eq!(listing.photos, vec!["uploads/front.jpg", "uploads/back.jpg"]);
            assert_eq!(listing.thumbnail(), Some("uploads/front.jpg"));
        } else {
            assert_eq!(listing.property.id, without);
            assert!(listing.photos.is_empty());
            assert_eq!(listing.thumbnail(), None);
        }
    }
}

#[test]
fn test_delete_cascade_removes_photos_and_returns_paths() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db.clone());
    let photos = PhotoStore::new(db);

    let id = repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();
    photos.replace_all(id, &["uploads/a.jpg", "uploads/b.jpg"]).unwrap();

    let paths = repo.delete_property_cascade(id).unwrap();
    assert_eq!(paths, vec!["uploads/a.jpg", "uploads/b.jpg"]);

    assert!(repo.get(id).unwrap().is_none());
    assert!(matches!(photos.list_for(id), Err(CatastroError::PropertyNotFound(_))));
    assert_eq!(repo.total_count().unwrap(), 0);

    assert!(matches!(repo.delete(id), Err(CatastroError::PropertyNotFound(_))));
}

#[test]
fn test_total_count_tracks_inserts_and_deletes() {
    let (_dir, db) = setup();
    let repo = PropertyRepository::new(db);

    assert_eq!(repo.total_count().unwrap(), 0);
    let a = repo.upsert(&record("11.111.111-1", "1-1", "Ana Soto", "Centro")).unwrap();
    repo.upsert(&record("11.111.111-1", "1-2", "Ana Soto", "Centro")).unwrap();
    assert_eq!(repo.total_count().unwrap(), 2);

    repo.delete(a).unwrap();
    assert_eq!(repo.total_count().unwrap(), 1);
}

#[test]
fn test_unreachable_storage() {
    let temp_dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened as a database file
    let err = Database::new(temp_dir.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, CatastroError::StorageUnavailable(_)));
}
