// Registry-driven validation rules and pagination math, exercised
// through the public API.

use serde_json::json;

use campus_api_rust::database::record::{validate_create, RecordError};
use campus_api_rust::query::{Page, PageRequest};
use campus_api_rust::registry;

#[test]
fn attendance_rejects_unknown_status() {
    let err = validate_create(
        &json!({"studentId": "stu1", "date": "2024-03-01", "status": "partying"}),
        &registry::ATTENDANCE,
    );
    assert!(matches!(err, Err(RecordError::InvalidEnumValue { .. })));
}

#[test]
fn payment_method_is_a_closed_set() {
    let ok = validate_create(
        &json!({"packageId": "p1", "amount": 4999, "paymentMethod": "upi", "date": "2024-04-01"}),
        &registry::PAYMENTS,
    );
    assert!(ok.is_ok());

    let err = validate_create(
        &json!({"packageId": "p1", "amount": 4999, "paymentMethod": "cheque", "date": "2024-04-01"}),
        &registry::PAYMENTS,
    );
    assert!(matches!(err, Err(RecordError::InvalidEnumValue { field, .. }) if field == "paymentMethod"));
}

#[test]
fn holiday_year_is_derived_not_parsed_from_display_text() {
    let data = validate_create(
        &json!({"name": "Republic Day", "date": "2025-01-26", "type": "National Holiday"}),
        &registry::HOLIDAYS,
    )
    .unwrap();
    assert_eq!(data["year"], json!(2025));

    let err = validate_create(
        &json!({"name": "Republic Day", "date": "26th January 2025", "type": "National Holiday"}),
        &registry::HOLIDAYS,
    );
    assert!(matches!(err, Err(RecordError::InvalidDate { .. })));
}

#[test]
fn client_supplied_tenant_id_is_always_rejected() {
    for spec in registry::RESOURCES {
        let err = validate_create(&json!({"schoolId": "S1"}), spec);
        assert!(
            matches!(err, Err(RecordError::SystemFieldNotAllowed(ref f)) if f == "schoolId"),
            "{} accepted a body schoolId",
            spec.name
        );
    }
}

#[test]
fn fifteen_events_at_limit_ten_is_two_pages() {
    // Page 2 of 15 records with limit 10 holds the remaining 5
    let request = PageRequest::from_params(Some(2), Some(10));
    assert_eq!(request.offset(), 10);

    let page = Page::new(vec![(); 5], 15, request);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.items.len(), 5);
}

#[test]
fn union_of_pages_reproduces_the_filtered_set() {
    // Simulate pages of limit 4 over 10 records: offsets and sizes must
    // tile the set exactly, no overlap, no gaps.
    let total: i64 = 10;
    let limit: i64 = 4;
    let mut covered = vec![false; total as usize];

    let pages = (total + limit - 1) / limit;
    for page_number in 1..=pages {
        let request = PageRequest::from_params(Some(page_number), Some(limit));
        let start = request.offset();
        let end = (start + limit).min(total);
        for index in start..end {
            assert!(!covered[index as usize], "record {} returned twice", index);
            covered[index as usize] = true;
        }
    }
    assert!(covered.into_iter().all(|seen| seen));
}

#[test]
fn generated_ddl_enforces_declared_uniqueness() {
    let ddl = registry::ddl();

    // (studentId, date, schoolId) for attendance
    let attendance = ddl
        .iter()
        .find(|s| s.contains("attendance_unique_key_idx"))
        .expect("attendance unique index");
    assert!(attendance.contains("school_id"));
    assert!(attendance.contains("(data->>'studentId')"));
    assert!(attendance.contains("(data->>'date')"));

    // (title, date, schoolId) for circulars
    let circulars = ddl
        .iter()
        .find(|s| s.contains("circulars_unique_key_idx"))
        .expect("circulars unique index");
    assert!(circulars.contains("(data->>'title')"));
}
