//! Lean normalization across both engine record shapes

use serde_json::json;
use stratum_domain::value_objects::{LeanRecord, NativeShape};

const DOCUMENT: NativeShape = NativeShape {
    id: "_id",
    created_at: "createdAt",
    updated_at: "updatedAt",
};

const ROW: NativeShape = NativeShape {
    id: "id",
    created_at: "created_at",
    updated_at: "updated_at",
};

#[test]
fn both_shapes_normalize_to_the_same_lean_record() {
    let document = LeanRecord::from_native(
        json!({
            "_id": "r-1",
            "createdAt": "2024-06-01T00:00:00Z",
            "updatedAt": "2024-06-02T00:00:00Z",
            "title": "same",
        }),
        DOCUMENT,
    );
    let row = LeanRecord::from_native(
        json!({
            "id": "r-1",
            "created_at": "2024-06-01T00:00:00Z",
            "updated_at": "2024-06-02T00:00:00Z",
            "title": "same",
        }),
        ROW,
    );

    assert_eq!(document, row);
    assert_eq!(document.id, "r-1");
    assert_eq!(document.field("title"), Some(&json!("same")));
}

#[test]
fn lean_records_serialize_with_stable_field_names() {
    let record = LeanRecord::from_native(
        json!({"_id": "x", "createdAt": 0, "updatedAt": 0, "n": 1}),
        DOCUMENT,
    );
    let value = serde_json::to_value(&record).unwrap();
    assert!(value["id"].is_string());
    assert!(value["created_at"].is_string());
    assert!(value["updated_at"].is_string());
    assert_eq!(value["fields"]["n"], 1);
}
