use crate::error::schema::SchemaError;
use crate::schema::{TypeCategory, TypeSchema};

use serde_json::{json, Value};

// Trimmed-down schema payload in the host app's wire shape: entries are
// positional arrays keyed by numeric ID.
fn sample_payload() -> Value {
    json!({
        "itemTypes": {
            "2": ["book", "Book", [1, 2], [110, 115], {"115": 110}, "treeitem-book.png"],
            "3": ["note", "Note", [false], [], {}, "treeitem-note.png"],
            "13": ["webpage", "Web Page", [1], [110, 116], {"116": 110}, "treeitem-webpage.png"]
        },
        "creatorTypes": {
            "1": ["author", "Author"],
            "2": ["editor", "Editor"],
            "5": ["composer", "Composer"]
        },
        "fields": {
            "110": ["title", "Title", true],
            "115": ["bookTitle", "Book Title"],
            "116": ["websiteTitle", "Website Title"],
            "120": ["runtime", "Runtime"]
        }
    })
}

fn schema() -> TypeSchema {
    TypeSchema::init(&sample_payload()).expect("sample payload should parse")
}

/// **VALUE**: Verifies the dual index: ID and name resolve to the same
/// record in every category.
///
/// **WHY THIS MATTERS**: Translators reference types by name, saved items
/// by numeric ID; both must hit the same record with no ambiguity.
///
/// **BUG THIS CATCHES**: Indexing under only one key form, or the two keys
/// pointing at diverging copies.
#[test]
fn given_id_and_name_when_looked_up_then_identical_records() {
    let schema = schema();

    for category in [
        TypeCategory::ItemTypes,
        TypeCategory::CreatorTypes,
        TypeCategory::Fields,
    ] {
        let (id, name) = match category {
            TypeCategory::ItemTypes => (2, "book"),
            TypeCategory::CreatorTypes => (1, "author"),
            TypeCategory::Fields => (110, "title"),
        };

        let by_id = schema.lookup(category, id).expect("lookup by ID");
        let by_name = schema.lookup(category, name).expect("lookup by name");
        assert_eq!(by_id, by_name, "{category} records must match");
        assert_eq!(by_id.id(), id);
        assert_eq!(by_id.name(), name);
    }

    assert!(schema.lookup(TypeCategory::ItemTypes, "no-such-type").is_none());
    assert_eq!(schema.id(TypeCategory::ItemTypes, "webpage"), Some(13));
    assert_eq!(schema.name(TypeCategory::Fields, 115), Some("bookTitle"));
    assert_eq!(
        schema.localized_string(TypeCategory::ItemTypes, "book"),
        Some("Book")
    );
}

/// **VALUE**: Covers the creator-type queries, including the "no creators
/// allowed" encoding.
///
/// **WHY THIS MATTERS**: Notes encode "no creators" as a single `false`
/// sentinel on the wire; save dialogs must see an empty list, not a crash
/// or a phantom creator.
///
/// **BUG THIS CATCHES**: Leaking the sentinel into the typed record, or
/// `None`/empty confusion between unknown types and creator-less types.
#[test]
fn given_item_types_when_creator_queries_then_sentinel_and_order_honored() {
    let schema = schema();

    let book_creators = schema
        .creator_types_for_item_type("book")
        .expect("book is a known type");
    assert_eq!(
        book_creators
            .iter()
            .map(|summary| (summary.id, summary.name.as_str()))
            .collect::<Vec<_>>(),
        vec![(1, "author"), (2, "editor")]
    );

    // The [false] sentinel collapses to an empty list
    assert_eq!(
        schema.creator_types_for_item_type(3),
        Some(Vec::new())
    );

    // Unknown type is None, not empty
    assert!(schema.creator_types_for_item_type("no-such-type").is_none());

    assert_eq!(schema.primary_creator_type("book"), Some(1));
    assert_eq!(schema.primary_creator_type("note"), None);
}

/// **VALUE**: Verifies validity queries answer `false` for resolvable but
/// unrelated pairs and for unknown keys.
///
/// **WHY THIS MATTERS**: Translators probe freely ("is composer valid for
/// webpage?"); a throwing query would turn every probe into error
/// handling.
///
/// **BUG THIS CATCHES**: Panic or error on unknown keys, or `true` for
/// unrelated pairs.
#[test]
fn given_unrelated_or_unknown_pairs_when_validity_checked_then_false_not_error() {
    let schema = schema();

    assert!(schema.creator_is_valid_for_item_type("author", "book"));
    // Both resolvable, not related
    assert!(!schema.creator_is_valid_for_item_type("composer", "book"));
    // Unknown keys
    assert!(!schema.creator_is_valid_for_item_type("author", "no-such-type"));
    assert!(!schema.creator_is_valid_for_item_type(999, "book"));

    assert!(schema.field_is_valid_for_type("bookTitle", "book"));
    assert!(!schema.field_is_valid_for_type("runtime", "book"));
    assert!(!schema.field_is_valid_for_type("no-such-field", "book"));
}

/// **VALUE**: Pins base-field resolution semantics in both directions,
/// including the explicit-error contract.
///
/// **WHY THIS MATTERS**: Base-field mapping backs item conversion between
/// types; `base_id_from_type_and_field` must distinguish "no mapping"
/// (a valid answer) from "you asked about something that does not exist"
/// (a caller bug worth failing on).
///
/// **BUG THIS CATCHES**: Collapsing the unknown-key case into a silent
/// `None`, which hides typos in translator metadata.
#[test]
fn given_base_field_queries_when_resolved_then_mapping_and_errors_explicit() {
    let schema = schema();

    // bookTitle maps onto title for books
    assert_eq!(
        schema
            .base_id_from_type_and_field("book", "bookTitle")
            .expect("known keys"),
        Some(110)
    );
    // title has no base mapping for books: a valid None
    assert_eq!(
        schema
            .base_id_from_type_and_field("book", "title")
            .expect("known keys"),
        None
    );

    // Unknown type or field fails loudly
    assert!(matches!(
        schema.base_id_from_type_and_field("no-such-type", "title"),
        Err(SchemaError::UnknownType {
            category: TypeCategory::ItemTypes,
            ..
        })
    ));
    assert!(matches!(
        schema.base_id_from_type_and_field("book", "no-such-field"),
        Err(SchemaError::UnknownType {
            category: TypeCategory::Fields,
            ..
        })
    ));

    // Reverse direction: which book field realizes the base field "title"?
    assert_eq!(schema.field_id_from_type_and_base("book", "title"), Some(115));
    assert_eq!(schema.field_id_from_type_and_base("note", "title"), None);

    assert_eq!(schema.is_base_field("title"), Some(true));
    assert_eq!(schema.is_base_field("bookTitle"), Some(false));
    assert_eq!(schema.item_type_fields("book"), Some(vec![110, 115]));
}

/// **VALUE**: Verifies malformed payloads and key collisions are rejected
/// at init.
///
/// **WHY THIS MATTERS**: The cache is immutable after construction; a
/// payload problem caught at init is one log line, the same problem
/// surfacing later is a wrong lookup in a save path.
///
/// **BUG THIS CATCHES**: Accepting a name that collides with another key
/// in the same category, which would make dual-keyed lookups ambiguous.
#[test]
fn given_bad_payloads_when_init_then_invalid_payload_errors() {
    // Missing category
    let error = TypeSchema::init(&json!({"itemTypes": {}})).unwrap_err();
    assert!(matches!(error, SchemaError::InvalidPayload { .. }));

    // Non-numeric ID
    let mut payload = sample_payload();
    payload["fields"]
        .as_object_mut()
        .expect("fields object")
        .insert("abc".to_string(), json!(["x", "X"]));
    assert!(matches!(
        TypeSchema::init(&payload).unwrap_err(),
        SchemaError::InvalidPayload { .. }
    ));

    // Two creator types sharing a name collide in the dual index
    let mut payload = sample_payload();
    payload["creatorTypes"]
        .as_object_mut()
        .expect("creatorTypes object")
        .insert("9".to_string(), json!(["author", "Author Again"]));
    assert!(matches!(
        TypeSchema::init(&payload).unwrap_err(),
        SchemaError::InvalidPayload { .. }
    ));
}
