use bson::oid::ObjectId;
use persistence_core::cache::coerce::{narrow, to_cache_json};
use persistence_core::cache::JsonPath;
use persistence_core::database::{DeleteOutcome, FindOptions, UpdateOutcome};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

fn plain_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    /// Property: values without identifier or date wrappers are unchanged
    #[test]
    fn narrowing_leaves_plain_json_alone(value in plain_json()) {
        prop_assert_eq!(narrow(value.clone()), value);
    }

    /// Property: narrowing is idempotent
    #[test]
    fn narrowing_is_idempotent(value in plain_json(), millis in 0i64..4_102_444_800_000) {
        let wrapped = json!({
            "value": value,
            "at": { "$date": { "$numberLong": millis.to_string() } },
        });
        let once = narrow(wrapped);
        prop_assert_eq!(narrow(once.clone()), once);
    }

    /// Property: object identifiers always become their 24-digit hex form
    #[test]
    fn object_ids_become_hex(bytes in any::<[u8; 12]>()) {
        let id = ObjectId::from_bytes(bytes);
        prop_assert_eq!(to_cache_json(&id).unwrap(), Value::String(id.to_hex()));
    }

    /// Property: dates render in UTC with millisecond precision
    #[test]
    fn dates_render_with_millis(millis in 0i64..4_102_444_800_000) {
        let date = bson::DateTime::from_millis(millis);
        let rendered = to_cache_json(&date).unwrap();
        let text = rendered.as_str().unwrap();
        prop_assert!(text.ends_with('Z'));
        prop_assert_eq!(text.len(), "2024-01-12T10:30:00.250Z".len());
    }

    /// Property: an update succeeds only when it matched and modified
    #[test]
    fn update_outcome_boolean(matched in 0u64..5, modified in 0u64..5) {
        let modified = modified.min(matched);
        let outcome = UpdateOutcome { matched_count: matched, modified_count: modified, upserted_id: None };
        prop_assert_eq!(outcome.succeeded(), modified > 0);
    }

    /// Property: a delete succeeds only when acknowledged and something was removed
    #[test]
    fn delete_outcome_boolean(acknowledged in any::<bool>(), deleted in 0u64..5) {
        let outcome = DeleteOutcome { acknowledged, deleted_count: deleted };
        prop_assert_eq!(outcome.succeeded(), acknowledged && deleted > 0);
    }

    /// Property: caller time limits always win over the connection default
    #[test]
    fn caller_time_limit_wins(caller_ms in 1u64..120_000, default_ms in 1u64..120_000) {
        let resolved = FindOptions::new()
            .max_time(Duration::from_millis(caller_ms))
            .resolve(Duration::from_millis(default_ms));
        prop_assert_eq!(resolved.max_time, Duration::from_millis(caller_ms));
    }

    /// Property: dotted paths parse into their segments
    #[test]
    fn dotted_paths_parse(segments in prop::collection::vec("[a-z]{1,8}", 1..5)) {
        let path = JsonPath::parse(&format!("$.{}", segments.join("."))).unwrap();
        prop_assert!(!path.is_root());
        prop_assert_eq!(path.segments(), segments.as_slice());
    }
}
