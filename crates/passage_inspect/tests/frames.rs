//! Integration tests for signature registration and frame building.

use passage_inspect::{HookSignature, InspectError, Inspector, RESERVED_NAMES, Value, ValuePool};

// ─────────────────────────────────────────────────────────────────────
// 1. Frame building
// ─────────────────────────────────────────────────────────────────────

fn xy_inspector() -> Inspector {
    let mut inspector = Inspector::new();
    inspector.register(
        HookSignature::new("message").param("x").param_with_default("y", 5_i64),
        false,
    );
    inspector
}

#[test]
fn frame_fills_default() {
    let inspector = xy_inspector();
    let pool = ValuePool::new().with("x", 10_i64);

    let frame = inspector.build_frame("message", &pool).unwrap();
    assert_eq!(frame.len(), 2);
    assert_eq!(*frame.get::<i64>("x").unwrap(), 10);
    assert_eq!(*frame.get::<i64>("y").unwrap(), 5);
}

#[test]
fn pool_value_wins_over_default() {
    let inspector = xy_inspector();
    let pool = ValuePool::new().with("x", 1_i64).with("y", 7_i64);

    let frame = inspector.build_frame("message", &pool).unwrap();
    assert_eq!(*frame.get::<i64>("y").unwrap(), 7);
}

#[test]
fn empty_pool_reports_missing_x() {
    let inspector = xy_inspector();
    let err = inspector
        .build_frame("message", &ValuePool::new())
        .unwrap_err();

    assert_eq!(err, InspectError::missing_argument("message", "x"));
    assert_eq!(err.missing_param(), Some("x"));
    assert!(err.to_string().contains("'x'"), "got: {err}");
}

#[test]
fn frame_rejects_wrong_type_and_undeclared_names() {
    let inspector = xy_inspector();
    let pool = ValuePool::new().with("x", "not a number");
    let frame = inspector.build_frame("message", &pool).unwrap();

    match frame.get::<i64>("x") {
        Err(InspectError::TypeMismatch { param, actual, .. }) => {
            assert_eq!(param, "x");
            assert_eq!(actual, "&str");
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
    assert!(matches!(
        frame.get::<i64>("z"),
        Err(InspectError::NotInFrame { .. })
    ));
}

#[test]
fn frame_shares_pool_values() {
    let inspector = xy_inspector();
    let x = Value::new(vec![1.0_f32; 16]);
    let mut pool = ValuePool::new();
    pool.insert_value("x", x.clone());

    let frame = inspector.build_frame("message", &pool).unwrap();
    assert!(frame.value("x").unwrap().ptr_eq(&x));
}

// ─────────────────────────────────────────────────────────────────────
// 2. Reserved names
// ─────────────────────────────────────────────────────────────────────

#[test]
fn reserved_names_are_never_required_but_still_framed() {
    let mut inspector = Inspector::new();
    inspector.register(
        HookSignature::new("message")
            .param("x_j")
            .param("edge_index_i")
            .param("size_i"),
        false,
    );

    let required = inspector.required_names(None);
    assert_eq!(required.into_iter().collect::<Vec<_>>(), vec!["x_j".to_string()]);

    let pool = ValuePool::new()
        .with("x_j", 1_u8)
        .with("edge_index_i", 2_u8)
        .with("size_i", 3_usize);
    let frame = inspector.build_frame("message", &pool).unwrap();
    assert!(frame.contains("edge_index_i"));
    assert_eq!(*frame.get::<usize>("size_i").unwrap(), 3);
}

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn param_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,6}(_i|_j)?",
            proptest::sample::select(RESERVED_NAMES.to_vec()).prop_map(str::to_string),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// `required_names` never yields a reserved name, and yields every
        /// non-reserved declared name.
        #[test]
        fn required_names_partition(names in proptest::collection::vec(param_name(), 0..12)) {
            let mut inspector = Inspector::new();
            let signature = names
                .iter()
                .fold(HookSignature::new("message"), |sig, name| sig.param(name.clone()));
            inspector.register(signature, false);

            let required = inspector.required_names(None);
            for name in &names {
                let reserved = RESERVED_NAMES.contains(&name.as_str());
                prop_assert_eq!(required.contains(name), !reserved);
            }
        }

        /// A frame built from a pool holding every declared name contains
        /// exactly the declared names, no extras.
        #[test]
        fn frame_has_exactly_declared_params(
            names in proptest::collection::btree_set("[a-z]{1,6}", 0..8),
            extras in proptest::collection::btree_set("[A-Z]{1,6}", 0..4),
        ) {
            let mut inspector = Inspector::new();
            let signature = names
                .iter()
                .fold(HookSignature::new("message"), |sig, name| sig.param(name.clone()));
            inspector.register(signature, false);

            let pool: ValuePool = names
                .iter()
                .chain(extras.iter())
                .map(|name| (name.clone(), Value::new(0_u8)))
                .collect();

            let frame = inspector.build_frame("message", &pool).unwrap();
            prop_assert_eq!(frame.len(), names.len());
            for name in &extras {
                prop_assert!(!frame.contains(name));
            }
        }
    }
}
