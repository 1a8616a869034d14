use data_smith::{
    ColumnPatch, ConfigMutator, EnhancerError, TransformationConfig, WireConfig,
};
use proptest::prelude::*;

const DATASET: [&str; 4] = ["Price", "Name", "Category", "Stock"];

fn dataset() -> Vec<String> {
    DATASET.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Remove(String),
}

fn column_name() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(DATASET.to_vec()).prop_map(String::from),
        "[A-Z][a-z]{1,6}",
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        column_name().prop_map(Op::Add),
        column_name().prop_map(Op::Remove),
    ]
}

fn assert_key_sets_agree(config: &TransformationConfig) {
    let wire = WireConfig::from(config);
    wire.check_key_sets().unwrap();

    let expected: Vec<&String> = config.columns().keys().collect();
    assert_eq!(wire.column_context.keys().collect::<Vec<_>>(), expected);
    assert_eq!(wire.batch_sizes.keys().collect::<Vec<_>>(), expected);
    assert_eq!(wire.ignore_valued_columns.keys().collect::<Vec<_>>(), expected);
    assert_eq!(
        wire.transformation_instructions.keys().collect::<Vec<_>>(),
        expected
    );
}

proptest! {
    #[test]
    fn key_sets_stay_identical_across_add_and_remove(ops in prop::collection::vec(op(), 0..40)) {
        let dataset = dataset();
        let mut config = TransformationConfig::empty();

        for op in ops {
            config = match op {
                Op::Add(name) => match ConfigMutator::add_column(&config, &name, &dataset) {
                    Ok(next) => next,
                    Err(EnhancerError::AlreadyConfigured { .. }) => config,
                    Err(other) => panic!("unexpected error: {other}"),
                },
                Op::Remove(name) => ConfigMutator::remove_column(&config, &name),
            };
            assert_key_sets_agree(&config);
            prop_assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn remove_is_idempotent(names in prop::collection::vec(column_name(), 0..8), target in column_name()) {
        let dataset = dataset();
        let mut config = TransformationConfig::empty();
        for name in &names {
            if let Ok(next) = ConfigMutator::add_column(&config, name, &dataset) {
                config = next;
            }
        }

        let once = ConfigMutator::remove_column(&config, &target);
        let twice = ConfigMutator::remove_column(&once, &target);
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.is_configured(&target));
    }

    #[test]
    fn stored_batch_size_is_always_in_range(raw in any::<i64>()) {
        let dataset = dataset();
        let config = ConfigMutator::add_column(&TransformationConfig::empty(), "Price", &dataset).unwrap();
        let patch = ColumnPatch {
            context_columns: vec!["Name".to_string()],
            batch_size: raw,
            ignore_rows_with_existing_value: false,
            transformation_instruction: String::new(),
        };

        let updated = ConfigMutator::update_column(&config, "Price", &patch, &dataset).unwrap();
        let stored = updated.entry("Price").unwrap().batch_size.get();
        prop_assert!((1..=50).contains(&stored));
        if (1..=50).contains(&raw) {
            prop_assert_eq!(stored as i64, raw);
        }
    }

    #[test]
    fn wire_round_trip_preserves_config(
        names in prop::collection::vec(column_name(), 0..6),
        batch in 1i64..=50,
        rows in 0i64..1000,
        description in "[a-zA-Z ]{0,20}",
    ) {
        let dataset = dataset();
        let mut config = TransformationConfig::empty();
        for name in &names {
            if let Ok(next) = ConfigMutator::add_column(&config, name, &dataset) {
                config = next;
            }
        }
        if let Some(first) = config.columns().keys().next().cloned() {
            let mut patch = ColumnPatch::from(config.entry(&first).unwrap());
            patch.batch_size = batch;
            patch.ignore_rows_with_existing_value = true;
            patch.transformation_instruction = "Short summary".to_string();
            config = ConfigMutator::update_column(&config, &first, &patch, &dataset).unwrap();
        }
        config = ConfigMutator::set_row_generation(&config, rows, &description).unwrap();

        let json = config.to_json_pretty().unwrap();
        let parsed = TransformationConfig::from_json_str(&json).unwrap();
        prop_assert_eq!(parsed, config);
    }
}

#[test]
fn add_column_defaults_match_documented_example() {
    let config =
        ConfigMutator::add_column(&TransformationConfig::empty(), "Price", &dataset()).unwrap();
    let entry = config.entry("Price").unwrap();

    assert_eq!(entry.context_columns, vec!["Name", "Category", "Stock"]);
    assert_eq!(entry.batch_size.get(), 10);
    assert!(!entry.ignore_rows_with_existing_value);
    assert_eq!(entry.transformation_instruction, "");
}

#[test]
fn update_clamps_batch_size() {
    let dataset = dataset();
    let config =
        ConfigMutator::add_column(&TransformationConfig::empty(), "Price", &dataset).unwrap();

    for (raw, stored) in [(0, 1), (999, 50), (23, 23)] {
        let mut patch = ColumnPatch::from(config.entry("Price").unwrap());
        patch.batch_size = raw;
        let updated = ConfigMutator::update_column(&config, "Price", &patch, &dataset).unwrap();
        assert_eq!(updated.entry("Price").unwrap().batch_size.get(), stored);
    }
}

#[test]
fn negative_row_count_is_rejected_and_rows_unchanged() {
    let config = ConfigMutator::set_row_generation(&TransformationConfig::empty(), 7, "kept").unwrap();

    let err = ConfigMutator::set_row_generation(&config, -1, "x").unwrap_err();
    assert!(matches!(err, EnhancerError::InvalidRowCount { rows: -1 }));
    assert_eq!(config.rows_to_generate(), 7);
    assert_eq!(config.dataset_description(), "kept");
}

#[test]
fn mismatched_payload_names_column_and_map() {
    let err = TransformationConfig::from_json_str(
        r#"{
            "column_context": {"Price": [], "Name": []},
            "batch_sizes": {"Price": 10},
            "ignore_valued_columns": {"Price": false, "Name": false},
            "transformation_instructions": {"Price": "", "Name": ""},
            "generate_rows": 0,
            "dataset_description": ""
        }"#,
    )
    .unwrap_err();

    match err {
        EnhancerError::WireKeyMismatch { mismatches } => {
            assert_eq!(mismatches, vec!["'Name' missing from batch_sizes"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
