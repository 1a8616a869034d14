use async_trait::async_trait;
use data_smith::{
    Collaborator, ColumnPatch, ConfigIntent, ConfigOrchestrator, DatasetSchema, EnhancerError, NoticeLevel,
    Result, UploadedDataset, WireConfig,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// In-memory stand-in for the enhancement service.
#[derive(Default)]
struct FakeService {
    generated: Mutex<Option<WireConfig>>,
    instructions: Mutex<Vec<String>>,
    submitted: Mutex<Vec<WireConfig>>,
    process_calls: AtomicUsize,
    fail_process: AtomicBool,
    release: Notify,
}

impl FakeService {
    fn generating(payload: serde_json::Value) -> Self {
        let service = Self::default();
        *service.generated.lock().unwrap() = Some(serde_json::from_value(payload).unwrap());
        service
    }
}

#[async_trait]
impl Collaborator for FakeService {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedDataset> {
        let (columns, _) = data_smith::adapters::probe_csv(&bytes)?;
        Ok(UploadedDataset {
            dataset_id: filename.to_string(),
            columns,
        })
    }

    async fn generate_config(&self, instruction: &str, _columns: &[String]) -> Result<WireConfig> {
        self.instructions.lock().unwrap().push(instruction.to_string());
        self.generated
            .lock()
            .unwrap()
            .clone()
            .ok_or(EnhancerError::GenerationFailed {
                detail: Some("Error generating configuration: model offline".to_string()),
            })
    }

    async fn process(&self, dataset_id: &str, config: &WireConfig) -> Result<String> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(config.clone());
        self.release.notified().await;

        if self.fail_process.load(Ordering::SeqCst) {
            return Err(EnhancerError::ProcessingFailed { detail: None });
        }
        Ok(format!("enhanced_{}", dataset_id))
    }

    async fn download(&self, result_file: &str) -> Result<Vec<u8>> {
        Err(EnhancerError::NotFound {
            resource: result_file.to_string(),
        })
    }
}

fn products() -> DatasetSchema {
    DatasetSchema::new(
        "products.csv",
        ["Title", "Description", "Price", "Category"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
    .with_row_count(40)
}

fn orchestrator() -> ConfigOrchestrator {
    let mut orchestrator = ConfigOrchestrator::new(Duration::from_millis(300));
    orchestrator.accept_dataset(products());
    orchestrator
}

#[tokio::test]
async fn test_generation_merges_and_appends_description() -> anyhow::Result<()> {
    let service = FakeService::generating(json!({
        "column_context": {"Edibility": ["Title", "Description", "Ghost"]},
        "batch_sizes": {"Edibility": 25},
        "ignore_valued_columns": {"Edibility": false},
        "transformation_instructions": {"Edibility": "Edible or Inedible"},
        "generate_rows": 4,
        "dataset_description": "Grocery catalogue"
    }));
    let mut orchestrator = orchestrator();

    let notice = orchestrator
        .generate_from_instruction(&service, "  Classify edibility ", Some("grocery products"))
        .await?;

    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(
        service.instructions.lock().unwrap().as_slice(),
        ["Classify edibility The dataset represents: grocery products"]
    );

    let config = orchestrator.config();
    let entry = config.entry("Edibility").unwrap();
    assert_eq!(entry.context_columns, vec!["Title", "Description"]);
    assert_eq!(entry.batch_size.get(), 25);
    assert_eq!(config.rows_to_generate(), 4);
    assert_eq!(config.dataset_description(), "Grocery catalogue");
    assert_eq!(config.new_columns(orchestrator.dataset().unwrap()), vec!["Edibility"]);
    Ok(())
}

#[tokio::test]
async fn test_generation_failure_leaves_config_untouched() -> anyhow::Result<()> {
    let service = FakeService::default();
    let mut orchestrator = orchestrator();
    orchestrator.add_existing_column("Category")?;
    orchestrator.set_row_generation(3, "Grocery catalogue")?;
    let before = orchestrator.snapshot();
    let before_json = before.to_json_pretty()?;

    let err = orchestrator
        .generate_from_instruction(&service, "Classify edibility", None)
        .await
        .unwrap_err();

    assert_eq!(err.user_friendly_message(), "Error generating configuration: model offline");
    assert_eq!(orchestrator.config(), &before);
    assert_eq!(orchestrator.config().to_json_pretty()?, before_json);
    Ok(())
}

#[tokio::test]
async fn test_blank_instruction_never_reaches_service() {
    let service = FakeService::default();
    let mut orchestrator = orchestrator();

    let err = orchestrator
        .generate_from_instruction(&service, "   ", None)
        .await
        .unwrap_err();

    assert!(matches!(err, EnhancerError::EmptyInstruction));
    assert!(service.instructions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generation_resets_pending_editor_draft() -> anyhow::Result<()> {
    let service = FakeService::generating(json!({
        "column_context": {"Category": ["Title"]},
        "batch_sizes": {"Category": 5},
        "ignore_valued_columns": {"Category": true},
        "transformation_instructions": {"Category": "From the generator"},
        "generate_rows": null,
        "dataset_description": null
    }));
    let t0 = Instant::now();
    let mut orchestrator = orchestrator();
    orchestrator.add_existing_column("Category")?;
    orchestrator
        .open_editor("Category")?
        .set_transformation_instruction("typed locally", t0);

    orchestrator
        .generate_from_instruction(&service, "Classify edibility", None)
        .await?;

    let editor = orchestrator.editor("Category").unwrap();
    assert!(!editor.is_pending());
    assert_eq!(editor.draft().transformation_instruction, "From the generator");
    assert!(orchestrator.poll_editors(t0 + Duration::from_secs(1)).is_empty());
    assert_eq!(
        orchestrator.config().entry("Category").unwrap().transformation_instruction,
        "From the generator"
    );
    Ok(())
}

#[tokio::test]
async fn test_second_submission_refused_while_first_in_flight() -> anyhow::Result<()> {
    let service = FakeService::default();
    let mut orchestrator = orchestrator();
    orchestrator.add_existing_column("Category")?;
    let orchestrator = orchestrator;

    let first = orchestrator.submit(&service);
    let second = async {
        // 讓第一個請求先拿到鎖
        while service.process_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(orchestrator.is_processing());
        let refused = orchestrator.submit(&service).await;
        service.release.notify_one();
        refused
    };

    let (first, second) = tokio::join!(first, second);

    let receipt = first?;
    assert_eq!(receipt.result_file, "enhanced_products.csv");
    assert_eq!(receipt.plan.columns_to_process, vec!["Category"]);
    assert!(matches!(second, Err(EnhancerError::SubmissionInFlight)));
    assert_eq!(service.process_calls.load(Ordering::SeqCst), 1);

    // 完成後可以再次提交
    assert!(!orchestrator.is_processing());
    service.release.notify_one();
    orchestrator.submit(&service).await?;
    assert_eq!(service.process_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_lock_released_after_failed_submission() -> anyhow::Result<()> {
    let service = FakeService::default();
    service.fail_process.store(true, Ordering::SeqCst);
    let mut orchestrator = orchestrator();
    orchestrator.set_row_generation(10, "")?;

    service.release.notify_one();
    let err = orchestrator.submit(&service).await.unwrap_err();
    assert!(matches!(err, EnhancerError::ProcessingFailed { .. }));
    assert!(!orchestrator.is_processing());

    service.fail_process.store(false, Ordering::SeqCst);
    service.release.notify_one();
    let receipt = orchestrator.submit(&service).await?;
    assert_eq!(receipt.plan.summary(), "Generating 10 rows");
    Ok(())
}

#[tokio::test]
async fn test_submission_policy_and_payload() -> anyhow::Result<()> {
    let service = FakeService::default();
    let mut orchestrator = orchestrator();

    assert!(matches!(
        orchestrator.submit(&service).await,
        Err(EnhancerError::NothingToProcess)
    ));
    assert_eq!(service.process_calls.load(Ordering::SeqCst), 0);

    let outcome = orchestrator.apply_batch(vec![
        ConfigIntent::AddColumn { name: "Price".into() },
        ConfigIntent::AddColumn { name: "Popularity".into() },
        ConfigIntent::RemoveColumn { name: "Price".into() },
    ]);
    assert_eq!(outcome.applied, 3);

    service.release.notify_one();
    let receipt = orchestrator.submit(&service).await?;
    assert_eq!(receipt.plan.new_columns, vec!["Popularity"]);
    // 40 列，批次 10：40 / 10 + 1
    assert_eq!(receipt.plan.estimated_batches, Some(5));

    let submitted = service.submitted.lock().unwrap();
    let wire = &submitted[0];
    assert_eq!(wire.batch_sizes.keys().collect::<Vec<_>>(), vec!["Popularity"]);
    assert_eq!(wire.column_context["Popularity"], json!(["Title", "Description", "Price"]));
    assert_eq!(wire.generate_rows, json!(0));
    Ok(())
}

#[tokio::test]
async fn test_debounced_edits_flow_into_submission() -> anyhow::Result<()> {
    let service = FakeService::default();
    let mut orchestrator = ConfigOrchestrator::new(Duration::from_millis(30));
    orchestrator.accept_dataset(products());
    orchestrator.add_existing_column("Category")?;

    let editor = orchestrator.open_editor("Category")?;
    let now = Instant::now();
    editor.clear_context(now);
    editor.toggle_context("Price", now);
    editor.set_batch_size(999, now);

    let committed = orchestrator.settle_editors().await;
    assert_eq!(committed, vec!["Category"]);

    service.release.notify_one();
    orchestrator.submit(&service).await?;
    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted[0].batch_sizes["Category"], json!(50));
    assert_eq!(submitted[0].column_context["Category"], json!(["Price"]));
    Ok(())
}

#[tokio::test]
async fn test_update_with_unknown_context_still_submits() -> anyhow::Result<()> {
    let service = FakeService::default();
    let mut orchestrator = orchestrator();
    orchestrator.add_existing_column("Title")?;

    orchestrator.apply(&ConfigIntent::UpdateColumn {
        name: "Title".into(),
        patch: ColumnPatch {
            context_columns: vec!["Ghost".into(), "Price".into()],
            batch_size: 10,
            ignore_rows_with_existing_value: false,
            transformation_instruction: String::new(),
        },
    })?;

    let entry = orchestrator.config().entry("Title").unwrap();
    assert_eq!(entry.context_columns, vec!["Price"]);
    assert!(orchestrator.prepare_submission().is_ok());

    service.release.notify_one();
    orchestrator.submit(&service).await?;
    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted[0].column_context["Title"], json!(["Price"]));
    Ok(())
}
