use crate::domain::model::{DatasetSchema, TransformationConfig};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 估算用：每批大約兩秒
pub const SECONDS_PER_BATCH: u64 = 2;

/// What a submission is about to ask the processing service to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingPlan {
    pub dataset_id: String,
    pub columns_to_process: Vec<String>,
    pub new_columns: Vec<String>,
    pub rows_to_generate: u64,
    /// Only known when the dataset's row count was measured locally.
    pub estimated_batches: Option<u64>,
}

impl ProcessingPlan {
    pub fn build(config: &TransformationConfig, schema: &DatasetSchema) -> Self {
        // 新列先生成，欄位處理會涵蓋新舊所有列
        // 數字再大也只是估算，一律飽和運算
        let estimated_batches = schema.row_count.map(|rows| {
            let total_rows = (rows as u64).saturating_add(config.rows_to_generate());
            config
                .columns()
                .values()
                .map(|entry| (total_rows / entry.batch_size.get() as u64).saturating_add(1))
                .fold(0, u64::saturating_add)
        });

        Self {
            dataset_id: schema.id.clone(),
            columns_to_process: config.columns().keys().cloned().collect(),
            new_columns: config.new_columns(schema),
            rows_to_generate: config.rows_to_generate(),
            estimated_batches,
        }
    }

    pub fn estimated_duration(&self) -> Option<Duration> {
        self.estimated_batches
            .map(|batches| Duration::from_secs(batches.saturating_mul(SECONDS_PER_BATCH)))
    }

    pub fn summary(&self) -> String {
        let columns = self.columns_to_process.len();
        match (self.rows_to_generate > 0, columns > 0) {
            (true, true) => format!(
                "Generating {} rows and processing {} columns",
                self.rows_to_generate, columns
            ),
            (true, false) => format!("Generating {} rows", self.rows_to_generate),
            (false, true) => format!("Processing {} columns", columns),
            (false, false) => "Nothing to process".to_string(),
        }
    }

    pub fn estimate_text(&self) -> Option<String> {
        self.estimated_duration().map(|d| {
            let secs = d.as_secs();
            format!(
                "{} batches, about {} minutes {} seconds",
                self.estimated_batches.unwrap_or_default(),
                secs / 60,
                secs % 60
            )
        })
    }
}

/// 送出處理後拿到的回執
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub result_file: String,
    pub submitted_at: DateTime<Utc>,
    pub plan: ProcessingPlan,
}
