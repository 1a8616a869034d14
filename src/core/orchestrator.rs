use crate::core::editor::{ColumnEditorSession, DEFAULT_DEBOUNCE};
use crate::core::mutator::{ConfigIntent, ConfigMutator};
use crate::core::notice::Notice;
use crate::core::plan::{ProcessingPlan, SubmissionReceipt};
use crate::domain::model::{ColumnPatch, ColumnView, DatasetSchema, TransformationConfig};
use crate::domain::ports::Collaborator;
use crate::domain::wire::WireConfig;
use crate::utils::error::{EnhancerError, Result};
use crate::utils::validation::validate_new_column_name;
use chrono::Utc;
use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 一批手動修改的套用結果
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub applied: usize,
    /// Position in the batch and the reason it was skipped.
    pub rejected: Vec<(usize, EnhancerError)>,
}

/// Everything needed to call the processing service, checked and frozen.
#[derive(Debug, Clone)]
pub struct PreparedSubmission {
    pub config: TransformationConfig,
    pub wire: WireConfig,
    pub plan: ProcessingPlan,
}

/// Holds the current [`TransformationConfig`] and applies intents to it one at
/// a time.
///
/// Column editors, natural-language generation and row-generation settings all
/// go through here; each accepted change replaces the aggregate and then
/// reconciles the open editors with the new value.
pub struct ConfigOrchestrator {
    dataset: Option<DatasetSchema>,
    config: TransformationConfig,
    editors: IndexMap<String, ColumnEditorSession>,
    debounce: Duration,
    // 處理請求進行中時持有
    in_flight: Mutex<()>,
}

impl Default for ConfigOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ConfigOrchestrator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            dataset: None,
            config: TransformationConfig::empty(),
            editors: IndexMap::new(),
            debounce,
            in_flight: Mutex::new(()),
        }
    }

    /// 接受新資料集：重新開始一份空設定並關閉所有編輯器
    pub fn accept_dataset(&mut self, schema: DatasetSchema) {
        for session in self.editors.values_mut() {
            session.discard();
        }
        self.editors.clear();
        self.config = TransformationConfig::empty();

        tracing::info!(
            "📂 Accepted dataset '{}' with {} columns",
            schema.id,
            schema.columns.len()
        );
        self.dataset = Some(schema);
    }

    pub fn dataset(&self) -> Option<&DatasetSchema> {
        self.dataset.as_ref()
    }

    pub fn config(&self) -> &TransformationConfig {
        &self.config
    }

    /// An owned copy of the current aggregate.
    pub fn snapshot(&self) -> TransformationConfig {
        self.config.clone()
    }

    pub fn column_views(&self) -> Vec<ColumnView<'_>> {
        match &self.dataset {
            Some(schema) => self.config.column_views(schema),
            None => Vec::new(),
        }
    }

    /// 欄位選單：尚未設定的資料集欄位
    pub fn unconfigured_columns(&self) -> Vec<String> {
        self.dataset
            .as_ref()
            .map(|schema| {
                schema
                    .columns
                    .iter()
                    .filter(|c| !self.config.is_configured(c))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn schema(&self) -> Result<&DatasetSchema> {
        self.dataset.as_ref().ok_or(EnhancerError::NoDataset)
    }

    /// 以新值取代聚合，並讓編輯器跟上
    fn replace(&mut self, next: TransformationConfig) {
        self.config = next;

        let config = &self.config;
        self.editors.retain(|name, session| match config.entry(name) {
            Some(entry) => {
                session.reconcile(entry);
                true
            }
            None => {
                session.discard();
                tracing::debug!("Closing editor for removed column '{}'", name);
                false
            }
        });
    }

    pub fn apply(&mut self, intent: &ConfigIntent) -> Result<()> {
        let next = ConfigMutator::apply(&self.config, intent, &self.schema()?.columns)?;
        self.replace(next);
        Ok(())
    }

    /// 依收到的順序逐一套用；單一失敗不影響其他修改
    pub fn apply_batch(&mut self, intents: impl IntoIterator<Item = ConfigIntent>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, intent) in intents.into_iter().enumerate() {
            match self.apply(&intent) {
                Ok(()) => outcome.applied += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping edit #{} ({:?}): {}", index, intent.column(), e);
                    outcome.rejected.push((index, e));
                }
            }
        }
        outcome
    }

    pub fn add_existing_column(&mut self, name: &str) -> Result<Notice> {
        let schema = self.schema()?;
        if !schema.contains(name) {
            return Err(EnhancerError::InvalidColumnName {
                name: name.to_string(),
                reason: "not a column of the uploaded dataset; create it as a new column instead"
                    .to_string(),
            });
        }

        self.apply(&ConfigIntent::AddColumn {
            name: name.to_string(),
        })?;
        Ok(Notice::success(format!("Column '{}' added", name)))
    }

    pub fn add_new_column(&mut self, name: &str) -> Result<Notice> {
        let name = validate_new_column_name(name, &self.schema()?.columns)?;

        self.apply(&ConfigIntent::AddColumn {
            name: name.to_string(),
        })?;
        Ok(Notice::success(format!("New column '{}' added", name)))
    }

    pub fn remove_column(&mut self, name: &str) -> Notice {
        let existed = self.config.is_configured(name);
        let next = ConfigMutator::remove_column(&self.config, name);
        self.replace(next);

        if existed {
            Notice::success(format!("Column '{}' removed", name))
        } else {
            Notice::info(format!("Column '{}' was not configured", name))
        }
    }

    pub fn set_row_generation(&mut self, rows: i64, description: &str) -> Result<Notice> {
        self.apply(&ConfigIntent::SetRowGeneration {
            rows,
            description: description.to_string(),
        })?;
        Ok(Notice::info(format!(
            "Configuration updated to generate {} new rows. The rows will be generated when the file is processed.",
            rows
        )))
    }

    // ---- 欄位編輯器 ----

    pub fn open_editor(&mut self, column: &str) -> Result<&mut ColumnEditorSession> {
        let entry = self
            .config
            .entry(column)
            .ok_or_else(|| EnhancerError::UnknownColumn {
                column: column.to_string(),
            })?;
        let dataset_columns = &self
            .dataset
            .as_ref()
            .ok_or(EnhancerError::NoDataset)?
            .columns;
        let debounce = self.debounce;

        let session = self
            .editors
            .entry(column.to_string())
            .or_insert_with(|| ColumnEditorSession::open(column, entry, dataset_columns, debounce));
        Ok(session)
    }

    pub fn editor(&self, column: &str) -> Option<&ColumnEditorSession> {
        self.editors.get(column)
    }

    /// 離開編輯器：取消尚未提交的修改
    pub fn close_editor(&mut self, column: &str) -> bool {
        match self.editors.shift_remove(column) {
            Some(mut session) => {
                if session.discard() {
                    tracing::debug!("Discarded pending edits for '{}'", column);
                }
                true
            }
            None => false,
        }
    }

    pub fn next_editor_deadline(&self) -> Option<Instant> {
        self.editors.values().filter_map(|s| s.deadline()).min()
    }

    /// Commit every editor whose debounce window has elapsed by `now`.
    pub fn poll_editors(&mut self, now: Instant) -> Vec<String> {
        let due: Vec<(String, ColumnPatch)> = self
            .editors
            .iter_mut()
            .filter_map(|(name, session)| session.poll(now).map(|patch| (name.clone(), patch)))
            .collect();
        self.commit_drafts(due)
    }

    /// Commit every pending draft immediately, ignoring the debounce window.
    pub fn flush_editors(&mut self) -> Vec<String> {
        let pending: Vec<(String, ColumnPatch)> = self
            .editors
            .iter_mut()
            .filter_map(|(name, session)| session.take_pending().map(|patch| (name.clone(), patch)))
            .collect();
        self.commit_drafts(pending)
    }

    /// 等到所有編輯器都靜止並提交
    pub async fn settle_editors(&mut self) -> Vec<String> {
        let mut committed = Vec::new();
        while let Some(deadline) = self.next_editor_deadline() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            committed.extend(self.poll_editors(Instant::now()));
        }
        committed
    }

    fn commit_drafts(&mut self, drafts: Vec<(String, ColumnPatch)>) -> Vec<String> {
        let mut committed = Vec::with_capacity(drafts.len());
        let dataset_columns = self
            .dataset
            .as_ref()
            .map(|schema| schema.columns.as_slice())
            .unwrap_or_default();
        for (column, patch) in drafts {
            match ConfigMutator::update_column(&self.config, &column, &patch, dataset_columns) {
                Ok(next) => {
                    self.config = next;
                    if let (Some(entry), Some(session)) =
                        (self.config.entry(&column), self.editors.get_mut(&column))
                    {
                        session.committed(entry);
                    }
                    tracing::debug!("💾 Committed editor draft for '{}'", column);
                    committed.push(column);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Could not commit draft for '{}': {}", column, e);
                }
            }
        }
        committed
    }

    // ---- 自然語言生成 ----

    pub async fn generate_from_instruction<C>(
        &mut self,
        collaborator: &C,
        instruction: &str,
        dataset_description: Option<&str>,
    ) -> Result<Notice>
    where
        C: Collaborator + ?Sized,
    {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(EnhancerError::EmptyInstruction);
        }
        let columns = self.schema()?.columns.clone();

        let full_instruction = match dataset_description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(description) => format!("{} The dataset represents: {}", instruction, description),
            None => instruction.to_string(),
        };

        tracing::info!("🧠 Requesting configuration for: {}", full_instruction);
        let generated = match collaborator.generate_config(&full_instruction, &columns).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!("❌ Configuration generation failed: {}", e);
                return Err(e);
            }
        };

        let next = ConfigMutator::merge_generated(&self.config, &generated, &columns)?;
        self.replace(next);

        tracing::info!(
            "✅ Generated configuration: {} columns, {} rows",
            self.config.columns().len(),
            self.config.rows_to_generate()
        );
        Ok(Notice::success("Configuration generated successfully"))
    }

    // ---- 提交 ----

    /// 提交前檢查：不變量 + 「至少要有事可做」政策
    pub fn prepare_submission(&self) -> Result<PreparedSubmission> {
        let schema = self.schema()?;
        self.config.validate_against(schema)?;
        if !self.config.has_work() {
            return Err(EnhancerError::NothingToProcess);
        }

        Ok(PreparedSubmission {
            config: self.config.clone(),
            wire: self.config.to_wire()?,
            plan: ProcessingPlan::build(&self.config, schema),
        })
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Send the current aggregate for processing.
    ///
    /// Refused with [`EnhancerError::SubmissionInFlight`] while another call
    /// is outstanding; the lock is released when this call finishes, whether
    /// it succeeded or not.
    pub async fn submit<C>(&self, collaborator: &C) -> Result<SubmissionReceipt>
    where
        C: Collaborator + ?Sized,
    {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| EnhancerError::SubmissionInFlight)?;

        let prepared = self.prepare_submission()?;
        tracing::info!("🚀 {}", prepared.plan.summary());
        if let Some(estimate) = prepared.plan.estimate_text() {
            tracing::info!("⏱️ Estimated: {}", estimate);
        }

        let result_file = collaborator
            .process(&prepared.plan.dataset_id, &prepared.wire)
            .await?;

        tracing::info!("📦 Result file: {}", result_file);
        Ok(SubmissionReceipt {
            result_file,
            submitted_at: Utc::now(),
            plan: prepared.plan,
        })
    }
}
