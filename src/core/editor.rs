//! Per-column editing with a debounced commit.
//!
//! A session keeps a local draft that follows every keystroke, and hands the
//! whole draft back for commit once no edit has arrived for the debounce
//! window. Time is passed in explicitly so callers (and tests) own the clock.

use crate::domain::model::{ColumnConfigEntry, ColumnPatch};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// 可取消的去抖動計時器：每次觸發都會重新起算
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// 取消尚未到期的提交；回傳是否真的有東西被取消
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Clears the deadline and returns true if it had elapsed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// Transient editing state for one configured column.
#[derive(Debug, Clone)]
pub struct ColumnEditorSession {
    column: String,
    dataset_columns: Vec<String>,
    /// 最近一次與聚合同步時的條目
    base: ColumnConfigEntry,
    draft: ColumnPatch,
    debouncer: Debouncer,
}

impl ColumnEditorSession {
    pub fn open(
        column: impl Into<String>,
        entry: &ColumnConfigEntry,
        dataset_columns: &[String],
        window: Duration,
    ) -> Self {
        Self {
            column: column.into(),
            dataset_columns: dataset_columns.to_vec(),
            base: entry.clone(),
            draft: ColumnPatch::from(entry),
            debouncer: Debouncer::new(window),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn draft(&self) -> &ColumnPatch {
        &self.draft
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn set_batch_size(&mut self, raw: i64, now: Instant) {
        self.draft.batch_size = raw;
        self.touch(now);
    }

    pub fn set_ignore_rows_with_existing_value(&mut self, ignore: bool, now: Instant) {
        self.draft.ignore_rows_with_existing_value = ignore;
        self.touch(now);
    }

    pub fn set_transformation_instruction(&mut self, instruction: impl Into<String>, now: Instant) {
        self.draft.transformation_instruction = instruction.into();
        self.touch(now);
    }

    /// 全選（排除自己）
    pub fn select_all_context(&mut self, now: Instant) {
        self.draft.context_columns = self
            .dataset_columns
            .iter()
            .filter(|c| **c != self.column)
            .cloned()
            .collect();
        self.touch(now);
    }

    pub fn clear_context(&mut self, now: Instant) {
        self.draft.context_columns = Vec::new();
        self.touch(now);
    }

    /// Flip one checkbox. The whole list is rebuilt in dataset order.
    ///
    /// Returns false (and changes nothing) for the session's own column or a
    /// column that is not in the dataset.
    pub fn toggle_context(&mut self, column: &str, now: Instant) -> bool {
        if column == self.column || !self.dataset_columns.iter().any(|c| c == column) {
            return false;
        }

        let mut selected: HashSet<&str> = self
            .draft
            .context_columns
            .iter()
            .map(String::as_str)
            .collect();
        if !selected.remove(column) {
            selected.insert(column);
        }
        let next: Vec<String> = self
            .dataset_columns
            .iter()
            .filter(|c| selected.contains(c.as_str()))
            .cloned()
            .collect();

        self.draft.context_columns = next;
        self.touch(now);
        true
    }

    pub fn is_context_selected(&self, column: &str) -> bool {
        self.draft.context_columns.iter().any(|c| c == column)
    }

    fn touch(&mut self, now: Instant) {
        self.debouncer.schedule(now);
    }

    /// 計時器到期時交出完整草稿
    pub fn poll(&mut self, now: Instant) -> Option<ColumnPatch> {
        if self.debouncer.take_due(now) {
            Some(self.draft.clone())
        } else {
            None
        }
    }

    /// Hand over the draft right away if an edit is pending.
    pub fn take_pending(&mut self) -> Option<ColumnPatch> {
        if self.debouncer.cancel() {
            Some(self.draft.clone())
        } else {
            None
        }
    }

    /// Record the entry the aggregate now holds after this session's commit.
    pub fn committed(&mut self, entry: &ColumnConfigEntry) {
        self.base = entry.clone();
        if !self.debouncer.is_pending() {
            self.draft = ColumnPatch::from(entry);
        }
    }

    /// 聚合被外部改動時，以聚合為準並丟棄本地草稿
    pub fn reconcile(&mut self, current: &ColumnConfigEntry) -> bool {
        if *current == self.base {
            return false;
        }

        if self.debouncer.cancel() {
            tracing::info!(
                "🔄 Column '{}' changed outside the editor, discarding pending edits",
                self.column
            );
        }
        self.base = current.clone();
        self.draft = ColumnPatch::from(current);
        true
    }

    /// Leave the editor without committing.
    pub fn discard(&mut self) -> bool {
        let cancelled = self.debouncer.cancel();
        self.draft = ColumnPatch::from(&self.base);
        cancelled
    }
}
