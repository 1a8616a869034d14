use crate::domain::model::{ColumnConfigEntry, ColumnPatch, TransformationConfig};
use crate::domain::wire::WireConfig;
use crate::utils::error::{EnhancerError, Result};

/// 對聚合的一次修改意圖
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIntent {
    AddColumn { name: String },
    RemoveColumn { name: String },
    UpdateColumn { name: String, patch: ColumnPatch },
    SetRowGeneration { rows: i64, description: String },
    MergeGenerated { generated: WireConfig },
}

impl ConfigIntent {
    /// 受影響的欄位（整體覆寫時為 None）
    pub fn column(&self) -> Option<&str> {
        match self {
            ConfigIntent::AddColumn { name }
            | ConfigIntent::RemoveColumn { name }
            | ConfigIntent::UpdateColumn { name, .. } => Some(name),
            ConfigIntent::SetRowGeneration { .. } | ConfigIntent::MergeGenerated { .. } => None,
        }
    }
}

/// Pure operations on [`TransformationConfig`].
///
/// Every operation borrows the current aggregate and returns a brand new one;
/// on error the caller still holds the untouched original.
pub struct ConfigMutator;

impl ConfigMutator {
    pub fn add_column(
        config: &TransformationConfig,
        name: &str,
        dataset_columns: &[String],
    ) -> Result<TransformationConfig> {
        if name.trim().is_empty() {
            return Err(EnhancerError::InvalidColumnName {
                name: name.to_string(),
                reason: "column name cannot be blank".to_string(),
            });
        }
        if config.is_configured(name) {
            return Err(EnhancerError::AlreadyConfigured {
                column: name.to_string(),
            });
        }

        let mut next = config.clone();
        next.columns_mut().insert(
            name.to_string(),
            ColumnConfigEntry::default_for(name, dataset_columns),
        );
        tracing::debug!("➕ Added column '{}'", name);
        Ok(next)
    }

    /// 移除不存在的欄位不是錯誤
    pub fn remove_column(config: &TransformationConfig, name: &str) -> TransformationConfig {
        let mut next = config.clone();
        if next.columns_mut().shift_remove(name).is_some() {
            tracing::debug!("➖ Removed column '{}'", name);
        }
        next
    }

    /// 整筆覆寫欄位設定；不在資料集中的上下文欄位會被移除
    pub fn update_column(
        config: &TransformationConfig,
        name: &str,
        patch: &ColumnPatch,
        dataset_columns: &[String],
    ) -> Result<TransformationConfig> {
        if !config.is_configured(name) {
            return Err(EnhancerError::UnknownColumn {
                column: name.to_string(),
            });
        }

        let mut entry = ColumnConfigEntry::from_patch(name, patch);
        retain_dataset_context(name, &mut entry, dataset_columns);

        let mut next = config.clone();
        next.columns_mut().insert(name.to_string(), entry);
        Ok(next)
    }

    pub fn set_row_generation(
        config: &TransformationConfig,
        rows: i64,
        description: &str,
    ) -> Result<TransformationConfig> {
        if rows < 0 {
            return Err(EnhancerError::InvalidRowCount { rows });
        }

        let mut next = config.clone();
        next.set_rows(rows as u64, description.to_string());
        Ok(next)
    }

    /// 以生成器產出的設定整體覆寫欄位設定
    ///
    /// `generate_rows` / `dataset_description` are only overwritten when the
    /// payload carries them. Context columns that are not in the dataset are
    /// dropped.
    pub fn merge_generated(
        config: &TransformationConfig,
        generated: &WireConfig,
        dataset_columns: &[String],
    ) -> Result<TransformationConfig> {
        let candidate = TransformationConfig::from_wire(generated)?;

        let mut columns = candidate.columns().clone();
        for (name, entry) in columns.iter_mut() {
            retain_dataset_context(name, entry, dataset_columns);
        }

        let rows = if generated.generate_rows.is_null() {
            config.rows_to_generate()
        } else {
            candidate.rows_to_generate()
        };
        let description = if generated.dataset_description.is_null() {
            config.dataset_description().to_string()
        } else {
            candidate.dataset_description().to_string()
        };

        let merged = TransformationConfig::from_parts(columns, rows, description);
        merged.validate()?;
        tracing::debug!(
            "🔀 Merged generated config: {} columns, {} rows",
            merged.columns().len(),
            merged.rows_to_generate()
        );
        Ok(merged)
    }

    pub fn apply(
        config: &TransformationConfig,
        intent: &ConfigIntent,
        dataset_columns: &[String],
    ) -> Result<TransformationConfig> {
        match intent {
            ConfigIntent::AddColumn { name } => Self::add_column(config, name, dataset_columns),
            ConfigIntent::RemoveColumn { name } => Ok(Self::remove_column(config, name)),
            ConfigIntent::UpdateColumn { name, patch } => {
                Self::update_column(config, name, patch, dataset_columns)
            }
            ConfigIntent::SetRowGeneration { rows, description } => {
                Self::set_row_generation(config, *rows, description)
            }
            ConfigIntent::MergeGenerated { generated } => {
                Self::merge_generated(config, generated, dataset_columns)
            }
        }
    }
}

/// 上下文欄位只能是資料集中的欄位，其餘的移除並記錄
fn retain_dataset_context(column: &str, entry: &mut ColumnConfigEntry, dataset_columns: &[String]) {
    entry.context_columns.retain(|context| {
        let known = dataset_columns.contains(context);
        if !known {
            tracing::warn!(
                "⚠️ Dropping unknown context column '{}' from '{}'",
                context,
                column
            );
        }
        known
    });
}
