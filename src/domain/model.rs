use crate::utils::error::{EnhancerError, Result};
use indexmap::IndexMap;
use std::collections::HashSet;

/// 每批送去生成服務的列數，只能透過夾取建構，因此永遠落在 [1, 50]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchSize(u8);

impl BatchSize {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 50;
    pub const DEFAULT: u8 = 10;

    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u32 {
        self.0 as u32
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// One configured column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnConfigEntry {
    pub context_columns: Vec<String>,
    pub batch_size: BatchSize,
    pub ignore_rows_with_existing_value: bool,
    pub transformation_instruction: String,
}

impl ColumnConfigEntry {
    /// 新增欄位時的預設值：前三個資料集欄位（排除自己）作為上下文
    pub fn default_for(column: &str, dataset_columns: &[String]) -> Self {
        let take = dataset_columns.len().min(3);
        let context_columns = dataset_columns
            .iter()
            .filter(|c| c.as_str() != column)
            .take(take)
            .cloned()
            .collect();

        Self {
            context_columns,
            batch_size: BatchSize::default(),
            ignore_rows_with_existing_value: false,
            transformation_instruction: String::new(),
        }
    }

    /// 由草稿建立完整條目：夾取 batch size、去除重複與自我參照的上下文欄位
    pub fn from_patch(column: &str, patch: &ColumnPatch) -> Self {
        Self {
            context_columns: normalize_context(column, &patch.context_columns),
            batch_size: BatchSize::clamped(patch.batch_size),
            ignore_rows_with_existing_value: patch.ignore_rows_with_existing_value,
            transformation_instruction: patch.transformation_instruction.clone(),
        }
    }
}

/// Editable draft of a [`ColumnConfigEntry`]; the batch size stays raw until commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPatch {
    pub context_columns: Vec<String>,
    pub batch_size: i64,
    pub ignore_rows_with_existing_value: bool,
    pub transformation_instruction: String,
}

impl From<&ColumnConfigEntry> for ColumnPatch {
    fn from(entry: &ColumnConfigEntry) -> Self {
        Self {
            context_columns: entry.context_columns.clone(),
            batch_size: entry.batch_size.get() as i64,
            ignore_rows_with_existing_value: entry.ignore_rows_with_existing_value,
            transformation_instruction: entry.transformation_instruction.clone(),
        }
    }
}

pub(crate) fn normalize_context(column: &str, context: &[String]) -> Vec<String> {
    let mut seen: HashSet<&String> = HashSet::new();
    context
        .iter()
        .filter(|c| c.as_str() != column && !c.trim().is_empty())
        .filter(|c| seen.insert(*c))
        .cloned()
        .collect()
}

/// 已接受的資料集：識別碼、欄位順序，以及本地計算的資料列數
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    pub id: String,
    pub columns: Vec<String>,
    pub row_count: Option<usize>,
}

impl DatasetSchema {
    pub fn new(id: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            id: id.into(),
            columns,
            row_count: None,
        }
    }

    pub fn with_row_count(mut self, rows: usize) -> Self {
        self.row_count = Some(rows);
        self
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// A configured column as it should be surfaced to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnView<'a> {
    pub name: &'a str,
    pub entry: &'a ColumnConfigEntry,
    /// 不在資料集中的欄位，處理時才會建立
    pub is_new: bool,
}

/// The aggregate: everything that will be sent for processing.
///
/// Values are replaced, never patched in place; every mutation in
/// [`crate::core::mutator::ConfigMutator`] returns a new `TransformationConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransformationConfig {
    columns: IndexMap<String, ColumnConfigEntry>,
    rows_to_generate: u64,
    dataset_description: String,
}

impl TransformationConfig {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        columns: IndexMap<String, ColumnConfigEntry>,
        rows_to_generate: u64,
        dataset_description: String,
    ) -> Self {
        Self {
            columns,
            rows_to_generate,
            dataset_description,
        }
    }

    pub fn columns(&self) -> &IndexMap<String, ColumnConfigEntry> {
        &self.columns
    }

    pub fn entry(&self, column: &str) -> Option<&ColumnConfigEntry> {
        self.columns.get(column)
    }

    pub fn is_configured(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn rows_to_generate(&self) -> u64 {
        self.rows_to_generate
    }

    pub fn dataset_description(&self) -> &str {
        &self.dataset_description
    }

    pub fn has_work(&self) -> bool {
        !self.columns.is_empty() || self.rows_to_generate > 0
    }

    pub fn column_views<'a>(&'a self, schema: &DatasetSchema) -> Vec<ColumnView<'a>> {
        self.columns
            .iter()
            .map(|(name, entry)| ColumnView {
                name,
                entry,
                is_new: !schema.contains(name),
            })
            .collect()
    }

    pub fn new_columns(&self, schema: &DatasetSchema) -> Vec<String> {
        self.columns
            .keys()
            .filter(|name| !schema.contains(name))
            .cloned()
            .collect()
    }

    pub(crate) fn columns_mut(&mut self) -> &mut IndexMap<String, ColumnConfigEntry> {
        &mut self.columns
    }

    pub(crate) fn set_rows(&mut self, rows: u64, description: String) {
        self.rows_to_generate = rows;
        self.dataset_description = description;
    }

    /// 檢查聚合本身的不變量，回報所有違規而非第一個
    pub fn validate(&self) -> Result<()> {
        let violations = self.intrinsic_violations();
        into_result(violations)
    }

    /// 同 [`validate`](Self::validate)，另外檢查上下文欄位是否存在於資料集
    pub fn validate_against(&self, schema: &DatasetSchema) -> Result<()> {
        let mut violations = self.intrinsic_violations();
        for (name, entry) in &self.columns {
            for context in &entry.context_columns {
                if !schema.contains(context) {
                    violations.push(format!(
                        "column '{}' uses context column '{}' which is not in the dataset",
                        name, context
                    ));
                }
            }
        }
        into_result(violations)
    }

    fn intrinsic_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (name, entry) in &self.columns {
            if name.trim().is_empty() {
                violations.push("a configured column has a blank name".to_string());
            }

            let mut seen = HashSet::new();
            for context in &entry.context_columns {
                if context.trim().is_empty() {
                    violations.push(format!("column '{}' has a blank context column", name));
                } else if context == name {
                    violations.push(format!("column '{}' lists itself as context", name));
                } else if !seen.insert(context.as_str()) {
                    violations.push(format!(
                        "column '{}' lists context column '{}' more than once",
                        name, context
                    ));
                }
            }

            let batch = entry.batch_size.get();
            if batch < BatchSize::MIN as u32 || batch > BatchSize::MAX as u32 {
                violations.push(format!(
                    "column '{}' has batch size {} outside [{}, {}]",
                    name,
                    batch,
                    BatchSize::MIN,
                    BatchSize::MAX
                ));
            }
        }

        violations
    }
}

fn into_result(violations: Vec<String>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(EnhancerError::InvalidTransformation { violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_batch_size_clamps() {
        assert_eq!(BatchSize::clamped(0).get(), 1);
        assert_eq!(BatchSize::clamped(-7).get(), 1);
        assert_eq!(BatchSize::clamped(23).get(), 23);
        assert_eq!(BatchSize::clamped(999).get(), 50);
        assert_eq!(BatchSize::default().get(), 10);
    }

    #[test]
    fn test_default_entry_excludes_self() {
        let dataset = columns(&["Price", "Name", "Category", "Stock"]);
        let entry = ColumnConfigEntry::default_for("Price", &dataset);
        assert_eq!(entry.context_columns, columns(&["Name", "Category", "Stock"]));

        let entry = ColumnConfigEntry::default_for("Popularity", &dataset);
        assert_eq!(entry.context_columns, columns(&["Price", "Name", "Category"]));

        let entry = ColumnConfigEntry::default_for("Name", &columns(&["Name"]));
        assert!(entry.context_columns.is_empty());
    }

    #[test]
    fn test_from_patch_normalizes_context() {
        let patch = ColumnPatch {
            context_columns: columns(&["Title", "Category", "Title", "", "Category"]),
            batch_size: 0,
            ignore_rows_with_existing_value: true,
            transformation_instruction: "Edible or Inedible".to_string(),
        };
        let entry = ColumnConfigEntry::from_patch("Category", &patch);
        assert_eq!(entry.context_columns, columns(&["Title"]));
        assert_eq!(entry.batch_size.get(), 1);
        assert!(entry.ignore_rows_with_existing_value);
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let mut map = IndexMap::new();
        map.insert(
            "Category".to_string(),
            ColumnConfigEntry {
                context_columns: columns(&["Category", "Title", "Title"]),
                ..Default::default()
            },
        );
        map.insert(
            " ".to_string(),
            ColumnConfigEntry {
                context_columns: columns(&[""]),
                ..Default::default()
            },
        );
        let config = TransformationConfig::from_parts(map, 0, String::new());

        match config.validate() {
            Err(EnhancerError::InvalidTransformation { violations }) => {
                assert_eq!(violations.len(), 4, "{:?}", violations);
            }
            other => panic!("expected violations, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_against_flags_unknown_context() {
        let mut map = IndexMap::new();
        map.insert(
            "Popularity".to_string(),
            ColumnConfigEntry {
                context_columns: columns(&["Title", "Ghost"]),
                ..Default::default()
            },
        );
        let config = TransformationConfig::from_parts(map, 0, String::new());
        let schema = DatasetSchema::new("products.csv", columns(&["Title", "Price"]));

        assert!(config.validate().is_ok());
        let err = config.validate_against(&schema).unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_new_columns_are_flagged() {
        let mut map = IndexMap::new();
        map.insert("Price".to_string(), ColumnConfigEntry::default());
        map.insert("Popularity".to_string(), ColumnConfigEntry::default());
        let config = TransformationConfig::from_parts(map, 0, String::new());
        let schema = DatasetSchema::new("products.csv", columns(&["Price", "Name"]));

        let views = config.column_views(&schema);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].name, "Price");
        assert!(!views[0].is_new);
        assert_eq!(views[1].name, "Popularity");
        assert!(views[1].is_new);
        assert_eq!(config.new_columns(&schema), columns(&["Popularity"]));
    }

    #[test]
    fn test_rows_and_columns_are_independent() {
        let rows_only = TransformationConfig::from_parts(IndexMap::new(), 5, String::new());
        assert!(rows_only.has_work());
        assert!(rows_only.validate().is_ok());
        assert!(!TransformationConfig::empty().has_work());
    }
}
