//! The JSON form of a [`TransformationConfig`] exchanged with the generation
//! and processing service.
//!
//! On the wire the per-column settings travel as four parallel maps. They are
//! folded into one keyed map as soon as they cross into the crate, and the
//! key sets are checked in both directions.

use crate::domain::model::{BatchSize, ColumnConfigEntry, ColumnPatch, TransformationConfig};
use crate::utils::error::{EnhancerError, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WireConfig {
    #[serde(default)]
    pub column_context: IndexMap<String, Value>,
    #[serde(default)]
    pub batch_sizes: IndexMap<String, Value>,
    #[serde(default)]
    pub ignore_valued_columns: IndexMap<String, Value>,
    #[serde(default)]
    pub transformation_instructions: IndexMap<String, Value>,
    #[serde(default)]
    pub generate_rows: Value,
    #[serde(default)]
    pub dataset_description: Value,
}

impl WireConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        self.check_key_sets()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 四個逐欄對應表的鍵集合必須完全一致
    pub fn check_key_sets(&self) -> Result<()> {
        let maps: [(&str, IndexSet<&String>); 4] = [
            ("column_context", self.column_context.keys().collect()),
            ("batch_sizes", self.batch_sizes.keys().collect()),
            ("ignore_valued_columns", self.ignore_valued_columns.keys().collect()),
            (
                "transformation_instructions",
                self.transformation_instructions.keys().collect(),
            ),
        ];

        let all: IndexSet<&String> = maps.iter().flat_map(|(_, keys)| keys.iter().copied()).collect();
        let mismatches: Vec<String> = all
            .iter()
            .filter_map(|column| {
                let missing: Vec<&str> = maps
                    .iter()
                    .filter(|(_, keys)| !keys.contains(column))
                    .map(|(map_name, _)| *map_name)
                    .collect();
                if missing.is_empty() {
                    None
                } else {
                    Some(format!("'{}' missing from {}", column, missing.join(", ")))
                }
            })
            .collect();

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(EnhancerError::WireKeyMismatch { mismatches })
        }
    }
}

impl From<&TransformationConfig> for WireConfig {
    fn from(config: &TransformationConfig) -> Self {
        let mut wire = WireConfig {
            generate_rows: Value::from(config.rows_to_generate()),
            dataset_description: Value::from(config.dataset_description()),
            ..Default::default()
        };

        for (name, entry) in config.columns() {
            wire.column_context
                .insert(name.clone(), Value::from(entry.context_columns.clone()));
            wire.batch_sizes
                .insert(name.clone(), Value::from(entry.batch_size.get()));
            wire.ignore_valued_columns
                .insert(name.clone(), Value::from(entry.ignore_rows_with_existing_value));
            wire.transformation_instructions
                .insert(name.clone(), Value::from(entry.transformation_instruction.clone()));
        }

        wire
    }
}

impl TryFrom<&WireConfig> for TransformationConfig {
    type Error = EnhancerError;

    /// 外部資料中不合法的數值一律夾取 / 轉換成最接近的合法值，不直接失敗
    fn try_from(wire: &WireConfig) -> Result<Self> {
        wire.check_key_sets()?;

        let mut columns = IndexMap::with_capacity(wire.column_context.len());
        for (name, context) in &wire.column_context {
            let patch = ColumnPatch {
                context_columns: coerce_context(name, context),
                batch_size: coerce_integer(
                    &format!("batch_sizes.{}", name),
                    &wire.batch_sizes[name],
                    BatchSize::DEFAULT as i64,
                ),
                ignore_rows_with_existing_value: coerce_bool(name, &wire.ignore_valued_columns[name]),
                transformation_instruction: coerce_string(
                    &format!("transformation_instructions.{}", name),
                    &wire.transformation_instructions[name],
                ),
            };

            if patch.batch_size < BatchSize::MIN as i64 || patch.batch_size > BatchSize::MAX as i64 {
                tracing::warn!(
                    "⚠️ batch size {} for '{}' out of range, clamping",
                    patch.batch_size,
                    name
                );
            }
            columns.insert(name.clone(), ColumnConfigEntry::from_patch(name, &patch));
        }

        let rows = coerce_integer("generate_rows", &wire.generate_rows, 0);
        if rows < 0 {
            tracing::warn!("⚠️ generate_rows {} is negative, using 0", rows);
        }
        let description = coerce_string("dataset_description", &wire.dataset_description);

        Ok(TransformationConfig::from_parts(
            columns,
            rows.max(0) as u64,
            description,
        ))
    }
}

impl TransformationConfig {
    pub fn to_wire(&self) -> Result<WireConfig> {
        let wire = WireConfig::from(self);
        wire.check_key_sets()?;
        Ok(wire)
    }

    pub fn from_wire(wire: &WireConfig) -> Result<Self> {
        Self::try_from(wire)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        self.to_wire()?.to_json_pretty()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::from_wire(&WireConfig::from_json_str(content)?)
    }
}

fn coerce_integer(field: &str, value: &Value, default: i64) -> i64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(f) = n.as_f64() {
                tracing::warn!("⚠️ {} = {} is not an integer, rounding", field, f);
                round_to_i64(f)
            } else {
                // u64 超出 i64 範圍
                i64::MAX
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                i
            } else if let Ok(f) = trimmed.parse::<f64>() {
                round_to_i64(f)
            } else {
                tracing::warn!("⚠️ {} = {:?} is not numeric, using {}", field, s, default);
                default
            }
        }
        Value::Null => default,
        other => {
            tracing::warn!("⚠️ {} = {} is not numeric, using {}", field, other, default);
            default
        }
    }
}

fn round_to_i64(f: f64) -> i64 {
    if f.is_nan() {
        0
    } else {
        // `as` 對超出範圍的浮點數會飽和
        f.round() as i64
    }
}

fn coerce_bool(column: &str, value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => false,
        Value::Null => false,
        other => {
            tracing::warn!(
                "⚠️ ignore_valued_columns.{} = {} is not a boolean, using false",
                column,
                other
            );
            false
        }
    }
}

fn coerce_string(field: &str, value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => {
            tracing::warn!("⚠️ {} is not a string, using its JSON text", field);
            other.to_string()
        }
    }
}

fn coerce_context(column: &str, value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => {
            tracing::warn!(
                "⚠️ column_context.{} = {} is not a list of columns, using none",
                column,
                other
            );
            Vec::new()
        }
    }
}
