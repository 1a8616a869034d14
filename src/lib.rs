pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::AppConfig;

pub use crate::adapters::{HttpCollaborator, LocalStorage};
pub use crate::core::{
    BatchOutcome, ColumnEditorSession, ConfigIntent, ConfigMutator, ConfigOrchestrator, Notice,
    NoticeLevel, ProcessingPlan, SubmissionReceipt,
};
pub use domain::model::{BatchSize, ColumnConfigEntry, ColumnPatch, DatasetSchema, TransformationConfig};
pub use domain::ports::{Collaborator, Storage, UploadedDataset};
pub use domain::wire::WireConfig;
pub use utils::error::{EnhancerError, Result};
