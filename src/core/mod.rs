pub mod editor;
pub mod mutator;
pub mod notice;
pub mod orchestrator;
pub mod plan;

pub use crate::domain::model::{ColumnConfigEntry, ColumnPatch, DatasetSchema, TransformationConfig};
pub use crate::domain::ports::{Collaborator, Storage};
pub use crate::utils::error::Result;
pub use editor::{ColumnEditorSession, Debouncer};
pub use mutator::{ConfigIntent, ConfigMutator};
pub use notice::{Notice, NoticeLevel};
pub use orchestrator::{BatchOutcome, ConfigOrchestrator, PreparedSubmission};
pub use plan::{ProcessingPlan, SubmissionReceipt};
