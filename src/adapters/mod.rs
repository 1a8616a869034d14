// Concrete implementations of the domain ports.

pub mod http;
pub mod storage;

pub use http::{probe_csv, HttpCollaborator};
pub use storage::LocalStorage;
