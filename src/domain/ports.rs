use crate::domain::wire::WireConfig;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 上傳成功後服務回傳的資料集資訊
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDataset {
    pub dataset_id: String,
    pub columns: Vec<String>,
}

/// The external upload / generation / processing service.
///
/// Every failure is terminal for that one request; callers decide whether to
/// try again.
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedDataset>;

    /// Turn a natural-language instruction into a candidate configuration.
    async fn generate_config(&self, instruction: &str, columns: &[String]) -> Result<WireConfig>;

    /// Start processing; returns the result-file identifier.
    async fn process(&self, dataset_id: &str, config: &WireConfig) -> Result<String>;

    async fn download(&self, result_file: &str) -> Result<Vec<u8>>;
}
