use crate::domain::ports::{Collaborator, UploadedDataset};
use crate::domain::wire::WireConfig;
use crate::utils::error::{EnhancerError, Result};
use crate::utils::validation::validate_file_extension;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    filename: String,
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateConfigResponse {
    config: WireConfig,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    success: bool,
    result_file: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Reads the header row and counts data rows of a CSV payload.
///
/// Anything the `csv` reader refuses is reported as an upload rejection.
pub fn probe_csv(bytes: &[u8]) -> Result<(Vec<String>, usize)> {
    let reject = |e: csv::Error| EnhancerError::UploadRejected {
        message: format!("Error reading CSV file: {}", e),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(reject)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(EnhancerError::UploadRejected {
            message: "CSV file has no header row".to_string(),
        });
    }

    let mut rows = 0usize;
    for record in reader.records() {
        record.map_err(reject)?;
        rows += 1;
    }

    Ok((headers, rows))
}

/// HTTP client for the CSV enhancement service.
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: Client,
    base_url: Url,
}

impl HttpCollaborator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| EnhancerError::InvalidConfigValueError {
            field: "service.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EnhancerError::ConfigError {
                message: format!("Base URL cannot be extended: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 取出錯誤回應中的 detail 欄位
    async fn error_detail(response: Response) -> Option<String> {
        let text = response.text().await.ok()?;
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                detail: Some(serde_json::Value::String(detail)),
            }) => Some(detail),
            Ok(ErrorBody {
                detail: Some(other),
            }) => Some(other.to_string()),
            _ if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadedDataset> {
        // 先在本地擋掉明顯不合格的檔案
        validate_file_extension("filename", filename, &["csv"]).map_err(|_| {
            EnhancerError::UploadRejected {
                message: "Invalid file format. Only CSV files are accepted.".to_string(),
            }
        })?;
        let (local_columns, rows) = probe_csv(&bytes)?;
        tracing::debug!(
            "Uploading '{}' ({} columns, {} rows)",
            filename,
            local_columns.len(),
            rows
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint(&["upload"])?)
            .multipart(form)
            .send()
            .await?;
        tracing::debug!("Upload response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status();
            let message = Self::error_detail(response)
                .await
                .unwrap_or_else(|| format!("Upload failed with status: {}", status));
            return Err(EnhancerError::UploadRejected { message });
        }

        let body: UploadResponse = response.json().await?;
        if !body.success {
            return Err(EnhancerError::UploadRejected {
                message: "Service did not accept the file".to_string(),
            });
        }

        tracing::info!(
            "📤 Uploaded '{}' with {} columns",
            body.filename,
            body.columns.len()
        );
        Ok(UploadedDataset {
            dataset_id: body.filename,
            columns: body.columns,
        })
    }

    async fn generate_config(&self, instruction: &str, columns: &[String]) -> Result<WireConfig> {
        let response = self
            .client
            .post(self.endpoint(&["generate-config"])?)
            .json(&json!({
                "description": instruction,
                "columns": columns,
            }))
            .send()
            .await?;
        tracing::debug!("Generate-config response status: {}", response.status());

        if !response.status().is_success() {
            return Err(EnhancerError::GenerationFailed {
                detail: Self::error_detail(response).await,
            });
        }

        let body: GenerateConfigResponse =
            response
                .json()
                .await
                .map_err(|e| EnhancerError::GenerationFailed {
                    detail: Some(format!("Unexpected response: {}", e)),
                })?;
        Ok(body.config)
    }

    async fn process(&self, dataset_id: &str, config: &WireConfig) -> Result<String> {
        config.check_key_sets()?;

        let response = self
            .client
            .post(self.endpoint(&["process"])?)
            .json(&json!({
                "filename": dataset_id,
                "config": config,
            }))
            .send()
            .await?;
        tracing::debug!("Process response status: {}", response.status());

        match response.status() {
            status if status.is_success() => {
                let body: ProcessResponse = response.json().await?;
                if !body.success {
                    return Err(EnhancerError::ProcessingFailed { detail: None });
                }
                Ok(body.result_file)
            }
            StatusCode::NOT_FOUND => Err(EnhancerError::NotFound {
                resource: dataset_id.to_string(),
            }),
            _ => Err(EnhancerError::ProcessingFailed {
                detail: Self::error_detail(response).await,
            }),
        }
    }

    async fn download(&self, result_file: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.endpoint(&["download", result_file])?)
            .send()
            .await?;
        tracing::debug!("Download response status: {}", response.status());

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(EnhancerError::NotFound {
                resource: result_file.to_string(),
            }),
            status => Err(EnhancerError::ProcessingFailed {
                detail: Self::error_detail(response)
                    .await
                    .or_else(|| Some(format!("Download failed with status: {}", status))),
            }),
        }
    }
}
