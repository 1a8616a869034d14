use crate::utils::error::{EnhancerError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> EnhancerError {
    EnhancerError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 服務位址：只接受帶主機名稱的 http / https
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(invalid(field_name, url_str, "URL has no host"));
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_at_least(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(field_name, value, format!("Value must be at least {}", min_value)));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(field_name, value, format!("Value must be between {} and {}", min, max)));
    }
    Ok(())
}

/// 檢查檔名副檔名（不分大小寫）
pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let extension = Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| invalid(field_name, file, "File has no extension or invalid filename"))?;

    if allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    {
        return Ok(());
    }
    Err(invalid(
        field_name,
        file,
        format!(
            "Unsupported file extension: {}. Allowed extensions: {}",
            extension,
            allowed_extensions.join(", ")
        ),
    ))
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

/// 新欄位名稱：去除空白後不可為空，也不可與資料集既有欄位同名
pub fn validate_new_column_name<'a>(name: &'a str, dataset_columns: &[String]) -> Result<&'a str> {
    let name = name.trim();
    let reject = |reason: &str| EnhancerError::InvalidColumnName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(reject("please enter a column name"));
    }
    if dataset_columns.iter().any(|column| column == name) {
        return Err(reject(
            "this column already exists in the CSV; add it as an existing column",
        ));
    }
    Ok(name)
}
