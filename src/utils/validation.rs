use crate::utils::error::{EtlError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> EtlError {
    EtlError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 行情端點必須是帶主機名稱的 http(s) 網址
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
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
    if path.trim().is_empty() {
        Err(invalid(field_name, path, "Path cannot be empty"))
    } else if path.contains('\0') {
        Err(invalid(field_name, path, "Path contains null bytes"))
    } else {
        Ok(())
    }
}

/// 副檔名不分大小寫
pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let extension = Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| invalid(field_name, file, "File has no extension"))?;

    if allowed_extensions.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(invalid(
            field_name,
            file,
            format!(
                "Unsupported file type '.{}'. Expected one of: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        ))
    }
}

pub fn validate_formats(field_name: &str, formats: &[String], valid_formats: &[&str]) -> Result<()> {
    if formats.is_empty() {
        return Err(EtlError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    match formats
        .iter()
        .find(|format| !valid_formats.contains(&format.trim().to_lowercase().as_str()))
    {
        Some(unknown) => Err(invalid(
            field_name,
            unknown,
            format!("Unsupported format. Valid formats: {}", valid_formats.join(", ")),
        )),
        None => Ok(()),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| EtlError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api_endpoint", "https://query2.finance.yahoo.com").is_ok());
        assert!(validate_url("api_endpoint", "http://localhost:8080").is_ok());
        assert!(validate_url("api_endpoint", "").is_err());
        assert!(validate_url("api_endpoint", "invalid-url").is_err());
        assert!(validate_url("api_endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output_path", "./output").is_ok());
        assert!(validate_path("output_path", "  ").is_err());
        assert!(validate_path("output_path", "out\0put").is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        let allowed = ["csv", "xlsx"];
        assert!(validate_file_extension("input", "options.csv", &allowed).is_ok());
        assert!(validate_file_extension("input", "Options.XLSX", &allowed).is_ok());
        assert!(validate_file_extension("input", "options.txt", &allowed).is_err());
        assert!(validate_file_extension("input", "options", &allowed).is_err());
    }

    #[test]
    fn test_validate_formats() {
        let valid = ["csv", "tsv", "json"];
        assert!(validate_formats("output_formats", &["csv".to_string(), " JSON".to_string()], &valid).is_ok());
        assert!(validate_formats("output_formats", &["xlsx".to_string()], &valid).is_err());
        assert!(matches!(
            validate_formats("output_formats", &[], &valid),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("timeout_seconds", 30, 1, 300).is_ok());
        assert!(validate_range("timeout_seconds", 0, 1, 300).is_err());
        assert!(validate_range("timeout_seconds", 301, 1, 300).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("options.csv".to_string());
        let missing: Option<String> = None;
        assert_eq!(validate_required_field("input.path", &present).unwrap(), "options.csv");
        assert!(validate_required_field("input.path", &missing).is_err());
    }
}
