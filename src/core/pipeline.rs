use crate::core::lookup::QuoteLookup;
use crate::core::render::{to_delimited, to_json};
use crate::core::spreadsheet::{normalize_rows, read_sheet, InputFormat};
use crate::core::{ConfigProvider, Pipeline, QuoteProvider, Storage};
use crate::domain::model::{
    ExtractResult, InputRow, LookupStatus, PricedRow, RunSummary, TransformResult,
};
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const OUTPUT_FORMATS: &[&str] = &["csv", "tsv", "json"];

pub struct QuotePipeline<S: Storage, C: ConfigProvider, Q: QuoteProvider> {
    storage: S,
    config: C,
    lookup: QuoteLookup<Q>,
}

impl<S: Storage, C: ConfigProvider, Q: QuoteProvider> QuotePipeline<S, C, Q> {
    pub fn new(storage: S, config: C, lookup: QuoteLookup<Q>) -> Self {
        Self {
            storage,
            config,
            lookup,
        }
    }

    pub fn lookup(&self) -> &QuoteLookup<Q> {
        &self.lookup
    }

    async fn price_row(&self, row: InputRow) -> PricedRow {
        let request = match &row.request {
            Ok(request) => request.clone(),
            Err(reason) => {
                let reason = reason.clone();
                return PricedRow::new(row, None, LookupStatus::Error(reason));
            }
        };

        match self.lookup.find_quote(&request).await {
            Ok(Some(quote)) => {
                tracing::debug!(
                    "✅ Row {}: {} {} {} {} -> {}",
                    row.row_number,
                    request.symbol,
                    request.expiry,
                    request.kind,
                    request.strike,
                    quote.contract_symbol
                );
                PricedRow::new(row, Some(quote), LookupStatus::Success)
            }
            Ok(None) => {
                tracing::info!(
                    "⚠️ Row {}: no {} {} {} contract at strike {}",
                    row.row_number,
                    request.symbol,
                    request.expiry,
                    request.kind,
                    request.strike
                );
                PricedRow::new(row, None, LookupStatus::NoMatch)
            }
            Err(e) => {
                tracing::warn!("❌ Row {}: quote lookup failed: {}", row.row_number, e);
                PricedRow::new(row, None, LookupStatus::Error(e.to_string()))
            }
        }
    }

    fn render(&self, format: &str, result: &TransformResult) -> Result<String> {
        match format {
            "csv" => Ok(result.csv_output.clone()),
            "tsv" => Ok(result.tsv_output.clone()),
            "json" => to_json(&result.priced_rows, &result.extra_columns),
            other => Err(EtlError::InvalidConfigValueError {
                field: "output_formats".to_string(),
                value: other.to_string(),
                reason: format!("Unsupported format. Valid formats: {}", OUTPUT_FORMATS.join(", ")),
            }),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, Q: QuoteProvider> Pipeline for QuotePipeline<S, C, Q> {
    async fn extract(&self) -> Result<ExtractResult> {
        let input_path = self.config.input_path();
        let format = InputFormat::from_path(input_path)?;

        tracing::debug!("Reading {:?} input from: {}", format, input_path);
        let bytes = self.storage.read_file(input_path).await?;
        let sheet = read_sheet(bytes, format)?;

        normalize_rows(sheet, &self.config.column_overrides())
    }

    async fn transform(&self, data: ExtractResult) -> Result<TransformResult> {
        let total = data.rows.len();
        let mut priced_rows = Vec::with_capacity(total);

        for (index, row) in data.rows.into_iter().enumerate() {
            priced_rows.push(self.price_row(row).await);
            if (index + 1) % 25 == 0 {
                tracing::info!("📊 Priced {}/{} rows", index + 1, total);
            }
        }

        let summary = RunSummary::from_rows(&priced_rows);
        let csv_output = to_delimited(&priced_rows, &data.extra_columns, b',')?;
        let tsv_output = to_delimited(&priced_rows, &data.extra_columns, b'\t')?;

        Ok(TransformResult {
            priced_rows,
            extra_columns: data.extra_columns,
            csv_output,
            tsv_output,
            summary,
        })
    }

    async fn load(&self, result: &TransformResult) -> Result<String> {
        let stem = self.config.file_stem();
        let mut files = Vec::new();
        for format in self.config.output_formats() {
            let format = format.trim().to_lowercase();
            let content = self.render(&format, result)?;
            files.push((format!("{}.{}", stem, format), content));
        }

        if files.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "output_formats".to_string(),
            });
        }

        if self.config.compress_output() {
            let zip_name = self.config.zip_filename();
            tracing::debug!("Creating ZIP file with {} files", files.len());

            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, content) in &files {
                    zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                    zip.write_all(content.as_bytes())?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };

            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(&zip_name, &zip_data).await?;
            return Ok(format!("{}/{}", self.config.output_path(), zip_name));
        }

        for (name, content) in &files {
            self.storage.write_file(name, content.as_bytes()).await?;
            tracing::debug!("Wrote {} ({} bytes)", name, content.len());
        }

        // 主要輸出為第一個格式
        Ok(format!("{}/{}", self.config.output_path(), files[0].0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{OptionChain, OptionContract};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn with_input(path: &str, content: &str) -> Self {
            let mut files = HashMap::new();
            files.insert(path.to_string(), content.as_bytes().to_vec());
            Self {
                files: Arc::new(Mutex::new(files)),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_path: String,
        output_path: String,
        output_formats: Vec<String>,
        compress: bool,
    }

    impl MockConfig {
        fn new(input_path: &str, formats: &[&str], compress: bool) -> Self {
            Self {
                input_path: input_path.to_string(),
                output_path: "test_output".to_string(),
                output_formats: formats.iter().map(|s| s.to_string()).collect(),
                compress,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            &self.input_path
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn compress_output(&self) -> bool {
            self.compress
        }
    }

    struct MockProvider;

    #[async_trait]
    impl QuoteProvider for MockProvider {
        async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>> {
            match symbol {
                "AAPL" => Ok(vec![NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()]),
                "FAIL" => Err(EtlError::ApiStatusError {
                    status: 502,
                    url: "mock".to_string(),
                }),
                _ => Ok(vec![]),
            }
        }

        async fn option_chain(&self, _symbol: &str, expiry: NaiveDate) -> Result<OptionChain> {
            Ok(OptionChain {
                expiry,
                calls: vec![OptionContract {
                    contract_symbol: "AAPL250117C00150000".to_string(),
                    strike: 150.0,
                    last_price: Some(80.1),
                    bid: Some(79.9),
                    ask: Some(80.4),
                    volume: None,
                    open_interest: None,
                    implied_volatility: None,
                    in_the_money: true,
                }],
                puts: vec![],
            })
        }
    }

    const INPUT: &str = "symbol,expiry,cp,strike\n\
AAPL,2025-01-17,call,150\n\
AAPL,2025-01-17,put,150\n\
FAIL,2025-01-17,call,10\n\
AAPL,2025-01-17,call,abc\n";

    fn pipeline(storage: MockStorage, config: MockConfig) -> QuotePipeline<MockStorage, MockConfig, MockProvider> {
        QuotePipeline::new(storage, config, QuoteLookup::new(MockProvider))
    }

    #[tokio::test]
    async fn test_extract_reads_input_through_storage() {
        let storage = MockStorage::with_input("options.csv", INPUT);
        let pipeline = pipeline(storage, MockConfig::new("options.csv", &["csv"], false));

        let extracted = pipeline.extract().await.unwrap();
        assert_eq!(extracted.rows.len(), 4);
        assert!(extracted.rows[3].request.is_err());
    }

    #[tokio::test]
    async fn test_extract_rejects_unknown_extension() {
        let storage = MockStorage::with_input("options.txt", INPUT);
        let pipeline = pipeline(storage, MockConfig::new("options.txt", &["csv"], false));

        assert!(matches!(
            pipeline.extract().await,
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[tokio::test]
    async fn test_transform_is_best_effort_per_row() {
        let storage = MockStorage::with_input("options.csv", INPUT);
        let pipeline = pipeline(storage, MockConfig::new("options.csv", &["csv"], false));

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();

        let statuses: Vec<&LookupStatus> = result.priced_rows.iter().map(|r| &r.status).collect();
        assert_eq!(statuses[0], &LookupStatus::Success);
        assert_eq!(statuses[1], &LookupStatus::NoMatch);
        assert!(matches!(statuses[2], LookupStatus::Error(msg) if msg.contains("502")));
        assert!(matches!(statuses[3], LookupStatus::Error(msg) if msg.contains("abc")));

        assert_eq!(
            result.summary,
            RunSummary {
                total: 4,
                success: 1,
                no_match: 1,
                errors: 2
            }
        );
        assert!(result.csv_output.contains("AAPL,2025-01-17,call,150,80.1,79.9,80.4,Success"));
    }

    #[tokio::test]
    async fn test_load_writes_each_format() {
        let storage = MockStorage::with_input("options.csv", INPUT);
        let pipeline = pipeline(storage.clone(), MockConfig::new("options.csv", &["csv", "json"], false));

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();
        let output_path = pipeline.load(&result).await.unwrap();

        assert_eq!(output_path, "test_output/options_with_prices.csv");
        let csv = storage.get_file("options_with_prices.csv").await.unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), result.csv_output);

        let json = storage.get_file("options_with_prices.json").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 4);
        assert!(storage.get_file("options_with_prices.tsv").await.is_none());
    }

    #[tokio::test]
    async fn test_load_zip_bundle_contains_configured_formats() {
        let storage = MockStorage::with_input("options.csv", INPUT);
        let pipeline = pipeline(storage.clone(), MockConfig::new("options.csv", &["csv", "tsv"], true));

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();
        let output_path = pipeline.load(&result).await.unwrap();

        assert_eq!(output_path, "test_output/options_with_prices.zip");
        let zip_bytes = storage.get_file("options_with_prices.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["options_with_prices.csv", "options_with_prices.tsv"]);

        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("options_with_prices.tsv").unwrap(), &mut content)
            .unwrap();
        assert_eq!(content, result.tsv_output);
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_format() {
        let storage = MockStorage::with_input("options.csv", INPUT);
        let pipeline = pipeline(storage, MockConfig::new("options.csv", &["xml"], false));

        let extracted = pipeline.extract().await.unwrap();
        let result = pipeline.transform(extracted).await.unwrap();
        assert!(pipeline.load(&result).await.is_err());
    }
}
