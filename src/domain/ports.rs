use crate::domain::model::{ExtractResult, OptionChain, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn compress_output(&self) -> bool;
    fn file_stem(&self) -> &str {
        "options_with_prices"
    }
    fn zip_filename(&self) -> String {
        format!("{}.zip", self.file_stem())
    }
    /// 指定欄位名稱 (field -> header)，優先於內建別名
    fn column_overrides(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// 行情來源
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>>;
    async fn option_chain(&self, symbol: &str, expiry: NaiveDate) -> Result<OptionChain>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractResult>;
    async fn transform(&self, data: ExtractResult) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<String>;
}
