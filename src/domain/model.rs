use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => write!(f, "call"),
            OptionKind::Put => write!(f, "put"),
        }
    }
}

/// 試算表中的單一儲存格原始值
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    /// Excel 序列日期 (自 1899-12-30 起算的天數)
    Date(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 原樣輸出，用於無法解析時保留使用者輸入
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) | Cell::Date(n) => format_number(*n),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// 已驗證的查價請求
#[derive(Debug, Clone, PartialEq)]
pub struct OptionRequest {
    pub symbol: String,
    pub expiry: NaiveDate,
    pub kind: OptionKind,
    pub strike: f64,
}

/// 正規化後的輸入列
#[derive(Debug, Clone)]
pub struct InputRow {
    pub row_number: usize,
    pub symbol: String,
    pub expiry: String,
    pub option_type: String,
    pub strike: String,
    pub extra: Vec<String>,
    pub request: std::result::Result<OptionRequest, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub contract_symbol: String,
    pub strike: f64,
    pub last_price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
    pub implied_volatility: Option<f64>,
    pub in_the_money: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionChain {
    pub expiry: NaiveDate,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

impl OptionChain {
    pub fn side(&self, kind: OptionKind) -> &[OptionContract] {
        match kind {
            OptionKind::Call => &self.calls,
            OptionKind::Put => &self.puts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionQuote {
    pub contract_symbol: String,
    pub strike: f64,
    pub last_price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl From<&OptionContract> for OptionQuote {
    fn from(contract: &OptionContract) -> Self {
        Self {
            contract_symbol: contract.contract_symbol.clone(),
            strike: contract.strike,
            last_price: contract.last_price,
            bid: contract.bid,
            ask: contract.ask,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupStatus {
    Success,
    NoMatch,
    Error(String),
}

impl fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupStatus::Success => write!(f, "Success"),
            LookupStatus::NoMatch => write!(f, "No match or invalid input"),
            LookupStatus::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricedRow {
    pub row_number: usize,
    pub symbol: String,
    pub expiry: String,
    pub option_type: String,
    pub strike: String,
    pub extra: Vec<String>,
    pub quote: Option<OptionQuote>,
    pub status: LookupStatus,
}

impl PricedRow {
    pub fn new(row: InputRow, quote: Option<OptionQuote>, status: LookupStatus) -> Self {
        Self {
            row_number: row.row_number,
            symbol: row.symbol,
            expiry: row.expiry,
            option_type: row.option_type,
            strike: row.strike,
            extra: row.extra,
            quote,
            status,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        self.quote.as_ref().and_then(|q| q.last_price)
    }

    pub fn bid(&self) -> Option<f64> {
        self.quote.as_ref().and_then(|q| q.bid)
    }

    pub fn ask(&self) -> Option<f64> {
        self.quote.as_ref().and_then(|q| q.ask)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub no_match: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn from_rows(rows: &[PricedRow]) -> Self {
        let mut summary = Self {
            total: rows.len(),
            ..Self::default()
        };
        for row in rows {
            match row.status {
                LookupStatus::Success => summary.success += 1,
                LookupStatus::NoMatch => summary.no_match += 1,
                LookupStatus::Error(_) => summary.errors += 1,
            }
        }
        summary
    }
}

/// extract 階段的輸出
#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    pub rows: Vec<InputRow>,
    pub extra_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub priced_rows: Vec<PricedRow>,
    pub extra_columns: Vec<String>,
    pub csv_output: String,
    pub tsv_output: String,
    pub summary: RunSummary,
}

/// 一次執行的結果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output_path: String,
    pub summary: RunSummary,
    pub priced_rows: Vec<PricedRow>,
}
