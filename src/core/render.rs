use crate::domain::model::PricedRow;
use crate::utils::error::{EtlError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const STANDARD_COLUMNS: [&str; 8] = [
    "symbol",
    "expiry",
    "type",
    "strike",
    "lastPrice",
    "bid",
    "ask",
    "status",
];

fn price(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn standard_fields(row: &PricedRow) -> [String; 8] {
    [
        row.symbol.clone(),
        row.expiry.clone(),
        row.option_type.clone(),
        row.strike.clone(),
        price(row.last_price()),
        price(row.bid()),
        price(row.ask()),
        row.status.to_string(),
    ]
}

/// CSV / TSV 輸出：標準欄位在前，原始輸入的其他欄位附在後面
pub fn to_delimited(rows: &[PricedRow], extra_columns: &[String], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    let header = STANDARD_COLUMNS
        .iter()
        .copied()
        .chain(extra_columns.iter().map(String::as_str));
    writer.write_record(header)?;

    for row in rows {
        let fields = standard_fields(row);
        let record = fields
            .iter()
            .map(String::as_str)
            .chain(row.extra.iter().map(String::as_str));
        writer.write_record(record)?;
    }

    let bytes = writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush delimited output: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
        message: format!("Delimited output is not valid UTF-8: {}", e),
    })
}

/// JSON 獨有的欄位 (CSV 不輸出)
pub const CONTRACT_SYMBOL_COLUMN: &str = "contractSymbol";

// 依欄位順序輸出：標準欄位在前，其他輸入欄位照原順序附在後面
struct JsonRow<'a> {
    row: &'a PricedRow,
    extra_columns: &'a [String],
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let row = self.row;
        // 能轉成數字的履約價輸出為數字
        let strike = row
            .strike
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(row.strike.clone()));

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("symbol", &row.symbol)?;
        map.serialize_entry("expiry", &row.expiry)?;
        map.serialize_entry("type", &row.option_type)?;
        map.serialize_entry("strike", &strike)?;
        map.serialize_entry("lastPrice", &row.last_price())?;
        map.serialize_entry("bid", &row.bid())?;
        map.serialize_entry("ask", &row.ask())?;
        if let Some(quote) = &row.quote {
            map.serialize_entry(CONTRACT_SYMBOL_COLUMN, &quote.contract_symbol)?;
        }
        map.serialize_entry("status", &row.status.to_string())?;
        for (name, value) in self.extra_columns.iter().zip(&row.extra) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub fn to_json(rows: &[PricedRow], extra_columns: &[String]) -> Result<String> {
    let json_rows: Vec<JsonRow> = rows
        .iter()
        .map(|row| JsonRow { row, extra_columns })
        .collect();

    Ok(serde_json::to_string_pretty(&json_rows)?)
}

/// 終端機預覽用的固定寬度表格
pub fn preview_table(rows: &[PricedRow]) -> String {
    let body: Vec<[String; 8]> = rows.iter().map(standard_fields).collect();

    let mut widths = STANDARD_COLUMNS.map(str::len);
    for fields in &body {
        for (width, field) in widths.iter_mut().zip(fields.iter()) {
            *width = (*width).max(field.chars().count());
        }
    }

    let format_line = |fields: &[&str]| -> String {
        fields
            .iter()
            .zip(widths.iter())
            .map(|(field, width)| format!("{:<width$}", field, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(&STANDARD_COLUMNS[..])];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for fields in &body {
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        lines.push(format_line(&refs[..]));
    }
    lines.join("\n")
}
