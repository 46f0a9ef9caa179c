use crate::core::columns::ColumnMap;
use crate::core::normalize::{normalize_symbol, parse_expiry, parse_option_kind, parse_strike};
use crate::domain::model::{Cell, ExtractResult, InputRow, OptionRequest};
use crate::utils::error::{EtlError, Result};
use calamine::{Data, Reader};
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Workbook,
}

impl InputFormat {
    pub const EXTENSIONS: &'static [&'static str] = &["csv", "tsv", "xlsx", "xlsm", "xls", "ods"];

    pub fn from_path(path: &str) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "tsv" => Ok(InputFormat::Tsv),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(InputFormat::Workbook),
            _ => Err(EtlError::InvalidConfigValueError {
                field: "input".to_string(),
                value: path.to_string(),
                reason: format!(
                    "Unsupported input file type. Allowed extensions: {}",
                    Self::EXTENSIONS.join(", ")
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

pub fn read_sheet(bytes: Vec<u8>, format: InputFormat) -> Result<Sheet> {
    let sheet = match format {
        InputFormat::Csv => read_delimited(&bytes, b',')?,
        InputFormat::Tsv => read_delimited(&bytes, b'\t')?,
        InputFormat::Workbook => read_workbook(bytes)?,
    };

    if sheet.headers.iter().all(|h| h.trim().is_empty()) {
        return Err(EtlError::ValidationError {
            message: "Input has no header row".to_string(),
        });
    }

    tracing::debug!(
        "Read sheet with {} columns and {} data rows",
        sheet.headers.len(),
        sheet.rows.len()
    );
    Ok(sheet)
}

fn read_delimited(bytes: &[u8], delimiter: u8) -> Result<Sheet> {
    // Excel 匯出的 CSV 常帶 UTF-8 BOM
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<Cell> = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        if row.iter().any(|cell| !cell.is_empty()) {
            rows.push(row);
        }
    }

    Ok(Sheet { headers, rows })
}

fn read_workbook(bytes: Vec<u8>) -> Result<Sheet> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::ValidationError {
            message: "Workbook has no worksheets".to_string(),
        })??;

    let mut rows_iter = range.rows();
    let headers = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_from_data(cell).display())
            .collect(),
        None => Vec::new(),
    };

    let rows = rows_iter
        .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(Sheet { headers, rows })
}

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Date(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

fn cell_at(row: &[Cell], index: usize) -> &Cell {
    row.get(index).unwrap_or(&Cell::Empty)
}

/// 將原始列轉為 InputRow；單列解析失敗只記錄在該列，不中斷整批
pub fn normalize_rows(sheet: Sheet, overrides: &[(String, String)]) -> Result<ExtractResult> {
    let columns = ColumnMap::resolve(&sheet.headers, overrides)?;
    tracing::debug!("Resolved columns: {:?}", columns);

    let rows = sheet
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| normalize_row(index + 1, row, &columns))
        .collect();

    Ok(ExtractResult {
        rows,
        extra_columns: columns.extra_headers(),
    })
}

fn normalize_row(row_number: usize, row: &[Cell], columns: &ColumnMap) -> InputRow {
    let symbol_cell = cell_at(row, columns.symbol);
    let expiry_cell = cell_at(row, columns.expiry);
    let strike_cell = cell_at(row, columns.strike);
    let type_cell = cell_at(row, columns.option_type);

    let symbol = normalize_symbol(&symbol_cell.display());
    let expiry = parse_expiry(expiry_cell);
    let strike = parse_strike(strike_cell);
    let kind = parse_option_kind(&type_cell.display());

    let extra = columns
        .extra
        .iter()
        .map(|(index, _)| cell_at(row, *index).display())
        .collect();

    let display_symbol = symbol.clone().unwrap_or_else(|_| symbol_cell.display());
    let display_expiry = match &expiry {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => expiry_cell.display(),
    };
    let display_strike = match &strike {
        Ok(value) => crate::domain::model::format_number(*value),
        Err(_) => strike_cell.display(),
    };
    let display_type = match &kind {
        Ok(kind) => kind.to_string(),
        Err(_) => type_cell.display(),
    };

    let request = symbol.and_then(|symbol| {
        Ok(OptionRequest {
            symbol,
            expiry: expiry?,
            kind: kind?,
            strike: strike?,
        })
    });

    if let Err(reason) = &request {
        tracing::warn!("⚠️ Row {}: {}", row_number, reason);
    }

    InputRow {
        row_number,
        symbol: display_symbol,
        expiry: display_expiry,
        option_type: display_type,
        strike: display_strike,
        extra,
        request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OptionKind;
    use chrono::NaiveDate;

    #[test]
    fn test_input_format_from_path() {
        assert_eq!(InputFormat::from_path("a/b/options.csv").unwrap(), InputFormat::Csv);
        assert_eq!(InputFormat::from_path("OPTIONS.XLSX").unwrap(), InputFormat::Workbook);
        assert_eq!(InputFormat::from_path("legs.tsv").unwrap(), InputFormat::Tsv);
        assert!(InputFormat::from_path("options.txt").is_err());
        assert!(InputFormat::from_path("options").is_err());
    }

    #[test]
    fn test_read_csv_with_bom_and_blank_lines() {
        let csv = "\u{feff}symbol , expiry,cp,strike\nAAPL,2025-01-17,call,150\n,,,\nMSFT,45674,put,400\n";
        let sheet = read_sheet(csv.as_bytes().to_vec(), InputFormat::Csv).unwrap();

        assert_eq!(sheet.headers, vec!["symbol", "expiry", "cp", "strike"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1][0], Cell::Text("MSFT".to_string()));
    }

    #[test]
    fn test_read_tsv() {
        let tsv = "ticker\texpiration\ttype\tstrike\nspy\t01/17/2025\tP\t450\n";
        let sheet = read_sheet(tsv.as_bytes().to_vec(), InputFormat::Tsv).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][2], Cell::Text("P".to_string()));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(read_sheet(Vec::new(), InputFormat::Csv).is_err());
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::Int(150)), Cell::Number(150.0));
        assert_eq!(cell_from_data(&Data::Float(152.5)), Cell::Number(152.5));
        assert_eq!(cell_from_data(&Data::String(" ".to_string())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2025-01-17".to_string())),
            Cell::Text("2025-01-17".to_string())
        );
    }

    #[test]
    fn test_normalize_rows_parses_requests() {
        let csv = "Symbol,Expiry,CP,Strike,Book\naapl,45674,Call,150,desk-a\n";
        let sheet = read_sheet(csv.as_bytes().to_vec(), InputFormat::Csv).unwrap();
        let result = normalize_rows(sheet, &[]).unwrap();

        assert_eq!(result.extra_columns, vec!["Book".to_string()]);
        let row = &result.rows[0];
        assert_eq!(row.row_number, 1);
        assert_eq!(row.symbol, "AAPL");
        assert_eq!(row.expiry, "2025-01-17");
        assert_eq!(row.option_type, "call");
        assert_eq!(row.strike, "150");
        assert_eq!(row.extra, vec!["desk-a".to_string()]);

        let request = row.request.as_ref().unwrap();
        assert_eq!(request.expiry, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());
        assert_eq!(request.kind, OptionKind::Call);
        assert_eq!(request.strike, 150.0);
    }

    #[test]
    fn test_bad_row_keeps_raw_values() {
        let csv = "symbol,expiry,cp,strike\nAAPL,someday,call,abc\nMSFT,2025-01-17,put\n";
        let sheet = read_sheet(csv.as_bytes().to_vec(), InputFormat::Csv).unwrap();
        let result = normalize_rows(sheet, &[]).unwrap();

        assert_eq!(result.rows.len(), 2);
        let bad = &result.rows[0];
        assert_eq!(bad.expiry, "someday");
        assert_eq!(bad.strike, "abc");
        assert!(bad.request.as_ref().unwrap_err().contains("someday"));

        // 欄位不足的列視為空值
        let short = &result.rows[1];
        assert_eq!(short.strike, "");
        assert!(short.request.as_ref().unwrap_err().contains("strike is empty"));
    }

    #[test]
    fn test_missing_column_fails_whole_file() {
        let csv = "symbol,expiry,strike\nAAPL,2025-01-17,150\n";
        let sheet = read_sheet(csv.as_bytes().to_vec(), InputFormat::Csv).unwrap();
        assert!(normalize_rows(sheet, &[]).is_err());
    }
}
