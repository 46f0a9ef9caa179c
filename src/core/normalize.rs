use crate::domain::model::{Cell, OptionKind};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Excel 的最大序列日期 (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

// 順序即優先序：斜線日期先試美式 (月/日)，失敗才試日/月
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%d/%m/%y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let origin = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    origin.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;
    (1900..=2999).contains(&date.year()).then_some(date)
}

fn date_from_number(n: f64) -> Result<NaiveDate, String> {
    // 8 位整數一定超出序列日期範圍，視為 YYYYMMDD
    if n.fract() == 0.0 && (19_000_101.0..=29_991_231.0).contains(&n) {
        return NaiveDate::parse_from_str(&format!("{}", n as i64), "%Y%m%d")
            .map_err(|_| format!("invalid YYYYMMDD date '{}'", n as i64));
    }
    excel_serial_to_date(n).ok_or_else(|| format!("'{}' is not a valid Excel date", n))
}

fn date_from_text(text: &str) -> Result<NaiveDate, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("expiry is empty".to_string());
    }

    if let Ok(n) = text.parse::<f64>() {
        return date_from_number(n);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Some(date) = NaiveDateTime::parse_from_str(text, format)
            .ok()
            .and_then(|dt| plausible(dt.date()))
        {
            return Ok(date);
        }
    }

    for format in DATE_FORMATS {
        if let Some(date) = NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(plausible)
        {
            return Ok(date);
        }
    }

    Err(format!("unrecognized expiry date '{}'", text))
}

pub fn parse_expiry(cell: &Cell) -> Result<NaiveDate, String> {
    match cell {
        Cell::Empty => Err("expiry is empty".to_string()),
        Cell::Date(serial) => {
            excel_serial_to_date(*serial).ok_or_else(|| format!("'{}' is not a valid Excel date", serial))
        }
        Cell::Number(n) => date_from_number(*n),
        Cell::Text(text) => date_from_text(text),
    }
}

pub fn parse_strike(cell: &Cell) -> Result<f64, String> {
    let strike = match cell {
        Cell::Empty => return Err("strike is empty".to_string()),
        Cell::Number(n) | Cell::Date(n) => *n,
        Cell::Text(text) => {
            let cleaned: String = text
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned
                .parse::<f64>()
                .map_err(|_| format!("could not convert strike '{}' to a number", text.trim()))?
        }
    };

    if !strike.is_finite() || strike <= 0.0 {
        return Err(format!("strike must be a positive number, got {}", strike));
    }
    Ok(strike)
}

pub fn parse_option_kind(value: &str) -> Result<OptionKind, String> {
    match value.trim().to_lowercase().as_str() {
        "call" | "calls" | "c" => Ok(OptionKind::Call),
        "put" | "puts" | "p" => Ok(OptionKind::Put),
        "" => Err("option type is empty".to_string()),
        other => Err(format!("unrecognized option type '{}' (expected call or put)", other)),
    }
}

pub fn normalize_symbol(value: &str) -> Result<String, String> {
    let symbol = value.trim().to_uppercase();
    if symbol.is_empty() {
        return Err("symbol is empty".to_string());
    }
    Ok(symbol)
}
