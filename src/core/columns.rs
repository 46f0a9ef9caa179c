use crate::core::render::{CONTRACT_SYMBOL_COLUMN, STANDARD_COLUMNS};
use crate::utils::error::{EtlError, Result};

const SYMBOL_ALIASES: &[&str] = &["symbol", "ticker", "underlying", "underlyingsymbol", "root", "stock"];
const EXPIRY_ALIASES: &[&str] = &[
    "expiry",
    "expiration",
    "expirationdate",
    "expirydate",
    "exp",
    "expdate",
    "maturity",
];
const STRIKE_ALIASES: &[&str] = &["strike", "strikeprice", "k"];
const TYPE_ALIASES: &[&str] = &["cp", "type", "optiontype", "callput", "putcall", "right", "pc"];

/// 四個必要欄位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Symbol,
    Expiry,
    Strike,
    OptionType,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Symbol, Field::Expiry, Field::Strike, Field::OptionType];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Symbol => "symbol",
            Field::Expiry => "expiry",
            Field::Strike => "strike",
            Field::OptionType => "cp",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Symbol => SYMBOL_ALIASES,
            Field::Expiry => EXPIRY_ALIASES,
            Field::Strike => STRIKE_ALIASES,
            Field::OptionType => TYPE_ALIASES,
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        let key = normalize_header(name);
        Field::ALL
            .into_iter()
            .find(|field| field.name() == key || field.aliases().contains(&key.as_str()))
    }
}

/// 比對用的標題鍵：去空白、小寫、移除分隔符號
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '.'))
        .collect()
}

/// 其他輸入欄位的輸出名稱：與輸出欄位同名者加上 `input_` 前綴，
/// 重複者加上 `_2`、`_3`…，比對不分大小寫
fn pass_through_names<'a>(columns: impl Iterator<Item = (usize, &'a String)>) -> Vec<(usize, String)> {
    let reserved: Vec<String> = STANDARD_COLUMNS
        .iter()
        .chain(std::iter::once(&CONTRACT_SYMBOL_COLUMN))
        .map(|name| name.to_lowercase())
        .collect();
    let mut taken = reserved.clone();

    columns
        .map(|(index, header)| {
            let header = header.trim();
            let stem = if header.is_empty() {
                format!("column_{}", index + 1)
            } else if reserved.contains(&header.to_lowercase()) {
                format!("input_{}", header)
            } else {
                header.to_string()
            };

            let mut name = stem.clone();
            let mut suffix = 2;
            while taken.contains(&name.to_lowercase()) {
                name = format!("{}_{}", stem, suffix);
                suffix += 1;
            }
            if name != header {
                tracing::warn!("⚠️ Input column '{}' written as '{}'", header, name);
            }
            taken.push(name.to_lowercase());
            (index, name)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub symbol: usize,
    pub expiry: usize,
    pub strike: usize,
    pub option_type: usize,
    /// (index, header) of pass-through columns, in input order
    pub extra: Vec<(usize, String)>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String], overrides: &[(String, String)]) -> Result<Self> {
        let mut found: [Option<usize>; 4] = [None; 4];

        for (field_name, header) in overrides {
            let field = Field::from_name(field_name).ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "input.columns".to_string(),
                value: field_name.clone(),
                reason: "Unknown column field. Valid fields: symbol, expiry, strike, cp".to_string(),
            })?;
            let index = headers
                .iter()
                .position(|h| h.trim() == header.trim())
                .ok_or_else(|| EtlError::ValidationError {
                    message: format!(
                        "Column '{}' configured for {} not found. Found columns: {}",
                        header,
                        field.name(),
                        headers.join(", ")
                    ),
                })?;
            found[Self::slot(field)] = Some(index);
        }

        for (index, header) in headers.iter().enumerate() {
            if found.contains(&Some(index)) {
                continue;
            }
            let key = normalize_header(header);
            for field in Field::ALL {
                let slot = Self::slot(field);
                if found[slot].is_none() && field.aliases().contains(&key.as_str()) {
                    found[slot] = Some(index);
                }
            }
        }

        let [Some(symbol), Some(expiry), Some(strike), Some(option_type)] = found else {
            let missing: Vec<&str> = Field::ALL
                .into_iter()
                .filter(|field| found[Self::slot(*field)].is_none())
                .map(|field| field.name())
                .collect();
            return Err(EtlError::ValidationError {
                message: format!(
                    "Missing required column(s): {}. Found columns: {}",
                    missing.join(", "),
                    headers.join(", ")
                ),
            });
        };
        let used = [symbol, expiry, strike, option_type];
        let extra = pass_through_names(
            headers
                .iter()
                .enumerate()
                .filter(|(index, _)| !used.contains(index)),
        );

        Ok(Self {
            symbol,
            expiry,
            strike,
            option_type,
            extra,
        })
    }

    fn slot(field: Field) -> usize {
        match field {
            Field::Symbol => 0,
            Field::Expiry => 1,
            Field::Strike => 2,
            Field::OptionType => 3,
        }
    }

    pub fn extra_headers(&self) -> Vec<String> {
        self.extra.iter().map(|(_, header)| header.clone()).collect()
    }
}
