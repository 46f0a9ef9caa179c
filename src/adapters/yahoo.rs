use crate::domain::model::{OptionChain, OptionContract};
use crate::domain::ports::QuoteProvider;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) option-price-fetcher/0.1";
/// 回應會帶 Yahoo 的 session cookie (A3)
pub const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionChainEnvelope,
}

#[derive(Debug, Deserialize)]
struct OptionChainEnvelope {
    #[serde(default)]
    result: Vec<OptionResult>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionsBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsBlock {
    expiration_date: i64,
    #[serde(default)]
    calls: Vec<RawContract>,
    #[serde(default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    contract_symbol: String,
    strike: f64,
    last_price: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    volume: Option<u64>,
    open_interest: Option<u64>,
    implied_volatility: Option<f64>,
    #[serde(default)]
    in_the_money: bool,
}

impl From<RawContract> for OptionContract {
    fn from(raw: RawContract) -> Self {
        Self {
            contract_symbol: raw.contract_symbol,
            strike: raw.strike,
            last_price: raw.last_price,
            bid: raw.bid,
            ask: raw.ask,
            volume: raw.volume,
            open_interest: raw.open_interest,
            implied_volatility: raw.implied_volatility,
            in_the_money: raw.in_the_money,
        }
    }
}

fn timestamp_to_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

fn date_to_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Yahoo Finance options API client
///
/// 未指定 crumb 時，第一次請求前會先取得 session cookie 再向
/// `/v1/test/getcrumb` 要 crumb，結果在整個 client 生命週期內共用。
pub struct YahooClient {
    endpoint: Url,
    cookie_url: Url,
    crumb: OnceCell<Option<String>>,
    client: Client,
}

impl YahooClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::builder(endpoint).build()
    }

    pub fn builder(endpoint: &str) -> YahooClientBuilder {
        YahooClientBuilder {
            endpoint: endpoint.to_string(),
            cookie_url: None,
            crumb: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| EtlError::InvalidConfigValueError {
                field: "api_endpoint".to_string(),
                value: self.endpoint.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn options_url(&self, symbol: &str) -> Result<Url> {
        self.api_url(&["v7", "finance", "options", symbol])
    }

    async fn crumb(&self) -> Option<&str> {
        self.crumb
            .get_or_init(|| async {
                match self.request_crumb().await {
                    Ok(crumb) => {
                        tracing::debug!("🔑 Obtained provider crumb");
                        Some(crumb)
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Could not obtain provider crumb, continuing without it: {}", e);
                        None
                    }
                }
            })
            .await
            .as_deref()
    }

    async fn request_crumb(&self) -> Result<String> {
        // 只需要 Set-Cookie，狀態碼不重要
        tracing::debug!("🍪 Requesting session cookie: {}", self.cookie_url);
        self.client.get(self.cookie_url.clone()).send().await?;

        let url = self.api_url(&["v1", "test", "getcrumb"])?;
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::ApiStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() || crumb.contains(char::is_whitespace) {
            return Err(EtlError::ProcessingError {
                message: "Provider returned an invalid crumb".to_string(),
            });
        }
        Ok(crumb)
    }

    async fn fetch(&self, symbol: &str, date: Option<NaiveDate>) -> Result<Option<OptionResult>> {
        let url = self.options_url(symbol)?;
        let mut request = self.client.get(url.clone());
        if let Some(date) = date {
            request = request.query(&[("date", date_to_timestamp(date).to_string())]);
        }
        if let Some(crumb) = self.crumb().await {
            request = request.query(&[("crumb", crumb)]);
        }

        tracing::debug!("📡 Requesting option data: {} (date: {:?})", url, date);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        // 未知代號時 Yahoo 回 404 並附錯誤物件
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} not found at provider", symbol);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(EtlError::ApiStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let payload: OptionsResponse = serde_json::from_str(&body)?;
        if let Some(error) = &payload.option_chain.error {
            tracing::debug!(
                "Provider reported error for {}: {} {}",
                symbol,
                error.code.as_deref().unwrap_or("-"),
                error.description.as_deref().unwrap_or("")
            );
        }

        Ok(payload.option_chain.result.into_iter().next())
    }
}

#[async_trait]
impl QuoteProvider for YahooClient {
    async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>> {
        let Some(result) = self.fetch(symbol, None).await? else {
            return Ok(Vec::new());
        };

        let dates: Vec<NaiveDate> = result
            .expiration_dates
            .into_iter()
            .filter_map(timestamp_to_date)
            .collect();
        tracing::debug!("{} has {} listed expirations", symbol, dates.len());
        Ok(dates)
    }

    async fn option_chain(&self, symbol: &str, expiry: NaiveDate) -> Result<OptionChain> {
        let block = self
            .fetch(symbol, Some(expiry))
            .await?
            .and_then(|result| {
                result
                    .options
                    .into_iter()
                    .find(|block| timestamp_to_date(block.expiration_date) == Some(expiry))
            });

        let (calls, puts) = match block {
            Some(block) => (
                block.calls.into_iter().map(OptionContract::from).collect(),
                block.puts.into_iter().map(OptionContract::from).collect(),
            ),
            None => {
                tracing::debug!("Provider returned no chain for {} {}", symbol, expiry);
                (Vec::new(), Vec::new())
            }
        };

        Ok(OptionChain { expiry, calls, puts })
    }
}

pub struct YahooClientBuilder {
    endpoint: String,
    cookie_url: Option<String>,
    crumb: Option<String>,
    user_agent: String,
    timeout: Duration,
}

impl YahooClientBuilder {
    pub fn crumb(mut self, crumb: Option<String>) -> Self {
        self.crumb = crumb.filter(|c| !c.trim().is_empty());
        self
    }

    /// 預設：Yahoo 主機用 fc.yahoo.com，其他端點 (代理、測試) 用端點根目錄
    pub fn cookie_url(mut self, cookie_url: impl Into<String>) -> Self {
        self.cookie_url = Some(cookie_url.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<YahooClient> {
        let endpoint = Url::parse(&self.endpoint).map_err(|e| EtlError::InvalidConfigValueError {
            field: "api_endpoint".to_string(),
            value: self.endpoint.clone(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        let client = Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .cookie_store(true)
            .build()?;

        let cookie_url = match self.cookie_url {
            Some(cookie_url) => Url::parse(&cookie_url).map_err(|e| EtlError::InvalidConfigValueError {
                field: "cookie_url".to_string(),
                value: cookie_url.clone(),
                reason: format!("Invalid URL format: {}", e),
            })?,
            None if endpoint
                .host_str()
                .is_some_and(|host| host == "yahoo.com" || host.ends_with(".yahoo.com")) =>
            {
                Url::parse(DEFAULT_COOKIE_URL).map_err(|e| EtlError::ConfigError {
                    message: format!("Invalid default cookie URL: {}", e),
                })?
            }
            None => endpoint.join("/").map_err(|e| EtlError::ConfigError {
                message: format!("Cannot derive cookie URL from endpoint: {}", e),
            })?,
        };

        // 指定的 crumb 直接使用，不再向 provider 索取
        let crumb = match self.crumb {
            Some(crumb) => OnceCell::from(Some(crumb)),
            None => OnceCell::new(),
        };

        Ok(YahooClient {
            endpoint,
            cookie_url,
            crumb,
            client,
        })
    }
}
