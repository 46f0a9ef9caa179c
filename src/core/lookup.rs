use crate::domain::model::{OptionChain, OptionQuote, OptionRequest};
use crate::domain::ports::QuoteProvider;
use crate::utils::error::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// 履約價比對容許誤差 (浮點數往返誤差)
pub const STRIKE_TOLERANCE: f64 = 1e-6;

#[derive(Default)]
struct LookupCache {
    expirations: HashMap<String, Arc<Vec<NaiveDate>>>,
    chains: HashMap<(String, NaiveDate), Arc<OptionChain>>,
}

/// 依請求挑出對應合約；同一次執行內快取到期日與期權鏈
pub struct QuoteLookup<Q: QuoteProvider> {
    provider: Q,
    request_delay: Duration,
    cache: Mutex<LookupCache>,
    requests_made: AtomicUsize,
}

impl<Q: QuoteProvider> QuoteLookup<Q> {
    pub fn new(provider: Q) -> Self {
        Self {
            provider,
            request_delay: Duration::ZERO,
            cache: Mutex::new(LookupCache::default()),
            requests_made: AtomicUsize::new(0),
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn provider(&self) -> &Q {
        &self.provider
    }

    pub fn requests_made(&self) -> usize {
        self.requests_made.load(Ordering::SeqCst)
    }

    /// 找不到到期日或履約價時回傳 Ok(None)
    pub async fn find_quote(&self, request: &OptionRequest) -> Result<Option<OptionQuote>> {
        let expirations = self.expirations(&request.symbol).await?;
        if !expirations.contains(&request.expiry) {
            tracing::debug!(
                "{} has no expiry {} (available: {})",
                request.symbol,
                request.expiry,
                expirations.len()
            );
            return Ok(None);
        }

        let chain = self.chain(&request.symbol, request.expiry).await?;
        let quote = chain
            .side(request.kind)
            .iter()
            .find(|contract| (contract.strike - request.strike).abs() < STRIKE_TOLERANCE)
            .map(OptionQuote::from);

        if quote.is_none() {
            tracing::debug!(
                "No {} strike {} in {} chain for {}",
                request.kind,
                request.strike,
                request.symbol,
                request.expiry
            );
        }
        Ok(quote)
    }

    async fn expirations(&self, symbol: &str) -> Result<Arc<Vec<NaiveDate>>> {
        if let Some(cached) = self.cache.lock().await.expirations.get(symbol) {
            return Ok(Arc::clone(cached));
        }

        self.pace().await;
        let expirations = Arc::new(self.provider.expirations(symbol).await?);
        self.cache
            .lock()
            .await
            .expirations
            .insert(symbol.to_string(), Arc::clone(&expirations));
        Ok(expirations)
    }

    async fn chain(&self, symbol: &str, expiry: NaiveDate) -> Result<Arc<OptionChain>> {
        let key = (symbol.to_string(), expiry);
        if let Some(cached) = self.cache.lock().await.chains.get(&key) {
            return Ok(Arc::clone(cached));
        }

        self.pace().await;
        let chain = Arc::new(self.provider.option_chain(symbol, expiry).await?);
        self.cache.lock().await.chains.insert(key, Arc::clone(&chain));
        Ok(chain)
    }

    // 第一個請求之後，每次呼叫前等待固定間隔
    async fn pace(&self) {
        let previous = self.requests_made.fetch_add(1, Ordering::SeqCst);
        if previous > 0 && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{OptionContract, OptionKind};
    use crate::utils::error::EtlError;
    use async_trait::async_trait;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(symbol: &str, strike: f64, last: f64) -> OptionContract {
        OptionContract {
            contract_symbol: symbol.to_string(),
            strike,
            last_price: Some(last),
            bid: Some(last - 0.05),
            ask: Some(last + 0.05),
            volume: None,
            open_interest: None,
            implied_volatility: None,
            in_the_money: false,
        }
    }

    #[derive(Default)]
    struct MockProvider {
        expiration_calls: AtomicUsize,
        chain_calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>> {
            self.expiration_calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "AAPL" => Ok(vec![date(2025, 1, 17), date(2025, 2, 21)]),
                "DOWN" => Err(EtlError::ApiStatusError {
                    status: 503,
                    url: "mock".to_string(),
                }),
                _ => Ok(vec![]),
            }
        }

        async fn option_chain(&self, _symbol: &str, expiry: NaiveDate) -> Result<OptionChain> {
            self.chain_calls.fetch_add(1, Ordering::SeqCst);
            Ok(OptionChain {
                expiry,
                calls: vec![contract("AAPL250117C00150000", 150.0, 80.1)],
                puts: vec![
                    contract("AAPL250117P00150000", 150.0, 0.5),
                    contract("AAPL250117P00152500", 152.5, 0.7),
                ],
            })
        }
    }

    fn request(symbol: &str, expiry: NaiveDate, kind: OptionKind, strike: f64) -> OptionRequest {
        OptionRequest {
            symbol: symbol.to_string(),
            expiry,
            kind,
            strike,
        }
    }

    #[tokio::test]
    async fn test_find_quote_picks_side_and_strike() {
        let lookup = QuoteLookup::new(MockProvider::default());

        let call = lookup
            .find_quote(&request("AAPL", date(2025, 1, 17), OptionKind::Call, 150.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(call.contract_symbol, "AAPL250117C00150000");
        assert_eq!(call.last_price, Some(80.1));

        let put = lookup
            .find_quote(&request("AAPL", date(2025, 1, 17), OptionKind::Put, 152.5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(put.contract_symbol, "AAPL250117P00152500");
    }

    #[tokio::test]
    async fn test_missing_expiry_or_strike_is_none() {
        let lookup = QuoteLookup::new(MockProvider::default());

        let missing_expiry = lookup
            .find_quote(&request("AAPL", date(2025, 1, 24), OptionKind::Call, 150.0))
            .await
            .unwrap();
        assert!(missing_expiry.is_none());
        assert_eq!(lookup.provider().chain_calls.load(Ordering::SeqCst), 0);

        let missing_strike = lookup
            .find_quote(&request("AAPL", date(2025, 1, 17), OptionKind::Call, 155.0))
            .await
            .unwrap();
        assert!(missing_strike.is_none());

        let unknown_symbol = lookup
            .find_quote(&request("ZZZZ", date(2025, 1, 17), OptionKind::Call, 1.0))
            .await
            .unwrap();
        assert!(unknown_symbol.is_none());
    }

    #[tokio::test]
    async fn test_chains_are_cached_per_expiry() {
        let lookup = QuoteLookup::new(MockProvider::default());
        let expiry = date(2025, 1, 17);

        for (kind, strike) in [(OptionKind::Call, 150.0), (OptionKind::Put, 150.0), (OptionKind::Put, 152.5)] {
            lookup
                .find_quote(&request("AAPL", expiry, kind, strike))
                .await
                .unwrap();
        }
        lookup
            .find_quote(&request("AAPL", date(2025, 2, 21), OptionKind::Call, 150.0))
            .await
            .unwrap();

        assert_eq!(lookup.provider().expiration_calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.provider().chain_calls.load(Ordering::SeqCst), 2);
        assert_eq!(lookup.requests_made(), 3);
    }

    #[tokio::test]
    async fn test_provider_errors_are_not_cached() {
        let lookup = QuoteLookup::new(MockProvider::default());
        let req = request("DOWN", date(2025, 1, 17), OptionKind::Call, 150.0);

        assert!(lookup.find_quote(&req).await.is_err());
        assert!(lookup.find_quote(&req).await.is_err());
        assert_eq!(lookup.provider().expiration_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_request_delay_applies_between_requests() {
        let lookup = QuoteLookup::new(MockProvider::default())
            .with_request_delay(Duration::from_millis(20));
        let started = std::time::Instant::now();

        lookup
            .find_quote(&request("AAPL", date(2025, 1, 17), OptionKind::Call, 150.0))
            .await
            .unwrap();

        // 兩個請求之間只等待一次
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_request_count_readable_while_pacing() {
        let lookup = QuoteLookup::new(MockProvider::default())
            .with_request_delay(Duration::from_millis(100));
        let req = request("AAPL", date(2025, 1, 17), OptionKind::Call, 150.0);

        let (quote, during) = tokio::join!(lookup.find_quote(&req), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            lookup.requests_made()
        });

        assert!(quote.unwrap().is_some());
        // 第二個請求 (期權鏈) 已計數，正在等待間隔
        assert_eq!(during, 2);
        assert_eq!(lookup.requests_made(), 2);
    }
}
