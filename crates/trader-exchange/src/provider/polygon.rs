//! Polygon.io REST 프로바이더.
//!
//! ## 엔드포인트
//!
//! - 종목 상세: `GET /v3/reference/tickers/{ticker}?date=YYYY-MM-DD`
//! - 집계 바: `GET /v2/aggs/ticker/{ticker}/range/{multiplier}/{timespan}/{from}/{to}`
//!   (`adjusted=true&sort=desc&limit=50000`, `next_url`로 다음 페이지)
//! - 휴장일: `GET /v1/marketstatus/upcoming`
//!
//! API 키는 `apiKey` 쿼리 파라미터로 전달하며 로그와 에러 메시지에 남기지 않습니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use trader_core::{Bar, Ticker, TickerMetadata};

use super::{
    BarStream, BarsRequest, HolidayOracle, HolidayStatus, MarketDataProvider, MarketHoliday,
};
use crate::error::ProviderError;

/// 기본 API 주소
pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// 페이지당 최대 바 수
const PAGE_LIMIT: u32 = 50_000;

/// `Retry-After` 헤더가 없을 때 대기 시간
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

// ============================================================================
// 설정
// ============================================================================

#[derive(Clone)]
pub struct PolygonConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PolygonConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PolygonConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: Option<TickerDetails>,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    ticker: String,
    #[serde(default)]
    name: String,
    market: Option<String>,
    locale: Option<String>,
    primary_exchange: Option<String>,
    #[serde(default)]
    active: bool,
    currency_name: Option<String>,
    cik: Option<String>,
    composite_figi: Option<String>,
    share_class_figi: Option<String>,
    last_updated_utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    /// 구간 시작 (epoch ms)
    t: i64,
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
    v: f64,
    vw: Option<Decimal>,
    n: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UpcomingHoliday {
    exchange: String,
    name: String,
    date: NaiveDate,
    status: String,
}

impl TickerDetails {
    fn into_metadata(self, date: NaiveDate) -> Result<TickerMetadata, ProviderError> {
        let ticker = Ticker::new(&self.ticker)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let last_updated_utc = self
            .last_updated_utc
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(TickerMetadata {
            ticker,
            observation_date: date,
            name: self.name,
            market: self.market,
            primary_exchange: self.primary_exchange,
            active: self.active,
            currency_name: self.currency_name,
            locale: self.locale,
            cik: self.cik,
            composite_figi: self.composite_figi,
            share_class_figi: self.share_class_figi,
            last_updated_utc,
        })
    }
}

impl AggregateBar {
    fn into_bar(self, ticker: &Ticker) -> Result<Bar, ProviderError> {
        if !self.v.is_finite() || self.v < 0.0 {
            return Err(ProviderError::MalformedResponse(format!(
                "잘못된 거래량: {} (ts={})",
                self.v, self.t
            )));
        }

        Bar::builder(ticker.clone(), self.t)
            .ohlc(self.o, self.h, self.l, self.c)
            .volume(self.v.round() as u64)
            .volume_weighted_price(self.vw)
            .transactions(self.n)
            .build()
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

// ============================================================================
// 클라이언트
// ============================================================================

/// Polygon.io 프로바이더.
#[derive(Debug, Clone)]
pub struct PolygonProvider {
    client: Client,
    config: PolygonConfig,
}

impl PolygonProvider {
    pub fn new(config: PolygonConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::InvalidRequest(e.without_url().to_string()))?;
        Ok(Self { client, config })
    }

    fn aggregates_url(&self, request: &BarsRequest) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.config.base_url,
            request.ticker,
            request.granularity.multiplier(),
            request.granularity.unit(),
            request.from.timestamp_millis(),
            request.to.timestamp_millis(),
        )
    }

    /// GET 요청 후 JSON 디코딩. 상태 코드를 [`ProviderError`]로 분류합니다.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("apiKey", self.config.api_key.expose_secret())])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.without_url().to_string()))?;

        let response = check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transient(e.without_url().to_string()))?;

        serde_json::from_slice(&body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

/// HTTP 상태 코드 분류.
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(ProviderError::RateLimited { retry_after });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = format!("Polygon API {}: {}", status.as_u16(), body.trim());

    Err(match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            ProviderError::Transient(message)
        }
        _ => ProviderError::InvalidRequest(message),
    })
}

#[async_trait]
impl MarketDataProvider for PolygonProvider {
    fn name(&self) -> &str {
        "polygon"
    }

    #[instrument(skip(self), fields(ticker = %ticker, date = %date))]
    async fn fetch_ticker_metadata(
        &self,
        ticker: &Ticker,
        date: NaiveDate,
    ) -> Result<TickerMetadata, ProviderError> {
        let url = format!("{}/v3/reference/tickers/{}", self.config.base_url, ticker);
        let response: TickerDetailsResponse = self
            .get_json(&url, &[("date", date.format("%Y-%m-%d").to_string())])
            .await?;

        let details = response
            .results
            .ok_or_else(|| ProviderError::NotFound(format!("{} ({})", ticker, date)))?;
        details.into_metadata(date)
    }

    fn fetch_bars<'a>(&'a self, request: &BarsRequest) -> BarStream<'a> {
        let ticker = request.ticker.clone();
        let first_page = self.aggregates_url(request);

        // (다음 요청 URL, 첫 페이지 여부). 이후 페이지는 next_url에 쿼리가 포함됨
        let pages = stream::try_unfold(Some((first_page, true)), move |cursor| {
            let ticker = ticker.clone();
            async move {
                let Some((url, is_first)) = cursor else {
                    return Ok(None);
                };

                let query = if is_first {
                    vec![
                        ("adjusted", "true".to_string()),
                        ("sort", "desc".to_string()),
                        ("limit", PAGE_LIMIT.to_string()),
                    ]
                } else {
                    Vec::new()
                };

                let page: AggregatesResponse = self.get_json(&url, &query).await?;
                debug!(
                    ticker = %ticker,
                    count = page.results.len(),
                    has_next = page.next_url.is_some(),
                    "바 페이지 수신"
                );

                let bars = page
                    .results
                    .into_iter()
                    .map(|raw| raw.into_bar(&ticker))
                    .collect::<Result<Vec<_>, _>>()?;
                let next = page.next_url.map(|next| (next, false));

                let page_stream =
                    stream::iter(bars.into_iter().map(Ok::<Bar, ProviderError>));
                Ok::<_, ProviderError>(Some((page_stream, next)))
            }
        });

        pages.try_flatten().boxed()
    }
}

#[async_trait]
impl HolidayOracle for PolygonProvider {
    async fn upcoming_holidays(&self) -> Result<Vec<MarketHoliday>, ProviderError> {
        let url = format!("{}/v1/marketstatus/upcoming", self.config.base_url);
        let raw: Vec<UpcomingHoliday> = self.get_json(&url, &[]).await?;

        Ok(raw
            .into_iter()
            .map(|h| MarketHoliday {
                exchange: h.exchange,
                name: h.name,
                date: h.date,
                status: if h.status.eq_ignore_ascii_case("early-close") {
                    HolidayStatus::EarlyClose
                } else {
                    HolidayStatus::Closed
                },
            })
            .collect())
    }
}
