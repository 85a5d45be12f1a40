//! Polygon 프로바이더 HTTP 동작 테스트 (mockito).

use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use futures::TryStreamExt;
use mockito::Matcher;
use rust_decimal_macros::dec;
use trader_core::{Granularity, Ticker, TimespanUnit};
use trader_exchange::{
    BarsRequest, HolidayOracle, HolidayStatus, MarketDataProvider, PolygonConfig,
    PolygonProvider, ProviderError,
};

fn provider(server: &mockito::Server) -> PolygonProvider {
    let config = PolygonConfig::new("test-key")
        .with_base_url(server.url())
        .with_timeout(Duration::from_secs(5));
    PolygonProvider::new(config).unwrap()
}

fn aapl() -> Ticker {
    Ticker::new("AAPL").unwrap()
}

fn day_request() -> BarsRequest {
    BarsRequest {
        ticker: aapl(),
        granularity: Granularity::new(1, TimespanUnit::Minute).unwrap(),
        from: Utc.with_ymd_and_hms(2023, 6, 2, 0, 0, 0).unwrap(),
        to: Utc.with_ymd_and_hms(2023, 6, 2, 23, 59, 59).unwrap() + chrono::Duration::milliseconds(999),
    }
}

const AGGS_PATH: &str = "/v2/aggs/ticker/AAPL/range/1/minute/1685664000000/1685750399999";

#[tokio::test]
async fn test_ticker_metadata_parsed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/reference/tickers/AAPL")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("date".into(), "2023-06-02".into()),
            Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{
                "status": "OK",
                "results": {
                    "ticker": "AAPL",
                    "name": "Apple Inc.",
                    "market": "stocks",
                    "locale": "us",
                    "primary_exchange": "XNAS",
                    "active": true,
                    "currency_name": "usd",
                    "cik": "0000320193",
                    "composite_figi": "BBG000B9XRY4",
                    "share_class_figi": "BBG001S5N8V8",
                    "last_updated_utc": "2023-06-02T00:00:00Z"
                }
            }"#,
        )
        .create_async()
        .await;

    let date = NaiveDate::from_ymd_opt(2023, 6, 2).unwrap();
    let meta = provider(&server)
        .fetch_ticker_metadata(&aapl(), date)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(meta.active);
    assert_eq!(meta.name, "Apple Inc.");
    assert_eq!(meta.observation_date, date);
    assert_eq!(meta.primary_exchange.as_deref(), Some("XNAS"));
    assert_eq!(meta.cik.as_deref(), Some("0000320193"));
    assert!(meta.last_updated_utc.is_some());
}

#[tokio::test]
async fn test_bars_follow_next_url() {
    let mut server = mockito::Server::new_async().await;
    let next_url = format!("{}{}?cursor=page2", server.url(), AGGS_PATH);

    let first = server
        .mock("GET", AGGS_PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("adjusted".into(), "true".into()),
            Matcher::UrlEncoded("sort".into(), "desc".into()),
            Matcher::UrlEncoded("limit".into(), "50000".into()),
            Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
        ]))
        .with_status(200)
        .with_body(format!(
            r#"{{
                "results": [
                    {{"t": 1685714520000, "o": 180.5, "h": 181.0, "l": 180.1, "c": 180.9, "v": 1200, "vw": 180.6, "n": 31}},
                    {{"t": 1685714460000, "o": 180.2, "h": 180.6, "l": 180.0, "c": 180.5, "v": 900.0}}
                ],
                "next_url": "{next_url}"
            }}"#
        ))
        .create_async()
        .await;

    let second = server
        .mock("GET", AGGS_PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("cursor".into(), "page2".into()),
            Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"results": [{"t": 1685714400000, "o": 180.0, "h": 180.3, "l": 179.8, "c": 180.2, "v": 1500}]}"#,
        )
        .create_async()
        .await;

    let provider = provider(&server);
    let bars: Vec<_> = provider.fetch_bars(&day_request()).try_collect().await.unwrap();

    first.assert_async().await;
    second.assert_async().await;

    assert_eq!(bars.len(), 3);
    assert!(bars.windows(2).all(|w| w[0].timestamp_millis > w[1].timestamp_millis));
    assert_eq!(bars[0].close, dec!(180.9));
    assert_eq!(bars[0].volume, 1200);
    assert_eq!(bars[0].transactions, Some(31));
    assert_eq!(bars[1].volume_weighted_price, None);
}

#[tokio::test]
async fn test_rate_limited_maps_retry_after() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v3/reference/tickers/AAPL")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("Retry-After", "7")
        .create_async()
        .await;

    let err = provider(&server)
        .fetch_ticker_metadata(&aapl(), NaiveDate::from_ymd_opt(2023, 6, 2).unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::RateLimited {
            retry_after: Duration::from_secs(7)
        }
    );
}

#[tokio::test]
async fn test_status_classification() {
    let mut server = mockito::Server::new_async().await;
    let date = NaiveDate::from_ymd_opt(2023, 6, 2).unwrap();

    server
        .mock("GET", "/v3/reference/tickers/NOPE")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"status":"NOT_FOUND"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v3/reference/tickers/BUSY")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    server
        .mock("GET", "/v3/reference/tickers/AUTH")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"status":"ERROR","error":"Unknown API Key"}"#)
        .create_async()
        .await;

    let provider = provider(&server);
    let fetch = |t: &str| {
        let ticker = Ticker::new(t).unwrap();
        let provider = &provider;
        async move { provider.fetch_ticker_metadata(&ticker, date).await }
    };

    assert!(matches!(fetch("NOPE").await, Err(ProviderError::NotFound(_))));
    assert!(matches!(fetch("BUSY").await, Err(ProviderError::Transient(_))));
    let auth = fetch("AUTH").await.unwrap_err();
    assert!(matches!(auth, ProviderError::InvalidRequest(_)));
    assert!(!auth.to_string().contains("test-key"));
}

#[tokio::test]
async fn test_page_error_terminates_stream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", AGGS_PATH)
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let provider = provider(&server);
    let mut stream = provider.fetch_bars(&day_request());

    let first = stream.try_next().await;
    assert!(matches!(first, Err(ProviderError::Transient(_))));
    assert!(futures::StreamExt::next(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_invalid_bar_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", AGGS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"results": [{"t": 1685714400000, "o": 10, "h": 9, "l": 11, "c": 10, "v": 1}]}"#)
        .create_async()
        .await;

    let provider = provider(&server);
    let result: Result<Vec<_>, _> = provider.fetch_bars(&day_request()).try_collect().await;
    assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_upcoming_holidays() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/marketstatus/upcoming")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[
                {"exchange": "NYSE", "name": "Juneteenth", "date": "2023-06-19", "status": "closed"},
                {"exchange": "NASDAQ", "name": "Independence Day", "date": "2023-07-03", "status": "early-close",
                 "open": "2023-07-03T13:30:00.000Z", "close": "2023-07-03T17:00:00.000Z"}
            ]"#,
        )
        .create_async()
        .await;

    let holidays = provider(&server).upcoming_holidays().await.unwrap();
    assert_eq!(holidays.len(), 2);
    assert_eq!(holidays[0].status, HolidayStatus::Closed);
    assert_eq!(holidays[1].status, HolidayStatus::EarlyClose);
    assert_eq!(holidays[0].date, NaiveDate::from_ymd_opt(2023, 6, 19).unwrap());
}
