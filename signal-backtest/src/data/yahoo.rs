//! Yahoo Finance client for daily OHLCV history.
//!
//! Uses the public v8 chart endpoint. The client makes exactly one request
//! per call; retrying is left to the caller.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{clean_bars, PriceBar};

/// Yahoo chart API base URL.
const BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Error, Debug)]
pub enum YahooError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {code} - {description}")]
    Api { code: String, description: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("No data found for {symbol} between {start} and {end}. Check symbol and date range.")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooConfig {
    /// Rescale OHLC for splits and dividends using the adjusted close.
    #[serde(default = "default_true")]
    pub auto_adjust: bool,
    /// Bar interval; the research pipeline expects daily bars.
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> String {
    "1d".to_string()
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            auto_adjust: true,
            interval: default_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    #[serde(default)]
    adjclose: Vec<AdjCloseData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance price provider.
pub struct YahooClient {
    client: Client,
    base_url: String,
    config: YahooConfig,
}

impl YahooClient {
    pub fn new(config: YahooConfig) -> Result<Self, YahooError> {
        let client = Client::builder().user_agent("Mozilla/5.0").build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            config,
        })
    }

    /// Point the client at another host (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch cleaned daily bars for `[start, end)`.
    ///
    /// Fails with `YahooError::NoData` when the symbol/range yields no bars.
    pub async fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, YahooError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp().to_string();
        let period2 = end.and_time(NaiveTime::MIN).and_utc().timestamp().to_string();

        info!("Fetching {} from {} to {}", symbol, start, end);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", self.config.interval.as_str()),
                ("events", "div,splits"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: ChartResponse = response.json().await.map_err(|e| {
            YahooError::InvalidResponse(format!("Failed to parse response ({}): {}", status, e))
        })?;

        let bars = parse_chart(body, self.config.auto_adjust)?;
        debug!("Parsed {} bars for {}", bars.len(), symbol);

        require_bars(bars, symbol, start, end)
    }
}

/// Treat an empty download as missing data for the requested range.
pub fn require_bars(
    bars: Vec<PriceBar>,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PriceBar>, YahooError> {
    if bars.is_empty() {
        return Err(YahooError::NoData {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    Ok(bars)
}

/// Turn a chart payload into cleaned bars. Rows with any missing field are
/// dropped.
fn parse_chart(body: ChartResponse, auto_adjust: bool) -> Result<Vec<PriceBar>, YahooError> {
    if let Some(error) = body.chart.error {
        return Err(YahooError::Api {
            code: error.code,
            description: error.description,
        });
    }

    let Some(data) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| YahooError::InvalidResponse("No quote data".to_string()))?;
    let adjclose = data
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let offset = Duration::seconds(data.meta.gmtoffset);
    let mut bars = Vec::with_capacity(data.timestamp.len());

    for (i, &ts) in data.timestamp.iter().enumerate() {
        let Some(stamp) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        let date = (stamp + offset).date_naive();

        let field = |values: &[Option<f64>]| values.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
            field(&quote.volume),
        ) else {
            continue;
        };

        let factor = match field(&adjclose) {
            Some(adj) if auto_adjust && close != 0.0 => adj / close,
            _ => 1.0,
        };

        bars.push(PriceBar {
            date,
            open: open * factor,
            high: high * factor,
            low: low * factor,
            close: close * factor,
            volume,
        });
    }

    Ok(clean_bars(bars))
}
