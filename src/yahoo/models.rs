use serde::Deserialize;

/// Response structure for the batched quote endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEnvelope {
    pub quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub result: Vec<YahooQuote>,
}

/// One quote as returned by the quote and screener endpoints.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuote {
    pub symbol: String,
    pub quote_type: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub currency: Option<String>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    pub earnings_timestamp: Option<i64>,
    pub earnings_timestamp_start: Option<i64>,
}

impl YahooQuote {
    pub fn is_equity(&self) -> bool {
        self.quote_type.as_deref() == Some("EQUITY")
    }
}

#[derive(Debug, Deserialize)]
pub struct ScreenerEnvelope {
    pub finance: ScreenerFinance,
}

#[derive(Debug, Deserialize)]
pub struct ScreenerFinance {
    #[serde(default)]
    pub result: Option<Vec<ScreenerResult>>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenerResult {
    #[serde(default)]
    pub quotes: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub quotes: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub symbol: Option<String>,
    #[serde(rename = "quoteType")]
    pub quote_type: Option<String>,
    pub longname: Option<String>,
    pub shortname: Option<String>,
    pub sector: Option<String>,
}

/// quoteSummary restricted to the assetProfile module
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEnvelope {
    pub quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
pub struct SummaryBody {
    #[serde(default)]
    pub result: Option<Vec<SummaryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
pub struct AssetProfile {
    pub sector: Option<String>,
}
