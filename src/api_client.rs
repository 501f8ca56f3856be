use crate::comparison;
use crate::config::AnalyticsSettings;
use crate::equity;
use crate::models::{
    ApiGridSearchResponse, ApiRunRow, ComparisonEntry, GridSearchOutcome, GridSearchRequest,
    RunRecord, TradeRecord,
};
use anyhow::{anyhow, Context, Result};
use futures::future;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 2048;

pub fn build_async_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("failed to build HTTP client")
}

/// HTTP client for the dashboard API that backs the analytics engine.
#[derive(Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
    api_secret: Option<String>,
}

impl DashboardClient {
    pub fn new(settings: &AnalyticsSettings) -> Result<Self> {
        let base_url = settings
            .api_base_url
            .clone()
            .ok_or_else(|| anyhow!("No dashboard API configured; set DASHBOARD_API_URL or DASHBOARD_DOMAIN"))?;
        let api_secret = settings
            .api_secret
            .clone()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            http: build_async_client(Some(settings.request_timeout))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_secret,
        })
    }

    pub async fn fetch_runs(&self) -> Result<Vec<RunRecord>> {
        let rows: Vec<ApiRunRow> = self.get_json("/runs").await?;
        Ok(rows.into_iter().map(ApiRunRow::into_run_record).collect())
    }

    pub async fn fetch_run(&self, run_id: &str) -> Result<ApiRunRow> {
        self.get_json(&format!("/runs/{}", run_id)).await
    }

    pub async fn fetch_trades(&self, run_id: &str) -> Result<Vec<TradeRecord>> {
        self.get_json(&format!("/runs/{}/trades", run_id)).await
    }

    pub async fn fetch_instance_runs(&self, instance_id: &str) -> Result<Vec<ApiRunRow>> {
        self.get_json(&format!("/instances/{}/runs", instance_id))
            .await
    }

    /// Everything the comparison view needs for one run: its trades, an
    /// equity curve (the backend's precomputed one when present) and the
    /// derived stats.
    pub async fn fetch_run_entry(&self, run_id: &str) -> Result<ComparisonEntry> {
        let row = self.fetch_run(run_id).await?;
        let trades = self.fetch_trades(run_id).await?;

        let equity_curve = row
            .equity_points()
            .unwrap_or_else(|| equity::build_equity_curve(&trades));
        let stats = equity::compute_run_stats(&trades, &equity_curve);

        Ok(ComparisonEntry {
            stats,
            trades,
            equity_curve,
            run_count: None,
        })
    }

    /// Comparison entry for an instance: every run of the instance fetched
    /// concurrently, then collapsed into one aggregate.
    pub async fn fetch_instance_entry(&self, instance_id: &str) -> Result<ComparisonEntry> {
        let rows = self.fetch_instance_runs(instance_id).await?;
        if rows.is_empty() {
            return Err(anyhow!("Instance {} has no runs", instance_id));
        }

        let fetches = rows.iter().map(|row| self.fetch_run_entry(&row.run_id));
        let entries: Vec<ComparisonEntry> = future::try_join_all(fetches)
            .await
            .with_context(|| format!("failed to load runs of instance {}", instance_id))?;

        Ok(comparison::aggregate_instance(entries))
    }

    pub async fn trigger_grid_search(&self, request: &GridSearchRequest) -> Result<GridSearchOutcome> {
        let response: ApiGridSearchResponse = self.post_json("/grid-search", request).await?;
        Ok(response.into_outcome())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = with_retry(&url, || {
            let mut request = self.http.get(&url);
            if let Some(secret) = self.api_secret.as_deref() {
                request = request.header("x-dashboard-secret", secret);
            }
            request.send()
        })
        .await?;
        decode_response(response, &url).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = with_retry(&url, || {
            let mut request = self.http.post(&url).json(body);
            if let Some(secret) = self.api_secret.as_deref() {
                request = request.header("x-dashboard-secret", secret);
            }
            request.send()
        })
        .await?;
        decode_response(response, &url).await
    }
}

/// Retry transport-level failures with exponential backoff and jitter. A
/// response that arrived, whatever its status, is returned to the caller
/// without retrying.
async fn with_retry<F, Fut>(url: &str, mut operation: F) -> Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
{
    const MAX_RETRIES: usize = 3;
    const BASE_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 5000;

    let mut last_error = None;

    for attempt in 0..=MAX_RETRIES {
        match operation().await {
            Ok(response) => return Ok(response),
            Err(e) => {
                last_error = Some(e);
                if attempt < MAX_RETRIES {
                    let delay_ms = (BASE_DELAY_MS * 2_u64.pow(attempt as u32)).min(MAX_DELAY_MS);
                    let jitter_range = (delay_ms as f64 * 0.25) as u64;
                    let jitter = fastrand::u64(0..=jitter_range * 2);
                    let final_delay = delay_ms.saturating_sub(jitter_range).saturating_add(jitter);
                    log::debug!(
                        "Request to {} failed (attempt {}), retrying in {}ms",
                        url,
                        attempt + 1,
                        final_delay
                    );
                    tokio::time::sleep(Duration::from_millis(final_delay)).await;
                }
            }
        }
    }

    Err(last_error
        .map(anyhow::Error::from)
        .unwrap_or_else(|| anyhow!("request to {} exhausted retries", url)))
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!(
            "API request failed: status={} url={} body={}",
            status,
            url,
            truncate_for_log(&body, MAX_ERROR_BODY_CHARS)
        ));
    }
    response
        .json::<T>()
        .await
        .with_context(|| format!("failed to decode response from {}", url))
}

fn truncate_for_log(value: &str, max_chars: usize) -> String {
    let trimmed = value.trim();
    let mut iter = trimmed.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = iter.next() else {
            return trimmed.to_string();
        };
        out.push(ch);
    }
    if iter.next().is_some() {
        out.push('…');
    }
    out
}
