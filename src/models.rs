use crate::param_space::{ParamValue, ParameterSpace};
use crate::sensitivity::{SensitivityPoint, SensitivitySeries};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use std::collections::{BTreeMap, HashMap};

/// One backtest/training execution, as consumed by the aggregation engine.
/// Immutable snapshot: the engine never mutates a record after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub instance_id: Option<String>,
    pub parameters: HashMap<String, ParamValue>,
    pub metrics: HashMap<String, f64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One closed trade belonging to a run, ordered by exit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(alias = "pnlNet")]
    pub pnl_net: f64,
    #[serde(alias = "exitTime")]
    pub exit_time: DateTime<Utc>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Cumulative P&L at a 1-based ordinal position along a run's trade history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub value: f64,
}

/// Headline statistics for one run, derived from its closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub net_profit: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub total_trades: i32,
}

/// Everything the comparison view needs for one entity, assembled once and
/// cached by id. `run_count` is set for instance entries only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub stats: RunStats,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub run_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSearchRequest {
    pub parameters: BTreeMap<String, ParameterRange>,
    pub target_metric: String,
}

/// A grid-search result set, with any server-precomputed derivations already
/// converted to the engine's own types.
#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    pub runs: Vec<RunRecord>,
    pub space: Option<ParameterSpace>,
    pub sensitivity: Option<Vec<SensitivitySeries>>,
}

// --- wire shapes ---------------------------------------------------------
//
// The dashboard API sends parameter/metric maps either inline or as an
// encoded `*_json` string. Normalization is lossy but never fatal: fields the
// engine cannot use are skipped with a warning and contribute nothing.

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRunRow {
    #[serde(alias = "id", alias = "runId")]
    pub run_id: String,
    #[serde(default, alias = "instanceId")]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default, alias = "parametersJson")]
    pub parameters_json: Option<String>,
    #[serde(default)]
    pub metrics: Option<Value>,
    #[serde(default, alias = "metricsJson")]
    pub metrics_json: Option<String>,
    #[serde(default, alias = "equityCurve")]
    pub equity_curve: Option<Vec<ApiEquityPoint>>,
    #[serde(default, alias = "createdAt", alias = "start_utc", alias = "startUtc")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEquityPoint {
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub pnl: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGridSearchResponse {
    pub runs: Vec<ApiRunRow>,
    #[serde(default)]
    pub parameter_space: Option<BTreeMap<String, Vec<Value>>>,
    #[serde(default)]
    pub sensitivity: Option<Vec<ApiSensitivitySeries>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSensitivitySeries {
    pub parameter: String,
    pub series: Vec<ApiSensitivityPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSensitivityPoint {
    pub value: Value,
    pub metrics: BTreeMap<String, f64>,
}

impl ApiRunRow {
    pub fn into_run_record(self) -> RunRecord {
        let run_id = self.run_id;
        let parameters = resolve_json_map(
            self.parameters,
            self.parameters_json.as_deref(),
            &run_id,
            "parameters",
        )
        .map(normalize_parameter_map)
        .unwrap_or_default();
        let metrics = resolve_json_map(
            self.metrics,
            self.metrics_json.as_deref(),
            &run_id,
            "metrics",
        )
        .map(normalize_metric_map)
        .unwrap_or_default();

        RunRecord {
            run_id,
            instance_id: self.instance_id,
            parameters,
            metrics,
            created_at: self.created_at,
        }
    }

    /// A precomputed curve shipped with the listing, if the backend sent one.
    pub fn equity_points(&self) -> Option<Vec<EquityPoint>> {
        let points = self.equity_curve.as_ref()?;
        if points.is_empty() {
            return None;
        }
        Some(
            points
                .iter()
                .enumerate()
                .map(|(i, point)| EquityPoint {
                    index: i + 1,
                    value: point.pnl,
                })
                .collect(),
        )
    }
}

impl ApiGridSearchResponse {
    pub fn into_outcome(self) -> GridSearchOutcome {
        let runs = self
            .runs
            .into_iter()
            .map(ApiRunRow::into_run_record)
            .collect();

        let space = self.parameter_space.map(|raw| {
            raw.into_iter()
                .map(|(parameter, values)| {
                    let converted = values
                        .iter()
                        .filter_map(|value| {
                            let converted = ParamValue::from_json(value);
                            if converted.is_none() {
                                warn!(
                                    "Skipping unsupported value {} in server parameter space for `{}`",
                                    value, parameter
                                );
                            }
                            converted
                        })
                        .collect();
                    (parameter, converted)
                })
                .collect()
        });

        let sensitivity = self.sensitivity.map(|series_list| {
            series_list
                .into_iter()
                .map(|series| SensitivitySeries {
                    parameter: series.parameter,
                    series: series
                        .series
                        .into_iter()
                        .filter_map(|point| {
                            ParamValue::from_json(&point.value).map(|value| SensitivityPoint {
                                value,
                                metrics: point.metrics,
                            })
                        })
                        .collect(),
                })
                .collect()
        });

        GridSearchOutcome {
            runs,
            space,
            sensitivity,
        }
    }
}

fn resolve_json_map(
    inline: Option<Value>,
    encoded: Option<&str>,
    run_id: &str,
    label: &str,
) -> Option<JsonMap<String, Value>> {
    match inline {
        Some(Value::Object(map)) => return Some(map),
        Some(Value::Null) | None => {}
        Some(other) => {
            warn!("Run {} has non-object {} field: {}", run_id, label, other);
        }
    }

    let raw = encoded?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(
                "Run {} has non-object {}_json payload: {}",
                run_id, label, other
            );
            None
        }
        Err(error) => {
            warn!(
                "Run {} has invalid {}_json payload: {}",
                run_id, label, error
            );
            None
        }
    }
}

pub fn normalize_parameter_map(raw: JsonMap<String, Value>) -> HashMap<String, ParamValue> {
    let mut cleaned = HashMap::with_capacity(raw.len());

    for (key, value) in raw {
        match ParamValue::from_json(&value) {
            Some(converted) => {
                cleaned.insert(key, converted);
            }
            None => {
                warn!(
                    "Skipping parameter `{}` due to unsupported value {}",
                    key, value
                );
            }
        }
    }

    cleaned
}

pub fn normalize_metric_map(raw: JsonMap<String, Value>) -> HashMap<String, f64> {
    let mut cleaned = HashMap::with_capacity(raw.len());

    for (key, value) in raw {
        if let Some(num) = value.as_f64() {
            if num.is_finite() {
                cleaned.insert(key, num);
            } else {
                warn!("Skipping metric `{}` due to non-finite value {}", key, value);
            }
            continue;
        }

        if let Some(text) = value.as_str() {
            match text.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => {
                    cleaned.insert(key, parsed);
                }
                _ => warn!(
                    "Skipping metric `{}` due to non-numeric value {}",
                    key, value
                ),
            }
            continue;
        }

        warn!("Skipping metric `{}` due to unsupported value {}", key, value);
    }

    cleaned
}
