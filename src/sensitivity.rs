use crate::models::RunRecord;
use crate::param_space::{ParamValue, ParameterSpace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean of each tracked metric at one observed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub value: ParamValue,
    pub metrics: BTreeMap<String, f64>,
}

/// Sensitivity curve for one parameter, one point per distinct observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySeries {
    pub parameter: String,
    pub series: Vec<SensitivityPoint>,
}

/// For each parameter in the space and each of its observed values, average
/// the tracked metrics over the runs holding exactly that value.
///
/// Matching uses strict value equality, so a numeric 5 and a string "5" select
/// disjoint run subsets. Absent metrics contribute 0 to the mean, and a value
/// with no matching runs yields 0 for every metric rather than NaN, which
/// keeps downstream chart axes stable. Results are accumulated at full
/// precision and rounded to four decimal digits at the end.
pub fn analyze(
    runs: &[RunRecord],
    space: &ParameterSpace,
    metric_keys: &[String],
) -> Vec<SensitivitySeries> {
    space
        .iter()
        .map(|(parameter, values)| {
            let series = values
                .iter()
                .map(|value| {
                    let matching: Vec<&RunRecord> = runs
                        .iter()
                        .filter(|run| run.parameters.get(parameter) == Some(value))
                        .collect();

                    let mut metrics = BTreeMap::new();
                    for key in metric_keys {
                        let mean = if matching.is_empty() {
                            0.0
                        } else {
                            let sum: f64 = matching
                                .iter()
                                .map(|run| run.metrics.get(key).copied().unwrap_or(0.0))
                                .sum();
                            sum / matching.len() as f64
                        };
                        metrics.insert(key.clone(), round4(mean));
                    }

                    SensitivityPoint {
                        value: value.clone(),
                        metrics,
                    }
                })
                .collect();

            SensitivitySeries {
                parameter: parameter.clone(),
                series,
            }
        })
        .collect()
}

pub(crate) fn round4(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10_000.0).round() / 10_000.0
    } else {
        0.0
    }
}
