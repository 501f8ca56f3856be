use crate::models::RunRecord;
use crate::param_space::{ParamValue, ParameterSpace};
use crate::sensitivity::round4;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One heatmap grid cell: the (x, y) parameter pair, the number of runs that
/// landed in it, and the mean of each tracked metric over those runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub x: ParamValue,
    pub y: ParamValue,
    pub count: usize,
    pub metrics: BTreeMap<String, f64>,
}

/// One animation frame: the full grid restricted to runs carrying
/// `slice_value` for the slice parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapFrame {
    pub slice_value: ParamValue,
    pub cells: Vec<HeatmapCell>,
}

#[derive(Default)]
struct CellAccumulator {
    count: usize,
    sums: Vec<f64>,
}

/// Bucket runs by their (param_x, param_y) value pair and average the tracked
/// metrics per bucket.
///
/// Runs missing either axis parameter are skipped entirely. A zero or false
/// value is a real value, only genuinely absent keys drop a run. Metric sums
/// are kept at full precision until a single final division, and cells sort
/// on their display strings so the output is stable across calls.
pub fn aggregate(
    runs: &[RunRecord],
    param_x: &str,
    param_y: &str,
    metric_keys: &[String],
) -> Vec<HeatmapCell> {
    let mut buckets: HashMap<(ParamValue, ParamValue), CellAccumulator> = HashMap::new();

    for run in runs {
        let (Some(x), Some(y)) = (run.parameters.get(param_x), run.parameters.get(param_y)) else {
            continue;
        };
        let acc = buckets
            .entry((x.clone(), y.clone()))
            .or_insert_with(|| CellAccumulator {
                count: 0,
                sums: vec![0.0; metric_keys.len()],
            });
        acc.count += 1;
        for (slot, key) in acc.sums.iter_mut().zip(metric_keys) {
            *slot += run.metrics.get(key).copied().unwrap_or(0.0);
        }
    }

    let mut cells: Vec<HeatmapCell> = buckets
        .into_iter()
        .map(|((x, y), acc)| {
            let metrics = metric_keys
                .iter()
                .zip(&acc.sums)
                .map(|(key, sum)| (key.clone(), round4(sum / acc.count as f64)))
                .collect();
            HeatmapCell {
                x,
                y,
                count: acc.count,
                metrics,
            }
        })
        .collect();

    cells.sort_by(|a, b| {
        (a.x.to_string(), a.y.to_string()).cmp(&(b.x.to_string(), b.y.to_string()))
    });
    cells
}

/// Restrict runs to those carrying `slice_value` for `slice_param`. With no
/// slice configured the whole set passes through unchanged.
pub fn slice(
    runs: &[RunRecord],
    slice_param: Option<&str>,
    slice_value: Option<&ParamValue>,
) -> Vec<RunRecord> {
    match (slice_param, slice_value) {
        (Some(parameter), Some(value)) => runs
            .iter()
            .filter(|run| run.parameters.get(parameter) == Some(value))
            .cloned()
            .collect(),
        _ => runs.to_vec(),
    }
}

/// Build one frame per observed value of the slice parameter, in the space's
/// sorted value order. Frames are independent, so they aggregate in parallel.
pub fn frames(
    runs: &[RunRecord],
    slice_param: &str,
    space: &ParameterSpace,
    param_x: &str,
    param_y: &str,
    metric_keys: &[String],
) -> Vec<HeatmapFrame> {
    let Some(values) = space.get(slice_param) else {
        return Vec::new();
    };

    values
        .par_iter()
        .map(|value| {
            let subset = slice(runs, Some(slice_param), Some(value));
            HeatmapFrame {
                slice_value: value.clone(),
                cells: aggregate(&subset, param_x, param_y, metric_keys),
            }
        })
        .collect()
}

/// Min and max of one metric over a cell set, for color shading. None when
/// there are no cells.
pub fn metric_extent(cells: &[HeatmapCell], key: &str) -> Option<(f64, f64)> {
    let mut extent: Option<(f64, f64)> = None;
    for cell in cells {
        let Some(&value) = cell.metrics.get(key) else {
            continue;
        };
        extent = Some(match extent {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }
    extent
}
