use crate::context::AppContext;
use crate::heatmap;
use crate::param_space::{ParamValue, ParameterSpace};
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub struct HeatmapArgs<'a> {
    pub param_x: &'a str,
    pub param_y: &'a str,
    pub metric: &'a str,
    pub slice_param: Option<&'a str>,
    pub slice_value: Option<&'a str>,
    pub animate: bool,
    pub data_file: Option<&'a Path>,
}

pub async fn run(app: &AppContext, args: HeatmapArgs<'_>) -> Result<()> {
    let data = app.run_data(args.data_file).await?;
    for axis in [args.param_x, args.param_y] {
        if !data.space.contains_key(axis) {
            return Err(anyhow!(
                "Parameter {} not present in the run set. Known parameters: {}",
                axis,
                data.space.keys().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
    }

    let metric_keys = &app.analytics().tracked_metrics;
    if !metric_keys.iter().any(|key| key == args.metric) {
        return Err(anyhow!(
            "Metric {} is not tracked. Tracked metrics: {}",
            args.metric,
            metric_keys.join(", ")
        ));
    }

    if args.animate {
        let slice_param = args
            .slice_param
            .ok_or_else(|| anyhow!("--animate requires --slice-param"))?;
        let all_frames = heatmap::frames(
            &data.runs,
            slice_param,
            &data.space,
            args.param_x,
            args.param_y,
            metric_keys,
        );
        info!(
            "Built {} heatmap frames over slice parameter {}",
            all_frames.len(),
            slice_param
        );
        for frame in &all_frames {
            println!("\n=== FRAME {} = {} ===", slice_param, frame.slice_value);
            print_cells(app, &frame.cells, args.metric);
        }
        println!();
        return Ok(());
    }

    let slice_value = match (args.slice_param, args.slice_value) {
        (Some(parameter), Some(raw)) => Some(resolve_slice_value(&data.space, parameter, raw)?),
        (Some(_), None) | (None, Some(_)) => {
            return Err(anyhow!(
                "--slice-param and --slice-value must be given together"
            ));
        }
        (None, None) => None,
    };

    let subset = heatmap::slice(&data.runs, args.slice_param, slice_value.as_ref());
    info!(
        "Aggregating heatmap over {} of {} runs",
        subset.len(),
        data.runs.len()
    );

    let cells = heatmap::aggregate(&subset, args.param_x, args.param_y, metric_keys);
    println!(
        "\n=== HEATMAP {} x {} ({}) ===\n",
        args.param_x, args.param_y, args.metric
    );
    print_cells(app, &cells, args.metric);
    println!();

    Ok(())
}

/// Match a raw CLI string against the observed values of a parameter. The
/// match is on display form, so `10` finds the number 10 but not a text "10"
/// unless only the text variant was observed.
pub fn resolve_slice_value(
    space: &ParameterSpace,
    parameter: &str,
    raw: &str,
) -> Result<ParamValue> {
    let values = space.get(parameter).ok_or_else(|| {
        anyhow!(
            "Parameter {} not present in the run set. Known parameters: {}",
            parameter,
            space.keys().cloned().collect::<Vec<_>>().join(", ")
        )
    })?;

    values
        .iter()
        .find(|value| value.to_string() == raw.trim())
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "Value {} never observed for parameter {}. Observed values: {}",
                raw,
                parameter,
                values
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

fn print_cells(app: &AppContext, cells: &[crate::heatmap::HeatmapCell], metric: &str) {
    let palette = &app.analytics().palette;
    let extent = heatmap::metric_extent(cells, metric);

    for cell in cells {
        let value = cell.metrics.get(metric).copied();
        let color = match extent {
            Some((min, max)) => palette.color_for(value, min, max),
            None => palette.absent,
        };
        println!(
            "  ({}, {}): {} = {:.4} over {} runs  [{}]",
            cell.x,
            cell.y,
            metric,
            value.unwrap_or(0.0),
            cell.count,
            color.to_hex()
        );
    }
}
