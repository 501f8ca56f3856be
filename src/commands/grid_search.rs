use crate::context::AppContext;
use crate::models::{GridSearchRequest, ParameterRange};
use crate::param_space::{self, format_number};
use crate::sensitivity;
use anyhow::{anyhow, Result};
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

pub async fn run(
    app: &AppContext,
    raw_params: &[String],
    target_metric: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut parameters = BTreeMap::new();
    for raw in raw_params {
        let (name, range) = parse_param_range(raw)?;
        parameters.insert(name, range);
    }
    if parameters.is_empty() {
        return Err(anyhow!("At least one --param name=min:max:step is required"));
    }

    let request = GridSearchRequest {
        parameters,
        target_metric: target_metric.to_string(),
    };
    info!(
        "Triggering grid search over {} parameters targeting {}",
        request.parameters.len(),
        target_metric
    );

    let client = app.client()?;
    let outcome = client.trigger_grid_search(&request).await?;
    info!("Grid search produced {} runs", outcome.runs.len());

    // The backend may ship its own derivations; compute locally otherwise.
    let space = outcome
        .space
        .unwrap_or_else(|| param_space::derive(&outcome.runs));
    let results = outcome.sensitivity.unwrap_or_else(|| {
        sensitivity::analyze(&outcome.runs, &space, &app.analytics().tracked_metrics)
    });

    println!("\n=== GRID SEARCH: {} runs ===\n", outcome.runs.len());
    for (parameter, values) in &space {
        println!(
            "  {}: {}",
            parameter,
            values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    for series in &results {
        println!("\n  Sensitivity of {}:", series.parameter);
        for point in &series.series {
            let target = point.metrics.get(target_metric).copied().unwrap_or(0.0);
            println!("    {} -> {} = {:.4}", point.value, target_metric, target);
        }
    }
    println!();

    if let Some(path) = output {
        let data = crate::run_data::RunData::from_runs(outcome.runs, app.settings().clone());
        data.save_to_file(path)?;
        info!("Saved grid search runs to {}", path.display());
    }

    Ok(())
}

/// Parse a `name=min:max:step` range argument.
fn parse_param_range(raw: &str) -> Result<(String, ParameterRange)> {
    let (name, range_spec) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected name=min:max:step (value: {})", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Parameter name must not be empty (value: {})", raw));
    }

    let parts: Vec<&str> = range_spec.split(':').collect();
    if parts.len() != 3 {
        return Err(anyhow!("Expected name=min:max:step (value: {})", raw));
    }
    let parse = |part: &str| -> Result<f64> {
        let value = part
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("Range bounds must be numbers (value: {})", raw))?;
        if !value.is_finite() {
            return Err(anyhow!("Range bounds must be finite (value: {})", raw));
        }
        Ok(value)
    };

    let range = ParameterRange {
        min: parse(parts[0])?,
        max: parse(parts[1])?,
        step: parse(parts[2])?,
    };
    if range.step <= 0.0 {
        return Err(anyhow!(
            "Range step must be > 0 (value: {})",
            format_number(range.step)
        ));
    }
    if range.max < range.min {
        return Err(anyhow!(
            "Range max {} must be >= min {}",
            format_number(range.max),
            format_number(range.min)
        ));
    }

    Ok((name.to_string(), range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_ranges_parse() {
        let (name, range) = parse_param_range("stop_loss=5:25:5").unwrap();
        assert_eq!(name, "stop_loss");
        assert_eq!(range.min, 5.0);
        assert_eq!(range.max, 25.0);
        assert_eq!(range.step, 5.0);
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        assert!(parse_param_range("stop_loss").is_err());
        assert!(parse_param_range("stop_loss=5:25").is_err());
        assert!(parse_param_range("=5:25:5").is_err());
        assert!(parse_param_range("stop_loss=5:25:0").is_err());
        assert!(parse_param_range("stop_loss=25:5:5").is_err());
        assert!(parse_param_range("stop_loss=a:b:c").is_err());
    }
}
