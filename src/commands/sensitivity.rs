use crate::context::AppContext;
use crate::sensitivity;
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub async fn run(app: &AppContext, parameter: Option<&str>, data_file: Option<&Path>) -> Result<()> {
    let data = app.run_data(data_file).await?;
    info!(
        "Analyzing sensitivity over {} runs and {} parameters",
        data.runs.len(),
        data.space.len()
    );

    let metric_keys = &app.analytics().tracked_metrics;
    let results = sensitivity::analyze(&data.runs, &data.space, metric_keys);

    let selected: Vec<_> = match parameter {
        Some(name) => {
            let series = results
                .into_iter()
                .find(|series| series.parameter == name)
                .ok_or_else(|| {
                    anyhow!(
                        "Parameter {} not present in the run set. Known parameters: {}",
                        name,
                        data.space.keys().cloned().collect::<Vec<_>>().join(", ")
                    )
                })?;
            vec![series]
        }
        None => results,
    };

    for series in &selected {
        println!("\n=== SENSITIVITY: {} ===\n", series.parameter);
        for point in &series.series {
            println!("  {} = {}:", series.parameter, point.value);
            for (metric, mean) in &point.metrics {
                println!("    {}: {:.4}", metric, mean);
            }
        }
    }
    println!();

    Ok(())
}
