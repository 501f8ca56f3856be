use analytics::{
    commands::{compare, export_runs, grid_search, heatmap, sensitivity},
    context::AppContext,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

const DEFAULT_RUN_DATA_FILE: &str = "../data/run-data.bin";

#[derive(Parser)]
#[command(name = "analytics")]
#[command(about = "Aggregation engine for strategy run analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average tracked metrics per parameter value across all runs
    Sensitivity {
        /// Restrict output to one parameter
        parameter: Option<String>,
        /// Path to a run data snapshot file instead of the dashboard API
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
    },
    /// Aggregate runs into a 2-D metric grid over two parameters
    Heatmap {
        /// Parameter on the x axis
        param_x: String,
        /// Parameter on the y axis
        param_y: String,
        /// Metric to shade the grid by
        #[arg(long, default_value = "sharpe_ratio")]
        metric: String,
        /// Third parameter to slice the run set by
        #[arg(long = "slice-param")]
        slice_param: Option<String>,
        /// Value of the slice parameter to keep
        #[arg(long = "slice-value")]
        slice_value: Option<String>,
        /// Emit one frame per value of the slice parameter
        #[arg(long)]
        animate: bool,
        /// Path to a run data snapshot file instead of the dashboard API
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
    },
    /// Compare runs (or instances) side by side
    Compare {
        /// Run or instance ids to compare
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        /// Treat ids as instance ids and average their runs
        #[arg(long)]
        instances: bool,
    },
    /// Trigger a backend grid search and analyze the resulting runs
    GridSearch {
        /// Parameter range as name=min:max:step (repeatable)
        #[arg(long = "param", required = true)]
        params: Vec<String>,
        /// Metric the search optimizes for
        #[arg(long, default_value = "sharpe_ratio")]
        metric: String,
        /// Save the resulting runs as a snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Export the current run set as a snapshot for offline analysis
    ExportRuns {
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app_context = AppContext::from_env()?;
    info!("Starting analytics engine");

    match cli.command {
        Commands::Sensitivity {
            parameter,
            data_file,
        } => {
            sensitivity::run(&app_context, parameter.as_deref(), data_file.as_deref()).await?;
        }
        Commands::Heatmap {
            param_x,
            param_y,
            metric,
            slice_param,
            slice_value,
            animate,
            data_file,
        } => {
            heatmap::run(
                &app_context,
                heatmap::HeatmapArgs {
                    param_x: &param_x,
                    param_y: &param_y,
                    metric: &metric,
                    slice_param: slice_param.as_deref(),
                    slice_value: slice_value.as_deref(),
                    animate,
                    data_file: data_file.as_deref(),
                },
            )
            .await?;
        }
        Commands::Compare { ids, instances } => {
            compare::run(&app_context, &ids, instances).await?;
        }
        Commands::GridSearch {
            params,
            metric,
            output,
        } => {
            grid_search::run(&app_context, &params, &metric, output.as_deref()).await?;
        }
        Commands::ExportRuns { output } => {
            let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_RUN_DATA_FILE));
            export_runs::run(&app_context, &output_path).await?;
        }
    }

    Ok(())
}
