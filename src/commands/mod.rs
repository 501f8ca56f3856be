pub mod compare;
pub mod export_runs;
pub mod grid_search;
pub mod heatmap;
pub mod sensitivity;
