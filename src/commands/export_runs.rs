use crate::context::AppContext;
use anyhow::Result;
use log::info;
use std::path::Path;

pub async fn run(app: &AppContext, output: &Path) -> Result<()> {
    let data = app.run_data(None).await?;
    data.save_to_file(output)?;
    info!(
        "Exported {} runs ({} parameters) to {}",
        data.runs.len(),
        data.space.len(),
        output.display()
    );
    Ok(())
}
