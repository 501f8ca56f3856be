use crate::models::RunRecord;
use crate::param_space::{self, ParameterSpace};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const RUN_SNAPSHOT_VERSION: u32 = 1;
const SECRET_SETTING_KEYS: [&str; 1] = ["DASHBOARD_API_SECRET"];

#[derive(Serialize, Deserialize)]
struct RunSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    runs: Vec<RunRecord>,
    settings: HashMap<String, String>,
}

/// The run set the engine works on, with its parameter space derived up
/// front. The space is always recomputed from the runs rather than stored,
/// so a snapshot can never carry a stale one.
#[derive(Debug, Clone)]
pub struct RunData {
    pub runs: Vec<RunRecord>,
    pub space: ParameterSpace,
    pub settings: HashMap<String, String>,
}

impl RunData {
    pub fn from_runs(runs: Vec<RunRecord>, settings: HashMap<String, String>) -> Self {
        let space = param_space::derive(&runs);
        Self {
            runs,
            space,
            settings,
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open run snapshot at {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot: RunSnapshot =
            bincode::deserialize_from(reader).context("Run snapshot decode failed")?;

        if snapshot.version != RUN_SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Run snapshot version mismatch (found {}, expected {})",
                snapshot.version,
                RUN_SNAPSHOT_VERSION
            ));
        }

        info!(
            "Loaded {} runs from snapshot {} (generated {})",
            snapshot.runs.len(),
            path.display(),
            snapshot.generated_at
        );
        Ok(Self::from_runs(snapshot.runs, snapshot.settings))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Unable to create run snapshot at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let snapshot = RunSnapshot {
            version: RUN_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            runs: self.runs.clone(),
            settings: scrub_snapshot_settings(&self.settings),
        };
        bincode::serialize_into(&mut writer, &snapshot)
            .context("Failed to serialize run snapshot")?;
        writer.flush().context("Failed to flush run snapshot to disk")?;
        Ok(())
    }
}

fn scrub_snapshot_settings(settings: &HashMap<String, String>) -> HashMap<String, String> {
    settings
        .iter()
        .filter(|(key, _)| !SECRET_SETTING_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
