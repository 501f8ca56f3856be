use crate::api_client::DashboardClient;
use crate::config::{self, AnalyticsSettings};
use crate::run_data::RunData;
use anyhow::Result;
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Process-wide wiring: the raw settings map plus the parsed analytics
/// configuration derived from it.
#[derive(Clone)]
pub struct AppContext {
    settings: HashMap<String, String>,
    analytics: AnalyticsSettings,
}

impl AppContext {
    pub fn initialize(settings: HashMap<String, String>) -> Result<Self> {
        let analytics = AnalyticsSettings::from_settings_map(&settings)?;
        Ok(Self {
            settings,
            analytics,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::initialize(config::settings_from_env())
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn analytics(&self) -> &AnalyticsSettings {
        &self.analytics
    }

    pub fn client(&self) -> Result<DashboardClient> {
        DashboardClient::new(&self.analytics)
    }

    /// The run set to analyze: a local snapshot when one was given, the
    /// dashboard API otherwise.
    pub async fn run_data(&self, data_file: Option<&Path>) -> Result<RunData> {
        match data_file {
            Some(path) => RunData::load_from_file(path),
            None => {
                let client = self.client()?;
                info!("Fetching runs from the dashboard API");
                let runs = client.fetch_runs().await?;
                info!("Fetched {} runs", runs.len());
                Ok(RunData::from_runs(runs, self.settings.clone()))
            }
        }
    }
}
