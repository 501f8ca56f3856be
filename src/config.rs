use crate::colors::{Palette, Rgb};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::time::Duration;

const API_URL_KEY: &str = "DASHBOARD_API_URL";
const DOMAIN_KEY: &str = "DASHBOARD_DOMAIN";
const SECRET_KEY: &str = "DASHBOARD_API_SECRET";
const LOCAL_DOMAIN_PREFIXES: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// Metrics tracked by every aggregation unless overridden via
/// TRACKED_METRICS.
pub const DEFAULT_TRACKED_METRICS: [&str; 4] =
    ["sharpe_ratio", "profit_factor", "net_profit", "win_rate"];

/// Runtime settings for the analytics engine, built from a key/value settings
/// map (normally the process environment).
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    pub tracked_metrics: Vec<String>,
    pub palette: Palette,
    pub request_timeout: Duration,
    pub api_base_url: Option<String>,
    pub api_secret: Option<String>,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            tracked_metrics: DEFAULT_TRACKED_METRICS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            palette: Palette::default(),
            request_timeout: Duration::from_secs(30),
            api_base_url: None,
            api_secret: None,
        }
    }
}

impl AnalyticsSettings {
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let mut resolved = Self::default();

        if let Some(raw) = optional_setting(settings, "TRACKED_METRICS") {
            let metrics: Vec<String> = raw
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect();
            if metrics.is_empty() {
                return Err(anyhow!(
                    "Setting TRACKED_METRICS must name at least one metric (value: {})",
                    raw
                ));
            }
            resolved.tracked_metrics = metrics;
        }

        if let Some(raw) = optional_setting(settings, "REQUEST_TIMEOUT_SECONDS") {
            let seconds = raw.parse::<u64>().map_err(|_| {
                anyhow!(
                    "Setting REQUEST_TIMEOUT_SECONDS must be a positive integer (value: {})",
                    raw
                )
            })?;
            if seconds == 0 {
                return Err(anyhow!("Setting REQUEST_TIMEOUT_SECONDS must be > 0"));
            }
            resolved.request_timeout = Duration::from_secs(seconds);
        }

        resolved.palette = palette_from_settings(settings, resolved.palette)?;
        resolved.api_base_url = resolve_api_base_url(settings);
        resolved.api_secret = optional_setting(settings, SECRET_KEY).map(str::to_string);

        Ok(resolved)
    }
}

/// Snapshot of the process environment as a settings map.
pub fn settings_from_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn palette_from_settings(settings: &HashMap<String, String>, base: Palette) -> Result<Palette> {
    let parse = |key: &str, fallback: Rgb| -> Result<Rgb> {
        match optional_setting(settings, key) {
            Some(raw) => Rgb::parse_hex(raw)
                .map_err(|_| anyhow!("Setting {} must be a #rrggbb color (value: {})", key, raw)),
            None => Ok(fallback),
        }
    };

    Ok(Palette {
        low: parse("HEATMAP_COLOR_LOW", base.low)?,
        mid: parse("HEATMAP_COLOR_MID", base.mid)?,
        high: parse("HEATMAP_COLOR_HIGH", base.high)?,
        absent: parse("HEATMAP_COLOR_ABSENT", base.absent)?,
    })
}

fn is_local_domain(value: &str) -> bool {
    let lower = value.to_lowercase();
    LOCAL_DOMAIN_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn normalize_domain(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://")
        || trimmed.contains('/')
        || trimmed.contains('?')
        || trimmed.contains('#')
        || trimmed.contains(':')
    {
        return None;
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// Base URL of the dashboard API. An explicit DASHBOARD_API_URL wins; failing
/// that, DASHBOARD_DOMAIN is expanded to `http(s)://<domain>/api` with http
/// reserved for local domains.
pub fn resolve_api_base_url(settings: &HashMap<String, String>) -> Option<String> {
    if let Some(url) = optional_setting(settings, API_URL_KEY) {
        return Some(url.trim_end_matches('/').to_string());
    }

    let domain = settings
        .get(DOMAIN_KEY)
        .and_then(|value| normalize_domain(Some(value.as_str())))?;
    let scheme = if is_local_domain(&domain) {
        "http"
    } else {
        "https"
    };
    Some(format!("{}://{}/api", scheme, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_track_the_four_headline_metrics() {
        let settings = AnalyticsSettings::from_settings_map(&HashMap::new()).unwrap();
        assert_eq!(
            settings.tracked_metrics,
            vec!["sharpe_ratio", "profit_factor", "net_profit", "win_rate"]
        );
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert!(settings.api_base_url.is_none());
    }

    #[test]
    fn tracked_metrics_override_is_parsed_and_trimmed() {
        let settings = AnalyticsSettings::from_settings_map(&map(&[(
            "TRACKED_METRICS",
            " net_profit , max_drawdown ,",
        )]))
        .unwrap();
        assert_eq!(settings.tracked_metrics, vec!["net_profit", "max_drawdown"]);
    }

    #[test]
    fn empty_tracked_metrics_override_is_rejected() {
        assert!(AnalyticsSettings::from_settings_map(&map(&[("TRACKED_METRICS", " , ")])).is_err());
    }

    #[test]
    fn explicit_api_url_wins_over_domain() {
        let settings = map(&[
            ("DASHBOARD_API_URL", "http://127.0.0.1:9000/api/"),
            ("DASHBOARD_DOMAIN", "dash.example.com"),
        ]);
        assert_eq!(
            resolve_api_base_url(&settings),
            Some("http://127.0.0.1:9000/api".to_string())
        );
    }

    #[test]
    fn domain_expands_with_scheme_by_locality() {
        assert_eq!(
            resolve_api_base_url(&map(&[("DASHBOARD_DOMAIN", "dash.example.com")])),
            Some("https://dash.example.com/api".to_string())
        );
        assert_eq!(
            resolve_api_base_url(&map(&[("DASHBOARD_DOMAIN", "localhost")])),
            Some("http://localhost/api".to_string())
        );
        assert_eq!(resolve_api_base_url(&map(&[("DASHBOARD_DOMAIN", "bad/path")])), None);
    }

    #[test]
    fn palette_overrides_apply_per_stop() {
        let settings = AnalyticsSettings::from_settings_map(&map(&[(
            "HEATMAP_COLOR_HIGH",
            "#0000ff",
        )]))
        .unwrap();
        assert_eq!(settings.palette.high, Rgb::new(0, 0, 0xff));
        assert_eq!(settings.palette.low, Palette::default().low);
    }

    #[test]
    fn bad_palette_color_is_an_error() {
        assert!(
            AnalyticsSettings::from_settings_map(&map(&[("HEATMAP_COLOR_LOW", "red")])).is_err()
        );
    }
}
