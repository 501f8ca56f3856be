use crate::models::RunRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single observed parameter value.
///
/// Equality is strict across variants: the number 5 and the string "5" never
/// group together. Callers that want them merged must normalize upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// Map from parameter name to the sorted, deduplicated values observed for it.
/// Keyed by a `BTreeMap` so iteration order is stable across calls.
pub type ParameterSpace = BTreeMap<String, Vec<ParamValue>>;

impl ParamValue {
    /// Best-effort conversion of a raw JSON scalar. Non-finite numbers, empty
    /// strings and composite values yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        if let Some(num) = value.as_f64() {
            return num.is_finite().then_some(Self::Number(num));
        }
        if let Some(boolean) = value.as_bool() {
            return Some(Self::Bool(boolean));
        }
        if let Some(text) = value.as_str() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(Self::Text(trimmed.to_string()));
        }
        None
    }

    /// Numeric coercion used for ordering: finite numbers as-is, parseable
    /// finite strings, bools as 1/0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => value.is_finite().then_some(*value),
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite()),
            Self::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Bool(_) => 2,
        }
    }
}

fn number_bits(value: f64) -> u64 {
    // Collapse -0.0 and 0.0 so they group into one cell.
    if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => number_bits(*a) == number_bits(*b),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            Self::Number(value) => number_bits(*value).hash(state),
            Self::Text(text) => text.hash(state),
            Self::Bool(flag) => flag.hash(state),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => f.write_str(&format_number(*value)),
            Self::Text(text) => f.write_str(text),
            Self::Bool(flag) => write!(f, "{}", flag),
        }
    }
}

/// Format a numeric parameter value without trailing zeros, e.g. 2.5000 -> "2.5".
pub fn format_number(value: f64) -> String {
    let formatted = format!("{:.4}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Scan a run collection and build the parameter space from scratch.
///
/// Duplicate values collapse, runs without parameters contribute nothing, and
/// the result is rebuilt wholesale on every call so a grid-search re-run can
/// never leave stale entries behind.
pub fn derive(runs: &[RunRecord]) -> ParameterSpace {
    let mut observed: BTreeMap<String, HashSet<ParamValue>> = BTreeMap::new();

    for run in runs {
        for (name, value) in &run.parameters {
            observed.entry(name.clone()).or_default().insert(value.clone());
        }
    }

    observed
        .into_iter()
        .map(|(name, values)| {
            let mut values: Vec<ParamValue> = values.into_iter().collect();
            sort_values(&mut values);
            (name, values)
        })
        .collect()
}

/// Sort observed values ascending: numerically when every value coerces to a
/// finite number, lexicographically by display string otherwise.
pub fn sort_values(values: &mut [ParamValue]) {
    let all_numeric = values.iter().all(|value| value.as_number().is_some());

    values.sort_by(|a, b| {
        let primary = if all_numeric {
            let left = a.as_number().unwrap_or(f64::NAN);
            let right = b.as_number().unwrap_or(f64::NAN);
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        } else {
            a.to_string().cmp(&b.to_string())
        };
        // Tie-break so equal keys (e.g. 5 vs "5") land in a fixed order.
        primary
            .then_with(|| a.to_string().cmp(&b.to_string()))
            .then_with(|| a.variant_rank().cmp(&b.variant_rank()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn run_with(parameters: Vec<(&str, ParamValue)>) -> RunRecord {
        static NEXT_ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
        let id = NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        RunRecord {
            run_id: format!("run_{}", id),
            instance_id: None,
            parameters: parameters
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            metrics: HashMap::new(),
            created_at: None,
        }
    }

    #[test]
    fn orders_numeric_strings_numerically() {
        let runs = vec![
            run_with(vec![("period", ParamValue::Text("10".into()))]),
            run_with(vec![("period", ParamValue::Text("2".into()))]),
            run_with(vec![("period", ParamValue::Text("1".into()))]),
        ];

        let space = derive(&runs);
        let values: Vec<String> = space["period"].iter().map(|v| v.to_string()).collect();
        assert_eq!(values, vec!["1", "2", "10"]);
    }

    #[test]
    fn orders_plain_strings_lexicographically() {
        let runs = vec![
            run_with(vec![("mode", ParamValue::Text("b".into()))]),
            run_with(vec![("mode", ParamValue::Text("a".into()))]),
            run_with(vec![("mode", ParamValue::Text("c".into()))]),
        ];

        let space = derive(&runs);
        let values: Vec<String> = space["mode"].iter().map(|v| v.to_string()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn mixed_values_fall_back_to_lexicographic() {
        let runs = vec![
            run_with(vec![("mix", ParamValue::Text("a".into()))]),
            run_with(vec![("mix", ParamValue::Text("1".into()))]),
        ];

        let space = derive(&runs);
        let values: Vec<String> = space["mix"].iter().map(|v| v.to_string()).collect();
        assert_eq!(values, vec!["1", "a"]);
    }

    #[test]
    fn duplicate_values_collapse() {
        let runs = vec![
            run_with(vec![("stop_loss", ParamValue::Number(10.0))]),
            run_with(vec![("stop_loss", ParamValue::Number(10.0))]),
            run_with(vec![("stop_loss", ParamValue::Number(20.0))]),
        ];

        let space = derive(&runs);
        assert_eq!(space["stop_loss"].len(), 2);
    }

    #[test]
    fn number_and_text_with_same_digits_stay_distinct() {
        let runs = vec![
            run_with(vec![("k", ParamValue::Number(5.0))]),
            run_with(vec![("k", ParamValue::Text("5".into()))]),
        ];

        let space = derive(&runs);
        assert_eq!(space["k"].len(), 2);
        assert_ne!(ParamValue::Number(5.0), ParamValue::Text("5".into()));
    }

    #[test]
    fn derive_is_idempotent() {
        let runs = vec![
            run_with(vec![
                ("stop_loss", ParamValue::Number(10.0)),
                ("trailing", ParamValue::Bool(true)),
            ]),
            run_with(vec![("stop_loss", ParamValue::Number(5.0))]),
        ];

        assert_eq!(derive(&runs), derive(&runs));
    }

    #[test]
    fn empty_input_yields_empty_space() {
        assert!(derive(&[]).is_empty());
    }

    #[test]
    fn zero_values_group_regardless_of_sign() {
        assert_eq!(ParamValue::Number(0.0), ParamValue::Number(-0.0));
    }

    #[test]
    fn numeric_formatting_trims_trailing_zeros() {
        assert_eq!(format_number(2.5000), "2.5");
        assert_eq!(format_number(-0.00001), "0");
        assert_eq!(format_number(10.0), "10");
    }
}
