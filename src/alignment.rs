use crate::models::EquityPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An equity curve labelled with the run or instance id it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCurve {
    pub id: String,
    pub points: Vec<EquityPoint>,
}

/// One index of the aligned chart: the value each curve holds there and,
/// when at least two curves are shown, the mean over contributing curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPoint {
    pub index: usize,
    pub values: BTreeMap<String, f64>,
    pub average: Option<f64>,
}

/// Put curves of differing lengths onto one shared 1-based index axis.
///
/// A curve shorter than the longest one is extended by forward-filling its
/// final value, which reads as the strategy going flat after its last trade.
/// An empty curve never contributes. The average is computed over whatever
/// curves contribute at each index and is omitted entirely when fewer than
/// two curves are being aligned.
pub fn align(curves: &[NamedCurve]) -> Vec<AlignedPoint> {
    let max_len = curves.iter().map(|curve| curve.points.len()).max().unwrap_or(0);
    let want_average = curves.len() >= 2;

    (0..max_len)
        .map(|i| {
            let mut values = BTreeMap::new();
            for curve in curves {
                let point = curve.points.get(i).or_else(|| curve.points.last());
                if let Some(point) = point {
                    values.insert(curve.id.clone(), point.value);
                }
            }

            let average = if want_average && !values.is_empty() {
                Some(values.values().sum::<f64>() / values.len() as f64)
            } else {
                None
            };

            AlignedPoint {
                index: i + 1,
                values,
                average,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(id: &str, values: &[f64]) -> NamedCurve {
        NamedCurve {
            id: id.to_string(),
            points: values
                .iter()
                .enumerate()
                .map(|(i, &value)| EquityPoint {
                    index: i + 1,
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn short_curves_forward_fill_their_last_value() {
        let aligned = align(&[curve("a", &[10.0, 20.0, 30.0]), curve("b", &[5.0])]);
        assert_eq!(aligned.len(), 3);

        assert_eq!(aligned[0].values["b"], 5.0);
        assert_eq!(aligned[1].values["b"], 5.0);
        assert_eq!(aligned[2].values["b"], 5.0);

        assert_eq!(aligned[0].average, Some(7.5));
        assert_eq!(aligned[1].average, Some(12.5));
        assert_eq!(aligned[2].average, Some(17.5));
    }

    #[test]
    fn indices_start_at_one() {
        let aligned = align(&[curve("a", &[1.0, 2.0])]);
        let indices: Vec<usize> = aligned.iter().map(|point| point.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn single_curve_has_no_average() {
        let aligned = align(&[curve("a", &[10.0, 20.0])]);
        assert!(aligned.iter().all(|point| point.average.is_none()));
        assert_eq!(aligned[1].values["a"], 20.0);
    }

    #[test]
    fn empty_curve_never_contributes() {
        let aligned = align(&[curve("a", &[10.0, 20.0]), curve("b", &[])]);
        assert_eq!(aligned.len(), 2);
        assert!(!aligned[0].values.contains_key("b"));
        // Average runs over contributing curves only.
        assert_eq!(aligned[0].average, Some(10.0));
        assert_eq!(aligned[1].average, Some(20.0));
    }

    #[test]
    fn no_curves_yields_no_points() {
        assert!(align(&[]).is_empty());
        assert!(align(&[curve("a", &[])]).is_empty());
    }
}
