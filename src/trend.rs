use crate::models::{ProgrammeRecord, Trend};

/// Minimum number of yearly values before a directional claim is made.
const MIN_HISTORY: usize = 3;
/// First-to-last movement beyond this marks a rising or falling cutoff.
const DIRECTION_THRESHOLD: f64 = 1.5;
/// Spread beyond this, with flat endpoints, marks a volatile cutoff.
const VOLATILITY_SPREAD: f64 = 3.0;

/// Positive yearly cutoffs in chronological order (2018 to 2024), with the
/// matching years. Null and non-positive entries are dropped; the relative
/// order of the rest is preserved.
pub fn cutoff_history(record: &ProgrammeRecord) -> (Vec<f64>, Vec<i32>) {
    let mut values = Vec::new();
    let mut years = Vec::new();

    for (year, cutoff) in record.yearly_cutoffs() {
        if let Some(value) = cutoff {
            if value > 0.0 {
                values.push(value);
                years.push(year);
            }
        }
    }

    (values, years)
}

/// Derive a trend label from a chronological cutoff history.
///
/// Fewer than three data points carry no directional signal and read as
/// Stable. Otherwise the first-to-last delta decides Rising/Falling, and a
/// wide spread with flat endpoints reads as Volatile.
pub fn analyze(history: &[f64]) -> Trend {
    if history.len() < MIN_HISTORY {
        return Trend::Stable;
    }

    let first = history[0];
    let last = history[history.len() - 1];
    let delta = last - first;

    if delta > DIRECTION_THRESHOLD {
        Trend::Rising
    } else if delta < -DIRECTION_THRESHOLD {
        Trend::Falling
    } else {
        let max = history.iter().fold(f64::NEG_INFINITY, |acc, v| acc.max(*v));
        let min = history.iter().fold(f64::INFINITY, |acc, v| acc.min(*v));
        if max - min > VOLATILITY_SPREAD {
            Trend::Volatile
        } else {
            Trend::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_when_delta_exceeds_threshold() {
        assert_eq!(analyze(&[20.0, 21.0, 22.0, 23.0, 24.6]), Trend::Rising);
    }

    #[test]
    fn falling_when_delta_drops_below_threshold() {
        assert_eq!(analyze(&[30.0, 29.0, 25.0]), Trend::Falling);
    }

    #[test]
    fn volatile_when_spread_is_wide_but_endpoints_flat() {
        assert_eq!(analyze(&[20.0, 26.0, 20.0, 26.0, 20.0]), Trend::Volatile);
    }

    #[test]
    fn stable_when_movement_is_small() {
        assert_eq!(analyze(&[20.0, 21.0, 20.5]), Trend::Stable);
    }

    #[test]
    fn short_history_is_stable_regardless_of_values() {
        assert_eq!(analyze(&[10.0, 48.0]), Trend::Stable);
        assert_eq!(analyze(&[48.0]), Trend::Stable);
        assert_eq!(analyze(&[]), Trend::Stable);
    }

    #[test]
    fn delta_exactly_at_threshold_is_not_directional() {
        // delta 1.5 and spread 1.5: neither rising nor volatile
        assert_eq!(analyze(&[20.0, 20.5, 21.5]), Trend::Stable);
    }

    #[test]
    fn history_drops_nulls_and_non_positive_values() {
        let record = ProgrammeRecord {
            code: "1263145".to_string(),
            institution: "UNIVERSITY OF NAIROBI".to_string(),
            name: "BACHELOR OF SCIENCE (GEOSPATIAL ENGINEERING)".to_string(),
            cluster: "Cluster 7".to_string(),
            cutoff_2018: Some(21.0),
            cutoff_2019: None,
            cutoff_2020: Some(0.0),
            cutoff_2021: Some(24.5),
            cutoff_2022: None,
            cutoff_2023: Some(26.0),
            cutoff_2024: None,
        };

        let (values, years) = cutoff_history(&record);
        assert_eq!(values, vec![21.0, 24.5, 26.0]);
        assert_eq!(years, vec![2018, 2021, 2023]);
    }
}
