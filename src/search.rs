use std::collections::HashMap;

use crate::models::{ProgrammeRecord, Query, RawFilters, ResultItem, Status, Tier};
use crate::trend;

/// Hard cap on the assembled shortlist.
pub const MAX_RESULTS: usize = 100;

/// No cutoff in the catalog exceeds the maximum attainable score.
const CEILING_CAP: f64 = 48.0;
const REACH_BONUS: f64 = 2.0;
const TIGHT_BAND: f64 = 2.0;

fn is_unset(value: &str) -> bool {
    value.is_empty() || value == "All"
}

/// Canonicalize raw filter inputs. The sentinel "All" and empty values mean
/// unset; unparseable numbers degrade to absent rather than erroring.
pub fn normalize(raw: RawFilters) -> Query {
    let course = raw.course.filter(|value| !is_unset(value));
    let institutions: Vec<String> = raw
        .institutions
        .into_iter()
        .filter(|value| !is_unset(value))
        .collect();
    let clusters: Vec<String> = raw
        .clusters
        .into_iter()
        .filter(|value| !is_unset(value))
        .collect();
    let points = raw.points.as_deref().and_then(parse_points);
    let cluster_points = raw
        .cluster_points
        .as_deref()
        .map(parse_cluster_points)
        .unwrap_or_default();

    Query {
        course,
        institutions,
        clusters,
        points,
        reach: raw.reach,
        cluster_points,
        tier: Tier::default(),
    }
}

fn parse_points(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parse the per-cluster points payload, a JSON object whose values are
/// numeric strings. A malformed payload is discarded wholesale and an
/// unparseable entry is dropped; both fall back to the global points value.
fn parse_cluster_points(raw: &str) -> HashMap<String, f64> {
    let Ok(entries) = serde_json::from_str::<HashMap<String, serde_json::Value>>(raw) else {
        return HashMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(cluster, value)| {
            let points = match value {
                serde_json::Value::String(text) => parse_points(&text)?,
                serde_json::Value::Number(number) => number.as_f64()?,
                _ => return None,
            };
            Some((cluster, points))
        })
        .collect()
}

/// Inclusive [floor, ceiling] range of cutoffs relevant to a score.
///
/// The ceiling widens by 2 points when reach is set, capped at 48. The floor
/// reaches 10 points down for scores above 40 and 15 points down otherwise.
pub fn window(points: f64, reach: bool) -> (f64, f64) {
    let bonus = if reach { REACH_BONUS } else { 0.0 };
    let ceiling = (points + bonus).min(CEILING_CAP);

    let margin = if points > 40.0 { 10.0 } else { 15.0 };
    let floor = (points - margin).max(0.0);

    (floor, ceiling)
}

/// Single source of truth for the window test. The storage-level pushdown
/// binds the same floor/ceiling pair, so pushing the predicate down can never
/// change which rows survive.
pub fn admissible(points: f64, reach: bool, cutoff: f64) -> bool {
    let (floor, ceiling) = window(points, reach);
    (floor..=ceiling).contains(&cutoff)
}

/// Points applicable to a candidate: the map entry for its own cluster when
/// one exists, else the single global value.
fn applicable_points(query: &Query, cluster: &str) -> Option<f64> {
    query.cluster_points.get(cluster).copied().or(query.points)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Label a candidate against the applicable points. Returns the status and
/// the rounded points-to-cutoff difference where one can be computed.
pub fn classify(points: Option<f64>, cutoff: Option<f64>) -> (Status, Option<f64>) {
    let Some(points) = points else {
        return (Status::EnterPoints, None);
    };

    match cutoff {
        Some(cutoff) if cutoff > 0.0 => {
            let diff = round3(points - cutoff);
            let status = if points >= cutoff {
                Status::Safe
            } else if points >= cutoff - TIGHT_BAND {
                Status::Tight
            } else {
                Status::Risk
            };
            (status, Some(diff))
        }
        _ => (Status::Unknown, None),
    }
}

/// Evaluate coarse-filtered catalog rows into the final annotated shortlist:
/// window test, status, trend, sort, truncate.
///
/// Pure and deterministic; the same query over the same rows always yields
/// the same ordered list.
pub fn shortlist(query: &Query, rows: &[ProgrammeRecord]) -> Vec<ResultItem> {
    if query.is_unconstrained() {
        return Vec::new();
    }

    // An explicitly requested course is never hidden by a points mismatch.
    let skip_window = query.course.is_some();

    let mut items: Vec<ResultItem> = Vec::new();
    for row in rows {
        let effective = row.effective_cutoff();
        let points = applicable_points(query, &row.cluster);

        if !skip_window {
            if let Some(points) = points {
                if !admissible(points, query.reach, effective.unwrap_or(0.0)) {
                    continue;
                }
            }
        }

        let (status, diff) = classify(points, effective);
        let (history, history_labels) = trend::cutoff_history(row);
        let trend = trend::analyze(&history);

        items.push(ResultItem {
            code: row.code.clone(),
            institution: row.institution.clone(),
            name: row.name.clone(),
            cluster: row.cluster.clone(),
            cutoff_2018: row.cutoff_2018,
            cutoff_2019: row.cutoff_2019,
            cutoff_2020: row.cutoff_2020,
            cutoff_2021: row.cutoff_2021,
            cutoff_2022: row.cutoff_2022,
            cutoff_2023: row.cutoff_2023,
            cutoff_2024: row.cutoff_2024,
            effective_cutoff: effective.filter(|value| *value > 0.0),
            diff,
            status,
            history,
            history_labels,
            trend,
            trend_color: trend.color(),
        });
    }

    // Stable sort keeps tie order reproducible across calls.
    items.sort_by(|a, b| {
        let a_key = a.effective_cutoff.unwrap_or(0.0);
        let b_key = b.effective_cutoff.unwrap_or(0.0);
        b_key
            .partial_cmp(&a_key)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    items.truncate(MAX_RESULTS);
    items
}
