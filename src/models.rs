use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// A programme as stored in the catalog. Read-only from the engine's
/// perspective; `code` is the unique key.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgrammeRecord {
    pub code: String,
    pub institution: String,
    pub name: String,
    pub cluster: String,
    pub cutoff_2018: Option<f64>,
    pub cutoff_2019: Option<f64>,
    pub cutoff_2020: Option<f64>,
    pub cutoff_2021: Option<f64>,
    pub cutoff_2022: Option<f64>,
    pub cutoff_2023: Option<f64>,
    pub cutoff_2024: Option<f64>,
}

impl ProgrammeRecord {
    /// Yearly cutoffs in chronological order, paired with their year.
    pub fn yearly_cutoffs(&self) -> [(i32, Option<f64>); 7] {
        [
            (2018, self.cutoff_2018),
            (2019, self.cutoff_2019),
            (2020, self.cutoff_2020),
            (2021, self.cutoff_2021),
            (2022, self.cutoff_2022),
            (2023, self.cutoff_2023),
            (2024, self.cutoff_2024),
        ]
    }

    /// Most recent non-null yearly cutoff, 2024 falling back year by year
    /// to 2018. None when no year has a value.
    pub fn effective_cutoff(&self) -> Option<f64> {
        self.cutoff_2024
            .or(self.cutoff_2023)
            .or(self.cutoff_2022)
            .or(self.cutoff_2021)
            .or(self.cutoff_2020)
            .or(self.cutoff_2019)
            .or(self.cutoff_2018)
    }
}

/// Access level attached to a query. Reserved for future gating; filtering
/// never consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

/// Raw filter inputs as they arrive from the outside, before normalization.
/// `points` and the `cluster_points` values are numeric strings.
#[derive(Debug, Clone, Default)]
pub struct RawFilters {
    pub course: Option<String>,
    pub institutions: Vec<String>,
    pub clusters: Vec<String>,
    pub points: Option<String>,
    pub reach: bool,
    pub cluster_points: Option<String>,
}

/// A normalized query. Empty collections and `None` mean "unset".
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub course: Option<String>,
    pub institutions: Vec<String>,
    pub clusters: Vec<String>,
    pub points: Option<f64>,
    pub reach: bool,
    pub cluster_points: HashMap<String, f64>,
    /// Carried for future gating; no filtering path reads it yet.
    #[allow(dead_code)]
    pub tier: Tier,
}

impl Query {
    /// Gatekeeper rule: a query with no course, institution, cluster or
    /// points constraint must not reach the catalog at all.
    pub fn is_unconstrained(&self) -> bool {
        self.course.is_none()
            && self.institutions.is_empty()
            && self.clusters.is_empty()
            && self.points.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Safe,
    Tight,
    Risk,
    Unknown,
    #[serde(rename = "Enter Points")]
    EnterPoints,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Safe => "Safe",
            Status::Tight => "Tight",
            Status::Risk => "Risk",
            Status::Unknown => "Unknown",
            Status::EnterPoints => "Enter Points",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Rising,
    Falling,
    Volatile,
    Stable,
}

impl Trend {
    /// Advisory severity tag for downstream presentation.
    pub fn color(self) -> &'static str {
        match self {
            Trend::Rising => "red",
            Trend::Falling => "green",
            Trend::Volatile => "amber",
            Trend::Stable => "gray",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Rising => "Rising",
            Trend::Falling => "Falling",
            Trend::Volatile => "Volatile",
            Trend::Stable => "Stable",
        };
        f.write_str(label)
    }
}

/// One annotated shortlist entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItem {
    pub code: String,
    pub institution: String,
    pub name: String,
    pub cluster: String,
    pub cutoff_2018: Option<f64>,
    pub cutoff_2019: Option<f64>,
    pub cutoff_2020: Option<f64>,
    pub cutoff_2021: Option<f64>,
    pub cutoff_2022: Option<f64>,
    pub cutoff_2023: Option<f64>,
    pub cutoff_2024: Option<f64>,
    /// Latest positive cutoff, None when the programme has no usable value.
    pub effective_cutoff: Option<f64>,
    /// points minus effective cutoff, rounded to 3 decimals.
    pub diff: Option<f64>,
    pub status: Status,
    /// Positive yearly cutoffs in chronological order.
    pub history: Vec<f64>,
    /// Years matching `history`.
    pub history_labels: Vec<i32>,
    pub trend: Trend,
    pub trend_color: &'static str,
}

/// Distinct catalog values for building filter UIs.
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub institutions: Vec<String>,
    pub clusters: Vec<String>,
    pub courses: Vec<String>,
}
