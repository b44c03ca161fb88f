use anyhow::Context;
use sqlx::{PgPool, Row};

use crate::models::{FilterOptions, ProgrammeRecord, Query};
use crate::search;

/// Storage-level counterpart of `ProgrammeRecord::effective_cutoff`, with
/// missing history coalesced to 0 for ordering and the window pushdown.
const EFFECTIVE_CUTOFF_SQL: &str = "COALESCE(cutoff_2024, cutoff_2023, cutoff_2022, \
     cutoff_2021, cutoff_2020, cutoff_2019, cutoff_2018, 0)";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programmes (
            code TEXT PRIMARY KEY,
            institution TEXT NOT NULL,
            name TEXT NOT NULL,
            cluster TEXT NOT NULL,
            cutoff_2018 DOUBLE PRECISION,
            cutoff_2019 DOUBLE PRECISION,
            cutoff_2020 DOUBLE PRECISION,
            cutoff_2021 DOUBLE PRECISION,
            cutoff_2022 DOUBLE PRECISION,
            cutoff_2023 DOUBLE PRECISION,
            cutoff_2024 DOUBLE PRECISION
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create programmes table")?;

    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let programmes = vec![
        (
            "1263145",
            "UNIVERSITY OF NAIROBI",
            "BACHELOR OF SCIENCE (GEOSPATIAL ENGINEERING)",
            "Cluster 7",
            [
                Some(33.297),
                Some(34.125),
                None,
                Some(35.004),
                Some(35.871),
                Some(36.202),
                Some(36.449),
            ],
        ),
        (
            "1263204",
            "UNIVERSITY OF NAIROBI",
            "BACHELOR OF MEDICINE AND BACHELOR OF SURGERY",
            "Cluster 13",
            [
                Some(43.512),
                Some(43.909),
                Some(44.217),
                Some(44.631),
                Some(44.988),
                Some(45.321),
                Some(45.602),
            ],
        ),
        (
            "1080101",
            "KENYATTA UNIVERSITY",
            "BACHELOR OF EDUCATION (ARTS)",
            "Cluster 3",
            [
                Some(28.314),
                Some(27.902),
                Some(26.411),
                Some(25.873),
                Some(25.102),
                Some(24.655),
                Some(24.108),
            ],
        ),
        (
            "1112233",
            "MOI UNIVERSITY",
            "BACHELOR OF SCIENCE (COMPUTER SCIENCE)",
            "Cluster 9",
            [
                Some(30.112),
                Some(34.508),
                Some(29.914),
                Some(33.771),
                Some(30.226),
                Some(31.458),
                Some(30.914),
            ],
        ),
        (
            "1205017",
            "JKUAT",
            "BACHELOR OF COMMERCE",
            "Cluster 2",
            [
                None,
                None,
                None,
                None,
                Some(27.458),
                Some(27.911),
                Some(28.203),
            ],
        ),
        (
            "1440880",
            "TECHNICAL UNIVERSITY OF MOMBASA",
            "BACHELOR OF TECHNOLOGY (MARINE ENGINEERING)",
            "Cluster 7",
            [None, None, None, None, None, None, None],
        ),
    ];

    for (code, institution, name, cluster, cutoffs) in programmes {
        sqlx::query(
            r#"
            INSERT INTO programmes
            (code, institution, name, cluster,
             cutoff_2018, cutoff_2019, cutoff_2020, cutoff_2021,
             cutoff_2022, cutoff_2023, cutoff_2024)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (code) DO UPDATE
            SET institution = EXCLUDED.institution,
                name = EXCLUDED.name,
                cluster = EXCLUDED.cluster,
                cutoff_2018 = EXCLUDED.cutoff_2018,
                cutoff_2019 = EXCLUDED.cutoff_2019,
                cutoff_2020 = EXCLUDED.cutoff_2020,
                cutoff_2021 = EXCLUDED.cutoff_2021,
                cutoff_2022 = EXCLUDED.cutoff_2022,
                cutoff_2023 = EXCLUDED.cutoff_2023,
                cutoff_2024 = EXCLUDED.cutoff_2024
            "#,
        )
        .bind(code)
        .bind(institution)
        .bind(name)
        .bind(cluster)
        .bind(cutoffs[0])
        .bind(cutoffs[1])
        .bind(cutoffs[2])
        .bind(cutoffs[3])
        .bind(cutoffs[4])
        .bind(cutoffs[5])
        .bind(cutoffs[6])
        .execute(pool)
        .await?;
    }

    Ok(())
}

enum BindValue {
    Text(String),
    Number(f64),
}

/// Build the coarse catalog query for a normalized search.
///
/// Course matches as a case-insensitive substring; institutions and clusters
/// as membership tests. When a single global points value applies, the window
/// predicate is pushed down with the same floor/ceiling the engine uses, and
/// rows are capped at the engine limit. With a per-cluster map neither
/// happens: every candidate may carry its own window, so filtering and
/// truncation stay with the engine.
fn build_catalog_sql(query: &Query) -> (String, Vec<BindValue>) {
    let mut sql = String::from(
        "SELECT code, institution, name, cluster, \
         cutoff_2018, cutoff_2019, cutoff_2020, cutoff_2021, \
         cutoff_2022, cutoff_2023, cutoff_2024 \
         FROM programmes WHERE 1=1",
    );
    let mut binds: Vec<BindValue> = Vec::new();

    if let Some(course) = &query.course {
        binds.push(BindValue::Text(format!("%{course}%")));
        sql.push_str(&format!(" AND name ILIKE ${}", binds.len()));
    }

    if !query.institutions.is_empty() {
        let placeholders: Vec<String> = query
            .institutions
            .iter()
            .map(|value| {
                binds.push(BindValue::Text(value.clone()));
                format!("${}", binds.len())
            })
            .collect();
        sql.push_str(&format!(" AND institution IN ({})", placeholders.join(",")));
    }

    if !query.clusters.is_empty() {
        let placeholders: Vec<String> = query
            .clusters
            .iter()
            .map(|value| {
                binds.push(BindValue::Text(value.clone()));
                format!("${}", binds.len())
            })
            .collect();
        sql.push_str(&format!(" AND cluster IN ({})", placeholders.join(",")));
    }

    // Global-mode pushdown only; an explicit course search is never points
    // filtered, and a cluster map defers the window to the engine.
    if query.course.is_none() && query.cluster_points.is_empty() {
        if let Some(points) = query.points {
            let (floor, ceiling) = search::window(points, query.reach);
            binds.push(BindValue::Number(floor));
            let floor_slot = binds.len();
            binds.push(BindValue::Number(ceiling));
            let ceiling_slot = binds.len();
            sql.push_str(&format!(
                " AND ({EFFECTIVE_CUTOFF_SQL} BETWEEN ${floor_slot} AND ${ceiling_slot})"
            ));
        }
    }

    sql.push_str(&format!(" ORDER BY {EFFECTIVE_CUTOFF_SQL} DESC, code ASC"));

    if query.cluster_points.is_empty() {
        sql.push_str(&format!(" LIMIT {}", search::MAX_RESULTS));
    }

    (sql, binds)
}

/// Coarse fetch for the engine. Storage errors are fatal.
pub async fn fetch_programmes(pool: &PgPool, query: &Query) -> anyhow::Result<Vec<ProgrammeRecord>> {
    let (sql, binds) = build_catalog_sql(query);

    let mut statement = sqlx::query(&sql);
    for bind in binds {
        statement = match bind {
            BindValue::Text(value) => statement.bind(value),
            BindValue::Number(value) => statement.bind(value),
        };
    }

    let rows = statement
        .fetch_all(pool)
        .await
        .context("failed to query programme catalog")?;

    let mut programmes = Vec::new();
    for row in rows {
        programmes.push(ProgrammeRecord {
            code: row.get("code"),
            institution: row.get("institution"),
            name: row.get("name"),
            cluster: row.get("cluster"),
            cutoff_2018: row.get("cutoff_2018"),
            cutoff_2019: row.get("cutoff_2019"),
            cutoff_2020: row.get("cutoff_2020"),
            cutoff_2021: row.get("cutoff_2021"),
            cutoff_2022: row.get("cutoff_2022"),
            cutoff_2023: row.get("cutoff_2023"),
            cutoff_2024: row.get("cutoff_2024"),
        });
    }

    Ok(programmes)
}

async fn distinct_values(pool: &PgPool, column: &str) -> anyhow::Result<Vec<String>> {
    // column comes from the fixed list below, never from user input
    let sql = format!(
        "SELECT DISTINCT {column} FROM programmes \
         WHERE {column} IS NOT NULL AND {column} <> '' \
         AND {column} NOT IN ('#N/A', 'N/A') \
         ORDER BY {column} ASC"
    );

    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to list distinct {column} values"))?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Distinct institutions, clusters and course names for filter UIs.
/// Clusters sort by the first integer token in the label so "Cluster 2"
/// comes before "Cluster 10"; labels without a number sort last.
pub async fn filter_options(pool: &PgPool) -> anyhow::Result<FilterOptions> {
    let institutions = distinct_values(pool, "institution").await?;
    let mut clusters = distinct_values(pool, "cluster").await?;
    clusters.sort_by_key(|label| cluster_sort_key(label));
    let courses = distinct_values(pool, "name").await?;

    Ok(FilterOptions {
        institutions,
        clusters,
        courses,
    })
}

fn cluster_sort_key(label: &str) -> u32 {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points_query(points: f64) -> Query {
        Query {
            points: Some(points),
            ..Query::default()
        }
    }

    #[test]
    fn clusters_sort_by_first_integer_token() {
        let mut labels = vec![
            "Cluster 10".to_string(),
            "Cluster 2".to_string(),
            "Special".to_string(),
            "Cluster 1".to_string(),
        ];
        labels.sort_by_key(|label| cluster_sort_key(label));
        assert_eq!(labels, vec!["Cluster 1", "Cluster 2", "Cluster 10", "Special"]);
    }

    #[test]
    fn global_mode_pushes_the_window_down() {
        let (sql, binds) = build_catalog_sql(&points_query(30.0));
        assert!(sql.contains("BETWEEN $1 AND $2"));
        assert!(sql.contains("LIMIT 100"));
        assert!(matches!(binds[0], BindValue::Number(floor) if floor == 15.0));
        assert!(matches!(binds[1], BindValue::Number(ceiling) if ceiling == 30.0));
    }

    #[test]
    fn explicit_course_disables_the_pushdown() {
        let mut query = points_query(48.0);
        query.course = Some("GEOSPATIAL".to_string());
        let (sql, binds) = build_catalog_sql(&query);
        assert!(!sql.contains("BETWEEN"));
        assert!(sql.contains("name ILIKE $1"));
        assert!(matches!(&binds[0], BindValue::Text(pattern) if pattern == "%GEOSPATIAL%"));
    }

    #[test]
    fn cluster_map_defers_window_and_limit_to_the_engine() {
        let mut query = points_query(30.0);
        query.cluster_points.insert("Cluster 7".to_string(), 40.0);
        let (sql, _) = build_catalog_sql(&query);
        assert!(!sql.contains("BETWEEN"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn membership_filters_number_their_placeholders() {
        let query = Query {
            institutions: vec!["UON".to_string(), "KU".to_string()],
            clusters: vec!["Cluster 7".to_string()],
            ..Query::default()
        };
        let (sql, binds) = build_catalog_sql(&query);
        assert!(sql.contains("institution IN ($1,$2)"));
        assert!(sql.contains("cluster IN ($3)"));
        assert_eq!(binds.len(), 3);
    }
}
