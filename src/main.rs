use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod db;
mod models;
mod report;
mod search;
mod trend;

use models::{Query, RawFilters, ResultItem};

#[derive(Parser)]
#[command(name = "programme-shortlist")]
#[command(about = "Cutoff-aware programme shortlist builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Course name, matched as a case-insensitive substring
    #[arg(long)]
    course: Option<String>,
    /// Institution filter, repeatable
    #[arg(long = "institution")]
    institutions: Vec<String>,
    /// Cluster filter, repeatable
    #[arg(long = "cluster")]
    clusters: Vec<String>,
    /// Aggregate cluster points, e.g. 42.375
    #[arg(long)]
    points: Option<String>,
    /// Widen the ceiling to surface slightly more competitive programmes
    #[arg(long)]
    reach: bool,
    /// Per-cluster points as a JSON object, e.g. '{"Cluster 7": "41.2"}'
    #[arg(long)]
    cluster_points: Option<String>,
}

impl FilterArgs {
    fn into_query(self) -> Query {
        search::normalize(RawFilters {
            course: self.course,
            institutions: self.institutions,
            clusters: self.clusters,
            points: self.points,
            reach: self.reach,
            cluster_points: self.cluster_points,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema
    InitDb,
    /// Load realistic seed programmes
    Seed,
    /// Print distinct filter options as JSON
    Filters,
    /// Rank programmes against the supplied score(s)
    Search {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Generate a markdown shortlist report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the shortlist as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "shortlist.csv")]
        out: PathBuf,
    },
}

/// Run the full pipeline for a normalized query. The gatekeeper refusal
/// happens here, before the catalog is touched.
async fn run_shortlist(pool: &PgPool, query: &Query) -> anyhow::Result<Vec<ResultItem>> {
    if query.is_unconstrained() {
        return Ok(Vec::new());
    }

    let rows = db::fetch_programmes(pool, query).await?;
    Ok(search::shortlist(query, &rows))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the programme catalog Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed programmes inserted.");
        }
        Commands::Filters => {
            let options = db::filter_options(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Commands::Search { filters, limit } => {
            let query = filters.into_query();
            let results = run_shortlist(&pool, &query).await?;

            if results.is_empty() {
                println!("No programmes matched. Set at least one filter or a points value.");
                return Ok(());
            }

            println!("Top programmes by latest cutoff:");
            for item in results.iter().take(limit) {
                let cutoff = item
                    .effective_cutoff
                    .map(|value| format!("{value:.3}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "- [{}] {} ({}, {}) cutoff {} status {} trend {}",
                    item.code,
                    item.name,
                    item.institution,
                    item.cluster,
                    cutoff,
                    item.status,
                    item.trend
                );
            }
        }
        Commands::Report { filters, out } => {
            let query = filters.into_query();
            let results = run_shortlist(&pool, &query).await?;
            let report = report::build_report(&query, Utc::now().date_naive(), &results);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { filters, out } => {
            let mut query = filters.into_query();
            // exports always see the full result detail
            query.tier = models::Tier::Premium;
            let results = run_shortlist(&pool, &query).await?;
            let written = report::write_csv(&out, &results)?;
            println!("Exported {written} programmes to {}.", out.display());
        }
    }

    Ok(())
}
