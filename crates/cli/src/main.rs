//! Survey CLI.
//!
//! Usage:
//!     patri analyze --lat 48.5839 --lon 7.7455
//!     patri observations --lat 48.5839 --lon 7.7455
//!     patri health

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patriflora_backend_gbif::{is_flora, GbifBackend, GbifConfig, OccurrenceSource};
use patriflora_classify::{InferenceClient, InferenceConfig};
use patriflora_geo::{circle_wkt, AdminResolver, GeoApiConfig};
use patriflora_survey::{
    run_survey, SurveyContext, SurveyOutcome, SurveyReport, OBSERVATION_RADIUS_KM,
    SEARCH_RADIUS_KM,
};

#[derive(Parser)]
#[command(name = "patri")]
#[command(about = "Botanical survey of patrimonial species around a point")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GBIF API base URL
    #[arg(long, default_value = "https://api.gbif.org/v1")]
    gbif_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full patrimonial analysis around a point
    Analyze {
        /// Latitude of the query point
        #[arg(long)]
        lat: f64,

        /// Longitude of the query point
        #[arg(long)]
        lon: f64,

        /// Search radius in kilometers
        #[arg(long, default_value_t = SEARCH_RADIUS_KM)]
        radius_km: f64,

        /// Path to the regulatory reference table
        #[arg(long, default_value = "BDCstatut.csv")]
        rule_table: String,

        /// Inference API key (falls back to GEMINI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Write the point-feature collection to this GeoJSON file
        #[arg(long)]
        export: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List raw flora observations around a point
    Observations {
        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lon: f64,

        /// Search radius in kilometers
        #[arg(long, default_value_t = OBSERVATION_RADIUS_KM)]
        radius_km: f64,

        /// Maximum records to retrieve
        #[arg(short, long, default_value = "300")]
        limit: usize,
    },

    /// Check occurrence-backend health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patriflora=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let backend = GbifBackend::new(GbifConfig {
        base_url: cli.gbif_url,
        ..Default::default()
    });

    match cli.command {
        Commands::Analyze {
            lat,
            lon,
            radius_km,
            rule_table,
            api_key,
            export,
            format,
        } => {
            run_analyze(
                &backend, lat, lon, radius_km, &rule_table, api_key, export, &format,
            )
            .await?;
        }
        Commands::Observations {
            lat,
            lon,
            radius_km,
            limit,
        } => {
            run_observations(&backend, lat, lon, radius_km, limit).await?;
        }
        Commands::Health => {
            run_health(&backend).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_analyze(
    backend: &GbifBackend,
    lat: f64,
    lon: f64,
    radius_km: f64,
    rule_table: &str,
    api_key: Option<String>,
    export: Option<String>,
    format: &str,
) -> Result<()> {
    let raw_table = std::fs::read_to_string(rule_table)
        .with_context(|| format!("cannot read reference table {}", rule_table))?;
    let survey = SurveyContext::new(raw_table);

    let api_key = api_key
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .context("no inference API key (use --api-key or GEMINI_API_KEY)")?;
    let inference = InferenceClient::new(InferenceConfig {
        api_key,
        ..Default::default()
    });
    let resolver = AdminResolver::new(GeoApiConfig::default());

    let outcome = run_survey(backend, &resolver, &inference, &survey, lat, lon, radius_km).await?;

    match outcome {
        SurveyOutcome::EmptyInventory => {
            println!(
                "Aucune occurrence de plante trouvée dans un rayon de {} km.",
                radius_km
            );
        }
        SurveyOutcome::NoPatrimonialSpecies { observed_species } => {
            println!(
                "Aucune espèce patrimoniale parmi les {} espèces observées.",
                observed_species
            );
        }
        SurveyOutcome::Report(report) => {
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&*report)?);
            } else {
                print_report(&report);
            }
            if let Some(path) = export {
                std::fs::write(&path, serde_json::to_string_pretty(&report.features)?)
                    .with_context(|| format!("cannot write {}", path))?;
                println!("Export écrit dans {}", path);
            }
        }
    }

    Ok(())
}

fn print_report(report: &SurveyReport) {
    println!(
        "Département {}, région {} — {} espèce(s) patrimoniale(s) sur {} observée(s)",
        report.context.department_code,
        report.context.region_code,
        report.statuses.len(),
        report.observed_species
    );
    println!("---");

    for (species, status) in &report.statuses {
        println!("\n{} [{}]", species, status.provenance.as_str());
        for line in &status.statuses {
            println!("   - {}", line);
        }
    }

    println!("\n---");
    println!(
        "{} espèce(s) cartographiée(s) sur {} point(s)",
        report.statuses.len(),
        report.buckets.len()
    );
}

async fn run_observations(
    backend: &GbifBackend,
    lat: f64,
    lon: f64,
    radius_km: f64,
    limit: usize,
) -> Result<()> {
    let polygon = circle_wkt(lat, lon, radius_km);
    let records = backend.observations(&polygon, limit).await?;
    let flora: Vec<_> = records.iter().filter(|record| is_flora(record)).collect();

    if flora.is_empty() {
        println!("Aucune observation trouvée.");
        return Ok(());
    }

    for record in &flora {
        if let (Some(species), Some((lat, lon))) = (record.species.as_deref(), record.coordinates())
        {
            println!("{:.5} {:.5}  {}", lat, lon, species);
        }
    }
    println!("---");
    println!("{} observation(s) de flore trouvée(s).", flora.len());

    Ok(())
}

async fn run_health(backend: &GbifBackend) -> Result<()> {
    print!("Checking {} backend... ", backend.name());

    match backend.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(err) => {
            println!("FAILED: {}", err);
            std::process::exit(1);
        }
    }
}
