use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use energydss::classification::{ResourceAssessment, SiteAssessment, advise};
use energydss::location::{FixedLocationProvider, resolve_current_location};
use energydss::models::{LocationOrigin, RegionRecord, SiteRecord, SourceReport};
use energydss::orchestrator::{AnalysisRecord, Delivery, SpatialAnalyzer};
use energydss::wizard::{Domain, WizardSession, WizardState};
use energydss::{Coordinate, DssConfig, DssError, logging, web};

#[derive(Parser, Debug)]
#[command(name = "energydss")]
#[command(about = "Solar and wind potential assessment for field teams")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "ENERGYDSS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess a single point
    Point {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Assess an administrative region by name
    Region { name: String },
    /// Assess a known town, or a region when no town matches
    Search { name: String },
    /// Assess the device position, simulating it when outside the mission area
    Locate {
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
    },
    /// Classify a raw potential score
    Classify {
        #[arg(allow_hyphen_values = true)]
        score: f64,
        /// Terrain slope in degrees
        #[arg(long)]
        slope: Option<f64>,
    },
    /// Walk the equipment wizard with the given answers
    Wizard {
        /// water-pumping, refrigeration, drying or cooking
        domain: String,
        answers: Vec<String>,
    },
    /// Run the HTTP API
    ///
    /// All clients share one analysis session: a request issued while another
    /// is still running supersedes it, and the older request is answered with
    /// 409 Conflict.
    Serve {
        #[arg(short, long, env = "ENERGYDSS_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = DssConfig::load_from_path(args.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, args.verbose)?;
    debug!("Loaded configuration: {:?}", config);

    match run(args.command, &config).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<DssError>() {
            Some(dss_error) => {
                eprintln!("{}", dss_error.user_message());
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

async fn run(command: Command, config: &DssConfig) -> Result<()> {
    match &command {
        Command::Classify { score, slope } => {
            let advisory = advise(*score, *slope, config.analysis.slope_limit_deg);
            println!("{score:.2}: {} ({})", advisory.category, advisory.color);
            println!("  {}", advisory.message);
            return Ok(());
        }
        Command::Wizard { domain, answers } => {
            let domain: Domain = domain.parse()?;
            let session = WizardSession::replay(domain, answers.as_slice())?;
            print_wizard(domain, &session);
            return Ok(());
        }
        _ => {}
    }

    let analyzer = SpatialAnalyzer::from_config(config)?;

    match command {
        Command::Point { lat, lon } => {
            let coordinate = Coordinate::new(lat, lon)?;
            let delivery = analyzer.analyze_point(coordinate, None).await?;
            print_delivery(delivery, |record| print_site(&analyzer, &record));
        }
        Command::Region { name } => {
            let delivery = analyzer.analyze_region(&name).await?;
            print_delivery(delivery, |record| print_region(&record));
        }
        Command::Search { name } => {
            let delivery = analyzer.search(&name).await?;
            print_delivery(delivery, |record| match record {
                AnalysisRecord::Site(site) => print_site(&analyzer, &site),
                AnalysisRecord::Region(region) => print_region(&region),
            });
        }
        Command::Locate { lat, lon } => {
            let provider = match (lat, lon) {
                (Some(lat), Some(lon)) => FixedLocationProvider::new(Coordinate::new(lat, lon)?),
                _ => FixedLocationProvider::denied(),
            };
            let resolved = resolve_current_location(&provider, analyzer.settings()).await?;
            let delivery = analyzer.analyze_location(resolved).await?;
            print_delivery(delivery, |record| print_site(&analyzer, &record));
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            info!("Serving EnergyDSS API on port {}", port);
            web::run(Arc::new(analyzer), port).await?;
        }
        Command::Classify { .. } | Command::Wizard { .. } => {}
    }

    Ok(())
}

fn print_delivery<T>(delivery: Delivery<T>, print: impl FnOnce(T)) {
    match delivery {
        Delivery::Current(record) => print(record),
        Delivery::Superseded { sequence } => {
            println!("Analysis #{sequence} was superseded by a newer request");
        }
    }
}

fn print_site(analyzer: &SpatialAnalyzer, record: &SiteRecord) {
    println!("{} {}", record.display_name(), record.coordinate);
    println!("Region: {}", record.region_name);
    if let LocationOrigin::Simulated {
        reported,
        distance_km,
    } = record.origin
    {
        println!(
            "Note: device at {reported} is {distance_km:.0} km outside the mission area; showing a simulated position"
        );
    }
    if let Some(place) = &record.place {
        let details = [
            place.kind.as_deref(),
            place.population.as_deref().map(|pop| pop.trim()),
            place.infrastructure.as_deref(),
        ];
        let details: Vec<&str> = details.into_iter().flatten().collect();
        if !details.is_empty() {
            println!("Place: {}", details.join(" | "));
        }
        if let Some(url) = &place.source_url {
            println!("Source: {url}");
        }
    }

    let metrics = &record.metrics;
    if let Some(ghi) = metrics.mean_irradiance {
        println!("Mean GHI: {ghi:.2} kWh/m²/day");
    }
    if let Some(speed) = metrics.mean_wind_speed {
        println!("Mean wind speed: {speed:.2} m/s");
    }
    if let Some(wpd) = metrics.mean_power_density {
        println!("Mean wind power density: {wpd:.0} W/m²");
    }
    if let Some(slope) = metrics.slope {
        println!("Slope: {slope:.1}°");
    }

    print_assessment(&SiteAssessment::of(record, analyzer.settings().slope_limit_deg));
    print_sources(&record.sources);
}

fn print_region(record: &RegionRecord) {
    println!("Region: {}", record.region_name);
    if !record.has_geometry() {
        println!("(no boundary geometry available)");
    }
    let metrics = &record.metrics;
    if let (Some(solar), Some(wind)) = (metrics.lcoe_solar, metrics.lcoe_wind) {
        println!("LCOE: solar {solar:.3} USD/kWh, wind {wind:.3} USD/kWh");
    }
    if let Some(area) = metrics.solar_highly_suitable_km2 {
        println!("Highly suitable for solar: {area:.0} km²");
    }
    if let Some(area) = metrics.wind_highly_suitable_km2 {
        println!("Highly suitable for wind: {area:.0} km²");
    }
    print_assessment(&SiteAssessment::of_region(record));
    print_sources(&record.sources);
}

fn print_assessment(assessment: &SiteAssessment) {
    let print_resource = |resource: &ResourceAssessment| {
        println!(
            "{}: {:.2} ({})",
            resource.resource, resource.score, resource.advisory.category
        );
        println!("  {}", resource.advisory.message);
    };
    assessment.solar.iter().for_each(print_resource);
    assessment.wind.iter().for_each(print_resource);
    if let Some(preferred) = assessment.preferred() {
        println!("Preferred resource: {}", preferred.resource);
    }
}

fn print_sources(sources: &SourceReport) {
    if sources.is_complete() {
        return;
    }
    for slot in &sources.0 {
        let reason = slot
            .failure
            .as_ref()
            .map(|reason| format!(" ({reason})"))
            .unwrap_or_default();
        println!("Data {}: {:?}{}", slot.slot, slot.status, reason);
    }
}

fn print_wizard(domain: Domain, session: &WizardSession) {
    match (session.state(), session.recommendation()) {
        (WizardState::Complete, Some(recommendation)) => {
            println!("Recommended for {domain}: {}", recommendation.model);
            if let Some(note) = &recommendation.note {
                println!("  {note}");
            }
        }
        (WizardState::Asking { step, .. }, _) => {
            println!("{domain} step {step}, choose one of:");
            for option in session.options() {
                println!("  {option}");
            }
        }
        _ => println!("No domain selected"),
    }
}
