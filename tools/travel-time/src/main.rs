use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use travel_time::engine::straight_line::StraightLineEngine;
use travel_time::geometry::{self, wkt, GeometryPayload, GeometryValue, Point};
use travel_time::matrix::arrow_stream::ArrowMatrixWriter;
use travel_time::{logging, EngineLoader, Settings, TravelTime};

#[derive(Parser)]
#[command(name = "travel-time")]
#[command(about = "Route, travel-time and matrix queries against a routing engine", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Engine config file; overrides `engine.config_path`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Routing engine implementation
    #[arg(long, global = true, value_enum, default_value_t = EngineKind::StraightLine)]
    engine: EngineKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineKind {
    /// Great-circle reference engine
    StraightLine,
    /// Native engine (requires the `valhalla` feature)
    Valhalla,
}

#[derive(Subcommand)]
enum Commands {
    /// Route between two geometries
    Route {
        /// Start geometry: WKT, `lat,lon`, or `hex:<wkb>`
        #[arg(long)]
        from: String,
        /// End geometry: WKT, `lat,lon`, or `hex:<wkb>`
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "auto")]
        costing: String,
    },
    /// Travel time in seconds between two coordinates
    TravelTime {
        /// Start coordinate (lat,lon)
        #[arg(long)]
        from: String,
        /// End coordinate (lat,lon)
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "auto")]
        costing: String,
    },
    /// Distance/duration matrix
    Matrix {
        /// Source coordinates, `lat,lon;lat,lon;...`
        #[arg(long)]
        sources: String,
        /// Destination coordinates, `lat,lon;lat,lon;...`
        #[arg(long)]
        destinations: String,
        #[arg(long, default_value = "auto")]
        costing: String,
        /// Write an Arrow IPC stream to this file instead of a table
        #[arg(long)]
        arrow: Option<PathBuf>,
    },
    /// Snap a coordinate to the road network
    Locate {
        /// Coordinate (lat,lon)
        #[arg(long)]
        at: String,
        #[arg(long, default_value = "auto")]
        costing: String,
    },
    /// Send a raw JSON request to the engine
    Request {
        /// Engine action, e.g. `route`, `locate`, `status`
        action: String,
        /// Request body (JSON)
        #[arg(default_value = "{}")]
        json: String,
    },
    /// Show how a geometry argument is classified
    Sniff {
        /// WKT, `lat,lon`, or `hex:<bytes>`
        geometry: String,
    },
}

fn parse_coord(s: &str) -> Result<Point> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        bail!("Coordinate must be in format 'lat,lon'");
    }
    let lat = parts[0].trim().parse::<f64>()?;
    let lon = parts[1].trim().parse::<f64>()?;
    Ok(Point::new(lon, lat))
}

fn parse_coord_list(s: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    for part in s.split(';').filter(|p| !p.trim().is_empty()) {
        let point = parse_coord(part).with_context(|| format!("Bad coordinate '{part}'"))?;
        lats.push(point.lat);
        lons.push(point.lon);
    }
    Ok((lats, lons))
}

/// Owned geometry argument
enum GeometryArg {
    Text(String),
    Binary(Vec<u8>),
}

impl GeometryArg {
    fn parse(s: &str, precision: usize) -> Result<Self> {
        if let Some(encoded) = s.strip_prefix("hex:") {
            let bytes = hex::decode(encoded.trim()).context("Invalid hex geometry")?;
            return Ok(GeometryArg::Binary(bytes));
        }
        match parse_coord(s) {
            Ok(point) => Ok(GeometryArg::Text(wkt::point_text(point, precision))),
            Err(_) => Ok(GeometryArg::Text(s.to_string())),
        }
    }

    fn payload(&self) -> GeometryPayload<'_> {
        match self {
            GeometryArg::Text(text) => GeometryPayload::Text(text.as_str()),
            GeometryArg::Binary(bytes) => GeometryPayload::Binary(bytes.as_slice()),
        }
    }
}

fn sniff(geometry: &str, settings: &Settings) -> Result<()> {
    let precision = settings.geometry.wkt_precision;
    let arg = GeometryArg::parse(geometry, precision)?;
    let payload = arg.payload();

    if let GeometryPayload::Binary(bytes) = payload {
        println!("format:   {:?}", geometry::classify(bytes));
    }
    let value = GeometryValue::from_payload(payload, precision);
    println!("encoding: {:?}", value.encoding());
    println!("bytes:    {}", value.len());
    if let Some(text) = value.synthesized_wkt() {
        println!("wkt:      {}", text);
    }
    Ok(())
}

fn run<L: EngineLoader>(loader: L, settings: Settings, command: Commands) -> Result<()> {
    if settings.engine.config_path.is_none() {
        bail!("No engine config: pass --config or set engine.config_path");
    }
    let precision = settings.geometry.wkt_precision;
    let tt = TravelTime::start(loader, settings)?;

    match command {
        Commands::Route { from, to, costing } => {
            let from = GeometryArg::parse(&from, precision)?;
            let to = GeometryArg::parse(&to, precision)?;
            let rows = tt.route(&[Some(from.payload())], &[Some(to.payload())], &[Some(costing.as_str())])?;
            match rows.into_iter().next().flatten() {
                Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
                None => bail!("No route found"),
            }
        }
        Commands::TravelTime { from, to, costing } => {
            let from = parse_coord(&from)?;
            let to = parse_coord(&to)?;
            let rows = tt.travel_time(
                &[Some(from.lat)],
                &[Some(from.lon)],
                &[Some(to.lat)],
                &[Some(to.lon)],
                &[Some(costing.as_str())],
            )?;
            match rows.into_iter().next().flatten() {
                Some(seconds) => println!("{:.1}", seconds),
                None => bail!("No route found"),
            }
        }
        Commands::Matrix {
            sources,
            destinations,
            costing,
            arrow,
        } => {
            let (src_lats, src_lons) = parse_coord_list(&sources)?;
            let (dst_lats, dst_lons) = parse_coord_list(&destinations)?;
            let stream = tt.matrix(src_lats, src_lons, dst_lats, dst_lons, &costing)?;

            match arrow {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let mut writer = ArrowMatrixWriter::new(BufWriter::new(file))?;
                    writer.write_stream(stream)?;
                    let (batches, rows) = writer.finish()?;
                    println!("Wrote {} rows in {} batches to {}", rows, batches, path.display());
                }
                None => {
                    println!("{:>8} {:>8} {:>14} {:>12}", "from_idx", "to_idx", "distance_m", "duration_s");
                    for batch in stream {
                        for i in 0..batch.len() {
                            println!(
                                "{:>8} {:>8} {:>14.1} {:>12.1}",
                                batch.from_index[i],
                                batch.to_index[i],
                                batch.distance_m[i],
                                batch.duration_s[i]
                            );
                        }
                    }
                }
            }
        }
        Commands::Locate { at, costing } => {
            let at = parse_coord(&at)?;
            let rows = tt.locate(&[Some(at.lat)], &[Some(at.lon)], &[Some(costing.as_str())])?;
            match rows.into_iter().next().flatten() {
                Some(point) => println!("{},{}", point.lat, point.lon),
                None => bail!("Could not snap coordinate"),
            }
        }
        Commands::Request { action, json } => {
            let rows = tt.request(&[Some(action.as_str())], &[Some(json.as_str())])?;
            match rows.into_iter().next().flatten() {
                Some(response) => println!("{}", response),
                None => bail!("Engine returned no response"),
            }
        }
        Commands::Sniff { .. } => unreachable!("sniff runs before engine setup"),
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(config) = cli.config {
        settings.engine.config_path = Some(config);
    }
    logging::init(&settings.logging)?;

    if let Commands::Sniff { geometry } = &cli.command {
        return sniff(geometry, &settings);
    }

    match cli.engine {
        EngineKind::StraightLine => run(StraightLineEngine, settings, cli.command),
        #[cfg(feature = "valhalla")]
        EngineKind::Valhalla => run(
            travel_time::engine::valhalla::ValhallaEngine,
            settings,
            cli.command,
        ),
        #[cfg(not(feature = "valhalla"))]
        EngineKind::Valhalla => bail!("travel-time was built without the `valhalla` feature"),
    }
}
