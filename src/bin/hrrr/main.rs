//! Command `hrrr` fetches HRRR fields and prints values at a lat/lon.
//!
//! Usage:
//!
//!   hrrr [flags] <lat> <lon>
//!   hrrr --list
//!
//! Examples:
//!
//!   hrrr 39.64 -106.37
//!   hrrr --var "TMP:700 mb" --fxx 1 39.64 -106.37
//!   hrrr --run 2026-02-19T12:00:00Z --json 47.61 -122.33
//!   hrrr --all 39.64 -106.37

use std::process;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, SecondsFormat, Timelike, Utc};
use clap::Parser;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use grib2_hrrr::{Field, GribError, HrrrClient};

/// Index search strings known to decode (DRS templates 5.0 and 5.3).
const KNOWN_VARS: &[(&str, &str)] = &[
    ("TMP:2 m above ground", "2 m air temperature (K)"),
    ("TMP:surface", "Surface skin temperature (K)"),
    ("TMP:700 mb", "700 mb temperature (K)"),
    ("TMP:500 mb", "500 mb temperature (K)"),
    ("DPT:2 m above ground", "2 m dew point (K)"),
    ("RH:2 m above ground", "2 m relative humidity (%)"),
    ("REFC:entire atmosphere", "Composite reflectivity (dBZ)"),
    ("CAPE:surface", "Surface CAPE (J/kg)"),
    ("UGRD:10 m above ground", "10 m U-component of wind (m/s)"),
    ("VGRD:10 m above ground", "10 m V-component of wind (m/s)"),
    ("PRATE:surface", "Precipitation rate (kg/m^2/s)"),
    ("APCP:surface", "Total accumulated precipitation (kg/m^2)"),
    ("HGT:cloud ceiling", "Cloud ceiling height (m)"),
    ("VIS:surface", "Surface visibility (m)"),
    ("PRES:surface", "Surface pressure (Pa)"),
    ("MSLMA:mean sea level", "Mean sea level pressure (Pa)"),
    ("TCDC:entire atmosphere", "Total cloud cover (%)"),
    ("SPFH:2 m above ground", "2 m specific humidity (kg/kg)"),
];

#[derive(Parser, Debug)]
#[command(name = "hrrr")]
#[command(about = "Fetch NOAA HRRR fields and print values at a lat/lon")]
struct Args {
    /// Latitude in degrees north
    #[arg(allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in degrees east (signed)
    #[arg(allow_negative_numbers = true)]
    lon: Option<f64>,

    /// HRRR variable/level search string (see --list)
    #[arg(short = 'v', long = "var", default_value = "TMP:2 m above ground")]
    var: String,

    /// Forecast hour (0 = analysis)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=48))]
    fxx: u8,

    /// Model run time UTC in RFC 3339 (default: latest available)
    #[arg(long)]
    run: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Print common variable strings and exit
    #[arg(long)]
    list: bool,

    /// Fetch and display all known variables
    #[arg(long)]
    all: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Serialize)]
struct JsonLocation {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct JsonField {
    variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonOutput {
    location: JsonLocation,
    run: String,
    valid: String,
    fxx: u8,
    fields: Vec<JsonField>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = args.log_level.parse::<Level>().unwrap_or(Level::WARN);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if args.list {
        print_var_list();
        return;
    }

    let (lat, lon) = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            eprintln!("error: lat and lon are required");
            process::exit(2);
        }
    };

    let run = match &args.run {
        Some(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Some(truncate_to_hour(t.with_timezone(&Utc))),
            Err(_) => {
                eprintln!("error: invalid --run {s:?}: use RFC 3339, e.g. 2026-02-19T12:00:00Z");
                process::exit(2);
            }
        },
        None => None,
    };

    let client = match HrrrClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let result = if args.all {
        run_all(&client, run, args.fxx, lat, lon, args.json).await
    } else {
        run_single(&client, run, args.fxx, &args.var, lat, lon, args.json).await
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run_single(
    client: &HrrrClient,
    run: Option<DateTime<Utc>>,
    fxx: u8,
    var: &str,
    lat: f64,
    lon: f64,
    json: bool,
) -> Result<()> {
    let (field, actual_run) = match run {
        Some(t) => (client.fetch_field(t, fxx, var).await?, t),
        None => fetch_latest(client, fxx, var).await?,
    };

    let val = field.lookup(lat, lon);
    if val.is_nan() {
        bail!("({lat:.4}, {lon:.4}) is outside the HRRR CONUS domain");
    }

    if json {
        emit_json(JsonOutput {
            location: JsonLocation { lat, lon },
            run: rfc3339(actual_run),
            valid: rfc3339(valid_time(actual_run, fxx)),
            fxx,
            fields: vec![JsonField {
                variable: var.to_string(),
                value: Some(val),
                error: None,
            }],
        })?;
    } else {
        print_header(lat, lon, actual_run, fxx);
        println!("  Variable : {var}");
        println!();
        println!("  Value    : {val}");
        println!();
    }
    Ok(())
}

async fn run_all(
    client: &HrrrClient,
    run: Option<DateTime<Utc>>,
    fxx: u8,
    lat: f64,
    lon: f64,
    json: bool,
) -> Result<()> {
    let actual_run = match run {
        Some(t) => t,
        None => fetch_latest(client, fxx, KNOWN_VARS[0].0).await?.1,
    };

    // Fetch with a concurrency cap of 6 to stay polite to the bucket.
    let results: Vec<(&str, Result<f64, GribError>)> =
        futures::stream::iter(KNOWN_VARS.iter().map(|(key, _)| async move {
            let looked_up = client
                .fetch_field(actual_run, fxx, key)
                .await
                .map(|field| field.lookup(lat, lon));
            (*key, looked_up)
        }))
        .buffered(6)
        .collect()
        .await;

    if json {
        let fields = results
            .into_iter()
            .map(|(key, outcome)| match outcome {
                Ok(v) if v.is_nan() => JsonField {
                    variable: key.to_string(),
                    value: None,
                    error: Some("outside HRRR CONUS domain".to_string()),
                },
                Ok(v) => JsonField {
                    variable: key.to_string(),
                    value: Some(v),
                    error: None,
                },
                Err(e) => JsonField {
                    variable: key.to_string(),
                    value: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        emit_json(JsonOutput {
            location: JsonLocation { lat, lon },
            run: rfc3339(actual_run),
            valid: rfc3339(valid_time(actual_run, fxx)),
            fxx,
            fields,
        })?;
        return Ok(());
    }

    let width = KNOWN_VARS.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    print_header(lat, lon, actual_run, fxx);
    for (key, outcome) in results {
        match outcome {
            Ok(v) if v.is_nan() => println!("  {key:width$}  (outside domain)"),
            Ok(v) => println!("  {key:width$}  {v}"),
            Err(e) => println!("  {key:width$}  error: {e}"),
        }
    }
    println!();
    Ok(())
}

/// Tries model runs from 1 to 6 hours ago and returns the first that has
/// the requested field available.
async fn fetch_latest(
    client: &HrrrClient,
    fxx: u8,
    var: &str,
) -> Result<(Field, DateTime<Utc>)> {
    let base = truncate_to_hour(Utc::now());
    let mut last_err = None;
    for lag in 1..=6i64 {
        let t = base - Duration::hours(lag);
        info!(run = %t, lag, "probing model run");
        match client.fetch_field(t, fxx, var).await {
            Ok(field) => return Ok((field, t)),
            Err(e) => {
                debug!(error = %e, "run not available");
                last_err = Some(e);
            }
        }
    }
    Err(match last_err {
        Some(e) => anyhow!("could not find a recent HRRR run: {e}"),
        None => anyhow!("could not find a recent HRRR run"),
    })
}

fn valid_time(run: DateTime<Utc>, fxx: u8) -> DateTime<Utc> {
    run + Duration::hours(i64::from(fxx))
}

fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .and_hms_opt(t.hour(), 0, 0)
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or(t)
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn print_header(lat: f64, lon: f64, run: DateTime<Utc>, fxx: u8) {
    let forecast_label = if fxx == 0 {
        "analysis (f00)".to_string()
    } else {
        format!("f{fxx:02} (+{fxx}h forecast)")
    };
    println!();
    println!("  Location : {lat:.4} N  {lon:.4} E");
    println!("  Run      : {} UTC", run.format("%Y-%m-%d %H:%MZ"));
    println!(
        "  Valid    : {} UTC  [{forecast_label}]",
        valid_time(run, fxx).format("%Y-%m-%d %H:%MZ")
    );
    println!();
}

fn emit_json(out: JsonOutput) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_var_list() {
    println!("Common HRRR variable strings for use with --var:");
    println!();
    let width = KNOWN_VARS.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, desc) in KNOWN_VARS {
        println!("  {key:width$}  {desc}");
    }
    println!();
    println!("The string must match a substring of a line in the HRRR .idx file.");
    println!("Browse all fields at: https://noaa-hrrr-bdp-pds.s3.amazonaws.com/");
    println!("  e.g. hrrr.20260101/conus/hrrr.t00z.wrfsfcf00.grib2.idx");
}
