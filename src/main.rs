use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use vehicle_passport::config::Settings;
use vehicle_passport::{Admission, Ledger, VehicleEvent};

#[derive(Parser, Debug)]
#[clap(name = "vehicle-passport", about = "Vehicle passport ledger node (single process)")]
struct Cli {
    /// Settings file (TOML, JSON or YAML).
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Vehicle to run the lifecycle against.
    #[clap(long)]
    vin: Option<String>,
    /// Print the exported chain as JSON.
    #[clap(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("load settings")?;

    let level = Level::from_str(&settings.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let registry = settings.registry();
    let ledger = Ledger::new();
    info!(users = registry.len(), "ledger started");

    let vin = cli.vin.unwrap_or(settings.demo.vin);
    let admission = Admission::new(&registry, &ledger);

    // Lifecycle: register, odometer, service, sale.
    admission.record(
        "manufacturer_1",
        &vin,
        VehicleEvent::created("TestMake", "TestModel", 2024, 100),
    )?;
    admission.record("mechanic_1", &vin, VehicleEvent::mileage(500))?;
    admission.record("mechanic_1", &vin, VehicleEvent::service("Oil Change"))?;
    admission.record("manufacturer_1", &vin, VehicleEvent::transfer("buyer_1"))?;

    // Both of these must be refused.
    match admission.record("mechanic_1", &vin, VehicleEvent::mileage(300)) {
        Err(e) => info!(error = %e, "rollback refused"),
        Ok(_) => warn!("mileage rollback was accepted"),
    }
    match admission.record("buyer_1", &vin, VehicleEvent::service("Fake Service")) {
        Err(e) => info!(error = %e, "unauthorized write refused"),
        Ok(_) => warn!("buyer write was accepted"),
    }

    let valid = ledger.validate_chain();
    info!(blocks = ledger.len(), valid, "chain checked");

    let state = ledger
        .current_state(&vin)
        .with_context(|| format!("no state for {vin}"))?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&ledger.blocks())?);
    }

    Ok(())
}
