//! Trip command - fetch one trip and print it.

use trainmap::config::ConfigFile;
use trainmap::fetch::{HttpTripClient, TripFetcher};
use trainmap::model::{TripDetail, TripId};
use trainmap::render::PopupFormatter;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the trip command.
pub fn run(id: &str, api: Option<String>) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("trip");
    let config = runner.config();

    let client = build_client(config, api)?;
    let trip_id = TripId::from(id);
    println!("Fetching trip {} from {}", trip_id, client.trip_url());

    let trip = runner.runtime().block_on(client.fetch_trip(&trip_id))?;
    print_trip(&trip, &config.formatter());
    Ok(())
}

fn build_client(config: &ConfigFile, api: Option<String>) -> Result<HttpTripClient, CliError> {
    let url = api.unwrap_or_else(|| config.api.url.clone());
    let client = HttpTripClient::with_timeout(url, config.api.timeout_secs)?
        .with_paths(config.api.trip_path.clone(), config.api.lookup_path.clone());
    Ok(client)
}

fn print_trip(trip: &TripDetail, formatter: &PopupFormatter) {
    println!();
    match (&trip.line, &trip.direction) {
        (Some(line), Some(direction)) => println!("{} nach {}", line.name, direction),
        (Some(line), None) => println!("{}", line.name),
        (None, Some(direction)) => println!("nach {}", direction),
        (None, None) => {}
    }
    println!();

    for stopover in &trip.stopovers {
        let arrival = stopover
            .arrival
            .map(|t| formatter.format_time(t))
            .unwrap_or_default();
        let departure = stopover
            .departure
            .map(|t| formatter.format_time(t))
            .unwrap_or_default();
        println!("  {:>5}  {:>5}  {}", arrival, departure, stopover.stop.name);
        for remark in stopover.remarks() {
            if remark.is_warning() && remark.applies_to(trip.product()) {
                if let Some(text) = remark.display_text() {
                    println!("                {}", console::style(text).yellow());
                }
            }
        }
    }

    println!();
    println!(
        "{} stops, path with {} points",
        trip.stopovers.len(),
        trip.path().len()
    );
}
