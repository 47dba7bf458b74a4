//! Terminal fleet monitor.
//!
//! Connects to the fleet server, loads the unit list, and prints the
//! user and every unit whenever the state changes. Type commands on
//! stdin:
//!
//! ```text
//! delay <unit> <minutes>   ask the server to delay a unit
//! load                     request the full unit list again
//! quit                     disconnect and exit
//! ```
//!
//! The server URL comes from the first argument, else `FLEETWATCH_URL`,
//! else `ws://localhost:8080/websocket`. Set `RUST_LOG=debug` to watch
//! every action go by.

use std::sync::Arc;

use fleetwatch::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Delay { unit: UnitNumber, minutes: i32 },
    Load,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Ok(None),
        ["load"] => Ok(Some(Input::Load)),
        ["quit"] | ["exit"] => Ok(Some(Input::Quit)),
        ["delay", unit, minutes] => {
            let unit = unit.parse().map_err(|_| format!("not a unit number: {unit}"))?;
            let minutes = minutes
                .parse()
                .map_err(|_| format!("not a number of minutes: {minutes}"))?;
            Ok(Some(Input::Delay {
                unit: UnitNumber(unit),
                minutes,
            }))
        }
        _ => Err(format!("unrecognized command: {line}")),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn render(state: &AppState) -> String {
    let mut out = format!("user: {}\n", state.user.name);
    if state.units.is_empty() {
        out.push_str("  (no units)\n");
    }
    for unit in &state.units {
        let status = if unit.is_arrived() { "arrived" } else { "en route" };
        out.push_str(&format!(
            "  {:>5}  {:<8} {:<16} at {:<16} {:+} min  {}\n",
            unit.unit_number.0,
            unit.kind,
            unit.label,
            unit.current_position,
            unit.delay_minutes,
            status,
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), FleetError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ClientConfig::from_env();
    if let Some(url) = std::env::args().nth(1) {
        config.url = url;
    }

    let client = FleetClient::builder(config)
        .inspector(Arc::new(TracingInspector))
        .build()?;
    client.load_units()?;

    let mut states = client.subscribe();
    let mut status = client.connection_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                println!("{}", render(&state));
            }

            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                tracing::info!(state = %current, "connection");
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // stdin closed
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "reading stdin failed");
                        break;
                    }
                };
                match parse_input(&line) {
                    Ok(None) => {}
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(Input::Load)) => client.load_units()?,
                    // A zero delay is not worth a round trip.
                    Ok(Some(Input::Delay { minutes: 0, .. })) => {
                        tracing::info!("ignoring zero-minute delay");
                    }
                    Ok(Some(Input::Delay { unit, minutes })) => {
                        client.delay_unit(unit, minutes)?;
                    }
                    Err(message) => eprintln!("{message}"),
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await;
    Ok(())
}
