//! Replays a recorded SignalK stream.
//!
//! Reads newline-delimited JSON frames (hello, full snapshots, deltas) from
//! a file or stdin, feeds them to a [`Session`] in arrival order and drives
//! a wind widget from the resulting data tree.
//!
//! ```bash
//! signalk-replay recording.ndjson --widget-config wind.json
//! cat recording.ndjson | signalk-replay - --track vessels.urn:mrn:imo:mmsi:230099999
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use signalk_core::{Document, Hello, Session, ValueType};
use signalk_protocol::decode_frame;
use signalk_widgets::{WindReadings, WindWidget, WindWidgetConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "signalk-replay")]
#[command(about = "Replay a SignalK stream through the data tree", long_about = None)]
struct Cli {
    /// Recorded stream, one JSON frame per line ("-" for stdin)
    input: String,

    /// Wind widget settings (JSON)
    #[arg(short, long)]
    widget_config: Option<PathBuf>,

    /// Self identity for recordings that start without one
    #[arg(long = "self")]
    self_id: Option<String>,

    /// Secondary contexts to keep (e.g. AIS targets)
    #[arg(short, long)]
    track: Vec<String>,

    /// Wind history prune interval in milliseconds
    #[arg(long, default_value = "500")]
    prune_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,signalk_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.widget_config {
        Some(path) => WindWidgetConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WindWidgetConfig::default(),
    };

    let mut session = Session::new();
    if let Some(self_id) = &cli.self_id {
        session.ingest_document(&Document::Hello(Hello {
            name: None,
            version: "1.7.0".to_string(),
            timestamp: None,
            self_urn: self_id.clone(),
            roles: Vec::new(),
        }));
    }
    for context in &cli.track {
        session.track_context(context);
    }

    let mut widget = WindWidget::new(config)?;
    widget.start(&mut session);

    let reader = open_input(&cli.input).await?;
    let mut lines = reader.lines();
    let mut prune = tokio::time::interval(Duration::from_millis(cli.prune_ms));
    let mut last_readings = WindReadings::default();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!("Replaying {}", cli.input);
    let mut frames = 0usize;
    let mut rejected = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                frames += 1;
                match decode_frame(&line) {
                    Ok(document) => {
                        session.ingest_document(&document);
                    }
                    Err(e) => {
                        rejected += 1;
                        tracing::warn!("Skipping frame {}: {}", frames, e);
                    }
                }
            }
            _ = prune.tick() => {
                let dropped = widget.prune_history(chrono::Utc::now());
                if dropped > 0 {
                    tracing::trace!("Pruned {} wind samples", dropped);
                }
                let readings = widget.readings();
                if readings != last_readings {
                    log_readings(&readings, widget.sector());
                    last_readings = readings;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Received Ctrl+C, stopping replay");
                break;
            }
        }
    }

    widget.stop(&mut session);

    tracing::info!(
        "Replayed {} frames ({} rejected), {} paths, self {}",
        frames,
        rejected,
        session.store().len(),
        session.self_identity().unwrap_or("unknown")
    );
    log_readings(&widget.readings(), widget.sector());
    for path in session.list_self_paths_by_type(ValueType::Number) {
        tracing::debug!("{} sources={:?}", path, session.sources_for_path(&path));
    }

    Ok(())
}

async fn open_input(input: &str) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("opening {}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

fn log_readings(readings: &WindReadings, sector: Option<(f64, f64)>) {
    tracing::info!(
        "HDG {:.0} AWA {} AWS {} TWA {} TWS {} sector {}",
        readings.heading,
        fmt_opt(readings.app_wind_angle),
        fmt_opt(readings.app_wind_speed),
        fmt_opt(readings.true_wind_angle),
        fmt_opt(readings.true_wind_speed),
        sector
            .map(|(from, to)| format!("{:.0}-{:.0}", from, to))
            .unwrap_or_else(|| "-".to_string())
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "-".to_string())
}
