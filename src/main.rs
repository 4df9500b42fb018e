//! Binary entrypoint for the stxframe CLI.
//!
//! Commands:
//! - `decode [--file <path> | --hex <bytes>] [--json]` - decode a capture (stdin by default)
//! - `encode <hex payload>` - print the framed bytes for a payload
//! - `listen [--port <path>] [-b <baud>]` - decode a live serial link until Ctrl-C
//! - `init` - create a starter `config.toml`
//!
//! See the library crate docs for module‑level details: `stxframe::`.
use std::io::Write;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};

use stxframe::config::Config;
use stxframe::logutil::{hex_snippet, parse_hex};
use stxframe::metrics::DecoderStats;
use stxframe::protocol::{encode_frame_with_capacity, FrameDecoder, FrameError, PacketSink, Phase};

#[derive(Parser)]
#[command(name = "stxframe")]
#[command(about = "Decode STX/ETX framed packets from byte streams and serial links")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a recorded byte stream
    Decode {
        /// Binary capture file to read
        #[arg(short, long, conflicts_with = "hex")]
        file: Option<String>,
        /// Bytes given as hex text, e.g. "02 04 0a 0b 0c 0d 00 03"
        #[arg(long)]
        hex: Option<String>,
        /// Emit one JSON object per line instead of text
        #[arg(long)]
        json: bool,
    },
    /// Frame a payload for transmission
    Encode {
        /// Payload bytes as hex text
        payload: String,
    },
    /// Decode a live serial link
    Listen {
        /// Serial device (e.g., /dev/ttyUSB0); overrides the config file
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate; overrides the config file
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        /// Emit one JSON object per line instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write a default configuration file
    Init,
}

/// Prints every decoder notification to stdout.
struct ConsoleSink {
    json: bool,
    log_payloads: bool,
}

impl PacketSink for ConsoleSink {
    fn on_packet(&mut self, payload: &[u8]) {
        if self.log_payloads {
            debug!("packet {} bytes: {}", payload.len(), hex_snippet(payload, 64));
        }
        let mut out = std::io::stdout().lock();
        let _ = if self.json {
            let line = serde_json::json!({
                "event": "packet",
                "length": payload.len(),
                "payload": hex_snippet(payload, usize::MAX),
            });
            writeln!(out, "{}", line)
        } else {
            writeln!(
                out,
                "packet len={} [{}]",
                payload.len(),
                hex_snippet(payload, usize::MAX)
            )
        };
    }

    fn on_error(&mut self, error: FrameError) {
        let mut out = std::io::stdout().lock();
        let _ = if self.json {
            let line = serde_json::json!({ "event": "error", "error": error });
            writeln!(out, "{}", line)
        } else {
            writeln!(out, "error {}", error)
        };
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config, so it must not depend on one existing
    let config = match cli.command {
        Commands::Init => None,
        _ => Config::load_if_present(&cli.config).await?,
    };
    init_logging(&config, cli.verbose);
    let config = match config {
        Some(cfg) => cfg,
        None => {
            debug!("No config at {}, using defaults", cli.config);
            Config::default()
        }
    };
    config.validate()?;

    match cli.command {
        Commands::Decode { file, hex, json } => {
            let mut decoder = FrameDecoder::with_capacity(
                ConsoleSink {
                    json,
                    log_payloads: config.decoder.log_payloads,
                },
                config.decoder.capacity,
            )?;
            let chunk = config.serial.read_chunk;
            let read = match (file, hex) {
                (Some(path), _) => {
                    let f = std::fs::File::open(&path)
                        .map_err(|e| anyhow!("Failed to open capture {}: {}", path, e))?;
                    stxframe::link::pump(f, &mut decoder, chunk)?
                }
                (None, Some(text)) => {
                    let bytes = parse_hex(&text)?;
                    stxframe::link::pump(std::io::Cursor::new(bytes), &mut decoder, chunk)?
                }
                (None, None) => stxframe::link::pump(std::io::stdin().lock(), &mut decoder, chunk)?,
            };
            info!("Decoded {} bytes", read);
            report(&mut std::io::stdout().lock(), decoder.phase(), decoder.stats(), json);
        }
        Commands::Encode { payload } => {
            let bytes = parse_hex(&payload)?;
            let frame = encode_frame_with_capacity(&bytes, config.decoder.capacity)
                .map_err(|e| anyhow!("Cannot frame payload: {}", e))?;
            let _ = writeln!(std::io::stdout().lock(), "{}", hex_snippet(&frame, usize::MAX));
        }
        Commands::Listen { port, baud, json } => {
            #[cfg(not(feature = "serial"))]
            {
                let _ = (port, baud, json);
                log::error!("listen requires the 'serial' feature");
                std::process::exit(2);
            }
            #[cfg(feature = "serial")]
            {
                use stxframe::link::SerialLink;
                let mut serial = config.serial.clone();
                if let Some(p) = port {
                    serial.port = p;
                }
                if let Some(b) = baud {
                    serial.baud_rate = b;
                }
                info!("Starting stxframe v{}", env!("CARGO_PKG_VERSION"));
                let mut link = SerialLink::open(&serial).await?;
                let mut decoder = FrameDecoder::with_capacity(
                    ConsoleSink {
                        json,
                        log_payloads: config.decoder.log_payloads,
                    },
                    config.decoder.capacity,
                )?;

                let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Ctrl-C received, closing link");
                        let _ = shutdown_tx.send(true);
                    }
                });

                link.run(&mut decoder, shutdown_rx).await?;
                report(&mut std::io::stdout().lock(), decoder.phase(), decoder.stats(), json);
            }
        }
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
    }

    Ok(())
}

/// Print end-of-stream statistics and note a packet left half-received.
///
/// Write failures (a closed pipe) are dropped, same as for decoded packets.
fn report<W: Write>(out: &mut W, phase: Phase, stats: DecoderStats, json: bool) {
    if phase != Phase::AwaitStart {
        warn!("Stream ended mid-frame ({}); partial packet not reported", phase.name());
    }
    let _ = if json {
        let line = serde_json::json!({ "event": "summary", "stats": stats, "phase": phase.name() });
        writeln!(out, "{}", line)
    } else {
        writeln!(
            out,
            "summary bytes={} noise={} packets={} errors={} (length={} checksum={} terminator={})",
            stats.bytes_processed,
            stats.noise_bytes,
            stats.packets_ok,
            stats.errors(),
            stats.invalid_length,
            stats.checksum_mismatch,
            stats.bad_terminator
        )
    };
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    // CLI verbosity raises the configured level, never lowers it
    let configured = config
        .as_ref()
        .map(|c| c.logging.level_filter())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => configured.max(log::LevelFilter::Debug),
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // Logs go to stderr so decoded output on stdout stays machine readable
    builder.target(env_logger::Target::Stderr);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    match log_file.and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    }) {
        Some(f) => {
            let file = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Mirror to the console only when someone is watching
            let is_tty = atty::is(atty::Stream::Stderr);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
