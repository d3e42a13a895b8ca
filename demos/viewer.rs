//! Channel viewer.
//!
//! Demonstrates:
//! - Opening a channel and waiting for the handshake
//! - Logging lifecycle events
//! - Drawing detection boxes into a raster overlay
//! - Issuing camera control calls
//!
//! Usage:
//!   cargo run --example viewer -- ws://192.168.1.20:7000 /live/cam-1
//!   cargo run --example viewer -- ws://192.168.1.20:7000 /live/cam-1 --debug
//!   cargo run --example viewer -- ws://192.168.1.20:7000 /live/cam-1 --no-wait

// ============================================================================
// Imports
// ============================================================================

use media_channel::{
    CameraControl, Connection, OverlayConfig, OverlayRenderer, RasterSurface, Result,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_ORIGIN: &str = "ws://127.0.0.1:7000";
const DEFAULT_PATH: &str = "/live";
const SNAPSHOT_PATH: &str = "./overlay.png";

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    origin: String,
    path: String,
    debug: bool,
    no_wait: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut positional = args.iter().filter(|a| !a.starts_with("--"));
        Self {
            origin: positional
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            path: positional
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_PATH.to_string()),
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "media_channel=debug"
    } else {
        "media_channel=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Media Channel Viewer ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Connecting...");
    println!("    Origin: {}", args.origin);
    println!("    Path:   {}", args.path);

    let connection = Connection::builder()
        .origin(&args.origin)
        .path(&args.path)
        .build()?;

    connection.on("shakeHandle", |event| {
        println!("    Playback: {}", event.path().unwrap_or("?"));
    });
    connection.on("error", |event| {
        println!("    ✗ {}", event.error().map(ToString::to_string).unwrap_or_default());
    });
    connection.on("close", |_| println!("    Channel closed"));

    let overlay = OverlayRenderer::attach(
        &connection,
        RasterSurface::new(1280, 720),
        OverlayConfig::default(),
    )?;

    connection.open(None)?;
    connection.opened().await?;
    println!("    ✓ Channel open ({:?})\n", connection.session_id());

    // ========================================================================
    // Camera
    // ========================================================================

    println!("[2] Camera control...");
    let camera = CameraControl::new(connection.clone());
    camera.on_sync(|auto_mode| println!("    Sync: auto mode {auto_mode}"));

    let ai = camera.set_ai(true).await;
    println!("    AI enabled: {ai}");

    let home = camera.home().await;
    println!("    Home: {} ({})\n", home.result, home.msg);

    // ========================================================================
    // Wait
    // ========================================================================

    if args.no_wait {
        println!("[--no-wait] Skipping wait");
    } else {
        println!("Press Ctrl+C to exit...");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            () = connection.closed() => {}
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[3] Saving overlay snapshot...");
    overlay.with_surface(|surface| surface.save_png(SNAPSHOT_PATH))?;
    println!("    ✓ {SNAPSHOT_PATH}");

    connection.close();
    connection.closed().await;
    println!("\n=== Done ===");
    Ok(())
}
