//! Geobin websocket server demo
//!
//! Run with: cargo run --example geobin_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example geobin_server                    # binds to 0.0.0.0:8080
//!   cargo run --example geobin_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example geobin_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Set GEOBIN_REDIS_URL (for example redis://127.0.0.1/) to fan out through
//! a Redis server instead of the in-process broker.
//!
//! The demo creates one bin and records a sample device callback into it
//! every few seconds. Connect a websocket client to watch them arrive:
//!
//!   websocat ws://localhost:8080/api/1/ws/<bin>

use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use geobin::{Geobin, GeobinServer, ServerConfig};

const DEFAULT_PORT: u16 = 8080;

fn parse_bind_addr(input: &str) -> Result<SocketAddr, String> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let with_port = if input.contains(':') {
        input.to_string()
    } else {
        format!("{}:{}", input, DEFAULT_PORT)
    };

    with_port
        .to_socket_addrs()
        .map_err(|e| format!("invalid bind address '{}': {}", input, e))?
        .next()
        .ok_or_else(|| format!("no address found for '{}'", input))
}

fn print_usage() {
    eprintln!("Usage: geobin_server [BIND_ADDR]");
    eprintln!();
    eprintln!("BIND_ADDR may be an address, a host, or host:port (default 0.0.0.0:8080)");
    eprintln!("GEOBIN_REDIS_URL selects a Redis backend (default: in-process broker)");
}

/// Record a wandering device position into `bin` forever
async fn simulate_device(app: Arc<Geobin>, bin: String) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut step = 0u32;

    loop {
        ticker.tick().await;
        step += 1;

        let lat = 45.52 + f64::from(step % 20) * 0.001;
        let lng = -122.68 + f64::from(step % 13) * 0.001;
        let body = format!(
            r#"{{"device": "demo", "fix": {{"latitude": {:.5}, "longitude": {:.5}, "accuracy": 12}}}}"#,
            lat, lng
        );

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        match app.record(&bin, headers, body.as_bytes()).await {
            Ok(record) => println!("Recorded step {} ({} finding(s))", step, record.geo.len()),
            Err(e) => {
                eprintln!("Demo bin stopped accepting records: {}", e);
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("geobin=debug".parse()?)
                .add_directive("geobin_server=debug".parse()?),
        )
        .init();

    let (app, pump) = match std::env::var("GEOBIN_REDIS_URL") {
        Ok(url) => {
            let (app, receiver) = Geobin::redis(config, &url).await?;
            let app = Arc::new(app);
            let pump = app.spawn_pump(receiver);
            (app, pump)
        }
        Err(_) => {
            let (app, receiver) = Geobin::in_memory(config)?;
            let app = Arc::new(app);
            let pump = app.spawn_pump(receiver);
            (app, pump)
        }
    };
    let purge = app.spawn_purge_task();

    let bin = app.create_bin().await?;
    println!("Starting geobin server on {}", app.config().bind_addr);
    println!();
    println!("Demo bin: {} (expires at unix {})", bin.id, bin.expires);
    println!("Watch:    ws://localhost:{}/api/1/ws/{}", app.config().bind_addr.port(), bin.id);
    println!();

    tokio::spawn(simulate_device(Arc::clone(&app), bin.id.clone()));

    let server = GeobinServer::new(Arc::clone(&app));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        result = pump => {
            match result {
                Ok(Err(e)) => eprintln!("Pump error: {}", e),
                Ok(Ok(())) => {}
                Err(e) => eprintln!("Pump task failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Shutting down...");
            let stats = app.registry().stats().await;
            println!("Viewers at shutdown: {} across {} bin(s)", stats.connections, stats.channels);
        }
    }

    purge.abort();
    Ok(())
}
