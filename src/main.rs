use anyhow::Context;
use std::path::PathBuf;
use wgxlink::{
    default_config_path, init_logging, resolve_port, Config, Engine, SerialTransport,
    SystemClock, BUILD_DATE, VERSION,
};

/// Stream slot used for the scan listing
const SCAN_STREAM: usize = 0;

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("wgxlink {} (built {})", VERSION, BUILD_DATE);

    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let params = resolve_port(&config.connection)?;
    let transport = SerialTransport::open(&params)
        .with_context(|| format!("opening {}", params.port))?;

    let mut engine = Engine::new(transport, SystemClock::new(), config.engine.clone())?;
    engine.initialize()?;
    tracing::info!("Module firmware: {}", engine.version()?);

    engine.scan_wifi(SCAN_STREAM)?;
    println!("{:>4}  {:>3}  {:<17}  SSID", "RSSI", "CH", "BSSID");
    while let Some(network) = engine.read_scan_entry(SCAN_STREAM)? {
        println!(
            "{:>4}  {:>3}  {:<17}  {}",
            network.rssi, network.channel, network.mac, network.ssid
        );
    }
    engine.stream_close(SCAN_STREAM)?;

    Ok(())
}
