use std::sync::Arc;

use anyhow::Context;
use netpulse_core::MonitorConfig;
use tokio_util::sync::CancellationToken;

pub fn run(config: MonitorConfig, host: &str, port: u16, memory_store: bool) -> anyhow::Result<()> {
    let interval = config.schedule.interval;
    let startup_delay = config.schedule.startup_delay;
    let store_desc = if memory_store {
        "in-memory store".to_string()
    } else {
        format!("InfluxDB {} / {}", config.store.url(), config.store.database)
    };
    let service = Arc::new(super::make_service(config, memory_store));

    let base = format!("http://{host}:{port}");
    println!("netpulse v{}", netpulse_core::VERSION);
    println!("   device   {}", service.target());
    println!("   store    {store_desc}");
    println!(
        "   polling  {} metrics every {:?} (first tick after {:?})",
        service.catalog().len(),
        interval,
        startup_delay
    );
    println!();
    println!("   Endpoints:");
    println!("     GET /                 Current snapshot (also /snmp)");
    println!("     GET /api/history      Aligned cpuUsage/ramUsage history");
    println!("                           ?hours=1-720 (default 24), ?order=desc");
    println!("     GET /api/devices      Device registry and live probe");
    println!("     GET /api/status       Process and scheduler status");
    println!();
    println!("   Try: curl {base}/api/history?hours=1");
    println!();

    let rt = super::runtime()?;
    rt.block_on(async move {
        if let Err(e) = service.prepare_store().await {
            log::warn!("could not prepare database, writes will fail until it exists: {e}");
        }

        let cancel = CancellationToken::new();
        let scheduler = service.scheduler().spawn(cancel.clone());

        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received, shutting down");
            }
            on_signal.cancel();
        });

        let served = netpulse_server::run_server(service, host, port, cancel.clone()).await;
        cancel.cancel();
        if let Err(e) = scheduler.await {
            log::error!("scheduler task ended abnormally: {e}");
        }
        served.with_context(|| format!("HTTP server on {host}:{port}"))
    })
}
