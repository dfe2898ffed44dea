use std::time::Instant;

use netpulse_core::{MonitorConfig, MonitorService, RawResult};

pub fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let version = config.snmp.version;
    let service = MonitorService::from_config(config);
    println!("Probing {} (SNMP {version:?})", service.target());

    let t0 = Instant::now();
    let result = super::runtime()?.block_on(service.probe());
    let elapsed = t0.elapsed();

    match result {
        RawResult::Ok(descr) => {
            println!("  Status:  connected");
            println!("  sysDescr: {descr}");
            println!("  Time:    {:.3}s", elapsed.as_secs_f64());
            Ok(())
        }
        RawResult::Failed { kind, detail } => {
            println!("  Status:  failed");
            println!("  Time:    {:.3}s", elapsed.as_secs_f64());
            anyhow::bail!("device did not answer: {kind}: {detail}")
        }
    }
}
