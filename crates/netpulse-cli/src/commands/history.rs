use netpulse_core::{HISTORY_METRICS, MonitorConfig};

pub fn run(config: MonitorConfig, hours: u32, desc: bool, json: bool) -> anyhow::Result<()> {
    let service = super::make_service(config, false);
    let history = super::runtime()?.block_on(service.history(hours));
    let points = if desc {
        history.newest_first()
    } else {
        history.iter().collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    if points.is_empty() {
        println!("No samples in the last {hours}h.");
        return Ok(());
    }

    print!("  {:<26}", "timestamp");
    for metric in HISTORY_METRICS {
        print!(" {metric:>12}");
    }
    println!();
    for point in &points {
        print!("  {:<26}", point.timestamp().to_rfc3339());
        for metric in HISTORY_METRICS {
            match point.get(metric) {
                Some(v) => print!(" {v:>12.2}"),
                None => print!(" {:>12}", "-"),
            }
        }
        println!();
    }
    println!();
    println!("{} points", points.len());
    Ok(())
}
