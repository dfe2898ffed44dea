use anyhow::Context;
use netpulse_core::{
    FieldValue, MonitorConfig, MonitorService, TimeSeriesWriter, WriteOutcome, classify,
};

pub fn run(config: MonitorConfig, write: bool, json: bool) -> anyhow::Result<()> {
    let service = super::make_service(config, false);
    super::runtime()?.block_on(poll_once(&service, write, json))
}

async fn poll_once(service: &MonitorService, write: bool, json: bool) -> anyhow::Result<()> {
    let snapshot = service.current_snapshot().await;
    let classification = classify(&snapshot);

    if json {
        let out = serde_json::json!({
            "target": service.target(),
            "collected_unix_ms": snapshot.collected_unix_ms(),
            "fields": snapshot.display_map(),
            "usable": &classification.usable,
            "critical": classification.has_critical_failure,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Snapshot from {} ({} fields, {} usable, {} failed)",
            service.target(),
            snapshot.len(),
            classification.usable.len(),
            snapshot.failed_count()
        );
        println!();
        for (name, value) in snapshot.display_map() {
            let (shown, status) = match value {
                FieldValue::Number(n) if classification.usable.contains(&name) => {
                    (n.to_string(), "persist")
                }
                FieldValue::Number(n) => (n.to_string(), ""),
                FieldValue::Text(t) => (t, "text"),
                FieldValue::Unavailable { error, detail } => (format!("{error}: {detail}"), "failed"),
            };
            println!("  {name:<14} {status:<8} {shown}");
        }
    }

    if !write {
        return Ok(());
    }
    if classification.has_critical_failure {
        anyhow::bail!("no metric answered; nothing written");
    }
    service.prepare_store().await.context("preparing database")?;
    match TimeSeriesWriter::new(service.store().clone())
        .write(&classification.usable, &snapshot)
        .await
    {
        WriteOutcome::Written { points } => {
            println!();
            println!("Wrote {points} points to '{}'", service.store().database());
            Ok(())
        }
        WriteOutcome::Failed(e) => Err(e).context("writing snapshot"),
    }
}
