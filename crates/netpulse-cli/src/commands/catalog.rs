use netpulse_core::{HISTORY_METRICS, MetricCatalog};

pub fn run() {
    let catalog = MetricCatalog::default();
    println!("{} metrics:", catalog.len());
    println!();
    println!("  {:<14} {:<34} history", "name", "oid");
    for def in catalog.iter() {
        let in_history = if HISTORY_METRICS.contains(&def.name.as_str()) {
            "yes"
        } else {
            ""
        };
        println!("  {:<14} {:<34} {in_history}", def.name, def.oid);
    }
}
