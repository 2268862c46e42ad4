use std::{fs::File, io::BufWriter, path::Path, sync::Arc};

use chrono::Utc;
use ledger_engine::{
    Report, Session, format_bps,
    store::{MemoryStore, Seed},
};

use crate::{error::Result, settings::Settings};

mod error;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "groupledger={level},ledger_engine={level}",
            level = settings.level
        ))
        .init();

    let selection = settings.selection()?;
    let store = Arc::new(match &settings.seed {
        Some(path) => MemoryStore::from_seed(load_seed(path)?),
        None => MemoryStore::new(),
    });

    let session = Session::builder()
        .store(store.clone())
        .authenticator(store)
        .collections(settings.collections.clone())
        .selection(selection)
        .build()
        .await?;

    let report = session.loaded().await?;
    print_summary(&report);

    if settings.write_export {
        export(&settings, &report)?;
    }

    session.shutdown();
    Ok(())
}

fn load_seed(path: &Path) -> Result<Seed> {
    let file = File::open(path)?;
    let seed: Seed = serde_json::from_reader(file)?;
    tracing::info!(
        "seeded {} documents from {}",
        seed.values().map(|docs| docs.len()).sum::<usize>(),
        path.display()
    );
    Ok(seed)
}

fn print_summary(report: &Report) {
    let stats = &report.stats;
    println!(
        "view: {} / {}",
        report.selection.mode.as_str(),
        report.selection.month
    );
    if let Some(banner) = report.banner() {
        println!("warning: {banner}");
    }
    println!("revenue:  {}", stats.total_revenue);
    println!("expense:  {}", stats.total_expense);
    println!(
        "profit:   {} (margin {})",
        stats.total_profit,
        format_bps(stats.margin_bps(), 1)
    );
    println!(
        "groups confirmed: {}, pax: {}, projects: {}",
        stats.active_groups, stats.total_pax, stats.project_count
    );

    if report.statuses.total() > 0 {
        let statuses: Vec<String> = report
            .statuses
            .entries()
            .into_iter()
            .map(|(bucket, count)| format!("{} {count}", bucket.as_str()))
            .collect();
        println!("status: {}", statuses.join(", "));
    }

    for point in report.chart.iter().take(5) {
        println!(
            "  {:<24} {:>14} {:>14}",
            point.name,
            point.revenue.to_string(),
            point.profit.to_string()
        );
    }

    println!("{} records", report.items.len());
    for item in &report.items {
        println!(
            "  {:<10} {:<8} {:<24} {:>14}",
            item.date(),
            item.kind().as_str(),
            item.display_name(),
            item.profit().to_string()
        );
    }
    if !report.months.is_empty() {
        println!("months: {}", report.months.join(", "));
    }
}

fn export(settings: &Settings, report: &Report) -> Result<()> {
    std::fs::create_dir_all(&settings.export.dir)?;
    let path = settings.export.dir.join(ledger_engine::file_name(
        &settings.export.prefix,
        Utc::now().date_naive(),
    ));
    let file = BufWriter::new(File::create(&path)?);
    let rows = ledger_engine::write_csv(&report.items, file)?;
    tracing::info!("exported {rows} rows to {}", path.display());
    Ok(())
}
