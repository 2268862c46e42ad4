//! Settings: `config/groupledger.toml`, then `GROUPLEDGER_*` environment
//! variables, then command line flags.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use ledger_engine::{Collections, MonthFilter, Selection, ViewMode};

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/groupledger.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub dir: PathBuf,
    pub prefix: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "groupledger".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub level: String,
    pub collections: Collections,
    /// JSON file loaded into the in-memory store at startup.
    pub seed: Option<PathBuf>,
    pub export: ExportSettings,
    pub view: String,
    pub month: String,
    /// Not read from the config file, only from `--export`.
    #[serde(skip)]
    pub write_export: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            collections: Collections::default(),
            seed: None,
            export: ExportSettings::default(),
            view: ViewMode::Total.as_str().to_string(),
            month: MonthFilter::All.to_string(),
            write_export: false,
        }
    }
}

impl Settings {
    /// Initial view selection. Fails on an unknown view or a malformed month.
    pub fn selection(&self) -> Result<Selection> {
        Ok(Selection {
            mode: self.view.parse()?,
            month: self.month.parse()?,
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "groupledger", version, about = "Travel group and business project ledger")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override log level.
    #[arg(long)]
    level: Option<String>,
    /// Seed file (JSON) for the in-memory store.
    #[arg(long)]
    seed: Option<PathBuf>,
    /// View mode: travel, business or total.
    #[arg(long)]
    view: Option<String>,
    /// Month filter: all or YYYY-MM.
    #[arg(long)]
    month: Option<String>,
    /// Write the composed view as CSV to the export directory.
    #[arg(long)]
    export: bool,
}

pub fn load() -> Result<Settings> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("GROUPLEDGER").separator("__"));
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(level) = args.level {
        settings.level = level;
    }
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
    }
    if let Some(view) = args.view {
        settings.view = view;
    }
    if let Some(month) = args.month {
        settings.month = month;
    }
    settings.write_export = args.export;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_everything() {
        let selection = Settings::default().selection().unwrap();
        assert_eq!(selection, Selection::default());
    }

    #[test]
    fn bad_month_is_rejected() {
        let settings = Settings {
            month: "March".to_string(),
            ..Default::default()
        };
        assert!(settings.selection().is_err());
    }

    #[test]
    fn toml_overrides_defaults() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                level = "debug"
                view = "business"
                month = "2024-03"

                [collections]
                travel = "groups"

                [export]
                prefix = "march"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.level, "debug");
        assert_eq!(settings.collections.travel, "groups");
        assert_eq!(settings.collections.business, "business_projects");
        assert_eq!(settings.export.prefix, "march");
        let selection = settings.selection().unwrap();
        assert_eq!(selection.mode, ViewMode::BusinessOnly);
        assert_eq!(selection.month, MonthFilter::Month("2024-03".to_string()));
    }
}
