pub mod attendance;
pub mod audio;
pub mod capture;
pub mod cards;
pub mod cli;
pub mod db;
pub mod scanner;
pub mod settings;
pub mod storage;
mod utils;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use attendance::AttendanceToggle;
use cli::Cli;
use db::Database;
use settings::{data_dir, SettingsStore};

pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    toggle: AttendanceToggle<Database>,
}

impl AppState {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db = Database::new(data_dir.join("rollcall.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        Ok(Self {
            toggle: AttendanceToggle::new(db.clone()),
            db,
            settings,
        })
    }

    /// Shared toggle, so every action in this process goes through one
    /// write lock.
    pub fn toggle(&self) -> AttendanceToggle<Database> {
        self.toggle.clone()
    }
}

fn init_logging(verbose: bool) {
    let debug = verbose
        || std::env::var("ROLLCALL_DEBUG")
            .map(|value| value == "1")
            .unwrap_or(false);
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async move {
        let dir = data_dir()?;
        log::debug!("Using data directory {}", dir.display());
        let state = AppState::open(&dir)?;
        cli::dispatch(cli, &state).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn app_state_shares_one_toggle_and_creates_its_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();

        let group = state.db.create_group("Lab".into()).await.unwrap();
        state
            .settings
            .update(|s| s.group_id = Some(group.id.clone()))
            .unwrap();

        assert!(dir.path().join("rollcall.sqlite3").exists());
        assert!(dir.path().join("settings.json").exists());

        let reopened = AppState::open(dir.path()).unwrap();
        assert_eq!(reopened.settings.scanner().group_id, Some(group.id));
    }
}
