//! On-disk layout.
//!
//! Logs, saved results and `config.json` live next to the executable. Pending
//! records go to the platform's local data directory so that every entry
//! point shares one store.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static APP_DIRS: OnceLock<AppDirs> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub root: PathBuf,
    pub logs: PathBuf,
    pub screenshots: PathBuf,
    pub store: PathBuf,
}

impl AppDirs {
    /// Layout under `root`, with the store at `store`.
    pub fn new(root: impl Into<PathBuf>, store: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            logs: root.join("logs"),
            screenshots: root.join("screenshots"),
            store: store.into(),
            root,
        }
    }

    /// Layout for the running executable.
    ///
    /// Falls back to the working directory when the executable cannot be
    /// located, and to `<root>/pending` without a local data directory.
    pub fn locate() -> Self {
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let store = dirs::data_local_dir()
            .map(|dir| dir.join("arcshot").join("pending"))
            .unwrap_or_else(|| root.join("pending"));
        Self::new(root, store)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs.join("arcshot.log")
    }

    /// Creates every directory of the layout.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.logs, &self.screenshots, &self.store] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// The layout of the running executable, located once.
pub fn app_dirs() -> &'static AppDirs {
    APP_DIRS.get_or_init(AppDirs::locate)
}

/// Filename for a saved result, e.g. `arcshot_20260117_093015.png`.
pub fn output_filename(at: DateTime<Local>) -> String {
    format!("arcshot_{}.png", at.format("%Y%m%d_%H%M%S"))
}

/// A path in `dir` for a result saved at `at` that does not overwrite an
/// earlier one from the same second.
pub fn output_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    let path = dir.join(output_filename(at));
    if !path.exists() {
        return path;
    }
    let stem = format!("arcshot_{}", at.format("%Y%m%d_%H%M%S"));
    (2..)
        .map(|n| dir.join(format!("{}_{}.png", stem, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}
