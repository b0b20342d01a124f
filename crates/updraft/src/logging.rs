//! Diagnostic log for update checks.
//!
//! Records from the `updraft*` targets go to a log file next to the
//! application's other logs (and to the terminal in debug builds), so a
//! user reporting "it never finds updates" can attach one file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, info};
#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use updraft_platform::AppPaths;

use crate::config::UpdaterConfig;

/// Log destination and verbosity, taken from [`UpdaterConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub file: PathBuf,
    pub max_bytes: u64,
    pub verbose: bool,
}

impl LogSettings {
    #[must_use]
    pub fn new(paths: &AppPaths, config: &UpdaterConfig) -> Self {
        Self {
            file: paths.log_file(),
            max_bytes: config.max_log_size_bytes,
            verbose: config.debug_logging,
        }
    }
}

/// Append-only handle on the update log.
///
/// If the file disappears while the application runs (log cleaners, a user
/// deleting it to "reset" the updater), the next write recreates it.
struct UpdateLogFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl UpdateLogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = open_for_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append(&self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so concurrent writers reopen at most once.
        if !self.path.exists() {
            *file = open_for_append(&self.path)?;
        }
        file.write(buf)
    }

    fn sync(&self) -> io::Result<()> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

impl Write for UpdateLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync()
    }
}

fn open_for_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Shrink a log that grew past `max_bytes` down to its newest half.
///
/// Only whole lines are kept. Returns whether the file was rewritten.
fn shrink_log(path: &Path, max_bytes: u64) -> io::Result<bool> {
    let len = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if len <= max_bytes {
        return Ok(false);
    }

    let contents = std::fs::read(path)?;
    let budget = usize::try_from(max_bytes / 2).unwrap_or(usize::MAX);
    let cut = contents.len().saturating_sub(budget);
    let keep_from = contents[cut..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(contents.len(), |offset| cut + offset + 1);
    std::fs::write(path, &contents[keep_from..])?;
    Ok(true)
}

/// Install the process-wide logger for updater diagnostics.
///
/// If the host application already installed a `log` backend, updater
/// records keep flowing to it and this only adjusts the level.
///
/// # Errors
/// Returns an error when the log file cannot be trimmed or opened.
pub fn init_logging(settings: &LogSettings) -> io::Result<()> {
    let trimmed = shrink_log(&settings.file, settings.max_bytes)?;
    let writer = UpdateLogFile::open(settings.file.clone())?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("updraft")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    loggers.push(WriteLogger::new(LevelFilter::Debug, config, writer));

    let installed = CombinedLogger::init(loggers).is_ok();
    set_verbose_logging(settings.verbose);

    if !installed {
        debug!("A logger is already installed; keeping it for updater records");
    }
    if trimmed {
        info!(
            "Trimmed {} to stay under {} bytes",
            settings.file.display(),
            settings.max_bytes
        );
    }
    info!("Update log: {}", settings.file.display());
    Ok(())
}

/// Verbose logging records every check step; otherwise only warnings
/// (failed checks, skipped feed items) are kept.
pub fn set_verbose_logging(verbose: bool) {
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    });
}
