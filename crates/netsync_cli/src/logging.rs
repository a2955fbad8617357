//! Console logging and per-kind log files.

use netsync_protocol::EntityKind;
use std::path::Path;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` when set, otherwise `debug` or `info`.
pub fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Installs the process-wide console subscriber.
pub fn init(debug: bool) {
    tracing_subscriber::fmt().with_env_filter(filter(debug)).init();
}

/// Runs `f` with its events also written to `<log_dir>/<kind>.log`.
///
/// Without a log directory, or when the file cannot be opened, `f` runs
/// under the global subscriber only.
pub fn scoped<T>(log_dir: Option<&Path>, debug: bool, kind: EntityKind, f: impl FnOnce() -> T) -> T {
    let Some(dir) = log_dir else {
        return f();
    };

    let appender = std::fs::create_dir_all(dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(kind.as_str())
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| e.to_string())
        });
    let appender = match appender {
        Ok(appender) => appender,
        Err(e) => {
            warn!(kind = %kind, dir = %dir.display(), error = %e, "cannot open log file");
            return f();
        }
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter(debug))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(appender).with_ansi(false));
    tracing::subscriber::with_default(subscriber, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn events_land_in_the_kind_file() {
        let dir = tempdir().unwrap();
        let value = scoped(Some(dir.path()), true, EntityKind::Interface, || {
            tracing::info!(count = 3, "reconciled interfaces");
            42
        });
        assert_eq!(value, 42);

        let log = std::fs::read_to_string(dir.path().join("interfaces.log")).unwrap();
        assert!(log.contains("reconciled interfaces"));
    }

    #[test]
    fn files_are_per_kind() {
        let dir = tempdir().unwrap();
        scoped(Some(dir.path()), true, EntityKind::Site, || tracing::info!("sites pass"));
        scoped(Some(dir.path()), true, EntityKind::Device, || tracing::info!("devices pass"));

        let sites = std::fs::read_to_string(dir.path().join("sites.log")).unwrap();
        assert!(sites.contains("sites pass"));
        assert!(!sites.contains("devices pass"));
        assert!(dir.path().join("devices.log").exists());
    }

    #[test]
    fn without_a_directory_the_closure_still_runs() {
        assert_eq!(scoped(None, false, EntityKind::Site, || "ran"), "ran");
    }
}
