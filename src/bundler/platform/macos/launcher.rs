//! Launcher environment contract and the packaged-build smoke test.
//!
//! The bundle is read-only once signed. At first run the launcher points the
//! backend at user-space storage through four environment variables; this
//! module computes those locations, checks they lie outside the bundle, and
//! uses the same contract to boot a built bundle against a scratch directory
//! and poll its health endpoint.

use super::app::AppBundle;
use crate::bundler::error::ErrorExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Model weights directory.
pub const MODEL_DIR_VAR: &str = "HEARTMULA_MODEL_DIR";
/// Generated audio output directory.
pub const GENERATED_AUDIO_DIR_VAR: &str = "HEARTMULA_GENERATED_AUDIO_DIR";
/// Reference audio input directory.
pub const REF_AUDIO_DIR_VAR: &str = "HEARTMULA_REF_AUDIO_DIR";
/// Job database file.
pub const DB_PATH_VAR: &str = "HEARTMULA_DB_PATH";
/// Lets PyTorch fall back to CPU for operators Metal does not implement.
pub const MPS_FALLBACK_VAR: &str = "PYTORCH_ENABLE_MPS_FALLBACK";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// No home directory to derive user-space locations from.
    #[error("cannot determine the user's home directory")]
    NoHomeDirectory,

    /// A writable location resolves inside the read-only bundle.
    #[error("{var} points inside the bundle: {}", path.display())]
    InsideBundle {
        /// Variable name
        var: &'static str,
        /// Offending location
        path: PathBuf,
    },

    /// The bundled executable could not be started.
    #[error("failed to launch {}: {source}", path.display())]
    Spawn {
        /// Executable
        path: PathBuf,
        /// Spawn error
        source: std::io::Error,
    },

    /// The process exited before becoming healthy.
    #[error("bundled app exited before becoming healthy ({status})")]
    ExitedEarly {
        /// Exit status as reported by the OS
        status: String,
    },

    /// Health endpoint never answered with success.
    #[error("{url} did not become healthy within {}s", timeout.as_secs())]
    HealthTimeout {
        /// Polled endpoint
        url: String,
        /// Time allowed
        timeout: Duration,
    },

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error.
    #[error(transparent)]
    Bundler(#[from] crate::bundler::Error),
}

/// User-writable data locations handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocations {
    pub app_support: PathBuf,
    pub models: PathBuf,
    pub generated_audio: PathBuf,
    pub ref_audio: PathBuf,
    pub database: PathBuf,
    pub logs: PathBuf,
}

impl DataLocations {
    /// Layout rooted at `base`, logs in `base/logs`.
    pub fn under(base: &Path) -> Self {
        Self::with_logs(base, base.join("logs"))
    }

    fn with_logs(base: &Path, logs: PathBuf) -> Self {
        Self {
            app_support: base.to_path_buf(),
            models: base.join("models"),
            generated_audio: base.join("generated_audio"),
            ref_audio: base.join("ref_audio"),
            database: base.join("jobs.db"),
            logs,
        }
    }

    /// `~/Library/Application Support/HeartMuLa`, logs in `~/Library/Logs/HeartMuLa`.
    pub fn for_user(app_name: &str) -> Result<Self, LauncherError> {
        let home = dirs::home_dir().ok_or(LauncherError::NoHomeDirectory)?;
        let library = home.join("Library");
        Ok(Self::with_logs(
            &library.join("Application Support").join(app_name),
            library.join("Logs").join(app_name),
        ))
    }

    /// The four variables the backend reads.
    pub fn env(&self) -> [(&'static str, &Path); 4] {
        [
            (MODEL_DIR_VAR, &self.models),
            (GENERATED_AUDIO_DIR_VAR, &self.generated_audio),
            (REF_AUDIO_DIR_VAR, &self.ref_audio),
            (DB_PATH_VAR, &self.database),
        ]
    }

    /// Every location must resolve outside the bundle.
    pub fn check_outside(&self, bundle_root: &Path) -> Result<(), LauncherError> {
        for (var, path) in self.env() {
            if path.starts_with(bundle_root) {
                return Err(LauncherError::InsideBundle {
                    var,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Creates the directories (not the database file).
    pub async fn create(&self) -> crate::bundler::Result<()> {
        for dir in [
            &self.app_support,
            &self.models,
            &self.generated_audio,
            &self.ref_audio,
            &self.logs,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .fs_context("creating data directory", dir)?;
        }
        Ok(())
    }
}

/// Result of a passing smoke test.
#[derive(Debug, Clone)]
pub struct SmokeReport {
    pub url: String,
    pub elapsed: Duration,
}

/// Boots the bundled executable against `scratch` storage and waits for
/// `health_url` to answer with a success status.
///
/// The process is terminated before returning, whatever the outcome.
pub async fn smoke_test(
    bundle: &AppBundle,
    health_url: &str,
    timeout: Duration,
    scratch: &Path,
) -> Result<SmokeReport, LauncherError> {
    let locations = DataLocations::under(scratch);
    locations.check_outside(bundle.root())?;
    locations.create().await?;

    let executable = bundle.executable_path();
    let mut command = tokio::process::Command::new(&executable);
    command
        .current_dir(bundle.macos_dir())
        .kill_on_drop(true)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .env(MPS_FALLBACK_VAR, "1");
    for (var, path) in locations.env() {
        command.env(var, path);
    }

    log::info!("Launching {} for smoke test", executable.display());
    let mut child = command.spawn().map_err(|source| LauncherError::Spawn {
        path: executable.clone(),
        source,
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let started = Instant::now();

    let outcome = loop {
        if let Ok(Some(status)) = child.try_wait() {
            break Err(LauncherError::ExitedEarly {
                status: status.to_string(),
            });
        }

        match client.get(health_url).send().await {
            Ok(response) if response.status().is_success() => {
                break Ok(SmokeReport {
                    url: health_url.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            Ok(response) => log::debug!("{} answered {}", health_url, response.status()),
            Err(e) => log::debug!("{} not ready: {}", health_url, e),
        }

        if started.elapsed() >= timeout {
            break Err(LauncherError::HealthTimeout {
                url: health_url.to_string(),
                timeout,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if let Err(e) = child.kill().await {
        log::debug!("Smoke test process already gone: {}", e);
    }
    if let Ok(report) = &outcome {
        log::info!("✓ {} healthy after {:.1}s", report.url, report.elapsed.as_secs_f64());
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_locations_follow_library_layout() {
        let Ok(locations) = DataLocations::for_user("HeartMuLa") else {
            return;
        };
        assert!(locations.models.ends_with("Library/Application Support/HeartMuLa/models"));
        assert!(locations.database.ends_with("HeartMuLa/jobs.db"));
        assert!(locations.logs.ends_with("Library/Logs/HeartMuLa"));
    }

    #[test]
    fn locations_inside_bundle_are_rejected() {
        let bundle = Path::new("/dist/HeartMuLa Studio.app");
        let inside = DataLocations::under(&bundle.join("Contents/Resources"));
        let outside = DataLocations::under(Path::new("/Users/a/Library/Application Support/HeartMuLa"));

        assert!(matches!(
            inside.check_outside(bundle),
            Err(LauncherError::InsideBundle { var: MODEL_DIR_VAR, .. })
        ));
        assert!(outside.check_outside(bundle).is_ok());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::bundler::platform::macos::app::tests::skeleton;
        use std::os::unix::fs::PermissionsExt;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        fn bundle_running(dir: &Path, script: &str) -> AppBundle {
            let bundle = skeleton(&dir.join("Demo.app"), "Demo");
            let exe = bundle.executable_path();
            std::fs::write(&exe, script).unwrap();
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
            bundle
        }

        async fn health_server() -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 15\r\nconnection: close\r\n\r\n{\"status\":\"ok\"}")
                        .await;
                }
            });
            format!("http://{addr}/health")
        }

        #[tokio::test]
        async fn healthy_backend_passes() {
            let tmp = tempfile::tempdir().unwrap();
            let bundle = bundle_running(tmp.path(), "#!/bin/sh\nsleep 30\n");
            let url = health_server().await;

            let report = smoke_test(&bundle, &url, Duration::from_secs(10), &tmp.path().join("scratch"))
                .await
                .unwrap();

            assert_eq!(report.url, url);
            assert!(tmp.path().join("scratch/models").is_dir());
        }

        #[tokio::test]
        async fn early_exit_is_reported() {
            let tmp = tempfile::tempdir().unwrap();
            let bundle = bundle_running(tmp.path(), "#!/bin/sh\nexit 3\n");

            let err = smoke_test(
                &bundle,
                "http://127.0.0.1:9/health",
                Duration::from_secs(10),
                &tmp.path().join("scratch"),
            )
            .await
            .unwrap_err();

            assert!(matches!(err, LauncherError::ExitedEarly { .. }));
        }

        #[tokio::test]
        async fn launch_environment_matches_the_launcher() {
            let tmp = tempfile::tempdir().unwrap();
            let script = "#!/bin/sh\n\
                printf '%s|%s\\n' \"$PYTORCH_ENABLE_MPS_FALLBACK\" \"$HEARTMULA_MODEL_DIR\" \
                > \"$HEARTMULA_MODEL_DIR/../launch.env\"\n\
                exit 3\n";
            let bundle = bundle_running(tmp.path(), script);
            let scratch = tmp.path().join("scratch");

            let err = smoke_test(&bundle, "http://127.0.0.1:9/health", Duration::from_secs(10), &scratch)
                .await
                .unwrap_err();
            assert!(matches!(err, LauncherError::ExitedEarly { .. }));

            let seen = std::fs::read_to_string(scratch.join("launch.env")).unwrap();
            let (fallback, models) = seen.trim_end().split_once('|').unwrap();
            assert_eq!(fallback, "1");
            assert_eq!(Path::new(models), scratch.join("models"));
        }

        #[tokio::test]
        async fn silent_backend_times_out() {
            let tmp = tempfile::tempdir().unwrap();
            let bundle = bundle_running(tmp.path(), "#!/bin/sh\nsleep 30\n");

            let err = smoke_test(
                &bundle,
                "http://127.0.0.1:9/health",
                Duration::from_millis(500),
                &tmp.path().join("scratch"),
            )
            .await
            .unwrap_err();

            assert!(matches!(err, LauncherError::HealthTimeout { .. }));
        }
    }
}
