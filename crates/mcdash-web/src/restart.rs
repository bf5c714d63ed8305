//! Game server restart collaborator

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::process::Command;

pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_CONTAINER: &str = "paper-mc";

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("could not run {runtime}: {source}")]
    Spawn {
        runtime: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Something that can restart the game server
pub trait Restarter: Send + Sync {
    fn restart(&self) -> BoxFuture<'_, Result<(), RestartError>>;
}

/// Restarts the server container through a container runtime CLI
#[derive(Clone, Debug)]
pub struct ContainerRestarter {
    runtime: String,
    container: String,
}

impl ContainerRestarter {
    pub fn new(runtime: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

impl Default for ContainerRestarter {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME, DEFAULT_CONTAINER)
    }
}

impl Restarter for ContainerRestarter {
    fn restart(&self) -> BoxFuture<'_, Result<(), RestartError>> {
        Box::pin(async move {
            let output = Command::new(&self.runtime)
                .arg("restart")
                .arg(&self.container)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| RestartError::Spawn {
                    runtime: self.runtime.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(RestartError::Failed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            tracing::info!(runtime = %self.runtime, container = %self.container, "container restarted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let restarter = ContainerRestarter::default();
        assert_eq!(restarter.runtime, "docker");
        assert_eq!(restarter.container(), "paper-mc");
    }

    #[tokio::test]
    async fn test_missing_runtime_is_spawn_error() {
        let restarter = ContainerRestarter::new("mcdash-no-such-runtime", "paper-mc");
        assert!(matches!(
            restarter.restart().await,
            Err(RestartError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_outcome() {
        assert!(ContainerRestarter::new("true", "paper-mc").restart().await.is_ok());
        assert!(matches!(
            ContainerRestarter::new("false", "paper-mc").restart().await,
            Err(RestartError::Failed { .. })
        ));
    }
}
