//! Supervision of the per-tenant import runners.
//!
//! The manager is a single worker task owning the tenant → runner map and
//! serialising all changes to it, so it needs no locking. Deleting a
//! runner is synchronous: the caller must know the runner has stopped
//! before it removes the tenant's persisted state, since a live runner
//! writes history.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::runner::{ImportRunner, RunnerConfig};

enum Command {
    Add(RunnerConfig),
    Delete {
        tenant: String,
        ack: oneshot::Sender<()>,
    },
    Quit {
        ack: oneshot::Sender<()>,
    },
}

/// Owner of the dynamic set of import runners.
pub struct ImportManager {
    commands: mpsc::Sender<Command>,
}

impl ImportManager {
    /// Start the manager worker.
    #[must_use]
    pub fn new() -> Self {
        let (commands, command_rx) = mpsc::channel(16);
        tokio::spawn(manage(command_rx));
        Self { commands }
    }

    /// Start a runner for the configuration, replacing (after a clean
    /// stop) any existing runner for the same tenant.
    pub async fn add_runner(&self, config: RunnerConfig) {
        let _ = self.commands.send(Command::Add(config)).await;
    }

    /// Stop and remove the tenant's runner. Returns only after the runner
    /// has acknowledged stopping.
    pub async fn delete_runner(&self, tenant: &str) {
        let (ack, ack_rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Delete {
                tenant: tenant.to_string(),
                ack,
            })
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }

    /// Stop every runner and the manager itself.
    pub async fn quit(&self) {
        let (ack, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Quit { ack }).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn manage(mut commands: mpsc::Receiver<Command>) {
    let mut runners: HashMap<String, ImportRunner> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Add(config) => {
                let tenant = config.tenant.clone();
                if let Some(old) = runners.remove(&tenant) {
                    old.quit().await;
                }
                info!(tenant, "starting import runner");
                runners.insert(tenant, ImportRunner::new(config));
            }
            Command::Delete { tenant, ack } => {
                if let Some(runner) = runners.remove(&tenant) {
                    runner.quit().await;
                    info!(tenant, "stopped import runner");
                }
                let _ = ack.send(());
            }
            Command::Quit { ack } => {
                for (tenant, runner) in runners.drain() {
                    runner.quit().await;
                    info!(tenant, "stopped import runner");
                }
                let _ = ack.send(());
                return;
            }
        }
    }
}
