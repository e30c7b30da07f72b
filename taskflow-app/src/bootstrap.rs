/// Application bootstrap
///
/// Turns an [`AppConfig`] into a running [`App`]: opens the configured
/// store, mounts the sync layer on it and waits for the first tasks
/// snapshot. Sessions and the reminder routine are built from the mounted
/// layer.
///
/// # Example
///
/// ```no_run
/// use taskflow_app::{bootstrap::App, config::AppConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let app = App::start(AppConfig::from_env()?).await?;
/// let session = app.session()?;
/// println!("{:?}", session.state());
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;
use taskflow_notifier::notifiers::{notifier_for, EmailJsNotifier, Notifier};
use taskflow_notifier::reminder::{ReminderConfig, ReminderRoutine};
use taskflow_shared::redis::RedisClient;
use taskflow_shared::session::{FileSessionStore, Session};
use taskflow_shared::store::Store;
use taskflow_shared::sync::SyncLayer;

use crate::config::{AppConfig, Backend};

/// How long start-up waits for the first tasks snapshot
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the store selected by `config`
pub async fn open_store(config: &AppConfig) -> anyhow::Result<Store> {
    match config.backend {
        Backend::Local => {
            tracing::info!(dir = %config.data_dir.display(), "Using local store");
            Ok(Store::local(&config.data_dir)?)
        }
        Backend::Shared => {
            let client = RedisClient::new(config.redis_config()?).await?;
            tracing::info!(
                redis = %client.url(),
                prefix = %config.key_prefix,
                "Using shared store"
            );
            Ok(Store::shared(client, &config.key_prefix))
        }
    }
}

/// Mounted application
pub struct App {
    pub config: AppConfig,
    pub sync: Arc<SyncLayer>,
    http: reqwest::Client,
}

impl App {
    /// Opens the store and mounts the sync layer
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened, a subscription fails,
    /// or no tasks snapshot arrives in time.
    pub async fn start(config: AppConfig) -> anyhow::Result<Self> {
        let store = open_store(&config).await?;
        let sync = Arc::new(SyncLayer::mount(store).await?);

        if tokio::time::timeout(READY_TIMEOUT, sync.wait_until_ready())
            .await
            .is_err()
        {
            sync.teardown();
            anyhow::bail!("timed out waiting for the tasks collection to load");
        }

        let replica = sync.snapshot();
        tracing::info!(
            users = replica.users.len(),
            groups = replica.groups.len(),
            tasks = replica.tasks.len(),
            "Replica ready"
        );

        Ok(App {
            config,
            sync,
            http: reqwest::Client::new(),
        })
    }

    /// New session remembering its user in the configured session file
    pub fn session(&self) -> anyhow::Result<Session> {
        let session = Session::init(
            self.sync.clone(),
            FileSessionStore::new(self.config.session_path()),
            self.config.start_location()?,
        )?;
        Ok(session)
    }

    /// Channel for user-initiated notices under the current preference
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        notifier_for(&self.sync.config(), self.http.clone())
    }

    /// Daily reminder routine; always sends through the mail relay
    pub fn reminder_routine(&self) -> ReminderRoutine {
        ReminderRoutine::with_config(
            self.sync.clone(),
            Arc::new(EmailJsNotifier::with_client(self.http.clone())),
            ReminderConfig {
                check_interval_secs: self.config.reminder_interval_secs,
            },
        )
    }

    /// Closes every subscription
    pub fn shutdown(&self) {
        self.sync.teardown();
    }
}
