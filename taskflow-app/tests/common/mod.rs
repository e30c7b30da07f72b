/// Common test utilities for integration tests
///
/// Each context gets its own temporary data directory and a local-backend
/// [`App`] mounted on it.

use taskflow_app::bootstrap::App;
use taskflow_app::config::AppConfig;
use taskflow_shared::models::{AssigneeType, CreateTask, CreateUser, ReportingFrequency, UserRole};
use tempfile::TempDir;

/// Test context owning the data directory
pub struct TestContext {
    pub dir: TempDir,
    pub app: App,
}

impl TestContext {
    /// Starts an app on a fresh data directory
    pub async fn new() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let app = App::start(Self::config_for(&dir, None)).await?;
        Ok(TestContext { dir, app })
    }

    /// Configuration pointing at `dir`, optionally with a start address
    pub fn config_for(dir: &TempDir, location: Option<String>) -> AppConfig {
        AppConfig {
            data_dir: dir.path().to_path_buf(),
            location,
            ..AppConfig::default()
        }
    }

    /// Starts a second app on the same data directory
    pub async fn restart(&self, location: Option<String>) -> anyhow::Result<App> {
        App::start(Self::config_for(&self.dir, location)).await
    }
}

pub fn executor(name: &str) -> CreateUser {
    CreateUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role: UserRole::Executor,
        password: Some("secret".to_string()),
        avatar: None,
    }
}

pub fn task_for(assignee_id: &str) -> CreateTask {
    CreateTask {
        title: "Prepare quarterly report".to_string(),
        description: "Numbers for Q3".to_string(),
        assignee_id: assignee_id.to_string(),
        assignee_type: AssigneeType::User,
        due_date: 0,
        estimated_duration: 4.0,
        reporting_frequency: ReportingFrequency::Daily,
        subtasks: vec!["Collect".to_string(), "Summarize".to_string()],
    }
}
