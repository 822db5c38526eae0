pub mod configure;
pub mod deploy;
pub mod remove;

use crate::backend::Backend;
use crate::cluster::{ClusterNames, Scope};
use crate::console::{self, Prompt};
use crate::error::Result;
use htpfleet_cloud::RetryPolicy;
use htpfleet_config::Config;
use std::path::PathBuf;

pub use deploy::DeployRequest;

/// Everything a workflow needs: settings, gateways and the operator
pub struct Session<'a> {
    pub config: Config,
    pub config_path: PathBuf,
    pub backend: &'a dyn Backend,
    pub prompt: &'a mut dyn Prompt,
    /// Skip plan confirmations (`--yes`)
    pub assume_yes: bool,
}

impl Session<'_> {
    pub fn names(&self) -> ClusterNames {
        ClusterNames::new(self.config.prefix())
    }

    pub fn provider_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.config.timing.provider_retry_delay(),
            self.config.timing.max_retries,
        )
    }

    pub fn coordinator_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.config.timing.coordinator_retry_delay(),
            self.config.timing.max_retries,
        )
    }

    /// Replace the settings with what is on disk now
    pub fn reload_config(&mut self) -> Result<()> {
        let config = htpfleet_config::load(&self.config_path)?;
        config.validate()?;
        self.config = config;
        Ok(())
    }
}

/// What the operator asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Deploy(DeployRequest),
    Remove { scope: Scope, force: bool },
    Configure,
    Exit,
}

impl Action {
    /// Whether the action changes cloud resources at all
    pub fn touches_cloud(&self) -> bool {
        matches!(self, Action::Deploy(_) | Action::Remove { .. })
    }
}

/// Main menu
pub async fn pick_action(prompt: &mut dyn Prompt) -> console::Result<Action> {
    println!("1. Full deploy");
    println!("2. Deploy server");
    println!("3. Deploy agents");
    println!("4. Clean up");
    println!("5. Configure");
    println!("6. Remove only agents");
    println!("7. Exit");

    let action = match console::choose(prompt, "# Choose an option: ", 7).await? {
        1 => Action::Deploy(DeployRequest::full()),
        2 => Action::Deploy(DeployRequest::server_only()),
        3 => Action::Deploy(DeployRequest::agents_only()),
        4 => Action::Remove {
            scope: Scope::Cluster,
            force: false,
        },
        5 => Action::Configure,
        6 => Action::Remove {
            scope: Scope::AgentsOnly,
            force: false,
        },
        _ => Action::Exit,
    };
    Ok(action)
}

/// Run one action to completion
pub async fn run(session: &mut Session<'_>, action: &Action) -> Result<()> {
    match action {
        Action::Deploy(request) => deploy::deploy(session, request).await,
        Action::Remove { scope, force } => remove::remove(session, *scope, *force).await,
        Action::Configure => {
            let path = session.config_path.clone();
            session.config = configure::reconfigure(&path, &mut *session.prompt).await?;
            Ok(())
        }
        Action::Exit => Ok(()),
    }
}
