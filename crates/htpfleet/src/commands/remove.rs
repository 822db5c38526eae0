//! Teardown of cluster resources
//!
//! Ownership is decided by label prefix only. Deletion runs instances first,
//! then firewalls, then the VPC: Linode refuses to delete a VPC that still
//! has attached interfaces.

use super::Session;
use crate::cluster::{OwnedResources, Scope};
use crate::console;
use crate::error::{Result, WorkflowError};
use colored::Colorize;

pub async fn remove(session: &mut Session<'_>, scope: Scope, force: bool) -> Result<()> {
    let provider = session.backend.provider();
    let names = session.names();
    let owned = OwnedResources::collect(provider, &names, scope).await?;

    if owned.is_empty() {
        match scope {
            Scope::Cluster => println!("# No entities to remove"),
            Scope::AgentsOnly => println!("# No agents to remove"),
        }
        return Ok(());
    }

    if !force {
        println!("# Following entities will be removed:");
        for label in owned.labels() {
            println!(" - {}", label.cyan());
        }
        if !console::confirm(&mut *session.prompt, "# Continue?").await? {
            return Err(WorkflowError::Declined);
        }
    }

    for instance in &owned.instances {
        println!("# Removing {}...", instance.label);
        provider.delete_instance(instance.id).await?;
        tracing::info!("Deleted instance {} ({})", instance.label, instance.id);
    }

    for firewall in &owned.firewalls {
        println!("# Removing {}...", firewall.label);
        provider.delete_firewall(firewall.id).await?;
        tracing::info!("Deleted firewall {} ({})", firewall.label, firewall.id);
    }

    for network in &owned.networks {
        println!("# Removing {}...", network.label);
        provider.delete_network(network.id).await?;
        tracing::info!("Deleted VPC {} ({})", network.label, network.id);
    }

    println!("{}", "# Finished".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FakeCloud, ScriptedPrompt, test_config};
    use std::path::PathBuf;

    fn populated() -> FakeCloud {
        FakeCloud::default()
            .with_network("htp-cluster-vpc", "htp-cluster-vpc-subnet")
            .with_firewall("htp_cluster_server_firewall")
            .with_instance("htp_cluster_server")
            .with_instance("htp_cluster_agent_01")
            .with_instance("htp_cluster_agent_02")
            .with_firewall("htp_cluster_agent_firewall")
            .with_instance("someone_elses_box")
            .with_network("other-vpc", "other-vpc-subnet")
    }

    async fn run(
        backend: &FakeBackend,
        prompt: &mut ScriptedPrompt,
        scope: Scope,
        force: bool,
    ) -> Result<()> {
        let mut session = Session {
            config: test_config(),
            config_path: PathBuf::from("htpfleet.yaml"),
            backend,
            prompt,
            assume_yes: false,
        };
        remove(&mut session, scope, force).await
    }

    #[tokio::test]
    async fn test_nothing_to_remove_does_not_prompt() {
        let backend = FakeBackend::new(FakeCloud::default().with_instance("unrelated"));
        let mut prompt = ScriptedPrompt::new(Vec::<String>::new());

        run(&backend, &mut prompt, Scope::Cluster, false)
            .await
            .unwrap();

        assert!(prompt.questions.is_empty());
        assert!(backend.cloud().deleted.is_empty());
    }

    #[tokio::test]
    async fn test_removes_in_dependency_order() {
        let backend = FakeBackend::new(populated());
        let mut prompt = ScriptedPrompt::new(["y"]);

        run(&backend, &mut prompt, Scope::Cluster, false)
            .await
            .unwrap();

        assert_eq!(
            backend.cloud().deleted,
            vec![
                "htp_cluster_server",
                "htp_cluster_agent_01",
                "htp_cluster_agent_02",
                "htp_cluster_server_firewall",
                "htp_cluster_agent_firewall",
                "htp-cluster-vpc",
            ]
        );
        let cloud = backend.cloud();
        assert_eq!(cloud.instances.len(), 1);
        assert_eq!(cloud.networks[0].label, "other-vpc");
    }

    #[tokio::test]
    async fn test_declined_keeps_everything() {
        let backend = FakeBackend::new(populated());
        let mut prompt = ScriptedPrompt::new(["maybe", "n"]);

        let err = run(&backend, &mut prompt, Scope::Cluster, false)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Declined));
        assert_eq!(prompt.questions, vec!["# Continue? [y/n]: ", "# [y/n]: "]);
        assert!(backend.cloud().deleted.is_empty());
    }

    #[tokio::test]
    async fn test_forced_removal_skips_prompt() {
        let backend = FakeBackend::new(populated());
        let mut prompt = ScriptedPrompt::new(Vec::<String>::new());

        run(&backend, &mut prompt, Scope::Cluster, true)
            .await
            .unwrap();

        assert!(prompt.questions.is_empty());
        assert_eq!(backend.cloud().deleted.len(), 6);
    }

    #[tokio::test]
    async fn test_agents_only_leaves_server_and_network() {
        let backend = FakeBackend::new(populated());
        let mut prompt = ScriptedPrompt::new(["y"]);

        run(&backend, &mut prompt, Scope::AgentsOnly, false)
            .await
            .unwrap();

        let cloud = backend.cloud();
        assert_eq!(
            cloud.deleted,
            vec!["htp_cluster_agent_01", "htp_cluster_agent_02"]
        );
        assert_eq!(cloud.firewalls.len(), 2);
        assert_eq!(cloud.networks.len(), 2);
    }

    #[tokio::test]
    async fn test_no_agents_message_path() {
        let backend = FakeBackend::new(
            FakeCloud::default()
                .with_instance("htp_cluster_server")
                .with_firewall("htp_cluster_server_firewall"),
        );
        let mut prompt = ScriptedPrompt::new(Vec::<String>::new());

        run(&backend, &mut prompt, Scope::AgentsOnly, false)
            .await
            .unwrap();

        assert!(prompt.questions.is_empty());
        assert!(backend.cloud().deleted.is_empty());
    }
}
