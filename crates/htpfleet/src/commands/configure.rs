//! Interactive settings file creation

use crate::console::{self, Prompt};
use crate::error::{Result, WorkflowError};
use colored::Colorize;
use htpfleet_config::{
    ClusterSettings, Config, DEFAULT_CLUSTER_PREFIX, Keys, PLACEHOLDER_ACCESS_KEY, StackScripts,
};
use std::path::Path;

/// Load the settings file, running the wizard first if there is none
pub async fn load_or_create(path: &Path, prompt: &mut dyn Prompt) -> Result<Config> {
    let config = if path.exists() {
        println!("# Reading config file");
        htpfleet_config::load(path)?
    } else {
        println!("# No config file found");
        create(path, prompt).await?
    };
    config.validate()?;
    Ok(config)
}

/// Ask for every setting and write the file
///
/// The coordinator key starts as a placeholder: the real one can only be
/// created once the server is running.
pub async fn create(path: &Path, prompt: &mut dyn Prompt) -> Result<Config> {
    println!("# Creating config file");

    let keys = Keys {
        linode: prompt.ask(" - enter Linode API key: ").await?,
        godaddy_key: prompt.ask(" - enter GoDaddy key: ").await?,
        godaddy_secret: prompt.ask(" - enter GoDaddy secret: ").await?,
        hashtopolis: PLACEHOLDER_ACCESS_KEY.to_string(),
    };

    let stackscripts = StackScripts {
        server: ask_id(prompt, " - enter server StackScripts ID: ").await?,
        agent: ask_id(prompt, " - enter agent StackScripts ID: ").await?,
    };

    let question = format!(
        " - enter cluster prefix (default: {}): ",
        DEFAULT_CLUSTER_PREFIX
    );
    let prefix = prompt.ask(&question).await?;
    let cluster_prefix = if prefix.trim().is_empty() {
        DEFAULT_CLUSTER_PREFIX.to_string()
    } else {
        prefix
    };

    let mut config = Config {
        keys,
        stackscripts,
        settings: ClusterSettings {
            cluster_prefix,
            domain: String::new(),
            autoclean_when_failed: false,
        },
        provisioning: Default::default(),
        timing: Default::default(),
    };

    // nothing is written until the file would load again
    loop {
        config.settings.domain = prompt.ask(" - enter domain name: ").await?;
        match config.validate() {
            Ok(()) => break,
            Err(e) => println!("{}", e.to_string().yellow()),
        }
    }

    htpfleet_config::save(path, &config)?;
    println!("{} {}", "# Config file created:".green(), path.display());
    Ok(config)
}

/// Numeric StackScript id; asks again until one parses
async fn ask_id(prompt: &mut dyn Prompt, question: &str) -> Result<u64> {
    loop {
        let answer = prompt.ask(question).await?;
        match answer.parse::<u64>() {
            Ok(id) => return Ok(id),
            Err(_) => println!("{}", format!("'{}' is not a StackScript ID", answer).yellow()),
        }
    }
}

/// Overwrite (or create) the settings file after an explicit yes
pub async fn reconfigure(path: &Path, prompt: &mut dyn Prompt) -> Result<Config> {
    let question = if path.exists() {
        println!("# Config file found");
        "# Reconfigure?"
    } else {
        println!("# No config file found");
        "# Create config file?"
    };

    if !console::confirm(prompt, question).await? {
        return Err(WorkflowError::Declined);
    }
    create(path, prompt).await
}
