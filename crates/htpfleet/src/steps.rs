//! Step log for deployments
//!
//! Every workflow step is printed with a wall-clock timestamp and its
//! duration; a summary closes the run.

use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Steps of the deployment workflows, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    SetupNetwork,
    ServerFirewall,
    CreateServer,
    UpdateDns,
    WaitDns,
    CertbotRule,
    AttachServer,
    BootServer,
    Bootstrap,
    WaitProxy,
    FinalRules,
    Reboot,
    AgentFirewall,
    WaitAccessKey,
    IssueVouchers,
    CreateAgents,
    WaitAgents,
}

impl DeployStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetupNetwork => "Setting up VPC network",
            Self::ServerFirewall => "Preparing server firewall",
            Self::CreateServer => "Creating Hashtopolis server",
            Self::UpdateDns => "Updating DNS A record",
            Self::WaitDns => "Waiting for DNS propagation",
            Self::CertbotRule => "Opening firewall for certbot (temporary)",
            Self::AttachServer => "Attaching server to VPC",
            Self::BootServer => "Booting server",
            Self::Bootstrap => "Waiting for bootstrap script",
            Self::WaitProxy => "Waiting for nginx",
            Self::FinalRules => "Setting final firewall rules",
            Self::Reboot => "Rebooting server",
            Self::AgentFirewall => "Preparing agent firewall",
            Self::WaitAccessKey => "Checking Hashtopolis access key",
            Self::IssueVouchers => "Issuing vouchers",
            Self::CreateAgents => "Deploying agents",
            Self::WaitAgents => "Waiting for agents to synchronize",
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepResult {
    Success { duration: Duration },
    Failed { error: String, duration: Duration },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Success { duration } | Self::Failed { duration, .. } => *duration,
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub struct StepLog {
    start_time: Instant,
    step_results: Vec<(DeployStep, StepResult)>,
    current_step: Option<(DeployStep, Instant)>,
}

impl StepLog {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            step_results: Vec::new(),
            current_step: None,
        }
    }

    pub fn start_step(&mut self, step: DeployStep) {
        println!("[{}] {} {}", timestamp().dimmed(), "▶".cyan(), step.name());
        self.current_step = Some((step, Instant::now()));
    }

    pub fn step_success(&mut self, message: Option<&str>) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            let msg = message.unwrap_or("done");
            println!(
                "[{}] {} {} ({})",
                timestamp().dimmed(),
                "✓".green().bold(),
                msg,
                format_duration(duration).dimmed()
            );
            self.step_results
                .push((step, StepResult::Success { duration }));
        }
    }

    pub fn step_failed(&mut self, error: &str) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            println!(
                "[{}] {} {}: {}",
                timestamp().dimmed(),
                "✗".red().bold(),
                step.name(),
                error.red()
            );
            self.step_results.push((
                step,
                StepResult::Failed {
                    error: error.to_string(),
                    duration,
                },
            ));
        }
    }

    /// Close the current step from a result, passing the result through
    pub fn finish<T, E: std::fmt::Display>(
        &mut self,
        result: std::result::Result<T, E>,
        message: Option<&str>,
    ) -> std::result::Result<T, E> {
        match &result {
            Ok(_) => self.step_success(message),
            Err(e) => self.step_failed(&e.to_string()),
        }
        result
    }

    pub fn log_detail(&self, message: &str) {
        println!("[{}]   → {}", timestamp().dimmed(), message.cyan());
    }

    /// Operator action item, printed in yellow
    pub fn log_action(&self, message: &str) {
        println!("[{}]   {} {}", timestamp().dimmed(), "!".yellow().bold(), message.yellow());
    }

    #[cfg(test)]
    pub fn completed(&self) -> impl Iterator<Item = DeployStep> + '_ {
        self.step_results
            .iter()
            .filter(|(_, result)| result.is_success())
            .map(|(step, _)| *step)
    }

    pub fn print_summary(&self, title: &str) {
        let total_duration = self.start_time.elapsed();
        let error_count = self
            .step_results
            .iter()
            .filter(|(_, result)| !result.is_success())
            .count();
        let slowest_step = self
            .step_results
            .iter()
            .map(|(step, result)| (step, result.duration()))
            .max_by_key(|(_, d)| *d);

        println!();
        println!("{}", "═".repeat(44));
        println!("Deploy Summary: {}", title.cyan().bold());
        println!("{}", "─".repeat(44));
        println!("Total time:    {}", format_duration(total_duration).green());
        if let Some((step, duration)) = slowest_step {
            println!(
                "Slowest step:  {} ({})",
                step.name(),
                format_duration(duration)
            );
        }
        if error_count > 0 {
            println!("Errors:        {}", error_count.to_string().red().bold());
            for (step, result) in &self.step_results {
                if let StepResult::Failed { error, .. } = result {
                    println!("  {} {}: {}", "✗".red(), step.name(), error);
                }
            }
        } else {
            println!("Errors:        {}", "0".green());
        }
        println!("{}", "═".repeat(44));
    }
}

impl Default for StepLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Spinner shown while polling
pub struct Spinner {
    progress_bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(message.to_string());

        Self { progress_bar: pb }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.progress_bar.set_message(msg.into());
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.progress_bar.is_finished() {
            self.progress_bar.finish_and_clear();
        }
    }
}

/// Format a duration for humans
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}

/// `m:ss` countdown label
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
