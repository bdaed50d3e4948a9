// CLI for diagnosing secret resolution in deployed environments

pub mod diagnose;

use std::sync::Arc;

use clap::{Parser, ValueEnum};

use crate::config::{ConfigContext, Environment, HealthStatus, IsolatedEnvironment};

/// Deployed environments the diagnostic can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetEnvironment {
    Staging,
    Production,
}

impl From<TargetEnvironment> for Environment {
    fn from(target: TargetEnvironment) -> Self {
        match target {
            TargetEnvironment::Staging => Environment::Staging,
            TargetEnvironment::Production => Environment::Production,
        }
    }
}

/// Check that Secret Manager and both secret resolvers work for an environment
#[derive(Debug, Parser)]
#[command(name = "diagnose-secret-manager")]
#[command(about = "Diagnose Secret Manager access and secret resolution", long_about = None)]
pub struct Cli {
    /// Environment to check; detected from the environment when omitted
    #[arg(long, value_enum)]
    pub environment: Option<TargetEnvironment>,

    /// Print the report as JSON instead of the human-readable summary
    #[arg(long)]
    pub json: bool,
}

/// Execute the diagnostic
///
/// # Arguments
/// * `cli` - Parsed CLI arguments
/// * `env` - Environment store to diagnose
///
/// # Returns
/// * `Ok(status)` - Overall status; callers map anything but healthy to a failing exit code
/// * `Err(...)` - The report could not be rendered
pub fn execute_command(cli: &Cli, env: Arc<IsolatedEnvironment>) -> Result<HealthStatus, Box<dyn std::error::Error>> {
    let context = ConfigContext::from_env(env);
    let target = cli
        .environment
        .map(Environment::from)
        .unwrap_or_else(|| context.environment());

    let report = diagnose::run_diagnostics(&context, target);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        diagnose::print_report(&report);
    }

    Ok(report.overall_status)
}

/// Process exit code for an overall status
pub fn exit_code(status: HealthStatus) -> i32 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded | HealthStatus::Error => 1,
    }
}
