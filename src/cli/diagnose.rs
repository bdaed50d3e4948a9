// Secret Manager diagnostic
// Checks cloud access, the unified secret manager and the shared secret builder for one environment

use std::sync::Arc;

use serde::Serialize;

use crate::config::gcp::resolve_project_id;
use crate::config::{
    ConfigBuilder, ConfigContext, Environment, HealthStatus, SecretManagerBuilder, SecretValidationReport,
    UnifiedSecretManager,
};

/// Result of one diagnostic run
///
/// The first four fields are the stable contract consumed by deployment tooling.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub gcp_library_available: bool,
    pub netra_backend_ok: bool,
    pub shared_builder_ok: bool,
    pub overall_status: HealthStatus,
    pub environment: Environment,
    pub project_id: Option<String>,
    pub issues: Vec<String>,
    pub secrets: SecretValidationReport,
}

/// Run every check against `target`
///
/// # Arguments
/// * `context` - Context whose environment and Secret Manager client are diagnosed
/// * `target` - Environment to resolve secrets for, regardless of what the environment detects
pub fn run_diagnostics(context: &ConfigContext, target: Environment) -> DiagnosticReport {
    let mut issues = Vec::new();

    let project_id = resolve_project_id(context.env().as_ref());
    if project_id.is_none() {
        issues.push("No GCP project id in GCP_PROJECT_ID, GOOGLE_CLOUD_PROJECT or GCP_PROJECT".to_string());
    }

    let gcp_library_available = context.client().is_some_and(|client| client.is_available());
    if !gcp_library_available {
        issues.push("Secret Manager client cannot authenticate".to_string());
    }

    let unified = UnifiedSecretManager::new(
        Arc::clone(context.env()),
        context.client().cloned(),
        Arc::clone(context.cache()),
    )
    .for_environment(target);
    let secrets = unified.validate_all_secrets();
    let netra_backend_ok = secrets.overall_status != HealthStatus::Error;
    issues.extend(secrets.errors.iter().cloned());

    let builder = SecretManagerBuilder::new(
        context.builder_base().for_environment(target),
        Some(Arc::clone(context.shared())),
    );
    let (shared_builder_ok, reason) = builder.validate();
    if !shared_builder_ok {
        issues.push(format!("Shared secret builder: {}", reason));
    }

    let overall_status = match (netra_backend_ok && shared_builder_ok, gcp_library_available) {
        (false, _) => HealthStatus::Error,
        (true, false) => HealthStatus::Degraded,
        (true, true) if secrets.overall_status == HealthStatus::Degraded => HealthStatus::Degraded,
        (true, true) => HealthStatus::Healthy,
    };

    tracing::info!(
        "Secret Manager diagnostic for {}: {} ({} issues)",
        target,
        overall_status,
        issues.len()
    );

    DiagnosticReport {
        gcp_library_available,
        netra_backend_ok,
        shared_builder_ok,
        overall_status,
        environment: target,
        project_id,
        issues,
        secrets,
    }
}

fn check_mark(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

/// Print the human-readable report with remediation steps
pub fn print_report(report: &DiagnosticReport) {
    println!("Secret Manager diagnostic ({})", report.environment);
    println!(
        "   Project: {}",
        report.project_id.as_deref().unwrap_or("<not configured>")
    );
    println!();
    println!("{} Secret Manager access", check_mark(report.gcp_library_available));
    println!("{} Backend secret resolution", check_mark(report.netra_backend_ok));
    println!("{} Shared secret builder", check_mark(report.shared_builder_ok));
    println!();

    for (name, status) in &report.secrets.secrets {
        let source = status.source.as_ref().map(|s| s.as_str()).unwrap_or("none");
        println!(
            "   {}: {:?} (source: {}, length: {})",
            name, status.status, source, status.length
        );
    }
    for warning in &report.secrets.warnings {
        println!("⚠️  {}", warning);
    }

    if report.issues.is_empty() {
        println!();
        println!("Overall status: {}", report.overall_status);
        return;
    }

    println!();
    println!("Issues:");
    for issue in &report.issues {
        println!("   - {}", issue);
    }

    println!();
    println!("Remediation:");
    if report.project_id.is_none() {
        println!("   - Set GCP_PROJECT_ID to the project that holds the secrets");
    }
    if !report.gcp_library_available {
        println!("   - Check the Cloud Run service account has roles/secretmanager.secretAccessor");
        println!("   - Outside Cloud Run, export GOOGLE_OAUTH_ACCESS_TOKEN=$(gcloud auth print-access-token)");
    }
    if !report.netra_backend_ok || !report.shared_builder_ok {
        println!(
            "   - Verify the secrets exist: gcloud secrets list --project {}",
            report.project_id.as_deref().unwrap_or("<project>")
        );
        println!(
            "   - Expected names follow <name>-{}, e.g. jwt-secret-key-{}",
            report.environment, report.environment
        );
    }
    println!();
    println!("Overall status: {}", report.overall_status);
}
