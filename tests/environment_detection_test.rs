mod common;

use std::collections::HashMap;

use netra_config::config::{ConfigBuilderBase, Environment, EnvironmentProvider, IsolatedEnvironment};

fn detect(vars: &[(&str, &str)]) -> Environment {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Environment::detect(&vars)
}

#[test]
fn test_cloud_run_staging_service_beats_generic_development() {
    assert_eq!(
        detect(&[("ENVIRONMENT", "development"), ("K_SERVICE", "netra-staging-backend")]),
        Environment::Staging
    );
}

#[test]
fn test_production_signal_anywhere_wins() {
    assert_eq!(
        detect(&[("ENVIRONMENT", "staging"), ("GCP_PROJECT_ID", "netra-production")]),
        Environment::Production
    );
}

#[test]
fn test_unlabelled_cloud_run_service_is_production() {
    assert_eq!(detect(&[("K_SERVICE", "netra-backend")]), Environment::Production);
}

#[test]
fn test_no_signal_is_development() {
    assert_eq!(detect(&[]), Environment::Development);
    assert_eq!(detect(&[("UNRELATED", "production")]), Environment::Development);
}

#[test]
fn test_testing_and_aliases() {
    assert_eq!(detect(&[("NODE_ENV", "test")]), Environment::Testing);
    assert_eq!(detect(&[("ENV", "prod")]), Environment::Production);
    assert_eq!(detect(&[("NETRA_ENV", "local")]), Environment::Development);
    assert_eq!(detect(&[("ENVIRONMENT", " Staging ")]), Environment::Staging);
}

#[test]
fn test_builder_base_and_store_agree() {
    let env = IsolatedEnvironment::isolated([("AUTH_ENV", "staging")]);
    let base = ConfigBuilderBase::new(&env);

    assert_eq!(base.environment(), Environment::detect(&env));
    assert!(base.is_staging());
}

#[test]
fn test_isolation_keeps_writes_out_of_process_environment() {
    let _lock = common::ENV_TEST_MUTEX.lock().unwrap();
    let guard = common::EnvGuard::new(vec!["NETRA_ISOLATION_PROBE"]);
    guard.set("NETRA_ISOLATION_PROBE", "from-os");

    let env = IsolatedEnvironment::new();
    assert_eq!(env.get("NETRA_ISOLATION_PROBE").as_deref(), Some("from-os"));

    env.enable_isolation();
    assert!(env.set("NETRA_ISOLATION_PROBE", "isolated-value", "test"));
    assert_eq!(env.get("NETRA_ISOLATION_PROBE").as_deref(), Some("isolated-value"));
    assert_eq!(env.get_source("NETRA_ISOLATION_PROBE").as_deref(), Some("test"));
    assert_eq!(std::env::var("NETRA_ISOLATION_PROBE").unwrap(), "from-os");

    env.disable_isolation();
    assert_eq!(env.get("NETRA_ISOLATION_PROBE").as_deref(), Some("from-os"));
}

#[test]
fn test_scoped_override_restores_previous_state() {
    let env = IsolatedEnvironment::isolated([("ENVIRONMENT", "development"), ("REDIS_HOST", "cache")]);

    {
        let _scope = env.scoped_override(&[("ENVIRONMENT", Some("production")), ("REDIS_HOST", None)]);
        assert_eq!(Environment::detect(&env), Environment::Production);
        assert_eq!(env.get_trimmed("REDIS_HOST"), None);
    }

    assert_eq!(Environment::detect(&env), Environment::Development);
    assert_eq!(env.get("REDIS_HOST").as_deref(), Some("cache"));
}

#[test]
fn test_subprocess_env_keeps_system_variables() {
    let _lock = common::ENV_TEST_MUTEX.lock().unwrap();
    let env = IsolatedEnvironment::isolated([("ONLY_VAR", "1")]);
    let sub = env.get_subprocess_env();

    assert_eq!(sub.get("ONLY_VAR").map(String::as_str), Some("1"));
    if let Ok(path) = std::env::var("PATH") {
        assert_eq!(sub.get("PATH"), Some(&path));
    }
}
