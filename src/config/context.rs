use std::sync::{Arc, OnceLock};

use crate::config::builder_base::ConfigBuilderBase;
use crate::config::cache::SecretCache;
use crate::config::database::DatabaseConfigBuilder;
use crate::config::gcp::{resolve_project_id, timeout_from_env, GcpSecretManagerClient, SecretManagerClient};
use crate::config::redis::RedisConfigurationBuilder;
use crate::config::secret_builder::SecretManagerBuilder;
use crate::config::shared_secrets::SharedSecretManager;
use crate::config::unified_secrets::UnifiedSecretManager;
use crate::config::{Environment, IsolatedEnvironment};

static GLOBAL_CONTEXT: OnceLock<Arc<ConfigContext>> = OnceLock::new();

/// One resolved view of configuration for a process or a test
///
/// Owns the environment store, the secret cache and the Secret Manager
/// client, and hands out builders wired to them. Everything that resolves
/// configuration receives a context instead of reaching for globals; the
/// process-wide instance is just [`ConfigContext::global`].
pub struct ConfigContext {
    env: Arc<IsolatedEnvironment>,
    cache: Arc<SecretCache>,
    client: Option<Arc<dyn SecretManagerClient>>,
    shared: Arc<SharedSecretManager>,
    secrets: UnifiedSecretManager,
}

impl ConfigContext {
    pub fn new(env: Arc<IsolatedEnvironment>, client: Option<Arc<dyn SecretManagerClient>>) -> Self {
        let cache = Arc::new(SecretCache::new());
        let timeout = timeout_from_env(env.as_ref());
        let shared = Arc::new(SharedSecretManager::new(client.clone(), timeout, Arc::clone(&cache)));
        let secrets = UnifiedSecretManager::new(Arc::clone(&env), client.clone(), Arc::clone(&cache));

        Self {
            env,
            cache,
            client,
            shared,
            secrets,
        }
    }

    /// Context with the REST Secret Manager client when a GCP project is configured
    pub fn from_env(env: Arc<IsolatedEnvironment>) -> Self {
        let client = default_client(env.as_ref());
        Self::new(env, client)
    }

    /// Process-lifetime context over [`IsolatedEnvironment::global`]
    pub fn global() -> Arc<ConfigContext> {
        Arc::clone(GLOBAL_CONTEXT.get_or_init(|| Arc::new(Self::from_env(IsolatedEnvironment::global()))))
    }

    pub fn env(&self) -> &Arc<IsolatedEnvironment> {
        &self.env
    }

    pub fn environment(&self) -> Environment {
        Environment::detect(self.env.as_ref())
    }

    pub fn cache(&self) -> &Arc<SecretCache> {
        &self.cache
    }

    pub fn client(&self) -> Option<&Arc<dyn SecretManagerClient>> {
        self.client.as_ref()
    }

    pub fn shared(&self) -> &Arc<SharedSecretManager> {
        &self.shared
    }

    pub fn secrets(&self) -> &UnifiedSecretManager {
        &self.secrets
    }

    /// Fresh snapshot of the environment
    pub fn builder_base(&self) -> ConfigBuilderBase {
        ConfigBuilderBase::new(&self.env)
    }

    pub fn secret_builder(&self) -> SecretManagerBuilder {
        SecretManagerBuilder::new(self.builder_base(), Some(Arc::clone(&self.shared)))
    }

    pub fn redis_builder(&self) -> RedisConfigurationBuilder {
        RedisConfigurationBuilder::new(self.builder_base(), Some(Arc::clone(&self.shared)))
    }

    pub fn database_builder(&self) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(self.builder_base(), Some(Arc::clone(&self.shared)))
    }
}

impl std::fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigContext")
            .field("environment", &self.environment())
            .field("env", &self.env)
            .field("cache", &self.cache)
            .field("secret_manager_client", &self.client.is_some())
            .finish()
    }
}

fn default_client(env: &IsolatedEnvironment) -> Option<Arc<dyn SecretManagerClient>> {
    resolve_project_id(env)?;

    match GcpSecretManagerClient::from_env(env) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!("Secret Manager client unavailable: {}", e);
            None
        }
    }
}
