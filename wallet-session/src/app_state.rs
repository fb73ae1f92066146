use std::path::PathBuf;
use std::rc::Rc;

use crate::approval::SurfaceHost;
use crate::config_store::{ConfigStore, WalletConfig, ENV_ENVIRONMENT};
use crate::errors::WalletResult;
use crate::session::SessionService;
use crate::storage::{FileStore, SessionPaths};

/// Process-wide session context for native hosts: one directory holds the
/// checksummed config and the persisted credentials.
pub struct SessionContext {
    paths: SessionPaths,
    config_store: ConfigStore,
    config: WalletConfig,
    host: Rc<dyn SurfaceHost>,
    service: Rc<SessionService>,
    environment: String,
}

impl SessionContext {
    pub fn initialize(root_dir: PathBuf, host: Rc<dyn SurfaceHost>) -> WalletResult<Self> {
        let environment =
            std::env::var(ENV_ENVIRONMENT).unwrap_or_else(|_| "development".to_string());
        let paths = SessionPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let config_store = ConfigStore::from_paths(&paths);
        let mut config = config_store.load_or_default(environment.clone())?;
        config.apply_env_overrides()?;

        let service = build_service(&paths, &config, host.clone())?;
        log::info!(
            "Session context ready at {} ({})",
            paths.root_dir().display(),
            environment
        );

        Ok(Self {
            paths,
            config_store,
            config,
            host,
            service,
            environment,
        })
    }

    pub fn service(&self) -> Rc<SessionService> {
        self.service.clone()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// Persist a config change and rebind the session service to it.
    pub fn update_config<F>(&mut self, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let updated = self
            .config_store
            .update(self.environment.clone(), updater)?;
        self.service = build_service(&self.paths, &updated, self.host.clone())?;
        self.config = updated.clone();
        Ok(updated)
    }
}

fn build_service(
    paths: &SessionPaths,
    config: &WalletConfig,
    host: Rc<dyn SurfaceHost>,
) -> WalletResult<Rc<SessionService>> {
    let backend = Rc::new(FileStore::from_paths(paths));
    let service = SessionService::from_config(config, backend, host);
    service.initialize(config.network.clone())?;
    Ok(Rc::new(service))
}
