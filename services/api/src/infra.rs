use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use visa_desk::clock::Clock;
use visa_desk::config::{CatalogConfig, SchedulingConfig};
use visa_desk::error::AppError;
use visa_desk::workflows::casework::{
    CaseworkService, CatalogError, InMemoryBlobStore, OutboxNotifier, StaticCatalog,
};
use visa_desk::workflows::directory::DirectoryService;
use visa_desk::workflows::scheduling::SchedulingService;
use visa_desk::workflows::InMemoryStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Casework =
    CaseworkService<InMemoryStore, StaticCatalog, InMemoryBlobStore, OutboxNotifier>;

/// Workflow services sharing one in-memory store, catalog and clock.
pub(crate) struct Services {
    pub(crate) directory: Arc<DirectoryService<InMemoryStore, StaticCatalog>>,
    pub(crate) scheduling: Arc<SchedulingService<InMemoryStore>>,
    pub(crate) casework: Arc<Casework>,
    pub(crate) notifier: Arc<OutboxNotifier>,
}

impl Services {
    pub(crate) fn build(
        catalog: StaticCatalog,
        scheduling: SchedulingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let catalog = Arc::new(catalog);
        let notifier = Arc::new(OutboxNotifier::new());

        Self {
            directory: Arc::new(DirectoryService::new(store.clone(), catalog.clone())),
            scheduling: Arc::new(SchedulingService::new(
                store.clone(),
                clock.clone(),
                scheduling,
            )),
            casework: Arc::new(CaseworkService::new(
                store,
                catalog,
                Arc::new(InMemoryBlobStore::new()),
                notifier.clone(),
                clock,
            )),
            notifier,
        }
    }

    pub(crate) fn seed_agents(&self, names: &[String]) -> Result<(), AppError> {
        for name in names {
            self.directory.register_agent(name)?;
        }
        Ok(())
    }
}

/// Loads the CSV catalog when configured, otherwise the built-in visa types.
pub(crate) fn load_catalog(config: &CatalogConfig) -> Result<StaticCatalog, CatalogError> {
    match &config.csv_path {
        Some(path) => {
            let catalog = StaticCatalog::from_path(path)?;
            info!(path = %path.display(), "requirement catalog loaded from csv");
            Ok(catalog)
        }
        None => Ok(StaticCatalog::standard()),
    }
}
