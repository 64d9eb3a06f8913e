//! Component factory: wires a fully configured [`Orchestrator`] from a
//! [`ConfigService`], grounded on subx-cli's `core::factory::ComponentFactory`
//! (centralized, config-injected construction instead of components reaching
//! into global state).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use crate::config::{Config, ConfigService};
use crate::core::orchestrator::Orchestrator;
use crate::core::postprocess::PostProcessorPipeline;
use crate::core::store::{DocumentStore, HashRegistry};
use crate::core::task_manager::TaskManager;
use crate::core::workflow::{LocalDocumentSourceProvider, SourceProvider};
use crate::domain::model::TaskKind;
use crate::services::llm::{LlmClient, OpenAiCompatibleClient, RateLimiter};
use crate::Result;

/// Builds an [`Orchestrator`] and its collaborators from configuration.
///
/// This is the one place in the crate that reads [`Config`] and decides how
/// to wire components together; everything downstream of it receives its
/// settings through constructor arguments, never through a global (§9).
pub struct ComponentFactory {
    config: Config,
}

impl ComponentFactory {
    /// Load configuration from `config_service` and hold it for component creation.
    ///
    /// # Errors
    /// Returns an error if the configuration service fails to load.
    pub fn new(config_service: &dyn ConfigService) -> Result<Self> {
        let config = config_service.get_config()?;
        Ok(Self { config })
    }

    /// The configuration this factory was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the LLM client this orchestrator's workflows will call through,
    /// gated by a rate limiter sized from `llm.rate_limit_interval_secs`.
    ///
    /// # Errors
    /// Returns [`crate::error::OrchestratorError::Config`] if `llm.base_url`
    /// is not a valid URL or no API key is configured.
    pub fn create_llm_client(&self) -> Result<Arc<dyn LlmClient>> {
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_secs_f64(
            self.config.llm.rate_limit_interval_secs,
        )));
        let client = OpenAiCompatibleClient::from_config(&self.config.llm, rate_limiter)?;
        Ok(Arc::new(client))
    }

    /// Build the document store rooted at `storage.documents_dir`, scan it,
    /// and populate a fresh [`HashRegistry`] from what it finds (§4.J `init`).
    ///
    /// # Errors
    /// Returns an error if the documents directory cannot be created or scanned.
    pub fn create_store_and_registry(&self) -> Result<(Arc<DocumentStore>, Arc<StdMutex<HashRegistry>>)> {
        let store = DocumentStore::new(&self.config.storage.documents_dir)?;
        let mut registry = HashRegistry::new();
        registry.init(&store.scan_front_matter()?);
        Ok((Arc::new(store), Arc::new(StdMutex::new(registry))))
    }

    /// An empty [`PostProcessorPipeline`]; callers register plug-ins (HTML
    /// visualization, PDF rendering, screenshotting, TTS) before handing it
    /// to [`ComponentFactory::create_orchestrator`], since those processors
    /// themselves are outside this crate's scope (§1).
    pub fn create_postprocessor_pipeline(&self) -> PostProcessorPipeline {
        PostProcessorPipeline::new()
    }

    /// The default [`SourceProvider`] table: only [`TaskKind::Document`] is
    /// wired, since video-transcript fetching and document-text extraction
    /// are excluded collaborators (§1); a transport layer supplies its own
    /// providers for those kinds.
    pub fn default_source_providers(&self) -> HashMap<TaskKind, Arc<dyn SourceProvider>> {
        let mut providers: HashMap<TaskKind, Arc<dyn SourceProvider>> = HashMap::new();
        providers.insert(TaskKind::Document, Arc::new(LocalDocumentSourceProvider));
        providers
    }

    /// Assemble a fully wired [`Orchestrator`], using
    /// [`ComponentFactory::default_source_providers`] and an empty
    /// post-processor pipeline. Use [`Orchestrator::new`] directly to supply
    /// custom providers or registered post-processors instead.
    ///
    /// # Errors
    /// Returns an error if the LLM client or document store cannot be built.
    pub fn create_orchestrator(&self) -> Result<Orchestrator> {
        let task_manager = Arc::new(TaskManager::new(self.config.parallel.log_ring_capacity));
        let (store, hash_registry) = self.create_store_and_registry()?;
        let llm = self.create_llm_client()?;
        let pipeline = Arc::new(self.create_postprocessor_pipeline());
        let providers = self.default_source_providers();
        Ok(Orchestrator::new(
            self.config.clone(),
            task_manager,
            store,
            hash_registry,
            llm,
            pipeline,
            providers,
        ))
    }
}
