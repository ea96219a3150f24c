use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::admission::RateGate;
use crate::config::Config;
use crate::core::context::{Collaborators, SessionContext};
use crate::core::orchestrator::Orchestrator;
use crate::core::registry::Registry;
use crate::encoder::{FfmpegLauncher, Launcher};
use crate::events::Bus;
use crate::playlist::PlaylistQueue;
use crate::quality::{LoadAverage, LoadSource};
use crate::source::{LocalResolver, SourceResolver};
use crate::store::{MemoryStore, SessionStore};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for an [`Orchestrator`].
///
/// Every collaborator has a production default: the ffmpeg launcher from
/// [`Config::encoder_path`], the local-file resolver, the system load average
/// and an in-memory store.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    launcher: Option<Arc<dyn Launcher>>,
    resolver: Option<Arc<dyn SourceResolver>>,
    load: Option<Arc<dyn LoadSource>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            launcher: None,
            resolver: None,
            load: None,
            store: None,
        }
    }

    /// Sets event subscribers, replacing any added before.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Replaces the encoder launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Replaces the source resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces the load sampler used for quality adaptation.
    pub fn with_load(mut self, load: Arc<dyn LoadSource>) -> Self {
        self.load = Some(load);
        self
    }

    /// Replaces the durable store.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the orchestrator and spawns its background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Orchestrator {
        let cfg = self.cfg;
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let playlist = Arc::new(PlaylistQueue::new());
        let parts = Collaborators {
            launcher: self
                .launcher
                .unwrap_or_else(|| Arc::new(FfmpegLauncher::new(cfg.encoder_path.clone()))),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(LocalResolver)),
            load: self.load.unwrap_or_else(|| Arc::new(LoadAverage::default())),
            store: Arc::clone(&store),
            playlist: Arc::clone(&playlist),
        };
        let ctx = Arc::new(SessionContext::new(&cfg, bus.clone(), parts));

        let registry = Registry::new(ctx, cfg.global_limit(), cfg.owner_limit(), runtime_token.clone());
        let gate = Arc::new(RateGate::new(
            cfg.rate_limit_calls,
            cfg.rate_limit_period,
            cfg.privileged.iter().copied(),
        ));

        tracing::debug!(
            max_sessions = cfg.max_sessions,
            max_sessions_per_owner = cfg.max_sessions_per_owner,
            max_restarts = cfg.restart.max_restarts,
            encoder = %cfg.encoder_path,
            "orchestrator built"
        );
        Orchestrator::assemble(cfg, gate, registry, playlist, store, bus, subs, runtime_token)
    }
}

impl Orchestrator {
    /// Starts building an orchestrator for `cfg`.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }
}
