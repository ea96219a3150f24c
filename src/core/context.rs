//! Collaborators shared by every session actor.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::encoder::Launcher;
use crate::events::Bus;
use crate::playlist::PlaylistQueue;
use crate::policies::RestartPolicy;
use crate::quality::{LoadSource, QualityController};
use crate::source::SourceResolver;
use crate::store::SessionStore;

pub(crate) struct SessionContext {
    pub bus: Bus,
    pub launcher: Arc<dyn Launcher>,
    pub resolver: Arc<dyn SourceResolver>,
    pub load: Arc<dyn LoadSource>,
    pub store: Arc<dyn SessionStore>,
    pub playlist: Arc<PlaylistQueue>,
    pub quality: QualityController,
    pub restart: RestartPolicy,
    pub start_grace: Duration,
    pub stop_timeout: Duration,
    pub realtime: bool,
}

pub(crate) struct Collaborators {
    pub launcher: Arc<dyn Launcher>,
    pub resolver: Arc<dyn SourceResolver>,
    pub load: Arc<dyn LoadSource>,
    pub store: Arc<dyn SessionStore>,
    pub playlist: Arc<PlaylistQueue>,
}

impl SessionContext {
    pub fn new(cfg: &Config, bus: Bus, parts: Collaborators) -> Self {
        Self {
            bus,
            launcher: parts.launcher,
            resolver: parts.resolver,
            load: parts.load,
            store: parts.store,
            playlist: parts.playlist,
            quality: cfg.quality_controller(),
            restart: cfg.restart,
            start_grace: cfg.start_grace,
            stop_timeout: cfg.stop_timeout,
            realtime: cfg.realtime_input,
        }
    }
}
