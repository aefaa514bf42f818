//! Real-time teleoperation channel between an operator console and a rover.
//!
//! Roverlink carries discrete motion commands, a path recorder/replayer,
//! one-shot photo capture and a live video feed over a single websocket per
//! console.
//!
//! # Features
//!
//! - **Edge-driven motion**: button press/release maps to move/stop, and any
//!   disconnect forces a `stop`
//! - **Record and replay**: timestamped paths per route, replayed with their
//!   relative timing
//! - **Multiplexed transport**: JSON control in text frames, raw video in
//!   binary frames, never interleaved
//! - **Pluggable hardware**: actuator, camera and stores behind async traits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use roverlink::{LinkConfig, RoverLink};
//!
//! #[tokio::main]
//! async fn main() -> roverlink::Result<()> {
//!     let config = LinkConfig::load("roverlink.yaml")?;
//!     let rover = RoverLink::builder(config).start().await?;
//!     println!("listening on {}", rover.local_addr());
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     rover.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(test)]
mod test_utils;
pub mod types;

// Channel components
pub mod console;
pub mod gateway;
pub mod recorder;
pub mod relay;
pub mod replay;
pub mod router;
pub mod session;
pub mod stream;
pub mod transport;

// Collaborator seams and adapters
pub mod actuator;
pub mod actuators;
pub mod camera;
pub mod cameras;
pub mod notify;
pub mod settings;
pub mod store;

// Core exports
pub use config::LinkConfig;
pub use error::*;
pub use types::*;

pub use actuator::Actuator;
pub use camera::{FrameSource, StillCamera};
pub use console::{ButtonEdge, ConsoleEvent, Intent, OperatorConsole};
pub use gateway::Gateway;
pub use notify::Notifier;
pub use settings::SettingsStore;
pub use store::PathStore;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use actuators::SimulatedActuator;
use cameras::{SnapshotCamera, TestPatternSource};
use notify::LogNotifier;
use relay::{RelayChannels, VideoRelay};
use router::CommandRouter;
use session::SessionId;
use settings::{FileSettingsStore, StaticSettings};
use store::{FilePathStore, MemoryPathStore};

/// Payload size of the built-in test pattern frames
const TEST_PATTERN_BYTES: usize = 1024;

/// Builder wiring collaborators into a running rover endpoint.
///
/// Anything not supplied falls back to a simulated or in-process default:
/// a [`SimulatedActuator`], a [`TestPatternSource`], a [`SnapshotCamera`] over
/// the relayed video, a file or memory path store depending on
/// `storage.path_dir`, and settings from `storage.settings_file` if set.
pub struct RoverLinkBuilder {
    config: LinkConfig,
    actuator: Option<Arc<dyn Actuator>>,
    source: Option<Box<dyn FrameSource>>,
    camera: Option<Arc<dyn StillCamera>>,
    paths: Option<Arc<dyn PathStore>>,
    settings: Option<Arc<dyn SettingsStore>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl RoverLinkBuilder {
    pub fn actuator(mut self, actuator: Arc<dyn Actuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    pub fn frame_source(mut self, source: impl FrameSource) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn still_camera(mut self, camera: Arc<dyn StillCamera>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn path_store(mut self, paths: Arc<dyn PathStore>) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Bind the configured address and start serving.
    pub async fn start(self) -> Result<RoverLink> {
        let bind = self.config.server.bind;
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| LinkError::transport_with_source(format!("cannot bind {bind}"), Box::new(e)))?;
        self.start_on(listener).await
    }

    /// Start serving on an already bound listener.
    pub async fn start_on(self, listener: TcpListener) -> Result<RoverLink> {
        let config = self.config;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LinkError::transport_with_source("listener has no address", Box::new(e)))?;

        let source: Box<dyn FrameSource> = match self.source {
            Some(source) => source,
            None => Box::new(TestPatternSource::new(config.video.source_fps, TEST_PATTERN_BYTES)?),
        };
        let (sink_tx, sink_rx) = watch::channel(None);
        let relay = VideoRelay::spawn(source, config.video.frame_rate(), sink_rx);

        let actuator = self.actuator.unwrap_or_else(|| Arc::new(SimulatedActuator::new()));
        let camera = self
            .camera
            .unwrap_or_else(|| Arc::new(SnapshotCamera::new(relay.latest.clone(), config.storage.photo_dir.clone())));
        let paths: Arc<dyn PathStore> = match (self.paths, &config.storage.path_dir) {
            (Some(paths), _) => paths,
            (None, Some(dir)) => Arc::new(FilePathStore::open(dir.clone()).await?),
            (None, None) => Arc::new(MemoryPathStore::new()),
        };
        let settings: Arc<dyn SettingsStore> = match (self.settings, &config.storage.settings_file) {
            (Some(settings), _) => settings,
            (None, Some(file)) => Arc::new(FileSettingsStore::new(file.clone())),
            (None, None) => Arc::new(StaticSettings::default()),
        };
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));

        info!(actuator = actuator.name(), rover = %config.server.rover_id, "Rover link starting");
        let router = Arc::new(CommandRouter::new(actuator, camera, paths, notifier));
        let gateway = Arc::new(Gateway::new(&config, router, settings, sink_tx));
        let serve = tokio::spawn(Arc::clone(&gateway).serve(listener));

        Ok(RoverLink { gateway, relay, local_addr, serve })
    }
}

/// A running rover endpoint: gateway, video relay and their collaborators.
pub struct RoverLink {
    gateway: Arc<Gateway>,
    relay: RelayChannels,
    local_addr: SocketAddr,
    serve: JoinHandle<Result<()>>,
}

impl RoverLink {
    pub fn builder(config: LinkConfig) -> RoverLinkBuilder {
        RoverLinkBuilder {
            config,
            actuator: None,
            source: None,
            camera: None,
            paths: None,
            settings: None,
            notifier: None,
        }
    }

    /// Address consoles connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Websocket URL for [`OperatorConsole::connect`].
    pub fn url(&self) -> String {
        format!("ws://{}/", self.local_addr)
    }

    /// Id of the session currently bound to the rover.
    pub async fn active_session(&self) -> Option<SessionId> {
        self.gateway.active_session().await
    }

    /// Latest frame produced by the video source.
    pub fn latest_frame(&self) -> watch::Receiver<Option<Arc<VideoFrame>>> {
        self.relay.latest.clone()
    }

    /// Stop accepting, tear down the bound session and stop the video relay.
    pub async fn shutdown(self) {
        self.gateway.shutdown().await;
        self.relay.cancel.cancel();
        match self.serve.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Gateway stopped with error: {}", e),
            Err(e) => warn!("Gateway task failed: {}", e),
        }
        info!("Rover link stopped");
    }
}
