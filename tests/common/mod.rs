//! Shared harness: a rover on a loopback port with a simulated drive

#![allow(dead_code)]

use roverlink::actuators::SimulatedActuator;
use roverlink::cameras::TestPatternSource;
use roverlink::config::SessionPolicy;
use roverlink::store::MemoryPathStore;
use roverlink::{LinkConfig, RoverLink, RoverLinkBuilder, Result, RouteId, StillCamera};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct Rover {
    pub link: RoverLink,
    pub actuator: Arc<SimulatedActuator>,
    pub paths: MemoryPathStore,
}

pub struct FailingCamera;

#[async_trait::async_trait]
impl StillCamera for FailingCamera {
    async fn capture_still(&self, _route: &RouteId) -> Result<String> {
        Err(roverlink::LinkError::camera("sensor offline"))
    }
}

pub fn config(policy: SessionPolicy) -> LinkConfig {
    let mut config = LinkConfig::default();
    config.server.session_policy = policy;
    config
}

pub async fn start(config: LinkConfig) -> Rover {
    start_with(config, |builder| builder).await
}

pub async fn start_with(config: LinkConfig, customize: impl FnOnce(RoverLinkBuilder) -> RoverLinkBuilder) -> Rover {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let actuator = Arc::new(SimulatedActuator::new());
    let paths = MemoryPathStore::new();
    let builder = RoverLink::builder(config)
        .actuator(actuator.clone())
        .path_store(Arc::new(paths.clone()))
        .frame_source(TestPatternSource::new(20, 256).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let link = customize(builder).start_on(listener).await.unwrap();
    Rover { link, actuator, paths }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the rover has (or no longer has) a bound session.
pub async fn session_bound(link: &RoverLink, bound: bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while link.active_session().await.is_some() != bound {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for binding = {bound}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
