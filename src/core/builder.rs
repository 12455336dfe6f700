use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{config::SupervisorConfig, supervisor::Supervisor};
use crate::{
    events::Bus,
    policies::RestartPolicy,
    subscribers::{Subscribe, SubscriberSet},
    tasks::LifecycleRef,
};

/// Builder for constructing a Supervisor with optional features.
pub struct SupervisorBuilder {
    lifecycle: LifecycleRef,
    cfg: SupervisorConfig,
    policy: Option<RestartPolicy>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder for `lifecycle` with default configuration.
    pub fn new(lifecycle: LifecycleRef) -> Self {
        Self {
            lifecycle,
            cfg: SupervisorConfig::default(),
            policy: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: SupervisorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the restart policy, overriding [`SupervisorConfig::restart`].
    pub fn with_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (run lifecycle, failures, restarts)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// With subscribers configured this spawns their workers and the event
    /// listener, so it must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let shutdown = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, subs, shutdown.clone());
        }

        let policy = self.policy.unwrap_or(self.cfg.restart);
        Arc::new(Supervisor::new_internal(
            self.lifecycle,
            policy,
            bus,
            shutdown,
        ))
    }
}

/// Forwards bus events to the subscriber set until `shutdown` is cancelled.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, shutdown: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    });
}
