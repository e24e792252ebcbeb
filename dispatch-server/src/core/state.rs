//! Server state
//!
//! Shared handle to every service the HTTP layer and background tasks
//! need. Cloning is an `Arc` bump.

use std::sync::Arc;

use crate::core::{BackgroundTasks, Config, TaskKind};
use crate::directory::{
    InMemoryPartnerDirectory, InMemoryRestaurantDirectory, LoggingSink, NotificationSink,
    PartnerDirectory, RestaurantDirectory, pump_events,
};
use crate::engine::{DispatchEngine, sweeper_loop};

/// Server state - shared singleton references
///
/// | field | type | role |
/// |-------|------|------|
/// | config | `Arc<Config>` | immutable configuration |
/// | engine | `Arc<DispatchEngine>` | consolidation and dispatch core |
/// | restaurants | `Arc<dyn RestaurantDirectory>` | restaurant registry |
/// | partners | `Arc<dyn PartnerDirectory>` | delivery partner registry |
/// | sink | `Arc<dyn NotificationSink>` | downstream event consumer |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub engine: Arc<DispatchEngine>,
    pub restaurants: Arc<dyn RestaurantDirectory>,
    pub partners: Arc<dyn PartnerDirectory>,
    pub sink: Arc<dyn NotificationSink>,
}

impl ServerState {
    /// Build the state from configuration.
    ///
    /// In-memory directories and the logging sink are the single-node
    /// defaults; a multi-node deployment swaps them at this seam.
    pub async fn initialize(config: &Config) -> Self {
        let config = Arc::new(config.clone());
        let restaurants: Arc<dyn RestaurantDirectory> = Arc::new(InMemoryRestaurantDirectory::new());
        let partners: Arc<dyn PartnerDirectory> = Arc::new(InMemoryPartnerDirectory::new());
        let sink: Arc<dyn NotificationSink> = Arc::new(LoggingSink);

        let engine = DispatchEngine::new(config.clone(), restaurants.clone(), partners.clone());

        Self {
            config,
            engine,
            restaurants,
            partners,
            sink,
        }
    }

    /// Register the background tasks and return the manager.
    ///
    /// Must be called before serving traffic. Tasks:
    /// - index_rebuild: one-shot startup recovery of the spatial indices
    /// - sweeper: formation deadlines, overdue solo dispatch, stale offers
    /// - event_pump: fans domain events out to the notification sink
    pub async fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        // Startup recovery: re-populate the spatial indices from the
        // stores and the partner directory before traffic arrives.
        let rebuild_engine = self.engine.clone();
        tasks.spawn("index_rebuild", TaskKind::Warmup, async move {
            if let Err(e) = rebuild_engine.rebuild().await {
                tracing::error!(error = %e, "Index rebuild failed");
            }
        });

        let sweeper_token = tasks.shutdown_token();
        let engine = self.engine.clone();
        tasks.spawn("sweeper", TaskKind::Periodic, async move {
            sweeper_loop(engine, sweeper_token).await;
        });

        let pump_token = tasks.shutdown_token();
        let rx = self.engine.subscribe_events();
        let sink = self.sink.clone();
        tasks.spawn("event_pump", TaskKind::Listener, async move {
            pump_events(rx, sink, pump_token).await;
        });

        tasks.log_summary();
        tasks
    }
}
