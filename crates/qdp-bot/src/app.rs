//! Main application orchestration.
//!
//! Builds the gateway registry and the session, connects, then polls the
//! account on an interval until ctrl-c.

use std::sync::Arc;

use qdp_gateway::{GatewayRegistry, RecordingFactory, SimFactory};
use qdp_telemetry::Metrics;
use qdp_trader::{ContractTable, TraderSession, TraderSink};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::sink::LoggingSink;

/// Main application.
pub struct Application {
    config: AppConfig,
    session: Arc<TraderSession>,
}

impl Application {
    /// Create the session with a [`LoggingSink`].
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_sink(config, Arc::new(LoggingSink))
    }

    pub fn with_sink(config: AppConfig, sink: Arc<dyn TraderSink>) -> AppResult<Self> {
        let registry = Self::build_registry(&config);
        info!(gateways = ?registry.names(), selected = %config.trader.gateway, "Gateway registry built");
        let factory = registry.get(&config.trader.gateway)?;

        let contracts = Arc::new(ContractTable::from_contracts(config.contracts.iter().cloned()));
        let session = TraderSession::new(config.trader.clone(), factory, sink, contracts);

        Ok(Self { config, session })
    }

    fn build_registry(config: &AppConfig) -> GatewayRegistry {
        let mut registry = GatewayRegistry::new();
        registry.register(Arc::new(SimFactory::new(config.sim.clone())));
        registry.register(Arc::new(RecordingFactory::new()));
        registry
    }

    #[must_use]
    pub fn session(&self) -> &Arc<TraderSession> {
        &self.session
    }

    /// Connect and wait for the session to become ready.
    pub async fn start(&self) -> AppResult<()> {
        self.session.connect()?;

        let timeout = self.config.ready_timeout();
        if tokio::time::timeout(timeout, self.session.wait_until_ready())
            .await
            .is_err()
        {
            warn!(state = %self.session.state(), "Session did not become ready");
            self.session.disconnect().await;
            return Err(AppError::NotReady(timeout));
        }

        info!(
            session_id = self.session.session_id(),
            trading_date = self.session.trading_date(),
            "Session ready"
        );
        Ok(())
    }

    /// Enqueue one round of account, position, order and trade queries.
    pub fn poll(&self) {
        let results = [
            ("account", self.session.query_account()),
            ("positions", self.session.query_positions()),
            ("orders", self.session.query_orders()),
            ("trades", self.session.query_trades()),
        ];
        for (kind, result) in results {
            if let Err(e) = result {
                warn!(kind, error = %e, "Query not enqueued");
            }
        }
    }

    /// Run until ctrl-c.
    pub async fn run(&self) -> AppResult<()> {
        self.start().await?;
        self.poll();

        let period = self.config.query_interval();
        let mut ticker = period.map(|p| tokio::time::interval_at(tokio::time::Instant::now() + p, p));

        loop {
            let tick = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                () = tick => {
                    if self.session.is_connected() {
                        self.poll();
                    } else {
                        debug!(state = %self.session.state(), "Skipping poll, session not ready");
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Disconnect and dump final metrics.
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.session.disconnect().await;

        match Metrics::gather_text() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to encode metrics"),
        }
    }
}
