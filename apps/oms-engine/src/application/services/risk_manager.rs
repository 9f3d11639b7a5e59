//! Risk Manager Service
//!
//! Watches per-client daily limits from broker-reported positions and vetoes
//! new exposure once a limit is hit. On a daily loss breach it broadcasts a
//! forced-exit event the watcher turns into market exits. PnL comes from the
//! broker position book only; local fill bookkeeping never feeds it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::ports::{BrokerPort, BrokerPosition};
use crate::domain::risk::{ClientRiskState, RiskAssessor, RiskLimits, RiskVerdict};
use crate::domain::shared::ClientId;

/// Broadcast sent when a client breaches the daily loss limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedExit {
    /// The client whose positions must be flattened.
    pub client_id: ClientId,
    /// Why the exits are forced.
    pub reason: String,
}

struct ClientEntry {
    assessor: RiskAssessor,
    state: ClientRiskState,
}

/// Per-client risk supervision over a broker port.
pub struct RiskManagerService<B> {
    broker: Arc<B>,
    clients: RwLock<HashMap<ClientId, ClientEntry>>,
    forced_exits: broadcast::Sender<ForcedExit>,
}

impl<B> RiskManagerService<B>
where
    B: BrokerPort,
{
    /// Create a risk manager with no registered clients.
    #[must_use]
    pub fn new(broker: Arc<B>) -> Self {
        let (forced_exits, _) = broadcast::channel(16);
        Self {
            broker,
            clients: RwLock::new(HashMap::new()),
            forced_exits,
        }
    }

    /// Put a client under supervision with its limits.
    ///
    /// Re-registering replaces the limits and resets the day state.
    pub fn register_client(&self, client_id: ClientId, limits: RiskLimits) {
        self.clients.write().insert(
            client_id,
            ClientEntry {
                assessor: RiskAssessor::new(limits),
                state: ClientRiskState::new(),
            },
        );
    }

    /// Subscribe to forced-exit broadcasts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ForcedExit> {
        self.forced_exits.subscribe()
    }

    /// Whether `client_id` may open new exposure right now.
    ///
    /// Clients that were never registered are not supervised and pass.
    #[must_use]
    pub fn can_execute(&self, client_id: &ClientId) -> RiskVerdict {
        let clients = self.clients.read();
        match clients.get(client_id) {
            None => RiskVerdict::clear(),
            Some(entry) => entry.assessor.assess(&entry.state),
        }
    }

    /// Count one accepted exposure-opening order for `client_id`.
    pub fn record_entry(&self, client_id: &ClientId) {
        if let Some(entry) = self.clients.write().get_mut(client_id) {
            entry.state.record_order();
        }
    }

    /// Reset a client's day state. Called at the daily boundary.
    pub fn rollover(&self, client_id: &ClientId) {
        if let Some(entry) = self.clients.write().get_mut(client_id) {
            entry.state.rollover();
            info!(client_id = %client_id, "risk state rolled over");
        }
    }

    /// Fold a fresh broker position snapshot into one client's state.
    ///
    /// Emits exactly one forced-exit broadcast per breach: the sticky flag
    /// was off before this snapshot and on after it.
    pub fn apply_positions(&self, client_id: &ClientId, positions: &[BrokerPosition]) {
        let daily_pnl = positions.iter().map(BrokerPosition::day_pnl).sum();
        let open_positions =
            u32::try_from(positions.iter().filter(|p| p.is_open()).count()).unwrap_or(u32::MAX);

        let breach = {
            let mut clients = self.clients.write();
            let Some(entry) = clients.get_mut(client_id) else {
                return;
            };
            entry.state.observe(daily_pnl, open_positions);

            let verdict = entry.assessor.assess(&entry.state);
            if verdict.loss_breached() && !entry.state.daily_loss_hit() {
                entry.state.mark_loss_hit();
                Some(format!(
                    "daily loss limit hit: pnl {daily_pnl} against limit -{}",
                    entry.assessor.limits().daily_loss_limit
                ))
            } else {
                None
            }
        };

        if let Some(reason) = breach {
            error!(client_id = %client_id, %reason, "forcing exits");
            // Send fails only with no live receivers; the breach stays
            // latched either way and blocks new entries.
            if self
                .forced_exits
                .send(ForcedExit {
                    client_id: client_id.clone(),
                    reason,
                })
                .is_err()
            {
                warn!(client_id = %client_id, "forced exit broadcast had no receivers");
            }
        }
    }

    /// One supervision pass: fetch positions for every registered client.
    pub async fn heartbeat(&self) {
        let client_ids: Vec<ClientId> = self.clients.read().keys().cloned().collect();
        for client_id in client_ids {
            match self.broker.positions(&client_id).await {
                Ok(positions) => self.apply_positions(&client_id, &positions),
                Err(error) => {
                    warn!(client_id = %client_id, %error, "position fetch failed, keeping last state");
                }
            }
        }
    }

    /// Drive heartbeats until cancelled.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.heartbeat().await;
                }
                () = shutdown.cancelled() => {
                    info!("Risk manager shutting down");
                    break;
                }
            }
        }
    }
}
