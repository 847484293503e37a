//! Channel based push gateway for live log viewers.
//!
//! Channels exist only while at least one connection is joined. Every
//! connection owns a bounded queue for live frames; a frame that does not
//! fit is dropped for that connection only, so one slow viewer never stalls
//! the others. Replies to the viewer's own requests (acknowledgements and
//! errors) travel on a separate control queue and are never dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shipyard_core::{AppError, AppResult};
use shipyard_domain::ChannelName;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::dto::{ClientFrame, ServerFrame};

/// Identifier of one viewer connection.
pub type ConnectionId = u64;

/// Registered connection and the queues its socket task drains.
pub struct FanoutConnection {
    pub id: ConnectionId,
    control: mpsc::UnboundedReceiver<ServerFrame>,
    frames: mpsc::Receiver<ServerFrame>,
}

impl FanoutConnection {
    /// Waits for the next outbound frame, control replies first.
    ///
    /// Returns `None` once the gateway dropped the connection.
    pub async fn recv(&mut self) -> Option<ServerFrame> {
        tokio::select! {
            biased;
            Some(frame) = self.control.recv() => Some(frame),
            frame = self.frames.recv() => frame,
        }
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Result<ServerFrame, mpsc::error::TryRecvError> {
        match self.control.try_recv() {
            Ok(frame) => Ok(frame),
            Err(_) => self.frames.try_recv(),
        }
    }
}

struct ConnectionQueues {
    control: mpsc::UnboundedSender<ServerFrame>,
    frames: mpsc::Sender<ServerFrame>,
}

impl ConnectionQueues {
    fn reply(&self, frame: ServerFrame) {
        // Fails only when the socket task already went away.
        let _ = self.control.send(frame);
    }
}

/// Delivery counts of one emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct GatewayState {
    connections: HashMap<ConnectionId, ConnectionQueues>,
    memberships: HashMap<ConnectionId, HashSet<ChannelName>>,
    channels: HashMap<ChannelName, HashSet<ConnectionId>>,
}

#[derive(Clone)]
pub struct FanoutGateway {
    state: Arc<Mutex<GatewayState>>,
    next_connection_id: Arc<AtomicU64>,
    connection_buffer: usize,
}

impl FanoutGateway {
    pub fn new(connection_buffer: usize) -> AppResult<Self> {
        if connection_buffer == 0 {
            return Err(AppError::Validation(
                "fanout connection buffer must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            state: Arc::new(Mutex::new(GatewayState::default())),
            next_connection_id: Arc::new(AtomicU64::new(1)),
            connection_buffer,
        })
    }

    pub async fn connect(&self) -> FanoutConnection {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (control_sender, control) = mpsc::unbounded_channel();
        let (frame_sender, frames) = mpsc::channel(self.connection_buffer);
        self.state.lock().await.connections.insert(
            id,
            ConnectionQueues {
                control: control_sender,
                frames: frame_sender,
            },
        );
        debug!(connection_id = id, "viewer connected");

        FanoutConnection {
            id,
            control,
            frames,
        }
    }

    /// Joins `connection_id` to `channel` and acknowledges on that connection only.
    ///
    /// The acknowledgement is queued before the membership becomes visible
    /// to `emit`, so it precedes every live frame of the channel.
    pub async fn subscribe(
        &self,
        connection_id: ConnectionId,
        channel: ChannelName,
    ) -> AppResult<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(queues) = state.connections.get(&connection_id) else {
            return Err(AppError::NotFound(format!(
                "connection {connection_id} is not registered"
            )));
        };
        queues.reply(ServerFrame::log(format!("Subscribed to {channel}")));

        state
            .channels
            .entry(channel.clone())
            .or_default()
            .insert(connection_id);
        state
            .memberships
            .entry(connection_id)
            .or_default()
            .insert(channel.clone());

        debug!(connection_id, channel = %channel, "viewer joined channel");
        Ok(())
    }

    /// Pushes `frame` to every current member of `channel`.
    pub async fn emit(&self, channel: &ChannelName, frame: ServerFrame) -> EmitReport {
        let state = self.state.lock().await;
        let mut report = EmitReport::default();
        let Some(members) = state.channels.get(channel) else {
            return report;
        };

        for connection_id in members {
            let Some(queues) = state.connections.get(connection_id) else {
                continue;
            };
            if queues.frames.try_send(frame.clone()).is_ok() {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }

        if report.dropped > 0 {
            warn!(
                channel = %channel,
                dropped = report.dropped,
                "live log frame dropped for slow viewers"
            );
        }

        report
    }

    /// Removes the connection from every channel it joined.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.connections.remove(&connection_id);

        for channel in state.memberships.remove(&connection_id).unwrap_or_default() {
            let now_empty = state.channels.get_mut(&channel).is_some_and(|members| {
                members.remove(&connection_id);
                members.is_empty()
            });
            if now_empty {
                state.channels.remove(&channel);
            }
        }

        debug!(connection_id, "viewer disconnected");
    }

    /// Applies one text frame received from a viewer.
    ///
    /// Invalid frames are answered with an error frame; the connection stays open.
    pub async fn handle_client_text(&self, connection_id: ConnectionId, text: &str) {
        let result = match serde_json::from_str::<ClientFrame>(text) {
            Ok(ClientFrame::Subscribe { channel }) => match ChannelName::new(channel) {
                Ok(channel) => self.subscribe(connection_id, channel).await,
                Err(error) => Err(error),
            },
            Err(error) => Err(AppError::Validation(format!("invalid socket frame: {error}"))),
        };

        if let Err(error) = result {
            debug!(connection_id, error = %error, "rejected viewer frame");
            let state = self.state.lock().await;
            if let Some(queues) = state.connections.get(&connection_id) {
                queues.reply(ServerFrame::error(error.to_string()));
            }
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.state.lock().await.channels.len()
    }

    #[cfg(test)]
    pub async fn member_count(&self, channel: &ChannelName) -> usize {
        self.state
            .lock()
            .await
            .channels
            .get(channel)
            .map_or(0, HashSet::len)
    }
}
