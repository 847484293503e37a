//! Bridge from the live log bus into the fanout gateway.

use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use shipyard_domain::{ChannelName, LogEvent};
use shipyard_infrastructure::RedisLogEventBus;
use tracing::{info, warn};

use crate::dto::ServerFrame;
use crate::fanout::FanoutGateway;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Keeps a pattern subscription open and forwards every event.
///
/// Runs until the process exits; a dropped subscription is reopened.
pub async fn run_live_log_bridge(
    bus: RedisLogEventBus,
    fanout: FanoutGateway,
    channel_prefix: String,
) {
    loop {
        match bus.subscribe().await {
            Ok(events) => {
                info!(prefix = %channel_prefix, "live log bridge subscribed");
                let forwarded = forward_live_logs(events, &fanout, channel_prefix.as_str()).await;
                warn!(forwarded, "live log subscription ended; resubscribing");
            }
            Err(error) => {
                warn!(error = %error, "live log bridge failed to subscribe");
            }
        }

        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Emits each event to `<prefix>:<deploymentId>` and returns how many were forwarded.
pub async fn forward_live_logs<S>(
    mut events: S,
    fanout: &FanoutGateway,
    channel_prefix: &str,
) -> u64
where
    S: Stream<Item = LogEvent> + Unpin,
{
    let mut forwarded = 0;
    while let Some(event) = events.next().await {
        let channel = ChannelName::for_deployment(channel_prefix, event.deployment_id());
        fanout.emit(&channel, ServerFrame::log(event.content())).await;
        forwarded += 1;
    }

    forwarded
}
