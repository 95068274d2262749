//! Broker client: the source of wifi-session snapshots and the sink for the
//! presence summary. Everything protocol-shaped lives here; the core only
//! ever sees raw payload bytes and the [`SummarySink`] seam.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use lib_presence::core::ingestion::{SnapshotSender, SummarySink};
use lib_presence::model::PresenceSummary;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

use crate::presence_logic::config::Config;

/// How long a publish waits for the broker hand-off before it is abandoned.
/// There is no retry; the next pass publishes again naturally.
const PUBLISH_ACK_WAIT: Duration = Duration::from_secs(5);

pub type AckResult = Result<(), String>;

// Struct to wrap the summary and a one-time channel for the response
pub struct PublishRequest {
    pub summary: PresenceSummary,
    pub responder: oneshot::Sender<AckResult>,
}

/// [`SummarySink`] backed by the broker task's command channel.
pub struct BrokerPublisher {
    tx: mpsc::Sender<PublishRequest>,
}

pub fn publisher_channel() -> (BrokerPublisher, mpsc::Receiver<PublishRequest>) {
    let (tx, rx) = mpsc::channel(4);
    (BrokerPublisher { tx }, rx)
}

#[async_trait]
impl SummarySink for BrokerPublisher {
    async fn publish(&self, summary: &PresenceSummary) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let request = PublishRequest { summary: summary.clone(), responder: ack_tx };
        if self.tx.send(request).await.is_err() {
            log::error!("Broker task is gone, dropping presence summary");
            return;
        }

        match tokio::time::timeout(PUBLISH_ACK_WAIT, ack_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => log::error!("Broker rejected presence summary: {}", err),
            Ok(Err(_)) => log::error!("Broker task dropped the publish request"),
            Err(_) => log::error!(
                "No broker acknowledgement within {}s, abandoning publish",
                PUBLISH_ACK_WAIT.as_secs()
            ),
        }
    }
}

pub async fn run(
    config: Config,
    snapshots: SnapshotSender,
    mut publishes: mpsc::Receiver<PublishRequest>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        if shutdown.try_recv().is_ok() {
            break;
        }

        log::info!("Connecting to broker: {}", config.broker_url);

        match connect_async(config.broker_url.as_str()).await {
            Ok((ws_stream, _)) => {
                log::info!("Connected to broker");
                let (mut write, mut read) = ws_stream.split();

                // Subscribe to the session topic and register the retained
                // empty-people last will, so a disconnect reads as "nobody
                // home" instead of silence.
                let mut hello = json!({
                    "subscribe": config.session_topic,
                    "lastWill": {
                        "topic": config.devices_topic,
                        "retain": true,
                        "payload": PresenceSummary::default(),
                    },
                });
                if let (Some(username), Some(password)) =
                    (&config.broker_username, &config.broker_password)
                {
                    hello["auth"] = json!({ "username": username, "password": password });
                }
                if let Err(e) = write.send(WsMessage::Text(hello.to_string().into())).await {
                    log::error!("Failed to subscribe: {}", e);
                } else {
                    loop {
                        tokio::select! {
                            _ = shutdown.recv() => {
                                log::info!("Broker client shutting down...");
                                let _ = write.close().await;
                                return;
                            }
                            Some(request) = publishes.recv() => {
                                let envelope = json!({
                                    "publish": config.devices_topic,
                                    "retain": true,
                                    "payload": request.summary,
                                });
                                log::debug!("Publishing presence summary");
                                match write.send(WsMessage::Text(envelope.to_string().into())).await {
                                    Ok(()) => {
                                        let _ = request.responder.send(Ok(()));
                                    }
                                    Err(e) => {
                                        let _ = request.responder.send(Err(e.to_string()));
                                        log::error!("Failed to publish summary: {}", e);
                                        break; // Reconnect
                                    }
                                }
                            }
                            received = read.next() => {
                                match received {
                                    Some(Ok(WsMessage::Binary(data))) => {
                                        log::trace!("Received binary snapshot: {} bytes", data.len());
                                        snapshots.offer(data.to_vec());
                                    }
                                    Some(Ok(WsMessage::Text(text))) => {
                                        log::trace!("Received text snapshot: {} bytes", text.len());
                                        snapshots.offer(text.as_bytes().to_vec());
                                    }
                                    Some(Ok(WsMessage::Ping(_))) => {}
                                    Some(Err(e)) => {
                                        log::error!("Broker connection error: {}", e);
                                        break; // Reconnect
                                    }
                                    None => {
                                        log::warn!("Broker closed the connection");
                                        break; // Reconnect
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("Failed to connect to broker: {}", e);
            }
        }

        sleep(config.reconnect_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The empty-people last will must carry the stable published schema.
    #[test]
    fn last_will_payload_is_the_empty_summary() {
        let hello = json!({
            "lastWill": {
                "topic": "/net/devices",
                "retain": true,
                "payload": PresenceSummary::default(),
            },
        });
        assert_eq!(
            hello["lastWill"]["payload"].to_string(),
            r#"{"deviceCount":0,"people":[],"peopleCount":0,"unknownDevicesCount":0}"#
        );
    }

    #[tokio::test]
    async fn publish_reports_a_dead_broker_task() {
        let (publisher, rx) = publisher_channel();
        drop(rx);
        // must return promptly and not panic
        publisher.publish(&PresenceSummary::default()).await;
    }
}
