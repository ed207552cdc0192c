//! Redis pub/sub を使った Relay 実装
//!
//! - publish: `ConnectionManager` 経由で `PUBLISH messages-{nodeId} <json>`
//! - subscribe: 専用の pub/sub 接続でチャンネルを購読し、受信したエンベロープを
//!   `RelaySubscription` へ流すタスクを起動する。接続が切れたら指数バックオフで再接続する

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::mpsc;

use crate::domain::{
    MessageRelay, NodeId, RelayEnvelope, RelayError, RelaySubscription, relay_channel,
};

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

fn backend_error(e: redis::RedisError) -> RelayError {
    RelayError::Backend(e.to_string())
}

/// 再接続の待ち時間（上限付きの指数バックオフ）
#[derive(Debug)]
struct Backoff {
    current: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            current: INITIAL_BACKOFF,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.current = INITIAL_BACKOFF;
    }
}

/// 購読ループが終了した理由
enum StreamOutcome {
    /// 受信側（ノード）が購読をやめた
    ReceiverDropped,
    /// Redis 側のストリームが切れた
    Disconnected,
}

/// Redis Relay
#[derive(Clone)]
pub struct RedisMessageRelay {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisMessageRelay {
    /// Redis に接続する
    ///
    /// # Errors
    ///
    /// URL が不正な場合、または publish 用の初回接続に失敗した場合
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(backend_error)?;
        tracing::info!("Relay connected to Redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl MessageRelay for RedisMessageRelay {
    async fn publish(&self, target: &NodeId, envelope: &RelayEnvelope) -> Result<(), RelayError> {
        let channel = relay_channel(target);
        let payload = envelope.encode()?;
        let mut con = self.publisher.clone();
        let receivers: usize = con
            .publish(&channel, payload)
            .await
            .map_err(backend_error)?;
        ensure_received(channel, receivers)
    }

    async fn subscribe(&self, node_id: &NodeId) -> Result<RelaySubscription, RelayError> {
        let channel = relay_channel(node_id);
        // 初回の購読は呼び出し元で失敗を検知できるようにここで行う
        let pubsub = open_subscription(&self.client, &channel).await?;
        tracing::info!("Subscribed to relay channel {}", channel);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(subscriber_loop(self.client.clone(), channel, tx, pubsub));
        Ok(rx)
    }
}

/// PUBLISH の戻り値（受信した購読者数）が 0 なら宛先ノードは購読していない
fn ensure_received(channel: String, receivers: usize) -> Result<(), RelayError> {
    if receivers == 0 {
        tracing::warn!("No subscriber on channel {}, message dropped", channel);
        return Err(RelayError::NoSubscribers(channel));
    }
    tracing::debug!("Published message to channel {} ({} receivers)", channel, receivers);
    Ok(())
}

async fn open_subscription(
    client: &redis::Client,
    channel: &str,
) -> Result<redis::aio::PubSub, RelayError> {
    let mut pubsub = client.get_async_pubsub().await.map_err(backend_error)?;
    pubsub.subscribe(channel).await.map_err(backend_error)?;
    Ok(pubsub)
}

async fn subscriber_loop(
    client: redis::Client,
    channel: String,
    tx: mpsc::UnboundedSender<RelayEnvelope>,
    first: redis::aio::PubSub,
) {
    let mut backoff = Backoff::new();
    let mut next = Some(first);

    loop {
        let pubsub = match next.take() {
            Some(pubsub) => pubsub,
            None => match open_subscription(&client, &channel).await {
                Ok(pubsub) => {
                    tracing::info!("Re-subscribed to relay channel {}", channel);
                    pubsub
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        "Failed to subscribe to {}: {}. Retrying in {:?}",
                        channel,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            },
        };
        backoff.reset();

        match forward_messages(pubsub, &channel, &tx).await {
            StreamOutcome::ReceiverDropped => {
                tracing::info!("Relay subscription on {} closed", channel);
                return;
            }
            StreamOutcome::Disconnected => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    "Relay subscription on {} lost. Reconnecting in {:?}",
                    channel,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn forward_messages(
    pubsub: redis::aio::PubSub,
    channel: &str,
    tx: &mpsc::UnboundedSender<RelayEnvelope>,
) -> StreamOutcome {
    let stream = pubsub.into_on_message();
    tokio::pin!(stream);

    loop {
        let msg = tokio::select! {
            _ = tx.closed() => return StreamOutcome::ReceiverDropped,
            msg = stream.next() => msg,
        };
        let Some(msg) = msg else {
            return StreamOutcome::Disconnected;
        };

        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Non-text payload on {}: {}", channel, e);
                continue;
            }
        };

        match serde_json::from_str::<RelayEnvelope>(&payload) {
            Ok(envelope) => {
                if tx.send(envelope).is_err() {
                    return StreamOutcome::ReceiverDropped;
                }
            }
            Err(e) => tracing::warn!("Dropping malformed relay payload on {}: {}", channel, e),
        }
    }
}
