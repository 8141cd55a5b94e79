use crate::error::ProcessorError;
use crate::listeners::{MessageSource, Subscriber};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use redis::{Client, Msg};
use std::pin::Pin;
use tracing::info;

/// Opens one dedicated pub/sub connection per channel.
#[derive(Clone)]
pub struct RedisSubscriber {
    client: Client,
}

impl RedisSubscriber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct RedisMessageSource {
    channel: String,
    messages: Pin<Box<dyn Stream<Item = Msg> + Send>>,
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn MessageSource>, ProcessorError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        info!(channel, "📡 Subscribed to channel");

        Ok(Box::new(RedisMessageSource {
            channel: channel.to_string(),
            messages: Box::pin(pubsub.into_on_message()),
        }))
    }
}

#[async_trait]
impl MessageSource for RedisMessageSource {
    async fn next_payload(&mut self) -> Result<String, ProcessorError> {
        let msg = self
            .messages
            .next()
            .await
            .ok_or_else(|| ProcessorError::Subscription(self.channel.clone()))?;

        // Non UTF-8 payloads are left for the decoder to reject.
        Ok(String::from_utf8_lossy(msg.get_payload_bytes()).into_owned())
    }
}
