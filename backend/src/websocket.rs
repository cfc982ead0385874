use crate::error::{AppError, AppResult};
use crate::models::EmergencyService;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        channel: String, // "emergency:{id}", "booking:{id}", "help_request:{id}", "user:{id}"
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channel: String },
    #[serde(rename = "emergency_update")]
    EmergencyUpdate {
        emergency_id: String,
        status: String,
        provider_id: Option<String>,
        estimated_arrival_minutes: Option<i32>,
        note: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        timestamp: i64,
    },
    #[serde(rename = "booking_update")]
    BookingUpdate {
        booking_id: String,
        status: String,
        timestamp: i64,
    },
    #[serde(rename = "help_request_update")]
    HelpRequestUpdate {
        request_id: String,
        status: String,
        volunteer_id: Option<String>,
        timestamp: i64,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// A message addressed to one channel
#[derive(Debug, Clone)]
struct Outbound {
    channel: String,
    message: WsMessage,
}

pub fn emergency_channel(id: Uuid) -> String {
    format!("emergency:{}", id)
}

pub fn booking_channel(id: Uuid) -> String {
    format!("booking:{}", id)
}

pub fn help_request_channel(id: Uuid) -> String {
    format!("help_request:{}", id)
}

pub fn user_channel(id: Uuid) -> String {
    format!("user:{}", id)
}

/// WebSocket server for real-time updates
pub struct WebSocketServer {
    /// Every outbound message; each connection filters by its subscriptions
    tx: broadcast::Sender<Outbound>,
    /// Active subscriptions: channel -> client IDs
    subscriptions: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
    /// Client subscriptions: client_id -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, Vec<String>>>>,
}

impl WebSocketServer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Send a message to all subscribers of a channel. Returns how many
    /// clients were subscribed at send time.
    pub async fn broadcast_to_channel(&self, channel: &str, message: WsMessage) -> usize {
        let count = self
            .subscriptions
            .read()
            .await
            .get(channel)
            .map(|s| s.len())
            .unwrap_or(0);

        if count == 0 {
            return 0;
        }

        debug!("Broadcasting to {} subscribers on channel {}", count, channel);
        let outbound = Outbound {
            channel: channel.to_string(),
            message,
        };
        if let Err(e) = self.tx.send(outbound) {
            warn!("Failed to broadcast message: {}", e);
        }
        count
    }

    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        let subscribers = subscriptions.entry(channel.clone()).or_default();
        if !subscribers.contains(&client_id) {
            subscribers.push(client_id);
        }

        let channels = client_channels.entry(client_id).or_default();
        if !channels.contains(&channel) {
            channels.push(channel.clone());
        }

        info!("Client {} subscribed to {}", client_id, channel);
    }

    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.retain(|&id| id != client_id);
            if subscribers.is_empty() {
                subscriptions.remove(channel);
            }
        }

        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.retain(|c| c != channel);
            if channels.is_empty() {
                client_channels.remove(&client_id);
            }
        }

        info!("Client {} unsubscribed from {}", client_id, channel);
    }

    pub async fn get_client_channels(&self, client_id: Uuid) -> Vec<String> {
        let client_channels = self.client_channels.read().await;
        client_channels.get(&client_id).cloned().unwrap_or_default()
    }

    async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(channel)
            .map(|subscribers| subscribers.contains(&client_id))
            .unwrap_or(false)
    }

    /// Accept connections forever on `listener`
    pub async fn serve(self: Arc<Self>, listener: tokio::net::TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New WebSocket connection from {}", addr);
                    let ws = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = ws.handle_connection(stream).await {
                            error!("WebSocket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("WebSocket accept error: {}", e);
                }
            }
        }
    }

    /// Handle a new WebSocket connection
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket client: {}", client_id);

        let welcome = serde_json::json!({
            "type": "connected",
            "client_id": client_id.to_string(),
            "message": "Connected to HelpHive real-time updates"
        });
        if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
            warn!("Failed to send welcome message: {}", e);
        }

        // Shared between the reader (acks) and the broadcast writer
        let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));

        let ws_server_for_receiver = self.clone();
        let ws_sender_for_receiver = ws_sender.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<WsMessage>(&text) {
                            Ok(WsMessage::Subscribe { channel }) => {
                                ws_server_for_receiver
                                    .subscribe(client_id, channel.clone())
                                    .await;
                                serde_json::json!({ "type": "subscribed", "channel": channel })
                            }
                            Ok(WsMessage::Unsubscribe { channel }) => {
                                ws_server_for_receiver.unsubscribe(client_id, &channel).await;
                                serde_json::json!({ "type": "unsubscribed", "channel": channel })
                            }
                            Ok(_) => {
                                warn!("Unexpected message type from client {}", client_id);
                                serde_json::json!({
                                    "type": "error",
                                    "message": "Only subscribe/unsubscribe are accepted"
                                })
                            }
                            Err(_) => {
                                warn!("Failed to parse message from client {}: {}", client_id, text);
                                serde_json::json!({
                                    "type": "error",
                                    "message": "Invalid message format"
                                })
                            }
                        };

                        let mut sender = ws_sender_for_receiver.lock().await;
                        if let Err(e) = sender.send(Message::Text(reply.to_string())).await {
                            warn!("Failed to reply to client {}: {}", client_id, e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed: {}", client_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            for channel in ws_server_for_receiver.get_client_channels(client_id).await {
                ws_server_for_receiver.unsubscribe(client_id, &channel).await;
            }
        });

        let ws_server_clone = self.clone();
        tokio::spawn(async move {
            loop {
                let outbound = match rx.recv().await {
                    Ok(outbound) => outbound,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} messages", client_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !ws_server_clone
                    .is_client_subscribed(client_id, &outbound.channel)
                    .await
                {
                    continue;
                }

                let json = match serde_json::to_string(&outbound.message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                let mut sender = ws_sender.lock().await;
                if let Err(e) = sender.send(Message::Text(json)).await {
                    debug!("Client {} went away: {}", client_id, e);
                    break;
                }
            }
        });

        Ok(())
    }

    /// Emergency tracking update, sent to the emergency channel and the requester
    pub async fn broadcast_emergency_update(
        &self,
        emergency: &EmergencyService,
        note: Option<String>,
        position: Option<(f64, f64)>,
    ) {
        let message = WsMessage::EmergencyUpdate {
            emergency_id: emergency.id.to_string(),
            status: emergency.status.clone(),
            provider_id: emergency.provider_id.map(|id| id.to_string()),
            estimated_arrival_minutes: emergency.estimated_arrival_minutes,
            note,
            latitude: position.map(|(lat, _)| lat),
            longitude: position.map(|(_, lon)| lon),
            timestamp: chrono::Utc::now().timestamp(),
        };

        self.broadcast_to_channel(&emergency_channel(emergency.id), message.clone())
            .await;
        self.broadcast_to_channel(&user_channel(emergency.user_id), message)
            .await;
    }

    /// Booking status change, sent to the booking channel and both participants
    pub async fn broadcast_booking_update(
        &self,
        booking_id: Uuid,
        status: &str,
        participants: &[Uuid],
    ) {
        let message = WsMessage::BookingUpdate {
            booking_id: booking_id.to_string(),
            status: status.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        self.broadcast_to_channel(&booking_channel(booking_id), message.clone())
            .await;
        for user_id in participants {
            self.broadcast_to_channel(&user_channel(*user_id), message.clone())
                .await;
        }
    }

    /// Help request change, sent to the request channel and the requester
    pub async fn broadcast_help_request_update(
        &self,
        request_id: Uuid,
        requester_id: Uuid,
        status: &str,
        volunteer_id: Option<Uuid>,
    ) {
        let message = WsMessage::HelpRequestUpdate {
            request_id: request_id.to_string(),
            status: status.to_string(),
            volunteer_id: volunteer_id.map(|id| id.to_string()),
            timestamp: chrono::Utc::now().timestamp(),
        };

        self.broadcast_to_channel(&help_request_channel(request_id), message.clone())
            .await;
        self.broadcast_to_channel(&user_channel(requester_id), message)
            .await;
    }

    /// Notify a user directly on `user:{id}`
    pub async fn broadcast_to_user(&self, user_id: Uuid, message: WsMessage) -> usize {
        self.broadcast_to_channel(&user_channel(user_id), message)
            .await
    }
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            client_channels: Arc::clone(&self.client_channels),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let ws = WebSocketServer::new();
        let client = Uuid::new_v4();
        ws.subscribe(client, "booking:1".to_string()).await;
        ws.subscribe(client, "booking:1".to_string()).await;
        assert_eq!(ws.get_client_channels(client).await, vec!["booking:1"]);
        assert!(ws.is_client_subscribed(client, "booking:1").await);
    }

    #[tokio::test]
    async fn test_unsubscribe_cleans_up() {
        let ws = WebSocketServer::new();
        let client = Uuid::new_v4();
        ws.subscribe(client, "emergency:7".to_string()).await;
        ws.unsubscribe(client, "emergency:7").await;
        assert!(ws.get_client_channels(client).await.is_empty());
        assert!(!ws.is_client_subscribed(client, "emergency:7").await);
    }

    #[tokio::test]
    async fn test_broadcast_only_reaches_subscribed_channel() {
        let ws = WebSocketServer::new();
        let mut rx = ws.tx.subscribe();
        let booking_id = Uuid::new_v4();

        // Nobody listening yet
        let sent = ws
            .broadcast_to_channel(
                &booking_channel(booking_id),
                WsMessage::Error { message: "x".into() },
            )
            .await;
        assert_eq!(sent, 0);

        ws.subscribe(Uuid::new_v4(), booking_channel(booking_id)).await;
        ws.broadcast_booking_update(booking_id, "confirmed", &[]).await;

        let outbound = rx.recv().await.unwrap();
        assert_eq!(outbound.channel, booking_channel(booking_id));
        assert!(matches!(
            outbound.message,
            WsMessage::BookingUpdate { ref status, .. } if status == "confirmed"
        ));
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: WsMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"user:abc"}"#).unwrap();
        assert!(matches!(msg, WsMessage::Subscribe { channel } if channel == "user:abc"));
    }
}
