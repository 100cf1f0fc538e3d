use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;

use crate::providers::routing::GeoPoint;
use crate::sync::{
    DriverPositionUpdate, DriverStore, DriverUpdateSender, GeometryProgress,
    GeometryProgressSender,
};

#[derive(Clone)]
pub struct WsState {
    pub drivers: DriverStore,
    pub driver_updates_tx: DriverUpdateSender,
    pub geometry_progress_tx: GeometryProgressSender,
}

/// Client subscription message
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ClientMessage {
    /// Subscribe to drivers on specific routes; empty means all drivers
    Subscribe { route_ids: Vec<i64> },
}

/// Server message sent to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ServerMessage {
    /// Initial connection acknowledgment
    Connected { message: String },
    /// Current positions of all subscribed drivers (sent on subscribe)
    Snapshot { drivers: Vec<DriverSnapshot> },
    /// A single live position update
    Position { update: DriverPositionUpdate },
    /// Per-leg progress while a route geometry is being recomputed
    GeometryProgress { progress: GeometryProgress },
}

#[derive(Debug, Serialize)]
struct DriverSnapshot {
    driver_id: i64,
    route_id: Option<i64>,
    position: Option<GeoPoint>,
}

/// Subscription filter: empty set means every driver
fn matches(filter: &HashSet<i64>, route_id: Option<i64>) -> bool {
    if filter.is_empty() {
        return true;
    }
    route_id.map(|id| filter.contains(&id)).unwrap_or(false)
}

/// WebSocket endpoint for live driver positions
pub async fn ws_drivers(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates_rx = state.driver_updates_tx.subscribe();
    let mut progress_rx = state.geometry_progress_tx.subscribe();

    // Send connected message
    let connected = ServerMessage::Connected {
        message: "Connected to driver positions. Send subscribe message with route_ids.".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Channel to communicate subscriptions from receiver task to sender task
    let (sub_tx, mut sub_rx) = tokio::sync::mpsc::channel::<Vec<i64>>(16);

    let forward_state = state.clone();

    // Forward broadcast updates to the WebSocket; no data flows until the
    // client has subscribed
    let forward_task = tokio::spawn(async move {
        let mut subscription: Option<HashSet<i64>> = None;

        loop {
            tokio::select! {
                // Handle subscription updates
                Some(route_ids) = sub_rx.recv() => {
                    let filter: HashSet<i64> = route_ids.into_iter().collect();

                    let snapshot = {
                        let store = forward_state.drivers.read().await;
                        let mut drivers: Vec<DriverSnapshot> = store
                            .values()
                            .filter(|d| matches(&filter, d.current_route.as_ref().map(|r| r.id)))
                            .map(|d| DriverSnapshot {
                                driver_id: d.id,
                                route_id: d.current_route.as_ref().map(|r| r.id),
                                position: d
                                    .latest_position()
                                    .map(|c| GeoPoint { lat: c.lat, lon: c.lon }),
                            })
                            .collect();
                        drivers.sort_by_key(|d| d.driver_id);
                        drivers
                    };
                    subscription = Some(filter);

                    let msg = ServerMessage::Snapshot { drivers: snapshot };
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
                // Handle broadcast updates
                result = updates_rx.recv() => {
                    match result {
                        Ok(update) => {
                            let filter = match &subscription {
                                Some(f) => f,
                                None => continue,
                            };
                            if !matches(filter, update.route_id) {
                                continue;
                            }
                            let msg = ServerMessage::Position { update };
                            if let Ok(json) = serde_json::to_string(&msg) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
                // Forward geometry progress to subscribed clients
                result = progress_rx.recv() => {
                    match result {
                        Ok(progress) => {
                            if subscription.is_none() {
                                continue;
                            }
                            let msg = ServerMessage::GeometryProgress { progress };
                            if let Ok(json) = serde_json::to_string(&msg) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
    });

    // Handle incoming messages from client
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    match client_msg {
                        ClientMessage::Subscribe { route_ids } => {
                            let _ = sub_tx.send(route_ids).await;
                        }
                    }
                }
            }
            Ok(Message::Ping(_)) => {
                // Axum handles pong automatically
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Deterministic teardown: the forwarder (and its broadcast
    // subscription) is released the moment the client goes away
    forward_task.abort();
}
