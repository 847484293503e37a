use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::warn;

use crate::fanout::FanoutGateway;
use crate::state::AppState;

pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_viewer(socket, state.fanout))
}

async fn serve_viewer(socket: WebSocket, fanout: FanoutGateway) {
    let mut connection = fanout.connect().await;
    let connection_id = connection.id;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = connection.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(error = %error, "failed to encode viewer frame");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        fanout.handle_client_text(connection_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    fanout.disconnect(connection_id).await;
}
