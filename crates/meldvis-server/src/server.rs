//! Axum web server with WebSocket streaming for presentation clients.

use std::net::SocketAddr;
use std::num::NonZeroU32;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use meldvis_core::{
    EventRecord, NodeInspection, PlaybackStatus, PlayerCommand, Point, RuntimeNodeId, Scene,
    SessionStatus,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use crate::actor::{CommandReply, Frame, SessionHandle};
use crate::error::Result;

/// HTTP and WebSocket surface over a session actor.
pub struct VisServer {
    session: SessionHandle,
}

impl VisServer {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    /// Build the router for the server.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(status_handler))
            .route("/api/scene", get(scene_handler))
            .route("/api/playback", get(playback_handler))
            .route("/api/playback/advance", post(advance_handler))
            .route("/api/playback/play", post(play_handler))
            .route("/api/playback/stop", post(stop_handler))
            .route("/api/playback/terminate", post(terminate_handler))
            .route("/api/playback/jump", post(jump_handler))
            .route("/api/select", post(select_handler))
            .route("/api/active", post(active_handler))
            .route("/api/pick", post(pick_handler))
            .route("/api/inspection", get(inspection_handler))
            .route("/api/trail", get(trail_handler))
            .route("/api/trail/{node}", get(node_trail_handler))
            // Frame stream plus player commands
            .route("/ws", get(ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.session.clone())
    }

    /// Run the server on the given address.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("meldvis listening on http://{}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn status_handler(State(session): State<SessionHandle>) -> Result<Json<SessionStatus>> {
    Ok(Json(session.status().await?))
}

async fn scene_handler(State(session): State<SessionHandle>) -> Result<Json<Scene>> {
    Ok(Json(session.scene().await?))
}

async fn playback_handler(State(session): State<SessionHandle>) -> Result<Json<PlaybackStatus>> {
    Ok(Json(session.playback().await?))
}

async fn run_command(session: &SessionHandle, command: PlayerCommand) -> Result<Json<CommandReply>> {
    Ok(Json(session.command(command).await?))
}

async fn advance_handler(State(session): State<SessionHandle>) -> Result<Json<CommandReply>> {
    run_command(&session, PlayerCommand::Advance).await
}

async fn play_handler(State(session): State<SessionHandle>) -> Result<Json<CommandReply>> {
    run_command(&session, PlayerCommand::Play).await
}

async fn stop_handler(State(session): State<SessionHandle>) -> Result<Json<CommandReply>> {
    run_command(&session, PlayerCommand::Stop).await
}

async fn terminate_handler(State(session): State<SessionHandle>) -> Result<Json<CommandReply>> {
    run_command(&session, PlayerCommand::Terminate).await
}

#[derive(Deserialize)]
struct JumpRequest {
    steps: NonZeroU32,
}

async fn jump_handler(
    State(session): State<SessionHandle>,
    Json(req): Json<JumpRequest>,
) -> Result<Json<CommandReply>> {
    run_command(&session, PlayerCommand::Jump { steps: req.steps }).await
}

#[derive(Deserialize)]
struct NodeRequest {
    node: RuntimeNodeId,
}

#[derive(Serialize)]
struct NodeResponse {
    node: Option<RuntimeNodeId>,
    accepted: bool,
}

async fn select_handler(
    State(session): State<SessionHandle>,
    Json(req): Json<NodeRequest>,
) -> Result<Json<NodeResponse>> {
    let accepted = session.select(req.node).await?;
    Ok(Json(NodeResponse {
        node: Some(req.node),
        accepted,
    }))
}

async fn active_handler(
    State(session): State<SessionHandle>,
    Json(req): Json<NodeRequest>,
) -> Result<Json<NodeResponse>> {
    let accepted = session.activate(req.node).await?;
    Ok(Json(NodeResponse {
        node: Some(req.node),
        accepted,
    }))
}

#[derive(Deserialize)]
struct PickRequest {
    x: f64,
    y: f64,
}

async fn pick_handler(
    State(session): State<SessionHandle>,
    Json(req): Json<PickRequest>,
) -> Result<Json<NodeResponse>> {
    let node = session.pick(Point::new(req.x, req.y)).await?;
    Ok(Json(NodeResponse {
        node,
        accepted: node.is_some(),
    }))
}

async fn inspection_handler(
    State(session): State<SessionHandle>,
) -> Result<Json<Option<NodeInspection>>> {
    Ok(Json(session.inspection().await?))
}

async fn trail_handler(State(session): State<SessionHandle>) -> Result<Json<Vec<EventRecord>>> {
    Ok(Json(session.trail(None).await?))
}

async fn node_trail_handler(
    State(session): State<SessionHandle>,
    Path(node): Path<u64>,
) -> Result<Json<Vec<EventRecord>>> {
    Ok(Json(session.trail(Some(RuntimeNodeId(node))).await?))
}

async fn ws_handler(ws: WebSocketUpgrade, State(session): State<SessionHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, session))
}

/// Requests a WebSocket client can make besides player commands.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsRequest {
    Status,
    Select { node: RuntimeNodeId },
    Active { node: RuntimeNodeId },
    Pick { x: f64, y: f64 },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsResponse {
    Frame(Frame),
    Command(CommandReply),
    Status(SessionStatus),
    Node { node: Option<RuntimeNodeId>, accepted: bool },
    Error { message: String },
}

async fn handle_ws(socket: WebSocket, session: SessionHandle) {
    let mut frames = session.subscribe();
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!("presentation client connected");

    loop {
        let response = tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => WsResponse::Frame(frame),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "presentation client lagging");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => match handle_ws_request(&session, text.as_str()).await {
                    Ok(response) => response,
                    Err(err) => WsResponse::Error { message: err.to_string() },
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "presentation socket error");
                    break;
                }
            },
        };

        let Ok(json) = serde_json::to_string(&response) else {
            continue;
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
    tracing::debug!("presentation client disconnected");
}

async fn handle_ws_request(session: &SessionHandle, text: &str) -> Result<WsResponse> {
    if let Ok(command) = serde_json::from_str::<PlayerCommand>(text) {
        return Ok(WsResponse::Command(session.command(command).await?));
    }

    let request = serde_json::from_str::<WsRequest>(text).map_err(meldvis_core::Error::from)?;
    Ok(match request {
        WsRequest::Status => WsResponse::Status(session.status().await?),
        WsRequest::Select { node } => WsResponse::Node {
            node: Some(node),
            accepted: session.select(node).await?,
        },
        WsRequest::Active { node } => WsResponse::Node {
            node: Some(node),
            accepted: session.activate(node).await?,
        },
        WsRequest::Pick { x, y } => {
            let node = session.pick(Point::new(x, y)).await?;
            WsResponse::Node {
                node,
                accepted: node.is_some(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::SessionActor;
    use meldvis_core::VisConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn router_builds() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        let server = VisServer::new(handle);
        let _router = server.router();
    }

    #[tokio::test]
    async fn ws_player_command_is_answered() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        handle.opened().unwrap();
        let response = handle_ws_request(&handle, r#"{"command":"advance"}"#)
            .await
            .unwrap();
        match response {
            WsResponse::Command(reply) => assert!(!reply.accepted),
            _ => panic!("expected a command reply"),
        }
    }

    #[tokio::test]
    async fn ws_status_request() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        let response = handle_ws_request(&handle, r#"{"type":"status"}"#).await.unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["connected"], false);
    }

    #[tokio::test]
    async fn ws_garbage_is_an_error() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        assert!(handle_ws_request(&handle, "not json").await.is_err());
    }

    #[tokio::test]
    async fn serves_status_over_http() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        let router = VisServer::new(handle).router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/playback HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();
        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains(r#""state":"disconnected""#));
    }
}
