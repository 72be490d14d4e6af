use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::adapters::http::state::HttpState;
use crate::domain::errors::DomainError;
use crate::domain::stream::{DisplayEvent, DisplayInbound, GuidanceUpdate};

fn to_text<T: Serialize>(msg: &T) -> Option<Message> {
    serde_json::to_string(msg).ok().map(|json| Message::Text(json.into()))
}

pub async fn detector_ws(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_detector(socket, st))
}

pub async fn display_ws(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_display(socket, st))
}

/// Puente con el detector remoto: frames hacia fuera, resultados hacia dentro.
async fn handle_detector(mut socket: WebSocket, st: HttpState) {
    let mut link = match st.guidance.attach_detector().await {
        Ok(link) => link,
        Err(e) => {
            warn!("Detector rechazado: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    info!("🔌 Detector #{} enlazado.", link.id());

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match link.deliver_text(&text).await {
                    Ok(()) => {}
                    Err(e @ DomainError::MalformedResult(_)) => warn!("{}", e),
                    Err(_) => break,
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("{}", DomainError::TransportFailure(e.to_string()));
                    break;
                }
            },
            outbound = link.next_outbound() => {
                let Some(msg) = outbound.as_ref().and_then(to_text) else { break };
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("Detector #{} desenlazado.", link.id());
    link.detach().await;
}

/// Clientes de visualización: overlay y guía hacia fuera, tamaño y modo hacia dentro.
async fn handle_display(mut socket: WebSocket, st: HttpState) {
    let mut rx = st.guidance.subscribe();

    if let Some(msg) = st
        .guidance
        .latest_guidance()
        .map(|g| DisplayEvent::Guidance(GuidanceUpdate::from(g)))
        .as_ref()
        .and_then(to_text)
    {
        if socket.send(msg).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<DisplayInbound>(&text) {
                    Ok(msg) => {
                        if let Err(e) = st.guidance.display_command(msg).await {
                            debug!("Mensaje de pantalla ignorado: {}", e);
                        }
                    }
                    Err(e) => warn!("Mensaje de pantalla inválido: {}", e),
                },
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            event = rx.recv() => match event {
                Ok(event) => {
                    let Some(msg) = to_text(&event) else { continue };
                    if socket.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => debug!("Pantalla lenta: {} eventos descartados", n),
                Err(RecvError::Closed) => break,
            }
        }
    }
}
