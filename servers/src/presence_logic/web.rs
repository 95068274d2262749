//! Web service for the self-service device registry: point lookups by
//! requester address, visibility updates, and the anti-forgery token
//! hand-off. UI rendering happens elsewhere; everything here speaks JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;

use lib_presence::core::engine::PresenceEngine;
use lib_presence::registry::user::{UserEntry, UserRegistry};
use lib_presence::registry::visibility::Visibility;
use lib_presence::registry::is_locally_administered;

use crate::presence_logic::config::Config;
use crate::presence_logic::xsrf::XsrfStore;

pub struct WebState {
    pub engine: Arc<PresenceEngine>,
    pub user_registry: Arc<dyn UserRegistry>,
    pub xsrf: Arc<XsrfStore>,
}

pub async fn run(
    config: Config,
    state: Arc<WebState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/whoami", get(whoami_handler).post(change_handler))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    log::info!("Web service listening on {}", addr);

    if let (Some(cert_path), Some(key_path)) = (config.tls_cert_path, config.tls_key_path) {
        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .context("failed to load TLS configuration")?;

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .context("web service exited")?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("unable to bind {}", addr))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                shutdown.recv().await.ok();
                log::info!("Web service shutting down.");
            })
            .await
            .context("web service exited")?;
    }

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoamiResponse {
    sec_token: String,
    name: String,
    mac: String,
    device_name: String,
    visibility: Option<Visibility>,
    is_locally_administered: bool,
    mac_not_found: bool,
}

/// Resolves the requester to a session and its registry entry, and issues
/// the token the change request has to echo back.
async fn whoami_handler(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<WebState>>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();
    log::debug!("Overview request from {}", ip);

    let mut response = WhoamiResponse {
        sec_token: state.xsrf.new_token(&ip),
        name: "???".to_string(),
        mac: "???".to_string(),
        device_name: String::new(),
        visibility: None,
        is_locally_administered: false,
        mac_not_found: false,
    };

    if let Some(session) = state.engine.find_by_address(&ip) {
        response.is_locally_administered = is_locally_administered(&session.mac);
        response.mac = session.mac;
        if let Some(entry) = state.user_registry.get(&response.mac) {
            response.name = entry.name;
            response.device_name = entry.device_name;
            response.visibility = Some(entry.visibility);
        }
    } else {
        response.mac_not_found = true;
    }

    Json(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRequest {
    action: String,
    sec_token: String,
    name: String,
    #[serde(default)]
    device_name: String,
    // An unknown visibility string fails extraction before the handler runs.
    visibility: Visibility,
}

async fn change_handler(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<WebState>>,
    Json(form): Json<ChangeRequest>,
) -> Response {
    let ip = addr.ip().to_string();

    let Some(session) = state.engine.find_by_address(&ip) else {
        log::error!("No session data found for address {}", ip);
        return bad_request("No device found for your address.");
    };

    if !state.xsrf.check_and_clear(&ip, &form.sec_token) {
        log::error!("Invalid secToken from {} for mac {}", ip, session.mac);
        return bad_request("Invalid secToken.");
    }

    match form.action.as_str() {
        "delete" => {
            log::info!("Delete user info for mac {}", session.mac);
            state.user_registry.delete(&session.mac);
        }
        "update" => {
            log::info!("Change user info for mac {}: {:?}", session.mac, form);
            let entry = UserEntry {
                name: form.name,
                device_name: form.device_name,
                visibility: form.visibility,
                ts: chrono::Utc::now().timestamp_millis(),
            };
            state.user_registry.set(&session.mac, entry);
        }
        other => {
            log::error!("Unknown action '{}' from {}", other, ip);
            return bad_request("Unknown action.");
        }
    }

    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, format!("Error: {}", msg)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_request_rejects_unknown_visibility() {
        let valid = r#"{"action":"update","secToken":"t","name":"anna","visibility":"user"}"#;
        assert!(serde_json::from_str::<ChangeRequest>(valid).is_ok());

        let invalid = r#"{"action":"update","secToken":"t","name":"anna","visibility":"loud"}"#;
        assert!(serde_json::from_str::<ChangeRequest>(invalid).is_err());
    }

    #[test]
    fn whoami_response_uses_the_form_field_names() {
        let response = WhoamiResponse {
            sec_token: "tok".into(),
            name: "???".into(),
            mac: "???".into(),
            device_name: String::new(),
            visibility: None,
            is_locally_administered: false,
            mac_not_found: true,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["secToken"], "tok");
        assert_eq!(json["macNotFound"], true);
        assert_eq!(json["deviceName"], "");
    }
}
