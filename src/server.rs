//! HTTP Surface
//!
//! One GET endpoint for the QR scanners (responses are rendered HTML pages,
//! since the scanner opens a browser), a landing page with a usage example,
//! and a token-gated admin endpoint that forces a cache reload.

use axum::{
    extract::{ConnectInfo, OriginalUri, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::RegistrationError;
use crate::record::Registration;
use crate::service::{RawSubmission, RegistrationService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RegistrationService>,
    pub allowed_ips: Arc<HashSet<String>>,
    pub admin_token: Arc<Option<String>>,
}

#[derive(Deserialize)]
struct RegistrarParams {
    id: Option<String>,
    variedad: Option<String>,
    bloque: Option<String>,
    tallos: Option<String>,
    tamano: Option<String>,
    /// Legacy alias for `tamano`, still emitted by older QR labels.
    tamali: Option<String>,
    fecha: Option<String>,
    etapa: Option<String>,
    force: Option<String>,
}

#[derive(Deserialize)]
struct RefreshParams {
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/registrar", get(registrar))
        .route("/admin/refresh-cache", get(refresh_cache))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor de registro activo en http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
    <h2>Sistema de Registro de Flores</h2>
    <p>Ejemplo:</p>
    <code>/api/registrar?id=1&variedad=Freedom&bloque=6&tallos=20&tamano=Largo</code>
  "#,
    )
}

async fn registrar(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> (StatusCode, Html<String>) {
    // Allow-list runs before anything else, including query parsing: an
    // unauthorized address gets the 403 even when its query string is
    // garbage the deserializer would reject.
    let ip = client_ip(&headers, peer);
    info!("📡 IP del cliente: {}", ip);
    if !state.allowed_ips.contains(&ip) {
        warn!("🚫 Dirección no autorizada: {}", ip);
        return unauthorized_page();
    }

    let params = match Query::<RegistrarParams>::try_from_uri(&uri) {
        Ok(Query(params)) => params,
        Err(err) => {
            warn!("❌ Query inválida en /api/registrar: {}", err);
            return error_page(&err.to_string());
        }
    };

    let force = matches!(params.force.as_deref(), Some("true" | "1"));

    let submission = RawSubmission {
        id: params.id,
        variedad: params.variedad,
        bloque: params.bloque,
        tallos: params.tallos,
        // Canonical name wins; the legacy alias is resolved here and only here.
        tamano: params.tamano.or(params.tamali),
        fecha: params.fecha,
        etapa: params.etapa,
    };

    match state.service.register(submission, force).await {
        Ok(registration) => success_page(&registration),
        Err(RegistrationError::DuplicateRecord) => duplicate_page(&retry_url(&uri)),
        Err(err @ RegistrationError::MissingField(_)) => missing_page(&err),
        Err(err) => {
            warn!("❌ Error en /api/registrar: {}", err);
            error_page(&err.to_string())
        }
    }
}

async fn refresh_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RefreshParams>,
) -> impl IntoResponse {
    let presented = params.token.or_else(|| {
        headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });

    let authorized = match ((*state.admin_token).as_deref(), presented.as_deref()) {
        (Some(expected), Some(got)) => expected == got,
        _ => false,
    };
    if !authorized {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "token inválido" })),
        );
    }

    match state.service.refresh_cache().await {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "total_rows": status.total_rows,
                "loaded_at": status.loaded_at.to_rfc3339(),
            })),
        ),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": err.to_string() })),
        ),
    }
}

/// First address of the forwarded-for chain, else the raw peer address.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Same URL with `force=true`, for the duplicate-page retry button. Any
/// `force` pair already present is replaced, never duplicated: the query
/// deserializer rejects repeated keys, so a retry link carrying two of them
/// would 400 instead of registering.
fn retry_url(uri: &Uri) -> String {
    let kept: Vec<&str> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && *pair != "force" && !pair.starts_with("force="))
        .collect();

    let mut query = kept.join("&");
    if !query.is_empty() {
        query.push('&');
    }
    format!("{}?{}force=true", uri.path(), query)
}

fn success_page(reg: &Registration) -> (StatusCode, Html<String>) {
    let body = format!(
        r#"<html><body style="font-family:sans-serif;text-align:center;margin-top:160px;">
        <h1 style="font-size:100px;color:#22c55e;">✅ REGISTRO GUARDADO</h1>
        <p style="font-size:32px;">
          Variedad: <b>{}</b> | Bloque: <b>{}</b> | Tallos: <b>{}</b>
        </p>
      </body></html>"#,
        html_escape::encode_text(&reg.variedad),
        html_escape::encode_text(&reg.bloque),
        reg.tallos,
    );
    (StatusCode::OK, Html(body))
}

fn missing_page(err: &RegistrationError) -> (StatusCode, Html<String>) {
    let body = format!(
        r#"<html><body style="text-align:center;margin-top:60px;">
        <h1 style="color:#dc2626;font-size:60px;">⚠️ Faltan parámetros</h1>
        <p style="font-size:28px;">{}</p>
      </body></html>"#,
        html_escape::encode_text(&err.to_string()),
    );
    (StatusCode::BAD_REQUEST, Html(body))
}

fn duplicate_page(retry: &str) -> (StatusCode, Html<String>) {
    // The URL lands inside a single-quoted JS string. Quote characters are
    // percent-encoded first (URL-preserving, and entity escapes would be
    // decoded back before the JS runs), then the attribute is HTML-escaped.
    let retry = retry.replace('\'', "%27").replace('"', "%22");
    let body = format!(
        r#"<html><body style="text-align:center;margin-top:120px;background:#b9deff;">
          <h1 style="font-size:72px;color:#f41606;">⚠️ CÓDIGO YA REGISTRADO</h1>
          <button onclick="window.location.href='{}'"
            style="padding:20px 80px;font-size:55px;background:#22c55e;color:white;border:none;border-radius:31px;">
            Registrar de todas formas
          </button>
        </body></html>"#,
        html_escape::encode_double_quoted_attribute(&retry),
    );
    (StatusCode::BAD_REQUEST, Html(body))
}

fn unauthorized_page() -> (StatusCode, Html<String>) {
    let body = r#"<html><body style="text-align:center;margin-top:60px;font-family:sans-serif;">
        <h1 style="color:#dc2626;font-size:60px;">🚫 IP no autorizada</h1>
        </body></html>"#
        .to_string();
    (StatusCode::FORBIDDEN, Html(body))
}

fn error_page(detail: &str) -> (StatusCode, Html<String>) {
    let body = format!(
        r#"<html><body style="text-align:center;margin-top:160px;background:#111827;color:white;">
        <h1 style="font-size:72px;color:#dc2626;">❌ ERROR EN EL REGISTRO</h1>
        <p style="font-size:30px;">{}</p>
      </body></html>"#,
        html_escape::encode_text(detail),
    );
    (StatusCode::BAD_REQUEST, Html(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RegistrationService;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use tower::ServiceExt;

    fn peer() -> SocketAddr {
        "10.1.2.3:55000".parse().unwrap()
    }

    fn test_state(allowed: &[&str]) -> AppState {
        AppState {
            service: Arc::new(RegistrationService::new(Arc::new(MemoryStore::new()), None)),
            allowed_ips: Arc::new(allowed.iter().map(|s| s.to_string()).collect()),
            admin_token: Arc::new(None),
        }
    }

    async fn send(state: AppState, uri: &str, forwarded_for: &str) -> StatusCode {
        let mut request = Request::builder()
            .uri(uri)
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer()));
        router(state).oneshot(request).await.unwrap().status()
    }

    #[test]
    fn forwarded_chain_takes_first_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("186.102.47.124, 172.16.0.9"),
        );
        assert_eq!(client_ip(&headers, peer()), "186.102.47.124");
    }

    #[test]
    fn missing_header_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.1.2.3");
    }

    #[test]
    fn retry_url_appends_to_existing_query() {
        let uri: Uri = "/api/registrar?id=1&variedad=Freedom".parse().unwrap();
        assert_eq!(
            retry_url(&uri),
            "/api/registrar?id=1&variedad=Freedom&force=true"
        );
    }

    #[test]
    fn retry_url_starts_a_query_when_absent() {
        let uri: Uri = "/api/registrar".parse().unwrap();
        assert_eq!(retry_url(&uri), "/api/registrar?force=true");
    }

    #[test]
    fn retry_url_replaces_an_existing_force_pair() {
        let uri: Uri = "/api/registrar?id=1&force=0".parse().unwrap();
        assert_eq!(retry_url(&uri), "/api/registrar?id=1&force=true");

        let uri: Uri = "/api/registrar?force=0".parse().unwrap();
        assert_eq!(retry_url(&uri), "/api/registrar?force=true");
    }

    #[test]
    fn retry_url_survives_the_query_deserializer() {
        let uri: Uri = "/api/registrar?id=1&force=0".parse().unwrap();
        let retry: Uri = retry_url(&uri).parse().unwrap();
        let Query(params) = Query::<RegistrarParams>::try_from_uri(&retry).unwrap();
        assert_eq!(params.id.as_deref(), Some("1"));
        assert_eq!(params.force.as_deref(), Some("true"));
    }

    #[test]
    fn quotes_cannot_escape_the_retry_onclick() {
        let (_, Html(body)) = duplicate_page("/api/registrar?variedad=d'amour");
        assert!(body.contains("d%27amour"));
        assert!(!body.contains("d'amour"));
    }

    #[tokio::test]
    async fn unknown_address_gets_403_even_with_malformed_query() {
        let state = test_state(&["192.168.10.1"]);
        let status = send(state, "/api/registrar?id=1&id=2", "10.9.9.9").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn allowed_address_with_malformed_query_gets_400() {
        let state = test_state(&["192.168.10.1"]);
        let status = send(state, "/api/registrar?id=1&id=2", "192.168.10.1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn allowed_address_registers() {
        let state = test_state(&["192.168.10.1"]);
        let status = send(
            state,
            "/api/registrar?id=1&variedad=Freedom&bloque=6&tallos=20&tamano=Largo",
            "192.168.10.1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
