//! Server module: accepts connections and answers with routing decisions.

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tether_core::{Balancer, RoutingDecision};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::session::SessionCodec;

/// Everything a request handler needs.
#[derive(Debug)]
pub struct AppState {
    balancer: Balancer,
    sessions: SessionCodec,
}

impl AppState {
    /// Bundle the balancer with the session cookie codec.
    pub fn new(balancer: Balancer, sessions: SessionCodec) -> Self {
        Self { balancer, sessions }
    }
}

/// Starts the redirect front on the given address and serves until `shutdown`.
pub async fn start_server(
    addr: SocketAddr,
    tls_acceptor: Option<TlsAcceptor>,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, tls = tls_acceptor.is_some(), "Listening");

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Listener stopped");
                return Ok(());
            }
            accepted = listener.accept() => accepted?,
        };

        let state = Arc::clone(&state);
        match &tls_acceptor {
            Some(acceptor) => {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => serve_connection(tls_stream, state).await,
                        Err(e) => debug!(%peer, error = %e, "TLS handshake failed"),
                    }
                });
            }
            None => {
                tokio::spawn(serve_connection(stream, state));
            }
        }
    }
}

async fn serve_connection<S>(stream: S, state: Arc<AppState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));
    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        debug!(error = %err, "Error serving connection");
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let cookie = req.headers().get(COOKIE).and_then(|v| v.to_str().ok());
    Ok(respond(&state, req.method(), req.uri().path(), cookie))
}

/// Builds the response for one request.
pub fn respond(
    state: &AppState,
    method: &Method,
    path: &str,
    cookie: Option<&str>,
) -> Response<Full<Bytes>> {
    let readable = *method == Method::GET || *method == Method::HEAD;
    match (readable, path) {
        (true, "/") => redirect(state, cookie),
        (true, "/status") => status(state),
        (false, "/" | "/status") => text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    }
}

fn redirect(state: &AppState, cookie: Option<&str>) -> Response<Full<Bytes>> {
    let session = state.sessions.session(cookie, state.balancer.registry());

    let route = match state.balancer.decide_with(session, &mut rand::rng()) {
        RoutingDecision::Routed(route) => route,
        RoutingDecision::ServiceUnavailable => {
            warn!("No healthy backend servers available");
            return text(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
        }
    };

    let location = HeaderValue::from_str(route.backend_id.as_str());
    let set_cookie = HeaderValue::from_str(&state.sessions.set_cookie(&route.assignment));
    let (Ok(location), Ok(set_cookie)) = (location, set_cookie) else {
        error!(backend = %route.backend_id, "Backend url is not a valid header value");
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    };

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    headers.insert(LOCATION, location);
    headers.insert(SET_COOKIE, set_cookie);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn status(state: &AppState) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "health_status": state.balancer.snapshot() });
    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to encode status");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
