use crate::config::Config;
use crate::error::{error_response, BoxError, ProxyError, TEXT_PLAIN};
use crate::page::render_index;
use crate::router::{self, Dispatch};
use crate::routes::RouteTable;
use crate::upstream::{UpstreamClient, UpstreamConfig, UpstreamError};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::server::graceful::{GracefulShutdown, Watcher};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Header name for request ID
const X_REQUEST_ID: &str = "x-request-id";
/// Longest inbound request ID we propagate; longer ones are replaced
const MAX_REQUEST_ID_LEN: usize = 128;

const TEXT_HTML: &str = "text/html; charset=utf-8";
const INDEX_CACHE_CONTROL: &str = "public, max-age=3600";
const SCRIPT_CACHE_CONTROL: &str = "no-cache";

/// Body type of every response the proxy produces
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Wrap an in-memory body
pub fn full(body: impl Into<Bytes>) -> ProxyBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Read-only state shared by all connections
pub struct AppState {
    routes: RouteTable,
    upstream: UpstreamClient,
    /// Rendered once; the route table never changes at runtime
    index_page: Bytes,
}

impl AppState {
    pub fn new(routes: RouteTable, upstream: UpstreamClient, public_host: &str) -> Self {
        let index_page = Bytes::from(render_index(&routes, public_host));
        Self {
            routes,
            upstream,
            index_page,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let routes = RouteTable::from_config(&config.routes);
        let upstream = UpstreamClient::new(UpstreamConfig::from(&config.server))?;
        Ok(Self::new(routes, upstream, &config.server.public_host))
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }
}

/// The main reverse proxy server
pub struct ProxyServer {
    bind_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown_rx: watch::Receiver<bool>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl ProxyServer {
    pub fn new(
        bind_addr: SocketAddr,
        state: Arc<AppState>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            state,
            shutdown_rx,
            tls_acceptor: None,
        }
    }

    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls_acceptor = Some(acceptor);
        self
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown, then
    /// wait for open connections to finish their in-flight responses.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let protocol = if self.tls_acceptor.is_some() { "HTTPS" } else { "HTTP" };
        info!(addr = %addr, protocol, "Proxy server listening (HTTP/1.1 and HTTP/2)");

        let mut shutdown_rx = self.shutdown_rx.clone();
        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let state = Arc::clone(&self.state);
                            let tls_acceptor = self.tls_acceptor.clone();
                            let watcher = graceful.watcher();

                            tokio::spawn(async move {
                                if let Some(acceptor) = tls_acceptor {
                                    match acceptor.accept(stream).await {
                                        Ok(tls_stream) => {
                                            if let Err(e) = handle_connection(tls_stream, addr, state, watcher).await {
                                                debug!(addr = %addr, error = %e, "TLS connection error");
                                            }
                                        }
                                        Err(e) => {
                                            debug!(addr = %addr, error = %e, "TLS handshake failed");
                                        }
                                    }
                                } else if let Err(e) = handle_connection(stream, addr, state, watcher).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    // A dropped sender also means shutdown
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(addr = %addr, "Proxy server shutting down");
                        break;
                    }
                }
            }
        }

        drop(listener);

        // Idle connections close at once; busy ones finish their current response
        let open = graceful.count();
        if open > 0 {
            info!(addr = %addr, connections = open, "Draining open connections");
        }
        graceful.shutdown().await;
        info!(addr = %addr, "All connections closed");

        Ok(())
    }
}

async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    state: Arc<AppState>,
    watcher: Watcher,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { handle_request(req, state, addr).await }
    });

    let builder = AutoBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, service);
    watcher
        .watch(conn)
        .await
        .map_err(|e| anyhow::anyhow!("Connection error: {}", e))?;

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    client_addr: SocketAddr,
) -> Result<Response<ProxyBody>, Infallible> {
    // Generate or propagate request ID
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_valid_request_id(v))
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let path = req.uri().path();
    debug!(client = %client_addr, method = %req.method(), path, request_id, "Incoming request");

    let mut response = dispatch(&state, path, &request_id).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    Ok(response)
}

/// Produce the response for a request path. Never fails: every error
/// becomes a plain-text response.
pub async fn dispatch(state: &AppState, path: &str, request_id: &str) -> Response<ProxyBody> {
    match router::resolve(&state.routes, path) {
        Dispatch::Index => index_response(state.index_page.clone()),
        Dispatch::NotFound => {
            debug!(path, request_id, "No route for path");
            error_response(&ProxyError::NotFound)
        }
        Dispatch::Proxy(route) => match state.upstream.fetch(&route.url).await {
            Ok(body) => {
                info!(path, url = %route.url, request_id, "Proxying upstream file");
                script_response(body)
            }
            Err(e) => {
                match &e {
                    UpstreamError::Status(status) => {
                        warn!(path, url = %route.url, status, request_id, "Upstream returned error status");
                    }
                    UpstreamError::Transport(_) | UpstreamError::Timeout(_) => {
                        error!(path, url = %route.url, error = %e, request_id, "Upstream unreachable");
                    }
                }
                error_response(&ProxyError::from(e))
            }
        },
    }
}

fn index_response(page: Bytes) -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, TEXT_HTML)
        .header(CACHE_CONTROL, INDEX_CACHE_CONTROL)
        .body(full(page))
        .expect("valid response with StatusCode enum and static headers")
}

fn script_response(body: ProxyBody) -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, TEXT_PLAIN)
        .header(CACHE_CONTROL, SCRIPT_CACHE_CONTROL)
        .body(body)
        .expect("valid response with StatusCode enum and static headers")
}

/// Printable ASCII only, so IDs are safe to log and echo back
fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn test_state() -> AppState {
        let mut config = Config::default();
        config.server.public_host = "s.example.com".to_string();
        config.routes = vec![
            RouteConfig::new("/check.py", "http://127.0.0.1:9/check.py"),
            RouteConfig::new("/deploy.py", "http://127.0.0.1:9/deploy.py"),
        ];
        AppState::from_config(&config).unwrap()
    }

    async fn body_string(response: Response<ProxyBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_index() {
        let state = test_state();
        let response = dispatch(&state, "/", "req-1").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), TEXT_HTML);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            INDEX_CACHE_CONTROL
        );

        let body = body_string(response).await;
        assert!(body.contains("/check.py"));
        assert!(body.contains("/deploy.py"));
        assert!(body.contains("https://s.example.com/check.py"));
    }

    #[tokio::test]
    async fn test_dispatch_empty_path_is_index() {
        let state = test_state();
        let response = dispatch(&state, "", "req-1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), TEXT_HTML);
    }

    #[tokio::test]
    async fn test_dispatch_index_idempotent() {
        let state = test_state();
        let first = body_string(dispatch(&state, "/", "a").await).await;
        let second = body_string(dispatch(&state, "/", "b").await).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_index_lists_every_accepted_path_verbatim() {
        let paths = [
            "/tools/v1.2_x-y~z.sh",
            "/a+b@c:d!e$f(g)h*i,j;k=l.sh",
            "/%41.sh",
        ];
        let mut config = Config::default();
        config.routes = paths
            .iter()
            .map(|p| RouteConfig::new(p, &format!("http://127.0.0.1:9{}", p)))
            .collect();
        assert!(config.validate().is_ok());

        let state = AppState::from_config(&config).unwrap();
        let body = body_string(dispatch(&state, "/", "req-1").await).await;
        for path in paths {
            assert!(body.contains(&format!(">{}</span>", path)), "{} not listed", path);
            assert!(body.contains(&format!("https://localhost{}</code>", path)), "{} not in command", path);
        }
    }

    #[tokio::test]
    async fn test_dispatch_not_found() {
        let state = test_state();
        let response = dispatch(&state, "/missing", "req-1").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), TEXT_PLAIN);
        assert!(response.headers().get(CACHE_CONTROL).is_none());
        assert_eq!(body_string(response).await, "404 Not Found\n");
        assert_eq!(state.upstream().stats().get_total_requests(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_upstream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = Config::default();
        config.routes = vec![RouteConfig::new("/a.sh", &format!("http://127.0.0.1:{}/a.sh", port))];
        let state = AppState::from_config(&config).unwrap();

        let response = dispatch(&state, "/a.sh", "req-1").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_string(response).await,
            "502 Bad Gateway — upstream unreachable\n"
        );
    }

    #[test]
    fn test_request_id_validation() {
        assert!(is_valid_request_id("abc-123"));
        assert!(is_valid_request_id(&Uuid::new_v4().to_string()));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("has space"));
        assert!(!is_valid_request_id(&"x".repeat(MAX_REQUEST_ID_LEN + 1)));
    }

    #[test]
    fn test_state_from_config() {
        let state = test_state();
        assert_eq!(state.routes().len(), 2);
        assert!(state.upstream().config().user_agent.starts_with("scriptgate/"));
    }
}
