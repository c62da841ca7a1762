//! Request-scoped HTTP server.
//!
//! Wraps `axum::serve` with three guarantees:
//! - every admitted request is counted from entry until its handler returns,
//!   on every exit path including panics;
//! - a panic in one handler is caught at the request boundary, reported once
//!   as a [`Fault`], and answered with `500 internal failure`;
//! - [`HttpServer::close`] stops accepting, then waits for the count to
//!   reach zero before returning.
//!
//! A fatal accept error is reported once as [`Fault::Accept`] and ends the
//! accept loop; per-connection accept errors are skipped.

use crate::metrics;
use crate::stack::{FaultSink, Service, ServiceError};
use async_trait::async_trait;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use prometheus::IntGauge;
use std::any::Any;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

/// A failure reported on a server's fault stream.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// A handler panicked; only that request was affected.
    #[error("{server}: request {method} {path} panicked: {message}")]
    Recovered {
        server: String,
        method: Method,
        path: String,
        message: String,
    },

    /// The accept loop failed on its own. The server no longer accepts.
    #[error("{server}: accept loop failed: {error}")]
    Accept {
        server: String,
        #[source]
        error: io::Error,
    },
}

/// Server lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server is already serving")]
    AlreadyServing,

    #[error("server is closed")]
    Closed,

    #[error("serve task ended abnormally")]
    Aborted,
}

/// Count of requests whose handlers are still running.
#[derive(Clone)]
pub struct ActiveRequests {
    count: Arc<watch::Sender<usize>>,
    gauge: IntGauge,
}

impl ActiveRequests {
    fn new(server: &str) -> Self {
        Self {
            count: Arc::new(watch::Sender::new(0)),
            gauge: metrics::HTTP_ACTIVE_REQUESTS.with_label_values(&[server]),
        }
    }

    /// Admit a request. The count drops when the guard does.
    pub fn enter(&self) -> RequestGuard {
        self.count.send_modify(|n| *n += 1);
        self.gauge.inc();
        RequestGuard {
            active: self.clone(),
        }
    }

    pub fn current(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until no request is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Keeps one request counted while alive.
pub struct RequestGuard {
    active: ActiveRequests,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.active.count.send_modify(|n| *n -= 1);
        self.active.gauge.dec();
    }
}

#[derive(Clone)]
struct RequestScope {
    server: Arc<str>,
    active: ActiveRequests,
    faults: FaultSink,
}

async fn request_scope(State(scope): State<RequestScope>, req: Request, next: Next) -> Response {
    let _guard = scope.active.enter();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(server = %scope.server, %method, %path, %message, "Request handler panicked");
            metrics::REQUEST_FAULTS.inc();
            let _ = scope.faults.send(Fault::Recovered {
                server: scope.server.to_string(),
                method,
                path,
                message,
            });
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONNECTION, "close")],
                "internal failure",
            )
                .into_response()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Source of raw connections under a [`ReportingListener`].
pub(crate) trait Acceptor: Send + 'static {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Errors that belong to one connection, not to the listener.
fn is_connection_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Listener handed to `axum::serve`.
///
/// Connection errors are skipped. Any other accept error raised before close
/// is sent once as [`Fault::Accept`], raises the shutdown signal and parks the
/// accept loop until `axum::serve` drops it.
pub(crate) struct ReportingListener<A> {
    inner: A,
    server: Arc<str>,
    faults: FaultSink,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<A: Acceptor> ReportingListener<A> {
    pub(crate) fn new(
        inner: A,
        server: Arc<str>,
        faults: FaultSink,
        shutdown: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            inner,
            server,
            faults,
            shutdown,
        }
    }
}

impl<A: Acceptor> axum::serve::Listener for ReportingListener<A> {
    type Io = A::Io;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, SocketAddr) {
        loop {
            match self.inner.accept().await {
                Ok(conn) => return conn,
                Err(error) if is_connection_error(&error) => {
                    tracing::debug!(server = %self.server, %error, "Connection failed during accept");
                }
                Err(error) => {
                    let closing = *self.shutdown.borrow();
                    if closing {
                        tracing::debug!(server = %self.server, %error, "Accept failed during close");
                    } else {
                        tracing::error!(server = %self.server, %error, "Accept loop failed");
                        metrics::ACCEPT_FAULTS.inc();
                        let _ = self.faults.send(Fault::Accept {
                            server: self.server.to_string(),
                            error,
                        });
                        self.shutdown.send_replace(true);
                    }
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// Serve `app` on `listener` until the shutdown signal is raised and every
/// connection has closed.
pub(crate) async fn run_accept_loop<A: Acceptor>(
    listener: ReportingListener<A>,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = Arc::clone(&listener.server);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|closing| *closing).await;
        })
        .await;
    match result {
        Ok(()) => tracing::debug!(server = %name, "Accept loop exited"),
        Err(error) => tracing::error!(server = %name, %error, "Accept loop exited with error"),
    }
}

/// Everything `serve` consumes. Present until served or closed.
struct Pending {
    listener: TcpListener,
    router: Router,
    done: watch::Sender<bool>,
}

/// An HTTP server bound to a listener.
pub struct HttpServer {
    name: Arc<str>,
    local_addr: SocketAddr,
    active: ActiveRequests,
    pending: Mutex<Option<Pending>>,
    shutdown: Arc<watch::Sender<bool>>,
    done: watch::Receiver<bool>,
}

impl HttpServer {
    /// Wrap a bound listener. Nothing is accepted until [`serve`](Self::serve).
    pub fn new(name: &str, listener: TcpListener, router: Router) -> Result<Self, ServerError> {
        let local_addr = listener.local_addr()?;
        let (done_tx, done_rx) = watch::channel(false);
        Ok(Self {
            name: Arc::from(name),
            local_addr,
            active: ActiveRequests::new(name),
            pending: Mutex::new(Some(Pending {
                listener,
                router,
                done: done_tx,
            })),
            shutdown: Arc::new(watch::Sender::new(false)),
            done: done_rx,
        })
    }

    /// Bind `addr` and wrap the listener.
    pub async fn bind(name: &str, addr: &str, router: Router) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Self::new(name, listener, router)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_requests(&self) -> &ActiveRequests {
        &self.active
    }

    /// Start accepting in the background and return the fault stream.
    ///
    /// The stream ends once the server has shut down and every connection
    /// is closed.
    pub fn serve(&self) -> Result<mpsc::UnboundedReceiver<Fault>, ServerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.serve_into(tx)?;
        Ok(rx)
    }

    /// Start accepting in the background, reporting faults to `faults`.
    pub fn serve_into(&self, faults: FaultSink) -> Result<(), ServerError> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Pending {
            listener,
            router,
            done,
        }) = pending
        else {
            return Err(if *self.shutdown.borrow() {
                ServerError::Closed
            } else {
                ServerError::AlreadyServing
            });
        };

        let scope = RequestScope {
            server: Arc::clone(&self.name),
            active: self.active.clone(),
            faults: faults.clone(),
        };
        let app = router.layer(middleware::from_fn_with_state(scope, request_scope));

        let listener = ReportingListener::new(
            listener,
            Arc::clone(&self.name),
            faults,
            Arc::clone(&self.shutdown),
        );
        let shutdown = self.shutdown.subscribe();

        tracing::info!(server = %self.name, addr = %self.local_addr, "Serving");
        tokio::spawn(async move {
            run_accept_loop(listener, app, shutdown).await;
            done.send_replace(true);
        });

        Ok(())
    }

    /// Stop accepting and wait for every admitted request to finish.
    ///
    /// Safe to call repeatedly and concurrently. There is no drain timeout.
    pub async fn close(&self) -> Result<(), ServerError> {
        self.shutdown.send_replace(true);

        let never_served = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pending) = never_served {
            pending.done.send_replace(true);
        }

        let mut done = self.done.clone();
        done.wait_for(|done| *done)
            .await
            .map_err(|_| ServerError::Aborted)?;

        self.active.wait_idle().await;
        tracing::info!(server = %self.name, "Server closed");
        Ok(())
    }
}

/// Runs an [`HttpServer`] as a stack unit.
pub struct HttpService {
    name: String,
    bind: String,
    router: Router,
    server: Option<HttpServer>,
}

impl HttpService {
    pub fn new(name: impl Into<String>, bind: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            bind: bind.into(),
            router,
            server: None,
        }
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(HttpServer::local_addr)
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self, faults: FaultSink) -> Result<(), ServiceError> {
        if self.server.is_some() {
            return Err(ServiceError::AlreadyStarted);
        }
        let server = HttpServer::bind(&self.name, &self.bind, self.router.clone())
            .await
            .map_err(|e| ServiceError::Failed(format!("bind {}: {e}", self.bind)))?;
        server
            .serve_into(faults)
            .map_err(|e| ServiceError::Failed(e.to_string()))?;
        self.server = Some(server);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        let server = self.server.take().ok_or(ServiceError::NotStarted)?;
        server
            .close()
            .await
            .map_err(|e| ServiceError::Failed(e.to_string()))
    }
}
