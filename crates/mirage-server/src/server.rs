//! HTTP transport.
//!
//! A hyper 1 HTTP/1.1 accept loop in front of [`RestApp::dispatch_from`].
//! Each connection runs on its own task. Bodies are read in full, with a
//! size limit and a timeout, before the dispatcher sees the request; both
//! failures are answered with an envelope like any other error.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mirage_server::{RestApp, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = RestApp::builder().build()?;
//!     Server::new(Arc::new(app)).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use mirage_core::{codes, reason_phrase, ApiError, HttpResponse};

use crate::app::RestApp;
use crate::error::{ServerError, ServerResult};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Serves a [`RestApp`] over HTTP/1.1.
#[derive(Debug, Clone)]
pub struct Server {
    app: Arc<RestApp>,
    body_timeout: Duration,
    max_body_bytes: usize,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a server using the app's `server` settings.
    #[must_use]
    pub fn new(app: Arc<RestApp>) -> Self {
        let config = app.config();
        Self {
            body_timeout: config.body_timeout(),
            max_body_bytes: config.server.max_body_bytes,
            shutdown_timeout: config.shutdown_timeout(),
            app,
        }
    }

    /// Returns the application.
    #[must_use]
    pub const fn app(&self) -> &Arc<RestApp> {
        &self.app
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the configured address is invalid or
    /// cannot be bound.
    pub async fn run(self) -> ServerResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs until `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the configured address is invalid or
    /// cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the address is invalid or busy.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        let raw = &self.app.config().server.http_addr;
        let addr: SocketAddr = raw.parse().map_err(|e: std::net::AddrParseError| {
            ServerError::InvalidAddress {
                addr: raw.clone(),
                reason: e.to_string(),
            }
        })?;
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// is triggered, then waits for open connections to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener address cannot be read.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.serve_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => break,
            }
        }

        tracing::info!(
            active = tracker.active_connections(),
            timeout_secs = server.shutdown_timeout.as_secs(),
            "draining connections"
        );
        if tokio::time::timeout(server.shutdown_timeout, tracker.wait_for_drain())
            .await
            .is_err()
        {
            tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle(request, remote_addr).await) }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => result,
            () = shutdown.recv() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        }
    }

    async fn handle(&self, request: http::Request<Incoming>, remote_addr: SocketAddr) -> HttpResponse {
        let (parts, body) = request.into_parts();

        let mut response = match self.read_body(body).await {
            Ok(bytes) => {
                let request = http::Request::from_parts(parts, bytes);
                self.app.dispatch_from(request, Some(remote_addr)).await
            }
            Err(err) => {
                tracing::debug!(remote = %remote_addr, error = %err, "request body rejected");
                self.app.responder().send(err.to_envelope())
            }
        };

        attach_reason_phrase(&mut response);
        response
    }

    async fn read_body(&self, body: Incoming) -> Result<Bytes, ApiError> {
        let limited = Limited::new(body, self.max_body_bytes);
        match tokio::time::timeout(self.body_timeout, limited.collect()).await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) if e.is::<http_body_util::LengthLimitError>() => Err(ApiError::reject(
                codes::REQUEST_INVALID,
                format!("request body exceeds {} bytes", self.max_body_bytes),
            )),
            Ok(Err(e)) => Err(ApiError::reject(
                codes::REQUEST_ERROR,
                format!("failed to read request body: {e}"),
            )),
            Err(_) => Err(ApiError::reject(
                codes::REQUEST_ERROR,
                "request body was not received in time",
            )),
        }
    }
}

/// Sets the reason phrase from the status table on the response.
fn attach_reason_phrase(response: &mut HttpResponse) {
    let phrase = reason_phrase(response.status().as_u16());
    match ReasonPhrase::try_from(phrase.as_bytes()) {
        Ok(phrase) => {
            response.extensions_mut().insert(phrase);
        }
        Err(e) => tracing::debug!(error = %e, phrase, "reason phrase rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_config::AppConfig;

    fn app_with_addr(addr: &str) -> Arc<RestApp> {
        let mut config = AppConfig::default();
        config.server.http_addr = addr.to_string();
        config.server.shutdown_timeout_secs = 1;
        Arc::new(RestApp::builder().config(config).build().unwrap())
    }

    #[test]
    fn test_server_takes_settings_from_config() {
        let server = Server::new(app_with_addr("127.0.0.1:0"));
        assert_eq!(server.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(server.body_timeout, Duration::from_secs(30));
        assert_eq!(server.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_reason_phrase_attached() {
        let mut response = http::Response::new(http_body_util::Full::new(Bytes::new()));
        *response.status_mut() = http::StatusCode::NOT_FOUND;
        attach_reason_phrase(&mut response);
        let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(phrase.as_bytes(), b"Not Found");
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let server = Server::new(app_with_addr("127.0.0.1:0"));
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result =
            tokio::time::timeout(Duration::from_secs(5), server.run_with_shutdown(shutdown)).await;
        assert!(result.unwrap().is_ok());
    }
}
