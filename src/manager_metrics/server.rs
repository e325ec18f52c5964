use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::thread::JoinHandle;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{error, info};
use crate::manager_metrics::GaugeRegistry;

/// A running exposition endpoint
pub struct Endpoint {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl Endpoint {
    /// Returns false once the serving thread has ended
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Sets the shutdown flag when dropped, so the poll loop stops once the endpoint is gone
struct StopOnExit(Arc<AtomicBool>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Binds the exposition port and serves scrape requests on a dedicated thread.
/// Binding happens before returning so a busy port is reported at startup. Should the
/// serving thread end for any reason the shutdown flag is raised.
///
/// # Arguments
///
/// * 'registry' - the registry to expose
/// * 'port' - tcp port to listen on, 0 picks any free port
/// * 'shutdown' - shutdown flag of the poll loop
pub fn start(registry: GaugeRegistry, port: u16, shutdown: Arc<AtomicBool>) -> Result<Endpoint, std::io::Error> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    info!("metrics endpoint listening on {}", addr);

    let handle = thread::Builder::new()
        .name("metrics-http".to_string())
        .spawn(move || {
            let _stop = StopOnExit(shutdown);

            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(r) => r,
                Err(e) => {
                    error!("unable to start metrics runtime: {}", e);
                    return;
                }
            };

            if let Err(e) = runtime.block_on(serve(listener, registry)) {
                error!("metrics endpoint stopped: {}", e);
            }
        })?;

    Ok(Endpoint { addr, handle })
}

async fn serve(listener: TcpListener, registry: GaugeRegistry) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::from_std(listener)?;
    axum::serve(listener, router(registry)).await
}

pub fn router(registry: GaugeRegistry) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(registry)
}

/// GET /metrics - current gauge values in the text exposition format
async fn metrics(State(registry): State<GaugeRegistry>) -> Response {
    match registry.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("unable to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use crate::models::snapshot::FieldValue;
    use crate::projection::{Bucket, Projection, Window};
    use crate::sink::Sink;
    use crate::manager_metrics::MetricsSink;
    use crate::time_buckets::BucketLabel;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
    }

    #[test]
    fn metrics_handler_serves_text_format() {
        let registry = GaugeRegistry::new().unwrap();
        let mut sink = MetricsSink::new(registry.clone(), "home");
        let mut values = BTreeMap::new();
        values.insert("apparentTemperature", FieldValue::Number(15.0));
        let current = Projection {
            bucket: Bucket { window: Window::Current, label: BucketLabel::now() },
            time: 0,
            values,
        };
        sink.publish(&[current], &[]).unwrap();

        let response = block_on(metrics(State(registry)));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], prometheus::TEXT_FORMAT);

        let body = block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let now = [("location", "home"), ("day", "today"), ("time", "now")];
        assert_eq!(crate::manager_metrics::tests::sample(&text, "forecast_temperature", &now), Some(15.0));
    }

    #[test]
    fn health_is_ok() {
        assert_eq!(block_on(health()), "ok");
    }

    #[test]
    fn started_endpoint_answers_over_tcp() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let endpoint = start(GaugeRegistry::new().unwrap(), 0, shutdown.clone()).unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", endpoint.addr.port())).unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));
        assert!(endpoint.is_running());
        assert!(!shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn ending_server_thread_raises_shutdown() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let _stop = StopOnExit(shutdown);
            })
        };
        worker.join().unwrap();

        assert!(shutdown.load(Ordering::SeqCst));
    }
}
