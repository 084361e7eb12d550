use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use jma_fetch::{
    DispatcherState, FetchError, FetcherConfig, HttpGetter, Transport, TransportError,
    TransportResponse, endpoints,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use url::Url;

/// Serves canned bodies keyed by URL; unknown URLs fail to connect.
#[derive(Default)]
struct CannedTransport {
    bodies: Vec<(String, &'static str)>,
    requests: Mutex<Vec<String>>,
}

impl CannedTransport {
    fn new(bodies: &[(&str, &'static str)]) -> Self {
        Self {
            bodies: bodies.iter().map(|(u, b)| (u.to_string(), *b)).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn fetch(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(url.to_string());
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.bodies
            .iter()
            .find(|(u, _)| u == url.as_str())
            .map(|(_, body)| TransportResponse::ok(Bytes::from_static(body.as_bytes())))
            .ok_or_else(|| TransportError::Other(format!("connection refused: {url}")))
    }
}

fn config(dir: &TempDir) -> FetcherConfig {
    FetcherConfig::builder()
        .with_cache_root(dir.path())
        .with_dispatch_interval(Duration::from_millis(5))
        .build()
}

#[tokio::test]
async fn concurrent_fetch_writes_one_cache_file() {
    let dir = TempDir::new().unwrap();
    let url = "https://example.test/a/b.json";
    let transport = Arc::new(CannedTransport::new(&[(url, "{\"payload\":42}")]));
    let getter = HttpGetter::with_transport(config(&dir), transport.clone());

    let (first, second) = futures::join!(getter.get(url, true), getter.get(url, true));

    assert_eq!(transport.requests(), vec![url]);
    assert_eq!(first.unwrap(), second.unwrap());

    let path = dir.path().join("example.test").join("a").join("b.json");
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"payload\":42}");
    assert_eq!(getter.cache().path_for(&Url::parse(url).unwrap()).unwrap(), path);

    getter.shutdown();
    getter.stopped().await;
    assert_eq!(getter.state(), DispatcherState::Stopped);
}

#[tokio::test]
async fn cache_survives_a_new_getter() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(CannedTransport::new(&[(
        endpoints::AREA_URL,
        "{\"centers\":{\"010100\":{\"name\":\"Hokkaido\"}}}",
    )]));

    let first_run = HttpGetter::with_transport(config(&dir), transport.clone());
    let area = first_run.get_json(endpoints::AREA_URL, true).await.unwrap();
    assert_eq!(area["centers"]["010100"]["name"], "Hokkaido");
    first_run.shutdown();
    first_run.stopped().await;

    let second_run = HttpGetter::with_transport(config(&dir), transport.clone());
    let again = second_run.get_json(endpoints::AREA_URL, true).await.unwrap();
    assert_eq!(again, area);
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(second_run.stats().cache_hits, 1);
}

#[tokio::test]
async fn transport_failure_reaches_caller() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(CannedTransport::default());
    let getter = HttpGetter::with_transport(config(&dir), transport.clone());

    let err = getter
        .get_json("https://example.test/missing.json", true)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(TransportError::Other(_))));
    assert_eq!(getter.pending_count(), 0);
}
