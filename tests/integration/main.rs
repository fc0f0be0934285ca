//! Integration tests for Catgraph
//!
//! These tests wire the crates together the way the binary does, with a
//! layout engine double in place of Graphviz.

use async_trait::async_trait;
use catgraph_core::{
    FixtureSource, GraphBuilder, KeyedLockRegistry, LayoutAlgorithm, MetadataProvider,
    OutputFormat, RenderParams, RenderRequest, RequestLimits, SiteMetadata,
    StaticMetadataProvider, TraversalDirection, TraversalOptions, TruncationPolicy,
};
use catgraph_render::{
    Artifact, CachedRenderer, DeliveryPath, FsBackend, LayoutEngine, LayoutError, MemoryBackend,
    OutputPipeline, RenderCoordinator, RenderError, ResultCache,
};
use catgraph_server::{router::create_router, ServerState};
use futures_util::future::join_all;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const SITE: &str = "en.wikipedia.org";

const FIXTURE: &str = r#"
site: en.wikipedia.org
pages:
  - title: Albert Einstein
    categories: ["Category:Physicists", "Category:Nobel laureates in Physics"]
  - title: Marie Curie
    categories: ["Category:Physicists", "Category:Chemists"]
  - title: "Category:Physicists"
    categories: ["Category:Physics", "Category:Scientists by field"]
  - title: "Category:Chemists"
    categories: ["Category:Chemistry", "Category:Scientists by field"]
  - title: "Category:Nobel laureates in Physics"
    categories: ["Category:Physics"]
  - title: "Category:Physics"
    categories: ["Category:Natural sciences"]
  - title: "Category:Natural sciences"
    categories: ["Category:Physics"]
  - title: "Category:Scientists by field"
    hidden: true
"#;

/// Layout engine that counts invocations and writes placeholder output.
#[derive(Default)]
struct SlowLayout {
    calls: AtomicUsize,
}

#[async_trait]
impl LayoutEngine for SlowLayout {
    async fn render(
        &self,
        _source: &Path,
        output: &Path,
        _algorithm: LayoutAlgorithm,
        format: OutputFormat,
        image_map: Option<&Path>,
    ) -> Result<(), LayoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::fs::write(output, format!("fake {}", format.engine_name()))
            .await
            .map_err(|e| LayoutError::MissingOutput(e.to_string()))?;
        if let Some(map) = image_map {
            tokio::fs::write(map, r#"<map id="catgraph" name="catgraph"></map>"#)
                .await
                .map_err(|e| LayoutError::MissingOutput(e.to_string()))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn site() -> SiteMetadata {
    SiteMetadata::new(SITE, "https://en.wikipedia.org/wiki/")
}

struct Stack {
    coordinator: Arc<RenderCoordinator>,
    layout: Arc<SlowLayout>,
    metadata: Arc<dyn MetadataProvider>,
}

fn stack(work_dir: &Path, cache: Arc<ResultCache>, options: TraversalOptions) -> Stack {
    let source = FixtureSource::from_yaml_str(FIXTURE, &site()).unwrap();
    let builder = Arc::new(GraphBuilder::new(Arc::new(source), options));
    let layout = Arc::new(SlowLayout::default());
    let metadata: Arc<dyn MetadataProvider> = Arc::new(StaticMetadataProvider::new([site()]));
    let pipeline = OutputPipeline::new(builder, layout.clone(), Arc::clone(&metadata), work_dir);
    let cached = CachedRenderer::new(Arc::new(pipeline), cache);
    Stack {
        coordinator: Arc::new(RenderCoordinator::new(Arc::new(cached), 4)),
        layout,
        metadata,
    }
}

fn memory_cache() -> Arc<ResultCache> {
    Arc::new(ResultCache::new(
        Arc::new(MemoryBackend::new(100)),
        chrono::Duration::hours(1),
    ))
}

fn request(roots: &[&str], format: &str, links: &str) -> RenderRequest {
    let params = RenderParams {
        root: roots.iter().map(|r| r.to_string()).collect(),
        format: Some(format.to_string()),
        links: Some(links.to_string()),
        ..RenderParams::default()
    };
    RenderRequest::from_params(&params, &site(), &RequestLimits::default()).unwrap()
}

/// Concurrent identical requests share one layout run; later ones hit the cache
#[tokio::test]
async fn test_coalescing_then_cache() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path(), memory_cache(), TraversalOptions::default());
    let request = request(&["Albert Einstein"], "svg", "target");

    let results: Vec<Result<Artifact, RenderError>> =
        join_all((0..8).map(|_| stack.coordinator.render(&request))).await;
    assert_eq!(stack.layout.calls.load(Ordering::SeqCst), 1);
    let first = results[0].clone().unwrap();
    assert!(results.iter().all(|r| r.as_ref() == Ok(&first)));

    let again = stack.coordinator.render(&request).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(stack.layout.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stack.coordinator.in_flight_count(), 0);
}

/// Requests naming the same roots in another order are the same request
#[tokio::test]
async fn test_root_order_shares_render() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path(), memory_cache(), TraversalOptions::default());
    let a = request(&["Albert Einstein", "Marie Curie"], "png", "none");
    let b = request(&["Marie_Curie", "albert Einstein"], "png", "none");

    let (ra, rb) = tokio::join!(stack.coordinator.render(&a), stack.coordinator.render(&b));

    assert_eq!(ra.unwrap(), rb.unwrap());
    assert_eq!(stack.layout.calls.load(Ordering::SeqCst), 1);
}

/// Raster output with links comes back as an image-map wrapper
#[tokio::test]
async fn test_image_map_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path(), memory_cache(), TraversalOptions::default());

    let artifact = stack
        .coordinator
        .render(&request(&["Marie Curie"], "gif", "target"))
        .await
        .unwrap();

    assert_eq!(artifact.delivery, DeliveryPath::ImageMap);
    assert!(artifact.exists());
    let html = std::fs::read_to_string(&artifact.path).unwrap();
    assert!(html.contains(".gif\" usemap=\"#catgraph\""));
}

/// A filesystem cache outlives the stack that filled it
#[tokio::test]
async fn test_fs_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let cache_dir = dir.path().join("cache");
    let request = request(&["Physics"], "pdf", "target");

    let open = || {
        Arc::new(ResultCache::new(
            Arc::new(FsBackend::open(&cache_dir).unwrap()),
            chrono::Duration::hours(1),
        ))
    };

    let first = stack(&work, open(), TraversalOptions::default());
    let artifact = first.coordinator.render(&request).await.unwrap();
    assert_eq!(first.layout.calls.load(Ordering::SeqCst), 1);

    let second = stack(&work, open(), TraversalOptions::default());
    assert_eq!(second.coordinator.render(&request).await.unwrap(), artifact);
    assert_eq!(second.layout.calls.load(Ordering::SeqCst), 0);
}

/// Cycles terminate and hidden categories stay leaves
#[tokio::test]
async fn test_cycle_and_hidden_in_raw_output() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path(), memory_cache(), TraversalOptions::default());
    let mut request = request(&["Albert Einstein"], "dot", "none");
    request.depth = 8;

    let artifact = stack.coordinator.render(&request).await.unwrap();
    let source = std::fs::read_to_string(&artifact.path).unwrap();

    assert_eq!(stack.layout.calls.load(Ordering::SeqCst), 0);
    assert!(source.contains("\"14:Physics\" -> \"14:Natural sciences\""));
    assert!(source.contains("\"14:Natural sciences\" -> \"14:Physics\""));
    assert!(source.contains("\"14:Scientists by field\" ["));
    assert!(!source.contains("\"14:Scientists by field\" ->"));
    assert_eq!(artifact.node_count, 6);
}

/// Descending traversal with a tight node limit is flagged truncated
#[tokio::test]
async fn test_descending_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let options = TraversalOptions {
        direction: TraversalDirection::Descending,
        truncation: TruncationPolicy::Mark,
        ..TraversalOptions::default()
    };
    let stack = stack(dir.path(), memory_cache(), options);
    let mut request = request(&["Category:Scientists by field"], "dot", "none");
    request.node_limit = 2;
    request.include_hidden = true;

    let artifact = stack.coordinator.render(&request).await.unwrap();

    assert!(artifact.truncated);
    assert!(artifact.node_count <= 2);
    let source = std::fs::read_to_string(&artifact.path).unwrap();
    assert!(source.contains("#f6dddd"));
}

/// A caller that stops waiting does not stop the render
#[tokio::test]
async fn test_timeout_keeps_render_going() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path(), memory_cache(), TraversalOptions::default());
    let request = request(&["Marie Curie"], "svg", "none");

    let cancelled = stack
        .coordinator
        .render_within(&request, Duration::from_millis(5))
        .await;
    assert_eq!(cancelled, Err(RenderError::Cancelled));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stack.coordinator.in_flight_count(), 0);
    stack.coordinator.render(&request).await.unwrap();
    assert_eq!(stack.layout.calls.load(Ordering::SeqCst), 1);
}

/// Keyed locks clean up after heavy contention across threads
#[test]
fn test_keyed_lock_registry_drains() {
    let registry = Arc::new(KeyedLockRegistry::<String>::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&counter);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let outer = registry.acquire(format!("key-{}", i % 3));
                    let inner = registry.acquire(format!("key-{}", i % 3));
                    counter.fetch_add(1, Ordering::SeqCst);
                    inner.release();
                    outer.release();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 800);
    assert_eq!(registry.active_keys(), 0);
}

/// Metadata lookups work without an async test runtime
#[test]
fn test_metadata_normalizes_titles() {
    let provider = StaticMetadataProvider::new([site()]);
    let meta = tokio_test::block_on(provider.metadata_for(SITE)).unwrap();
    let key = meta.normalize("category:physics_stubs").unwrap();
    assert_eq!(key.dot_id(), "14:Physics stubs");
}

/// The HTTP layer serves rendered artifacts over a real socket
#[tokio::test]
async fn test_http_render_and_health() {
    let dir = tempfile::tempdir().unwrap();
    let stack = stack(dir.path(), memory_cache(), TraversalOptions::default());
    let state = ServerState::new(
        Arc::clone(&stack.coordinator),
        Arc::clone(&stack.metadata),
        SITE,
        dir.path(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(Arc::new(state))).await.unwrap();
    });

    let health = http_get(addr, "/api/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains("\"status\":\"ok\""));

    let rendered = http_get(addr, "/render?root=Marie%20Curie&root=Albert_Einstein&format=dot").await;
    assert!(rendered.starts_with("HTTP/1.1 200"));
    assert!(rendered.contains("x-catgraph-truncated: false"));
    assert!(rendered.contains("digraph \"catgraph\""));

    let image_map = http_get(addr, "/render?root=Marie%20Curie&format=png&links=target").await;
    assert!(image_map.starts_with("HTTP/1.1 303"));
    assert!(image_map.contains("location: /artifact/"));

    let bad = http_get(addr, "/render?format=dot").await;
    assert!(bad.starts_with("HTTP/1.1 400"));
    assert!(bad.contains("\"error\":\"request\""));

    // Unparseable numbers get the same JSON error body as any other bad request.
    let malformed = http_get(addr, "/render?root=Physics&depth=abc").await;
    assert!(malformed.starts_with("HTTP/1.1 400"));
    assert!(malformed.contains("content-type: application/json"));
    assert!(malformed.contains("\"error\":\"request\""));
    assert!(malformed.contains("malformed query"));
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}
