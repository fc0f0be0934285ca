//! Single-flight render coordination with a global concurrency bound
//!
//! Concurrent calls for the same fingerprint share one execution of the
//! inner renderer. The execution runs on its own task: callers only wait
//! for its published outcome, so a caller giving up never disturbs the
//! render or the other waiters.

use crate::artifact::Artifact;
use crate::error::RenderError;
use crate::renderer::Renderer;
use catgraph_core::{Fingerprint, RenderRequest};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, warn};

type Outcome = Result<Artifact, RenderError>;

/// Pending result shared by every caller of one fingerprint.
struct InFlight {
    result: watch::Sender<Option<Outcome>>,
    waiters: AtomicUsize,
}

impl InFlight {
    fn new() -> Self {
        let (result, _) = watch::channel(None);
        InFlight {
            result,
            waiters: AtomicUsize::new(0),
        }
    }
}

type InFlightMap = DashMap<Fingerprint, Arc<InFlight>>;

struct WaiterGuard<'a>(&'a InFlight);

impl<'a> WaiterGuard<'a> {
    fn register(record: &'a InFlight) -> Self {
        record.waiters.fetch_add(1, Ordering::SeqCst);
        WaiterGuard(record)
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owned by the execution task. Publishing removes the in-flight record;
/// if the task dies first, the drop publishes an internal error instead so
/// that no waiter hangs.
struct Publication {
    fingerprint: Fingerprint,
    record: Arc<InFlight>,
    in_flight: Arc<InFlightMap>,
    published: bool,
}

impl Publication {
    fn publish(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        self.published = true;
        let waiters = self.record.waiters.load(Ordering::SeqCst);
        self.record.result.send_replace(Some(outcome));
        self.in_flight
            .remove_if(&self.fingerprint, |_, record| Arc::ptr_eq(record, &self.record));
        debug!("Published {} to {} waiter(s)", self.fingerprint, waiters);
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        if !self.published {
            warn!("Render of {} ended without a result", self.fingerprint);
            self.finish(Err(RenderError::Internal("render aborted".into())));
        }
    }
}

/// Wraps a renderer with request coalescing and bounded fan-out.
pub struct RenderCoordinator {
    inner: Arc<dyn Renderer>,
    slots: Option<Arc<Semaphore>>,
    max_concurrent: usize,
    in_flight: Arc<InFlightMap>,
}

impl RenderCoordinator {
    /// `max_concurrent` bounds distinct renders running at once; 0 means
    /// unbounded.
    pub fn new(inner: Arc<dyn Renderer>, max_concurrent: usize) -> Self {
        let slots = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
        RenderCoordinator {
            inner,
            slots,
            max_concurrent,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of fingerprints currently being rendered.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of callers waiting on `fingerprint`.
    pub fn waiters_for(&self, fingerprint: &Fingerprint) -> usize {
        self.in_flight
            .get(fingerprint)
            .map(|record| record.waiters.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Render, sharing the execution with any overlapping identical call.
    pub async fn render(&self, request: &RenderRequest) -> Outcome {
        let fingerprint = request.fingerprint();
        let (record, leader) = match self.in_flight.entry(fingerprint.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let record = Arc::new(InFlight::new());
                entry.insert(Arc::clone(&record));
                (record, true)
            }
        };

        let mut outcome = record.result.subscribe();
        let _waiter = WaiterGuard::register(&record);

        if leader {
            debug!("Starting render of {}", fingerprint);
            self.spawn_execution(fingerprint, Arc::clone(&record), request.clone());
        } else {
            debug!("Coalescing onto in-flight render of {}", fingerprint);
        }

        match outcome.wait_for(Option::is_some).await {
            Ok(published) => (*published)
                .clone()
                .unwrap_or_else(|| Err(RenderError::Internal("empty render result".into()))),
            Err(_) => Err(RenderError::Internal("render aborted".into())),
        }
    }

    /// Like [`render`](Self::render), but gives up waiting after `timeout`.
    ///
    /// The execution itself keeps going and still fills the cache.
    pub async fn render_within(&self, request: &RenderRequest, timeout: Duration) -> Outcome {
        match tokio::time::timeout(timeout, self.render(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("Gave up waiting for {} after {:?}", request.fingerprint(), timeout);
                Err(RenderError::Cancelled)
            }
        }
    }

    fn spawn_execution(&self, fingerprint: Fingerprint, record: Arc<InFlight>, request: RenderRequest) {
        let publication = Publication {
            fingerprint,
            record,
            in_flight: Arc::clone(&self.in_flight),
            published: false,
        };
        let inner = Arc::clone(&self.inner);
        let slots = self.slots.clone();

        tokio::spawn(async move {
            let _permit = match slots {
                Some(slots) => match slots.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        publication.publish(Err(RenderError::Internal(e.to_string())));
                        return;
                    }
                },
                None => None,
            };
            let outcome = inner.render(&request).await;
            publication.publish(outcome);
        });
    }
}

#[async_trait::async_trait]
impl Renderer for RenderCoordinator {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError> {
        RenderCoordinator::render(self, request).await
    }
}
