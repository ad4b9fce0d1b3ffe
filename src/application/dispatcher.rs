//! Listener fan-out onto a single delivery context.
//!
//! Every store owns one or more [`EventDispatcher`]s. A dispatch snapshots
//! the registry and posts one job per listener to the [`MainLoop`], which
//! runs jobs one at a time on a single task. Registration may happen from
//! any thread, including from inside a listener callback.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Posting handle for the delivery context.
///
/// Cheap to clone. Also carries the runtime handle used for
/// fire-and-forget work started from synchronous callbacks.
#[derive(Clone)]
pub struct DeliveryContext {
    jobs: mpsc::UnboundedSender<Job>,
    runtime: Handle,
}

/// The receiving end of the delivery context.
pub struct MainLoop {
    jobs: mpsc::UnboundedReceiver<Job>,
}

impl DeliveryContext {
    /// Create a delivery context whose background work runs on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> (Self, MainLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { jobs: tx, runtime }, MainLoop { jobs: rx })
    }

    /// Queue a job on the delivery context.
    ///
    /// Returns false if the main loop is gone; the job is dropped.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        if self.jobs.send(Box::new(job)).is_err() {
            tracing::warn!("Delivery context closed, dropping job");
            return false;
        }
        true
    }

    /// Run a future on the runtime without waiting for it.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.runtime.spawn(fut));
    }

    /// Run `fut` on the runtime and deliver its value on the delivery context.
    ///
    /// The returned [`Deferred`] resolves to `None` if `fut` yields `None`,
    /// panics, or the main loop has shut down.
    pub fn defer<T, F>(&self, fut: F) -> Deferred<T>
    where
        T: Send + 'static,
        F: Future<Output = Option<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let context = self.clone();
        self.spawn(async move {
            let value = fut.await;
            context.post(move || {
                // The caller may have stopped waiting.
                let _ = tx.send(value);
            });
        });
        Deferred { rx }
    }

    /// Wait until every job posted before this call has run.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.post(move || {
            let _ = tx.send(());
        }) {
            let _ = rx.await;
        }
    }

    #[must_use]
    pub const fn runtime(&self) -> &Handle {
        &self.runtime
    }
}

impl MainLoop {
    /// Run jobs in posting order until every [`DeliveryContext`] is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            run_job(job);
        }
        tracing::debug!("Delivery context drained");
    }

    /// Run every job that is already queued, without waiting for more.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            run_job(job);
            ran += 1;
        }
        ran
    }
}

fn run_job(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("Listener panicked on the delivery context");
    }
}

/// Result of an operation that completes on the delivery context.
///
/// `None` means the operation failed or had nothing to return.
#[must_use = "a deferred result does nothing unless awaited"]
pub struct Deferred<T> {
    rx: oneshot::Receiver<Option<T>>,
}

impl<T> Future for Deferred<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.ok().flatten())
    }
}

/// Ordered, duplicate-free set of listeners with snapshot fan-out.
pub struct EventDispatcher<L: ?Sized> {
    name: &'static str,
    listeners: Mutex<IndexMap<usize, Arc<L>>>,
    context: DeliveryContext,
}

impl<L> EventDispatcher<L>
where
    L: ?Sized + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: &'static str, context: DeliveryContext) -> Self {
        Self {
            name,
            listeners: Mutex::new(IndexMap::new()),
            context,
        }
    }

    /// Add a listener. Returns false if it was already registered.
    pub fn register(&self, listener: Arc<L>) -> bool {
        let key = listener_key(&listener);
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(&key) {
            return false;
        }
        listeners.insert(key, listener);
        tracing::trace!(dispatcher = self.name, count = listeners.len(), "Listener registered");
        true
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, listener: &Arc<L>) -> bool {
        let removed = self
            .listeners
            .lock()
            .shift_remove(&listener_key(listener))
            .is_some();
        if removed {
            tracing::trace!(dispatcher = self.name, "Listener removed");
        }
        removed
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Deliver an event to every listener registered right now.
    ///
    /// Each listener gets its own job on the delivery context. Listeners
    /// added or removed after this call starts do not change who receives
    /// this round. Returns how many deliveries were scheduled.
    pub fn dispatch<F>(&self, deliver: F) -> usize
    where
        F: Fn(&L) + Send + Sync + 'static,
    {
        let snapshot: Vec<Arc<L>> = self.listeners.lock().values().cloned().collect();
        if snapshot.is_empty() {
            return 0;
        }

        let deliver = Arc::new(deliver);
        let mut scheduled = 0;
        for listener in snapshot {
            let deliver = Arc::clone(&deliver);
            if self.context.post(move || deliver(listener.as_ref())) {
                scheduled += 1;
            }
        }
        tracing::debug!(dispatcher = self.name, listeners = scheduled, "Event dispatched");
        scheduled
    }
}

/// Identity of a listener: the address of its allocation.
fn listener_key<L: ?Sized>(listener: &Arc<L>) -> usize {
    Arc::as_ptr(listener).cast::<()>() as usize
}
