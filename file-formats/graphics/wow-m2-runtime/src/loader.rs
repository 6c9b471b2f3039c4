//! Background model loading
//!
//! A [`ModelLoader`] owns a small pool of worker threads that decode queued
//! models off the render path. Each model is tracked by a [`ModelHandle`]
//! whose [`LoadState`] can be polled without blocking, or waited on when a
//! caller needs the decoded data right away.
//!
//! The loader is an explicitly owned object: build it before the first load
//! and drop it after the last model is no longer needed. Dropping the loader
//! fails every queued model that never started with [`M2Error::Cancelled`],
//! then joins the workers once the models they are decoding finish. A panic
//! while decoding fails that model only, so waiting on a handle always ends.
//!
//! ```rust,ignore
//! let loader = ModelLoader::new(files, RuntimeConfig::default());
//! let handle = loader.load("Creature\\Bear\\Bear.m2");
//! // ... later, per frame
//! if let Some(model) = handle.model() {
//!     // draw
//! }
//! ```

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::error::M2Error;
use crate::model::Model;
use crate::provider::{FileProvider, normalize_path};

/// Progress of a model load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Never queued
    #[default]
    NotLoaded,
    /// Queued or being decoded
    Loading,
    /// Decoded and usable
    Finished,
    /// Decoding failed, the model has no geometry
    Failed,
}

impl LoadState {
    /// Check if the load has settled, successfully or not
    pub fn is_done(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: LoadState,
    model: Option<Arc<Model>>,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct HandleInner {
    slot: Mutex<Slot>,
    done: Condvar,
}

/// Shared handle to a model that may still be loading
#[derive(Debug, Clone)]
pub struct ModelHandle {
    path: Arc<str>,
    inner: Arc<HandleInner>,
}

impl ModelHandle {
    /// Unqueued handle for `path`
    pub fn new(path: &str) -> Self {
        Self {
            path: Arc::from(path),
            inner: Arc::new(HandleInner::default()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> LoadState {
        self.inner.slot.lock().state
    }

    /// Check if the model is queued or being decoded
    pub fn is_loading(&self) -> bool {
        self.state() == LoadState::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.state() == LoadState::Failed
    }

    /// The decoded model, `None` until the load finished successfully
    pub fn model(&self) -> Option<Arc<Model>> {
        self.inner.slot.lock().model.clone()
    }

    /// Reason of a failed load
    pub fn error(&self) -> Option<String> {
        self.inner.slot.lock().error.clone()
    }

    /// Block until the load settles
    ///
    /// Returns immediately for handles that were never queued.
    pub fn wait_until_loaded(&self) -> Option<Arc<Model>> {
        let mut slot = self.inner.slot.lock();
        while slot.state == LoadState::Loading {
            self.inner.done.wait(&mut slot);
        }
        slot.model.clone()
    }

    /// Block until the load settles or `timeout` passes, returning the state seen last
    pub fn wait_timeout(&self, timeout: Duration) -> LoadState {
        let mut slot = self.inner.slot.lock();
        if slot.state == LoadState::Loading {
            let _ = self
                .inner
                .done
                .wait_while_for(&mut slot, |slot| slot.state == LoadState::Loading, timeout);
        }
        slot.state
    }

    /// Move a never-queued handle to `Loading`, false if it was already queued
    fn begin(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.state != LoadState::NotLoaded {
            return false;
        }
        slot.state = LoadState::Loading;
        true
    }

    fn complete(&self, result: crate::Result<Model>) {
        let mut slot = self.inner.slot.lock();
        match result {
            Ok(model) => {
                slot.model = Some(Arc::new(model));
                slot.state = LoadState::Finished;
            }
            Err(err) => {
                log::warn!("Failed to load {}: {}", self.path, err);
                slot.error = Some(err.to_string());
                slot.state = LoadState::Failed;
            }
        }
        drop(slot);
        self.inner.done.notify_all();
    }
}

struct Queue {
    jobs: VecDeque<ModelHandle>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    files: Arc<dyn FileProvider>,
    config: RuntimeConfig,
}

impl Shared {
    fn next_job(&self) -> Option<ModelHandle> {
        let mut queue = self.queue.lock();
        loop {
            if queue.shutdown {
                return None;
            }
            if let Some(job) = queue.jobs.pop_front() {
                return Some(job);
            }
            self.available.wait(&mut queue);
        }
    }

    fn run(&self, handle: &ModelHandle) {
        log::debug!("Decoding {}", handle.path());
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            Model::load(handle.path(), self.files.as_ref(), &self.config)
        }));
        handle.complete(result.unwrap_or_else(|payload| {
            Err(M2Error::DecodePanic {
                path: handle.path().to_string(),
                message: panic_message(payload.as_ref()),
            })
        }));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Queue of model loads served by background threads
pub struct ModelLoader {
    shared: Arc<Shared>,
    handles: Mutex<HashMap<String, ModelHandle>>,
    workers: Vec<JoinHandle<()>>,
}

impl ModelLoader {
    /// Start `config.loader_threads` workers (at least one)
    ///
    /// When no thread can be spawned, queued models are decoded on the
    /// calling thread instead.
    pub fn new(files: Arc<dyn FileProvider>, config: RuntimeConfig) -> Self {
        let thread_count = config.loader_threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            files,
            config,
        });

        let mut workers = Vec::with_capacity(thread_count);
        for i in 0..thread_count {
            let worker_shared = Arc::clone(&shared);
            let spawned = std::thread::Builder::new()
                .name(format!("m2-loader-{}", i))
                .spawn(move || {
                    while let Some(handle) = worker_shared.next_job() {
                        worker_shared.run(&handle);
                    }
                });
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => log::warn!("Could not start model loader thread {}: {}", i, err),
            }
        }

        log::debug!("Model loader started with {} threads", workers.len());

        Self {
            shared,
            handles: Mutex::new(HashMap::new()),
            workers,
        }
    }

    /// Shared handle for `path`, created unqueued on first request
    ///
    /// Paths differing only in case or separator share one handle.
    pub fn handle(&self, path: &str) -> ModelHandle {
        self.handles
            .lock()
            .entry(normalize_path(path))
            .or_insert_with(|| ModelHandle::new(path))
            .clone()
    }

    /// Queue a handle for decoding, no-op if it was queued before
    pub fn queue_for_load(&self, handle: &ModelHandle) {
        if !handle.begin() {
            return;
        }

        if self.workers.is_empty() {
            self.shared.run(handle);
            return;
        }

        self.shared.queue.lock().jobs.push_back(handle.clone());
        self.shared.available.notify_one();
    }

    /// Handle for `path`, queued for decoding
    pub fn load(&self, path: &str) -> ModelHandle {
        let handle = self.handle(path);
        self.queue_for_load(&handle);
        handle
    }

    /// Check if any queued model has not started decoding yet
    pub fn is_loading(&self) -> bool {
        !self.shared.queue.lock().jobs.is_empty()
    }

    /// Number of queued models waiting for a worker
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Forget cached handles nobody else holds
    pub fn purge_unused(&self) {
        self.handles
            .lock()
            .retain(|_, handle| Arc::strong_count(&handle.inner) > 1 || handle.is_loading());
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }
}

impl Drop for ModelLoader {
    fn drop(&mut self) {
        let abandoned: Vec<ModelHandle> = {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            queue.jobs.drain(..).collect()
        };
        self.shared.available.notify_all();

        for handle in abandoned {
            handle.complete(Err(M2Error::Cancelled(handle.path().to_string())));
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("Model loader thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader")
            .field("workers", &self.workers.len())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    #[test]
    fn test_new_handle_is_not_loaded() {
        let handle = ModelHandle::new("a.m2");
        assert_eq!(handle.state(), LoadState::NotLoaded);
        assert!(!handle.is_loading());
        assert!(handle.wait_until_loaded().is_none());
    }

    #[test]
    fn test_missing_file_fails() {
        let loader = ModelLoader::new(Arc::new(MemoryProvider::new()), RuntimeConfig::default());
        let handle = loader.load("missing.m2");
        assert!(handle.wait_until_loaded().is_none());
        assert_eq!(handle.state(), LoadState::Failed);
        assert!(handle.error().is_some());
    }

    #[test]
    fn test_empty_file_fails() {
        let files = MemoryProvider::new();
        files.insert("empty.m2", Vec::new());
        let loader = ModelLoader::new(Arc::new(files), RuntimeConfig::default());
        let handle = loader.load("empty.m2");
        assert_eq!(handle.wait_timeout(Duration::from_secs(10)), LoadState::Failed);
    }

    #[test]
    fn test_handles_are_shared() {
        let loader = ModelLoader::new(Arc::new(MemoryProvider::new()), RuntimeConfig::default());
        let a = loader.handle("World\\Tree.m2");
        let b = loader.handle("world/tree.M2");
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }

    #[test]
    fn test_panic_message_from_payload() {
        let text: Box<dyn Any + Send> = Box::new("bad offset");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bad count"));
        let other: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(text.as_ref()), "bad offset");
        assert_eq!(panic_message(owned.as_ref()), "bad count");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[test]
    fn test_queue_twice_is_noop() {
        let handle = ModelHandle::new("a.m2");
        assert!(handle.begin());
        assert!(!handle.begin());
        assert_eq!(handle.state(), LoadState::Loading);
    }
}
