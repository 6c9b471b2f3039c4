//! Background model loading

mod common;

use std::sync::{Arc, mpsc};
use std::time::Duration;

use common::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use wow_m2_runtime::{FileProvider, LoadState, MemoryProvider, ModelLoader, RuntimeConfig};

const TIMEOUT: Duration = Duration::from_secs(10);

fn small_model(name: &str) -> Vec<u8> {
    let mut builder = ModelBuilder::new();
    builder
        .name(name)
        .stand(1000)
        .bones(&[BoneSpec::root()])
        .vertices(&[VertexSpec::at([0.0; 3]), VertexSpec::at([1.0, 1.0, 1.0])]);
    builder.build()
}

fn provider(names: &[&str]) -> Arc<MemoryProvider> {
    init_logging();
    let files = MemoryProvider::new();
    for name in names {
        files.insert(&format!("World\\{}.m2", name), small_model(name));
    }
    Arc::new(files)
}

fn config(threads: usize) -> RuntimeConfig {
    RuntimeConfig {
        loader_threads: threads,
        ..RuntimeConfig::default()
    }
}

#[rstest]
#[case(1)]
#[case(4)]
fn test_loads_many_models(#[case] threads: usize) {
    let names = ["Tree", "Rock", "Bush", "Fence", "Lamp", "Crate"];
    let loader = ModelLoader::new(provider(&names), config(threads));

    let handles: Vec<_> = names
        .iter()
        .map(|name| loader.load(&format!("World\\{}.m2", name)))
        .collect();

    for (handle, name) in handles.iter().zip(names) {
        let model = handle.wait_until_loaded().unwrap();
        assert_eq!(model.name, name);
        assert_eq!(handle.state(), LoadState::Finished);
        assert!(handle.error().is_none());
    }
    assert!(!loader.is_loading());
    assert_eq!(loader.pending(), 0);
}

#[test]
fn test_failure_does_not_block_other_loads() {
    let files = provider(&["Good"]);
    files.insert("World\\Bad.m2", b"MD21 not a model".to_vec());
    let loader = ModelLoader::new(files, config(2));

    let bad = loader.load("World\\Bad.m2");
    let missing = loader.load("World\\Missing.m2");
    let good = loader.load("World\\Good.m2");

    assert_eq!(bad.wait_timeout(TIMEOUT), LoadState::Failed);
    assert_eq!(missing.wait_timeout(TIMEOUT), LoadState::Failed);
    assert_eq!(good.wait_timeout(TIMEOUT), LoadState::Finished);
    assert!(bad.model().is_none());
    assert!(missing.error().unwrap().contains("Missing.m2"));
}

#[test]
fn test_same_path_shares_one_decode() {
    let loader = ModelLoader::new(provider(&["Tree"]), config(2));
    let first = loader.load("World\\Tree.m2");
    let second = loader.load("world/tree.m2");

    let a = first.wait_until_loaded().unwrap();
    let b = second.wait_until_loaded().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(second.path(), "World\\Tree.m2");
}

#[test]
fn test_handle_is_lazy_until_queued() {
    let loader = ModelLoader::new(provider(&["Tree"]), config(1));
    let handle = loader.handle("World\\Tree.m2");
    assert_eq!(handle.state(), LoadState::NotLoaded);
    assert!(handle.wait_until_loaded().is_none());

    loader.queue_for_load(&handle);
    assert!(handle.wait_until_loaded().is_some());
}

#[test]
fn test_purge_keeps_held_handles() {
    let loader = ModelLoader::new(provider(&["Tree", "Rock"]), config(1));
    let held = loader.handle("World\\Tree.m2");
    let _ = loader.handle("World\\Rock.m2");

    loader.purge_unused();

    // A purged path gets a fresh handle, a held one is handed out again.
    let again = loader.handle("World\\Tree.m2");
    loader.queue_for_load(&again);
    assert!(held.wait_until_loaded().is_some());
    assert_eq!(loader.handle("World\\Rock.m2").state(), LoadState::NotLoaded);
}

#[test]
fn test_drop_joins_workers() {
    let loader = ModelLoader::new(provider(&["Tree"]), config(3));
    let handle = loader.load("World\\Tree.m2");
    drop(loader);
    // The queued job either finished before shutdown or was cancelled.
    assert!(handle.state().is_done());
}

/// Holds every open until the test releases it, reporting the first one
struct GatedProvider {
    files: Arc<MemoryProvider>,
    started: Mutex<mpsc::Sender<String>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl FileProvider for GatedProvider {
    fn open(&self, path: &str) -> Option<Vec<u8>> {
        let _ = self.started.lock().send(path.to_string());
        // Returns once the sender is dropped.
        let _ = self.release.lock().recv();
        self.files.open(path)
    }
}

#[test]
fn test_drop_fails_queued_loads() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let files = GatedProvider {
        files: provider(&["Tree", "Rock"]),
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    };
    let loader = ModelLoader::new(Arc::new(files), config(1));

    let busy = loader.load("World\\Tree.m2");
    let opened = started_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(opened, "World\\Tree.m2");
    let queued = loader.load("World\\Rock.m2");
    assert_eq!(loader.pending(), 1);

    let dropper = std::thread::spawn(move || drop(loader));

    // The queued load settles while the only worker is still blocked.
    assert_eq!(queued.wait_timeout(TIMEOUT), LoadState::Failed);
    assert!(queued.wait_until_loaded().is_none());
    assert!(queued.error().unwrap().contains("shut down"));

    drop(release_tx);
    dropper.join().unwrap();
    assert_eq!(busy.wait_timeout(TIMEOUT), LoadState::Finished);
}

struct PanickingProvider(Arc<MemoryProvider>);

impl FileProvider for PanickingProvider {
    fn open(&self, path: &str) -> Option<Vec<u8>> {
        assert!(!path.contains("Broken"), "corrupt archive entry");
        self.0.open(path)
    }
}

#[test]
fn test_decode_panic_fails_only_that_model() {
    let loader = ModelLoader::new(Arc::new(PanickingProvider(provider(&["Tree"]))), config(1));

    let broken = loader.load("World\\Broken.m2");
    assert_eq!(broken.wait_timeout(TIMEOUT), LoadState::Failed);
    assert!(broken.error().unwrap().contains("corrupt archive entry"));

    // The worker survives and keeps serving the queue.
    let good = loader.load("World\\Tree.m2");
    assert_eq!(good.wait_timeout(TIMEOUT), LoadState::Finished);
}
