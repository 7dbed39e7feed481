//! Requester and worker driven together through a shared store, the way
//! the deployed system wires them up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use engine::{Display, EngineConfig, EvalState, Store, Worker};

fn worker_for(store: &Arc<Store>, dir: &tempfile::TempDir) -> Worker {
    let config = EngineConfig {
        poll_interval_ms: 1,
        scratch_dir: Some(dir.path().join("scratch")),
    };
    Worker::new(Arc::clone(store), &config).expect("worker setup failed")
}

fn print_text(display: &Display) -> &str {
    match display {
        Display::Print { text, .. } => text,
        other => panic!("expected a print display, got {:?}", other),
    }
}

#[test]
fn tick_without_a_request_is_a_noop() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(Store::new());
    let worker = worker_for(&store, &dir);

    assert!(!worker.tick());
    assert_eq!(store.context().state, EvalState::Empty);
}

#[test]
fn a_full_request_response_cycle() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(Store::new());
    let worker = worker_for(&store, &dir);

    let project = store.create_project("research");
    let module = store
        .create_module(project, "analysis", "x = 6\nprint(x * 7)")
        .expect("create failed");

    store.request(module, None).expect("request failed");
    assert_eq!(store.context().state, EvalState::Dirty);

    assert!(worker.tick());

    let ctx = store.context();
    assert_eq!(ctx.state, EvalState::Complete);
    assert!(ctx.error.is_none());
    assert_eq!(ctx.displays.len(), 1);
    assert_eq!(print_text(&ctx.displays[0]), "42");
}

#[test]
fn a_new_request_after_completion_recomputes() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(Store::new());
    let worker = worker_for(&store, &dir);

    let project = store.create_project("research");
    let module = store
        .create_module(project, "analysis", "print(1)")
        .expect("create failed");

    store.request(module, None).expect("request failed");
    assert!(worker.tick());
    assert_eq!(print_text(&store.context().displays[0]), "1");

    store.update_module(module, "print(2)").expect("update failed");
    store.mark_module(module).expect("mark failed");
    store.request(module, None).expect("request failed");
    assert_eq!(store.context().state, EvalState::Dirty);

    assert!(worker.tick());
    let ctx = store.context();
    assert_eq!(ctx.state, EvalState::Complete);
    assert_eq!(print_text(&ctx.displays[0]), "2");
    assert_eq!(
        store.module(module).expect("lookup failed").snapshot_count(),
        1
    );
}

#[test]
fn selection_requests_flow_through_the_context() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(Store::new());
    let worker = worker_for(&store, &dir);

    let project = store.create_project("research");
    let module = store
        .create_module(project, "analysis", "x = 1")
        .expect("create failed");

    store
        .request(module, Some("x + 1".to_string()))
        .expect("request failed");
    assert!(worker.tick());

    let ctx = store.context();
    assert_eq!(ctx.state, EvalState::Complete);
    assert_eq!(ctx.displays.len(), 1);
    assert_eq!(print_text(&ctx.displays[0]), "2");
    assert_eq!(ctx.displays[0].title(), "x + 1");
}

#[test]
fn user_errors_complete_the_cycle_with_a_trace() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(Store::new());
    let worker = worker_for(&store, &dir);

    let project = store.create_project("research");
    let module = store
        .create_module(project, "analysis", "1 / 0")
        .expect("create failed");

    store.request(module, None).expect("request failed");
    assert!(worker.tick());

    let ctx = store.context();
    assert_eq!(ctx.state, EvalState::Complete);
    let error = ctx.error.expect("expected an error");
    assert!(error.contains("division by zero"), "error: {}", error);
    assert!(ctx.displays.is_empty());
}

#[test]
fn the_worker_loop_processes_requests_until_stopped() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(Store::new());
    let worker = worker_for(&store, &dir);

    let project = store.create_project("research");
    let module = store
        .create_module(project, "analysis", "print(sum([1, 2, 3]))")
        .expect("create failed");

    let stop = AtomicBool::new(false);
    std::thread::scope(|scope| {
        scope.spawn(|| worker.run(&stop));

        store.request(module, None).expect("request failed");

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if store.context().state == EvalState::Complete {
                break;
            }
            assert!(Instant::now() < deadline, "worker never completed");
            std::thread::sleep(Duration::from_millis(5));
        }
        stop.store(true, Ordering::Relaxed);
    });

    let ctx = store.context();
    assert!(ctx.error.is_none());
    assert_eq!(print_text(&ctx.displays[0]), "6");
}
