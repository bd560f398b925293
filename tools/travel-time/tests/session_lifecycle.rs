use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use travel_time::engine::mock::{MockCall, MockEngine};
use travel_time::geometry::{GeometryValue, Point};
use travel_time::matrix::{MatrixRequest, DEFAULT_BATCH_SIZE};
use travel_time::{Error, LoadOutcome, ReloadPolicy, RouteDispatcher, RouterSession};
use travel_time::dispatch::PointCapacity;

#[test]
fn test_calls_before_load_fail_cleanly() {
    let engine = MockEngine::new();
    let session = RouterSession::new(engine.clone());
    let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());

    let a = GeometryValue::text("POINT(1 2)");
    assert!(matches!(
        dispatcher.route(&a, &a, "auto").unwrap_err(),
        Error::EngineNotLoaded
    ));
    assert!(matches!(
        dispatcher.locate(Point::new(1.0, 2.0), "auto").unwrap_err(),
        Error::EngineNotLoaded
    ));
    assert!(matches!(
        dispatcher.raw_request("status", "{}").unwrap_err(),
        Error::EngineNotLoaded
    ));
    let request = MatrixRequest::bind(vec![1.0], vec![2.0], vec![3.0], vec![4.0], "auto").unwrap();
    assert!(matches!(
        request.init(&session, DEFAULT_BATCH_SIZE).unwrap_err(),
        Error::EngineNotLoaded
    ));

    // session is untouched and loads normally afterwards
    assert!(engine.calls().is_empty());
    assert_eq!(session.load("a.json").unwrap(), LoadOutcome::Loaded);
    assert!(dispatcher.route(&a, &a, "auto").is_ok());
}

#[test]
fn test_reload_sequence() {
    let engine = MockEngine::new();
    let session = RouterSession::new(engine.clone());

    session.load("a.json").unwrap();
    session.load("a.json").unwrap();
    session.load("b.json").unwrap();

    // Old handle released before the new one is constructed
    assert_eq!(
        engine.calls(),
        vec![
            MockCall::Load {
                path: PathBuf::from("a.json"),
                handle: 1
            },
            MockCall::Release { handle: 1 },
            MockCall::Load {
                path: PathBuf::from("b.json"),
                handle: 2
            },
        ]
    );
    assert_eq!(session.generation(), Some(2));
}

#[test]
fn test_discard_then_recover() {
    let engine = MockEngine::new();
    engine.fail_path("broken.json");
    let session = RouterSession::with_policy(engine.clone(), ReloadPolicy::Discard);

    session.load("a.json").unwrap();
    assert!(matches!(
        session.load("broken.json").unwrap_err(),
        Error::Configuration(_)
    ));
    assert!(!session.is_ready());
    assert_eq!(session.generation(), None);

    // A later load of any path works, and a repeat of the failed path retries
    engine.heal_path("broken.json");
    assert_eq!(session.load("broken.json").unwrap(), LoadOutcome::Loaded);
    assert_eq!(session.generation(), Some(2));
}

#[test]
fn test_restore_when_previous_also_fails() {
    let engine = MockEngine::new();
    let session = RouterSession::with_policy(engine.clone(), ReloadPolicy::Restore);
    session.load("a.json").unwrap();

    engine.fail_path("a.json");
    engine.fail_path("b.json");
    let err = session.load("b.json").unwrap_err();

    assert!(err.to_string().contains("b.json"));
    assert!(!session.is_ready());
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_concurrent_routes_serialize_on_one_handle() {
    let engine = MockEngine::new();
    let session = Arc::new(RouterSession::new(engine.clone()));
    session.load("a.json").unwrap();

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());
                for i in 0..25 {
                    let p = Point::new(n as f64, i as f64);
                    dispatcher.route_coordinates(p, p, "auto").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let routes = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, MockCall::Route { handle: 1, .. }))
        .count();
    assert_eq!(routes, 100);
    assert_eq!(engine.loads(), 1);
}

#[test]
fn test_reload_while_routing() {
    let engine = MockEngine::new();
    let session = Arc::new(RouterSession::new(engine.clone()));
    session.load("a.json").unwrap();

    let router_thread = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());
            for _ in 0..200 {
                let p = Point::new(1.0, 1.0);
                // Every call sees either a complete handle or none
                match dispatcher.route_coordinates(p, p, "auto") {
                    Ok(_) | Err(Error::EngineNotLoaded) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        })
    };

    for i in 0..50 {
        let path = if i % 2 == 0 { "b.json" } else { "a.json" };
        session.load(path).unwrap();
    }
    router_thread.join().unwrap();

    assert_eq!(engine.live_handles(), 1);
    assert_eq!(session.generation(), Some(51));
}
