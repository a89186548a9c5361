// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for fan-out and fan-in across multiplexed backends.

mod common;

use common::{failing_backend, CountingBackend, FailingBackend, ManualBackend};
use muxcfg::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

fn multiplex(backends: Vec<Arc<dyn ConfigBackend>>) -> MultiplexBackend {
    MultiplexBackend::new(backends)
}

#[test]
fn test_write_with_one_failure_returns_that_error() {
    let first = Arc::new(InMemoryBackend::new());
    let last = Arc::new(InMemoryBackend::new());
    let mux = multiplex(vec![
        first.clone(),
        Arc::new(FailingBackend::new("middle")),
        last.clone(),
    ]);

    let key = ConfigKey::from("k");
    let err = mux.write_value(&key, Some(ConfigValue::from("v"))).unwrap_err();

    assert!(!matches!(err, ConfigError::Aggregate { .. }));
    assert_eq!(failing_backend(&err), "middle");
    assert!(first.value(&key).is_some());
    assert!(last.value(&key).is_some());
}

#[test]
fn test_write_with_two_failures_aggregates_in_order() {
    let mux = multiplex(vec![
        Arc::new(FailingBackend::new("fails1")),
        Arc::new(InMemoryBackend::new()),
        Arc::new(FailingBackend::new("fails2")),
    ]);

    let err = mux.write_value(&ConfigKey::from("k"), None).unwrap_err();
    let names: Vec<&str> = err.errors().into_iter().map(failing_backend).collect();
    assert_eq!(names, vec!["fails1", "fails2"]);
    assert!(err.to_string().starts_with("2 configuration backends failed"));
}

#[test]
fn test_read_only_backends_report_unsupported() {
    let mux = multiplex(vec![
        Arc::new(ManualBackend::default()),
        Arc::new(InMemoryBackend::new()),
    ]);

    let err = mux
        .write_value(&ConfigKey::from("k"), Some(ConfigValue::from("v")))
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(mux.clear().unwrap_err().is_unsupported());
}

#[test]
fn test_first_non_absent_value_wins() {
    let mux = multiplex(vec![
        Arc::new(NoopBackend::new()),
        Arc::new(InMemoryBackend::from_pairs([("k", "second")])),
        Arc::new(InMemoryBackend::from_pairs([("k", "third"), ("only", "third")])),
    ]);

    assert_eq!(mux.value(&ConfigKey::from("k")).unwrap().as_str(), "second");
    assert_eq!(mux.value(&ConfigKey::from("only")).unwrap().as_str(), "third");
    assert!(mux.value(&ConfigKey::from("missing")).is_none());
}

#[test]
fn test_all_keys_union_or_absent() {
    let mux = multiplex(vec![
        Arc::new(NoopBackend::new()),
        Arc::new(InMemoryBackend::from_pairs([("a", "1"), ("b", "2")])),
        Arc::new(InMemoryBackend::from_pairs([("b", "3"), ("c", "4")])),
    ]);
    let keys = mux.all_keys().unwrap();
    assert_eq!(keys.len(), 3);

    let none = multiplex(vec![Arc::new(NoopBackend::new())]);
    assert!(none.all_keys().is_none());
}

#[test]
fn test_listen_absent_without_notifying_backends() {
    let mux = multiplex(vec![Arc::new(NoopBackend::new()), Arc::new(NoopBackend::new())]);
    assert!(mux.listen(Arc::new(|| {})).is_none());
}

#[test]
fn test_listen_cancels_every_subscription() {
    let first = Arc::new(CountingBackend::default());
    let second = Arc::new(CountingBackend::default());
    let mux = multiplex(vec![
        first.clone(),
        Arc::new(NoopBackend::new()),
        second.clone(),
    ]);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let token = mux
        .listen(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    first.set("a", "1");
    second.set("b", "2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    token.cancel();
    assert_eq!(first.active_subscriptions(), 0);
    assert_eq!(second.active_subscriptions(), 0);
}

#[test]
fn test_refresh_completes_once_across_threads() {
    let backends: Vec<Arc<ManualBackend>> = (0..6).map(|_| Arc::default()).collect();
    let mux = multiplex(
        backends
            .iter()
            .map(|b| Arc::clone(b) as Arc<dyn ConfigBackend>)
            .collect(),
    );

    let (tx, rx) = mpsc::channel();
    mux.refresh(Box::new(move |result| tx.send(result).unwrap()));

    let handles: Vec<_> = backends
        .iter()
        .enumerate()
        .map(|(i, backend)| {
            let backend = Arc::clone(backend);
            thread::spawn(move || {
                if i % 3 == 0 {
                    backend.release(Err(ConfigError::BackendError {
                        backend: format!("b{i}"),
                        message: "timeout".to_string(),
                        source: None,
                    }));
                } else {
                    backend.release(Ok(()));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let outcome = rx.recv().unwrap();
    assert!(rx.try_recv().is_err());
    match outcome {
        Err(ConfigError::Aggregate { errors }) => assert_eq!(errors.len(), 2),
        other => panic!("expected aggregate, got {other:?}"),
    }
}
