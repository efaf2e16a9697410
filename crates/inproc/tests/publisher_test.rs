//! Tests for publishers as dependent primitives of a node.

use std::sync::Arc;

use corelib::{Error, Middleware, MiddlewareError, NodeHandle, NodeOptions, Publisher};
use inproc::{logging, InProcessDomain, Operation};

fn setup() -> (Arc<InProcessDomain>, Arc<dyn Middleware>, NodeHandle) {
    logging::init_for_tests();
    let domain = InProcessDomain::new();
    let middleware = domain.as_middleware();
    let mut node = NodeHandle::zeroed();
    let options = NodeOptions::default().with_no_parameters(true);
    let _ = node.init(&middleware, "talker", Some(&options)).unwrap();
    (domain, middleware, node)
}

#[test]
fn test_publish_and_fini() {
    let (domain, _middleware, node) = setup();

    let publisher = Publisher::new(&node, "chatter").unwrap();
    assert_eq!(publisher.topic(), "chatter");
    assert!(publisher.is_valid());

    publisher.publish(b"hello").unwrap();
    publisher.publish(b"world").unwrap();
    assert_eq!(
        domain.messages("chatter"),
        vec![b"hello".to_vec(), b"world".to_vec()]
    );
    assert_eq!(domain.endpoint_count(), 1);

    publisher.fini().unwrap();
    assert_eq!(domain.endpoint_count(), 0);
}

#[test]
fn test_publisher_on_invalid_node() {
    let node = NodeHandle::zeroed();
    assert_eq!(Publisher::new(&node, "chatter").unwrap_err(), Error::NodeInvalid);
}

#[test]
fn test_empty_topic_is_rejected() {
    let (domain, _middleware, node) = setup();
    let err = Publisher::new(&node, "").unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(domain.calls_of(Operation::CreatePublisher).is_empty());
}

#[test]
fn test_publisher_after_node_fini() {
    let (domain, _middleware, mut node) = setup();
    let publisher = Publisher::new(&node, "chatter").unwrap();

    node.fini().unwrap();
    assert!(!publisher.is_valid());
    assert_eq!(publisher.publish(b"late").unwrap_err(), Error::NodeInvalid);
    assert!(domain.calls_of(Operation::Publish).is_empty());

    // The node reclaimed the endpoint; the publisher can only report.
    assert_eq!(domain.endpoint_count(), 0);
    assert_eq!(publisher.fini().unwrap_err(), Error::NodeInvalid);
}

#[test]
fn test_publisher_after_name_takeover() {
    let (domain, middleware, node) = setup();
    let publisher = Publisher::new(&node, "chatter").unwrap();

    let mut usurper = NodeHandle::zeroed();
    let _ = usurper.init(&middleware, "talker", None).unwrap();

    // Local node is still valid, remote side is gone.
    assert!(publisher.is_valid());
    assert_eq!(
        publisher.publish(b"hello").unwrap_err(),
        Error::Middleware(MiddlewareError::NodeShutdown {
            name: "talker".into()
        })
    );
    assert!(domain.messages("chatter").is_empty());

    publisher.fini().unwrap();
}

#[test]
fn test_dropped_publisher_is_reclaimed_by_node_fini() {
    let (domain, _middleware, mut node) = setup();
    let publisher = Publisher::new(&node, "chatter").unwrap();

    drop(publisher);
    assert_eq!(domain.endpoint_count(), 1);
    assert!(domain.calls_of(Operation::DestroyPublisher).is_empty());

    node.fini().unwrap();
    assert_eq!(domain.endpoint_count(), 0);
}

#[test]
fn test_publish_failure_is_reported() {
    let (domain, _middleware, node) = setup();
    let publisher = Publisher::new(&node, "chatter").unwrap();
    domain.inject_failure(Operation::Publish);

    assert_eq!(
        publisher.publish(b"x").unwrap_err(),
        Error::Middleware(MiddlewareError::Injected { operation: "publish" })
    );
    publisher.publish(b"y").unwrap();
    assert_eq!(domain.messages("chatter"), vec![b"y".to_vec()]);
}
