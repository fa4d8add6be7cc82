//! # Error Handling Tests
//!
//! Error classification and the backoff used for transport failures.

use app_operator::controller::backoff::FibonacciBackoff;
use app_operator::controller::error::{ApiError, ErrorKind, ObjectRef, ReconcilerError, Verb};

fn deployment_ref() -> ObjectRef {
    ObjectRef {
        kind: "Deployment".to_string(),
        namespace: "demo-stag".to_string(),
        name: "workload-demo-stag".to_string(),
    }
}

#[test]
fn test_backoff_calculation_fibonacci_sequence() {
    let mut backoff = FibonacciBackoff::new(60, 600);
    let test_cases = [60, 60, 120, 180, 300, 480, 600, 600];

    for (attempt, expected_seconds) in test_cases.into_iter().enumerate() {
        assert_eq!(
            backoff.next_backoff_seconds(),
            expected_seconds,
            "Backoff for attempt {attempt} should be {expected_seconds} seconds"
        );
    }
}

#[test]
fn test_api_errors_keep_their_kind_when_wrapped() {
    let cases = [
        (ApiError::NotFound, ErrorKind::NotFound),
        (
            ApiError::Conflict("the object has been modified".to_string()),
            ErrorKind::Conflict,
        ),
        (ApiError::Other("connection refused".into()), ErrorKind::Transport),
    ];

    for (api_error, expected) in cases {
        let error = ReconcilerError::from_api(api_error, deployment_ref(), Verb::Update);
        assert_eq!(error.kind(), expected);
    }
}

#[test]
fn test_transport_error_names_kind_object_and_verb() {
    let error = ReconcilerError::from_api(
        ApiError::Other("connection refused".into()),
        deployment_ref(),
        Verb::Create,
    );

    let message = error.to_string();
    assert!(message.contains("create"));
    assert!(message.contains("Deployment demo-stag/workload-demo-stag"));
    assert!(message.contains("connection refused"));
}
