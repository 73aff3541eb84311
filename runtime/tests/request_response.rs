//! Integration tests for Store request/response
//!
//! Covers the request/response pattern the order workflow relies on: a
//! command carries a request id, its effect answers with a result action
//! echoing that id, and callers wait for their own result.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;
use storefront_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use storefront_runtime::{Store, StoreError};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum LookupAction {
    /// Look a key up remotely after `delay_ms`
    Lookup { request_id: u64, key: String, delay_ms: u64 },
    /// Lookup that answers with a follow-up step before finishing
    LookupTwice { request_id: u64, key: String },
    /// Result of a lookup
    Found { request_id: u64, value: String },
    /// A lookup that never answers
    Lost { request_id: u64 },
}

#[derive(Debug, Clone, Default)]
struct LookupState {
    in_flight: usize,
    found: Vec<String>,
}

#[derive(Clone)]
struct LookupEnvironment {
    prefix: &'static str,
}

#[derive(Clone)]
struct LookupReducer;

impl Reducer for LookupReducer {
    type State = LookupState;
    type Action = LookupAction;
    type Environment = LookupEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            LookupAction::Lookup {
                request_id,
                key,
                delay_ms,
            } => {
                state.in_flight += 1;
                let value = format!("{}{key}", env.prefix);
                smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Some(LookupAction::Found { request_id, value })
                })]
            },
            LookupAction::LookupTwice { request_id, key } => smallvec![Effect::future(async move {
                Some(LookupAction::Lookup {
                    request_id,
                    key: format!("{key}{key}"),
                    delay_ms: 5,
                })
            })],
            LookupAction::Found { value, .. } => {
                state.in_flight -= 1;
                state.found.push(value);
                smallvec![Effect::None]
            },
            LookupAction::Lost { .. } => {
                smallvec![Effect::future(async { None })]
            },
        }
    }
}

fn store() -> Arc<Store<LookupState, LookupAction, LookupEnvironment, LookupReducer>> {
    Arc::new(Store::new(
        LookupState::default(),
        LookupReducer,
        LookupEnvironment { prefix: "value-" },
    ))
}

fn is_result_for(request_id: u64) -> impl Fn(&LookupAction) -> bool + Send + 'static {
    move |action| matches!(action, LookupAction::Found { request_id: id, .. } if *id == request_id)
}

// ============================================================================
// Tests
// ============================================================================

/// The result is reduced before the waiter wakes up
#[tokio::test]
async fn result_is_reduced_before_it_is_delivered() {
    let store = store();

    let result = store
        .send_and_wait_for(
            LookupAction::Lookup {
                request_id: 1,
                key: "a".into(),
                delay_ms: 5,
            },
            is_result_for(1),
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        LookupAction::Found {
            request_id: 1,
            value: "value-a".into()
        }
    );
    assert_eq!(store.state(|s| s.found.clone()).await, vec!["value-a"]);
    assert_eq!(store.state(|s| s.in_flight).await, 0);
}

/// A result produced by a chained effect still reaches the waiter
#[tokio::test]
async fn chained_effects_reach_the_waiter() {
    let store = store();

    let result = store
        .send_and_wait_for(
            LookupAction::LookupTwice {
                request_id: 7,
                key: "b".into(),
            },
            is_result_for(7),
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        LookupAction::Found {
            request_id: 7,
            value: "value-bb".into()
        }
    );
}

/// Concurrent waiters only see their own result
///
/// Later requests finish first, so every waiter observes results that are
/// not its own before its own arrives.
#[tokio::test]
async fn concurrent_waiters_receive_their_own_results() {
    let store = store();

    let mut handles = vec![];
    for request_id in 1..=5u64 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .send_and_wait_for(
                    LookupAction::Lookup {
                        request_id,
                        key: request_id.to_string(),
                        delay_ms: 60 - request_id * 10,
                    },
                    is_result_for(request_id),
                    Some(Duration::from_secs(2)),
                )
                .await
        }));
    }

    for (index, handle) in handles.into_iter().enumerate() {
        let request_id = index as u64 + 1;
        let result = handle.await.expect("task panicked").unwrap();
        assert_eq!(
            result,
            LookupAction::Found {
                request_id,
                value: format!("value-{request_id}")
            }
        );
    }

    assert_eq!(store.state(|s| s.found.len()).await, 5);
    assert_eq!(store.state(|s| s.in_flight).await, 0);
}

/// A command whose effect produces nothing times out
#[tokio::test]
async fn lost_result_times_out() {
    let store = store();

    let error = store
        .send_and_wait_for(
            LookupAction::Lost { request_id: 3 },
            is_result_for(3),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert_eq!(error, StoreError::Timeout);
}

/// Many overlapping requests each get their own result
#[tokio::test]
async fn forty_overlapping_requests_all_resolve() {
    let store = store();

    let results = join_all((1..=40u64).map(|request_id| {
        let store = Arc::clone(&store);
        async move {
            store
                .send_and_wait_for(
                    LookupAction::Lookup {
                        request_id,
                        key: request_id.to_string(),
                        delay_ms: 41 - request_id,
                    },
                    is_result_for(request_id),
                    None,
                )
                .await
        }
    }))
    .await;

    for (index, result) in results.into_iter().enumerate() {
        let request_id = index as u64 + 1;
        assert_eq!(
            result.unwrap(),
            LookupAction::Found {
                request_id,
                value: format!("value-{request_id}")
            }
        );
    }
    assert_eq!(store.state(|s| s.found.len()).await, 40);
}

/// Without a timeout the caller waits for a slow result
#[tokio::test]
async fn no_timeout_waits_for_the_real_outcome() {
    let store = store();

    let result = store
        .send_and_wait_for(
            LookupAction::Lookup {
                request_id: 9,
                key: "slow".into(),
                delay_ms: 150,
            },
            is_result_for(9),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        LookupAction::Found {
            request_id: 9,
            value: "value-slow".into()
        }
    );
}

/// A result that arrives after its caller timed out is still reduced
#[tokio::test]
async fn late_result_lands_after_timeout() {
    let store = store();

    let error = store
        .send_and_wait_for(
            LookupAction::Lookup {
                request_id: 4,
                key: "late".into(),
                delay_ms: 60,
            },
            is_result_for(4),
            Some(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();
    assert_eq!(error, StoreError::Timeout);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.state(|s| s.found.clone()).await, vec!["value-late"]);
}

/// Shutdown waits for running effects, then refuses new commands
#[tokio::test]
async fn shutdown_drains_running_effects() {
    let store = store();
    store
        .send(LookupAction::Lookup {
            request_id: 1,
            key: "slow".into(),
            delay_ms: 30,
        })
        .await
        .unwrap();
    assert_eq!(store.pending_effects(), 1);

    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert_eq!(store.pending_effects(), 0);
    let refused = store
        .send(LookupAction::Lookup {
            request_id: 2,
            key: "late".into(),
            delay_ms: 0,
        })
        .await;
    assert!(matches!(refused, Err(StoreError::ShutdownInProgress)));
}
