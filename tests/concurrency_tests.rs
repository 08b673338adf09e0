//! Concurrency properties of the admission critical section: the node never
//! oversubscribes its memory, and the ledger stays exact across a churn of
//! submissions and completions.

mod test_harness;

use std::sync::Arc;

use berth::config::{CoordinatorConfig, MemoryConfig};
use berth::error::CoordinationError;

use test_harness::{sample_metadata, sample_request, seeded_coordinator, TestCoordinator};

fn tight_config(max_system_memory: u64) -> CoordinatorConfig {
    CoordinatorConfig::new("/archives/root", "node-1.example.com").with_memory(MemoryConfig {
        default_job_memory: 1_024,
        max_job_memory: 4_096,
        max_system_memory,
    })
}

#[tokio::test]
async fn concurrent_submissions_over_capacity_admit_exactly_one() {
    // Two 1500 MB jobs against a 2048 MB node: exactly one may win.
    let harness = Arc::new(seeded_coordinator(tight_config(2_048)).await);

    let submit = |harness: Arc<TestCoordinator>, id: &'static str| async move {
        let request = sample_request("alice").with_id(id).with_memory(1_500);
        harness.coordinator.submit(&request, &sample_metadata()).await
    };

    let (first, second) = tokio::join!(
        submit(harness.clone(), "race-1"),
        submit(harness.clone(), "race-2")
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one submission may be admitted");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        loser.unwrap_err(),
        CoordinationError::ServerUnavailable(_)
    ));

    // Only the winner's memory is reserved.
    assert_eq!(harness.state.used_memory().await, 1_500);
}

#[tokio::test]
async fn concurrent_submissions_within_capacity_all_land() {
    let harness = Arc::new(seeded_coordinator(tight_config(8_192)).await);

    let mut handles = Vec::new();
    for n in 0..4 {
        let harness = harness.clone();
        handles.push(tokio::spawn(async move {
            let request = sample_request("alice")
                .with_id(format!("fits-{n}"))
                .with_memory(1_024);
            harness.coordinator.submit(&request, &sample_metadata()).await
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked").expect("admitted");
    }
    assert_eq!(harness.state.used_memory().await, 4 * 1_024);
}

#[tokio::test]
async fn ledger_never_exceeds_the_cap_under_churn() {
    // 4096 MB node, 1024 MB jobs: admit waves of submissions while earlier
    // jobs complete, checking the cap at every stable point.
    let max_system_memory = 4_096;
    let harness = seeded_coordinator(tight_config(max_system_memory)).await;

    let mut admitted: Vec<String> = Vec::new();
    for wave in 0..3 {
        for n in 0..6 {
            let request = sample_request("alice")
                .with_id(format!("churn-{wave}-{n}"))
                .with_memory(1_024);
            match harness.coordinator.submit(&request, &sample_metadata()).await {
                Ok(job_id) => admitted.push(job_id),
                Err(CoordinationError::ServerUnavailable(_)) => {}
                Err(other) => panic!("unexpected rejection: {other:?}"),
            }
            let used = harness.state.used_memory().await;
            assert!(used <= max_system_memory);
            assert_eq!(used, 1_024 * admitted.len() as u64);
        }

        // At most four fit; the rest were turned away.
        assert_eq!(admitted.len(), 4);

        // Two jobs finish, freeing room for the next wave.
        for job_id in admitted.drain(..2) {
            harness.state.done(&job_id).await.unwrap();
        }
        assert_eq!(
            harness.state.used_memory().await,
            1_024 * admitted.len() as u64
        );
    }
}
