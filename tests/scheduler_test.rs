//! Integration test for the scheduled correction loops.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use eventpool::builders::EngineBuilder;
use eventpool::config::EngineConfig;
use eventpool::core::{Event, GroupId, Pool};
use eventpool::infra::{InMemoryEligibility, RecordingGateway};
use eventpool::runtime::{Scheduler, TokioSpawner};
use eventpool::util::clock::{ManualClock, SharedClock};

const MEMBERS: GroupId = 7;

fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn scheduled_passes_bump_waitlisted_users() {
    eventpool::util::init_tracing();
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));

    let config = EngineConfig {
        bump_interval_secs: 1,
        consistency_interval_secs: 1,
        ..EngineConfig::default()
    };
    let eligibility = InMemoryEligibility::new(config.penalty_validity());
    let engine = Arc::new(
        EngineBuilder::new()
            .with_config(config)
            .with_clock(Arc::clone(&clock) as SharedClock)
            .build(eligibility, RecordingGateway::new())
            .unwrap(),
    );

    engine.eligibility().add_member(10, MEMBERS);
    engine
        .create_event(
            Event {
                id: 1,
                title: "launch night".into(),
                start_time: now + Duration::days(730),
                merge_time: now + Duration::days(729),
                heed_penalties: true,
                price: None,
            },
            vec![Pool {
                id: 1,
                name: "members".into(),
                capacity: 2,
                // Inside the bump window, so only a correction pass admits.
                activation_date: now + Duration::minutes(20),
                permission_groups: HashSet::from([MEMBERS]),
                registration_count: 0,
            }],
        )
        .unwrap();

    let outcome = engine.attempt_registration(1, 10).await.unwrap();
    assert!(!outcome.admitted);

    let handle = Scheduler::start(Arc::clone(&engine), &TokioSpawner::current());

    // Give the loops a couple of ticks.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let state = engine.event_snapshot(1).unwrap();
        if state.registration_of(10).unwrap().is_admitted() {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "waitlisted user was never bumped by the scheduled pass"
        );
    }

    handle.shutdown();
}
