//! Integration tests for the scheduled waitlist bump pass.
//!
//! The bump run re-evaluates waitlists against pools that are activated or
//! inside the pre-activation window, walks each waitlist in priority order,
//! and skips ineligible registrations without letting them block the line.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use eventpool::builders::EngineBuilder;
use eventpool::config::EngineConfig;
use eventpool::core::{AdmissionEngine, Event, EventId, GroupId, Penalty, Pool, PoolId, UserId};
use eventpool::infra::{InMemoryEligibility, RecordingGateway};
use eventpool::util::clock::{ManualClock, SharedClock};

const MEMBERS: GroupId = 7;

type TestEngine = AdmissionEngine<InMemoryEligibility, RecordingGateway>;

fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

fn engine(clock: &Arc<ManualClock>) -> TestEngine {
    eventpool::util::init_tracing();
    let config = EngineConfig::default();
    let eligibility = InMemoryEligibility::new(config.penalty_validity());
    EngineBuilder::new()
        .with_config(config)
        .with_clock(Arc::clone(clock) as SharedClock)
        .build(eligibility, RecordingGateway::new())
        .unwrap()
}

fn event(id: EventId, now: DateTime<Utc>) -> Event {
    Event {
        id,
        title: format!("event-{id}"),
        start_time: now + Duration::days(730),
        merge_time: now + Duration::days(729),
        heed_penalties: true,
        price: None,
    }
}

fn pool(id: PoolId, capacity: u32, activation_date: DateTime<Utc>) -> Pool {
    Pool {
        id,
        name: format!("pool-{id}"),
        capacity,
        activation_date,
        permission_groups: HashSet::from([MEMBERS]),
        registration_count: 0,
    }
}

fn enroll(engine: &TestEngine, users: &[UserId]) {
    for &user in users {
        engine.eligibility().add_member(user, MEMBERS);
    }
}

fn bumped_users(report: &eventpool::core::BumpReport) -> Vec<UserId> {
    report.admissions.iter().map(|b| b.user_id).collect()
}

#[tokio::test]
async fn pool_opening_in_twenty_minutes_accepts_bumps() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    enroll(&engine, &[10]);
    engine
        .create_event(event(1, now), vec![pool(1, 2, now + Duration::minutes(20))])
        .unwrap();

    // Direct registration sees an unactivated pool and waitlists.
    let outcome = engine.attempt_registration(1, 10).await.unwrap();
    assert!(!outcome.admitted);

    let report = engine.run_waitlist_bump().await;
    assert_eq!(bumped_users(&report), vec![10]);
}

#[tokio::test]
async fn pool_opening_in_forty_minutes_is_out_of_reach() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    enroll(&engine, &[10]);
    engine
        .create_event(event(1, now), vec![pool(1, 2, now + Duration::minutes(40))])
        .unwrap();

    engine.attempt_registration(1, 10).await.unwrap();
    let report = engine.run_waitlist_bump().await;
    assert!(report.admissions.is_empty());

    // Twenty-one minutes later the pool is inside the window.
    clock.advance(Duration::minutes(21));
    let report = engine.run_waitlist_bump().await;
    assert_eq!(bumped_users(&report), vec![10]);
}

#[tokio::test]
async fn ineligible_user_is_skipped_without_blocking_the_line() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    // 10 never joins the group; 20 queued behind them does.
    enroll(&engine, &[20]);
    engine
        .create_event(event(1, now), vec![pool(1, 1, now + Duration::minutes(20))])
        .unwrap();

    engine.attempt_registration(1, 10).await.unwrap();
    engine.attempt_registration(1, 20).await.unwrap();

    let report = engine.run_waitlist_bump().await;
    assert_eq!(bumped_users(&report), vec![20]);

    let state = engine.event_snapshot(1).unwrap();
    assert!(state.registration_of(10).unwrap().is_waiting());
}

#[tokio::test]
async fn penalized_user_is_not_bumped() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    enroll(&engine, &[10]);
    engine
        .create_event(event(1, now), vec![pool(1, 1, now + Duration::minutes(20))])
        .unwrap();
    engine.eligibility().add_penalty(Penalty {
        user_id: 10,
        weight: 3,
        created_at: now - Duration::days(30),
        source_event: 99,
        reason: "no-show".into(),
    });

    engine.attempt_registration(1, 10).await.unwrap();
    let report = engine.run_waitlist_bump().await;
    assert!(report.admissions.is_empty());
}

#[tokio::test]
async fn bump_run_is_capacity_bounded_and_idempotent() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    enroll(&engine, &[10, 20, 30]);
    engine
        .create_event(event(1, now), vec![pool(1, 2, now + Duration::minutes(20))])
        .unwrap();

    engine.attempt_registration(1, 10).await.unwrap();
    engine.attempt_registration(1, 20).await.unwrap();
    engine.attempt_registration(1, 30).await.unwrap();

    let report = engine.run_waitlist_bump().await;
    assert_eq!(bumped_users(&report), vec![10, 20]);

    let again = engine.run_waitlist_bump().await;
    assert!(again.admissions.is_empty());

    let state = engine.event_snapshot(1).unwrap();
    assert_eq!(state.pool(1).unwrap().registration_count, 2);
    assert_eq!(state.waiting_count(), 1);
}

#[tokio::test]
async fn merge_time_opens_pools_to_everyone() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    // 10 holds no group membership at all.
    let mut merged_event = event(1, now);
    merged_event.merge_time = now + Duration::hours(1);
    engine
        .create_event(merged_event, vec![pool(1, 2, now - Duration::hours(1))])
        .unwrap();

    let outcome = engine.attempt_registration(1, 10).await.unwrap();
    assert!(!outcome.admitted);

    clock.advance(Duration::hours(2));
    let report = engine.run_waitlist_bump().await;
    assert_eq!(bumped_users(&report), vec![10]);
}

#[tokio::test]
async fn earliest_activated_pool_wins_for_each_bump() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    enroll(&engine, &[10, 20]);
    engine
        .create_event(
            event(1, now),
            vec![
                pool(1, 1, now + Duration::minutes(30)),
                pool(2, 1, now + Duration::minutes(10)),
            ],
        )
        .unwrap();

    engine.attempt_registration(1, 10).await.unwrap();
    engine.attempt_registration(1, 20).await.unwrap();

    let report = engine.run_waitlist_bump().await;
    assert_eq!(bumped_users(&report), vec![10, 20]);
    assert_eq!(report.admissions[0].pool_id, 2);
    assert_eq!(report.admissions[1].pool_id, 1);
}

#[tokio::test]
async fn started_events_are_left_alone() {
    let now = start_instant();
    let clock = Arc::new(ManualClock::new(now));
    let engine = engine(&clock);
    enroll(&engine, &[10, 20]);
    let mut soon = event(1, now);
    soon.start_time = now + Duration::hours(1);
    soon.merge_time = now + Duration::minutes(30);
    engine
        .create_event(soon, vec![pool(1, 1, now - Duration::hours(1))])
        .unwrap();

    engine.attempt_registration(1, 10).await.unwrap();
    engine.attempt_registration(1, 20).await.unwrap();
    engine.set_pool_capacity(1, 1, 2).unwrap();

    clock.advance(Duration::hours(2));
    let report = engine.run_waitlist_bump().await;
    assert!(report.admissions.is_empty());
}
