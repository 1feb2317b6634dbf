//! End-to-end races against scripted sources.
//!
//! Time is paused in most tests, so delays are exact and the order in which
//! sources answer is deterministic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cep_race::prelude::*;
use cep_race::source::ErrorKind;
use cep_race::{race, Address, Outcome, Policy, Query, Race, RaceError, Scope, Source, SourceError};
use futures_core::future::BoxFuture;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, Instant};

const TIMEOUT: Duration = Duration::from_millis(1000);

/// A source which answers with a fixed result after a fixed delay.
struct Scripted {
    name: &'static str,
    delay: Option<Duration>,
    result: Result<&'static str, &'static str>,
    honors_scope: bool,
    seen_scope: Mutex<Option<Scope>>,
    completed: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Scripted {
    fn ok(name: &'static str, millis: u64, identifier: &'static str) -> Self {
        Self::new(name, Some(Duration::from_millis(millis)), Ok(identifier))
    }

    fn err(name: &'static str, millis: u64, message: &'static str) -> Self {
        Self::new(name, Some(Duration::from_millis(millis)), Err(message))
    }

    /// Never answers.
    fn silent(name: &'static str) -> Self {
        Self::new(name, None, Err("unreachable"))
    }

    fn new(
        name: &'static str,
        delay: Option<Duration>,
        result: Result<&'static str, &'static str>,
    ) -> Self {
        Self {
            name,
            delay,
            result,
            honors_scope: true,
            seen_scope: Mutex::new(None),
            completed: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Does not look at its scope at all.
    fn stubborn(mut self) -> Self {
        self.honors_scope = false;
        self
    }

    fn seen_scope(&self) -> Option<Scope> {
        self.seen_scope.lock().unwrap().clone()
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Source for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch(
        &self,
        query: Query,
        scope: Scope,
    ) -> BoxFuture<'static, Result<Address, SourceError>> {
        *self.seen_scope.lock().unwrap() = Some(scope.clone());

        let name = self.name;
        let delay = self.delay;
        let result = self.result;
        let honors_scope = self.honors_scope;
        let completed = self.completed.clone();
        let flag = DropFlag(self.dropped.clone());

        let lookup = async move {
            let _flag = flag;
            match delay {
                Some(delay) => sleep(delay).await,
                None => futures_lite::future::pending().await,
            }
            completed.fetch_add(1, Ordering::SeqCst);
            match result {
                Ok(identifier) => Ok(Address {
                    identifier: identifier.to_owned(),
                    address_line: format!("lookup for {query}"),
                    source_name: name.to_owned(),
                    ..Address::default()
                }),
                Err(message) => Err(SourceError::new(name, ErrorKind::NotFound, message)),
            }
        };

        if honors_scope {
            Box::pin(async move {
                lookup
                    .until_cancelled(&scope)
                    .await
                    .map_err(|reason| SourceError::cancelled(name, reason))?
            })
        } else {
            Box::pin(lookup)
        }
    }
}

/// A source which panics after a delay.
struct Panicking(Duration);

impl Source for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn fetch(&self, _: Query, _: Scope) -> BoxFuture<'static, Result<Address, SourceError>> {
        Box::pin(explode(self.0))
    }
}

/// A source which panics while building its lookup, before any future exists.
struct PanicsOnFetch;

impl Source for PanicsOnFetch {
    fn name(&self) -> &str {
        "panics-on-fetch"
    }

    fn fetch(&self, _: Query, _: Scope) -> BoxFuture<'static, Result<Address, SourceError>> {
        panic!("provider misconfigured");
    }
}

async fn explode(delay: Duration) -> Result<Address, SourceError> {
    sleep(delay).await;
    panic!("provider exploded");
}

fn query() -> Query {
    Query::from("06341655")
}

fn sources<const N: usize>(sources: [&Arc<Scripted>; N]) -> Vec<Arc<dyn Source>> {
    sources
        .into_iter()
        .map(|source| source.clone() as Arc<dyn Source>)
        .collect()
}

/// Let spawned tasks observe cancellation and unwind.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn fastest_success_wins() {
    let a = Arc::new(Scripted::ok("A", 100, "06341655"));
    let b = Arc::new(Scripted::ok("B", 300, "06341655"));

    let outcome = race(&query(), sources([&a, &b]), TIMEOUT).await.unwrap();

    match outcome {
        Outcome::Success(address) => {
            assert_eq!(address.identifier, "06341655");
            assert_eq!(address.source_name, "A");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn first_failure_is_terminal_by_default() {
    let a = Arc::new(Scripted::err("A", 50, "not found"));
    let b = Arc::new(Scripted::ok("B", 80, "06341655"));

    let outcome = race(&query(), sources([&a, &b]), TIMEOUT).await.unwrap();

    match outcome {
        Outcome::Failure(err) => {
            assert_eq!(err.source_name(), "A");
            assert_eq!(err.message(), "not found");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn awaiting_all_prefers_a_later_success() {
    let a = Arc::new(Scripted::err("A", 50, "not found"));
    let b = Arc::new(Scripted::ok("B", 80, "06341655"));

    let outcome = Race::new(sources([&a, &b]), TIMEOUT)
        .policy(Policy::AwaitAllOrSuccess)
        .run(&query(), &Scope::new())
        .await
        .unwrap();

    assert_eq!(outcome.source_name(), Some("B"));
}

#[tokio::test(start_paused = true)]
async fn awaiting_all_reports_first_failure_when_all_fail() {
    let a = Arc::new(Scripted::err("A", 90, "bad gateway"));
    let b = Arc::new(Scripted::err("B", 40, "not found"));

    let start = Instant::now();
    let outcome = Race::new(sources([&a, &b]), TIMEOUT)
        .policy(Policy::AwaitAllOrSuccess)
        .run(&query(), &Scope::new())
        .await
        .unwrap();

    match outcome {
        Outcome::Failure(err) => assert_eq!(err.source_name(), "B"),
        other => panic!("expected failure, got {other:?}"),
    }
    // Decided by the last failure, not by the deadline.
    assert!(start.elapsed() >= Duration::from_millis(90));
    assert!(start.elapsed() < TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn slow_sources_time_out() {
    let a = Arc::new(Scripted::ok("A", 1200, "06341655"));
    let b = Arc::new(Scripted::ok("B", 1200, "06341655"));

    let start = Instant::now();
    let outcome = race(&query(), sources([&a, &b]), TIMEOUT).await.unwrap();

    assert_eq!(outcome, Outcome::TimedOut);
    assert!(start.elapsed() >= TIMEOUT);
    assert!(start.elapsed() < Duration::from_millis(1200));
}

#[tokio::test(start_paused = true)]
async fn success_just_before_deadline_is_not_a_timeout() {
    let a = Arc::new(Scripted::ok("A", 999, "06341655"));
    let b = Arc::new(Scripted::silent("B"));

    let outcome = race(&query(), sources([&a, &b]), TIMEOUT).await.unwrap();

    assert_eq!(outcome.source_name(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn zero_sources_is_invalid_input() {
    let res = race(&query(), Vec::<Arc<dyn Source>>::new(), TIMEOUT).await;

    let err = res.unwrap_err();
    assert_eq!(err, RaceError::NoSources);
    assert!(err.is_invalid_input());
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_spawns_nothing() {
    let a = Arc::new(Scripted::ok("A", 10, "06341655"));

    let res = race(&query(), sources([&a]), Duration::ZERO).await;

    assert_eq!(res.unwrap_err(), RaceError::InvalidTimeout);
    settle().await;
    assert!(a.seen_scope().is_none());
}

#[tokio::test(start_paused = true)]
async fn losers_observe_cancellation() {
    let a = Arc::new(Scripted::ok("A", 100, "06341655"));
    let b = Arc::new(Scripted::silent("B"));

    let outcome = race(&query(), sources([&a, &b]), TIMEOUT).await.unwrap();
    assert_eq!(outcome.source_name(), Some("A"));

    let scope = b.seen_scope().expect("B was started");
    assert!(scope.is_cancelled());
    assert!(scope.same_scope(&a.seen_scope().unwrap()));

    settle().await;
    assert!(b.dropped(), "B's lookup should have been dropped");
}

#[tokio::test(start_paused = true)]
async fn late_answers_are_discarded() {
    let a = Arc::new(Scripted::ok("A", 100, "06341655"));
    let b = Arc::new(Scripted::ok("B", 300, "99999999").stubborn());

    let outcome = race(&query(), sources([&a, &b]), TIMEOUT).await.unwrap();

    sleep(Duration::from_secs(2)).await;
    settle().await;

    match &outcome {
        Outcome::Success(address) => {
            assert_eq!(address.source_name, "A");
            assert_eq!(address.identifier, "06341655");
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(a.completed(), 1);
    assert_eq!(b.completed(), 0, "B should have been stopped, not finished");
    assert!(b.dropped());
}

#[tokio::test(start_paused = true)]
async fn parent_cancellation_aborts_the_race() {
    let a = Arc::new(Scripted::ok("A", 500, "06341655"));
    let parent = Scope::new();

    let remote = parent.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(200)).await;
        remote.cancel();
    });

    let res = Race::new(sources([&a]), TIMEOUT).run(&query(), &parent).await;

    assert_eq!(res, Err(RaceError::Aborted));
    settle().await;
    assert!(a.dropped());
    assert_eq!(a.completed(), 0);
}

#[tokio::test(start_paused = true)]
async fn parent_deadline_bounds_the_race() {
    let a = Arc::new(Scripted::ok("A", 500, "06341655"));
    let parent = Scope::new().with_timeout(Duration::from_millis(100));

    let start = Instant::now();
    let outcome = Race::new(sources([&a]), TIMEOUT)
        .run(&query(), &parent)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::TimedOut);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_race_stops_sources() {
    let a = Arc::new(Scripted::silent("A"));

    let resolve = Race::new(sources([&a]), TIMEOUT)
        .start(&query(), &Scope::new())
        .unwrap();
    let scope = resolve.scope().clone();
    settle().await;
    drop(resolve);

    assert!(scope.is_cancelled());
    settle().await;
    assert!(a.dropped());
}

#[tokio::test(start_paused = true)]
async fn panicking_source_is_a_failure() {
    let sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(Panicking(Duration::from_millis(10))),
        Arc::new(Scripted::ok("B", 50, "06341655")),
    ];

    let fail_fast = Race::new(sources.clone(), TIMEOUT)
        .run(&query(), &Scope::new())
        .await
        .unwrap();
    match fail_fast {
        Outcome::Failure(err) => {
            assert_eq!(err.source_name(), "panicking");
            assert_eq!(err.kind(), ErrorKind::Panicked);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let await_all = Race::new(sources, TIMEOUT)
        .policy(Policy::AwaitAllOrSuccess)
        .run(&query(), &Scope::new())
        .await
        .unwrap();
    assert_eq!(await_all.source_name(), Some("B"));
}

#[tokio::test(start_paused = true)]
async fn panic_while_building_the_lookup_is_a_failure() {
    let sources: Vec<Arc<dyn Source>> = vec![Arc::new(PanicsOnFetch)];

    let start = Instant::now();
    let outcome = race(&query(), sources, TIMEOUT).await.unwrap();

    match outcome {
        Outcome::Failure(err) => {
            assert_eq!(err.source_name(), "panics-on-fetch");
            assert_eq!(err.kind(), ErrorKind::Panicked);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(start.elapsed() < TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn huge_timeout_does_not_overflow() {
    let a = Arc::new(Scripted::ok("A", 10, "06341655"));

    let outcome = race(&query(), sources([&a]), Duration::MAX).await.unwrap();

    assert_eq!(outcome.source_name(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn sources_can_be_raced_repeatedly() {
    let a = Arc::new(Scripted::ok("A", 20, "06341655"));
    let b = Arc::new(Scripted::ok("B", 10, "06341655"));
    let race = Race::new(sources([&a, &b]), TIMEOUT);

    for _ in 0..3 {
        let outcome = race.run(&query(), &Scope::new()).await.unwrap();
        assert_eq!(outcome.source_name(), Some("B"));
    }
    assert_eq!(b.completed(), 3);
}

/// The outcome a race over scripted sources must produce.
fn expected(policy: Policy, script: &[(u64, bool)]) -> Option<(usize, bool)> {
    let timeout = TIMEOUT.as_millis() as u64;
    let mut answered: Vec<(u64, usize, bool)> = script
        .iter()
        .enumerate()
        .filter(|(_, (delay, _))| *delay < timeout)
        .map(|(index, (delay, ok))| (*delay, index, *ok))
        .collect();
    answered.sort();

    match policy {
        Policy::FailFast => answered.first().map(|(_, index, ok)| (*index, *ok)),
        Policy::AwaitAllOrSuccess => answered
            .iter()
            .find(|(_, _, ok)| *ok)
            .or_else(|| answered.first())
            .map(|(_, index, ok)| (*index, *ok)),
    }
}

#[tokio::test(start_paused = true)]
async fn exactly_one_outcome_under_random_latencies() {
    const NAMES: [&str; 4] = ["S0", "S1", "S2", "S3"];

    for seed in 0..64 {
        let mut rng = StdRng::seed_from_u64(seed);
        // Odd multiples of 50ms: distinct, and never equal to the timeout.
        let mut delays: Vec<u64> = (0..30).map(|n| 50 + n * 100).collect();
        delays.shuffle(&mut rng);
        let len = rng.gen_range(1..=NAMES.len());
        let script: Vec<(u64, bool)> = delays[..len]
            .iter()
            .map(|d| (*d, rng.gen_bool(0.5)))
            .collect();

        for policy in [Policy::FailFast, Policy::AwaitAllOrSuccess] {
            let scripted: Vec<Arc<Scripted>> = script
                .iter()
                .zip(NAMES)
                .map(|((delay, ok), name)| {
                    Arc::new(if *ok {
                        Scripted::ok(name, *delay, "06341655")
                    } else {
                        Scripted::err(name, *delay, "not found")
                    })
                })
                .collect();
            let sources: Vec<Arc<dyn Source>> = scripted
                .iter()
                .map(|source| source.clone() as Arc<dyn Source>)
                .collect();

            let outcome = Race::new(sources, TIMEOUT)
                .policy(policy)
                .run(&query(), &Scope::new())
                .await
                .unwrap();

            let context = format!("seed {seed}, {policy}, script {script:?}");
            match (expected(policy, &script), &outcome) {
                (None, Outcome::TimedOut) => {}
                (Some((index, true)), Outcome::Success(address)) => {
                    assert_eq!(address.source_name, NAMES[index], "{context}")
                }
                (Some((index, false)), Outcome::Failure(err)) => {
                    assert_eq!(err.source_name(), NAMES[index], "{context}")
                }
                (expected, outcome) => panic!("{context}: expected {expected:?}, got {outcome:?}"),
            }

            // Nothing keeps running once the race is over.
            sleep(Duration::from_secs(3)).await;
            settle().await;
            let finished: usize = scripted.iter().map(|source| source.completed()).sum();
            let answered_in_time = script.iter().filter(|(delay, _)| *delay < 1000).count();
            assert!(finished <= answered_in_time, "{context}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn races_in_parallel_on_a_threaded_runtime() {
    let a = Arc::new(Scripted::ok("A", 10, "06341655"));
    let b = Arc::new(Scripted::ok("B", 400, "06341655"));
    let c = Arc::new(Scripted::silent("C"));

    let start = std::time::Instant::now();
    let outcome = race(&query(), sources([&a, &b, &c]), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(outcome.source_name(), Some("A"));
    assert!(start.elapsed() < Duration::from_secs(5));

    let scope = c.seen_scope().unwrap();
    tokio::time::timeout(Duration::from_secs(1), scope.cancelled())
        .await
        .expect("C's scope is cancelled");
}
