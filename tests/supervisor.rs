use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use restartable::{
    Event, EventKind, FailureRecord, LifecycleError, LifecycleFn, RestartPolicy, Subscribe,
    Supervisor, SupervisorConfig, SupervisorState, TaskError,
};
use tokio::sync::{Notify, broadcast};

async fn bounded<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("operation did not complete in time")
}

async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    bounded(async {
        loop {
            let ev = rx.recv().await.expect("bus open");
            if ev.kind == kind {
                return ev;
            }
        }
    })
    .await
}

/// Step that fails on the given call numbers (1-based) and succeeds otherwise.
fn flaky_step(
    calls: &Arc<AtomicUsize>,
    failing: &'static [usize],
) -> impl Fn() -> std::future::Ready<Result<(), TaskError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        std::future::ready(if failing.contains(&n) {
            Err(TaskError::fail(format!("flake #{n}")))
        } else {
            Ok(())
        })
    }
}

#[tokio::test]
async fn start_then_stop_runs_setup_and_teardown_once() {
    let setups = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    let (s, t) = (Arc::clone(&setups), Arc::clone(&teardowns));
    let lc = LifecycleFn::new("idle", || async { Ok::<_, TaskError>(()) })
        .with_setup(move || {
            s.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TaskError>(()) }
        })
        .with_teardown(move || {
            t.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TaskError>(()) }
        })
        .arc();
    let sup = Supervisor::new(lc, RestartPolicy::Never);
    assert_eq!(sup.name(), "idle");
    assert_eq!(sup.state(), SupervisorState::Stopped);

    sup.start().await.unwrap();
    assert_eq!(setups.load(Ordering::SeqCst), 1);
    assert_eq!(bounded(sup.stop()).await, Ok(()));
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
}

#[tokio::test]
async fn declined_restart_leaves_supervisor_stopped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lc = LifecycleFn::new("once", flaky_step(&calls, &[1])).arc();
    let sup = Supervisor::new(lc, RestartPolicy::Never);
    let mut events = sup.bus().subscribe();

    sup.start().await.unwrap();
    let declined = next_of(&mut events, EventKind::RestartDeclined).await;
    assert_eq!(
        declined.reason.as_deref(),
        Some("step failed: execution failed: flake #1")
    );

    let mut state = sup.subscribe_state();
    bounded(state.wait_for(|s| *s == SupervisorState::Stopped))
        .await
        .unwrap();
    assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn always_policy_restarts_after_a_step_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let setups = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&setups);
    let lc = LifecycleFn::new("flaky", flaky_step(&calls, &[2]))
        .with_setup(move || {
            s.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TaskError>(()) }
        })
        .arc();
    let sup = Supervisor::new(lc, RestartPolicy::Always);
    let mut events = sup.bus().subscribe();

    sup.start().await.unwrap();
    let requested = next_of(&mut events, EventKind::RestartRequested).await;
    assert_eq!(requested.run, Some(1));
    let started = next_of(&mut events, EventKind::TaskStarted).await;
    assert_eq!(started.run, Some(2));

    let mut state = sup.subscribe_state();
    bounded(state.wait_for(|s| *s == SupervisorState::Running))
        .await
        .unwrap();
    assert_eq!(setups.load(Ordering::SeqCst), 2);
    assert_eq!(bounded(sup.stop()).await, Ok(()));
}

#[tokio::test]
async fn failed_restart_reports_every_error_to_the_policy() {
    let setups = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&setups);
    let seen: Arc<Mutex<Vec<FailureRecord>>> = Arc::default();
    let sink = Arc::clone(&seen);

    let lc = LifecycleFn::new("doomed", || async { Err::<(), _>(TaskError::fail("A")) })
        .with_setup(move || {
            let n = s.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Ok(())
                } else {
                    Err(TaskError::fail("C"))
                }
            }
        })
        .with_teardown(|| async { Err::<(), _>(TaskError::fail("B")) })
        .arc();
    let policy = RestartPolicy::custom(move |record: &FailureRecord| {
        sink.lock().unwrap().push(record.clone());
        true
    });
    let sup = Supervisor::new(lc, policy);
    let mut events = sup.bus().subscribe();

    sup.start().await.unwrap();
    let failed = next_of(&mut events, EventKind::RestartFailed).await;
    assert_eq!(
        failed.reason.as_deref(),
        Some(
            "step failed: execution failed: A and teardown failed: execution failed: B \
             and setup failed: execution failed: C"
        )
    );

    let mut state = sup.subscribe_state();
    bounded(state.wait_for(|s| *s == SupervisorState::Stopped))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].step, TaskError::fail("A"));
    assert_eq!(seen[0].teardown, Some(TaskError::fail("B")));
    assert_eq!(seen[0].setup, None);
    assert_eq!(seen[1].setup, Some(TaskError::fail("C")));
    assert_eq!(setups.load(Ordering::SeqCst), 2);
    assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
}

#[tokio::test]
async fn teardown_repeating_the_step_error_is_not_recorded_twice() {
    let seen: Arc<Mutex<Vec<FailureRecord>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let lc = LifecycleFn::new("echo", || async { Err::<(), _>(TaskError::fail("same")) })
        .with_teardown(|| async { Err::<(), _>(TaskError::fail("same")) })
        .arc();
    let policy = RestartPolicy::custom(move |record: &FailureRecord| {
        sink.lock().unwrap().push(record.clone());
        false
    });
    let sup = Supervisor::new(lc, policy);
    let mut events = sup.bus().subscribe();

    sup.start().await.unwrap();
    next_of(&mut events, EventKind::RestartDeclined).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_step_only());
}

#[tokio::test]
async fn stop_right_after_start_still_steps_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lc = LifecycleFn::new("brief", flaky_step(&calls, &[])).arc();
    let sup = Supervisor::new(lc, RestartPolicy::Never);

    sup.start().await.unwrap();
    assert_eq!(bounded(sup.stop()).await, Ok(()));
    assert!(calls.load(Ordering::SeqCst) >= 1, "step never ran");
}

#[tokio::test]
async fn panicking_step_goes_through_the_restart_policy() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let lc = LifecycleFn::new("panicky", move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n == 1 {
                panic!("kaboom");
            }
            Ok::<_, TaskError>(())
        }
    })
    .arc();
    let sup = Supervisor::new(lc, RestartPolicy::Always);
    let mut events = sup.bus().subscribe();

    sup.start().await.unwrap();
    let requested = next_of(&mut events, EventKind::RestartRequested).await;
    assert_eq!(
        requested.reason.as_deref(),
        Some("step failed: fatal error (no restart): step panicked: kaboom")
    );

    let mut state = sup.subscribe_state();
    bounded(state.wait_for(|s| *s == SupervisorState::Running))
        .await
        .unwrap();
    assert_eq!(bounded(sup.stop()).await, Ok(()));
}

#[tokio::test]
async fn step_failure_during_stop_is_not_restarted() {
    let release = Arc::new(Notify::new());
    let setups = Arc::new(AtomicUsize::new(0));
    let (gate, s) = (Arc::clone(&release), Arc::clone(&setups));
    let lc = LifecycleFn::new("late", move || {
        let gate = Arc::clone(&gate);
        async move {
            gate.notified().await;
            Err::<(), _>(TaskError::fail("late"))
        }
    })
    .with_setup(move || {
        s.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, TaskError>(()) }
    })
    .arc();
    let sup = Supervisor::new(lc, RestartPolicy::Always);
    let mut events = sup.bus().subscribe();
    sup.start().await.unwrap();

    // First poll takes the supervisor lock and cancels the run; the step is still blocked.
    let mut stop = std::pin::pin!(sup.stop());
    assert!(futures::poll!(stop.as_mut()).is_pending());

    // The step now fails while stop owns the run; the monitor queues on the lock.
    release.notify_one();
    assert_eq!(
        bounded(stop).await,
        Err(LifecycleError::Step(TaskError::fail("late")))
    );

    // Served after the monitor (the lock is FIFO), so the monitor has already given up.
    assert_eq!(
        bounded(sup.stop()).await,
        Err(LifecycleError::AlreadyStopped)
    );
    assert_eq!(sup.state(), SupervisorState::Stopped);
    assert_eq!(setups.load(Ordering::SeqCst), 1);
    while let Ok(ev) = events.try_recv() {
        assert_ne!(ev.kind, EventKind::RestartRequested);
        assert_ne!(ev.kind, EventKind::RestartDeclined);
    }
}

#[derive(Default)]
struct Collect {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, ev: &Event) {
        self.kinds.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test]
async fn builder_subscribers_receive_supervisor_events() {
    let collect = Arc::new(Collect::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let lc = LifecycleFn::new("watched", flaky_step(&calls, &[1])).arc();

    let cfg = SupervisorConfig {
        bus_capacity: 0,
        restart: RestartPolicy::Never,
    };
    assert_eq!(cfg.bus_capacity_clamped(), 1);

    let sup = Supervisor::builder(lc)
        .with_config(SupervisorConfig {
            bus_capacity: 64,
            ..cfg
        })
        .with_subscribers(vec![collect.clone() as Arc<dyn Subscribe>])
        .build();

    sup.start().await.unwrap();
    bounded(async {
        while !collect
            .kinds
            .lock()
            .unwrap()
            .contains(&EventKind::RestartDeclined)
        {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;

    let kinds = collect.kinds.lock().unwrap().clone();
    assert_eq!(kinds.first(), Some(&EventKind::TaskStarting));
    assert!(kinds.contains(&EventKind::StepFailed));
    assert!(kinds.contains(&EventKind::TaskStopped));
}
