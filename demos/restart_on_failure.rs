//! # Example: restart_on_failure
//!
//! A periodic "pinger" that flakes every few ticks and is restarted by the
//! supervisor, with every lifecycle event printed by [`LogWriter`].
//!
//! Shows how to:
//! - Build a lifecycle from closures with [`LifecycleFn`].
//! - Pick a [`RestartPolicy`] from the [`FailureRecord`] of each failure.
//! - Attach subscribers through [`Supervisor::builder`].
//!
//! ## Flow
//! ```text
//! start()
//!   ├─► setup()            "connected"
//!   ├─► step() ... step()  "ping"
//!   ├─► step() → Err("timeout")
//!   │     └─► teardown() → policy(record) → true → setup() → step() ...
//!   ├─► step() → Err(fatal "auth revoked")
//!   │     └─► teardown() → policy(record) → false → Stopped
//!   └─► stop() → AlreadyStopped
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example restart_on_failure --features logging
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use restartable::{
    FailureRecord, LifecycleError, LifecycleFn, LogWriter, RestartPolicy, Subscribe, Supervisor,
    SupervisorState, TaskError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let ticks = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&ticks);

    // 1. A pinger that times out every 4th tick and loses its credentials on tick 10.
    let pinger = LifecycleFn::new("pinger", move || {
        let tick = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            match tick {
                10 => Err(TaskError::fatal("auth revoked")),
                t if t % 4 == 0 => Err(TaskError::fail("timeout")),
                t => {
                    println!("[pinger] ping #{t}");
                    Ok(())
                }
            }
        }
    })
    .with_setup(|| async {
        println!("[pinger] connected");
        Ok::<_, TaskError>(())
    })
    .with_teardown(|| async {
        println!("[pinger] disconnected");
        Ok::<_, TaskError>(())
    })
    .arc();

    // 2. Same as RestartPolicy::OnStepFailure, spelled out.
    let policy = RestartPolicy::custom(|record: &FailureRecord| {
        record.is_step_only() && record.step.is_retryable()
    });

    // 3. Supervisor with the built-in LogWriter.
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(pinger)
        .with_policy(policy)
        .with_subscribers(subs)
        .build();

    // 4. Run until the policy gives up.
    sup.start().await?;
    let mut state = sup.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            state.changed().await?;
            if *state.borrow_and_update() == SupervisorState::Stopped {
                return Ok::<_, anyhow::Error>(());
            }
        }
    })
    .await??;

    // 5. The run was already torn down by the supervisor.
    match sup.stop().await {
        Err(LifecycleError::AlreadyStopped) => println!("[main] pinger stopped by policy"),
        other => println!("[main] unexpected stop result: {other:?}"),
    }
    println!("[main] ticks: {}", ticks.load(Ordering::SeqCst));

    // Give the LogWriter a moment to drain.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
