//! Zones across a multi-threaded Tokio runtime

use super::test_utils::{ambient, mark};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zoned::adapters::{HostRegistry, InterceptionTable, Timers};
use zoned::host::TokioScheduler;
use zoned::interception::BindMode;

fn tokio_registry() -> HostRegistry {
    let runtime = tokio::runtime::Handle::current();
    let mut registry = HostRegistry::new();
    registry
        .provide_scheduler("setTimeout", Arc::new(TokioScheduler::timeout(runtime.clone())))
        .provide_scheduler("setInterval", Arc::new(TokioScheduler::interval(runtime)));
    registry
        .apply(&InterceptionTable::browser(), BindMode::Capture)
        .unwrap();
    registry
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeouts_on_worker_threads_keep_their_zone() {
    let timers = Timers::from_registry(&tokio_registry());
    let zone = ambient("tokio");
    let seen = Arc::new(Mutex::new(Vec::new()));

    zone.run(|| {
        for delay in [5, 1, 3] {
            let s = seen.clone();
            timers.set_timeout(
                move || {
                    s.lock().unwrap().push(mark());
                    Ok(())
                },
                Duration::from_millis(delay),
            )?;
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(zone.pending_tasks(), 3);

    tokio::time::timeout(Duration::from_secs(5), zone.drained())
        .await
        .expect("zone drains");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("tokio".to_string()); 3]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cleared_interval_drains_the_zone() {
    let timers = Timers::from_registry(&tokio_registry());
    let zone = ambient("interval");
    let ticks = Arc::new(Mutex::new(0u32));

    let t = ticks.clone();
    let handle = zone
        .run(|| {
            Ok(timers.set_interval(
                move || {
                    *t.lock().unwrap() += 1;
                    Ok(())
                },
                Duration::from_millis(2),
            )?)
        })
        .unwrap()
        .unwrap();

    while *ticks.lock().unwrap() < 2 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(zone.pending_tasks(), 1);

    timers.clear_interval(handle).unwrap();
    tokio::time::timeout(Duration::from_secs(5), zone.drained())
        .await
        .expect("zone drains");
}
