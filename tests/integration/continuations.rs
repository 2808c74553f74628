//! Continuation chains: every link re-enters the zone that attached it

use super::test_utils::{ambient, mark};
use std::sync::{Arc, Mutex};
use zoned::continuation::{bind_promise_fn, ZoneFutureExt, ZonedThenable};
use zoned::host::{ManualHost, ManualPromise};
use zoned::{zone, ZoneError, ZoneSpec};

type Trail = Arc<Mutex<Vec<(i32, Option<String>)>>>;

fn step(trail: &Trail, add: i32) -> impl FnOnce(i32) -> anyhow::Result<i32> + Send + 'static {
    let trail = trail.clone();
    move |value| {
        trail.lock().unwrap().push((value, mark()));
        Ok(value + add)
    }
}

#[test]
fn each_link_runs_where_it_was_attached() {
    let host = ManualHost::new();
    let trail: Trail = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (ambient("a"), ambient("b"));

    let (promise, resolver) = ManualPromise::<i32>::pending(&host);
    let mut promise = Some(promise);
    let mut start = a
        .run(|| {
            Ok(bind_promise_fn(move |_: ()| {
                promise
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("promise already handed out"))
            }))
        })
        .unwrap()
        .unwrap();
    let chain = start(()).unwrap();

    let chain = a.run(|| Ok(chain.then(step(&trail, 1)))).unwrap().unwrap();
    let chain = b.run(|| Ok(chain.then(step(&trail, 10)))).unwrap().unwrap();

    // Settles from yet another zone.
    ambient("settler")
        .run(|| {
            resolver.resolve(1);
            Ok(())
        })
        .unwrap();
    host.run_until_idle();

    assert_eq!(
        *trail.lock().unwrap(),
        vec![(1, Some("a".to_string())), (2, Some("b".to_string()))]
    );
    assert_eq!(chain.into_inner().take_result().unwrap().unwrap(), 12);
}

#[test]
fn rejections_skip_to_the_next_handler_in_its_zone() {
    let host = ManualHost::new();
    let trail: Trail = Arc::new(Mutex::new(Vec::new()));
    let recovered_in = Arc::new(Mutex::new(None));

    let chain = ZonedThenable::new(ManualPromise::<i32>::rejected(&host, anyhow::anyhow!("offline")));
    let chain = ambient("skipped").run(|| Ok(chain.then(step(&trail, 1)))).unwrap().unwrap();

    let r = recovered_in.clone();
    let chain = ambient("recovery")
        .run(|| {
            Ok(chain.then_or_else(
                Ok,
                Some(move |err: anyhow::Error| {
                    *r.lock().unwrap() = Some((err.to_string(), mark()));
                    Ok(-1)
                }),
            ))
        })
        .unwrap()
        .unwrap();
    host.run_until_idle();

    assert!(trail.lock().unwrap().is_empty());
    assert_eq!(
        *recovered_in.lock().unwrap(),
        Some(("offline".to_string(), Some("recovery".to_string())))
    );
    assert_eq!(chain.into_inner().take_result().unwrap().unwrap(), -1);
}

#[test]
fn failures_swallowed_by_on_error_reject_the_next_link() {
    let host = ManualHost::new();
    let handled = Arc::new(Mutex::new(0));
    let h = handled.clone();
    let guarded = ambient("guarded").fork(ZoneSpec::new().on_error(move |_| *h.lock().unwrap() += 1));

    let chain = ZonedThenable::new(ManualPromise::resolved(&host, 5));
    let chain = guarded
        .run(|| Ok(chain.then(|_| anyhow::bail!("bad link"))))
        .unwrap()
        .unwrap();
    host.run_until_idle();

    assert_eq!(*handled.lock().unwrap(), 1);
    let err = chain.into_inner().take_result().unwrap().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ZoneError>(),
        Some(ZoneError::Handled { zone }) if *zone == guarded.id()
    ));
}

#[test]
fn bound_promise_function_runs_in_its_zone() {
    let host = ManualHost::new();
    let zone = ambient("factory");
    let h = host.clone();
    let mut make = zone.bind_promise_fn(move |n: i32| {
        assert_eq!(mark().as_deref(), Some("factory"));
        Ok(ManualPromise::resolved(&h, n))
    });

    let chain = ambient("caller").run(|| Ok(make(7)?)).unwrap().unwrap();
    let chain = chain.then(|v| Ok(v * 3));
    host.run_until_idle();
    assert_eq!(chain.into_inner().take_result().unwrap().unwrap(), 21);
}

#[tokio::test]
async fn futures_re_enter_their_zone_on_every_poll() {
    let zone = ambient("future");
    let outside = zone::current();

    let observed = async {
        let first = mark();
        tokio::task::yield_now().await;
        let second = mark();
        (first, second)
    }
    .in_zone(zone.clone())
    .await
    .unwrap();

    assert_eq!(observed.0.as_deref(), Some("future"));
    assert_eq!(observed.1.as_deref(), Some("future"));
    assert!(std::sync::Arc::ptr_eq(&zone::current(), &outside));
}

#[tokio::test]
async fn in_current_zone_captures_at_construction() {
    let zone = ambient("captured");
    let fut = zone
        .run(|| Ok(async { mark() }.in_current_zone()))
        .unwrap()
        .unwrap();
    let seen = fut.await.unwrap();
    assert_eq!(seen.as_deref(), Some("captured"));
}

#[test]
fn futures_can_be_driven_without_a_runtime() {
    let zone = ambient("executor");
    let seen = futures::executor::block_on(async { mark() }.in_zone(zone)).unwrap();
    assert_eq!(seen.as_deref(), Some("executor"));
}
