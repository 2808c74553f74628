//! Timers through the patched registry on the manual host

use super::test_utils::{ambient, mark, patched};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zoned::adapters::{AnimationFrames, Timers};
use zoned::interception::BindMode;
use zoned::{zone, ZoneSpec};

#[test]
fn timeout_runs_in_the_scheduling_zone() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let seen = Arc::new(Mutex::new(None));

    let a = ambient("a");
    let s = seen.clone();
    a.run(|| {
        timers.set_timeout(
            move || {
                *s.lock().unwrap() = mark();
                Ok(())
            },
            Duration::from_millis(10),
        )?;
        Ok(())
    })
    .unwrap();

    // A sibling zone is active when the host fires the timer.
    let b = ambient("b");
    b.run(|| {
        p.host.advance(Duration::from_millis(10));
        assert_eq!(mark().as_deref(), Some("b"));
        Ok(())
    })
    .unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("a"));
}

#[test]
fn pending_count_tracks_the_timeout() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let zone = ambient("counted");

    zone.run(|| {
        timers.set_timeout(|| Ok(()), Duration::from_millis(5))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(zone.pending_tasks(), 1);

    p.host.run_until_idle();
    assert_eq!(zone.pending_tasks(), 0);
    assert!(zone.is_drained());
}

#[test]
fn clearing_a_timeout_settles_without_running() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let zone = ambient("cancelled");
    let ran = Arc::new(Mutex::new(false));

    let r = ran.clone();
    let handle = zone
        .run(|| {
            Ok(timers.set_timeout(
                move || {
                    *r.lock().unwrap() = true;
                    Ok(())
                },
                Duration::from_millis(5),
            )?)
        })
        .unwrap()
        .unwrap();
    timers.clear_timeout(handle).unwrap();

    assert_eq!(zone.pending_tasks(), 0);
    p.host.run_until_idle();
    assert!(!*ran.lock().unwrap());

    // Clearing again, or after the fact, changes nothing.
    timers.clear_timeout(handle).unwrap();
    assert_eq!(zone.pending_tasks(), 0);
}

#[test]
fn intervals_hold_one_pending_task_until_cleared() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let zone = ambient("ticker");
    let ticks = Arc::new(Mutex::new(0));

    let t = ticks.clone();
    let handle = zone
        .run(|| {
            Ok(timers.set_interval(
                move || {
                    *t.lock().unwrap() += 1;
                    Ok(())
                },
                Duration::from_millis(10),
            )?)
        })
        .unwrap()
        .unwrap();

    p.host.advance(Duration::from_millis(30));
    assert_eq!(*ticks.lock().unwrap(), 3);
    assert_eq!(zone.pending_tasks(), 1);

    timers.clear_interval(handle).unwrap();
    assert_eq!(zone.pending_tasks(), 0);
    p.host.advance(Duration::from_millis(30));
    assert_eq!(*ticks.lock().unwrap(), 3);
}

#[test]
fn interval_can_clear_itself() {
    let p = patched(BindMode::Capture);
    let timers = Arc::new(Timers::from_registry(&p.registry));
    let zone = ambient("self-clearing");
    let handle = Arc::new(Mutex::new(None));
    let ticks = Arc::new(Mutex::new(0));

    let (t, h, inner) = (ticks.clone(), handle.clone(), timers.clone());
    let id = zone
        .run(|| {
            Ok(timers.set_interval(
                move || {
                    *t.lock().unwrap() += 1;
                    if let Some(id) = *h.lock().unwrap() {
                        inner.clear_interval(id)?;
                    }
                    Ok(())
                },
                Duration::from_millis(10),
            )?)
        })
        .unwrap()
        .unwrap();
    *handle.lock().unwrap() = Some(id);

    p.host.advance(Duration::from_millis(100));
    assert_eq!(*ticks.lock().unwrap(), 1);
    assert_eq!(zone.pending_tasks(), 0);
    assert_eq!(p.host.scheduled(), 0);
}

#[test]
fn immediates_run_on_the_next_tick() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let zone = ambient("soon");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    zone.run(|| {
        timers.set_immediate(move || {
            s.lock().unwrap().push(mark());
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(p.host.tick(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![Some("soon".to_string())]);
    assert_eq!(zone.pending_tasks(), 0);
}

#[test]
fn animation_frames_use_the_first_available_variant() {
    let p = patched(BindMode::Capture);
    let frames = AnimationFrames::from_registry(&p.registry).unwrap();
    assert_eq!(frames.entry_point(), "requestAnimationFrame");

    let zone = ambient("frame");
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    zone.run(|| {
        frames.request(move || {
            *s.lock().unwrap() = mark();
            Ok(())
        });
        Ok(())
    })
    .unwrap();
    assert_eq!(zone.pending_tasks(), 1);

    p.host.advance(Duration::from_millis(16));
    assert_eq!(seen.lock().unwrap().as_deref(), Some("frame"));
    assert_eq!(zone.pending_tasks(), 0);
}

#[test]
fn failing_callbacks_still_settle_and_report_to_the_host() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let zone = ambient("failing");

    zone.run(|| {
        timers.set_timeout(|| anyhow::bail!("late failure"), Duration::ZERO)?;
        Ok(())
    })
    .unwrap();
    p.host.run_until_idle();

    assert_eq!(zone.pending_tasks(), 0);
    let uncaught = p.host.take_uncaught();
    assert_eq!(uncaught.len(), 1);
    assert!(format!("{:#}", uncaught[0]).contains("late failure"));
}

#[test]
fn panicking_callbacks_still_settle() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let zone = ambient("panicking");

    zone.run(|| {
        timers.set_timeout(|| -> anyhow::Result<()> { panic!("late panic") }, Duration::ZERO)?;
        Ok(())
    })
    .unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| p.host.run_until_idle()));
    assert!(outcome.is_err());
    assert_eq!(p.host.scheduled(), 0);
    assert_eq!(zone.pending_tasks(), 0);

    // Later work in the same zone still drains.
    zone.run(|| {
        timers.set_timeout(|| Ok(()), Duration::from_millis(1))?;
        Ok(())
    })
    .unwrap();
    p.host.run_until_idle();
    assert!(zone.is_drained());
}

#[test]
fn handled_callback_failures_are_not_reported() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    let errors = Arc::new(Mutex::new(0));
    let e = errors.clone();
    let zone = ambient("guarded").fork(ZoneSpec::new().on_error(move |_| *e.lock().unwrap() += 1));

    zone.run(|| {
        timers.set_timeout(|| anyhow::bail!("caught"), Duration::ZERO)?;
        Ok(())
    })
    .unwrap();
    p.host.run_until_idle();

    assert_eq!(*errors.lock().unwrap(), 1);
    assert!(p.host.take_uncaught().is_empty());
}

#[test]
fn fork_per_task_runs_callbacks_in_a_child() {
    let p = patched(BindMode::ForkPerTask);
    let timers = Timers::from_registry(&p.registry);
    let parent = ambient("parent");
    let seen = Arc::new(Mutex::new(None));

    let s = seen.clone();
    parent
        .run(|| {
            timers.set_timeout(
                move || {
                    *s.lock().unwrap() = Some(zone::current());
                    Ok(())
                },
                Duration::ZERO,
            )?;
            Ok(())
        })
        .unwrap();
    p.host.run_until_idle();

    let ran_in = seen.lock().unwrap().clone().unwrap();
    assert!(Arc::ptr_eq(ran_in.parent().unwrap(), &parent));
    assert_eq!(ran_in.property::<String>("mark").as_deref(), Some("parent"));
    // The registration is counted against the scheduling zone.
    assert_eq!(parent.pending_tasks(), 0);
}

#[test]
fn fork_per_task_creates_one_zone_per_scheduled_callback() {
    let p = patched(BindMode::ForkPerTask);
    let timers = Timers::from_registry(&p.registry);
    let created = Arc::new(Mutex::new(0));
    let c = created.clone();
    let zone = ambient("forking").fork(ZoneSpec::new().on_zone_created(move |_| *c.lock().unwrap() += 1));

    zone.run(|| {
        timers.set_timeout(|| Ok(()), Duration::from_millis(5))?;
        timers.set_timeout(|| Ok(()), Duration::from_millis(10))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(*created.lock().unwrap(), 2);
    assert_eq!(zone.pending_tasks(), 2);

    p.host.run_until_idle();
    assert_eq!(*created.lock().unwrap(), 2);
    assert!(zone.is_drained());
}

#[test]
fn outstanding_registrations_are_visible_on_the_wrapper() {
    let p = patched(BindMode::Capture);
    let timers = Timers::from_registry(&p.registry);
    timers.set_timeout(|| Ok(()), Duration::from_millis(50)).unwrap();
    timers.set_timeout(|| Ok(()), Duration::from_millis(60)).unwrap();

    let wrapper = p.registry.zoned_scheduler("setTimeout").unwrap();
    assert_eq!(wrapper.outstanding(), 2);
    p.host.advance(Duration::from_millis(55));
    assert_eq!(wrapper.outstanding(), 1);
}
