//! Observers, element definitions and sockets

use super::test_utils::{ambient, mark};
use std::sync::{Arc, Mutex};
use zoned::adapters::{
    ElementRegistry, LifecycleCallbacks, LifecycleEvent, ZonedElementRegistry, ZonedObserver,
    ZonedSocket,
};
use zoned::host::{ManualElementRegistry, ManualEventTarget, ManualObserverFactory};
use zoned::interception::{EventTarget, Listener};

#[test]
fn observer_callbacks_run_in_the_creation_zone() {
    let factory = ManualObserverFactory::<String>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let zone = ambient("observer");

    let s = seen.clone();
    let callback: Listener<Vec<String>> = Arc::new(move |records: &Vec<String>| {
        s.lock().unwrap().push((records.clone(), mark()));
        Ok(())
    });
    let mut observer = zone
        .run(|| Ok(ZonedObserver::new(&factory, callback)))
        .unwrap()
        .unwrap();
    assert_eq!(zone.pending_tasks(), 0);

    observer.observe("#list");
    observer.observe("#list");
    assert!(observer.is_observing());
    assert_eq!(zone.pending_tasks(), 1);
    assert!(Arc::ptr_eq(observer.creation_zone(), &zone));

    ambient("mutator")
        .run(|| Ok(factory.notify("#list", vec!["childList".to_string()])?))
        .unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(vec!["childList".to_string()], Some("observer".to_string()))]
    );

    observer.disconnect();
    assert_eq!(zone.pending_tasks(), 0);
    assert_eq!(factory.notify("#list", vec!["late".to_string()]).unwrap(), 0);
}

#[test]
fn dropping_an_observer_settles_its_registration() {
    let factory = ManualObserverFactory::<u8>::new();
    let zone = ambient("dropped");
    let callback: Listener<Vec<u8>> = Arc::new(|_: &Vec<u8>| Ok(()));

    zone.run(|| {
        let mut observer = ZonedObserver::new(&factory, callback);
        observer.observe("body");
        Ok(())
    })
    .unwrap();
    assert_eq!(zone.pending_tasks(), 0);
}

#[test]
fn element_callbacks_are_bound_at_definition() {
    let host = Arc::new(ManualElementRegistry::new());
    let registry = ZonedElementRegistry::new(host.clone() as Arc<dyn ElementRegistry>);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    let attached: Listener<LifecycleEvent> = Arc::new(move |event: &LifecycleEvent| {
        s.lock().unwrap().push((event.clone(), mark()));
        Ok(())
    });
    ambient("definer")
        .run(|| {
            registry.define(
                "x-card",
                LifecycleCallbacks {
                    attached: Some(attached),
                    ..LifecycleCallbacks::default()
                },
            )
        })
        .unwrap();

    let event = LifecycleEvent::Attached {
        element: "x-card".to_string(),
    };
    assert!(ambient("dom").run(|| host.fire("x-card", event.clone())).unwrap().unwrap());
    assert!(!host
        .fire(
            "x-card",
            LifecycleEvent::Created {
                element: "x-card".to_string()
            }
        )
        .unwrap());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(event, Some("definer".to_string()))]
    );
}

#[test]
fn host_rejections_pass_through_unchanged() {
    let host = Arc::new(ManualElementRegistry::new());
    let registry = ZonedElementRegistry::new(host.clone() as Arc<dyn ElementRegistry>);

    let err = registry
        .define("nohyphen", LifecycleCallbacks::default())
        .unwrap_err();
    assert!(err.to_string().contains("not a valid custom element name"));

    registry.define("x-one", LifecycleCallbacks::default()).unwrap();
    let err = registry
        .define("x-one", LifecycleCallbacks::default())
        .unwrap_err();
    assert!(err.to_string().contains("already been defined"));
}

#[test]
fn socket_handlers_and_listeners_both_propagate() {
    let host = Arc::new(ManualEventTarget::<String>::new());
    let socket = ZonedSocket::new(host.clone() as Arc<dyn EventTarget<String>>);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (s1, s2) = (seen.clone(), seen.clone());
    let handler: Listener<String> = Arc::new(move |msg: &String| {
        s1.lock().unwrap().push(format!("handler:{}:{}", msg, mark().unwrap_or_default()));
        Ok(())
    });
    let listener: Listener<String> = Arc::new(move |msg: &String| {
        s2.lock().unwrap().push(format!("listener:{}:{}", msg, mark().unwrap_or_default()));
        Ok(())
    });

    let zone = ambient("socket");
    zone.run(|| {
        socket.set_handler("onmessage", Some(handler.clone()))?;
        socket.events().add_listener("message", listener.clone(), false);
        Ok(())
    })
    .unwrap();
    assert_eq!(zone.pending_tasks(), 2);
    assert!(Arc::ptr_eq(&socket.handler("onmessage").unwrap(), &handler));

    let msg = "ping".to_string();
    ambient("network")
        .run(|| {
            socket.deliver("message", &msg)?;
            host.dispatch("message", &msg);
            Ok(())
        })
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["handler:ping:socket", "listener:ping:socket"]
    );

    socket.events().remove_listener("message", &listener, false);
    socket.set_handler("onmessage", None).unwrap();
    assert_eq!(zone.pending_tasks(), 0);
}
