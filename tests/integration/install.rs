//! One-call installation from configuration

use super::test_utils::{ambient, mark};
use serde_json::json;
use std::sync::{Arc, Mutex};
use zoned::adapters::HostRegistry;
use zoned::host::{ManualDialogs, ManualEventTarget, ManualHost};
use zoned::interception::{BindMode, EventTarget, Listener};
use zoned::{install, ConfigLoader, EngineError, Zone};

#[test]
fn install_seeds_the_root_and_patches_the_host() {
    let config = ConfigLoader::from_toml_str(
        r#"
        [engine]
        bind_mode = "fork_per_task"

        [engine.root_properties]
        install_test_app = "zoned-demo"

        [interception]
        disabled = ["prompt"]
        "#,
    )
    .unwrap();

    let host = ManualHost::new();
    let mut registry = HostRegistry::new();
    host.provide_to(&mut registry, Some(Arc::new(ManualDialogs::new())));

    let report = install(&config, &mut registry).unwrap();

    assert!(report.patched.contains(&"setTimeout".to_string()));
    assert!(report.patched.contains(&"alert".to_string()));
    assert!(!report.patched.contains(&"prompt".to_string()));
    assert!(report.skipped.contains(&"mozRequestAnimationFrame".to_string()));
    assert_eq!(registry.bind_mode(), BindMode::ForkPerTask);
    assert_eq!(Zone::root().get("install_test_app"), Some(json!("zoned-demo")));

    // Forks taken after installation inherit the seeded property.
    let child = ambient("after-install");
    assert_eq!(child.property::<String>("install_test_app").as_deref(), Some("zoned-demo"));
}

#[test]
fn install_refuses_an_applied_registry() {
    let mut registry = HostRegistry::new();
    install(&Default::default(), &mut registry).unwrap();
    assert!(matches!(
        install(&Default::default(), &mut registry),
        Err(EngineError::AlreadyApplied)
    ));
}

#[test]
fn invalid_configuration_changes_nothing() {
    let mut config = zoned::ZonedConfig::default();
    config.interception.disabled.push("setTimeoutt".to_string());
    config
        .engine
        .root_properties
        .insert("install_rejected".to_string(), json!(1));

    let mut registry = HostRegistry::new();
    let err = install(&config, &mut registry).unwrap_err();

    assert!(err.to_string().contains("setTimeoutt"));
    assert!(!registry.is_applied());
    assert_eq!(Zone::root().get("install_rejected"), None);
}

#[test]
fn disabled_per_instance_entries_leave_callbacks_unbound() {
    let config = ConfigLoader::from_toml_str(
        r#"
        [interception]
        disabled = ["WebSocket"]
        "#,
    )
    .unwrap();
    let mut registry = HostRegistry::new();
    let report = install(&config, &mut registry).unwrap();
    assert!(!report.per_instance.contains(&"WebSocket".to_string()));
    assert!(report.per_instance.contains(&"EventTarget".to_string()));

    let host = Arc::new(ManualEventTarget::<String>::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let record: Listener<String> = Arc::new(move |_: &String| {
        s.lock().unwrap().push(mark());
        Ok(())
    });

    let zone = ambient("registering");
    let (socket, events) = zone
        .run(|| {
            let socket = registry.socket(host.clone() as Arc<dyn EventTarget<String>>);
            socket.set_handler("onmessage", Some(record.clone()))?;
            let events = registry.event_target(host.clone() as Arc<dyn EventTarget<String>>);
            events.add_listener("message", record.clone(), false);
            Ok((socket, events))
        })
        .unwrap()
        .unwrap();
    // Only the event-target listener is counted.
    assert_eq!(zone.pending_tasks(), 1);

    ambient("delivering")
        .run(|| {
            socket.deliver("message", &"hi".to_string())?;
            host.dispatch("message", &"hi".to_string());
            Ok(())
        })
        .unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("delivering".to_string()), Some("registering".to_string())]
    );

    events.remove_listener("message", &record, false);
    assert!(zone.is_drained());
}
