//! End-to-end ingestion tests: documents in through [`Session`], values out
//! through reads and subscriptions.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use signalk_core::{ConsumerId, Delta, Session, SignalKStore, ValueType};

const HDG: &str = "self.navigation.headingTrue";

fn snapshot() -> Value {
    json!({
        "self": "urn:v1",
        "navigation": {
            "headingTrue": {
                "value": 1.23,
                "timestamp": "2024-01-01T00:00:00Z",
                "$source": "gps1"
            }
        }
    })
}

fn gps2_delta() -> Delta {
    serde_json::from_value(json!({
        "context": "urn:v1",
        "updates": [{
            "$source": "gps2",
            "timestamp": "2024-01-01T00:00:01Z",
            "values": [{"path": "navigation.headingTrue", "value": 2.0}]
        }]
    }))
    .unwrap()
}

fn recorder() -> (Arc<Mutex<Vec<Option<Value>>>>, impl FnMut(Option<&Value>) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |v: Option<&Value>| sink.lock().unwrap().push(v.cloned()))
}

#[test]
fn test_snapshot_scenario() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());

    assert_eq!(session.read(HDG, "default"), Some(&json!(1.23)));
    assert_eq!(
        session.sources_for_path(HDG),
        BTreeSet::from(["gps1".to_string()])
    );
}

#[test]
fn test_second_source_from_delta() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());
    session.ingest_delta(&gps2_delta());

    assert_eq!(session.read(HDG, "gps2"), Some(&json!(2.0)));
    assert_eq!(session.read(HDG, "gps1"), Some(&json!(1.23)));
    // The first source stays the default
    assert_eq!(session.read(HDG, "default"), Some(&json!(1.23)));
}

#[test]
fn test_malformed_update_does_not_block_siblings() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());

    let delta: Delta = serde_json::from_value(json!({
        "context": "vessels.urn:v1",
        "updates": [
            {
                "$source": "gps2",
                "timestamp": 1704067201000u64,
                "values": [{"path": "navigation.headingTrue", "value": 2.0}]
            },
            {"$source": "gps3", "values": 42}
        ]
    }))
    .unwrap();
    let received = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    session.ingest_delta_at(&delta, received);

    assert_eq!(session.read(HDG, "gps2"), Some(&json!(2.0)));
    assert_eq!(
        session.entry(HDG).unwrap().record("gps2").unwrap().timestamp,
        received
    );
    assert!(!session.sources_for_path(HDG).contains("gps3"));
}

#[test]
fn test_snapshot_leaf_readable_by_source() {
    let mut session = Session::new();
    session.ingest_full(&json!({
        "self": "vessels.urn:mrn:signalk:uuid:705f5f1a",
        "navigation": {
            "speedOverGround": {
                "value": 3.85,
                "timestamp": "2024-01-17T10:30:00.000Z",
                "$source": "nmea0183.GP"
            },
            "position": {
                "value": {"latitude": 60.1, "longitude": 24.9},
                "timestamp": "2024-01-17T10:30:00.000Z",
                "source": {"label": "N2K-1", "type": "NMEA2000"}
            }
        }
    }));

    assert_eq!(
        session.read("self.navigation.speedOverGround", "nmea0183.GP"),
        Some(&json!(3.85))
    );
    assert_eq!(
        session.read("self.navigation.position.latitude", "N2K-1"),
        Some(&json!(60.1))
    );
    assert_eq!(
        session.read("self.navigation.position.longitude", "N2K-1"),
        Some(&json!(24.9))
    );
}

#[test]
fn test_foreign_context_leaves_store_unchanged() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());
    let before = session.store().clone();

    let foreign: Delta = serde_json::from_value(json!({
        "context": "vessels.urn:mrn:imo:mmsi:230099999",
        "updates": [{
            "$source": "ais",
            "values": [
                {"path": "navigation.headingTrue", "value": 0.5},
                {"path": "navigation.speedOverGround", "value": 5.2}
            ]
        }]
    }))
    .unwrap();

    assert_eq!(session.ingest_delta(&foreign), 0);
    assert_eq!(session.store(), &before);
}

#[test]
fn test_set_default_source_then_read() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());
    session.ingest_delta(&gps2_delta());

    for source in ["gps2", "gps1"] {
        session.set_default_source(HDG, source);
        assert_eq!(session.read(HDG, "default"), session.read(HDG, source));
    }
}

#[test]
fn test_subscribe_before_data() {
    let mut session = Session::new();
    let (seen, listener) = recorder();
    session.subscribe(ConsumerId::new(), HDG, "default", listener);
    assert_eq!(*seen.lock().unwrap(), vec![None]);

    session.ingest_full(&snapshot());
    assert_eq!(*seen.lock().unwrap(), vec![None, Some(json!(1.23))]);
}

#[test]
fn test_pinned_subscription_ignores_other_sources() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());

    let (pinned_seen, pinned) = recorder();
    let (default_seen, default) = recorder();
    let widget = ConsumerId::new();
    session.subscribe(widget, HDG, "gps2", pinned);
    session.subscribe(widget, HDG, "default", default);

    // gps2 has not reported yet, so the first read falls back to the default
    assert_eq!(*pinned_seen.lock().unwrap(), vec![Some(json!(1.23))]);

    session.ingest_delta(&gps2_delta());
    assert_eq!(
        *pinned_seen.lock().unwrap(),
        vec![Some(json!(1.23)), Some(json!(2.0))]
    );
    assert_eq!(*default_seen.lock().unwrap(), vec![Some(json!(1.23))]);

    session.set_default_source(HDG, "gps2");
    assert_eq!(
        *default_seen.lock().unwrap(),
        vec![Some(json!(1.23)), Some(json!(2.0))]
    );
    assert_eq!(pinned_seen.lock().unwrap().len(), 2);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let mut session = Session::new();
    let (seen, listener) = recorder();
    let widget = ConsumerId::new();
    session.subscribe(widget, HDG, "default", listener);

    assert_eq!(session.unsubscribe(widget, HDG), 1);
    assert_eq!(session.unsubscribe(widget, HDG), 0);
    assert_eq!(session.unsubscribe(ConsumerId::new(), "self.never.subscribed"), 0);

    session.ingest_full(&snapshot());
    assert_eq!(*seen.lock().unwrap(), vec![None]);
}

#[test]
fn test_listeners_called_in_creation_order() {
    let mut session = Session::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = order.clone();
        session.subscribe(ConsumerId::new(), HDG, "default", move |v: Option<&Value>| {
            if v.is_some() {
                order.lock().unwrap().push(name);
            }
        });
    }

    session.ingest_full(&snapshot());
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn test_snapshot_ingestion_is_idempotent() {
    let received = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let doc = json!({
        "self": "urn:v1",
        "name": "Boaty",
        "navigation": {
            "headingTrue": {
                "value": 1.23,
                "timestamp": "2024-01-01T00:00:00Z",
                "$source": "gps1",
                "meta": {"units": "rad"}
            },
            "position": {
                "value": {"latitude": 60.1, "longitude": 24.9},
                "timestamp": "2024-01-01T00:00:00Z",
                "$source": "gps1"
            }
        }
    });

    let mut once = Session::new();
    once.ingest_full_at(&doc, received);

    let mut twice = Session::new();
    twice.ingest_full_at(&doc, received);
    twice.ingest_full_at(&doc, received);

    assert_eq!(once.store(), twice.store());
}

#[test]
fn test_unknown_path_reads_none() {
    let mut session = Session::new();
    assert_eq!(session.read("self.nonexistent.path", "default"), None);

    session.ingest_full(&snapshot());
    assert_eq!(session.read("self.nonexistent.path", "default"), None);
    assert_eq!(session.read(HDG, "gps9"), Some(&json!(1.23)));
    assert!(session.sources_for_path("self.nonexistent.path").is_empty());
}

#[test]
fn test_leaf_source_is_default_with_and_without_meta() {
    // Alternate `values` sources never win the default, meta or not.
    let mut session = Session::new();
    session.ingest_full(&json!({
        "self": "urn:v1",
        "environment": {
            "depth": {
                "belowKeel": {
                    "value": 4.2,
                    "timestamp": "2024-01-01T00:00:00Z",
                    "$source": "sounder",
                    "values": {"sounder2": {"value": 4.4, "timestamp": "2024-01-01T00:00:00Z"}}
                }
            },
            "wind": {
                "speedTrue": {
                    "value": 6.1,
                    "timestamp": "2024-01-01T00:00:00Z",
                    "$source": "wind1",
                    "meta": {"units": "m/s"},
                    "values": {"wind2": {"value": 6.3, "timestamp": "2024-01-01T00:00:00Z"}}
                }
            }
        }
    }));

    let depth = session.entry("self.environment.depth.belowKeel").unwrap();
    assert_eq!(depth.default_source(), Some("sounder"));
    assert!(depth.meta().is_none());
    assert_eq!(
        session.sources_for_path("self.environment.depth.belowKeel"),
        BTreeSet::from(["sounder".to_string(), "sounder2".to_string()])
    );

    let wind = session.entry("self.environment.wind.speedTrue").unwrap();
    assert_eq!(wind.default_source(), Some("wind1"));
    assert_eq!(wind.meta().and_then(|m| m.units.as_deref()), Some("m/s"));
}

#[test]
fn test_null_branches_dropped() {
    let mut session = Session::new();
    session.ingest_full(&json!({
        "self": "urn:v1",
        "notifications": {"mob": null},
        "navigation": {"headingTrue": null, "state": "sailing"}
    }));

    assert_eq!(session.entry("self.notifications.mob"), None);
    assert_eq!(session.entry(HDG), None);
    assert_eq!(session.read("self.navigation.state", "noSource"), Some(&json!("sailing")));
}

#[test]
fn test_self_deltas_before_identity_ignored() {
    let mut session = Session::new();
    assert_eq!(session.ingest_delta(&gps2_delta()), 0);
    assert!(session.store().is_empty());
}

#[test]
fn test_reset_session_keeps_registrations() {
    let mut session = Session::new();
    session.ingest_full(&snapshot());
    let (seen, listener) = recorder();
    let id = session.subscribe(ConsumerId::new(), HDG, "default", listener);

    session.reset_session();
    assert_eq!(session.self_identity(), None);
    assert!(session.store().is_empty());
    assert!(session.subscriptions().contains(id));
    assert_eq!(session.subscriptions().current(id), None);

    session.ingest_full(&snapshot());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(json!(1.23)), None, Some(json!(1.23))]
    );
}

#[test]
fn test_path_type_index() {
    let mut session = Session::new();
    session.ingest_full(&json!({
        "self": "urn:v1",
        "name": "Boaty",
        "navigation": {
            "headingTrue": {"value": 1.23, "timestamp": "2024-01-01T00:00:00Z", "$source": "gps1"}
        },
        "steering": {
            "autopilot": {
                "engaged": {"value": true, "timestamp": "2024-01-01T00:00:00Z", "$source": "ap"}
            }
        }
    }));

    assert_eq!(
        session.list_paths_by_type(ValueType::Number),
        BTreeSet::from([HDG.to_string()])
    );
    assert_eq!(
        session.list_paths_by_type(ValueType::String),
        BTreeSet::from(["self.name".to_string()])
    );
    assert_eq!(
        session.list_paths_by_type(ValueType::Boolean),
        BTreeSet::from(["self.steering.autopilot.engaged".to_string()])
    );
    assert_eq!(
        session.store().paths_by_type(ValueType::Number),
        BTreeSet::from(["vessels.urn:v1.navigation.headingTrue".to_string()])
    );
}
