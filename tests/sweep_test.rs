//! End-to-end sweep runs against scripted transports.

use cryosweep::instrument::{Cryo, Daq, InstrumentClient};
use cryosweep::setpoint::SetpointPoller;
use cryosweep::sweep::{self, MemorySink, SweepControl, SweepPlan};
use cryosweep::transport::mock::{sent_count, RequestJournal};
use cryosweep::transport::ScriptedTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Cryo whose read-backs converge on the first poll of each setpoint.
fn scripted_cryo() -> (Cryo, RequestJournal) {
    let transport = ScriptedTransport::new()
        .reply_result("Set Magnet", json!({}))
        .reply_result("Set Temperature", json!({}))
        .reply_result("Get Magnet", json!({"Field (T)": -1.0}))
        .reply_result("Get Magnet", json!({"Field (T)": 1.0}))
        .reply_result("Get Temperature", json!({"Temperature (K)": 300.0}))
        .reply_result("Get Temperature", json!({"Temperature (K)": 320.0}))
        .reply_result("Get Temperature", json!({"Temperature (K)": 300.0}))
        .reply_result("Get Temperature", json!({"Temperature (K)": 320.0}));
    let journal = transport.journal();
    let client = InstrumentClient::new("cryo", Box::new(transport));
    let poller = SetpointPoller::new(Duration::from_millis(10), None);
    (Cryo::with_poller(client, poller), journal)
}

fn scripted_lockin(results: serde_json::Value) -> (Daq, RequestJournal) {
    let transport = ScriptedTransport::new()
        .reply_result("setAO_DC", json!({}))
        .reply_result("getResults", results);
    let journal = transport.journal();
    (Daq::new(InstrumentClient::new("lockin", Box::new(transport))), journal)
}

fn plan() -> SweepPlan {
    SweepPlan {
        field_points: vec![-1.0, 1.0],
        field_rate: 10.0,
        temp_points: vec![300.0, 320.0],
        temp_rate: 50.0,
        gate_points: vec![0.0, 0.05, 0.1],
        gate_channel: 2,
        drain_channel: 1,
        reference: 1,
        settle: Duration::from_millis(10),
        dwell: Duration::from_millis(1),
    }
}

#[tokio::test(start_paused = true)]
async fn full_sweep_records_one_curve_per_field_temperature_pair() {
    let (mut cryo, cryo_journal) = scripted_cryo();
    let (mut daq, lockin_journal) = scripted_lockin(json!({
        "Results (Dictionary)": [{"key": "AI1.Ref1.X", "value": 0.42}]
    }));
    let control = SweepControl::new();
    let sink = MemorySink::new();
    let curves = sink.curves();
    let mut sink = sink;

    let outcome = sweep::run(&mut cryo, &mut daq, &plan(), &control, &mut sink)
        .await
        .unwrap();

    assert!(!outcome.stopped_early);
    assert_eq!(outcome.curves_recorded, 4);

    let curves = curves.lock().unwrap();
    assert_eq!(curves.len(), 4);
    assert_eq!(curves[0].field, -1.0);
    assert_eq!(curves[0].temperature, 300.0);
    assert_eq!(curves[3].field, 1.0);
    assert_eq!(curves[3].temperature, 320.0);
    for curve in curves.iter() {
        assert_eq!(curve.gate, vec![0.0, 0.05, 0.1]);
        assert_eq!(curve.signal, vec![0.42, 0.42, 0.42]);
    }

    // One set per actuator target, alternating with converged polls.
    assert_eq!(sent_count(&cryo_journal, "Set Magnet"), 2);
    assert_eq!(sent_count(&cryo_journal, "Get Magnet"), 2);
    assert_eq!(sent_count(&cryo_journal, "Set Temperature"), 4);
    assert_eq!(sent_count(&cryo_journal, "Get Temperature"), 4);
    // Per curve: one priming write plus one write per gate point.
    assert_eq!(sent_count(&lockin_journal, "setAO_DC"), 16);
    assert_eq!(sent_count(&lockin_journal, "getResults"), 12);
}

#[tokio::test(start_paused = true)]
async fn stop_request_halts_before_the_next_step() {
    let (mut cryo, cryo_journal) = scripted_cryo();
    let (mut daq, _) = scripted_lockin(json!({
        "Results (Dictionary)": [{"key": "AI1.Ref1.X", "value": 0.42}]
    }));
    let control = SweepControl::new();
    control.stop();
    let mut sink = MemorySink::new();

    let outcome = sweep::run(&mut cryo, &mut daq, &plan(), &control, &mut sink)
        .await
        .unwrap();

    assert!(outcome.stopped_early);
    assert_eq!(outcome.curves_recorded, 0);
    // Stopped at the first checkpoint: nothing was sent.
    assert_eq!(cryo_journal.lock().unwrap().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn pause_defers_the_sweep_until_resumed() {
    let (mut cryo, cryo_journal) = scripted_cryo();
    let (mut daq, _) = scripted_lockin(json!({
        "Results (Dictionary)": [{"key": "AI1.Ref1.X", "value": 0.42}]
    }));
    let control = Arc::new(SweepControl::new());
    control.pause();

    let handle = {
        let control = Arc::clone(&control);
        let journal = cryo_journal.clone();
        tokio::spawn(async move {
            let mut sink = MemorySink::new();
            let outcome = sweep::run(&mut cryo, &mut daq, &plan(), &control, &mut sink)
                .await
                .unwrap();
            (outcome, journal)
        })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(cryo_journal.lock().unwrap().len(), 0, "paused sweep must not issue commands");

    control.resume();
    let (outcome, journal) = handle.await.unwrap();
    assert!(!outcome.stopped_early);
    assert_eq!(outcome.curves_recorded, 4);
    assert!(journal.lock().unwrap().len() > 0);
}

#[tokio::test(start_paused = true)]
async fn gate_write_faults_do_not_abort_the_sweep() {
    let (mut cryo, _) = scripted_cryo();
    let transport = ScriptedTransport::new()
        .fail("setAO_DC")
        .reply_result(
            "getResults",
            json!({"Results (Dictionary)": [{"key": "AI1.Ref1.X", "value": 0.42}]}),
        );
    let lockin_journal = transport.journal();
    let mut daq = Daq::new(InstrumentClient::new("lockin", Box::new(transport)));
    let control = SweepControl::new();
    let sink = MemorySink::new();
    let curves = sink.curves();
    let mut sink = sink;

    let outcome = sweep::run(&mut cryo, &mut daq, &plan(), &control, &mut sink)
        .await
        .unwrap();

    // Every gate write failed at the socket level; the sweep still ran to
    // completion and every point was read.
    assert!(!outcome.stopped_early);
    assert_eq!(outcome.curves_recorded, 4);
    assert_eq!(sent_count(&lockin_journal, "setAO_DC"), 16);
    assert_eq!(sent_count(&lockin_journal, "getResults"), 12);
    let curves = curves.lock().unwrap();
    assert_eq!(curves[0].signal, vec![0.42, 0.42, 0.42]);
}

#[tokio::test(start_paused = true)]
async fn failed_point_reads_become_gaps_not_aborts() {
    let (mut cryo, _) = scripted_cryo();
    // Dictionary present but the drain channel's key is missing.
    let (mut daq, _) = scripted_lockin(json!({
        "Results (Dictionary)": [{"key": "AI7.Ref1.X", "value": 0.0}]
    }));
    let control = SweepControl::new();
    let sink = MemorySink::new();
    let curves = sink.curves();
    let mut sink = sink;

    let outcome = sweep::run(&mut cryo, &mut daq, &plan(), &control, &mut sink)
        .await
        .unwrap();

    assert_eq!(outcome.curves_recorded, 4);
    let curves = curves.lock().unwrap();
    assert!(curves[0].signal.iter().all(|signal| signal.is_nan()));
}
