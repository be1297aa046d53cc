//! FSV3000 driver against the mock SCPI adapter

use rf_daq::adapters::{MockCall, MockScpiAdapter};
use rf_daq::error::DaqError;
use rf_daq::instrument::{RohdeSchwarzFsv3000, ScpiInstrument};
use rf_daq::parameter::ParamValue;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn fsv_mock(model: &str, options: &str) -> MockScpiAdapter {
    MockScpiAdapter::new("TCPIP0::192.168.1.21::hislip0::INSTR")
        .with_response("*IDN?", format!("Rohde&Schwarz,{},1330.5000K07/101234,1.50", model))
        .with_response("*OPT?", options)
}

#[tokio::test]
async fn test_every_model_connects_with_its_range() {
    for (model, max_hz) in [
        ("FSV3004", 4e9),
        ("FSV3007", 7.5e9),
        ("FSV3013", 13.6e9),
        ("FSV3030", 30e9),
        ("FSV3044", 44e9),
    ] {
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(fsv_mock(model, "")))
            .await
            .unwrap();
        assert_eq!(fsv.frequency_bounds().min_hz, 10.0);
        assert_eq!(fsv.frequency_bounds().max_hz, max_hz, "{}", model);
    }
}

#[tokio::test]
async fn test_unknown_model_fails() {
    let result = RohdeSchwarzFsv3000::connect("fsv", Arc::new(fsv_mock("FSV3045", ""))).await;
    assert!(matches!(result, Err(DaqError::UnsupportedModel { .. })));
}

#[tokio::test]
async fn test_frequency_commands() {
    let mock = fsv_mock("FSV3013", "B25");
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
        .await
        .unwrap();
    mock.clear_log();

    assert_ok!(fsv.start().unwrap().set(1e6).await);
    assert_ok!(fsv.stop().unwrap().set(3e9).await);
    assert_ok!(fsv.center().unwrap().set(2.4e9).await);
    assert_ok!(fsv.span().unwrap().set(100e6).await);

    assert_eq!(
        mock.writes(),
        vec![
            "FREQ:STAR 1000000",
            "FREQ:STOP 3000000000",
            "FREQ:CENT 2400000000",
            "FREQ:SPAN 100000000",
        ]
    );

    // Read back through the setter echo
    assert_eq!(
        fsv.stop().unwrap().get().await.unwrap(),
        ParamValue::Float(3e9)
    );
}

#[tokio::test]
async fn test_rejected_values_never_reach_instrument() {
    let mock = fsv_mock("FSV3004", "");
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
        .await
        .unwrap();
    mock.clear_log();

    assert_err!(fsv.stop().unwrap().set(4.1e9).await);
    assert_err!(fsv.start().unwrap().set(1.0).await);
    assert_err!(fsv.att().unwrap().set(12).await);
    assert_err!(fsv.att().unwrap().set("auto").await);
    assert!(mock.call_log().is_empty());
}

#[tokio::test]
async fn test_attenuation_command_has_unit_suffix() {
    let mock = fsv_mock("FSV3030", "B25");
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
        .await
        .unwrap();
    mock.clear_log();

    fsv.att().unwrap().set(12).await.unwrap();
    assert_eq!(mock.call_log(), vec![MockCall::Write("INP:ATT 12dB".to_string())]);
}

#[tokio::test]
async fn test_preamp_mapping_round_trip() {
    let mock = fsv_mock("FSV3007", "B4,B24");
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
        .await
        .unwrap();
    let preamp = fsv.preamp().expect("B24 installs preamp");
    mock.clear_log();

    preamp.set("ON").await.unwrap();
    assert_eq!(mock.writes(), vec!["INP:GAIN:STAT 1"]);
    assert_eq!(preamp.get().await.unwrap(), ParamValue::from("ON"));

    mock.set_response("INP:GAIN:VAL?", "15");
    assert_eq!(
        fsv.preamp_gain().unwrap().get().await.unwrap(),
        ParamValue::Int(15)
    );
    assert_err!(preamp.set("HIGH").await);
}

#[tokio::test]
async fn test_snapshot_lists_parameters() {
    let mock = fsv_mock("FSV3044", "B24,B25").with_response("FREQ:CENT?", "1.0E+09");
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
        .await
        .unwrap();

    let snapshot = fsv.snapshot(false).await;
    assert_eq!(snapshot.family, "FSV3000");
    assert_eq!(snapshot.options, vec!["B24", "B25"]);
    assert_eq!(snapshot.parameters.len(), 8);
    assert!(snapshot.channels.is_empty());

    // Refresh failures (no scripted response) are tolerated
    let snapshot = fsv.snapshot(true).await;
    assert_eq!(
        snapshot.parameters["center"].value,
        Some(ParamValue::Float(1e9))
    );
    assert_eq!(snapshot.parameters["stop"].value, None);
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let mock = fsv_mock("FSV3004", "");
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
        .await
        .unwrap();

    mock.inject_next_failure();
    assert!(matches!(
        fsv.stop().unwrap().set(1e9).await,
        Err(DaqError::Transport(_))
    ));
    assert_eq!(fsv.stop().unwrap().cached(), None);
}
