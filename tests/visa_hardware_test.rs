//! Hardware integration tests over VISA
//!
//! These tests require real instruments and a system VISA library.
//! Run with: cargo test --test visa_hardware_test --features instrument_visa -- --ignored --nocapture
//!
//! Resources are taken from the environment:
//! - `RFDAQ_TEST_FSV_RESOURCE` (e.g. `TCPIP0::192.168.1.21::hislip0::INSTR`)
//! - `RFDAQ_TEST_VNA_RESOURCE` (e.g. `TCPIP0::192.168.1.20::INSTR`)
#![cfg(feature = "instrument_visa")]

use rf_daq::hardware::VisaAdapterBuilder;
use rf_daq::instrument::{AnritsuMs464xB, RohdeSchwarzFsv3000, ScpiInstrument};
use std::sync::Arc;
use std::time::Duration;

fn resource(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| panic!("{} must be set for hardware tests", var))
}

#[tokio::test]
#[ignore] // Hardware-only test
async fn test_fsv3000_identify_and_span() {
    let adapter = VisaAdapterBuilder::new(resource("RFDAQ_TEST_FSV_RESOURCE"))
        .with_timeout(Duration::from_secs(10))
        .build()
        .await
        .unwrap();
    let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(adapter))
        .await
        .unwrap();
    println!("IDN: {:?}, options: {:?}", fsv.idn(), fsv.options());

    let span = fsv.span().unwrap();
    span.set(100e6).await.unwrap();
    let readback = span.get().await.unwrap();
    assert_eq!(readback.as_f64(), Some(100e6));
}

#[tokio::test]
#[ignore]
async fn test_ms464xb_single_sweep_readout() {
    let adapter = VisaAdapterBuilder::new(resource("RFDAQ_TEST_VNA_RESOURCE"))
        .with_timeout(Duration::from_secs(30))
        .build()
        .await
        .unwrap();
    let vna = AnritsuMs464xB::connect("vna", Arc::new(adapter), true)
        .await
        .unwrap();
    let channel = vna.channel("channel1").unwrap();
    channel.parameter("npts").unwrap().set(201).await.unwrap();

    let sweep = channel.mag_phase().await.unwrap();
    println!("Read {} points", sweep.len());
    assert_eq!(sweep.len(), 201);
}
