//! Rohde & Schwarz FSV3000 signal and spectrum analyzer driver
//!
//! Supported models: FSV3004, FSV3007, FSV3013, FSV3030, FSV3044.
//!
//! ## Parameters
//!
//! | name          | set                 | get              | validator                  |
//! |---------------|---------------------|------------------|----------------------------|
//! | `options`     | -                   | (cached)         | -                          |
//! | `start`       | `FREQ:STAR {}`      | `FREQ:STAR?`     | model frequency range      |
//! | `stop`        | `FREQ:STOP {}`      | `FREQ:STOP?`     | model frequency range      |
//! | `center`      | `FREQ:CENT {}`      | `FREQ:CENT?`     | model frequency range      |
//! | `span`        | `FREQ:SPAN {}`      | `FREQ:SPAN?`     | model frequency range      |
//! | `att`         | `INP:ATT {}dB`      | `INP:ATT?`       | 0..75 dB, 1 dB steps with B25, else 5 dB |
//! | `preamp`      | `INP:GAIN:STAT {}`  | `INP:GAIN:STAT?` | ON / OFF (B24 only)        |
//! | `preamp_gain` | `INP:GAIN:VAL {}`   | `INP:GAIN:VAL?`  | 15 / 30 dB, 30 only on FSV3044 (B24 only) |

use super::{models::FSV3000_MODELS, InstrumentCore, ScpiInstrument};
use crate::error::AppResult;
use crate::parameter::{ScpiParameter, ValMapping, ValueKind};
use crate::traits::ScpiEndpoint;
use crate::validators::Validator;
use std::sync::Arc;
use tracing::debug;

/// Driver family name used in errors and snapshots
pub const FAMILY: &str = "FSV3000";

/// Option code of the preamplifier
pub const PREAMP_OPTION: &str = "B24";
/// Option code of the 1 dB step attenuator
pub const FINE_ATTENUATOR_OPTION: &str = "B25";

const MAX_ATTENUATION_DB: f64 = 75.0;

/// FSV3000 spectrum analyzer
#[derive(Debug)]
pub struct RohdeSchwarzFsv3000 {
    core: InstrumentCore,
}

impl RohdeSchwarzFsv3000 {
    /// Identify the analyzer and register its parameters
    ///
    /// # Errors
    /// `UnsupportedModel` if `*IDN?` reports a model outside the FSV3000 table.
    pub async fn connect(name: impl Into<String>, endpoint: Arc<dyn ScpiEndpoint>) -> AppResult<Self> {
        let mut core = InstrumentCore::connect(name, endpoint, FAMILY, FSV3000_MODELS).await?;
        let bounds = core.bounds();
        let frequency = Validator::numbers(bounds.min_hz, bounds.max_hz);

        for (name, label, header) in [
            ("start", "Start", "FREQ:STAR"),
            ("stop", "Stop", "FREQ:STOP"),
            ("center", "Center", "FREQ:CENT"),
            ("span", "Span", "FREQ:SPAN"),
        ] {
            let parameter = ScpiParameter::builder(name, core.endpoint())
                .label(label)
                .unit("Hz")
                .get_cmd(format!("{}?", header))
                .set_cmd(format!("{} {{value}}", header))
                .kind(ValueKind::Float)
                .vals(frequency.clone())
                .build();
            core.register(parameter);
        }

        let attenuation_step = if core.has_option(FINE_ATTENUATOR_OPTION) {
            1.0
        } else {
            5.0
        };
        let att = ScpiParameter::builder("att", core.endpoint())
            .label("Attenuator")
            .unit("dB")
            .get_cmd("INP:ATT?")
            .set_cmd("INP:ATT {value}dB")
            .kind(ValueKind::Float)
            .vals(Validator::stepped(0.0, MAX_ATTENUATION_DB, attenuation_step))
            .build();
        core.register(att);

        if core.has_option(PREAMP_OPTION) {
            let preamp = ScpiParameter::builder("preamp", core.endpoint())
                .label("Preamplifier")
                .get_cmd("INP:GAIN:STAT?")
                .set_cmd("INP:GAIN:STAT {value}")
                .kind(ValueKind::Str)
                .val_mapping(ValMapping::new([("ON", 1), ("OFF", 0)]))
                .vals(Validator::enumeration(["ON", "OFF"]))
                .build();
            core.register(preamp);

            let gains = if core.model() == "FSV3044" {
                Validator::enumeration([30])
            } else {
                Validator::enumeration([15, 30])
            };
            let preamp_gain = ScpiParameter::builder("preamp_gain", core.endpoint())
                .label("Preamplifier gain")
                .unit("dB")
                .get_cmd("INP:GAIN:VAL?")
                .set_cmd("INP:GAIN:VAL {value}")
                .kind(ValueKind::Int)
                .vals(gains)
                .build();
            core.register(preamp_gain);
        }

        debug!(
            "FSV3000 '{}' registered parameters: {:?}",
            core.name(),
            core.parameters().names()
        );
        Ok(Self { core })
    }

    /// Sweep start frequency
    pub fn start(&self) -> AppResult<Arc<ScpiParameter>> {
        self.parameter("start")
    }

    /// Sweep stop frequency
    pub fn stop(&self) -> AppResult<Arc<ScpiParameter>> {
        self.parameter("stop")
    }

    /// Center frequency
    pub fn center(&self) -> AppResult<Arc<ScpiParameter>> {
        self.parameter("center")
    }

    /// Frequency span
    pub fn span(&self) -> AppResult<Arc<ScpiParameter>> {
        self.parameter("span")
    }

    /// Input attenuation
    pub fn att(&self) -> AppResult<Arc<ScpiParameter>> {
        self.parameter("att")
    }

    /// Preamplifier switch, present only with option B24
    pub fn preamp(&self) -> Option<Arc<ScpiParameter>> {
        self.core.parameters().get("preamp")
    }

    /// Preamplifier gain, present only with option B24
    pub fn preamp_gain(&self) -> Option<Arc<ScpiParameter>> {
        self.core.parameters().get("preamp_gain")
    }
}

impl ScpiInstrument for RohdeSchwarzFsv3000 {
    fn core(&self) -> &InstrumentCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockScpiAdapter;
    use crate::error::DaqError;
    use crate::parameter::ParamValue;

    fn mock(model: &str, options: &str) -> MockScpiAdapter {
        MockScpiAdapter::new("TCPIP::192.168.88.15::hislip0::INSTR")
            .with_response("*IDN?", format!("Rohde&Schwarz,{},101234,1.50", model))
            .with_response("*OPT?", options)
    }

    #[tokio::test]
    async fn test_registers_base_parameters_without_options() {
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock("FSV3004", "")))
            .await
            .unwrap();
        assert_eq!(
            fsv.parameter_names(),
            vec!["options", "start", "stop", "center", "span", "att"]
        );
        assert!(fsv.preamp().is_none());
        assert!(fsv.preamp_gain().is_none());
    }

    #[tokio::test]
    async fn test_frequency_bounds_follow_model() {
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock("FSV3004", "")))
            .await
            .unwrap();
        let stop = fsv.stop().unwrap();
        assert!(stop.set(3e9).await.is_ok());
        assert!(matches!(
            stop.set(5e9).await,
            Err(DaqError::OutOfRange { .. })
        ));
        assert!(stop.set(5.0).await.is_err());
    }

    #[tokio::test]
    async fn test_attenuation_steps_depend_on_b25() {
        let coarse = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock("FSV3007", "B24")))
            .await
            .unwrap();
        assert!(coarse.att().unwrap().set(7).await.is_err());
        assert!(coarse.att().unwrap().set(10).await.is_ok());

        let fine = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock("FSV3007", "B24,B25")))
            .await
            .unwrap();
        assert!(fine.att().unwrap().set(7).await.is_ok());
        assert!(fine.att().unwrap().set(80).await.is_err());
    }

    #[tokio::test]
    async fn test_preamp_gain_on_fsv3044() {
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock("FSV3044", "B24")))
            .await
            .unwrap();
        let gain = fsv.preamp_gain().unwrap();
        assert!(gain.set(15).await.is_err());
        assert!(gain.set(30).await.is_ok());
    }

    #[tokio::test]
    async fn test_preamp_gain_15_below_fsv3044() {
        let mock = mock("FSV3007", "B24");
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
            .await
            .unwrap();
        let gain = fsv.preamp_gain().unwrap();
        assert!(gain.set(15).await.is_ok());
        assert!(gain.set(20).await.is_err());
        assert_eq!(mock.writes(), vec!["INP:GAIN:VAL 15"]);
    }

    #[tokio::test]
    async fn test_attenuation_sends_matched_step() {
        let mock = mock("FSV3030", "B25");
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock.clone()))
            .await
            .unwrap();
        let att = fsv.att().unwrap();
        att.set(10.000000001).await.unwrap();
        assert_eq!(mock.writes(), vec!["INP:ATT 10dB"]);
        assert_eq!(att.cached(), Some(ParamValue::Float(10.0)));
    }

    #[tokio::test]
    async fn test_options_parameter() {
        let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(mock("FSV3013", "B24,B25")))
            .await
            .unwrap();
        let options = fsv.parameter("options").unwrap();
        assert_eq!(
            options.get().await.unwrap(),
            ParamValue::List(vec!["B24".into(), "B25".into()])
        );
        assert!(options.set("B4").await.is_err());
    }
}
