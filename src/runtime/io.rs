//! Sensor and actuator contracts
//!
//! Sensors feed the per-tick input snapshot; actuators receive assignments
//! and slew rates from scripts and push their state to the hosting device
//! once per control step. The generic implementations here cover the
//! common cases; hosts plug their own types in through the traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Declared type of a sensor or actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// On/off state.
    Boolean,
    /// Real-valued quantity.
    Number,
}

/// A sensed (or actuated) value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// On/off state.
    Boolean(bool),
    /// Real-valued quantity.
    Number(f64),
}

impl InputValue {
    /// Declared type matching this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            InputValue::Boolean(_) => ValueType::Boolean,
            InputValue::Number(_) => ValueType::Number,
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Boolean(flag) => f.write_str(if *flag { "1" } else { "0" }),
            InputValue::Number(num) => write!(f, "{}", format_si(*num)),
        }
    }
}

/// Format a number with an SI prefix, e.g. `12.50k`.
pub fn format_si(value: f64) -> String {
    const PREFIXES: [&str; 9] = ["p", "n", "µ", "m", "", "k", "M", "G", "T"];
    if value == 0.0 || !value.is_finite() {
        return format!("{value:.2}");
    }
    let offset = ((value.abs().log10() / 3.0).floor() as i32).clamp(-4, 4);
    let scaled = value / 1000f64.powi(offset);
    format!("{scaled:.2}{}", PREFIXES[(offset + 4) as usize])
}

/// Failure to read a sensor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The sensor has no reading right now.
    #[error("sensor `{0}` has no reading")]
    NoReading(String),

    /// The reading did not have the declared type.
    #[error("sensor `{name}` produced {found:?}, declared {declared:?}")]
    WrongType {
        /// Sensor name.
        name: String,
        /// Declared type.
        declared: ValueType,
        /// Type actually produced.
        found: ValueType,
    },

    /// Host-specific failure.
    #[error("sensor `{name}` failed: {detail}")]
    Failed {
        /// Sensor name.
        name: String,
        /// Failure description.
        detail: String,
    },
}

/// Named, typed, conditionally available input.
pub trait Sensor {
    /// Unique name scripts refer to.
    fn name(&self) -> &str;

    /// Whether the reading should be included in this tick's snapshot.
    fn is_available(&self) -> bool {
        true
    }

    /// Declared type of every reading.
    fn value_type(&self) -> ValueType;

    /// Current reading.
    fn value(&self) -> Result<InputValue, SensorError>;
}

/// Sensor backed by closures.
pub struct FnSensor {
    name: String,
    value_type: ValueType,
    available: Box<dyn Fn() -> bool>,
    read: Box<dyn Fn() -> Result<InputValue, SensorError>>,
}

impl FnSensor {
    /// Always-available sensor reading through `read`.
    pub fn new<F>(name: impl Into<String>, value_type: ValueType, read: F) -> Self
    where
        F: Fn() -> Result<InputValue, SensorError> + 'static,
    {
        Self {
            name: name.into(),
            value_type,
            available: Box::new(|| true),
            read: Box::new(read),
        }
    }

    /// Replace the availability predicate.
    pub fn with_availability<F>(mut self, available: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.available = Box::new(available);
        self
    }
}

impl Sensor for FnSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        (self.available)()
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn value(&self) -> Result<InputValue, SensorError> {
        (self.read)()
    }
}

/// Rounds a numeric sensor's readings to a fixed resolution.
pub struct Quantized<S> {
    inner: S,
    resolution: f64,
}

impl<S: Sensor> Quantized<S> {
    /// Wrap `inner`, reporting multiples of `resolution`.
    pub fn new(inner: S, resolution: f64) -> Self {
        Self { inner, resolution }
    }
}

impl<S: Sensor> Sensor for Quantized<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn value_type(&self) -> ValueType {
        self.inner.value_type()
    }

    fn value(&self) -> Result<InputValue, SensorError> {
        match self.inner.value()? {
            InputValue::Number(raw) if self.resolution > 0.0 => Ok(InputValue::Number(
                (raw / self.resolution).round() * self.resolution,
            )),
            other => Ok(other),
        }
    }
}

/// Per-control-step information handed to actuators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlContext {
    /// Seconds since the previous control step.
    pub dt: f64,
}

/// Named, typed output driven by scripts.
pub trait Actuator {
    /// Unique name scripts refer to.
    fn name(&self) -> &str;

    /// Declared type.
    fn value_type(&self) -> ValueType;

    /// Current commanded value.
    fn value(&self) -> InputValue;

    /// Slew rate accumulated since the last control step.
    fn pending(&self) -> f64 {
        0.0
    }

    /// Replace the commanded value outright.
    fn assign(&mut self, value: InputValue);

    /// Add a rate (units per second) to the pending accumulator.
    fn slew(&mut self, rate: f64);

    /// Apply accumulated state to the device and clear the accumulator.
    fn apply_and_reset(&mut self, ctx: &ControlContext);

    /// Return to the baseline value with nothing pending.
    fn reset_to_baseline(&mut self);
}

/// Real-valued output with clamping and rate accumulation.
pub struct NumericActuator {
    name: String,
    value: f64,
    pending: f64,
    baseline: f64,
    min: f64,
    max: f64,
    sink: Option<Box<dyn FnMut(f64)>>,
}

impl NumericActuator {
    /// Unbounded output with baseline zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0.0,
            pending: 0.0,
            baseline: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            sink: None,
        }
    }

    /// Clamp the commanded value to `[min, max]`.
    ///
    /// Inverted bounds are swapped; a NaN bound leaves that side open.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        let min = if min.is_nan() { f64::NEG_INFINITY } else { min };
        let max = if max.is_nan() { f64::INFINITY } else { max };
        (self.min, self.max) = if min <= max { (min, max) } else { (max, min) };
        self.baseline = self.baseline.clamp(min, max);
        self.value = self.baseline;
        self
    }

    /// Value restored when the processor starts or stops.
    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline.clamp(self.min, self.max);
        self.value = self.baseline;
        self
    }

    /// Receive the applied value at every control step.
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(f64) + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }
}

impl Actuator for NumericActuator {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_type(&self) -> ValueType {
        ValueType::Number
    }

    fn value(&self) -> InputValue {
        InputValue::Number(self.value)
    }

    fn pending(&self) -> f64 {
        self.pending
    }

    fn assign(&mut self, value: InputValue) {
        if let InputValue::Number(num) = value {
            self.value = num.clamp(self.min, self.max);
        }
    }

    fn slew(&mut self, rate: f64) {
        self.pending += rate;
    }

    fn apply_and_reset(&mut self, ctx: &ControlContext) {
        self.value = (self.value + self.pending * ctx.dt).clamp(self.min, self.max);
        self.pending = 0.0;
        if let Some(sink) = self.sink.as_mut() {
            sink(self.value);
        }
    }

    fn reset_to_baseline(&mut self) {
        self.value = self.baseline;
        self.pending = 0.0;
    }
}

/// On/off output.
pub struct SwitchActuator {
    name: String,
    value: bool,
    baseline: bool,
    sink: Option<Box<dyn FnMut(bool)>>,
}

impl SwitchActuator {
    /// Output that starts (and resets to) off.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: false,
            baseline: false,
            sink: None,
        }
    }

    /// Value restored when the processor starts or stops.
    pub fn with_baseline(mut self, baseline: bool) -> Self {
        self.baseline = baseline;
        self.value = baseline;
        self
    }

    /// Receive the applied state at every control step.
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(bool) + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }
}

impl Actuator for SwitchActuator {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_type(&self) -> ValueType {
        ValueType::Boolean
    }

    fn value(&self) -> InputValue {
        InputValue::Boolean(self.value)
    }

    fn assign(&mut self, value: InputValue) {
        if let InputValue::Boolean(flag) = value {
            self.value = flag;
        }
    }

    // Switches have no rate; the evaluator rejects slews before they get here.
    fn slew(&mut self, _rate: f64) {}

    fn apply_and_reset(&mut self, _ctx: &ControlContext) {
        if let Some(sink) = self.sink.as_mut() {
            sink(self.value);
        }
    }

    fn reset_to_baseline(&mut self) {
        self.value = self.baseline;
    }
}
