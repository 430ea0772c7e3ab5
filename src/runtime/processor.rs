//! The processor: program store, input snapshot and output registry
//!
//! The host drives a processor with two callbacks: [`Processor::tick`] every
//! simulation frame and [`Processor::control_step`] at the (usually lower)
//! actuator rate. Everything runs to completion on the caller's thread.

use std::collections::{BTreeMap, HashMap};

use crate::interpreter::Lexer;
use crate::interpreter::eval::{EvalContext, Outcome, Trigger};

use super::config::ProcessorConfig;
use super::error::ProgramError;
use super::io::{Actuator, ControlContext, InputValue, Sensor, SensorError};
use super::program::{Instruction, Program, ProgramRecord, word_cost};

/// Summary of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Instructions evaluated (skipped ones excluded).
    pub evaluated: usize,
    /// Instructions whose action ran.
    pub fired: usize,
    /// Instructions disabled by an error during this tick.
    pub disabled: usize,
    /// An edge trigger fired; the host should leave time warp.
    pub realtime_requested: bool,
}

/// A programmable processor attached to a host device.
pub struct Processor {
    config: ProcessorConfig,
    lexer: Lexer,
    program: Program,
    sensors: Vec<Box<dyn Sensor>>,
    outputs: BTreeMap<String, Box<dyn Actuator>>,
    snapshot: HashMap<String, InputValue>,
    running: bool,
}

struct Environment<'a> {
    snapshot: &'a HashMap<String, InputValue>,
    outputs: &'a mut BTreeMap<String, Box<dyn Actuator>>,
}

impl EvalContext for Environment<'_> {
    fn input(&self, name: &str) -> Option<InputValue> {
        self.snapshot.get(name).copied()
    }

    fn output(&mut self, name: &str) -> Option<&mut dyn Actuator> {
        match self.outputs.get_mut(name) {
            Some(output) => Some(output.as_mut()),
            None => None,
        }
    }
}

impl Processor {
    /// Create a processor with an empty program.
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            program: Program::new(config.imem_words),
            running: config.start_running,
            config,
            lexer: Lexer::new(),
            sensors: Vec::new(),
            outputs: BTreeMap::new(),
            snapshot: HashMap::new(),
        }
    }

    /// Use a custom token table for every instruction compiled from now on.
    pub fn with_lexer(mut self, lexer: Lexer) -> Self {
        self.lexer = lexer;
        self
    }

    /// Configuration this processor was built with.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Register a sensor, replacing any sensor with the same name.
    pub fn add_sensor<S: Sensor + 'static>(&mut self, sensor: S) {
        self.sensors.retain(|existing| existing.name() != sensor.name());
        self.sensors.push(Box::new(sensor));
    }

    /// Register an actuator, replacing any actuator with the same name.
    pub fn add_output<A: Actuator + 'static>(&mut self, output: A) {
        self.outputs.insert(output.name().to_string(), Box::new(output));
    }

    /// Compile `text` and append it to the program.
    ///
    /// On any error the program is left untouched.
    pub fn add_instruction(&mut self, text: &str) -> Result<(), ProgramError> {
        let result = self.compile(text).and_then(|instruction| {
            let code = instruction.code().to_string();
            self.program.push(instruction)?;
            tracing::info!(instruction = %code, "added instruction");
            Ok(())
        });
        if let Err(err) = &result {
            tracing::info!(text, error = %err, "rejected instruction");
        }
        result
    }

    fn compile(&self, text: &str) -> Result<Instruction, ProgramError> {
        let tokens = self.lexer.tokenize(text)?;
        let cost = word_cost(&tokens);
        let remaining = self.program.remaining_words();
        if cost > remaining {
            return Err(ProgramError::OverBudget { cost, remaining });
        }
        let instruction = Instruction::from_tokens(tokens)?;
        if let Some(feature) = self.config.features.first_missing(instruction.root()) {
            return Err(ProgramError::Unsupported(feature));
        }
        Ok(instruction)
    }

    /// Remove every instruction.
    pub fn clear_instructions(&mut self) {
        self.program.clear();
    }

    /// The current program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Whether instructions are evaluated on tick.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start or stop the processor. Any change returns every output to baseline.
    pub fn set_running(&mut self, running: bool) {
        if self.running == running {
            return;
        }
        self.running = running;
        for output in self.outputs.values_mut() {
            output.reset_to_baseline();
        }
        tracing::info!(running, "processor run state changed");
    }

    /// Readings gathered by the most recent tick.
    pub fn snapshot(&self) -> &HashMap<String, InputValue> {
        &self.snapshot
    }

    /// Registered output by name.
    pub fn output(&self, name: &str) -> Option<&dyn Actuator> {
        match self.outputs.get(name) {
            Some(output) => Some(output.as_ref()),
            None => None,
        }
    }

    /// All outputs in name order.
    pub fn outputs(&self) -> impl Iterator<Item = &dyn Actuator> + '_ {
        self.outputs.values().map(|output| output.as_ref() as &dyn Actuator)
    }

    /// Refresh sensor readings and, if running, evaluate every instruction.
    pub fn tick(&mut self) -> TickReport {
        self.refresh_inputs();

        let mut report = TickReport::default();
        if !self.running {
            return report;
        }

        let mut env = Environment {
            snapshot: &self.snapshot,
            outputs: &mut self.outputs,
        };
        for instruction in self.program.instructions_mut() {
            if instruction.is_skipped() {
                continue;
            }
            report.evaluated += 1;
            match instruction.step(&mut env) {
                Outcome::Fired(trigger) => {
                    report.fired += 1;
                    if trigger == Trigger::Edge {
                        report.realtime_requested = true;
                    }
                }
                Outcome::Idle => {}
            }
            if instruction.is_skipped() {
                report.disabled += 1;
            }
        }
        report
    }

    fn refresh_inputs(&mut self) {
        let mut snapshot = HashMap::with_capacity(self.sensors.len());
        for sensor in &self.sensors {
            if !sensor.is_available() {
                continue;
            }
            let reading = sensor.value().and_then(|value| {
                if value.value_type() == sensor.value_type() {
                    Ok(value)
                } else {
                    Err(SensorError::WrongType {
                        name: sensor.name().to_string(),
                        declared: sensor.value_type(),
                        found: value.value_type(),
                    })
                }
            });
            match reading {
                Ok(value) => {
                    snapshot.insert(sensor.name().to_string(), value);
                }
                Err(err) => {
                    tracing::warn!(sensor = sensor.name(), error = %err, "sensor read failed");
                }
            }
        }
        self.snapshot = snapshot;
    }

    /// Re-evaluate, then let every output apply its accumulated state.
    ///
    /// `dt` is the time in seconds since the previous control step. Does
    /// nothing while stopped.
    pub fn control_step(&mut self, dt: f64) -> TickReport {
        if !self.running {
            return TickReport::default();
        }
        let report = self.tick();
        let ctx = ControlContext { dt };
        for output in self.outputs.values_mut() {
            output.apply_and_reset(&ctx);
        }
        report
    }

    /// Persistable program state.
    pub fn save(&self) -> ProgramRecord {
        self.program.record()
    }

    /// Replace the program with a saved one.
    ///
    /// Each entry goes through the same checks as [`Self::add_instruction`];
    /// entries that no longer compile or fit are dropped. Returns the number
    /// of instructions loaded.
    pub fn load(&mut self, record: &ProgramRecord) -> usize {
        self.program.clear();
        for entry in &record.0 {
            let mut instruction = match self.compile(&entry.code) {
                Ok(instruction) => instruction,
                Err(err) => {
                    tracing::debug!(code = %entry.code, error = %err, "dropping saved instruction");
                    continue;
                }
            };
            instruction.restore_state(entry.edge_memory, entry.skip);
            if let Err(err) = self.program.push(instruction) {
                tracing::debug!(code = %entry.code, error = %err, "dropping saved instruction");
            }
        }
        self.program.len()
    }
}
