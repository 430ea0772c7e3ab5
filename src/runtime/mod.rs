//! Processor runtime and public API
//!
//! This module owns everything around the scripting engine: the
//! word-budgeted program store, the tick/control-step cycle, the sensor and
//! actuator contracts, configuration, and persistence.

pub mod config;
pub mod error;
pub mod io;
pub mod processor;
pub mod program;
pub mod storage;

pub use config::{Feature, Features, ProcessorConfig};
pub use error::{ProgramError, StorageError, StorageResult};
pub use io::{
    Actuator, ControlContext, FnSensor, InputValue, NumericActuator, Quantized, Sensor,
    SensorError, SwitchActuator, ValueType,
};
pub use processor::{Processor, TickReport};
pub use program::{Instruction, InstructionRecord, Program, ProgramRecord, word_cost};
pub use storage::{SavedProgram, Storage};
