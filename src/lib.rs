//! KPU – a programmable flight processor
//!
//! Operators write short trigger scripts that are compiled once and then
//! re-evaluated every simulation tick against live sensor readings:
//! - Edge triggers (`ON cond DO action`) fire when `cond` becomes true
//! - Level triggers (`IF cond THEN action`) fire every tick `cond` holds
//! - Actions assign or slew named actuators (`@ throttle.increment 25`)
//! - Programs are bounded by a word budget and persist with their trigger state
//!
//! ```
//! use kpu::runtime::{Processor, ProcessorConfig, SwitchActuator};
//!
//! let mut processor = Processor::new(ProcessorConfig::default());
//! processor.add_output(SwitchActuator::new("gear"));
//! processor.add_instruction("ON true DO @ gear.assign true").unwrap();
//! processor.tick();
//! assert_eq!(processor.output("gear").unwrap().value().to_string(), "1");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Lexer, parser and evaluator for processor scripts
pub mod interpreter;
/// Processor runtime: program store, tick cycle, providers, persistence
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{Processor, ProcessorConfig};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
