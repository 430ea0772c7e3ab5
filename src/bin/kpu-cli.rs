//! KPU CLI - Command-line interface for the processor runtime
//!
//! Provides subcommands for configuring a processor, checking scripts,
//! replaying sensor traces against a program, and persisting programs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kpu::runtime::{
    Features, FnSensor, InputValue, NumericActuator, Processor, ProcessorConfig, SensorError,
    Storage, SwitchActuator, ValueType,
};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "kpu")]
#[command(about = "Programmable flight processor scripting engine", long_about = None)]
struct Cli {
    /// Root directory for processor storage
    #[arg(short, long, default_value = ".kpu")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a processor configuration
    Init {
        /// Instruction memory in words
        #[arg(long, default_value = "64")]
        imem_words: usize,

        /// Disable IF ... THEN statements
        #[arg(long)]
        no_level_trigger: bool,

        /// Disable AND, OR and !
        #[arg(long)]
        no_logic_ops: bool,

        /// Disable arithmetic operators
        #[arg(long)]
        no_arith_ops: bool,
    },

    /// Describe the configured processor
    Info,

    /// Compile a script and report word usage
    Check {
        /// Script file, one instruction per line
        script: PathBuf,
    },

    /// Replay a sensor trace against a script
    Run {
        /// Script file, one instruction per line
        script: PathBuf,

        /// JSON trace with output declarations and sensor frames
        #[arg(long)]
        trace: PathBuf,

        /// Ticks between control steps
        #[arg(long, default_value = "1")]
        control_every: usize,

        /// Seconds per tick
        #[arg(long, default_value = "0.1")]
        dt: f64,
    },

    /// Compile a script and store it as the processor's program
    Save {
        /// Script file, one instruction per line
        script: PathBuf,
    },

    /// Print the stored program
    Show,
}

/// Output declared by a trace file.
#[derive(Deserialize)]
struct OutputSpec {
    name: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    min: Option<f64>,
    max: Option<f64>,
    baseline: Option<InputValue>,
}

#[derive(Deserialize)]
struct Trace {
    #[serde(default)]
    outputs: Vec<OutputSpec>,
    frames: Vec<HashMap<String, InputValue>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(cli.root.clone());

    match cli.command {
        Commands::Init {
            imem_words,
            no_level_trigger,
            no_logic_ops,
            no_arith_ops,
        } => {
            let config = ProcessorConfig {
                imem_words,
                features: Features {
                    level_trigger: !no_level_trigger,
                    logic_ops: !no_logic_ops,
                    arith_ops: !no_arith_ops,
                },
                ..ProcessorConfig::default()
            };
            storage.init().context("Failed to create storage root")?;
            storage.write_config(&config).context("Failed to write config")?;
            println!("Initialized processor at {:?}", cli.root);
        }

        Commands::Info => {
            let config = storage.load_config().context("Failed to load config")?;
            for line in config.describe() {
                println!("{line}");
            }
        }

        Commands::Check { script } => {
            let processor = load_script(&storage, &script)?;
            let program = processor.program();
            for instruction in program.instructions() {
                println!("{:>3}  {}", instruction.words(), instruction.code());
            }
            println!(
                "{} instructions, {}/{} words free",
                program.len(),
                program.remaining_words(),
                program.total_words()
            );
        }

        Commands::Run {
            script,
            trace,
            control_every,
            dt,
        } => {
            let mut processor = load_script(&storage, &script)?;
            let data = std::fs::read(&trace)
                .with_context(|| format!("Failed to read trace: {:?}", trace))?;
            let trace: Trace =
                serde_json::from_slice(&data).context("Failed to parse trace")?;
            replay(&mut processor, trace, control_every.max(1), dt)?;
        }

        Commands::Save { script } => {
            let processor = load_script(&storage, &script)?;
            storage.init().context("Failed to create storage root")?;
            let saved = storage
                .save_program(processor.save())
                .context("Failed to save program")?;
            println!(
                "Saved {} instructions ({})",
                saved.instruction_count, saved.checksum
            );
        }

        Commands::Show => {
            let config = storage.load_config().context("Failed to load config")?;
            let record = storage.load_program().context("Failed to load program")?;
            let mut processor = Processor::new(config);
            let loaded = processor.load(&record);
            for instruction in processor.program().instructions() {
                let flags = match (instruction.is_skipped(), instruction.edge_memory()) {
                    (true, _) => "skip",
                    (false, true) => "high",
                    (false, false) => "",
                };
                println!("{:<5} {}", flags, instruction.code());
            }
            if loaded < record.0.len() {
                println!("{} stored instructions no longer compile", record.0.len() - loaded);
            }
        }
    }

    Ok(())
}

fn load_script(storage: &Storage, path: &Path) -> Result<Processor> {
    let config = storage.load_config().context("Failed to load config")?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {:?}", path))?;

    let mut processor = Processor::new(config);
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if let Err(err) = processor.add_instruction(line) {
            bail!("line {}: {}", index + 1, err);
        }
    }
    Ok(processor)
}

fn check_output(spec: &OutputSpec) -> Result<()> {
    if let (Some(min), Some(max)) = (spec.min, spec.max) {
        if min > max {
            bail!("output `{}`: min {} exceeds max {}", spec.name, min, max);
        }
    }
    if let Some(baseline) = spec.baseline {
        if baseline.value_type() != spec.value_type {
            bail!(
                "output `{}`: baseline {} does not match declared type {:?}",
                spec.name,
                baseline,
                spec.value_type
            );
        }
    }
    Ok(())
}

fn replay(processor: &mut Processor, trace: Trace, control_every: usize, dt: f64) -> Result<()> {
    let frame: Rc<RefCell<HashMap<String, InputValue>>> = Rc::default();

    let mut sensor_types: BTreeMap<String, ValueType> = BTreeMap::new();
    for values in &trace.frames {
        for (name, value) in values {
            sensor_types
                .entry(name.clone())
                .or_insert_with(|| value.value_type());
        }
    }
    for (name, value_type) in sensor_types {
        let read_frame = frame.clone();
        let read_name = name.clone();
        let avail_frame = frame.clone();
        let avail_name = name.clone();
        processor.add_sensor(
            FnSensor::new(name, value_type, move || {
                read_frame
                    .borrow()
                    .get(&read_name)
                    .copied()
                    .ok_or_else(|| SensorError::NoReading(read_name.clone()))
            })
            .with_availability(move || avail_frame.borrow().contains_key(&avail_name)),
        );
    }

    for spec in trace.outputs {
        check_output(&spec)?;
        match spec.value_type {
            ValueType::Number => {
                let mut output = NumericActuator::new(spec.name).with_range(
                    spec.min.unwrap_or(f64::NEG_INFINITY),
                    spec.max.unwrap_or(f64::INFINITY),
                );
                if let Some(InputValue::Number(baseline)) = spec.baseline {
                    output = output.with_baseline(baseline);
                }
                processor.add_output(output);
            }
            ValueType::Boolean => {
                let mut output = SwitchActuator::new(spec.name);
                if let Some(InputValue::Boolean(baseline)) = spec.baseline {
                    output = output.with_baseline(baseline);
                }
                processor.add_output(output);
            }
        }
    }

    let step_dt = dt * control_every as f64;
    for (index, values) in trace.frames.into_iter().enumerate() {
        *frame.borrow_mut() = values;
        let report = if (index + 1) % control_every == 0 {
            processor.control_step(step_dt)
        } else {
            processor.tick()
        };

        let outputs: Vec<String> = processor
            .outputs()
            .map(|output| format!("{}={}", output.name(), output.value()))
            .collect();
        println!(
            "tick {:>4}  fired {}  {}{}",
            index,
            report.fired,
            outputs.join(" "),
            if report.realtime_requested { "  [realtime]" } else { "" }
        );
    }

    let disabled = processor
        .program()
        .instructions()
        .iter()
        .filter(|instruction| instruction.is_skipped())
        .count();
    if disabled > 0 {
        println!("{disabled} instructions disabled by runtime errors");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(json: &str) -> OutputSpec {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn inverted_output_range_is_an_error() {
        let spec = output(r#"{"name": "throttle", "type": "number", "min": 100, "max": 0}"#);
        let err = check_output(&spec).unwrap_err();
        assert!(err.to_string().contains("min 100 exceeds max 0"));
    }

    #[test]
    fn baseline_must_match_type() {
        let spec = output(r#"{"name": "gear", "type": "boolean", "baseline": 5}"#);
        assert!(check_output(&spec).is_err());

        let spec = output(
            r#"{"name": "throttle", "type": "number", "min": 0, "max": 100, "baseline": 5}"#,
        );
        assert!(check_output(&spec).is_ok());
    }
}
