//! Processor configuration
//!
//! A processor part is defined by its instruction memory size and the
//! language features its hardware supports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::interpreter::{Node, TokenClass};

/// Language capability a processor may lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    /// `IF ... THEN` statements.
    LevelTrigger,
    /// `AND`, `OR` and `!`.
    LogicOps,
    /// `+ - * /`.
    ArithOps,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::LevelTrigger => f.write_str("level triggers"),
            Feature::LogicOps => f.write_str("logical operators"),
            Feature::ArithOps => f.write_str("arithmetic operators"),
        }
    }
}

/// Capability flags of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Supports `IF ... THEN`.
    pub level_trigger: bool,
    /// Supports `AND`, `OR`, `!`.
    pub logic_ops: bool,
    /// Supports arithmetic.
    pub arith_ops: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            level_trigger: true,
            logic_ops: true,
            arith_ops: true,
        }
    }
}

impl Features {
    /// Whether `feature` is enabled.
    pub fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::LevelTrigger => self.level_trigger,
            Feature::LogicOps => self.logic_ops,
            Feature::ArithOps => self.arith_ops,
        }
    }

    /// First feature used by `root` that these flags do not enable.
    pub fn first_missing(&self, root: &Node) -> Option<Feature> {
        root.tokens()
            .into_iter()
            .filter_map(|token| match token.class {
                TokenClass::Keyword if token.text == "IF" || token.text == "THEN" => {
                    Some(Feature::LevelTrigger)
                }
                TokenClass::LogicalOp | TokenClass::UnaryOp => Some(Feature::LogicOps),
                TokenClass::ArithmeticOp => Some(Feature::ArithOps),
                _ => None,
            })
            .find(|feature| !self.supports(*feature))
    }
}

/// Configuration for a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Instruction memory, in words (tokens)
    pub imem_words: usize,

    /// Supported language features
    pub features: Features,

    /// Whether the processor runs as soon as it is created
    pub start_running: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            imem_words: 64,
            features: Features::default(),
            start_running: true,
        }
    }
}

impl ProcessorConfig {
    /// Human-readable capability summary, one line per capability.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Instruction memory: {} words", self.imem_words),
            "Supports Edge-Triggers".to_string(),
        ];
        if self.features.level_trigger {
            lines.push("Supports Level-Triggers".to_string());
        }
        if self.features.logic_ops {
            lines.push("Supports Logical Ops".to_string());
        }
        if self.features.arith_ops {
            lines.push("Supports Arithmetic Ops".to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::compile;

    #[test]
    fn detects_missing_features() {
        let minimal = Features {
            level_trigger: false,
            logic_ops: false,
            arith_ops: false,
        };
        let edge = compile("ON < h 5 DO @ gear.assign true").unwrap();
        assert_eq!(minimal.first_missing(&edge), None);

        let level = compile("IF < h 5 THEN @ gear.assign true").unwrap();
        assert_eq!(minimal.first_missing(&level), Some(Feature::LevelTrigger));

        let logic = compile("ON ! gear DO @ gear.assign true").unwrap();
        assert_eq!(minimal.first_missing(&logic), Some(Feature::LogicOps));

        let arith = compile("ON < / s h 5 DO @ gear.assign true").unwrap();
        assert_eq!(minimal.first_missing(&arith), Some(Feature::ArithOps));
        assert_eq!(Features::default().first_missing(&arith), None);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: ProcessorConfig = serde_json::from_str(r#"{"imem_words": 12}"#).unwrap();
        assert_eq!(config.imem_words, 12);
        assert!(config.start_running);
        assert!(config.features.level_trigger);
    }

    #[test]
    fn describes_capabilities() {
        let config = ProcessorConfig {
            features: Features {
                level_trigger: false,
                ..Features::default()
            },
            ..ProcessorConfig::default()
        };
        let lines = config.describe();
        assert!(lines.contains(&"Supports Edge-Triggers".to_string()));
        assert!(!lines.contains(&"Supports Level-Triggers".to_string()));
    }
}
