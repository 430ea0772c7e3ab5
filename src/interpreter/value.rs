use serde::{Deserialize, Serialize};
use std::fmt;

use crate::runtime::io::InputValue;

/// Runtime value of the script language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Truth value.
    Boolean(bool),
    /// Real number.
    Number(f64),
    /// Bare identifier that did not resolve to a sensor reading.
    Name(String),
    /// Cons cell built by the list separator.
    Pair(Box<Value>, Box<Value>),
    /// Result of actions and sequences.
    Void,
}

/// Tag of a [`Value`], used in type errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueTag {
    /// [`Value::Boolean`].
    Boolean,
    /// [`Value::Number`].
    Number,
    /// [`Value::Name`].
    Name,
    /// [`Value::Pair`].
    Pair,
    /// [`Value::Void`].
    Void,
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueTag::Boolean => "Boolean",
            ValueTag::Number => "Number",
            ValueTag::Name => "Name",
            ValueTag::Pair => "Pair",
            ValueTag::Void => "Void",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Build a pair cell.
    pub fn pair(left: Value, right: Value) -> Self {
        Value::Pair(Box::new(left), Box::new(right))
    }

    /// Tag of this value.
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Boolean(_) => ValueTag::Boolean,
            Value::Number(_) => ValueTag::Number,
            Value::Name(_) => ValueTag::Name,
            Value::Pair(..) => ValueTag::Pair,
            Value::Void => ValueTag::Void,
        }
    }

    /// Expand nested pairs, left to right, into a flat list of non-pair values.
    pub fn flatten(self) -> Vec<Value> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<Value>) {
        match self {
            Value::Pair(left, right) => {
                left.flatten_into(out);
                right.flatten_into(out);
            }
            other => out.push(other),
        }
    }

    /// Convert to a sensor/actuator reading, if the tag allows it.
    pub fn to_input(&self) -> Option<InputValue> {
        match self {
            Value::Boolean(flag) => Some(InputValue::Boolean(*flag)),
            Value::Number(num) => Some(InputValue::Number(*num)),
            _ => None,
        }
    }
}

impl From<InputValue> for Value {
    fn from(value: InputValue) -> Self {
        match value {
            InputValue::Boolean(flag) => Value::Boolean(flag),
            InputValue::Number(num) => Value::Number(num),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(flag) => write!(f, "{flag}"),
            Value::Number(num) => write!(f, "{num}"),
            Value::Name(name) => f.write_str(name),
            Value::Pair(left, right) => write!(f, "({left}, {right})"),
            Value::Void => f.write_str("void"),
        }
    }
}
