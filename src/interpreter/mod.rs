//! Scripting engine for processor programs.
//!
//! A program line goes through three stages: the [`lexer`] turns raw text
//! into classified tokens, the [`parser`] builds a class-driven prefix tree
//! out of them, and the [`eval`] module walks that tree every tick against
//! live sensor readings and the actuator registry.

/// Abstract syntax tree: token-labelled nodes with ordered children.
pub mod ast;
/// Tree-walking evaluator and trigger semantics.
pub mod eval;
/// Longest-match tokenizer with ambiguity rejection.
pub mod lexer;
/// Structural recursive-descent parser.
pub mod parser;
/// Runtime values of the script language.
pub mod value;

pub use ast::Node;
pub use eval::{EvalContext, Outcome, Trigger, evaluate, execute};
pub use lexer::{Lexer, Token, TokenClass, TokenRule, tokenize};
pub use parser::{compile, parse};
pub use value::{Value, ValueTag};

use std::fmt;
use thiserror::Error;

/// Errors raised while lexing or parsing a program line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// No token pattern matched at the given byte offset.
    #[error("no token matches `{rest}` at byte {position}")]
    NoMatch {
        /// Byte offset into the source line.
        position: usize,
        /// Unconsumed remainder of the line.
        rest: String,
    },

    /// The longest match would not advance the lexer.
    #[error("zero-length token at byte {position}")]
    EmptyMatch {
        /// Byte offset into the source line.
        position: usize,
    },

    /// Several token classes matched the same longest text.
    #[error("ambiguous token `{text}` at byte {position}: matches {classes:?}")]
    Ambiguous {
        /// Byte offset into the source line.
        position: usize,
        /// Text matched by every candidate.
        text: String,
        /// Distinct classes that tied.
        classes: Vec<TokenClass>,
    },

    /// Input ended while a node still needed children.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd {
        /// Description of the missing operand.
        expected: String,
    },

    /// A child node had a token class its parent does not accept.
    #[error("`{found}` cannot be used as {role} of `{parent}`")]
    Misplaced {
        /// Text of the parent token.
        parent: String,
        /// Which operand was wrong.
        role: String,
        /// Text of the rejected child token.
        found: String,
    },

    /// Tokens remained after the root production completed.
    #[error("unexpected trailing token `{0}`")]
    Trailing(String),

    /// Operators nested deeper than the parser allows.
    #[error("statement nests deeper than {limit} levels")]
    TooDeep {
        /// Maximum accepted depth.
        limit: usize,
    },

    /// The finished tree is not a trigger statement or comment.
    #[error("statement must start with ON, IF or a comment, found `{0}`")]
    BadRoot(String),
}

/// Which operand of an operator an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left (first) operand.
    Left,
    /// Right (second) operand.
    Right,
    /// Sole operand of a unary operator or trigger condition.
    Only,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
            Side::Only => f.write_str("sole"),
        }
    }
}

/// A value's runtime tag did not match what an operator required.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operand tag mismatch.
    #[error("`{op}` expected {expected} as {side} operand, found {found:?}")]
    TypeMismatch {
        /// Operator text.
        op: String,
        /// Offending operand.
        side: Side,
        /// Required tag.
        expected: ValueTag,
        /// Actual value.
        found: Value,
    },

    /// Numeric literal text could not be converted.
    #[error("invalid numeric literal `{0}`")]
    BadLiteral(String),

    /// Node shape the evaluator cannot interpret.
    #[error("cannot evaluate `{0}` here")]
    Unevaluable(String),
}

/// An actuator call named a missing target or verb, or had bad arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    /// Call target did not contain a `target.verb` separator.
    #[error("malformed call target `{0}`")]
    MalformedTarget(String),

    /// No output is registered under the name.
    #[error("no such output `{0}`")]
    NoSuchOutput(String),

    /// Verb unknown for the output, or arguments of wrong arity/type.
    #[error("cannot {verb} `{target}` with ({})", format_args_list(.args))]
    BadCall {
        /// Output name.
        target: String,
        /// Requested verb.
        verb: String,
        /// Flattened argument values.
        args: Vec<Value>,
    },
}

fn format_args_list(args: &[Value]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Any runtime failure that can escape an instruction's evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalFailure {
    /// Type error.
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// Actuator dispatch error.
    #[error(transparent)]
    Exec(#[from] ExecError),
}
