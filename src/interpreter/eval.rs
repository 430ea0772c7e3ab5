use crate::runtime::io::{Actuator, InputValue, ValueType};

use super::ast::Node;
use super::lexer::TokenClass;
use super::value::{Value, ValueTag};
use super::{EvalError, EvalFailure, ExecError, Side};

/// What the evaluator can see of the world during one tick.
pub trait EvalContext {
    /// Reading of a sensor in the current snapshot, if it was available.
    fn input(&self, name: &str) -> Option<InputValue>;

    /// Registered output with the given name.
    fn output(&mut self, name: &str) -> Option<&mut dyn Actuator>;
}

/// Which kind of trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `ON ... DO`, fires on a false-to-true transition.
    Edge,
    /// `IF ... THEN`, fires every tick the condition holds.
    Level,
}

/// Result of running one statement for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing fired.
    Idle,
    /// The action ran (for edge triggers, possibly with a logged failure).
    Fired(Trigger),
}

/// Run a statement root for one tick.
///
/// `edge_memory` is the condition value seen on the previous tick; it is
/// rewritten on every evaluation of an edge trigger whether or not it fires.
/// Failures inside a fired edge action are logged and swallowed; every other
/// failure is returned to the caller.
pub fn execute<C>(
    root: &Node,
    edge_memory: &mut bool,
    ctx: &mut C,
) -> Result<Outcome, EvalFailure>
where
    C: EvalContext + ?Sized,
{
    match root.class() {
        TokenClass::Comment => Ok(Outcome::Idle),
        TokenClass::Keyword if root.is_keyword("ON") => {
            let (condition, action) = trigger_parts(root)?;
            let now = expect_boolean(root, Side::Only, evaluate(condition, ctx)?)?;
            let fire = now && !*edge_memory;
            *edge_memory = now;
            if !fire {
                return Ok(Outcome::Idle);
            }
            if let Err(err) = evaluate(action, ctx) {
                tracing::warn!(statement = %root, error = %err, "edge action failed");
            }
            Ok(Outcome::Fired(Trigger::Edge))
        }
        TokenClass::Keyword if root.is_keyword("IF") => {
            let (condition, action) = trigger_parts(root)?;
            if expect_boolean(root, Side::Only, evaluate(condition, ctx)?)? {
                evaluate(action, ctx)?;
                Ok(Outcome::Fired(Trigger::Level))
            } else {
                Ok(Outcome::Idle)
            }
        }
        _ => Err(EvalError::Unevaluable(root.text().to_string()).into()),
    }
}

fn trigger_parts(root: &Node) -> Result<(&Node, &Node), EvalError> {
    match root.children() {
        [condition, action] => Ok((condition, action)),
        _ => Err(EvalError::Unevaluable(root.to_string())),
    }
}

/// Evaluate an expression or action subtree.
pub fn evaluate<C>(node: &Node, ctx: &mut C) -> Result<Value, EvalFailure>
where
    C: EvalContext + ?Sized,
{
    match (node.class(), node.children()) {
        (TokenClass::ArithmeticOp, [left, right]) => {
            let a = expect_number(node, Side::Left, evaluate(left, ctx)?)?;
            let b = expect_number(node, Side::Right, evaluate(right, ctx)?)?;
            let result = match node.text() {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                "/" => a / b,
                other => return Err(EvalError::Unevaluable(other.to_string()).into()),
            };
            Ok(Value::Number(result))
        }
        (TokenClass::ComparisonOp, [left, right]) => {
            let a = expect_number(node, Side::Left, evaluate(left, ctx)?)?;
            let b = expect_number(node, Side::Right, evaluate(right, ctx)?)?;
            match node.text() {
                "<" => Ok(Value::Boolean(a < b)),
                ">" => Ok(Value::Boolean(a > b)),
                other => Err(EvalError::Unevaluable(other.to_string()).into()),
            }
        }
        (TokenClass::LogicalOp, [left, right]) => {
            let a = expect_boolean(node, Side::Left, evaluate(left, ctx)?)?;
            let b = expect_boolean(node, Side::Right, evaluate(right, ctx)?)?;
            match node.text() {
                "AND" => Ok(Value::Boolean(a && b)),
                "OR" => Ok(Value::Boolean(a || b)),
                other => Err(EvalError::Unevaluable(other.to_string()).into()),
            }
        }
        (TokenClass::UnaryOp, [operand]) => {
            let flag = expect_boolean(node, Side::Only, evaluate(operand, ctx)?)?;
            Ok(Value::Boolean(!flag))
        }
        (TokenClass::SequenceSeparator, [first, second]) => {
            evaluate(first, ctx)?;
            evaluate(second, ctx)?;
            Ok(Value::Void)
        }
        (TokenClass::ListSeparator, [left, right]) => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            Ok(Value::pair(left, right))
        }
        (TokenClass::Call, [target, argument]) => call(node, target, argument, ctx),
        (TokenClass::Keyword, [body]) => {
            evaluate(body, ctx)?;
            Ok(Value::Void)
        }
        (TokenClass::Identifier, []) => Ok(match node.text() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            name => ctx
                .input(name)
                .map(Value::from)
                .unwrap_or_else(|| Value::Name(name.to_string())),
        }),
        (TokenClass::Literal, []) => node
            .text()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| EvalError::BadLiteral(node.text().to_string()).into()),
        (TokenClass::Comment, []) => Ok(Value::Void),
        _ => Err(EvalError::Unevaluable(node.text().to_string()).into()),
    }
}

fn call<C>(node: &Node, target: &Node, argument: &Node, ctx: &mut C) -> Result<Value, EvalFailure>
where
    C: EvalContext + ?Sized,
{
    let name = match evaluate(target, ctx)? {
        Value::Name(name) => name,
        other => {
            return Err(EvalError::TypeMismatch {
                op: node.text().to_string(),
                side: Side::Left,
                expected: ValueTag::Name,
                found: other,
            }
            .into());
        }
    };
    let (target, verb) = name
        .rsplit_once('.')
        .ok_or_else(|| ExecError::MalformedTarget(name.clone()))?;
    let args = evaluate(argument, ctx)?.flatten();

    let output = ctx
        .output(target)
        .ok_or_else(|| ExecError::NoSuchOutput(target.to_string()))?;
    let bad_call = || ExecError::BadCall {
        target: target.to_string(),
        verb: verb.to_string(),
        args: args.clone(),
    };

    match (verb, args.as_slice()) {
        ("assign", [value]) => {
            let value = value
                .to_input()
                .filter(|value| value.value_type() == output.value_type())
                .ok_or_else(bad_call)?;
            output.assign(value);
        }
        ("increment" | "decrement", [Value::Number(rate)])
            if output.value_type() == ValueType::Number =>
        {
            let rate = if verb == "decrement" { -rate } else { *rate };
            output.slew(rate);
        }
        _ => return Err(bad_call().into()),
    }
    Ok(Value::Void)
}

fn expect_number(op: &Node, side: Side, value: Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(num) => Ok(num),
        found => Err(EvalError::TypeMismatch {
            op: op.text().to_string(),
            side,
            expected: ValueTag::Number,
            found,
        }),
    }
}

fn expect_boolean(op: &Node, side: Side, value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(flag) => Ok(flag),
        found => Err(EvalError::TypeMismatch {
            op: op.text().to_string(),
            side,
            expected: ValueTag::Boolean,
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::compile;
    use crate::runtime::io::{NumericActuator, SwitchActuator};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Default)]
    struct Harness {
        inputs: HashMap<String, InputValue>,
        outputs: BTreeMap<String, Box<dyn Actuator>>,
    }

    impl Harness {
        fn with_outputs() -> Self {
            let mut harness = Harness::default();
            harness.outputs.insert(
                "throttle".into(),
                Box::new(NumericActuator::new("throttle").with_range(0.0, 100.0)),
            );
            harness
                .outputs
                .insert("gear".into(), Box::new(SwitchActuator::new("gear")));
            harness
        }

        fn set(&mut self, name: &str, value: InputValue) {
            self.inputs.insert(name.to_string(), value);
        }

        fn value_of(&self, name: &str) -> InputValue {
            self.outputs[name].value()
        }

        fn pending_of(&self, name: &str) -> f64 {
            self.outputs[name].pending()
        }
    }

    impl EvalContext for Harness {
        fn input(&self, name: &str) -> Option<InputValue> {
            self.inputs.get(name).copied()
        }

        fn output(&mut self, name: &str) -> Option<&mut dyn Actuator> {
            match self.outputs.get_mut(name) {
                Some(output) => Some(output.as_mut()),
                None => None,
            }
        }
    }

    fn eval_condition(src: &str, harness: &mut Harness) -> Result<Value, EvalFailure> {
        let root = compile(src).expect("parse");
        evaluate(root.child(0).unwrap(), harness)
    }

    #[test]
    fn arithmetic_and_comparison() {
        let mut harness = Harness::default();
        harness.set("srfSpeed", InputValue::Number(40.0));
        harness.set("srfHeight", InputValue::Number(2.0));
        let value = eval_condition(
            "IF > / srfSpeed srfHeight 16 THEN @ a.assign 1",
            &mut harness,
        )
        .unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn division_by_zero_is_infinite() {
        let mut harness = Harness::default();
        harness.set("h", InputValue::Number(0.0));
        let value = eval_condition("IF > / 1 h 1000 THEN @ a.assign 1", &mut harness).unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn logical_ops_require_booleans() {
        let mut harness = Harness::default();
        harness.set("gear", InputValue::Boolean(false));
        assert_eq!(
            eval_condition("IF OR gear ! false THEN @ a.assign 1", &mut harness).unwrap(),
            Value::Boolean(true)
        );

        let err = eval_condition("IF AND gear 1 THEN @ a.assign 1", &mut harness).unwrap_err();
        assert_eq!(
            err,
            EvalFailure::Eval(EvalError::TypeMismatch {
                op: "AND".into(),
                side: Side::Right,
                expected: ValueTag::Boolean,
                found: Value::Number(1.0),
            })
        );
    }

    #[test]
    fn unknown_identifier_is_a_name() {
        let mut harness = Harness::default();
        let err = eval_condition("IF < srfRetrograde 5 THEN @ a.assign 1", &mut harness)
            .unwrap_err();
        assert!(matches!(
            err,
            EvalFailure::Eval(EvalError::TypeMismatch {
                side: Side::Left,
                found: Value::Name(_),
                ..
            })
        ));
    }

    #[test]
    fn assign_and_slew_reach_outputs() {
        let mut harness = Harness::with_outputs();
        let root = compile(
            "IF true THEN ; ; @ gear.assign true @ throttle.increment 25 @ throttle.decrement 5",
        )
        .unwrap();
        let mut memory = false;
        let outcome = execute(&root, &mut memory, &mut harness).unwrap();
        assert_eq!(outcome, Outcome::Fired(Trigger::Level));
        assert_eq!(harness.value_of("gear"), InputValue::Boolean(true));
        assert_eq!(harness.pending_of("throttle"), 20.0);
        assert_eq!(harness.value_of("throttle"), InputValue::Number(0.0));
    }

    #[test]
    fn call_errors_are_exec_errors() {
        let mut harness = Harness::with_outputs();
        let mut memory = false;

        let root = compile("IF true THEN @ flaps.assign 1").unwrap();
        assert_eq!(
            execute(&root, &mut memory, &mut harness).unwrap_err(),
            EvalFailure::Exec(ExecError::NoSuchOutput("flaps".into()))
        );

        let root = compile("IF true THEN @ gear.increment 1").unwrap();
        assert!(matches!(
            execute(&root, &mut memory, &mut harness).unwrap_err(),
            EvalFailure::Exec(ExecError::BadCall { .. })
        ));

        let root = compile("IF true THEN @ throttle.increment , 1 2").unwrap();
        let err = execute(&root, &mut memory, &mut harness).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot increment `throttle` with (1, 2)"
        );

        let root = compile("IF true THEN @ throttle.assign true").unwrap();
        assert!(execute(&root, &mut memory, &mut harness).is_err());

        let root = compile("IF true THEN @ throttle true").unwrap();
        assert_eq!(
            execute(&root, &mut memory, &mut harness).unwrap_err(),
            EvalFailure::Exec(ExecError::MalformedTarget("throttle".into()))
        );
    }

    #[test]
    fn edge_trigger_fires_on_rising_edge_only() {
        let mut harness = Harness::with_outputs();
        let root = compile("ON armed DO @ throttle.increment 1").unwrap();
        let mut memory = false;
        let mut fired = Vec::new();
        for (tick, armed) in [false, true, true, false, true].into_iter().enumerate() {
            harness.set("armed", InputValue::Boolean(armed));
            if execute(&root, &mut memory, &mut harness).unwrap() != Outcome::Idle {
                fired.push(tick);
            }
            assert_eq!(memory, armed);
        }
        assert_eq!(fired, vec![1, 4]);
    }

    #[test]
    fn edge_action_failure_is_swallowed() {
        let mut harness = Harness::with_outputs();
        let root = compile("ON true DO @ missing.assign 1").unwrap();
        let mut memory = false;
        assert_eq!(
            execute(&root, &mut memory, &mut harness).unwrap(),
            Outcome::Fired(Trigger::Edge)
        );
        assert!(memory);
    }

    #[test]
    fn condition_must_be_boolean() {
        let mut harness = Harness::with_outputs();
        let root = compile("ON 5 DO @ gear.assign true").unwrap();
        let mut memory = false;
        assert!(matches!(
            execute(&root, &mut memory, &mut harness),
            Err(EvalFailure::Eval(EvalError::TypeMismatch {
                expected: ValueTag::Boolean,
                ..
            }))
        ));
    }
}
