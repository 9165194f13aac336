use super::ast::{BinaryOp, Expr, LogicalOp, TemplateSegment, UnaryOp};
use super::builtins;
use crate::value::{Value, format_number};
use crate::{Error, Result};

const RED_ZONE: usize = 32 * 1024;
const STACK_CHUNK: usize = 1024 * 1024;

/// Variables visible to an expression. Nothing outside the scope (apart
/// from the whitelisted builtins) can be reached.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: Vec<(String, Value)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some((_, existing)) = self.vars.iter_mut().find(|(key, _)| *key == name) {
            *existing = value;
        } else {
            self.vars.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Evaluates a parsed expression against `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value> {
    stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || eval_expr(expr, scope))
}

fn eval_expr(expr: &Expr, scope: &Scope) -> Result<Value> {
    match expr {
        Expr::Number(value) => Ok(Value::Number(*value)),
        Expr::String(value) => Ok(Value::String(value.clone())),
        Expr::Bool(value) => Ok(Value::Bool(*value)),
        Expr::Null => Ok(Value::Null),
        Expr::Undefined => Ok(Value::Undefined),
        Expr::Template(segments) => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    TemplateSegment::Text(text) => out.push_str(text),
                    TemplateSegment::Expr(inner) => {
                        out.push_str(&evaluate(inner, scope)?.as_string());
                    }
                }
            }
            Ok(Value::String(out))
        }
        Expr::Ident(name) => lookup_identifier(name, scope),
        Expr::Array(items) => {
            let items = items
                .iter()
                .map(|item| evaluate(item, scope))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::array(items))
        }
        Expr::Object(entries) => {
            let mut evaluated = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                evaluated.push((key.clone(), evaluate(value, scope)?));
            }
            Ok(Value::object(evaluated))
        }
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let target = evaluate(object, scope)?;
            if *optional && target.is_nullish() {
                return Ok(Value::Undefined);
            }
            read_property(&target, property)
        }
        Expr::Index {
            object,
            index,
            optional,
        } => {
            let target = evaluate(object, scope)?;
            if *optional && target.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key = property_key(&evaluate(index, scope)?);
            read_property(&target, &key)
        }
        Expr::Call {
            callee,
            args,
            optional,
        } => eval_call(callee, args, *optional, scope),
        Expr::Unary { op, operand } => eval_unary(*op, operand, scope),
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            Ok(eval_binary(*op, &left, &right))
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate(left, scope)?;
            let short_circuit = match op {
                LogicalOp::And => !left.truthy(),
                LogicalOp::Or => left.truthy(),
                LogicalOp::Nullish => !left.is_nullish(),
            };
            if short_circuit {
                Ok(left)
            } else {
                evaluate(right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, scope)?.truthy() {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        Expr::Assign { target, value } => {
            let value = evaluate(value, scope)?;
            let (object, key) = match target.as_ref() {
                Expr::Member {
                    object, property, ..
                } => (evaluate(object, scope)?, property.clone()),
                Expr::Index { object, index, .. } => (
                    evaluate(object, scope)?,
                    property_key(&evaluate(index, scope)?),
                ),
                _ => {
                    return Err(Error::ExpressionRuntime(
                        "invalid assignment target".into(),
                    ));
                }
            };
            object.set(&key, value.clone())?;
            Ok(value)
        }
        Expr::Sequence(items) => {
            let mut last = Value::Undefined;
            for item in items {
                last = evaluate(item, scope)?;
            }
            Ok(last)
        }
    }
}

fn lookup_identifier(name: &str, scope: &Scope) -> Result<Value> {
    if let Some(value) = scope.get(name) {
        return Ok(value.clone());
    }
    match name {
        "NaN" => Ok(Value::Number(f64::NAN)),
        "Infinity" => Ok(Value::Number(f64::INFINITY)),
        _ if builtins::is_namespace(name) || builtins::is_global_function(name) => Err(
            Error::ExpressionRuntime(format!("{name} can only be used in a call")),
        ),
        _ => Err(Error::ExpressionRuntime(format!("{name} is not defined"))),
    }
}

fn read_property(target: &Value, key: &str) -> Result<Value> {
    if target.is_nullish() {
        return Err(Error::ExpressionRuntime(format!(
            "cannot read properties of {} (reading '{key}')",
            target.as_string()
        )));
    }
    Ok(target.get(key))
}

fn property_key(value: &Value) -> String {
    match value {
        Value::Number(number) => format_number(*number),
        other => other.as_string(),
    }
}

fn eval_args(args: &[Expr], scope: &Scope) -> Result<Vec<Value>> {
    args.iter().map(|arg| evaluate(arg, scope)).collect()
}

fn eval_call(callee: &Expr, args: &[Expr], optional: bool, scope: &Scope) -> Result<Value> {
    match callee {
        Expr::Member {
            object,
            property,
            optional: member_optional,
        } => {
            if let Expr::Ident(namespace) = object.as_ref() {
                if !scope.contains(namespace) && builtins::is_namespace(namespace) {
                    let args = eval_args(args, scope)?;
                    return builtins::call_namespace(namespace, property, &args);
                }
            }
            let receiver = evaluate(object, scope)?;
            if receiver.is_nullish() {
                if *member_optional || optional {
                    return Ok(Value::Undefined);
                }
                return Err(Error::ExpressionRuntime(format!(
                    "cannot read properties of {} (reading '{property}')",
                    receiver.as_string()
                )));
            }
            let args = eval_args(args, scope)?;
            builtins::call_method(&receiver, property, &args)
        }
        Expr::Ident(name) if !scope.contains(name) => {
            let args = eval_args(args, scope)?;
            builtins::call_global(name, &args)
        }
        _ => Err(Error::ExpressionRuntime("expression is not callable".into())),
    }
}

fn eval_unary(op: UnaryOp, operand: &Expr, scope: &Scope) -> Result<Value> {
    if op == UnaryOp::TypeOf {
        if let Expr::Ident(name) = operand {
            if !scope.contains(name) && lookup_identifier(name, scope).is_err() {
                return Ok(Value::String("undefined".into()));
            }
        }
    }
    let value = evaluate(operand, scope)?;
    Ok(match op {
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::Neg => Value::Number(-value.as_number()),
        UnaryOp::Plus => Value::Number(value.as_number()),
        UnaryOp::TypeOf => Value::String(value.type_of().into()),
    })
}

fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add_values(left, right),
        BinaryOp::Sub => Value::Number(left.as_number() - right.as_number()),
        BinaryOp::Mul => Value::Number(left.as_number() * right.as_number()),
        BinaryOp::Div => Value::Number(left.as_number() / right.as_number()),
        BinaryOp::Rem => Value::Number(left.as_number() % right.as_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right, |l, r| l < r, |l, r| l < r)),
        BinaryOp::Gt => Value::Bool(compare(left, right, |l, r| l > r, |l, r| l > r)),
        BinaryOp::Le => Value::Bool(compare(left, right, |l, r| l <= r, |l, r| l <= r)),
        BinaryOp::Ge => Value::Bool(compare(left, right, |l, r| l >= r, |l, r| l >= r)),
        BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
    }
}

fn add_values(left: &Value, right: &Value) -> Value {
    let stringy = |value: &Value| {
        matches!(
            value,
            Value::String(_) | Value::Array(_) | Value::Object(_)
        )
    };
    if stringy(left) || stringy(right) {
        return Value::String(format!("{}{}", left.as_string(), right.as_string()));
    }
    Value::Number(left.as_number() + right.as_number())
}

fn compare<N, S>(left: &Value, right: &Value, numeric: N, textual: S) -> bool
where
    N: Fn(f64, f64) -> bool,
    S: Fn(&str, &str) -> bool,
{
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return textual(l, r);
    }
    let (l, r) = (left.as_number(), right.as_number());
    if l.is_nan() || r.is_nan() {
        return false;
    }
    numeric(l, r)
}
