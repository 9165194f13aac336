use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::expr::{self, Scope};
use crate::{Error, Result};

/// Dynamic host data visible to binding expressions.
///
/// Arrays and objects are shared: cloning a `Value` clones the handle, so a
/// `$item` taken out of a model array aliases the entry it came from and
/// writes through it land in the model.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectValue>>),
}

#[derive(Debug, Clone, Default)]
pub struct ObjectValue {
    entries: Vec<(String, Value)>,
    index_by_key: HashMap<String, usize>,
}

impl ObjectValue {
    pub(crate) fn new(entries: Vec<(String, Value)>) -> Self {
        let mut value = Self::default();
        for (key, entry_value) in entries {
            value.set_entry(key, entry_value);
        }
        value
    }

    pub(crate) fn set_entry(&mut self, key: String, value: Value) {
        if let Some(index) = self.index_by_key.get(&key).copied() {
            if let Some((_, existing)) = self.entries.get_mut(index) {
                *existing = value;
                return;
            }
        }
        let index = self.entries.len();
        self.entries.push((key.clone(), value));
        self.index_by_key.insert(key, index);
    }

    pub(crate) fn get_entry(&self, key: &str) -> Option<Value> {
        self.index_by_key
            .get(key)
            .and_then(|index| self.entries.get(*index))
            .map(|(_, value)| value.clone())
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        Self::Object(Rc::new(RefCell::new(ObjectValue::new(entries))))
    }

    pub fn empty_object() -> Self {
        Self::Object(Rc::new(RefCell::new(ObjectValue::default())))
    }

    /// Builds a value from an expression literal such as
    /// `{ items: [{ name: "a" }], count: 2 }`. No scope variables are
    /// visible to the literal.
    pub fn from_literal(src: &str) -> Result<Self> {
        let parsed = expr::parse_expression(src)?;
        expr::evaluate(&parsed, &Scope::new())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(v) => *v,
            Self::Number(v) => *v != 0.0 && !v.is_nan(),
            Self::String(v) => !v.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// String form used when a value reaches the view. `undefined` and
    /// `null` render as the empty string.
    pub fn display_string(&self) -> String {
        match self {
            Self::Undefined | Self::Null => String::new(),
            other => other.as_string(),
        }
    }

    /// Script-style string conversion (`String(value)`).
    pub fn as_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(v) => {
                if *v {
                    "true".into()
                } else {
                    "false".into()
                }
            }
            Self::Number(v) => format_number(*v),
            Self::String(v) => v.clone(),
            Self::Array(items) => items
                .borrow()
                .iter()
                .map(Value::display_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".into(),
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(v) => *v,
            Self::String(v) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Self::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.as_number(),
                    _ => f64::NAN,
                }
            }
            Self::Object(_) => f64::NAN,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    /// Reads a property. Missing properties and primitive receivers yield
    /// `undefined`; `length` is answered for strings and arrays.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Self::Object(object) => object.borrow().get_entry(key).unwrap_or_default(),
            Self::Array(items) => {
                let items = items.borrow();
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index).cloned())
                    .unwrap_or_default()
            }
            Self::String(text) if key == "length" => {
                Value::Number(text.chars().count() as f64)
            }
            _ => Value::Undefined,
        }
    }

    pub fn at(&self, index: usize) -> Value {
        match self {
            Self::Array(items) => items.borrow().get(index).cloned().unwrap_or_default(),
            Self::String(text) => text
                .chars()
                .nth(index)
                .map(|ch| Value::String(ch.to_string()))
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Writes a property on an object or an index on an array.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        match self {
            Self::Object(object) => {
                object.borrow_mut().set_entry(key.to_string(), value);
                Ok(())
            }
            Self::Array(items) => {
                let index = key.parse::<usize>().map_err(|_| {
                    Error::ExpressionRuntime(format!("invalid array index: {key}"))
                })?;
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            }
            other => Err(Error::ExpressionRuntime(format!(
                "cannot set property '{key}' on {}",
                other.type_of()
            ))),
        }
    }

    pub fn push(&self, value: Value) -> Result<()> {
        match self {
            Self::Array(items) => {
                items.borrow_mut().push(value);
                Ok(())
            }
            other => Err(Error::ExpressionRuntime(format!(
                "cannot push onto {}",
                other.type_of()
            ))),
        }
    }

    /// Follows a dotted path such as `user.address.city`.
    pub fn path(&self, path: &str) -> Value {
        let mut cursor = self.clone();
        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            cursor = cursor.get(segment.trim());
        }
        cursor
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Array(items) => Some(items.borrow().len()),
            Self::String(text) => Some(text.chars().count()),
            Self::Object(object) => Some(object.borrow().len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Snapshot of an array's items. Non-arrays yield `None`.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Self::Array(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(l), Self::Bool(r)) => l == r,
            (Self::Number(l), Self::Number(r)) => l == r,
            (Self::String(l), Self::String(r)) => l == r,
            (Self::Array(l), Self::Array(r)) => Rc::ptr_eq(l, r),
            (Self::Object(l), Self::Object(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (l, r) if l.is_nullish() && r.is_nullish() => true,
            (l, r) if l.is_nullish() || r.is_nullish() => false,
            (Self::Number(_), Self::String(_)) | (Self::String(_), Self::Number(_)) => {
                self.as_number() == other.as_number()
            }
            (Self::Bool(_), _) => Value::Number(self.as_number()).loose_equals(other),
            (_, Self::Bool(_)) => self.loose_equals(&Value::Number(other.as_number())),
            (Self::Array(_) | Self::Object(_), Self::String(_) | Self::Number(_)) => {
                Value::String(self.as_string()).loose_equals(other)
            }
            (Self::String(_) | Self::Number(_), Self::Array(_) | Self::Object(_)) => {
                self.loose_equals(&Value::String(other.as_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// JSON text for `JSON.stringify`.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match self {
            Self::Undefined | Self::Null => out.push_str("null"),
            Self::Bool(_) => out.push_str(&self.as_string()),
            Self::Number(v) => {
                if v.is_finite() {
                    out.push_str(&format_number(*v));
                } else {
                    out.push_str("null");
                }
            }
            Self::String(text) => write_json_string(text, out),
            Self::Array(items) => {
                out.push('[');
                for (idx, item) in items.borrow().iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            Self::Object(object) => {
                out.push('{');
                let object = object.borrow();
                let mut first = true;
                for (key, value) in &object.entries {
                    if matches!(value, Value::Undefined) {
                        continue;
                    }
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    write_json_string(key, out);
                    out.push(':');
                    value.write_json(out);
                }
                out.push('}');
            }
        }
    }

    pub(crate) fn object_keys(&self) -> Vec<String> {
        match self {
            Self::Object(object) => object.borrow().keys().map(str::to_string).collect(),
            Self::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn object_values(&self) -> Vec<Value> {
        match self {
            Self::Object(object) => object.borrow().values().cloned().collect(),
            Self::Array(items) => items.borrow().clone(),
            _ => Vec::new(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(l), Self::Array(r)) => Rc::ptr_eq(l, r) || *l.borrow() == *r.borrow(),
            (Self::Object(l), Self::Object(r)) => {
                if Rc::ptr_eq(l, r) {
                    return true;
                }
                let (l, r) = (l.borrow(), r.borrow());
                l.entries.len() == r.entries.len()
                    && l.entries
                        .iter()
                        .all(|(key, value)| r.get_entry(key).as_ref() == Some(value))
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::array(items)
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "Infinity".into()
        } else {
            "-Infinity".into()
        };
    }
    if value == 0.0 {
        return "0".into();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }
    format!("{value}")
}

fn write_json_string(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (ch as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
}
