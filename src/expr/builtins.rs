use num_traits::ToPrimitive;
use unicode_normalization::UnicodeNormalization;

use crate::value::{Value, format_number};
use crate::{Error, Result};

pub(crate) fn is_namespace(name: &str) -> bool {
    matches!(name, "Math" | "JSON" | "Object")
}

pub(crate) fn is_global_function(name: &str) -> bool {
    matches!(
        name,
        "String" | "Number" | "Boolean" | "parseInt" | "parseFloat" | "isNaN"
    )
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn not_a_function(receiver: &str, method: &str) -> Error {
    Error::ExpressionRuntime(format!("{receiver}.{method} is not a function"))
}

pub(crate) fn call_namespace(namespace: &str, method: &str, args: &[Value]) -> Result<Value> {
    let number = |index| arg(args, index).as_number();
    let value = match (namespace, method) {
        ("Math", "abs") => Value::Number(number(0).abs()),
        ("Math", "floor") => Value::Number(number(0).floor()),
        ("Math", "ceil") => Value::Number(number(0).ceil()),
        ("Math", "round") => Value::Number((number(0) + 0.5).floor()),
        ("Math", "trunc") => Value::Number(number(0).trunc()),
        ("Math", "sign") => {
            let n = number(0);
            Value::Number(if n.is_nan() || n == 0.0 { n } else { n.signum() })
        }
        ("Math", "min") => Value::Number(
            args.iter()
                .map(Value::as_number)
                .fold(f64::INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) }),
        ),
        ("Math", "max") => Value::Number(
            args.iter()
                .map(Value::as_number)
                .fold(f64::NEG_INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) }),
        ),
        ("JSON", "stringify") => match arg(args, 0) {
            Value::Undefined => Value::Undefined,
            other => Value::String(other.to_json()),
        },
        ("Object", "keys") => {
            Value::array(arg(args, 0).object_keys().into_iter().map(Value::String).collect())
        }
        ("Object", "values") => Value::array(arg(args, 0).object_values()),
        _ => return Err(not_a_function(namespace, method)),
    };
    Ok(value)
}

pub(crate) fn call_global(name: &str, args: &[Value]) -> Result<Value> {
    let value = match name {
        "String" => match args.first() {
            Some(value) => Value::String(value.as_string()),
            None => Value::String(String::new()),
        },
        "Number" => match args.first() {
            Some(value) => Value::Number(value.as_number()),
            None => Value::Number(0.0),
        },
        "Boolean" => Value::Bool(arg(args, 0).truthy()),
        "parseInt" => {
            let radix = match args.get(1) {
                Some(value) if !value.is_nullish() => value.as_number().to_u32().unwrap_or(0),
                _ => 0,
            };
            Value::Number(parse_int(&arg(args, 0).as_string(), radix))
        }
        "parseFloat" => Value::Number(parse_float(&arg(args, 0).as_string())),
        "isNaN" => Value::Bool(arg(args, 0).as_number().is_nan()),
        _ => return Err(Error::ExpressionRuntime(format!("{name} is not defined"))),
    };
    Ok(value)
}

pub(crate) fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
    match receiver {
        Value::String(text) => string_method(text, method, args),
        Value::Array(_) => array_method(receiver, method, args),
        Value::Number(number) => number_method(*number, method, args),
        Value::Bool(_) if method == "toString" => Ok(Value::String(receiver.as_string())),
        other => Err(not_a_function(other.type_of(), method)),
    }
}

/// Resolves a relative index argument the way `slice` does: negative counts
/// from the end and the result is clamped to `0..=len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let n = value.as_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        let back = (-n).to_usize().unwrap_or(usize::MAX);
        len.saturating_sub(back)
    } else {
        n.to_usize().unwrap_or(usize::MAX).min(len)
    }
}

/// Clamps without counting from the end (`substring`, `indexOf` positions).
fn clamped_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let n = value.as_number();
    if n.is_nan() || n <= 0.0 {
        return 0;
    }
    n.trunc().to_usize().unwrap_or(usize::MAX).min(len)
}

fn char_slice(chars: &[char], start: usize, end: usize) -> String {
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect()
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn pad(text: &str, args: &[Value], at_start: bool) -> String {
    let current = text.chars().count();
    let target = arg(args, 0).as_number().to_usize().unwrap_or(0);
    let fill = match args.get(1) {
        Some(value) if !matches!(value, Value::Undefined) => value.as_string(),
        _ => " ".to_string(),
    };
    if target <= current || fill.is_empty() {
        return text.to_string();
    }
    let padding: String = fill.chars().cycle().take(target - current).collect();
    if at_start {
        format!("{padding}{text}")
    } else {
        format!("{text}{padding}")
    }
}

fn string_method(text: &str, method: &str, args: &[Value]) -> Result<Value> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let search = || arg(args, 0).as_string();
    let value = match method {
        "toUpperCase" => Value::String(text.to_uppercase()),
        "toLowerCase" => Value::String(text.to_lowercase()),
        "trim" => Value::String(text.trim().to_string()),
        "trimStart" => Value::String(text.trim_start().to_string()),
        "trimEnd" => Value::String(text.trim_end().to_string()),
        "toString" => Value::String(text.to_string()),
        "includes" => {
            let needle: Vec<char> = search().chars().collect();
            let from = clamped_index(&arg(args, 1), len, 0);
            Value::Bool(find_chars(&chars, &needle, from).is_some())
        }
        "startsWith" => {
            let from = clamped_index(&arg(args, 1), len, 0);
            let rest: String = chars[from..].iter().collect();
            Value::Bool(rest.starts_with(&search()))
        }
        "endsWith" => {
            let end = clamped_index(&arg(args, 1), len, len);
            let head: String = chars[..end].iter().collect();
            Value::Bool(head.ends_with(&search()))
        }
        "indexOf" => {
            let needle: Vec<char> = search().chars().collect();
            let from = clamped_index(&arg(args, 1), len, 0);
            match find_chars(&chars, &needle, from) {
                Some(index) => Value::from(index),
                None => Value::Number(-1.0),
            }
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            Value::String(char_slice(&chars, start, end))
        }
        "substring" => {
            let start = clamped_index(&arg(args, 0), len, 0);
            let end = clamped_index(&arg(args, 1), len, len);
            Value::String(char_slice(&chars, start.min(end), start.max(end)))
        }
        "charAt" => {
            let index = clamped_index(&arg(args, 0), len, 0);
            Value::String(chars.get(index).map(char::to_string).unwrap_or_default())
        }
        "at" => {
            let n = arg(args, 0).as_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            match index.to_usize().and_then(|i| chars.get(i)) {
                Some(ch) => Value::String(ch.to_string()),
                None => Value::Undefined,
            }
        }
        "padStart" => Value::String(pad(text, args, true)),
        "padEnd" => Value::String(pad(text, args, false)),
        "repeat" => {
            let count = arg(args, 0).as_number();
            let count = if count.is_nan() { 0.0 } else { count.trunc() };
            let Some(count) = count.to_usize().filter(|_| count.is_finite()) else {
                return Err(Error::ExpressionRuntime(format!(
                    "invalid repeat count: {}",
                    format_number(count)
                )));
            };
            Value::String(text.repeat(count))
        }
        "replace" => {
            let pattern = search();
            let replacement = arg(args, 1).as_string();
            Value::String(text.replacen(&pattern, &replacement, 1))
        }
        "replaceAll" => {
            let pattern = search();
            let replacement = arg(args, 1).as_string();
            if pattern.is_empty() {
                let mut out = replacement.clone();
                for ch in &chars {
                    out.push(*ch);
                    out.push_str(&replacement);
                }
                Value::String(out)
            } else {
                Value::String(text.replace(&pattern, &replacement))
            }
        }
        "split" => {
            let limit = match args.get(1) {
                Some(value) if !value.is_nullish() => {
                    value.as_number().to_usize().unwrap_or(0)
                }
                _ => usize::MAX,
            };
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::String(text.to_string())],
                Some(separator) => {
                    let separator = separator.as_string();
                    if separator.is_empty() {
                        chars.iter().map(|ch| Value::String(ch.to_string())).collect()
                    } else {
                        text.split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    }
                }
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "concat" => {
            let mut out = text.to_string();
            for value in args {
                out.push_str(&value.as_string());
            }
            Value::String(out)
        }
        "normalize" => {
            let form = match args.first() {
                None | Some(Value::Undefined) => "NFC".to_string(),
                Some(value) => value.as_string(),
            };
            let normalized: String = match form.as_str() {
                "NFC" => text.nfc().collect(),
                "NFD" => text.nfd().collect(),
                "NFKC" => text.nfkc().collect(),
                "NFKD" => text.nfkd().collect(),
                other => {
                    return Err(Error::ExpressionRuntime(format!(
                        "invalid normalization form: {other}"
                    )));
                }
            };
            Value::String(normalized)
        }
        _ => return Err(not_a_function("string", method)),
    };
    Ok(value)
}

fn array_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let items = receiver.items().unwrap_or_default();
    let len = items.len();
    let value = match method {
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|item| {
                item.strict_equals(&needle)
                    || matches!((item, &needle), (Value::Number(l), Value::Number(r)) if l.is_nan() && r.is_nan())
            }))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let from = relative_index(&arg(args, 1), len, 0);
            match items
                .iter()
                .skip(from)
                .position(|item| item.strict_equals(&needle))
            {
                Some(offset) => Value::from(from + offset),
                None => Value::Number(-1.0),
            }
        }
        "join" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(value) => value.as_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(Value::display_string)
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            if start >= end {
                Value::array(Vec::new())
            } else {
                Value::array(items[start..end].to_vec())
            }
        }
        "at" => {
            let n = arg(args, 0).as_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            index
                .to_usize()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default()
        }
        "concat" => {
            let mut out = items;
            for value in args {
                match value.items() {
                    Some(nested) => out.extend(nested),
                    None => out.push(value.clone()),
                }
            }
            Value::array(out)
        }
        "toString" => Value::String(receiver.as_string()),
        _ => return Err(not_a_function("array", method)),
    };
    Ok(value)
}

fn number_method(number: f64, method: &str, args: &[Value]) -> Result<Value> {
    match method {
        "toFixed" => {
            let digits = arg(args, 0).as_number();
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            let Some(digits) = digits.to_usize().filter(|d| *d <= 100) else {
                return Err(Error::ExpressionRuntime(
                    "toFixed() digits argument must be between 0 and 100".into(),
                ));
            };
            if !number.is_finite() {
                return Ok(Value::String(format_number(number)));
            }
            Ok(Value::String(format!("{number:.digits$}")))
        }
        "toString" => {
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10,
                Some(value) => value.as_number().to_u32().unwrap_or(0),
            };
            if !(2..=36).contains(&radix) {
                return Err(Error::ExpressionRuntime(
                    "toString() radix must be between 2 and 36".into(),
                ));
            }
            if radix == 10 || !number.is_finite() || number.fract() != 0.0 {
                return Ok(Value::String(format_number(number)));
            }
            Ok(Value::String(integer_to_radix(number, radix)))
        }
        _ => Err(not_a_function("number", method)),
    }
}

fn integer_to_radix(number: f64, radix: u32) -> String {
    let negative = number < 0.0;
    let Some(mut magnitude) = number.abs().to_u128() else {
        return format_number(number);
    };
    if magnitude == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    let radix = u128::from(radix);
    while magnitude > 0 {
        let digit = (magnitude % radix) as u32;
        digits.push(char::from_digit(digit, 36).unwrap_or('0'));
        magnitude /= radix;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn parse_int(text: &str, radix: u32) -> f64 {
    let mut rest = text.trim_start();
    let mut sign = 1.0;
    if let Some(stripped) = rest.strip_prefix('-') {
        sign = -1.0;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(stripped) = rest
            .strip_prefix("0x")
            .or_else(|| rest.strip_prefix("0X"))
        {
            rest = stripped;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0_f64;
    let mut seen = false;
    for ch in rest.chars() {
        let Some(digit) = ch.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        seen = true;
    }
    if seen { sign * value } else { f64::NAN }
}

fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if trimmed.starts_with(prefix) {
            return f64::INFINITY;
        }
    }
    if trimmed.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if seen_exp && matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }
    // Back off a dangling exponent marker or sign.
    while end > 0 {
        match trimmed[..end].parse::<f64>() {
            Ok(value) if seen_digit => return value,
            _ => end -= 1,
        }
    }
    f64::NAN
}

#[cfg(test)]
mod tests {
    use crate::Result;
    use crate::expr::{Scope, evaluate, parse_expression};
    use crate::value::Value;

    fn eval_str(src: &str) -> Result<Value> {
        evaluate(&parse_expression(src)?, &Scope::new())
    }

    #[test]
    fn string_methods_cover_common_formatting() -> Result<()> {
        assert_eq!(eval_str("'  Hi '.trim().toUpperCase()")?, Value::string("HI"));
        assert_eq!(eval_str("'7'.padStart(3, '0')")?, Value::string("007"));
        assert_eq!(eval_str("'abcdef'.slice(-3)")?, Value::string("def"));
        assert_eq!(eval_str("'abcdef'.substring(4, 1)")?, Value::string("bcd"));
        assert_eq!(eval_str("'a-b-c'.split('-').length")?, Value::Number(3.0));
        assert_eq!(eval_str("'a-b-c'.replaceAll('-', '+')")?, Value::string("a+b+c"));
        assert_eq!(eval_str("'a-b-c'.replace('-', '+')")?, Value::string("a+b-c"));
        assert_eq!(eval_str("'hello'.indexOf('l')")?, Value::Number(2.0));
        assert_eq!(eval_str("'hello'.at(-1)")?, Value::string("o"));
        Ok(())
    }

    #[test]
    fn normalize_composes_combining_marks() -> Result<()> {
        assert_eq!(
            eval_str("'e\\u0301'.normalize() === '\\u00e9'")?,
            Value::Bool(true)
        );
        assert_eq!(
            eval_str("'\\u00e9'.normalize('NFD').length")?,
            Value::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn array_methods_read_without_mutating() -> Result<()> {
        assert_eq!(eval_str("[1, 2, 3].join('-')")?, Value::string("1-2-3"));
        assert_eq!(eval_str("[1, 2, 3].includes(2)")?, Value::Bool(true));
        assert_eq!(eval_str("[1, 2, 3].slice(1).length")?, Value::Number(2.0));
        assert_eq!(eval_str("[1, 2].concat([3], 4).length")?, Value::Number(4.0));
        assert_eq!(eval_str("['a', 'b'].at(-1)")?, Value::string("b"));
        assert_eq!(eval_str("[1, 2, 3].indexOf(9)")?, Value::Number(-1.0));
        Ok(())
    }

    #[test]
    fn numeric_helpers_match_script_output() -> Result<()> {
        assert_eq!(eval_str("(1.005).toFixed(1)")?, Value::string("1.0"));
        assert_eq!(eval_str("(255).toString(16)")?, Value::string("ff"));
        assert_eq!(eval_str("Math.max(1, 5, 3)")?, Value::Number(5.0));
        assert_eq!(eval_str("Math.min()")?, Value::Number(f64::INFINITY));
        assert_eq!(eval_str("Math.round(2.5)")?, Value::Number(3.0));
        assert_eq!(eval_str("Math.round(-2.5)")?, Value::Number(-2.0));
        assert_eq!(eval_str("parseInt('42px')")?, Value::Number(42.0));
        assert_eq!(eval_str("parseInt('0x1f')")?, Value::Number(31.0));
        assert_eq!(eval_str("parseFloat('3.5e2x')")?, Value::Number(350.0));
        assert_eq!(eval_str("isNaN('abc')")?, Value::Bool(true));
        assert_eq!(eval_str("Number('') + String(5)")?, Value::string("05"));
        Ok(())
    }

    #[test]
    fn json_and_object_helpers() -> Result<()> {
        assert_eq!(
            eval_str("JSON.stringify({ a: 1, b: [true, null], c: undefined })")?,
            Value::string(r#"{"a":1,"b":[true,null]}"#)
        );
        assert_eq!(
            eval_str("Object.keys({ x: 1, y: 2 }).join()")?,
            Value::string("x,y")
        );
        assert_eq!(
            eval_str("Object.values({ x: 1, y: 2 }).length")?,
            Value::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn unknown_methods_are_runtime_errors() {
        assert!(eval_str("'x'.constructor()").is_err());
        assert!(eval_str("Math.random()").is_err());
        assert!(eval_str("[1].push(2)").is_err());
    }
}
