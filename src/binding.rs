//! Binding attribute grammar.
//!
//! Every binding attribute holds a comma separated list of entries whose
//! fields are separated by `::`:
//!
//! ```text
//! vm-attr-bind="title::$vm.model.title::upper, disabled::!$vm.model.ready"
//! vm-content-bind="$item.name"
//! vm-js-bind="value::$vm.model.user.name"
//! vm-event-bind="click::remove($i)"
//! vm-foreach="$vm.model.items"
//! ```
//!
//! Separators inside quotes, `()`, `[]` or `{}` do not split, and a backslash
//! escapes `,`, `:` or `\` outside quotes.

use crate::pattern::Regex;
use crate::{Error, Result};

pub(crate) const FIELD_SEPARATOR: &str = "::";
pub(crate) const LIST_SEPARATOR: &str = ",";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Attr,
    Content,
    Value,
    Event,
    Foreach,
}

impl BindingKind {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Attr => "attr-bind",
            Self::Content => "content-bind",
            Self::Value => "js-bind",
            Self::Event => "event-bind",
            Self::Foreach => "foreach",
        }
    }

    /// Attribute carrying bindings of this kind for the view model `name`.
    pub fn attribute_name(self, name: &str) -> String {
        format!("{name}-{}", self.suffix())
    }

    fn grammar(self) -> &'static str {
        match self {
            Self::Attr => "attribute::expression[::pipe]",
            Self::Content => "expression[::pipe]",
            Self::Value => "property::expression",
            Self::Event => "event::handler[(argument)]",
            Self::Foreach => "expression",
        }
    }
}

/// One parsed entry of a binding attribute. Re-derived on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    /// Attribute, property or event name. `None` for content and foreach.
    pub target: Option<String>,
    pub expression: String,
    pub pipe: Option<String>,
}

impl Binding {
    /// Parses every entry of `raw`. Entries fail independently so one
    /// malformed entry does not hide its siblings.
    pub fn parse_all(kind: BindingKind, raw: &str) -> Vec<Result<Binding>> {
        match kind {
            BindingKind::Content => vec![Self::parse_entry(kind, raw)],
            BindingKind::Foreach => {
                let expression = raw.trim();
                if expression.is_empty() {
                    return vec![Err(Error::BindingSyntax(format!(
                        "empty {} binding",
                        kind.suffix()
                    )))];
                }
                vec![Ok(Binding {
                    kind,
                    target: None,
                    expression: expression.to_string(),
                    pipe: None,
                })]
            }
            _ => split_top_level(raw, LIST_SEPARATOR)
                .into_iter()
                .filter(|entry| !entry.trim().is_empty())
                .map(|entry| Self::parse_entry(kind, entry))
                .collect(),
        }
    }

    fn parse_entry(kind: BindingKind, entry: &str) -> Result<Binding> {
        let fields: Vec<String> = split_top_level(entry, FIELD_SEPARATOR)
            .into_iter()
            .map(|field| unescape_field(field.trim()))
            .collect();
        let malformed = || {
            Error::BindingSyntax(format!(
                "expected `{}` in {} binding `{}`",
                kind.grammar(),
                kind.suffix(),
                entry.trim()
            ))
        };
        if fields.iter().any(String::is_empty) {
            return Err(malformed());
        }

        let (target, expression, pipe) = match (kind, fields.as_slice()) {
            (BindingKind::Content, [expression]) => (None, expression, None),
            (BindingKind::Content, [expression, pipe]) => (None, expression, Some(pipe)),
            (BindingKind::Attr, [target, expression]) => (Some(target), expression, None),
            (BindingKind::Attr, [target, expression, pipe]) => {
                (Some(target), expression, Some(pipe))
            }
            (BindingKind::Value | BindingKind::Event, [target, expression]) => {
                (Some(target), expression, None)
            }
            _ => return Err(malformed()),
        };
        Ok(Binding {
            kind,
            target: target.cloned(),
            expression: expression.clone(),
            pipe: pipe.cloned(),
        })
    }
}

/// Splits `src` on `separator` at nesting depth zero, outside quotes.
/// Escapes are left in place.
pub(crate) fn split_top_level<'a>(src: &'a str, separator: &str) -> Vec<&'a str> {
    let bytes = src.as_bytes();
    let sep = separator.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && bytes[i..].starts_with(sep) => {
                parts.push(&src[start..i]);
                i += sep.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&src[start.min(src.len())..]);
    parts
}

/// Drops the backslash in front of `,`, `:` and `\` outside quotes.
pub(crate) fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut quote: Option<char> = None;
    let mut chars = field.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next @ (',' | ':' | '\\')) if quote.is_none() => out.push(next),
                Some(next) => {
                    out.push(ch);
                    out.push(next);
                }
                None => out.push(ch),
            }
            continue;
        }
        match quote {
            Some(q) if ch == q => quote = None,
            None if matches!(ch, '\'' | '"' | '`') => quote = Some(ch),
            _ => {}
        }
        out.push(ch);
    }
    out
}

/// Regexes shared by the binders of one view model.
#[derive(Debug, Clone)]
pub(crate) struct BindingPatterns {
    handler_call: Regex,
    class_unsafe: Regex,
}

impl BindingPatterns {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            handler_call: Regex::new(r"(?s)^\s*([A-Za-z_$][\w$]*)\s*(?:\((.*)\))?\s*$")?,
            class_unsafe: Regex::new(r"[^A-Za-z0-9_-]+")?,
        })
    }

    /// Splits `handler(arg)` into the handler name and the argument source.
    /// An empty argument list yields `None`.
    pub(crate) fn handler_call(&self, text: &str) -> Result<(String, Option<String>)> {
        let captures = self.handler_call.captures(text)?.ok_or_else(|| {
            Error::BindingSyntax(format!("invalid event handler `{}`", text.trim()))
        })?;
        let name = captures.get(1).unwrap_or_default().to_string();
        let arg = captures
            .get(2)
            .map(str::trim)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string);
        Ok((name, arg))
    }

    /// Reduces an expression to characters usable in a class token.
    pub(crate) fn class_safe(&self, text: &str) -> Result<String> {
        let replaced = self.class_unsafe.replace_all(text, "-")?;
        Ok(replaced.trim_matches('-').to_string())
    }
}
