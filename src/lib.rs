//! Declarative attribute bindings for element trees.
//!
//! A [`ViewModel`] owns a name and a model. Elements tagged with
//! `ft-view-model="<name>"` become its view roots, and attributes such as
//! `<name>-attr-bind`, `<name>-content-bind`, `<name>-js-bind`,
//! `<name>-event-bind` and `<name>-foreach` on their descendants are kept in
//! sync with the model on every [`ViewModel::render`] pass.
//!
//! ```
//! use bindery::{Document, Value, ViewModel};
//!
//! # fn main() -> bindery::Result<()> {
//! let mut doc = Document::from_html(r#"
//!   <ul ft-view-model='todo'>
//!     <li todo-foreach='$vm.model.items' todo-content-bind='$item.name'></li>
//!   </ul>
//! "#)?;
//! let model = Value::from_literal(r#"{ items: [{ name: "a" }, { name: "b" }] }"#)?;
//! let mut vm = ViewModel::new(&mut doc, "todo", model)?;
//! vm.initialize(&mut doc)?;
//! assert_eq!(vm.clone_group(&doc, "$vm.model.items")?.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::error::Error as StdError;
use std::fmt;

mod binding;
mod document;
mod dom;
mod expr;
mod html;
mod listeners;
mod options;
mod pattern;
mod pipe;
mod selector;
mod value;
mod view_model;

pub use binding::{Binding, BindingKind};
pub use document::Document;
pub use dom::NodeId;
pub use expr::{
    BinaryOp, Expr, LogicalOp, Scope, TemplateSegment, UnaryOp, evaluate, parse_expression,
};
pub use options::BindingOptions;
pub use pipe::PipeRegistry;
pub use value::Value;
pub use view_model::{
    ElementProperty, Event, EventHandler, FnHandler, HandlerContext, NoHandler, ViewModel,
    handler_fn,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    ExpressionParse(String),
    ExpressionRuntime(String),
    BindingSyntax(String),
    UnknownPipe(String),
    HandlerNotImplemented(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    InvalidTree(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::ExpressionParse(msg) => write!(f, "expression parse error: {msg}"),
            Self::ExpressionRuntime(msg) => write!(f, "expression runtime error: {msg}"),
            Self::BindingSyntax(msg) => write!(f, "binding syntax error: {msg}"),
            Self::UnknownPipe(name) => write!(f, "no pipe registered under name: {name}"),
            Self::HandlerNotImplemented(handler) => {
                write!(f, "event handler not implemented: {handler}")
            }
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::InvalidTree(msg) => write!(f, "invalid tree operation: {msg}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
