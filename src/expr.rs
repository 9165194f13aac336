//! Binding expression language: a small, side-effect-limited subset of
//! script expressions evaluated against an explicit [`Scope`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::Result;
use crate::value::Value;

mod ast;
mod builtins;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, LogicalOp, TemplateSegment, UnaryOp};
pub use eval::{Scope, evaluate};
pub use parser::parse_expression;

/// Parsed expressions keyed by source text. Render passes evaluate the same
/// binding strings over and over, so each is parsed once per view model.
#[derive(Debug, Default)]
pub(crate) struct ExprCache {
    parsed: HashMap<String, Rc<Expr>>,
}

impl ExprCache {
    pub(crate) fn parse(&mut self, src: &str) -> Result<Rc<Expr>> {
        if let Some(expr) = self.parsed.get(src) {
            return Ok(Rc::clone(expr));
        }
        let expr = Rc::new(parse_expression(src)?);
        self.parsed.insert(src.to_string(), Rc::clone(&expr));
        Ok(expr)
    }

    pub(crate) fn evaluate(&mut self, src: &str, scope: &Scope) -> Result<Value> {
        let expr = self.parse(src)?;
        evaluate(&expr, scope)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.parsed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_parses_each_source_once() -> Result<()> {
        let mut cache = ExprCache::default();
        let scope = Scope::new().with("$i", Value::from(2));
        assert_eq!(cache.evaluate("$i * 2", &scope)?, Value::Number(4.0));
        assert_eq!(cache.evaluate("$i * 2", &scope)?, Value::Number(4.0));
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[test]
    fn parse_failures_are_not_cached() {
        let mut cache = ExprCache::default();
        assert!(cache.evaluate("1 +", &Scope::new()).is_err());
        assert_eq!(cache.len(), 0);
    }
}
