//! Applicability filters.
//!
//! A target is an AND of any-of blocks, an any-of block is an OR of all-of
//! blocks and an all-of block is an AND of matches. Evaluation stops as
//! soon as the result is known.

use crate::context::Context;
use crate::error::{Error, ErrorContext, Result};
use crate::expression::{Expression, FunctionRegistry};

/// Single boolean check of a target.
#[derive(Debug, Clone)]
pub struct Match {
    expression: Expression,
}

impl Match {
    /// Wrap a boolean expression.
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }

    /// Build a match out of one of the target compatible functions.
    pub fn make(
        registry: &FunctionRegistry,
        name: &str,
        first: Expression,
        second: Expression,
    ) -> Result<Self> {
        registry.make_match(name, first, second).map(Self::new)
    }

    /// Wrapped expression.
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    fn calculate(&self, ctx: &Context) -> Result<bool> {
        self.expression.calculate_boolean(ctx).bind("match")
    }
}

/// All matches must hold.
#[derive(Debug, Clone, Default)]
pub struct AllOf {
    matches: Vec<Match>,
}

impl AllOf {
    /// Create an all-of block.
    pub fn new(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    /// Append a match.
    pub fn push(&mut self, m: Match) {
        self.matches.push(m);
    }

    fn calculate(&self, ctx: &Context) -> Result<bool> {
        for m in &self.matches {
            if !m.calculate(ctx).bind("all")? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// At least one all-of block must hold.
#[derive(Debug, Clone, Default)]
pub struct AnyOf {
    all: Vec<AllOf>,
}

impl AnyOf {
    /// Create an any-of block.
    pub fn new(all: Vec<AllOf>) -> Self {
        Self { all }
    }

    /// Append an all-of block.
    pub fn push(&mut self, a: AllOf) {
        self.all.push(a);
    }

    fn calculate(&self, ctx: &Context) -> Result<bool> {
        let mut errs = Vec::new();
        for a in &self.all {
            match a.calculate(ctx) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => errs.push(err),
            }
        }

        match errs.len() {
            0 => Ok(false),
            1 => Err(errs.remove(0).bind("any")),
            _ => Err(Error::multi(errs).bind("any")),
        }
    }
}

/// Applicability filter of a rule, policy or policy set.
#[derive(Debug, Clone, Default)]
pub struct Target {
    any: Vec<AnyOf>,
}

impl Target {
    /// Create a target. An empty target matches everything.
    pub fn new(any: Vec<AnyOf>) -> Self {
        Self { any }
    }

    /// Append an any-of block.
    pub fn push(&mut self, a: AnyOf) {
        self.any.push(a);
    }

    /// Whether the target has no blocks.
    pub fn is_empty(&self) -> bool {
        self.any.is_empty()
    }

    /// Check the target against the request.
    pub fn calculate(&self, ctx: &Context) -> Result<bool> {
        for a in &self.any {
            if !a.calculate(ctx).bind("target")? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Type;
    use crate::value::AttributeValue;

    fn equal(id: &str, v: &str) -> Match {
        Match::make(
            &FunctionRegistry::default(),
            "equal",
            Expression::designator(id, Type::String),
            Expression::value(AttributeValue::String(v.into())),
        )
        .unwrap()
    }

    fn ctx() -> Context {
        Context::from_values(
            None,
            [
                ("x", AttributeValue::String("a".into())),
                ("y", AttributeValue::String("b".into())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_target_matches() {
        assert!(Target::default().calculate(&ctx()).unwrap());
    }

    #[test]
    fn test_target_and_of_any() {
        let t = Target::new(vec![
            AnyOf::new(vec![AllOf::new(vec![equal("x", "a")])]),
            AnyOf::new(vec![AllOf::new(vec![equal("y", "c")])]),
        ]);
        assert!(!t.calculate(&ctx()).unwrap());

        let t = Target::new(vec![AnyOf::new(vec![
            AllOf::new(vec![equal("x", "z")]),
            AllOf::new(vec![equal("x", "a"), equal("y", "b")]),
        ])]);
        assert!(t.calculate(&ctx()).unwrap());
    }

    #[test]
    fn test_any_of_short_circuit() {
        let t = Target::new(vec![AnyOf::new(vec![
            AllOf::new(vec![equal("x", "a")]),
            AllOf::new(vec![equal("missing", "a")]),
        ])]);
        assert!(t.calculate(&ctx()).unwrap());
    }

    #[test]
    fn test_any_of_error_after_no_match() {
        let t = Target::new(vec![AnyOf::new(vec![
            AllOf::new(vec![equal("missing", "a")]),
            AllOf::new(vec![equal("x", "z")]),
        ])]);
        let err = t.calculate(&ctx()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingAttribute));
        assert_eq!(
            err.to_string(),
            "#02 (target>any>all>match>equal>first argument>attr(missing.String)): Missing attribute"
        );

        let t = Target::new(vec![AnyOf::new(vec![
            AllOf::new(vec![equal("missing", "a")]),
            AllOf::new(vec![equal("x", "a")]),
        ])]);
        assert!(t.calculate(&ctx()).unwrap());
    }
}
