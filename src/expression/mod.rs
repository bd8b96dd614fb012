//! Expressions evaluated against a request context.
//!
//! An expression is a literal value, an attribute designator, a function
//! call or a selector. Functions are bound once at load time through the
//! [`FunctionRegistry`] so evaluation never sees an argument of an
//! unexpected static type.

mod assignment;
mod function;
mod registry;
mod wildcard;

pub use assignment::AttributeAssignment;
pub use function::{FunctionCall, FunctionKind};
pub use registry::{ArgumentChecker, FunctionRegistry};
pub use wildcard::wildcard_match;

use crate::context::Context;
use crate::error::{ErrorContext, Result};
use crate::selector::{LocalSelector, PipSelector};
use crate::types::Type;
use crate::value::AttributeValue;
use std::fmt;
use std::sync::Arc;

/// Named and typed attribute slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    id: String,
    t: Type,
}

impl Attribute {
    /// Create an attribute declaration.
    pub fn new(id: impl Into<String>, t: Type) -> Self {
        Self { id: id.into(), t }
    }

    /// Attribute id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attribute type.
    pub fn get_type(&self) -> &Type {
        &self.t
    }

    /// Description used in error paths.
    pub fn describe(&self) -> String {
        format!("attr({}.{})", self.id, self.t.name())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Any expression.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Literal value
    Value(AttributeValue),
    /// Lookup of a request attribute
    Designator(Attribute),
    /// Function call
    Function(Arc<FunctionCall>),
    /// Lookup in local content
    LocalSelector(Arc<LocalSelector>),
    /// Lookup through an external information point
    PipSelector(Arc<PipSelector>),
}

impl Expression {
    /// Make a literal expression.
    pub fn value(v: AttributeValue) -> Self {
        Expression::Value(v)
    }

    /// Make an attribute designator.
    pub fn designator(id: impl Into<String>, t: Type) -> Self {
        Expression::Designator(Attribute::new(id, t))
    }

    /// Static type of the expression result.
    pub fn get_result_type(&self) -> Type {
        match self {
            Expression::Value(v) => v.get_result_type(),
            Expression::Designator(a) => a.get_type().clone(),
            Expression::Function(f) => f.get_result_type().clone(),
            Expression::LocalSelector(s) => s.get_result_type().clone(),
            Expression::PipSelector(s) => s.get_result_type().clone(),
        }
    }

    /// Calculate the expression.
    pub fn calculate(&self, ctx: &Context) -> Result<AttributeValue> {
        match self {
            Expression::Value(v) => Ok(v.clone()),
            Expression::Designator(a) => ctx.get_attribute(a).cloned(),
            Expression::Function(f) => f.calculate(ctx),
            Expression::LocalSelector(s) => s.calculate(ctx),
            Expression::PipSelector(s) => s.calculate(ctx),
        }
    }

    /// Calculate a boolean expression.
    pub fn calculate_boolean(&self, ctx: &Context) -> Result<bool> {
        self.calculate(ctx)?.boolean()
    }

    /// Short description used in error paths.
    pub fn describe(&self) -> String {
        match self {
            Expression::Value(v) => v.describe(),
            Expression::Designator(a) => a.describe(),
            Expression::Function(f) => f.kind().name().to_string(),
            Expression::LocalSelector(s) => s.describe(),
            Expression::PipSelector(s) => s.describe(),
        }
    }

    /// Calculate the expression and bind any error to the argument name.
    pub(crate) fn calculate_arg(&self, ctx: &Context, arg: &str) -> Result<AttributeValue> {
        self.calculate(ctx).bind(arg)
    }
}

impl From<AttributeValue> for Expression {
    fn from(v: AttributeValue) -> Self {
        Expression::Value(v)
    }
}

impl From<Attribute> for Expression {
    fn from(a: Attribute) -> Self {
        Expression::Designator(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_attribute_describe() {
        let a = Attribute::new("s", Type::SetOfStrings);
        assert_eq!(a.describe(), "attr(s.Set of Strings)");
    }

    #[test]
    fn test_designator() {
        let ctx = Context::from_values(None, [("x", AttributeValue::Integer(7))]).unwrap();

        let e = Expression::designator("x", Type::Integer);
        assert_eq!(e.get_result_type(), Type::Integer);
        assert_eq!(e.calculate(&ctx).unwrap().integer().unwrap(), 7);

        let err = Expression::designator("x", Type::String)
            .calculate(&ctx)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingAttribute));
        assert_eq!(err.to_string(), "#02 (attr(x.String)): Missing attribute");
    }
}
