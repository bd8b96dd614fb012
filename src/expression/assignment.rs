use super::{Attribute, Expression};
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::value::AttributeValue;

/// Assignment of an expression result to an attribute. Obligations are
/// lists of assignments resolved against the request context.
#[derive(Debug, Clone)]
pub struct AttributeAssignment {
    attribute: Attribute,
    expression: Expression,
}

impl AttributeAssignment {
    /// Create an assignment.
    pub fn new(attribute: Attribute, expression: Expression) -> Self {
        Self {
            attribute,
            expression,
        }
    }

    /// Assign a literal value to an attribute of the value's type.
    pub fn with_value(id: impl Into<String>, value: AttributeValue) -> Self {
        let attribute = Attribute::new(id, value.get_result_type());
        Self::new(attribute, Expression::Value(value))
    }

    /// Target attribute.
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Assigned expression.
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    fn bind(&self, err: Error) -> Error {
        err.bind(format!("assignment to {:?}", self.attribute.id()))
    }

    /// Calculate the assigned value and check its type against the
    /// attribute.
    pub fn calculate(&self, ctx: &Context) -> Result<AttributeValue> {
        let v = self.expression.calculate(ctx).map_err(|e| self.bind(e))?;
        let t = v.get_result_type();
        if !t.matches(self.attribute.get_type()) {
            return Err(self.bind(Error::new(ErrorKind::AssignmentTypeMismatch {
                id: self.attribute.id().to_string(),
                expected: self.attribute.get_type().name().to_string(),
                actual: t.name().to_string(),
            })));
        }

        Ok(v)
    }

    /// Calculate the assignment and return attribute id, type key and
    /// serialized value.
    pub fn serialize(&self, ctx: &Context) -> Result<(String, String, String)> {
        let v = self.calculate(ctx)?;
        let s = v.serialize().map_err(|e| self.bind(e))?;
        Ok((
            self.attribute.id().to_string(),
            self.attribute.get_type().key(),
            s,
        ))
    }
}
