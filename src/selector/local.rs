use crate::context::Context;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::types::Type;
use crate::value::AttributeValue;

/// Late bound lookup in local content.
///
/// Content and item are resolved on every evaluation so a content update
/// between two requests is picked up without rebuilding the policy.
#[derive(Debug, Clone)]
pub struct LocalSelector {
    content: String,
    item: String,
    path: Vec<Expression>,
    t: Type,
    default: Option<Expression>,
    error: Option<Expression>,
}

impl LocalSelector {
    /// Create a selector of the item in the content.
    pub fn new(
        content: impl Into<String>,
        item: impl Into<String>,
        path: Vec<Expression>,
        t: Type,
    ) -> Self {
        Self {
            content: content.into(),
            item: item.into(),
            path,
            t,
            default: None,
            error: None,
        }
    }

    /// Expression calculated when the path leads nowhere.
    pub fn with_default(mut self, e: Expression) -> Self {
        self.default = Some(e);
        self
    }

    /// Expression calculated on any other lookup failure.
    pub fn with_error(mut self, e: Expression) -> Self {
        self.error = Some(e);
        self
    }

    /// Content id.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Item id.
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Key expressions.
    pub fn path(&self) -> &[Expression] {
        &self.path
    }

    /// Type of the selected value.
    pub fn get_result_type(&self) -> &Type {
        &self.t
    }

    /// Short description for error paths.
    pub fn describe(&self) -> String {
        format!("selector({}.{})", self.content, self.item)
    }

    /// Look the value up, falling back to the default on a missing value
    /// and to the error expression on any other failure.
    pub fn calculate(&self, ctx: &Context) -> Result<AttributeValue> {
        match self.lookup(ctx) {
            Ok(v) => Ok(v),
            Err(err) => match (&self.default, &self.error) {
                (Some(d), _) if err.is_missing_value() => d.calculate(ctx),
                (_, Some(e)) => e.calculate(ctx),
                _ => Err(err.bind(self.describe())),
            },
        }
    }

    fn lookup(&self, ctx: &Context) -> Result<AttributeValue> {
        let item = ctx.get_content_item(&self.content, &self.item)?;
        if !item.get_type().matches(&self.t) {
            return Err(Error::invalid_content_item_type(
                self.t.name(),
                item.get_type().name(),
            ));
        }

        let v = item.get(&self.path, ctx)?;
        v.rebind_type(&self.t).map_err(|_| {
            Error::invalid_content_item_type(self.t.name(), v.get_result_type().name())
        })
    }
}
