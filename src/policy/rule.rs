//! Rules: leaves of the policy tree.

use super::{Effect, Response, Target};
use crate::context::Context;
use crate::core::Combinable;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::{AttributeAssignment, Expression};
use crate::types::Type;

/// A rule within a policy.
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    hidden: bool,
    target: Target,
    condition: Option<Expression>,
    effect: Effect,
    obligations: Vec<AttributeAssignment>,
}

impl Rule {
    /// Create a rule builder.
    pub fn builder(id: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(id)
    }

    /// Create a hidden rule builder.
    pub fn hidden() -> RuleBuilder {
        RuleBuilder::new("").hidden(true)
    }

    /// Rule id. Hidden rules may still carry one.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the rule can't be addressed by updates.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Effect of the rule when it applies.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Description used in error paths.
    pub fn describe(&self) -> String {
        if self.hidden {
            return "hidden rule".to_string();
        }

        format!("rule {:?}", self.id)
    }

    fn indeterminate(&self) -> Effect {
        if self.effect == Effect::Deny {
            Effect::IndeterminateD
        } else {
            Effect::IndeterminateP
        }
    }

    /// Evaluate the rule.
    pub fn calculate(&self, ctx: &Context) -> Response {
        match self.target.calculate(ctx) {
            Ok(true) => {}
            Ok(false) => return Response::not_applicable(),
            Err(err) => {
                return Response::with_status(self.indeterminate(), err.bind(self.describe()))
            }
        }

        if let Some(condition) = &self.condition {
            match condition.calculate_boolean(ctx) {
                Ok(true) => {}
                Ok(false) => return Response::not_applicable(),
                Err(err) => {
                    return Response::with_status(
                        self.indeterminate(),
                        err.bind("condition").bind(self.describe()),
                    )
                }
            }
        }

        Response::with_obligations(self.effect, self.obligations.clone())
    }
}

impl Combinable for Rule {
    fn visible_id(&self) -> Option<&str> {
        (!self.hidden).then_some(self.id.as_str())
    }

    fn calculate(&self, ctx: &Context) -> Response {
        Rule::calculate(self, ctx)
    }

    fn missing_default(id: &str) -> Error {
        Error::new(ErrorKind::MissingDefaultRule { id: id.to_string() })
    }

    fn missing_error(id: &str) -> Error {
        Error::new(ErrorKind::MissingErrorRule { id: id.to_string() })
    }
}

/// Builder for creating rules.
#[derive(Debug)]
pub struct RuleBuilder {
    id: String,
    hidden: bool,
    target: Target,
    condition: Option<Expression>,
    effect: Effect,
    obligations: Vec<AttributeAssignment>,
}

impl RuleBuilder {
    /// Create a new rule builder with the given ID. Rules deny by default.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hidden: false,
            target: Target::default(),
            condition: None,
            effect: Effect::Deny,
            obligations: Vec::new(),
        }
    }

    /// Hide the rule from updates.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the target.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Set the condition.
    pub fn condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Set the effect.
    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    /// Add an obligation.
    pub fn obligation(mut self, obligation: AttributeAssignment) -> Self {
        self.obligations.push(obligation);
        self
    }

    /// Add multiple obligations.
    pub fn obligations(mut self, obligations: impl IntoIterator<Item = AttributeAssignment>) -> Self {
        self.obligations.extend(obligations);
        self
    }

    /// Build the rule.
    pub fn build(self) -> Result<Rule> {
        let rule = Rule {
            id: self.id,
            hidden: self.hidden,
            target: self.target,
            condition: self.condition,
            effect: self.effect,
            obligations: self.obligations,
        };

        if !rule.effect.is_decisive() {
            return Err(Error::config(format!(
                "rule effect must be Permit or Deny but got {}",
                rule.effect
            ))
            .bind(rule.describe()));
        }

        if let Some(c) = &rule.condition {
            let t = c.get_result_type();
            if t != Type::Boolean {
                return Err(Error::new(ErrorKind::ConditionType {
                    actual: t.name().to_string(),
                })
                .bind(rule.describe()));
            }
        }

        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllOf, AnyOf, Match};
    use crate::expression::FunctionRegistry;
    use crate::value::AttributeValue;

    fn ctx() -> Context {
        Context::from_values(
            None,
            [
                ("s", AttributeValue::String("test".into())),
                ("b", AttributeValue::Boolean(false)),
            ],
        )
        .unwrap()
    }

    fn target(id: &str, v: &str) -> Target {
        Target::new(vec![AnyOf::new(vec![AllOf::new(vec![Match::make(
            &FunctionRegistry::default(),
            "equal",
            Expression::designator(id, Type::String),
            Expression::value(AttributeValue::String(v.into())),
        )
        .unwrap()])])])
    }

    #[test]
    fn test_rule_without_target_or_condition() {
        let rule = Rule::builder("r")
            .effect(Effect::Permit)
            .obligation(AttributeAssignment::with_value(
                "x",
                AttributeValue::String("y".into()),
            ))
            .build()
            .unwrap();

        let r = rule.calculate(&ctx());
        assert_eq!(r.effect, Effect::Permit);
        assert_eq!(r.obligations.len(), 1);
        assert_eq!(rule.describe(), "rule \"r\"");
    }

    #[test]
    fn test_rule_target() {
        let rule = Rule::builder("r").target(target("s", "test")).build().unwrap();
        assert_eq!(rule.calculate(&ctx()).effect, Effect::Deny);

        let rule = Rule::builder("r").target(target("s", "other")).build().unwrap();
        assert_eq!(rule.calculate(&ctx()).effect, Effect::NotApplicable);
    }

    #[test]
    fn test_rule_target_error_depends_on_effect() {
        let rule = Rule::builder("r").target(target("x", "test")).build().unwrap();
        let r = rule.calculate(&ctx());
        assert_eq!(r.effect, Effect::IndeterminateD);
        assert_eq!(
            r.status.unwrap().to_string(),
            "#02 (rule \"r\">target>any>all>match>equal>first argument>attr(x.String)): Missing attribute"
        );

        let rule = Rule::builder("r")
            .effect(Effect::Permit)
            .target(target("x", "test"))
            .build()
            .unwrap();
        assert_eq!(rule.calculate(&ctx()).effect, Effect::IndeterminateP);
    }

    #[test]
    fn test_rule_condition() {
        let rule = Rule::builder("r")
            .condition(Expression::designator("b", Type::Boolean))
            .build()
            .unwrap();
        assert_eq!(rule.calculate(&ctx()).effect, Effect::NotApplicable);

        let rule = Rule::hidden()
            .effect(Effect::Permit)
            .condition(Expression::designator("missing", Type::Boolean))
            .build()
            .unwrap();
        let r = rule.calculate(&ctx());
        assert_eq!(r.effect, Effect::IndeterminateP);
        assert_eq!(
            r.status.unwrap().to_string(),
            "#02 (hidden rule>condition>attr(missing.Boolean)): Missing attribute"
        );
    }

    #[test]
    fn test_rule_build_validation() {
        let err = Rule::builder("r")
            .condition(Expression::designator("s", Type::String))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ConditionType { .. }));

        let err = Rule::builder("r")
            .effect(Effect::NotApplicable)
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config { .. }));
    }
}
