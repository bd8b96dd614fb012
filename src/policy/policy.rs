//! Policies: ordered lists of rules combined by an algorithm.

use super::{combine_effect_and_status, Response, Rule, Target, UpdateEntity};
use crate::context::Context;
use crate::core::{CombiningAlgorithm, Combinable};
use crate::error::{Error, ErrorKind, Result};
use crate::expression::AttributeAssignment;
use std::sync::Arc;

/// A policy definition containing a target, rules and obligations.
#[derive(Debug, Clone)]
pub struct Policy {
    id: String,
    hidden: bool,
    target: Target,
    rules: Vec<Arc<Rule>>,
    algorithm: CombiningAlgorithm<Rule>,
    obligations: Vec<AttributeAssignment>,
}

impl Policy {
    /// Create a policy builder.
    pub fn builder(id: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder::new(id)
    }

    /// Policy id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the policy can't be addressed by updates.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Id of the policy unless it is hidden.
    pub fn visible_id(&self) -> Option<&str> {
        (!self.hidden).then_some(self.id.as_str())
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Rule combining algorithm.
    pub fn algorithm(&self) -> &CombiningAlgorithm<Rule> {
        &self.algorithm
    }

    /// Description used in error paths.
    pub fn describe(&self) -> String {
        match self.visible_id() {
            Some(id) => format!("policy {id:?}"),
            None => "hidden policy".to_string(),
        }
    }

    /// Evaluate the policy.
    pub fn calculate(&self, ctx: &Context) -> Response {
        match self.target.calculate(ctx) {
            Ok(true) => {
                let mut r = self.algorithm.execute(&self.rules, ctx);
                if r.effect.is_decisive() {
                    r.obligations.extend(self.obligations.iter().cloned());
                }
                r.bind(self.describe())
            }
            Ok(false) => Response::not_applicable(),
            Err(err) => {
                combine_effect_and_status(err, self.algorithm.execute(&self.rules, ctx))
                    .bind(self.describe())
            }
        }
    }

    /// Copy of the policy with the rule added or replaced. The path must be
    /// empty since rules have no children.
    pub fn append(&self, path: &[String], item: UpdateEntity) -> Result<Self> {
        if self.hidden {
            return Err(Error::new(ErrorKind::HiddenPolicyModification));
        }

        if !path.is_empty() {
            return Err(Error::new(ErrorKind::TooLongPathPolicyModification {
                path: path.join("/"),
            })
            .bind(&self.id));
        }

        let rule = match item {
            UpdateEntity::Rule(rule) => rule,
            other => {
                return Err(Error::new(ErrorKind::InvalidPolicyItemType {
                    item: other.describe(),
                })
                .bind(&self.id))
            }
        };

        if rule.is_hidden() {
            return Err(Error::new(ErrorKind::HiddenRuleAppend).bind(&self.id));
        }

        Ok(self.put_child(Arc::new(rule)))
    }

    /// Copy of the policy without the rule at the path.
    pub fn delete(&self, path: &[String]) -> Result<Self> {
        if self.hidden {
            return Err(Error::new(ErrorKind::HiddenPolicyModification));
        }

        let (id, rest) = path
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::TooShortPathPolicyModification).bind(&self.id))?;

        if !rest.is_empty() {
            return Err(Error::new(ErrorKind::TooLongPathPolicyModification {
                path: rest.join("/"),
            })
            .bind(&self.id));
        }

        self.del_child(id).map_err(|err| err.bind(&self.id))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.visible_id() == Some(id))
    }

    fn put_child(&self, child: Arc<Rule>) -> Self {
        let id = child.id().to_string();
        let mut rules = self.rules.clone();
        match self.position(&id) {
            Some(i) => rules[i] = Arc::clone(&child),
            None => rules.push(Arc::clone(&child)),
        }

        Self {
            rules,
            algorithm: self.algorithm.child_added(&id, &child),
            ..self.clone()
        }
    }

    fn del_child(&self, id: &str) -> Result<Self> {
        let i = self.position(id).ok_or_else(|| {
            Error::new(ErrorKind::MissingPolicyChild { id: id.to_string() })
        })?;

        let mut rules = self.rules.clone();
        rules.remove(i);

        Ok(Self {
            rules,
            algorithm: self.algorithm.child_deleted(id),
            ..self.clone()
        })
    }
}

/// Builder for creating policies.
#[derive(Debug)]
pub struct PolicyBuilder {
    id: String,
    hidden: bool,
    target: Target,
    rules: Vec<Arc<Rule>>,
    algorithm: CombiningAlgorithm<Rule>,
    obligations: Vec<AttributeAssignment>,
}

impl PolicyBuilder {
    /// Create a new policy builder with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hidden: false,
            target: Target::default(),
            rules: Vec::new(),
            algorithm: CombiningAlgorithm::default(),
            obligations: Vec::new(),
        }
    }

    /// Hide the policy from updates.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the target.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Add a rule to the policy.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Add multiple rules to the policy.
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules.into_iter().map(Arc::new));
        self
    }

    /// Set the rule combining algorithm.
    pub fn algorithm(mut self, algorithm: impl Into<CombiningAlgorithm<Rule>>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Add an obligation.
    pub fn obligation(mut self, obligation: AttributeAssignment) -> Self {
        self.obligations.push(obligation);
        self
    }

    /// Build the policy.
    pub fn build(self) -> Result<Policy> {
        let describe = if self.hidden {
            "hidden policy".to_string()
        } else {
            format!("policy {:?}", self.id)
        };
        let algorithm = self
            .algorithm
            .bind_children(&self.rules)
            .map_err(|err| err.bind(describe))?;

        Ok(Policy {
            id: self.id,
            hidden: self.hidden,
            target: self.target,
            rules: self.rules,
            algorithm,
            obligations: self.obligations,
        })
    }
}
