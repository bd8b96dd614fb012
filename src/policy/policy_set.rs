//! Policy sets: the inner nodes of the policy tree.

use super::{combine_effect_and_status, Evaluable, Response, Target, UpdateEntity};
use crate::context::Context;
use crate::core::CombiningAlgorithm;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::AttributeAssignment;
use std::sync::Arc;

/// A policy set combining policies and nested policy sets.
#[derive(Debug, Clone)]
pub struct PolicySet {
    id: String,
    hidden: bool,
    target: Target,
    policies: Vec<Arc<Evaluable>>,
    algorithm: CombiningAlgorithm<Evaluable>,
    obligations: Vec<AttributeAssignment>,
}

impl PolicySet {
    /// Create a policy set builder.
    pub fn builder(id: impl Into<String>) -> PolicySetBuilder {
        PolicySetBuilder::new(id)
    }

    /// Policy set id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the policy set can't be addressed by updates.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Id of the policy set unless it is hidden.
    pub fn visible_id(&self) -> Option<&str> {
        (!self.hidden).then_some(self.id.as_str())
    }

    /// Children in evaluation order.
    pub fn policies(&self) -> &[Arc<Evaluable>] {
        &self.policies
    }

    /// Policy combining algorithm.
    pub fn algorithm(&self) -> &CombiningAlgorithm<Evaluable> {
        &self.algorithm
    }

    /// Description used in error paths.
    pub fn describe(&self) -> String {
        match self.visible_id() {
            Some(id) => format!("policy set {id:?}"),
            None => "hidden policy set".to_string(),
        }
    }

    /// Evaluate the policy set.
    pub fn calculate(&self, ctx: &Context) -> Response {
        match self.target.calculate(ctx) {
            Ok(true) => {
                let mut r = self.algorithm.execute(&self.policies, ctx);
                if r.effect.is_decisive() {
                    r.obligations.extend(self.obligations.iter().cloned());
                }
                r.bind(self.describe())
            }
            Ok(false) => Response::not_applicable(),
            Err(err) => {
                combine_effect_and_status(err, self.algorithm.execute(&self.policies, ctx))
                    .bind(self.describe())
            }
        }
    }

    /// Copy of the policy set with the item added at the path. An empty
    /// path adds a policy or policy set directly to this set, otherwise the
    /// first element names the child to descend into.
    pub fn append(&self, path: &[String], item: UpdateEntity) -> Result<Self> {
        if self.hidden {
            return Err(Error::new(ErrorKind::HiddenPolicySetModification));
        }

        if let Some((id, rest)) = path.split_first() {
            let child = self.get_child(id).map_err(|err| err.bind(&self.id))?;
            let child = child.append(rest, item).map_err(|err| err.bind(&self.id))?;
            return Ok(self.put_child(Arc::new(child)));
        }

        let child = match item {
            UpdateEntity::Policy(p) => Evaluable::Policy(p),
            UpdateEntity::PolicySet(p) => Evaluable::PolicySet(p),
            other => {
                return Err(Error::new(ErrorKind::InvalidPolicySetItemType {
                    item: other.describe(),
                })
                .bind(&self.id))
            }
        };

        if child.visible_id().is_none() {
            return Err(Error::new(ErrorKind::HiddenPolicyAppend).bind(&self.id));
        }

        Ok(self.put_child(Arc::new(child)))
    }

    /// Copy of the policy set without the item at the path.
    pub fn delete(&self, path: &[String]) -> Result<Self> {
        if self.hidden {
            return Err(Error::new(ErrorKind::HiddenPolicySetModification));
        }

        let (id, rest) = path.split_first().ok_or_else(|| {
            Error::new(ErrorKind::TooShortPathPolicySetModification).bind(&self.id)
        })?;

        if rest.is_empty() {
            return self.del_child(id).map_err(|err| err.bind(&self.id));
        }

        let child = self.get_child(id).map_err(|err| err.bind(&self.id))?;
        let child = child.delete(rest).map_err(|err| err.bind(&self.id))?;
        Ok(self.put_child(Arc::new(child)))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.policies.iter().position(|p| p.visible_id() == Some(id))
    }

    fn get_child(&self, id: &str) -> Result<&Arc<Evaluable>> {
        self.position(id)
            .map(|i| &self.policies[i])
            .ok_or_else(|| Error::new(ErrorKind::MissingPolicySetChild { id: id.to_string() }))
    }

    fn put_child(&self, child: Arc<Evaluable>) -> Self {
        let id = child.id().to_string();
        let mut policies = self.policies.clone();
        match self.position(&id) {
            Some(i) => policies[i] = Arc::clone(&child),
            None => policies.push(Arc::clone(&child)),
        }

        Self {
            policies,
            algorithm: self.algorithm.child_added(&id, &child),
            ..self.clone()
        }
    }

    fn del_child(&self, id: &str) -> Result<Self> {
        let i = self.position(id).ok_or_else(|| {
            Error::new(ErrorKind::MissingPolicySetChild { id: id.to_string() })
        })?;

        let mut policies = self.policies.clone();
        policies.remove(i);

        Ok(Self {
            policies,
            algorithm: self.algorithm.child_deleted(id),
            ..self.clone()
        })
    }
}

/// Builder for creating policy sets.
#[derive(Debug)]
pub struct PolicySetBuilder {
    id: String,
    hidden: bool,
    target: Target,
    policies: Vec<Arc<Evaluable>>,
    algorithm: CombiningAlgorithm<Evaluable>,
    obligations: Vec<AttributeAssignment>,
}

impl PolicySetBuilder {
    /// Create a new policy set builder with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hidden: false,
            target: Target::default(),
            policies: Vec::new(),
            algorithm: CombiningAlgorithm::default(),
            obligations: Vec::new(),
        }
    }

    /// Hide the policy set from updates.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the target.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Add a policy or policy set.
    pub fn policy(mut self, policy: impl Into<Evaluable>) -> Self {
        self.policies.push(Arc::new(policy.into()));
        self
    }

    /// Set the policy combining algorithm.
    pub fn algorithm(mut self, algorithm: impl Into<CombiningAlgorithm<Evaluable>>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Add an obligation.
    pub fn obligation(mut self, obligation: AttributeAssignment) -> Self {
        self.obligations.push(obligation);
        self
    }

    /// Build the policy set.
    pub fn build(self) -> Result<PolicySet> {
        let describe = if self.hidden {
            "hidden policy set".to_string()
        } else {
            format!("policy set {:?}", self.id)
        };
        let algorithm = self
            .algorithm
            .bind_children(&self.policies)
            .map_err(|err| err.bind(describe))?;

        Ok(PolicySet {
            id: self.id,
            hidden: self.hidden,
            target: self.target,
            policies: self.policies,
            algorithm,
            obligations: self.obligations,
        })
    }
}
