//! Policy tree: rules, policies and policy sets.
//!
//! Every node is immutable once built. Updates go through `append` and
//! `delete` which return a modified copy sharing untouched subtrees with the
//! original, so readers holding the old tree keep a consistent snapshot.

mod decision;
#[allow(clippy::module_inception)]
mod policy;
mod policy_set;
mod rule;
mod target;

pub use decision::{Effect, Response, EFFECTS};
pub use policy::{Policy, PolicyBuilder};
pub use policy_set::{PolicySet, PolicySetBuilder};
pub use rule::{Rule, RuleBuilder};
pub use target::{AllOf, AnyOf, Match, Target};

use crate::context::Context;
use crate::core::Combinable;
use crate::error::{Error, ErrorKind, Result};

/// Policy or policy set.
#[derive(Debug, Clone)]
pub enum Evaluable {
    /// Policy
    Policy(Policy),
    /// Policy set
    PolicySet(PolicySet),
}

impl Evaluable {
    /// Node id.
    pub fn id(&self) -> &str {
        match self {
            Evaluable::Policy(p) => p.id(),
            Evaluable::PolicySet(p) => p.id(),
        }
    }

    /// Whether the node can't be addressed by updates.
    pub fn is_hidden(&self) -> bool {
        match self {
            Evaluable::Policy(p) => p.is_hidden(),
            Evaluable::PolicySet(p) => p.is_hidden(),
        }
    }

    /// Id of the node unless it is hidden.
    pub fn visible_id(&self) -> Option<&str> {
        (!self.is_hidden()).then_some(self.id())
    }

    /// Description used in error paths.
    pub fn describe(&self) -> String {
        match self {
            Evaluable::Policy(p) => p.describe(),
            Evaluable::PolicySet(p) => p.describe(),
        }
    }

    /// Evaluate the node.
    pub fn calculate(&self, ctx: &Context) -> Response {
        match self {
            Evaluable::Policy(p) => p.calculate(ctx),
            Evaluable::PolicySet(p) => p.calculate(ctx),
        }
    }

    /// Copy of the node with the item added at the path.
    pub fn append(&self, path: &[String], item: UpdateEntity) -> Result<Self> {
        match self {
            Evaluable::Policy(p) => p.append(path, item).map(Evaluable::Policy),
            Evaluable::PolicySet(p) => p.append(path, item).map(Evaluable::PolicySet),
        }
    }

    /// Copy of the node without the item at the path.
    pub fn delete(&self, path: &[String]) -> Result<Self> {
        match self {
            Evaluable::Policy(p) => p.delete(path).map(Evaluable::Policy),
            Evaluable::PolicySet(p) => p.delete(path).map(Evaluable::PolicySet),
        }
    }
}

impl From<Policy> for Evaluable {
    fn from(p: Policy) -> Self {
        Evaluable::Policy(p)
    }
}

impl From<PolicySet> for Evaluable {
    fn from(p: PolicySet) -> Self {
        Evaluable::PolicySet(p)
    }
}

impl Combinable for Evaluable {
    fn visible_id(&self) -> Option<&str> {
        Evaluable::visible_id(self)
    }

    fn calculate(&self, ctx: &Context) -> Response {
        Evaluable::calculate(self, ctx)
    }

    fn missing_default(id: &str) -> Error {
        Error::new(ErrorKind::MissingDefaultPolicy { id: id.to_string() })
    }

    fn missing_error(id: &str) -> Error {
        Error::new(ErrorKind::MissingErrorPolicy { id: id.to_string() })
    }
}

/// Item carried by an add command of a policy update.
#[derive(Debug, Clone)]
pub enum UpdateEntity {
    /// Rule to put into a policy
    Rule(Rule),
    /// Policy to put into a policy set or to make the root
    Policy(Policy),
    /// Policy set to put into a policy set or to make the root
    PolicySet(PolicySet),
}

impl UpdateEntity {
    /// Description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            UpdateEntity::Rule(r) => r.describe(),
            UpdateEntity::Policy(p) => p.describe(),
            UpdateEntity::PolicySet(p) => p.describe(),
        }
    }

    /// The entity as a policy tree node if it is one.
    pub fn into_evaluable(self) -> std::result::Result<Evaluable, Self> {
        match self {
            UpdateEntity::Policy(p) => Ok(Evaluable::Policy(p)),
            UpdateEntity::PolicySet(p) => Ok(Evaluable::PolicySet(p)),
            other => Err(other),
        }
    }
}

impl From<Rule> for UpdateEntity {
    fn from(r: Rule) -> Self {
        UpdateEntity::Rule(r)
    }
}

impl From<Policy> for UpdateEntity {
    fn from(p: Policy) -> Self {
        UpdateEntity::Policy(p)
    }
}

impl From<PolicySet> for UpdateEntity {
    fn from(p: PolicySet) -> Self {
        UpdateEntity::PolicySet(p)
    }
}

/// Response of a node whose target failed: the error is merged with the
/// status of its children and the effect widened to an indeterminate one.
pub(crate) fn combine_effect_and_status(err: Error, r: Response) -> Response {
    let err = match r.status {
        Some(status) => Error::multi(vec![err, status]),
        None => err,
    };

    let effect = match r.effect {
        Effect::NotApplicable => Effect::NotApplicable,
        Effect::Deny | Effect::IndeterminateD => Effect::IndeterminateD,
        Effect::Permit | Effect::IndeterminateP => Effect::IndeterminateP,
        _ => Effect::IndeterminateDP,
    };

    Response::with_status(effect, err)
}
