//! Combining algorithms.
//!
//! A combining algorithm reduces the responses of the children of a policy
//! (rules) or a policy set (policies and policy sets) into one response.
//! All algorithms are generic over [`Combinable`] so the same code serves
//! both levels of the tree.

mod mapper;

pub use mapper::{Mapper, MapperOrder};

use crate::context::Context;
use crate::error::Error;
use crate::policy::{Effect, Response};
use std::fmt;
use std::sync::Arc;

/// Child of a policy or policy set.
pub trait Combinable: fmt::Debug {
    /// Id of the child unless it is hidden.
    fn visible_id(&self) -> Option<&str>;

    /// Evaluate the child.
    fn calculate(&self, ctx: &Context) -> Response;

    /// Error for a mapper default child missing among the children.
    fn missing_default(id: &str) -> Error;

    /// Error for a mapper error child missing among the children.
    fn missing_error(id: &str) -> Error;
}

/// Algorithms which combine a plain list of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicAlgorithm {
    /// First child with an applicable effect decides
    FirstApplicableEffect,
    /// Any deny decides, otherwise any permit
    DenyOverrides,
}

impl BasicAlgorithm {
    /// Algorithm name.
    pub fn name(self) -> &'static str {
        match self {
            BasicAlgorithm::FirstApplicableEffect => "first applicable effect",
            BasicAlgorithm::DenyOverrides => "deny overrides",
        }
    }

    /// Combine the children in iteration order.
    pub fn execute<'a, T, I>(self, children: I, ctx: &Context) -> Response
    where
        T: Combinable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        match self {
            BasicAlgorithm::FirstApplicableEffect => first_applicable_effect(children, ctx),
            BasicAlgorithm::DenyOverrides => deny_overrides(children, ctx),
        }
    }
}

/// Combining algorithm of a policy or policy set.
#[derive(Debug)]
pub enum CombiningAlgorithm<T> {
    /// First child with an applicable effect decides
    FirstApplicableEffect,
    /// Any deny decides, otherwise any permit
    DenyOverrides,
    /// Children picked by value of an expression
    Mapper(Mapper<T>),
}

// Children sit behind `Arc`, so cloning never needs `T: Clone`.
impl<T> Clone for CombiningAlgorithm<T> {
    fn clone(&self) -> Self {
        match self {
            CombiningAlgorithm::FirstApplicableEffect => CombiningAlgorithm::FirstApplicableEffect,
            CombiningAlgorithm::DenyOverrides => CombiningAlgorithm::DenyOverrides,
            CombiningAlgorithm::Mapper(m) => CombiningAlgorithm::Mapper(m.clone()),
        }
    }
}

impl<T> Default for CombiningAlgorithm<T> {
    fn default() -> Self {
        CombiningAlgorithm::FirstApplicableEffect
    }
}

impl<T> From<BasicAlgorithm> for CombiningAlgorithm<T> {
    fn from(a: BasicAlgorithm) -> Self {
        match a {
            BasicAlgorithm::FirstApplicableEffect => CombiningAlgorithm::FirstApplicableEffect,
            BasicAlgorithm::DenyOverrides => CombiningAlgorithm::DenyOverrides,
        }
    }
}

impl<T: Combinable> CombiningAlgorithm<T> {
    /// Algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            CombiningAlgorithm::FirstApplicableEffect => BasicAlgorithm::FirstApplicableEffect.name(),
            CombiningAlgorithm::DenyOverrides => BasicAlgorithm::DenyOverrides.name(),
            CombiningAlgorithm::Mapper(_) => "mapper",
        }
    }

    /// Combine the children.
    pub fn execute(&self, children: &[Arc<T>], ctx: &Context) -> Response {
        match self {
            CombiningAlgorithm::FirstApplicableEffect => {
                first_applicable_effect(children.iter().map(AsRef::as_ref), ctx)
            }
            CombiningAlgorithm::DenyOverrides => {
                deny_overrides(children.iter().map(AsRef::as_ref), ctx)
            }
            CombiningAlgorithm::Mapper(m) => m.execute(children, ctx),
        }
    }

    /// Resolve mapper references against the children.
    pub(crate) fn bind_children(self, children: &[Arc<T>]) -> crate::Result<Self> {
        match self {
            CombiningAlgorithm::Mapper(m) => m.bind_children(children).map(CombiningAlgorithm::Mapper),
            alg => Ok(alg),
        }
    }

    /// Algorithm after a child was added or replaced.
    pub(crate) fn child_added(&self, id: &str, child: &Arc<T>) -> Self {
        match self {
            CombiningAlgorithm::Mapper(m) => CombiningAlgorithm::Mapper(m.added(id, child)),
            alg => alg.clone(),
        }
    }

    /// Algorithm after a child was deleted.
    pub(crate) fn child_deleted(&self, id: &str) -> Self {
        match self {
            CombiningAlgorithm::Mapper(m) => CombiningAlgorithm::Mapper(m.deleted(id)),
            alg => alg.clone(),
        }
    }
}

fn first_applicable_effect<'a, T, I>(children: I, ctx: &Context) -> Response
where
    T: Combinable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    for child in children {
        let r = child.calculate(ctx);
        if r.effect != Effect::NotApplicable {
            return r;
        }
    }

    Response::not_applicable()
}

fn deny_overrides<'a, T, I>(children: I, ctx: &Context) -> Response
where
    T: Combinable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut errs = Vec::new();
    let mut obligations = Vec::new();
    let (mut indet_d, mut indet_p, mut indet_dp, mut permits) = (0usize, 0usize, 0usize, 0usize);

    for child in children {
        let r = child.calculate(ctx);
        match r.effect {
            Effect::Deny => return r,
            Effect::Permit => {
                permits += 1;
                obligations.extend(r.obligations);
                continue;
            }
            Effect::NotApplicable => continue,
            Effect::IndeterminateD => indet_d += 1,
            Effect::IndeterminateP => indet_p += 1,
            Effect::Indeterminate | Effect::IndeterminateDP => indet_dp += 1,
        }

        if let Some(status) = r.status {
            errs.push(status);
        }
    }

    let status = match errs.len() {
        0 => None,
        1 => Some(errs.remove(0)),
        _ => Some(Error::multi(errs)),
    }
    .map(|err| err.bind("deny overrides"));

    let with_status = |effect| Response {
        effect,
        status: status.clone(),
        obligations: Vec::new(),
    };

    if indet_dp > 0 || (indet_d > 0 && (indet_p > 0 || permits > 0)) {
        return with_status(Effect::IndeterminateDP);
    }
    if indet_d > 0 {
        return with_status(Effect::IndeterminateD);
    }
    if permits > 0 {
        return Response::with_obligations(Effect::Permit, obligations);
    }
    if indet_p > 0 {
        return with_status(Effect::IndeterminateP);
    }

    Response::not_applicable()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::expression::AttributeAssignment;
    use crate::value::AttributeValue;

    /// Child answering with a fixed response. Not `Clone`, so the
    /// algorithms are exercised without that bound.
    #[derive(Debug)]
    pub(crate) struct Fixed {
        pub(crate) id: &'static str,
        pub(crate) effect: Effect,
    }

    impl Fixed {
        pub(crate) fn new(id: &'static str, effect: Effect) -> Arc<Self> {
            Arc::new(Self { id, effect })
        }
    }

    impl Combinable for Fixed {
        fn visible_id(&self) -> Option<&str> {
            Some(self.id)
        }

        fn calculate(&self, _ctx: &Context) -> Response {
            match self.effect {
                Effect::Deny | Effect::Permit => Response::with_obligations(
                    self.effect,
                    vec![AttributeAssignment::with_value(
                        "from",
                        AttributeValue::String(self.id.to_string()),
                    )],
                ),
                Effect::NotApplicable => Response::not_applicable(),
                e => Response::with_status(e, Error::missing_value().bind(self.id)),
            }
        }

        fn missing_default(id: &str) -> Error {
            Error::new(ErrorKind::MissingDefaultRule { id: id.to_string() })
        }

        fn missing_error(id: &str) -> Error {
            Error::new(ErrorKind::MissingErrorRule { id: id.to_string() })
        }
    }

    pub(crate) fn from(r: &Response) -> Vec<String> {
        r.obligations
            .iter()
            .map(|o| o.serialize(&Context::empty()).unwrap().2)
            .collect()
    }

    #[test]
    fn test_first_applicable_effect() {
        let children = vec![
            Fixed::new("a", Effect::NotApplicable),
            Fixed::new("b", Effect::Deny),
            Fixed::new("c", Effect::Permit),
        ];
        let r = CombiningAlgorithm::FirstApplicableEffect.execute(&children, &Context::empty());
        assert_eq!(r.effect, Effect::Deny);
        assert_eq!(from(&r), ["b"]);

        let r = CombiningAlgorithm::<Fixed>::FirstApplicableEffect.execute(&[], &Context::empty());
        assert_eq!(r.effect, Effect::NotApplicable);
    }

    #[test]
    fn test_deny_overrides_deny_wins() {
        let children = vec![
            Fixed::new("p", Effect::Permit),
            Fixed::new("i", Effect::IndeterminateDP),
            Fixed::new("d", Effect::Deny),
            Fixed::new("p2", Effect::Permit),
        ];
        let r = CombiningAlgorithm::DenyOverrides.execute(&children, &Context::empty());
        assert_eq!(r.effect, Effect::Deny);
        assert_eq!(from(&r), ["d"]);
        assert!(r.status.is_none());
    }

    #[test]
    fn test_deny_overrides_precedence() {
        let ctx = Context::empty();
        let run = |effects: &[Effect]| {
            let children: Vec<Arc<Fixed>> = effects
                .iter()
                .enumerate()
                .map(|(i, e)| Fixed::new(["a", "b", "c"][i], *e))
                .collect();
            CombiningAlgorithm::DenyOverrides.execute(&children, &ctx)
        };

        assert_eq!(
            run(&[Effect::IndeterminateD, Effect::Permit]).effect,
            Effect::IndeterminateDP
        );
        assert_eq!(
            run(&[Effect::IndeterminateD, Effect::NotApplicable]).effect,
            Effect::IndeterminateD
        );
        assert_eq!(
            run(&[Effect::IndeterminateP, Effect::Permit]).effect,
            Effect::Permit
        );
        assert_eq!(
            run(&[Effect::IndeterminateP, Effect::NotApplicable]).effect,
            Effect::IndeterminateP
        );
        assert_eq!(
            run(&[Effect::NotApplicable, Effect::NotApplicable]).effect,
            Effect::NotApplicable
        );

        let r = run(&[Effect::Permit, Effect::Permit]);
        assert_eq!(from(&r), ["a", "b"]);

        let r = run(&[Effect::IndeterminateD, Effect::IndeterminateP]);
        assert_eq!(r.effect, Effect::IndeterminateDP);
        assert_eq!(
            r.status.unwrap().to_string(),
            "#01 (deny overrides): multiple errors: #03 (a): Missing value, #03 (b): Missing value"
        );
    }
}
