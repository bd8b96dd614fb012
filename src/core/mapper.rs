//! Mapper combining algorithm.
//!
//! The mapper evaluates an argument expression and uses its value as the
//! id (or ids) of the children to evaluate. With a nested algorithm the
//! argument may select several children which are then combined by that
//! algorithm in either their registration order or the order of ids in
//! the argument value.

use super::{BasicAlgorithm, Combinable};
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::Expression;
use crate::policy::{Effect, Response};
use crate::value::AttributeValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Order in which the mapper hands selected children to its nested
/// algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapperOrder {
    /// Registration order of the children
    #[default]
    Internal,
    /// Order of ids in the argument value
    External,
}

/// Mapper algorithm state.
#[derive(Debug)]
pub struct Mapper<T> {
    argument: Expression,
    order: MapperOrder,
    algorithm: Option<BasicAlgorithm>,
    children: HashMap<String, Arc<T>>,
    default_id: Option<String>,
    default: Option<Arc<T>>,
    error_id: Option<String>,
    error: Option<Arc<T>>,
}

impl<T> Clone for Mapper<T> {
    fn clone(&self) -> Self {
        Self {
            argument: self.argument.clone(),
            order: self.order,
            algorithm: self.algorithm,
            children: self.children.clone(),
            default_id: self.default_id.clone(),
            default: self.default.clone(),
            error_id: self.error_id.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T: Combinable> Mapper<T> {
    /// Create a mapper keyed by the argument.
    pub fn new(argument: Expression) -> Self {
        Self {
            argument,
            order: MapperOrder::default(),
            algorithm: None,
            children: HashMap::new(),
            default_id: None,
            default: None,
            error_id: None,
            error: None,
        }
    }

    /// Set the order of selected children.
    pub fn order(mut self, order: MapperOrder) -> Self {
        self.order = order;
        self
    }

    /// Combine several selected children with the algorithm.
    pub fn algorithm(mut self, algorithm: BasicAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Child evaluated when nothing is selected.
    pub fn default_child(mut self, id: impl Into<String>) -> Self {
        self.default_id = Some(id.into());
        self
    }

    /// Child evaluated when the argument can't be calculated.
    pub fn error_child(mut self, id: impl Into<String>) -> Self {
        self.error_id = Some(id.into());
        self
    }

    /// Argument expression.
    pub fn argument(&self) -> &Expression {
        &self.argument
    }

    /// Ids of the default and error children.
    pub fn special_ids(&self) -> (Option<&str>, Option<&str>) {
        (self.default_id.as_deref(), self.error_id.as_deref())
    }

    pub(crate) fn bind_children(mut self, children: &[Arc<T>]) -> Result<Self> {
        self.children = children
            .iter()
            .filter_map(|c| c.visible_id().map(|id| (id.to_string(), Arc::clone(c))))
            .collect();

        if let Some(id) = &self.default_id {
            match self.children.get(id) {
                Some(c) => self.default = Some(Arc::clone(c)),
                None => return Err(T::missing_default(id)),
            }
        }

        if let Some(id) = &self.error_id {
            match self.children.get(id) {
                Some(c) => self.error = Some(Arc::clone(c)),
                None => return Err(T::missing_error(id)),
            }
        }

        Ok(self)
    }

    pub(crate) fn added(&self, id: &str, child: &Arc<T>) -> Self {
        let mut m = self.clone();
        m.children.insert(id.to_string(), Arc::clone(child));
        if m.default_id.as_deref() == Some(id) {
            m.default = Some(Arc::clone(child));
        }
        if m.error_id.as_deref() == Some(id) {
            m.error = Some(Arc::clone(child));
        }
        m
    }

    pub(crate) fn deleted(&self, id: &str) -> Self {
        let mut m = self.clone();
        m.children.remove(id);
        if m.default_id.as_deref() == Some(id) {
            m.default_id = None;
            m.default = None;
        }
        if m.error_id.as_deref() == Some(id) {
            m.error_id = None;
            m.error = None;
        }
        m
    }

    pub(crate) fn execute(&self, children: &[Arc<T>], ctx: &Context) -> Response {
        let v = match self.argument.calculate(ctx) {
            Ok(v) => v,
            Err(err) => {
                if err.is_missing_value() {
                    if let Some(d) = &self.default {
                        return d.calculate(ctx);
                    }
                }
                return self.on_error(err, ctx);
            }
        };

        let Some(alg) = self.algorithm else {
            let id = match &v {
                AttributeValue::String(s) => s,
                v => return self.on_error(argument_type(v), ctx),
            };

            return match self.children.get(id) {
                Some(c) => c.calculate(ctx),
                None => self.or_default(ctx),
            };
        };

        let ids = match selected_ids(&v) {
            Ok(ids) => ids,
            Err(err) => return self.on_error(err, ctx),
        };

        let r = match self.order {
            MapperOrder::Internal => {
                let ids: HashSet<&str> = ids.into_iter().collect();
                alg.execute(
                    children
                        .iter()
                        .filter(|c| c.visible_id().is_some_and(|id| ids.contains(id)))
                        .map(AsRef::as_ref),
                    ctx,
                )
            }
            MapperOrder::External => {
                let mut seen = HashSet::new();
                alg.execute(
                    ids.into_iter()
                        .filter(|id| seen.insert(*id))
                        .filter_map(|id| self.children.get(id))
                        .map(AsRef::as_ref),
                    ctx,
                )
            }
        };

        if r.effect == Effect::NotApplicable {
            return self.or_default(ctx);
        }

        r
    }

    fn or_default(&self, ctx: &Context) -> Response {
        match &self.default {
            Some(d) => d.calculate(ctx),
            None => Response::not_applicable(),
        }
    }

    fn on_error(&self, err: Error, ctx: &Context) -> Response {
        match &self.error {
            Some(e) => e.calculate(ctx),
            None => Response::with_status(Effect::Indeterminate, err.bind("mapper")),
        }
    }
}

fn argument_type(v: &AttributeValue) -> Error {
    Error::new(ErrorKind::MapperArgumentType {
        actual: v.get_result_type().name().to_string(),
    })
}

fn selected_ids(v: &AttributeValue) -> Result<Vec<&str>> {
    match v {
        AttributeValue::String(s) => Ok(vec![s.as_str()]),
        AttributeValue::SetOfStrings(set) => Ok(set.iter_sorted_by_insertion()),
        AttributeValue::ListOfStrings(list) => Ok(list.iter().map(String::as_str).collect()),
        AttributeValue::Flags(..) => v.flag_names(),
        v => Err(argument_type(v)),
    }
}
