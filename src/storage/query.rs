//! Read-only queries over the policy tree.

use crate::error::{Error, ErrorKind, Result};
use crate::policy::{Evaluable, Rule};
use serde::Serialize;

/// Node found by a query.
#[derive(Debug, Clone, Copy)]
pub enum PolicyNode<'a> {
    /// Policy or policy set
    Evaluable(&'a Evaluable),
    /// Rule of a policy
    Rule(&'a Rule),
}

impl<'a> PolicyNode<'a> {
    /// Id of the node.
    pub fn id(&self) -> &'a str {
        match *self {
            PolicyNode::Evaluable(e) => e.id(),
            PolicyNode::Rule(r) => r.id(),
        }
    }

    fn visible_children(&self) -> Vec<PolicyNode<'a>> {
        match *self {
            PolicyNode::Evaluable(Evaluable::Policy(p)) => p
                .rules()
                .iter()
                .filter(|r| !r.is_hidden())
                .map(|r| PolicyNode::Rule(r.as_ref()))
                .collect(),
            PolicyNode::Evaluable(Evaluable::PolicySet(p)) => p
                .policies()
                .iter()
                .filter(|e| !e.is_hidden())
                .map(|e| PolicyNode::Evaluable(e.as_ref()))
                .collect(),
            PolicyNode::Rule(_) => Vec::new(),
        }
    }
}

pub(super) fn get_path<'a>(root: Option<&'a Evaluable>, path: &[String]) -> Result<PolicyNode<'a>> {
    let invalid_root = || Error::new(ErrorKind::InvalidRootQuery);

    let (id, rest) = path.split_first().ok_or_else(invalid_root)?;
    let root = root.ok_or_else(invalid_root)?;
    if root.visible_id() != Some(id.as_str()) {
        return Err(invalid_root());
    }

    let mut node = PolicyNode::Evaluable(root);
    for id in rest {
        node = match node {
            PolicyNode::Evaluable(Evaluable::PolicySet(p)) => p
                .policies()
                .iter()
                .find(|e| e.visible_id() == Some(id.as_str()))
                .map(|e| PolicyNode::Evaluable(e.as_ref()))
                .ok_or_else(|| Error::new(ErrorKind::QueriedElementNotFound { id: id.clone() }))?,
            PolicyNode::Evaluable(Evaluable::Policy(p)) => p
                .rules()
                .iter()
                .find(|r| !r.is_hidden() && r.id() == id.as_str())
                .map(|r| PolicyNode::Rule(r.as_ref()))
                .ok_or_else(|| Error::new(ErrorKind::QueriedRuleNotFound { id: id.clone() }))?,
            PolicyNode::Rule(_) => {
                return Err(Error::new(ErrorKind::QueriedElementNotFound { id: id.clone() }))
            }
        };
    }

    Ok(node)
}

#[derive(Serialize)]
struct Subtree<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    elems: Option<Elems<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Elems<'a> {
    Truncated(&'static str),
    Nodes(Vec<Subtree<'a>>),
}

fn subtree(node: PolicyNode<'_>, depth: usize) -> Subtree<'_> {
    let elems = match node {
        PolicyNode::Rule(_) => None,
        PolicyNode::Evaluable(_) if depth == 0 => Some(Elems::Truncated("...")),
        PolicyNode::Evaluable(_) => Some(Elems::Nodes(
            node.visible_children()
                .into_iter()
                .map(|child| subtree(child, depth - 1))
                .collect(),
        )),
    };

    Subtree {
        id: node.id(),
        elems,
    }
}

/// JSON outline of the subtree down to the given depth. Nodes below the
/// depth limit have `"..."` in place of their children.
pub fn subtree_json(node: PolicyNode<'_>, depth: usize) -> String {
    serde_json::to_string(&subtree(node, depth)).unwrap_or_default()
}

/// Depth-first search for a visible node with the id below `node`.
///
/// Returns the path of ids from the first level below `node` down to the
/// found node inclusive.
pub fn path_query<'a>(node: PolicyNode<'a>, id: &str) -> Result<(Vec<String>, PolicyNode<'a>)> {
    fn find<'a>(node: PolicyNode<'a>, id: &str, path: &mut Vec<String>) -> Option<PolicyNode<'a>> {
        for child in node.visible_children() {
            path.push(child.id().to_string());
            if child.id() == id {
                return Some(child);
            }
            if let Some(found) = find(child, id, path) {
                return Some(found);
            }
            path.pop();
        }
        None
    }

    let mut path = Vec::new();
    find(node, id, &mut path)
        .map(|found| (path, found))
        .ok_or_else(|| Error::new(ErrorKind::ElementNotFound { id: id.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Effect, Policy, PolicySet};
    use crate::storage::PolicyStorage;
    use std::collections::HashMap;

    fn rule(id: &str) -> Rule {
        Rule::builder(id).effect(Effect::Permit).build().unwrap()
    }

    fn tree(first_hidden: bool) -> Evaluable {
        PolicySet::builder("test")
            .policy(
                Policy::builder("first")
                    .hidden(first_hidden)
                    .rule(rule("permit"))
                    .rule(rule("permit2"))
                    .build()
                    .unwrap(),
            )
            .policy(
                PolicySet::builder("second")
                    .policy(Policy::builder("third").rule(rule("permit3")).build().unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
            .into()
    }

    fn path(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_path() {
        let s = PolicyStorage::new(Some(tree(false)), HashMap::new(), None);

        let node = s.get_path(&path(&["test", "first", "permit"])).unwrap();
        assert!(matches!(node, PolicyNode::Rule(r) if r.id() == "permit"));

        let node = s.get_path(&path(&["test", "first"])).unwrap();
        assert!(matches!(node, PolicyNode::Evaluable(Evaluable::Policy(_))));
        assert_eq!(s.get_path(&path(&["test"])).unwrap().id(), "test");

        let err = s.get_path(&path(&["test", "first", "permits"])).unwrap_err();
        assert_eq!(err.to_string(), "#45: Queried rule \"permits\" is not found");

        let err = s.get_path(&path(&["first", "permit"])).unwrap_err();
        assert_eq!(err.to_string(), "#43: Invalid root id or hidden root");

        let err = s.get_path(&path(&["test", "first", "permit", "x"])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::QueriedElementNotFound { .. }));
    }

    #[test]
    fn test_get_path_hidden() {
        let s = PolicyStorage::new(Some(tree(true)), HashMap::new(), None);
        let err = s.get_path(&path(&["test", "first", "permit"])).unwrap_err();
        assert_eq!(err.to_string(), "#44: Queried element \"first\" is not found");

        let root = PolicySet::builder("test").hidden(true).build().unwrap();
        let s = PolicyStorage::new(Some(root.into()), HashMap::new(), None);
        let err = s.get_path(&path(&["test"])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidRootQuery));

        let s = PolicyStorage::default();
        assert!(s.get_path(&path(&["test"])).is_err());
    }

    #[test]
    fn test_subtree_json() {
        let root = tree(false);
        let node = PolicyNode::Evaluable(&root);

        assert_eq!(subtree_json(node, 0), r#"{"id":"test","elems":"..."}"#);
        assert_eq!(
            subtree_json(node, 1),
            r#"{"id":"test","elems":[{"id":"first","elems":"..."},{"id":"second","elems":"..."}]}"#
        );
        assert_eq!(
            subtree_json(node, 2),
            concat!(
                r#"{"id":"test","elems":[{"id":"first","elems":[{"id":"permit"},{"id":"permit2"}]},"#,
                r#"{"id":"second","elems":[{"id":"third","elems":"..."}]}]}"#
            )
        );
        assert_eq!(
            subtree_json(node, 5),
            concat!(
                r#"{"id":"test","elems":[{"id":"first","elems":[{"id":"permit"},{"id":"permit2"}]},"#,
                r#"{"id":"second","elems":[{"id":"third","elems":[{"id":"permit3"}]}]}]}"#
            )
        );

        let r = rule("permit");
        assert_eq!(subtree_json(PolicyNode::Rule(&r), 0), r#"{"id":"permit"}"#);
    }

    #[test]
    fn test_path_query() {
        let root = tree(false);
        let node = PolicyNode::Evaluable(&root);

        let (p, found) = path_query(node, "permit2").unwrap();
        assert_eq!(p, path(&["first", "permit2"]));
        assert!(matches!(found, PolicyNode::Rule(r) if r.id() == "permit2"));

        let (p, _) = path_query(node, "permit").unwrap();
        assert_eq!(p, path(&["first", "permit"]));

        let (p, found) = path_query(node, "third").unwrap();
        assert_eq!(p, path(&["second", "third"]));
        assert!(matches!(found, PolicyNode::Evaluable(Evaluable::Policy(_))));

        let Evaluable::PolicySet(set) = &root else {
            panic!("root must be a policy set");
        };
        let second = PolicyNode::Evaluable(set.policies()[1].as_ref());
        let (p, _) = path_query(second, "permit3").unwrap();
        assert_eq!(p, path(&["third", "permit3"]));

        let err = path_query(node, "non-existent").unwrap_err();
        assert_eq!(err.to_string(), "#46: Element \"non-existent\" not found");
        assert!(path_query(second, "permit").is_err());
    }
}
