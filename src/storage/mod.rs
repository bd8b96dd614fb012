//! Policy storage and transactional updates.
//!
//! A [`PolicyStorage`] is an immutable snapshot of the policy tree. Changes
//! go through a [`PolicyStorageTransaction`] opened against the current tag.
//! The transaction works on its own copy-on-write version of the tree and
//! produces a brand-new storage on commit, leaving the original untouched.

mod query;
mod update;

pub use query::{path_query, subtree_json, PolicyNode};
pub use update::{Command, PolicyUpdate, UpdateOp};

use crate::error::{Error, ErrorKind, Result};
use crate::expression::Attribute;
use crate::policy::{Evaluable, UpdateEntity};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Immutable policy snapshot.
#[derive(Debug, Clone, Default)]
pub struct PolicyStorage {
    tag: Option<Uuid>,
    attrs: Arc<HashMap<String, Attribute>>,
    root: Option<Arc<Evaluable>>,
}

impl PolicyStorage {
    /// Create a storage. Storage without tag can't be modified.
    pub fn new(
        root: Option<Evaluable>,
        attrs: HashMap<String, Attribute>,
        tag: Option<Uuid>,
    ) -> Self {
        Self {
            tag,
            attrs: Arc::new(attrs),
            root: root.map(Arc::new),
        }
    }

    /// Root policy or policy set.
    pub fn root(&self) -> Option<&Arc<Evaluable>> {
        self.root.as_ref()
    }

    /// Current tag.
    pub fn tag(&self) -> Option<Uuid> {
        self.tag
    }

    /// Declared attributes.
    pub fn attributes(&self) -> &HashMap<String, Attribute> {
        &self.attrs
    }

    /// Open a transaction. The tag must match the storage's tag.
    pub fn new_transaction(&self, tag: Option<Uuid>) -> Result<PolicyStorageTransaction> {
        let current = self
            .tag
            .ok_or_else(|| Error::new(ErrorKind::UntaggedPolicyModification))?;
        let requested = tag.ok_or_else(|| Error::new(ErrorKind::MissingPolicyTag))?;
        if current != requested {
            return Err(Error::new(ErrorKind::PolicyTagsNotMatch {
                current: current.to_string(),
                requested: requested.to_string(),
            }));
        }

        Ok(PolicyStorageTransaction {
            base: current,
            tag: current,
            attrs: Arc::clone(&self.attrs),
            root: self.root.clone(),
            err: None,
        })
    }

    /// Node at the path of ids. The first element names the root.
    pub fn get_path(&self, path: &[String]) -> Result<PolicyNode<'_>> {
        query::get_path(self.root.as_deref(), path)
    }
}

/// Pending modification of a policy storage.
///
/// The first failed command poisons the transaction and every later
/// [`apply`](Self::apply) or [`commit`](Self::commit) reports
/// [`ErrorKind::FailedPolicyTransaction`].
#[derive(Debug)]
pub struct PolicyStorageTransaction {
    base: Uuid,
    tag: Uuid,
    attrs: Arc<HashMap<String, Attribute>>,
    root: Option<Arc<Evaluable>>,
    err: Option<Error>,
}

impl PolicyStorageTransaction {
    /// Tag of the storage the transaction was opened against.
    pub fn base_tag(&self) -> Uuid {
        self.base
    }

    /// Current tag of the transaction.
    pub fn tag(&self) -> Uuid {
        self.tag
    }

    /// Declared attributes.
    pub fn attributes(&self) -> &HashMap<String, Attribute> {
        &self.attrs
    }

    /// Current root of the modified tree.
    pub fn root(&self) -> Option<&Arc<Evaluable>> {
        self.root.as_ref()
    }

    /// Apply an update. On success the transaction moves to the new tag.
    pub fn apply(&mut self, u: &PolicyUpdate) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(Error::new(ErrorKind::FailedPolicyTransaction {
                cause: Box::new(err.clone()),
            }));
        }

        if u.old_tag() != self.tag {
            return Err(Error::new(ErrorKind::PolicyTagsNotMatch {
                current: self.tag.to_string(),
                requested: u.old_tag().to_string(),
            }));
        }

        for c in u.commands() {
            let res = match c.op() {
                UpdateOp::Add => match c.entity() {
                    Some(entity) => self.append_item(c.path(), entity.clone()),
                    None => Err(Error::new(ErrorKind::InvalidRootPolicyItemType {
                        item: "nothing".to_string(),
                    })),
                },
                UpdateOp::Delete => self.delete_item(c.path()),
            };

            if let Err(err) = res {
                warn!(tag = %self.tag, command = %c, error = %err, "Policy transaction failed");
                self.err = Some(err.clone());
                return Err(err);
            }
        }

        debug!(
            from = %self.tag,
            to = %u.new_tag(),
            commands = u.commands().len(),
            "Applied policy update"
        );
        self.tag = u.new_tag();
        Ok(())
    }

    /// Finish the transaction and return the new storage.
    pub fn commit(self) -> Result<PolicyStorage> {
        if let Some(err) = self.err {
            return Err(Error::new(ErrorKind::FailedPolicyTransaction {
                cause: Box::new(err),
            }));
        }

        Ok(PolicyStorage {
            tag: Some(self.tag),
            attrs: self.attrs,
            root: self.root,
        })
    }

    fn append_item(&mut self, path: &[String], item: UpdateEntity) -> Result<()> {
        let Some((id, rest)) = path.split_first() else {
            let root = item.into_evaluable().map_err(|item| {
                Error::new(ErrorKind::InvalidRootPolicyItemType {
                    item: item.describe(),
                })
            })?;
            if root.is_hidden() {
                return Err(Error::new(ErrorKind::HiddenRootPolicyAppend));
            }

            self.root = Some(Arc::new(root));
            return Ok(());
        };

        let root = self.checked_root(id)?;
        self.root = Some(Arc::new(root.append(rest, item)?));
        Ok(())
    }

    fn delete_item(&mut self, path: &[String]) -> Result<()> {
        let (id, rest) = path
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::EmptyPathModification))?;

        let root = self.checked_root(id)?;
        self.root = if rest.is_empty() {
            None
        } else {
            Some(Arc::new(root.delete(rest)?))
        };
        Ok(())
    }

    fn checked_root(&self, id: &str) -> Result<Arc<Evaluable>> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::MissingRootPolicy))?;

        match root.visible_id() {
            Some(actual) if actual != id => Err(Error::new(ErrorKind::InvalidRootPolicy {
                actual: actual.to_string(),
                requested: id.to_string(),
            })),
            _ => Ok(root),
        }
    }
}
