use super::{ContentItem, ContentSubItem, LocalContent, LocalContentStorage};
use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::storage::UpdateOp;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Entity carried by an add command.
#[derive(Debug, Clone)]
pub enum ContentEntity {
    /// Whole item placed by item id
    Item(ContentItem),
    /// Map or value placed under a key path inside an item
    SubItem(ContentSubItem),
}

impl ContentEntity {
    fn name(&self) -> &'static str {
        match self {
            ContentEntity::Item(_) => "content item",
            ContentEntity::SubItem(s) => s.kind_name(),
        }
    }
}

/// Single modification of a content.
#[derive(Debug, Clone)]
pub struct ContentCommand {
    op: UpdateOp,
    path: Vec<String>,
    entity: Option<ContentEntity>,
}

impl ContentCommand {
    /// Operation.
    pub fn op(&self) -> UpdateOp {
        self.op
    }

    /// Item id followed by keys inside the item.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// JSON rendering of the command.
    pub fn to_json(&self) -> JsonValue {
        let mut v = json!({ "op": self.op.name(), "path": self.path });
        if let (UpdateOp::Add, Some(ContentEntity::Item(item))) = (self.op, &self.entity) {
            v["entity"] = item.to_json();
        }
        v
    }
}

/// Set of commands moving a content from one tag to another.
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    content_id: String,
    old_tag: Uuid,
    new_tag: Uuid,
    commands: Vec<ContentCommand>,
}

impl ContentUpdate {
    /// Create an empty update.
    pub fn new(content_id: impl Into<String>, old_tag: Uuid, new_tag: Uuid) -> Self {
        Self {
            content_id: content_id.into(),
            old_tag,
            new_tag,
            commands: Vec::new(),
        }
    }

    /// Append a command.
    pub fn append(&mut self, op: UpdateOp, path: Vec<String>, entity: Option<ContentEntity>) {
        self.commands.push(ContentCommand { op, path, entity });
    }

    /// Id of the content the update applies to.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Tag the content must carry before the update.
    pub fn old_tag(&self) -> Uuid {
        self.old_tag
    }

    /// Tag the content carries after the update.
    pub fn new_tag(&self) -> Uuid {
        self.new_tag
    }

    /// Commands of the update.
    pub fn commands(&self) -> &[ContentCommand] {
        &self.commands
    }
}

impl fmt::Display for ContentUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "content update: {} -> {}, content: {:?}",
            self.old_tag, self.new_tag, self.content_id
        )?;
        if self.commands.is_empty() {
            return f.write_str("\nno commands");
        }

        f.write_str("\ncommands:")?;
        for c in &self.commands {
            write!(f, "\n- {}", c.to_json())?;
        }
        Ok(())
    }
}

/// Pending modification of one content.
///
/// The first failed command poisons the transaction, every later call
/// reports [`ErrorKind::FailedContentTransaction`].
#[derive(Debug)]
pub struct ContentTransaction {
    id: String,
    base: Uuid,
    tag: Uuid,
    items: HashMap<String, Arc<ContentItem>>,
    err: Option<Error>,
}

impl ContentTransaction {
    pub(super) fn new(content: &LocalContent, tag: Uuid) -> Self {
        Self {
            id: content.id.clone(),
            base: tag,
            tag,
            items: content.items.clone(),
            err: None,
        }
    }

    /// Id of the content being modified.
    pub fn content_id(&self) -> &str {
        &self.id
    }

    /// Tag of the content the transaction was opened against.
    pub fn base_tag(&self) -> Uuid {
        self.base
    }

    /// Current tag of the transaction.
    pub fn tag(&self) -> Uuid {
        self.tag
    }

    /// Apply an update. On success the transaction moves to the new tag.
    pub fn apply(&mut self, u: &ContentUpdate) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(Error::new(ErrorKind::FailedContentTransaction {
                cause: Box::new(err.clone()),
            }));
        }

        if u.old_tag != self.tag {
            return Err(Error::new(ErrorKind::ContentTagsNotMatch {
                id: self.id.clone(),
                current: self.tag.to_string(),
                requested: u.old_tag.to_string(),
            }));
        }

        for c in &u.commands {
            let res = match c.op {
                UpdateOp::Add => self.add(&c.path, c.entity.as_ref()),
                UpdateOp::Delete => self.delete(&c.path),
            };
            if let Err(err) = res {
                self.err = Some(err.clone());
                return Err(err);
            }
        }

        debug!(
            content = %self.id,
            from = %self.tag,
            to = %u.new_tag,
            commands = u.commands.len(),
            "Applied content update"
        );
        self.tag = u.new_tag;
        Ok(())
    }

    /// Finish the transaction and return the storage with updated content.
    pub fn commit(self, storage: &LocalContentStorage) -> Result<LocalContentStorage> {
        if let Some(err) = self.err {
            return Err(Error::new(ErrorKind::FailedContentTransaction {
                cause: Box::new(err),
            }));
        }

        Ok(storage.add(LocalContent {
            id: self.id,
            tag: Some(self.tag),
            items: self.items,
        }))
    }

    fn add(&mut self, path: &[String], entity: Option<&ContentEntity>) -> Result<()> {
        let (id, keys) = path
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::EmptyPathModification))?;

        match (keys.is_empty(), entity) {
            (true, Some(ContentEntity::Item(item))) => {
                self.items.insert(id.clone(), Arc::new(item.clone()));
                Ok(())
            }
            (false, Some(ContentEntity::SubItem(sub))) => {
                let item = self.item_for_keys(id, keys)?;
                let root = item
                    .root()
                    .set_at(keys, sub.clone())
                    .bind_with(|| format!("content item {id:?}"))?;
                self.items.insert(id.clone(), Arc::new(item.with_root(root)));
                Ok(())
            }
            (true, e) => Err(invalid_entity("content item", e)),
            (false, e) => Err(invalid_entity("content sub-item", e)),
        }
    }

    fn delete(&mut self, path: &[String]) -> Result<()> {
        let (id, keys) = path
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::EmptyPathModification))?;

        if keys.is_empty() {
            return match self.items.remove(id) {
                Some(_) => Ok(()),
                None => Err(Error::new(ErrorKind::MissingContentItem))
                    .bind(format!("content item {id:?}")),
            };
        }

        let item = self.item_for_keys(id, keys)?;
        let root = item
            .root()
            .remove_at(keys)
            .bind_with(|| format!("content item {id:?}"))?;
        self.items.insert(id.clone(), Arc::new(item.with_root(root)));
        Ok(())
    }

    fn item_for_keys(&self, id: &str, keys: &[String]) -> Result<Arc<ContentItem>> {
        let item = self
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::MissingContentItem))
            .bind_with(|| format!("content item {id:?}"))?;

        if keys.len() > item.keys().len() {
            return Err(Error::new(ErrorKind::TooLongContentUpdatePath {
                keys: item.keys().len(),
                len: keys.len(),
            })
            .bind(format!("content item {id:?}")));
        }

        Ok(item)
    }
}

fn invalid_entity(expected: &str, actual: Option<&ContentEntity>) -> Error {
    Error::new(ErrorKind::InvalidContentUpdateEntity {
        expected: expected.to_string(),
        actual: actual.map_or("nothing", ContentEntity::name).to_string(),
    })
}
