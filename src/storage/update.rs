//! Policy update commands.

use crate::error::{Error, ErrorKind};
use crate::policy::UpdateEntity;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    /// Add or replace an item
    Add,
    /// Remove an item
    Delete,
}

impl UpdateOp {
    /// Operation name as rendered in updates.
    pub fn name(self) -> &'static str {
        match self {
            UpdateOp::Add => "Add",
            UpdateOp::Delete => "Delete",
        }
    }
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UpdateOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add" => Ok(UpdateOp::Add),
            "delete" => Ok(UpdateOp::Delete),
            _ => Err(Error::new(ErrorKind::UnknownPolicyUpdateOperation {
                op: s.to_string(),
            })),
        }
    }
}

/// Single command of a policy update.
#[derive(Debug, Clone)]
pub struct Command {
    op: UpdateOp,
    path: Vec<String>,
    entity: Option<UpdateEntity>,
}

impl Command {
    /// Operation.
    pub fn op(&self) -> UpdateOp {
        self.op
    }

    /// Path of ids from the root to the modified node.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Item to add.
    pub fn entity(&self) -> Option<&UpdateEntity> {
        self.entity.as_ref()
    }

    /// JSON form without the entity.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "op": self.op.name(),
            "path": self.path,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(|p| format!("{p:?}")).collect();
        write!(f, "{} path ({})", self.op, path.join("/"))
    }
}

/// Set of commands moving policies from one tag to another.
#[derive(Debug, Clone)]
pub struct PolicyUpdate {
    old_tag: Uuid,
    new_tag: Uuid,
    commands: Vec<Command>,
}

impl PolicyUpdate {
    /// Create an empty update.
    pub fn new(old_tag: Uuid, new_tag: Uuid) -> Self {
        Self {
            old_tag,
            new_tag,
            commands: Vec::new(),
        }
    }

    /// Append a command.
    pub fn append(&mut self, op: UpdateOp, path: Vec<String>, entity: Option<UpdateEntity>) {
        self.commands.push(Command { op, path, entity });
    }

    /// Tag the update applies to.
    pub fn old_tag(&self) -> Uuid {
        self.old_tag
    }

    /// Tag of policies after the update.
    pub fn new_tag(&self) -> Uuid {
        self.new_tag
    }

    /// Commands in application order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

impl fmt::Display for PolicyUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy update: {} - {}\ncommands:", self.old_tag, self.new_tag)?;
        for c in &self.commands {
            write!(f, "\n- {c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Rule;

    #[test]
    fn test_update_op_parse() {
        assert_eq!("add".parse::<UpdateOp>().unwrap(), UpdateOp::Add);
        assert_eq!("Delete".parse::<UpdateOp>().unwrap(), UpdateOp::Delete);

        let err = "patch".parse::<UpdateOp>().unwrap_err();
        assert_eq!(err.to_string(), "#42: Unknown policy update operation \"patch\"");
    }

    #[test]
    fn test_update_display() {
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();

        let mut u = PolicyUpdate::new(old, new);
        u.append(
            UpdateOp::Add,
            vec!["test".into(), "first".into()],
            Some(Rule::builder("deny").build().unwrap().into()),
        );
        u.append(UpdateOp::Delete, vec!["test".into(), "del".into()], None);

        assert_eq!(
            u.to_string(),
            format!(
                "policy update: {old} - {new}\n\
                 commands:\n\
                 - Add path (\"test\"/\"first\")\n\
                 - Delete path (\"test\"/\"del\")"
            )
        );
        assert_eq!(
            u.commands()[0].to_json().to_string(),
            "{\"op\":\"Add\",\"path\":[\"test\",\"first\"]}"
        );
    }
}
