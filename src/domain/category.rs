use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{validate_name, AuditStamp};
use crate::errors::Result;

/// Categorises ledger activity for budgeting and reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    pub parent_id: Option<Uuid>,
    pub archived: bool,
    pub position: u32,
    #[serde(flatten)]
    pub audit: AuditStamp,
}

impl Category {
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            parent_id: None,
            archived: false,
            position: 0,
            audit: AuditStamp::now(),
        }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Field-level checks; acyclicity of the parent chain is enforced by the
    /// engine, which can see the whole tree.
    pub fn validate(&self) -> Result<()> {
        validate_name("category.name", &self.name)?;
        if self.parent_id == Some(self.id) {
            return Err(crate::errors::LedgerError::CyclicCategory(self.id));
        }
        Ok(())
    }
}

impl crate::domain::common::Identifiable for Category {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Supported category types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CategoryKind {
    Income,
    Expense,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CategoryKind::Income => "Income",
            CategoryKind::Expense => "Expense",
        };
        f.write_str(label)
    }
}
