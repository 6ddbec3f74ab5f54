//! Hand tools kept in the workshop.
//!
//! A plain counted list: no threshold, no reorders. A tool is identified by
//! its `(name, supplier)` pair, which stays unique.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ToolId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: ToolId,
    pub name: String,
    pub supplier: String,
    pub quantity: i64,
}

impl Tool {
    /// Whether this tool carries the identity of `input`.
    pub fn same_identity(&self, input: &ToolInput) -> bool {
        self.name == input.name && self.supplier == input.supplier
    }
}

/// Submitted fields of a tool, for creation and full replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
    pub name: String,
    pub supplier: String,
    pub quantity: i64,
}

impl ToolInput {
    /// Trim the text fields and check every invariant.
    pub fn validated(self) -> DomainResult<Self> {
        let input = Self {
            name: self.name.trim().to_string(),
            supplier: self.supplier.trim().to_string(),
            quantity: self.quantity,
        };
        if input.name.is_empty() || input.supplier.is_empty() {
            return Err(DomainError::validation("name and supplier are required"));
        }
        if input.quantity < 0 {
            return Err(DomainError::validation("quantity must be non-negative"));
        }
        Ok(input)
    }

    pub fn into_tool(self, id: ToolId) -> Tool {
        Tool {
            id,
            name: self.name,
            supplier: self.supplier,
            quantity: self.quantity,
        }
    }
}

/// Outcome of adding a tool: a new row, or the tool that already has the
/// same name and supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolWrite {
    Created(Tool),
    Existing(Tool),
}

impl ToolWrite {
    pub fn tool(&self) -> &Tool {
        match self {
            ToolWrite::Created(tool) | ToolWrite::Existing(tool) => tool,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ToolWrite::Existing(_))
    }
}

pub fn duplicate_tool() -> DomainError {
    DomainError::conflict("a tool with this name and supplier already exists")
}
