use tracing::{info, instrument};

use stockflow_core::{DomainError, ToolId};
use stockflow_inventory::{Tool, ToolInput, ToolWrite};

use super::ServiceResult;
use crate::store::{SharedStore, ToolRepository};

/// Workshop tools.
#[derive(Clone)]
pub struct ToolService {
    store: SharedStore,
}

impl ToolService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Add a tool. A tool with the same name and supplier is returned
    /// unchanged instead.
    #[instrument(skip(self, input), err)]
    pub async fn create_tool(&self, input: ToolInput) -> ServiceResult<ToolWrite> {
        let write = self.store.create_tool(input).await?;
        match &write {
            ToolWrite::Created(tool) => info!(tool_id = %tool.id, "tool created"),
            ToolWrite::Existing(tool) => info!(tool_id = %tool.id, "tool already listed"),
        }
        Ok(write)
    }

    pub async fn list_tools(&self) -> ServiceResult<Vec<Tool>> {
        Ok(self.store.list_tools().await?)
    }

    #[instrument(skip(self, input), fields(tool_id = %id), err)]
    pub async fn update_tool(&self, id: ToolId, input: ToolInput) -> ServiceResult<Tool> {
        let tool = self.store.update_tool(id, input).await?;
        info!(tool_id = %id, quantity = tool.quantity, "tool updated");
        Ok(tool)
    }

    #[instrument(skip(self), fields(tool_id = %id), err)]
    pub async fn delete_tool(&self, id: ToolId) -> ServiceResult<()> {
        if !self.store.delete_tool(id).await? {
            return Err(DomainError::not_found("tool", id).into());
        }
        info!(tool_id = %id, "tool deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::InMemoryStore;

    fn service() -> ToolService {
        ToolService::new(Arc::new(InMemoryStore::new()))
    }

    fn drill(quantity: i64) -> ToolInput {
        ToolInput {
            name: "Perceuse".to_string(),
            supplier: "Makita".to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn second_create_returns_the_listed_tool() {
        let svc = service();
        let first = svc.create_tool(drill(2)).await.unwrap();
        let again = svc.create_tool(drill(5)).await.unwrap();

        assert!(!first.is_duplicate());
        assert!(again.is_duplicate());
        assert_eq!(again.tool().id, first.tool().id);
        assert_eq!(again.tool().quantity, 2);
        assert_eq!(svc.list_tools().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_every_field() {
        let svc = service();
        let id = svc.create_tool(drill(2)).await.unwrap().tool().id;
        let updated = svc
            .update_tool(
                id,
                ToolInput {
                    name: " Visseuse ".to_string(),
                    supplier: "Bosch".to_string(),
                    quantity: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Visseuse");
        assert_eq!(updated.supplier, "Bosch");
        assert_eq!(updated.quantity, 0);
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found() {
        let svc = service();
        let id = svc.create_tool(drill(1)).await.unwrap().tool().id;
        svc.delete_tool(id).await.unwrap();

        let err = svc.delete_tool(id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { .. })));
    }
}
