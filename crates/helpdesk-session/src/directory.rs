//! Company and client registration.
//!
//! Deleting a company also evicts the live bots of its chats from the
//! session registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::{ClientId, Company, CompanyId};
use helpdesk_storage::ChatStore;

use crate::registry::SessionRegistry;

/// Registration payload for a new tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub admin_id: String,
    #[serde(default)]
    pub knowledge_base: serde_json::Value,
    #[serde(default)]
    pub faq: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn ChatStore>,
    registry: Arc<SessionRegistry>,
}

impl Directory {
    pub fn new(store: Arc<dyn ChatStore>, registry: Arc<SessionRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn create_company(&self, new: NewCompany) -> Result<Company> {
        if new.name.trim().is_empty() {
            return Err(HelpdeskError::InvalidState("company name must not be empty".into()));
        }
        let company = Company {
            company_id: new.company_id,
            name: new.name,
            description: new.description,
            admin_id: new.admin_id,
            knowledge_base: new.knowledge_base,
            faq: new.faq,
            created_at: Utc::now(),
        };
        self.store.create_company(&company).await?;
        Ok(company)
    }

    pub async fn get_company(&self, company_id: &CompanyId) -> Result<Company> {
        self.store
            .get_company(company_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("company", company_id.as_str()))
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        self.store.list_companies().await
    }

    /// Delete the company and everything under it. Returns how many live
    /// bots were evicted.
    pub async fn delete_company(&self, company_id: &CompanyId) -> Result<usize> {
        let chat_ids = self.store.delete_company(company_id).await?;
        let evicted = chat_ids
            .iter()
            .filter(|chat_id| self.registry.remove(chat_id).is_some())
            .count();
        info!(company_id = %company_id, chats = chat_ids.len(), evicted, "Company removed");
        Ok(evicted)
    }

    /// Replace the company's knowledge base. Bots already live keep the
    /// snapshot they were built with until they are evicted.
    pub async fn update_knowledge_base(
        &self,
        company_id: &CompanyId,
        knowledge_base: serde_json::Value,
    ) -> Result<Company> {
        let mut company = self.get_company(company_id).await?;
        company.knowledge_base = knowledge_base;
        self.store.save_company(&company).await?;
        info!(company_id = %company_id, "Knowledge base updated");
        Ok(company)
    }

    pub async fn register_client(&self, company_id: &CompanyId, client_id: &ClientId) -> Result<()> {
        if client_id.as_str().trim().is_empty() {
            return Err(HelpdeskError::InvalidState("client id must not be empty".into()));
        }
        self.store.register_client(company_id, client_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::types::{ChatId, ChatSession};
    use helpdesk_storage::{Database, SqliteChatStore};

    use crate::bot::BotInstance;
    use serde_json::json;

    fn directory() -> Directory {
        directory_with(Arc::new(SessionRegistry::new()))
    }

    fn directory_with(registry: Arc<SessionRegistry>) -> Directory {
        let store = SqliteChatStore::new(Arc::new(Database::in_memory().unwrap()));
        Directory::new(Arc::new(store), registry)
    }

    fn acme() -> NewCompany {
        NewCompany {
            company_id: CompanyId::from("acme"),
            name: "Acme".to_string(),
            description: None,
            admin_id: "root".to_string(),
            knowledge_base: json!({"hours": "9-5"}),
            faq: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_company() {
        let dir = directory();
        dir.create_company(acme()).await.unwrap();
        let company = dir.get_company(&CompanyId::from("acme")).await.unwrap();
        assert_eq!(company.knowledge_base["hours"], "9-5");
    }

    #[tokio::test]
    async fn test_duplicate_company_conflicts() {
        let dir = directory();
        dir.create_company(acme()).await.unwrap();
        assert!(matches!(
            dir.create_company(acme()).await,
            Err(HelpdeskError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_knowledge_base() {
        let dir = directory();
        dir.create_company(acme()).await.unwrap();
        dir.update_knowledge_base(&CompanyId::from("acme"), json!({"hours": "24/7"}))
            .await
            .unwrap();
        let company = dir.get_company(&CompanyId::from("acme")).await.unwrap();
        assert_eq!(company.knowledge_base["hours"], "24/7");
    }

    #[tokio::test]
    async fn test_unknown_company_is_not_found() {
        let dir = directory();
        let result = dir.update_knowledge_base(&CompanyId::from("ghost"), json!({})).await;
        assert!(matches!(result, Err(HelpdeskError::NotFound { kind: "company", .. })));
    }

    #[tokio::test]
    async fn test_register_client_twice_conflicts() {
        let dir = directory();
        dir.create_company(acme()).await.unwrap();
        let acme_id = CompanyId::from("acme");
        dir.register_client(&acme_id, &ClientId::from("alice")).await.unwrap();
        assert!(matches!(
            dir.register_client(&acme_id, &ClientId::from("alice")).await,
            Err(HelpdeskError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_companies_in_creation_order() {
        let dir = directory();
        assert!(dir.list_companies().await.unwrap().is_empty());
        dir.create_company(acme()).await.unwrap();
        let mut globex = acme();
        globex.company_id = CompanyId::from("globex");
        dir.create_company(globex).await.unwrap();

        let ids: Vec<String> = dir
            .list_companies()
            .await
            .unwrap()
            .iter()
            .map(|c| c.company_id.to_string())
            .collect();
        assert_eq!(ids, vec!["acme".to_string(), "globex".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_company_evicts_live_bots() {
        let registry = Arc::new(SessionRegistry::new());
        let dir = directory_with(Arc::clone(&registry));
        dir.create_company(acme()).await.unwrap();
        let acme_id = CompanyId::from("acme");
        dir.register_client(&acme_id, &ClientId::from("alice")).await.unwrap();

        let chat = ChatSession::new(acme_id.clone(), ClientId::from("alice"));
        dir.store.create_chat(&chat).await.unwrap();
        registry
            .get_or_create(&chat.chat_id, || async {
                Ok(BotInstance::new(chat.chat_id.clone(), Default::default(), vec![]))
            })
            .await
            .unwrap();
        // A bot whose chat belongs to nobody we delete stays.
        let other = ChatId::from("elsewhere");
        registry
            .get_or_create(&other, || async {
                Ok(BotInstance::new(other.clone(), Default::default(), vec![]))
            })
            .await
            .unwrap();

        assert_eq!(dir.delete_company(&acme_id).await.unwrap(), 1);
        assert!(registry.lookup(&chat.chat_id).is_none());
        assert!(registry.lookup(&other).is_some());
        assert!(matches!(
            dir.get_company(&acme_id).await,
            Err(HelpdeskError::NotFound { kind: "company", .. })
        ));
        assert!(matches!(
            dir.delete_company(&acme_id).await,
            Err(HelpdeskError::NotFound { kind: "company", .. })
        ));
    }
}
