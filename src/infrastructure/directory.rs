use crate::domain::party::PartyId;
use crate::domain::ports::PartyDirectory;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Contractors known to this process. Stands in for the onboarding service.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    contractors: Arc<RwLock<HashSet<PartyId>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_contractor(&self, contractor_id: PartyId) {
        self.contractors.write().await.insert(contractor_id);
    }
}

#[async_trait]
impl PartyDirectory for InMemoryDirectory {
    async fn contractor_exists(&self, contractor_id: &PartyId) -> Result<bool> {
        Ok(self.contractors.read().await.contains(contractor_id))
    }
}
