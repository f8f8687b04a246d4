use crate::domain::money::Currency;
use crate::domain::payment::GatewayIntentStatus;
use crate::domain::ports::{CreateIntentRequest, GatewayIntent, IntentMetadata, IntentSnapshot, PaymentGateway};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SimulatedIntent {
    client_secret: String,
    amount: Decimal,
    currency: Currency,
    metadata: IntentMetadata,
    status: GatewayIntentStatus,
    settled_amount: Option<Decimal>,
    processor_reference: Option<String>,
}

#[derive(Default)]
struct GatewayState {
    intents: HashMap<String, SimulatedIntent>,
    by_idempotency_key: HashMap<String, String>,
    unavailable: bool,
    latency: Option<Duration>,
    create_calls: usize,
}

/// An in-process stand-in for the payment processor.
///
/// Honours idempotency keys the way a real processor does, and lets callers drive
/// intents to their terminal states, take the gateway offline, or slow it down.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    state: Arc<RwLock<GatewayState>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().await.latency = latency;
    }

    /// Number of distinct intents created (idempotent replays excluded).
    pub async fn intents_created(&self) -> usize {
        self.state.read().await.intents.len()
    }

    /// Number of create requests received, replays included.
    pub async fn create_calls(&self) -> usize {
        self.state.read().await.create_calls
    }

    pub async fn intents_for_work_item(&self, work_item_id: Uuid) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .intents
            .iter()
            .filter(|(_, intent)| intent.metadata.work_item_id == work_item_id)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Settles the intent for exactly the amount it was created with.
    pub async fn settle(&self, intent_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let intent = Self::intent_mut(&mut state, intent_id)?;
        intent.settled_amount = Some(intent.amount);
        Self::succeed(intent);
        Ok(())
    }

    /// Settles the intent for an arbitrary amount, as a misbehaving processor might.
    pub async fn settle_with_amount(&self, intent_id: &str, amount: Decimal) -> Result<()> {
        let mut state = self.state.write().await;
        let intent = Self::intent_mut(&mut state, intent_id)?;
        intent.settled_amount = Some(amount);
        Self::succeed(intent);
        Ok(())
    }

    pub async fn fail(&self, intent_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let intent = Self::intent_mut(&mut state, intent_id)?;
        intent.status = GatewayIntentStatus::Failed;
        Ok(())
    }

    pub async fn mark_processing(&self, intent_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let intent = Self::intent_mut(&mut state, intent_id)?;
        intent.status = GatewayIntentStatus::Processing;
        Ok(())
    }

    fn succeed(intent: &mut SimulatedIntent) {
        intent.status = GatewayIntentStatus::Succeeded;
        if intent.processor_reference.is_none() {
            intent.processor_reference = Some(format!("tr_{}", Uuid::new_v4().simple()));
        }
    }

    fn intent_mut<'a>(state: &'a mut GatewayState, intent_id: &str) -> Result<&'a mut SimulatedIntent> {
        state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| EngineError::NotFound(format!("gateway intent {intent_id}")))
    }

    async fn simulate_network(&self) -> Result<()> {
        let (latency, unavailable) = {
            let state = self.state.read().await;
            (state.latency, state.unavailable)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(EngineError::GatewayUnavailable(
                "simulated gateway is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<GatewayIntent> {
        self.simulate_network().await?;
        let mut state = self.state.write().await;
        state.create_calls += 1;

        if let Some(intent_id) = state.by_idempotency_key.get(&request.idempotency_key)
            && let Some(intent) = state.intents.get(intent_id)
        {
            return Ok(GatewayIntent {
                intent_id: intent_id.clone(),
                client_secret: intent.client_secret.clone(),
                status: intent.status,
            });
        }

        let intent_id = format!("pi_{}", Uuid::new_v4().simple());
        let intent = SimulatedIntent {
            client_secret: format!("{intent_id}_secret_{}", Uuid::new_v4().simple()),
            amount: request.amount.value(),
            currency: request.currency,
            metadata: request.metadata,
            status: GatewayIntentStatus::RequiresPaymentMethod,
            settled_amount: None,
            processor_reference: None,
        };
        let created = GatewayIntent {
            intent_id: intent_id.clone(),
            client_secret: intent.client_secret.clone(),
            status: intent.status,
        };
        state
            .by_idempotency_key
            .insert(request.idempotency_key, intent_id.clone());
        state.intents.insert(intent_id, intent);
        Ok(created)
    }

    async fn get_intent(&self, intent_id: &str) -> Result<IntentSnapshot> {
        self.simulate_network().await?;
        let state = self.state.read().await;
        let intent = state
            .intents
            .get(intent_id)
            .ok_or_else(|| EngineError::NotFound(format!("gateway intent {intent_id}")))?;
        Ok(IntentSnapshot {
            intent_id: intent_id.to_string(),
            status: intent.status,
            settled_amount: intent.settled_amount,
            currency: intent.currency.clone(),
            processor_reference: intent.processor_reference.clone(),
        })
    }
}
