use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Backoff schedule for re-running failed post-settlement bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Share of the gross amount retained by the platform, shown on contractor receipts.
    pub platform_fee_rate: Decimal,
    /// Upper bound on every call to the payment gateway.
    pub gateway_timeout: Duration,
    pub bookkeeping_retry: RetryPolicy,
    pub invoice_prefix: String,
    pub receipt_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform_fee_rate: dec!(0.10),
            gateway_timeout: Duration::from_secs(10),
            bookkeeping_retry: RetryPolicy::default(),
            invoice_prefix: "INV".to_string(),
            receipt_suffix: "R".to_string(),
        }
    }
}

impl EngineConfig {
    /// Fee rate must lie in `[0, 1]` and the gateway timeout must be non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.platform_fee_rate < Decimal::ZERO || self.platform_fee_rate > Decimal::ONE {
            return Err(EngineError::ValidationError(format!(
                "Platform fee rate must be between 0 and 1, got {}",
                self.platform_fee_rate
            )));
        }
        if self.gateway_timeout.is_zero() {
            return Err(EngineError::ValidationError(
                "Gateway timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
