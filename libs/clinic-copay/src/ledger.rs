use crate::engine::{CopaySplit, CopaymentEngine};
use crate::error::CopayError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A patient's copay total for one calendar year, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopaymentLedgerEntry {
    pub year: i32,
    pub accumulated_amount: Decimal,
    #[serde(default)]
    pub limit_reached: bool,
}

impl CopaymentLedgerEntry {
    /// Empty entry for a year with no billed services yet.
    #[must_use]
    pub fn fresh(year: i32) -> Self {
        Self {
            year,
            accumulated_amount: Decimal::ZERO,
            limit_reached: false,
        }
    }
}

/// One billed service to apply to a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BilledService {
    pub year: i32,
    pub cost: Decimal,
    pub insured: bool,
}

/// Result of applying a billed service to a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub split: CopaySplit,
    /// Entry to persist in place of the one passed in
    pub entry: CopaymentLedgerEntry,
    /// Whether the service opened a new calendar year
    pub rolled_over: bool,
}

impl CopaymentEngine {
    /// Apply `service` to `entry` and return the split and the entry to persist.
    ///
    /// A service billed in a later year than the entry starts from an empty
    /// total for that year.
    ///
    /// # Errors
    /// Returns `CopayError::ServiceBeforeLedgerYear` if the service predates the
    /// entry, or any error of [`CopaymentEngine::calculate`].
    pub fn settle(
        &self,
        entry: &CopaymentLedgerEntry,
        service: &BilledService,
    ) -> Result<Settlement, CopayError> {
        if service.year < entry.year {
            return Err(CopayError::ServiceBeforeLedgerYear {
                service_year: service.year,
                ledger_year: entry.year,
            });
        }

        let rolled_over = service.year > entry.year;
        let accumulated = if rolled_over {
            tracing::debug!(
                from = entry.year,
                to = service.year,
                "copay ledger rolled over to a new year"
            );
            Decimal::ZERO
        } else {
            entry.accumulated_amount
        };

        let split = self.calculate(service.cost, service.insured, accumulated)?;
        let next = CopaymentLedgerEntry {
            year: service.year,
            accumulated_amount: split.new_accumulated,
            limit_reached: split.new_accumulated >= self.policy().annual_limit(),
        };

        Ok(Settlement {
            split,
            entry: next,
            rolled_over,
        })
    }
}
