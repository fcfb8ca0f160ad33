use crate::error::CopayError;
use rust_decimal::Decimal;

/// Copay charged per insured service while under the annual limit.
pub const FIXED_COPAY: Decimal = Decimal::from_parts(50_000, 0, 0, false, 0);

/// Yearly copay total above which the insurer covers services in full.
pub const ANNUAL_LIMIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Copay amounts in effect, in the same currency unit as service costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopayPolicy {
    fixed_copay: Decimal,
    annual_limit: Decimal,
}

impl CopayPolicy {
    /// Create a validated policy.
    ///
    /// # Errors
    /// Returns `CopayError::InvalidPolicy` if either amount is not positive or
    /// the copay exceeds the annual limit.
    pub fn new(fixed_copay: Decimal, annual_limit: Decimal) -> Result<Self, CopayError> {
        if fixed_copay <= Decimal::ZERO {
            return Err(CopayError::InvalidPolicy {
                reason: "fixed copay must be positive",
            });
        }
        if annual_limit <= Decimal::ZERO {
            return Err(CopayError::InvalidPolicy {
                reason: "annual limit must be positive",
            });
        }
        if fixed_copay > annual_limit {
            return Err(CopayError::InvalidPolicy {
                reason: "fixed copay cannot exceed the annual limit",
            });
        }
        Ok(Self {
            fixed_copay,
            annual_limit,
        })
    }

    #[must_use]
    pub fn fixed_copay(&self) -> Decimal {
        self.fixed_copay
    }

    #[must_use]
    pub fn annual_limit(&self) -> Decimal {
        self.annual_limit
    }
}

impl Default for CopayPolicy {
    fn default() -> Self {
        Self {
            fixed_copay: FIXED_COPAY,
            annual_limit: ANNUAL_LIMIT,
        }
    }
}
