use clinic_errors::{ErrDef, FailureKind, Problem};
use rust_decimal::Decimal;
use thiserror::Error;

/// Copayment calculation errors.
///
/// All of them are caller errors detected before anything is computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CopayError {
    #[error("service cost must be positive, got {cost}")]
    NonPositiveCost { cost: Decimal },

    #[error("accumulated copay cannot be negative, got {accumulated}")]
    NegativeAccumulated { accumulated: Decimal },

    #[error("service billed in {service_year} cannot be applied to the {ledger_year} ledger")]
    ServiceBeforeLedgerYear { service_year: i32, ledger_year: i32 },

    #[error("invalid copay policy: {reason}")]
    InvalidPolicy { reason: &'static str },
}

impl CopayError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NonPositiveCost { .. }
            | Self::NegativeAccumulated { .. }
            | Self::ServiceBeforeLedgerYear { .. }
            | Self::InvalidPolicy { .. } => FailureKind::InvalidInput,
        }
    }

    pub fn to_problem(&self) -> Problem {
        let kind = self.kind();
        ErrDef::for_kind(kind).as_problem(kind, 0, self.to_string())
    }
}
