#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Copayment accumulation for billed services
//!
//! Every billed service is split between the patient and the insurer under a
//! fixed-copay-with-annual-cap rule:
//! - uninsured patients pay the full cost
//! - insured patients pay a fixed copay per service
//! - once the yearly copay total reaches the annual limit the insurer covers
//!   everything, and the service that crosses the limit only charges the
//!   remaining headroom
//!
//! The engine is a pure function over explicit inputs. Callers own the
//! [`CopaymentLedgerEntry`] and persist the entry returned by
//! [`CopaymentEngine::settle`].
//!
//! # Example
//!
//! ```ignore
//! use clinic_copay::CopaymentEngine;
//! use rust_decimal_macros::dec;
//!
//! let engine = CopaymentEngine::default();
//! let split = engine.calculate(dec!(100000), true, dec!(980000))?;
//! assert_eq!(split.patient_payment, dec!(20000));
//! ```

mod engine;
mod error;
mod ledger;
mod policy;

pub use engine::{CopayCase, CopaySplit, CopaymentEngine};
pub use error::CopayError;
pub use ledger::{BilledService, CopaymentLedgerEntry, Settlement};
pub use policy::{ANNUAL_LIMIT, CopayPolicy, FIXED_COPAY};
