use crate::error::CopayError;
use crate::policy::CopayPolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which branch of the copay rule produced a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopayCase {
    /// No insurance: the patient pays the full cost
    Uninsured,
    /// Annual limit already reached: the insurer pays the full cost
    Exempt,
    /// Fixed copay fits under the limit
    StandardCopay,
    /// The copay would cross the limit: the patient pays the remaining headroom
    LimitCrossing,
}

impl CopayCase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninsured => "uninsured",
            Self::Exempt => "exempt",
            Self::StandardCopay => "standard_copay",
            Self::LimitCrossing => "limit_crossing",
        }
    }
}

impl fmt::Display for CopayCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split of one service cost between patient and insurer.
///
/// `patient_payment + insurer_coverage` always equals the service cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopaySplit {
    pub patient_payment: Decimal,
    pub insurer_coverage: Decimal,
    pub new_accumulated: Decimal,
    pub case: CopayCase,
}

/// Stateless copay calculator.
///
/// Safe to share and call concurrently; it holds only the policy amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopaymentEngine {
    policy: CopayPolicy,
}

impl CopaymentEngine {
    #[must_use]
    pub fn new(policy: CopayPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &CopayPolicy {
        &self.policy
    }

    /// Split `service_cost` between patient and insurer.
    ///
    /// Rules, first match wins:
    /// 1. uninsured: the patient pays everything; the yearly total still grows,
    ///    capped at the annual limit
    /// 2. insured and already at the limit: the insurer pays everything
    /// 3. insured and the copay fits in the remaining headroom: the patient pays
    ///    the copay
    /// 4. insured and the copay would cross the limit: the patient pays exactly
    ///    the headroom and the yearly total lands on the limit
    ///
    /// The copay is never more than the service itself costs.
    ///
    /// A `current_accumulated` already above the limit is treated as exempt and
    /// returned unchanged.
    ///
    /// # Errors
    /// Returns `CopayError::NonPositiveCost` if `service_cost <= 0` and
    /// `CopayError::NegativeAccumulated` if `current_accumulated < 0`.
    pub fn calculate(
        &self,
        service_cost: Decimal,
        has_insurance: bool,
        current_accumulated: Decimal,
    ) -> Result<CopaySplit, CopayError> {
        if service_cost <= Decimal::ZERO {
            return Err(CopayError::NonPositiveCost { cost: service_cost });
        }
        if current_accumulated < Decimal::ZERO {
            return Err(CopayError::NegativeAccumulated {
                accumulated: current_accumulated,
            });
        }

        let limit = self.policy.annual_limit();

        let split = if !has_insurance {
            let capped = current_accumulated
                .checked_add(service_cost)
                .map_or(limit, |total| total.min(limit));
            CopaySplit {
                patient_payment: service_cost,
                insurer_coverage: Decimal::ZERO,
                new_accumulated: capped.max(current_accumulated),
                case: CopayCase::Uninsured,
            }
        } else if current_accumulated >= limit {
            CopaySplit {
                patient_payment: Decimal::ZERO,
                insurer_coverage: service_cost,
                new_accumulated: current_accumulated,
                case: CopayCase::Exempt,
            }
        } else {
            let headroom = limit - current_accumulated;
            let copay = self.policy.fixed_copay().min(service_cost);
            if copay <= headroom {
                CopaySplit {
                    patient_payment: copay,
                    insurer_coverage: service_cost - copay,
                    new_accumulated: current_accumulated + copay,
                    case: CopayCase::StandardCopay,
                }
            } else {
                CopaySplit {
                    patient_payment: headroom,
                    insurer_coverage: service_cost - headroom,
                    new_accumulated: limit,
                    case: CopayCase::LimitCrossing,
                }
            }
        };

        tracing::debug!(
            case = %split.case,
            service_cost = %service_cost,
            current_accumulated = %current_accumulated,
            patient_payment = %split.patient_payment,
            new_accumulated = %split.new_accumulated,
            "copay calculated"
        );

        Ok(split)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::policy::{ANNUAL_LIMIT, FIXED_COPAY};
    use rust_decimal_macros::dec;

    fn engine() -> CopaymentEngine {
        CopaymentEngine::default()
    }

    #[test]
    fn scenario_standard_copay() {
        let split = engine().calculate(dec!(100000), true, dec!(0)).unwrap();
        assert_eq!(split.patient_payment, dec!(50000));
        assert_eq!(split.insurer_coverage, dec!(50000));
        assert_eq!(split.new_accumulated, dec!(50000));
        assert_eq!(split.case, CopayCase::StandardCopay);
    }

    #[test]
    fn scenario_crossing_the_limit() {
        let split = engine().calculate(dec!(100000), true, dec!(980000)).unwrap();
        assert_eq!(split.patient_payment, dec!(20000));
        assert_eq!(split.insurer_coverage, dec!(80000));
        assert_eq!(split.new_accumulated, dec!(1000000));
        assert_eq!(split.case, CopayCase::LimitCrossing);
    }

    #[test]
    fn scenario_already_exempt() {
        let split = engine()
            .calculate(dec!(200000), true, dec!(1000000))
            .unwrap();
        assert_eq!(split.patient_payment, dec!(0));
        assert_eq!(split.insurer_coverage, dec!(200000));
        assert_eq!(split.new_accumulated, dec!(1000000));
        assert_eq!(split.case, CopayCase::Exempt);
    }

    #[test]
    fn scenario_uninsured() {
        let split = engine().calculate(dec!(75000), false, dec!(0)).unwrap();
        assert_eq!(split.patient_payment, dec!(75000));
        assert_eq!(split.insurer_coverage, dec!(0));
        assert_eq!(split.new_accumulated, dec!(75000));
        assert_eq!(split.case, CopayCase::Uninsured);
    }

    #[test]
    fn copay_exactly_filling_headroom_is_standard() {
        let split = engine().calculate(dec!(80000), true, dec!(950000)).unwrap();
        assert_eq!(split.case, CopayCase::StandardCopay);
        assert_eq!(split.patient_payment, FIXED_COPAY);
        assert_eq!(split.new_accumulated, ANNUAL_LIMIT);
    }

    #[test]
    fn cheap_service_charges_at_most_its_cost() {
        let split = engine().calculate(dec!(12000), true, dec!(0)).unwrap();
        assert_eq!(split.patient_payment, dec!(12000));
        assert_eq!(split.insurer_coverage, dec!(0));
        assert_eq!(split.new_accumulated, dec!(12000));
    }

    #[test]
    fn cheap_service_near_limit_fits_headroom() {
        let split = engine().calculate(dec!(10000), true, dec!(980000)).unwrap();
        assert_eq!(split.case, CopayCase::StandardCopay);
        assert_eq!(split.patient_payment, dec!(10000));
        assert_eq!(split.new_accumulated, dec!(990000));
    }

    #[test]
    fn uninsured_accumulation_is_capped() {
        let split = engine().calculate(dec!(300000), false, dec!(900000)).unwrap();
        assert_eq!(split.patient_payment, dec!(300000));
        assert_eq!(split.new_accumulated, ANNUAL_LIMIT);
    }

    #[test]
    fn accumulated_above_limit_is_left_unchanged() {
        let split = engine().calculate(dec!(1000), true, dec!(1200000)).unwrap();
        assert_eq!(split.case, CopayCase::Exempt);
        assert_eq!(split.new_accumulated, dec!(1200000));

        let split = engine().calculate(dec!(1000), false, dec!(1200000)).unwrap();
        assert_eq!(split.new_accumulated, dec!(1200000));
    }

    #[test]
    fn extreme_amounts_do_not_overflow() {
        let split = engine().calculate(Decimal::MAX, false, Decimal::ONE).unwrap();
        assert_eq!(split.patient_payment, Decimal::MAX);
        assert_eq!(split.new_accumulated, ANNUAL_LIMIT);

        let split = engine().calculate(Decimal::MAX, false, Decimal::MAX).unwrap();
        assert_eq!(split.new_accumulated, Decimal::MAX);

        let split = engine().calculate(Decimal::MAX, true, dec!(0)).unwrap();
        assert_eq!(split.patient_payment, FIXED_COPAY);
        assert_eq!(split.insurer_coverage, Decimal::MAX - FIXED_COPAY);
    }

    #[test]
    fn fractional_amounts_are_conserved() {
        let split = engine().calculate(dec!(50000.75), true, dec!(999999.5)).unwrap();
        assert_eq!(split.patient_payment, dec!(0.5));
        assert_eq!(
            split.patient_payment + split.insurer_coverage,
            dec!(50000.75)
        );
    }

    #[test]
    fn rejects_non_positive_cost() {
        assert_eq!(
            engine().calculate(dec!(0), true, dec!(0)),
            Err(CopayError::NonPositiveCost { cost: dec!(0) })
        );
        assert!(matches!(
            engine().calculate(dec!(-10), false, dec!(0)),
            Err(CopayError::NonPositiveCost { .. })
        ));
    }

    #[test]
    fn rejects_negative_accumulated() {
        assert!(matches!(
            engine().calculate(dec!(10), true, dec!(-1)),
            Err(CopayError::NegativeAccumulated { .. })
        ));
    }

    #[test]
    fn custom_policy_is_honoured() {
        let policy = CopayPolicy::new(dec!(10), dec!(25)).unwrap();
        let engine = CopaymentEngine::new(policy);
        let first = engine.calculate(dec!(100), true, dec!(0)).unwrap();
        assert_eq!(first.patient_payment, dec!(10));
        let third = engine.calculate(dec!(100), true, dec!(20)).unwrap();
        assert_eq!(third.patient_payment, dec!(5));
        assert_eq!(third.new_accumulated, dec!(25));
    }

    #[test]
    fn split_serializes_camel_case() {
        let split = engine().calculate(dec!(100000), true, dec!(0)).unwrap();
        let json = serde_json::to_value(split).unwrap();
        assert_eq!(json["case"], "standard_copay");
        assert!(json.get("patientPayment").is_some());
        assert!(json.get("insurerCoverage").is_some());
        assert!(json.get("newAccumulated").is_some());
    }
}
