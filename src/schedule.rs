use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;

use crate::decimal::Money;
use crate::errors::{CarneError, Result};
use crate::state::Installment;
use crate::types::{ContractId, FinancialTerms, PaymentFrequency};

/// build the installment schedule for a contract
///
/// The generated amounts sum exactly to `total - down_payment`; the last
/// installment absorbs the rounding remainder of the even division.
pub fn generate(
    contract_id: ContractId,
    terms: &FinancialTerms,
    sale_date: Option<NaiveDate>,
) -> Result<Vec<Installment>> {
    validate(terms, sale_date)?;

    let financed = terms.financed_amount();

    if !terms.fixed_installment {
        // one lump installment for the post-down-payment balance
        let installment = Installment::new(contract_id, 1, financed, terms.first_due_date);
        return Ok(vec![installment]);
    }

    let count = terms.installment_count;
    let per_installment = match terms.installment_amount {
        Some(amount) => amount,
        None => financed / Decimal::from(count),
    };

    let mut installments = Vec::with_capacity(count as usize);
    let mut due_date = terms.first_due_date;

    for sequence in 1..=count {
        let amount = if sequence == count {
            // the remainder lands here, clamped against over-suggested amounts
            (financed - per_installment * Decimal::from(count - 1)).max(Money::ZERO)
        } else {
            per_installment
        };

        installments.push(Installment::new(contract_id, sequence, amount, due_date));
        due_date = advance(due_date, terms.frequency);
    }

    Ok(installments)
}

fn validate(terms: &FinancialTerms, sale_date: Option<NaiveDate>) -> Result<()> {
    if !terms.total_amount.is_positive() {
        return Err(CarneError::InvalidTotalAmount { amount: terms.total_amount });
    }

    if terms.down_payment.is_negative() {
        return Err(CarneError::InvalidDownPayment { amount: terms.down_payment });
    }

    if terms.down_payment > terms.total_amount {
        return Err(CarneError::DownPaymentExceedsTotal {
            down_payment: terms.down_payment,
            total: terms.total_amount,
        });
    }

    if let Some(sale) = sale_date {
        if terms.first_due_date < sale {
            return Err(CarneError::DueDateBeforeSale {
                first_due: terms.first_due_date,
                sale_date: sale,
            });
        }
    }

    if terms.fixed_installment {
        if terms.installment_count == 0 {
            return Err(CarneError::InvalidInstallmentCount);
        }
        if let Some(amount) = terms.installment_amount {
            if !amount.is_positive() {
                return Err(CarneError::InvalidInstallmentAmount { amount });
            }
        }
    }

    Ok(())
}

/// step a due date forward by one payment period
fn advance(date: NaiveDate, frequency: PaymentFrequency) -> NaiveDate {
    match frequency {
        // calendar stepping clamps to the end of shorter months
        PaymentFrequency::Monthly => date + Months::new(1),
        PaymentFrequency::Biweekly => date + Duration::days(15),
        PaymentFrequency::Quarterly => date + Months::new(3),
        PaymentFrequency::Single => date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstallmentStatus;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixed_terms(total: i64, down: i64, count: u32) -> FinancialTerms {
        FinancialTerms {
            total_amount: Money::from_major(total),
            down_payment: Money::from_major(down),
            installment_count: count,
            installment_amount: None,
            first_due_date: date(2024, 1, 10),
            frequency: PaymentFrequency::Monthly,
            fixed_installment: true,
        }
    }

    #[test]
    fn test_even_monthly_schedule() {
        // 1000 - 100 down over 3 = 300.00 each
        let installments = generate(Uuid::new_v4(), &fixed_terms(1000, 100, 3), None).unwrap();

        assert_eq!(installments.len(), 3);
        for (i, inst) in installments.iter().enumerate() {
            assert_eq!(inst.sequence as usize, i + 1);
            assert_eq!(inst.amount_due, Money::from_major(300));
            assert_eq!(inst.status, InstallmentStatus::Pending);
            assert_eq!(inst.balance, inst.amount_due);
        }
        assert_eq!(installments[0].due_date, date(2024, 1, 10));
        assert_eq!(installments[1].due_date, date(2024, 2, 10));
        assert_eq!(installments[2].due_date, date(2024, 3, 10));
    }

    #[test]
    fn test_last_installment_absorbs_remainder() {
        let installments = generate(Uuid::new_v4(), &fixed_terms(100, 0, 3), None).unwrap();

        assert_eq!(installments[0].amount_due, Money::from_str_exact("33.33").unwrap());
        assert_eq!(installments[1].amount_due, Money::from_str_exact("33.33").unwrap());
        assert_eq!(installments[2].amount_due, Money::from_str_exact("33.34").unwrap());

        let total: Money = installments.iter().map(|i| i.amount_due).sum();
        assert_eq!(total, Money::from_major(100));
    }

    #[test]
    fn test_suggested_amount_overrides_division() {
        let mut terms = fixed_terms(1000, 100, 3);
        terms.installment_amount = Some(Money::from_major(350));
        let installments = generate(Uuid::new_v4(), &terms, None).unwrap();

        assert_eq!(installments[0].amount_due, Money::from_major(350));
        assert_eq!(installments[1].amount_due, Money::from_major(350));
        // remainder 900 - 700 = 200
        assert_eq!(installments[2].amount_due, Money::from_major(200));
    }

    #[test]
    fn test_over_suggested_amount_clamps_last_to_zero() {
        let mut terms = fixed_terms(1000, 100, 3);
        terms.installment_amount = Some(Money::from_major(500));
        let installments = generate(Uuid::new_v4(), &terms, None).unwrap();

        assert_eq!(installments[2].amount_due, Money::ZERO);
    }

    #[test]
    fn test_single_balance_mode() {
        let terms = FinancialTerms {
            fixed_installment: false,
            frequency: PaymentFrequency::Single,
            ..fixed_terms(1000, 250, 1)
        };
        let installments = generate(Uuid::new_v4(), &terms, None).unwrap();

        assert_eq!(installments.len(), 1);
        assert_eq!(installments[0].amount_due, Money::from_major(750));
        assert_eq!(installments[0].due_date, date(2024, 1, 10));
    }

    #[test]
    fn test_biweekly_and_quarterly_stepping() {
        let mut terms = fixed_terms(300, 0, 3);
        terms.frequency = PaymentFrequency::Biweekly;
        let biweekly = generate(Uuid::new_v4(), &terms, None).unwrap();
        assert_eq!(biweekly[1].due_date, date(2024, 1, 25));
        assert_eq!(biweekly[2].due_date, date(2024, 2, 9));

        terms.frequency = PaymentFrequency::Quarterly;
        let quarterly = generate(Uuid::new_v4(), &terms, None).unwrap();
        assert_eq!(quarterly[1].due_date, date(2024, 4, 10));
        assert_eq!(quarterly[2].due_date, date(2024, 7, 10));
    }

    #[test]
    fn test_month_end_clamping() {
        let mut terms = fixed_terms(300, 0, 3);
        terms.first_due_date = date(2024, 1, 31);
        let installments = generate(Uuid::new_v4(), &terms, None).unwrap();

        assert_eq!(installments[1].due_date, date(2024, 2, 29));
        assert_eq!(installments[2].due_date, date(2024, 3, 29));
    }

    #[test]
    fn test_rejects_down_payment_over_total() {
        let err = generate(Uuid::new_v4(), &fixed_terms(100, 200, 2), None).unwrap_err();
        assert!(matches!(err, CarneError::DownPaymentExceedsTotal { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_rejects_due_date_before_sale() {
        let err = generate(
            Uuid::new_v4(),
            &fixed_terms(100, 0, 2),
            Some(date(2024, 2, 1)),
        )
        .unwrap_err();
        assert!(matches!(err, CarneError::DueDateBeforeSale { .. }));
    }

    #[test]
    fn test_rejects_zero_count_and_bad_amounts() {
        assert!(matches!(
            generate(Uuid::new_v4(), &fixed_terms(100, 0, 0), None),
            Err(CarneError::InvalidInstallmentCount)
        ));
        assert!(matches!(
            generate(Uuid::new_v4(), &fixed_terms(0, 0, 2), None),
            Err(CarneError::InvalidTotalAmount { .. })
        ));

        let mut terms = fixed_terms(100, 0, 2);
        terms.installment_amount = Some(Money::ZERO);
        assert!(matches!(
            generate(Uuid::new_v4(), &terms, None),
            Err(CarneError::InvalidInstallmentAmount { .. })
        ));
    }
}
