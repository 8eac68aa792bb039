//! Payment structures and the payment read model.

use boxoffice_core::error::DomainError;
use boxoffice_core::id::IdGenerator;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::order::Money;

/// Status of a single payment or due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet charged.
    Pending,
    /// Due date passed without a successful charge.
    Overdue,
    /// Given up on after repeated failures.
    Default,
    /// Charged successfully.
    Completed,
    /// The last charge attempt failed.
    Failed,
}

impl PaymentStatus {
    /// The value stored in the `status` attribute.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Overdue => "overdue",
            Self::Default => "default",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Spacing between installment due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every seven days.
    Weekly,
    /// Same day of each following month (clamped to month end).
    Monthly,
}

impl Frequency {
    /// Returns `start` advanced by `periods` intervals.
    #[must_use]
    pub fn advance(self, start: DateTime<Utc>, periods: u32) -> Option<DateTime<Utc>> {
        match self {
            Self::Weekly => start.checked_add_signed(Duration::weeks(i64::from(periods))),
            Self::Monthly => start.checked_add_months(Months::new(periods)),
        }
    }
}

/// Gateway correlation of a payment. Opaque to the ledger beyond lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeCorrelation {
    /// Payment intent id.
    pub id: String,
    /// Client secret of the intent.
    pub secret: String,
    /// Gateway customer id.
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// A single charge against the whole order total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPayment {
    /// Amount in minor units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Current status.
    pub status: PaymentStatus,
    /// Id of the payment record tracking this charge.
    pub payment_id: String,
}

/// One scheduled charge of an installment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueDate {
    /// Amount in minor units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// When the charge is due.
    #[serde(with = "boxoffice_core::time::iso8601")]
    pub due_date: DateTime<Utc>,
    /// Current status.
    pub status: PaymentStatus,
    /// Id of the payment record tracking this charge.
    pub payment_id: String,
}

/// A total split into scheduled charges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPayment {
    /// Amount being split, in minor units.
    pub principal_amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Spacing between due dates.
    pub frequency: Frequency,
    /// Number of installments.
    pub term: u32,
    /// The scheduled charges, earliest first.
    pub due_dates: Vec<DueDate>,
}

impl InstallmentPayment {
    /// Splits `total` into `term` due dates starting at `first_due`.
    ///
    /// The division remainder goes to the first due date so the amounts sum
    /// to the total exactly. Every due date starts `pending` with a fresh
    /// payment id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `term` is zero, the total is
    /// negative, or a due date overflows the calendar.
    pub fn split(
        total: &Money,
        frequency: Frequency,
        term: u32,
        first_due: DateTime<Utc>,
        ids: &dyn IdGenerator,
    ) -> Result<Self, DomainError> {
        if term == 0 {
            return Err(DomainError::Validation(
                "an installment plan needs at least one due date".into(),
            ));
        }
        if total.amount < 0 {
            return Err(DomainError::Validation(format!(
                "cannot split a negative total of {}",
                total.amount
            )));
        }
        let base = total.amount / i64::from(term);
        let remainder = total.amount % i64::from(term);
        let due_dates = (0..term)
            .map(|i| {
                let due_date = frequency.advance(first_due, i).ok_or_else(|| {
                    DomainError::Validation(format!("due date {i} is out of range"))
                })?;
                Ok(DueDate {
                    amount: if i == 0 { base + remainder } else { base },
                    currency: total.currency.clone(),
                    due_date,
                    status: PaymentStatus::Pending,
                    payment_id: ids.generate(),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        Ok(Self {
            principal_amount: total.amount,
            currency: total.currency.clone(),
            frequency,
            term,
            due_dates,
        })
    }
}

/// How an order is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentStructure {
    /// One charge.
    Direct(DirectPayment),
    /// Scheduled partial charges.
    Installment(InstallmentPayment),
}

impl PaymentStructure {
    /// A pending direct payment over `total` with a fresh payment id.
    #[must_use]
    pub fn direct(total: &Money, ids: &dyn IdGenerator) -> Self {
        Self::Direct(DirectPayment {
            amount: total.amount,
            currency: total.currency.clone(),
            status: PaymentStatus::Pending,
            payment_id: ids.generate(),
        })
    }

    /// Sum of the charges in this structure.
    #[must_use]
    pub fn total(&self) -> Money {
        match self {
            Self::Direct(direct) => Money::new(direct.amount, &direct.currency),
            Self::Installment(plan) => Money::new(
                plan.due_dates.iter().map(|d| d.amount).sum(),
                &plan.currency,
            ),
        }
    }

    /// Every charge is completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Direct(direct) => direct.status == PaymentStatus::Completed,
            Self::Installment(plan) => plan
                .due_dates
                .iter()
                .all(|d| d.status == PaymentStatus::Completed),
        }
    }

    /// The first charge is completed.
    #[must_use]
    pub fn first_payment_completed(&self) -> bool {
        match self {
            Self::Direct(direct) => direct.status == PaymentStatus::Completed,
            Self::Installment(plan) => plan
                .due_dates
                .first()
                .is_some_and(|d| d.status == PaymentStatus::Completed),
        }
    }

    /// Payment ids in charge order.
    #[must_use]
    pub fn payment_ids(&self) -> Vec<&str> {
        match self {
            Self::Direct(direct) => vec![direct.payment_id.as_str()],
            Self::Installment(plan) => plan.due_dates.iter().map(|d| d.payment_id.as_str()).collect(),
        }
    }

    /// Returns a copy with the charge `payment_id` set to `status`.
    /// Charges with other ids are left as they are.
    #[must_use]
    pub fn with_payment_status(&self, payment_id: &str, status: PaymentStatus) -> Self {
        match self {
            Self::Direct(direct) => {
                let mut direct = direct.clone();
                if direct.payment_id == payment_id {
                    direct.status = status;
                }
                Self::Direct(direct)
            }
            Self::Installment(plan) => {
                let mut plan = plan.clone();
                for due in &mut plan.due_dates {
                    if due.payment_id == payment_id {
                        due.status = status;
                    }
                }
                Self::Installment(plan)
            }
        }
    }
}

/// Payment read model: one row per direct structure or due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment id (the structure's `paymentId`).
    pub id: String,
    /// Owning order.
    pub order_id: String,
    /// Amount in minor units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Due date, for installments.
    #[serde(default, with = "boxoffice_core::time::iso8601::option")]
    pub due_date: Option<DateTime<Utc>>,
    /// Current status.
    pub status: PaymentStatus,
    /// Gateway correlation, once known.
    #[serde(default)]
    pub stripe: Option<StripeCorrelation>,
}

impl Payment {
    /// The gateway payment intent id, if correlated.
    #[must_use]
    pub fn stripe_id(&self) -> Option<&str> {
        self.stripe.as_ref().map(|s| s.id.as_str())
    }

    /// Returns a copy with `status`.
    #[must_use]
    pub fn with_status(&self, status: PaymentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Derives the payment rows for an order's structures.
///
/// Only the very first charge is correlated with `intent`: later due dates
/// are charged by the scheduler and start uncorrelated.
#[must_use]
pub fn derive_payments(
    order_id: &str,
    structures: &[PaymentStructure],
    intent: Option<&StripeCorrelation>,
) -> Vec<Payment> {
    let mut payments = Vec::new();
    for structure in structures {
        match structure {
            PaymentStructure::Direct(direct) => payments.push(Payment {
                id: direct.payment_id.clone(),
                order_id: order_id.to_owned(),
                amount: direct.amount,
                currency: direct.currency.clone(),
                due_date: None,
                status: direct.status,
                stripe: None,
            }),
            PaymentStructure::Installment(plan) => {
                payments.extend(plan.due_dates.iter().map(|due| Payment {
                    id: due.payment_id.clone(),
                    order_id: order_id.to_owned(),
                    amount: due.amount,
                    currency: due.currency.clone(),
                    due_date: Some(due.due_date),
                    status: due.status,
                    stripe: None,
                }));
            }
        }
    }
    if let Some(first) = payments.first_mut() {
        first.stripe = intent.cloned();
    }
    payments
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_test_support::SequenceIdGenerator;
    use chrono::TimeZone;

    fn ids() -> SequenceIdGenerator {
        SequenceIdGenerator::new("pay")
    }

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 10, 0, 0).unwrap()
    }

    fn intent() -> StripeCorrelation {
        StripeCorrelation {
            id: "pi_1".into(),
            secret: "pi_1_secret".into(),
            customer_id: Some("cus_1".into()),
        }
    }

    #[test]
    fn test_split_absorbs_remainder_in_first_due_date() {
        // Arrange
        let total = Money::new(10_000, "USD");

        // Act
        let plan = InstallmentPayment::split(&total, Frequency::Monthly, 3, jan(31), &ids()).unwrap();

        // Assert
        let amounts: Vec<i64> = plan.due_dates.iter().map(|d| d.amount).collect();
        assert_eq!(amounts, vec![3_334, 3_333, 3_333]);
        assert_eq!(amounts.iter().sum::<i64>(), 10_000);
        assert_eq!(plan.principal_amount, 10_000);
        // Monthly advance clamps to the end of February.
        assert_eq!(plan.due_dates[1].due_date, Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap());
        let ids: Vec<&str> = plan.due_dates.iter().map(|d| d.payment_id.as_str()).collect();
        assert_eq!(ids, vec!["pay-1", "pay-2", "pay-3"]);
    }

    #[test]
    fn test_split_weekly_spacing() {
        let plan = InstallmentPayment::split(
            &Money::new(30_000, "USD"),
            Frequency::Weekly,
            3,
            jan(1),
            &ids(),
        )
        .unwrap();

        let dates: Vec<DateTime<Utc>> = plan.due_dates.iter().map(|d| d.due_date).collect();
        assert_eq!(dates, vec![jan(1), jan(8), jan(15)]);
    }

    #[test]
    fn test_split_rejects_zero_term() {
        let result = InstallmentPayment::split(
            &Money::new(30_000, "USD"),
            Frequency::Monthly,
            0,
            jan(1),
            &ids(),
        );

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_structure_serializes_with_type_tag() {
        let structure = PaymentStructure::direct(&Money::new(30_000, "USD"), &ids());

        let json = serde_json::to_value(&structure).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "direct",
                "amount": 30000,
                "currency": "USD",
                "status": "pending",
                "paymentId": "pay-1"
            })
        );
    }

    #[test]
    fn test_first_payment_and_completion_of_installments() {
        // Arrange
        let plan = PaymentStructure::Installment(
            InstallmentPayment::split(
                &Money::new(30_000, "USD"),
                Frequency::Monthly,
                2,
                jan(1),
                &ids(),
            )
            .unwrap(),
        );

        // Act
        let first_paid = plan.with_payment_status("pay-1", PaymentStatus::Completed);
        let all_paid = first_paid.with_payment_status("pay-2", PaymentStatus::Completed);

        // Assert
        assert!(!plan.first_payment_completed());
        assert!(first_paid.first_payment_completed());
        assert!(!first_paid.is_complete());
        assert!(all_paid.is_complete());
    }

    #[test]
    fn test_derive_payments_correlates_only_first_due_date() {
        // Arrange
        let plan = PaymentStructure::Installment(
            InstallmentPayment::split(
                &Money::new(30_000, "USD"),
                Frequency::Monthly,
                3,
                jan(1),
                &ids(),
            )
            .unwrap(),
        );

        // Act
        let payments = derive_payments("order-1", &[plan], Some(&intent()));

        // Assert
        assert_eq!(payments.len(), 3);
        assert_eq!(payments[0].stripe_id(), Some("pi_1"));
        assert!(payments[1].stripe.is_none());
        assert!(payments[2].stripe.is_none());
        assert!(payments.iter().all(|p| p.order_id == "order-1" && p.due_date.is_some()));
    }

    #[test]
    fn test_derive_payments_for_direct_structure() {
        let direct = PaymentStructure::direct(&Money::new(30_000, "USD"), &ids());

        let payments = derive_payments("order-1", &[direct], Some(&intent()));

        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, "pay-1");
        assert_eq!(payments[0].amount, 30_000);
        assert_eq!(payments[0].due_date, None);
        assert_eq!(payments[0].stripe_id(), Some("pi_1"));
    }
}
