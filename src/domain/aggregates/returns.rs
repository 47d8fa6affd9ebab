//! Return Request Aggregate
//!
//! Mirrors the back-office return flow: a pending request is approved with a
//! refund amount or rejected; an approved request completes once the refund
//! is processed.

use crate::domain::value_objects::Money;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ReturnRequest {
    id: String,
    order_id: String,
    reason: String,
    status: ReturnStatus,
    refund_amount: Option<Money>,
    refund_status: Option<RefundStatus>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReturnStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Processed,
}

impl ReturnRequest {
    pub fn open(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            reason: reason.into(),
            status: ReturnStatus::Pending,
            refund_amount: None,
            refund_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn order_id(&self) -> &str {
        &self.order_id
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
    pub fn status(&self) -> &ReturnStatus {
        &self.status
    }
    pub fn refund_amount(&self) -> Option<&Money> {
        self.refund_amount.as_ref()
    }
    pub fn refund_status(&self) -> Option<&RefundStatus> {
        self.refund_status.as_ref()
    }

    /// Approve with the refund to be paid out; the refund starts pending.
    pub fn approve(&mut self, refund_amount: Money) -> Result<(), ReturnError> {
        if self.status != ReturnStatus::Pending {
            return Err(ReturnError::InvalidTransition);
        }
        self.status = ReturnStatus::Approved;
        self.refund_amount = Some(refund_amount);
        self.refund_status = Some(RefundStatus::Pending);
        self.touch();
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), ReturnError> {
        if self.status != ReturnStatus::Pending {
            return Err(ReturnError::InvalidTransition);
        }
        self.status = ReturnStatus::Rejected;
        self.touch();
        Ok(())
    }

    /// Close out an approved return once the refund has been processed.
    pub fn complete(&mut self) -> Result<(), ReturnError> {
        if self.status != ReturnStatus::Approved {
            return Err(ReturnError::InvalidTransition);
        }
        self.status = ReturnStatus::Completed;
        self.refund_status = Some(RefundStatus::Processed);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Error, Debug, Clone)]
pub enum ReturnError {
    #[error("Invalid transition")]
    InvalidTransition,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn approve_then_complete() {
        let mut r = ReturnRequest::open("ORD-1", "Leg arrived cracked");
        r.approve(Money::inr(Decimal::new(12_000, 0))).unwrap();
        assert_eq!(r.status(), &ReturnStatus::Approved);
        assert_eq!(r.refund_status(), Some(&RefundStatus::Pending));
        r.complete().unwrap();
        assert_eq!(r.status(), &ReturnStatus::Completed);
        assert_eq!(r.refund_status(), Some(&RefundStatus::Processed));
    }

    #[test]
    fn rejected_return_carries_no_refund() {
        let mut r = ReturnRequest::open("ORD-2", "Changed my mind");
        r.reject().unwrap();
        assert_eq!(r.status(), &ReturnStatus::Rejected);
        assert!(r.refund_amount().is_none());
    }

    #[test]
    fn completion_requires_approval_first() {
        let mut r = ReturnRequest::open("ORD-3", "Wrong color");
        assert!(r.complete().is_err());
        r.approve(Money::inr(Decimal::new(500, 0))).unwrap();
        assert!(r.reject().is_err());
    }
}
