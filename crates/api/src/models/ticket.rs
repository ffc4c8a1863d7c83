//! Service tickets and their comment threads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use sams_core::{
    ApartmentId, CommentId, TicketCategory, TicketId, TicketPriority, TicketScope, TicketStatus,
    UserId,
};

use super::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub created_by_user_id: Option<UserId>,
    pub created_by_name: Option<String>,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub scope: TicketScope,
    pub apartment_id: Option<ApartmentId>,
    pub apartment_number: Option<String>,
    pub has_invoice: bool,
    pub expected_completion_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub id: CommentId,
    pub ticket_id: TicketId,
    pub commented_by: Option<UserId>,
    pub commenter_name: Option<String>,
    pub content: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated ticket ready to insert.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub created_by_user_id: Option<UserId>,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: Option<String>,
    pub scope: TicketScope,
    pub apartment_id: Option<ApartmentId>,
    pub expected_completion_at: DateTime<Utc>,
}

/// Editable ticket fields after validation.
#[derive(Debug, Clone)]
pub struct TicketChanges {
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: Option<String>,
    pub scope: TicketScope,
    pub apartment_id: Option<ApartmentId>,
    pub expected_completion_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketInput {
    pub category: TicketCategory,
    pub priority: Option<TicketPriority>,
    pub subject: String,
    pub description: Option<String>,
    pub scope: Option<TicketScope>,
    pub apartment_id: Option<ApartmentId>,
    pub expected_completion_at: Option<DateTime<Utc>>,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdateInput {
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub scope: Option<TicketScope>,
    pub apartment_id: Option<ApartmentId>,
    pub expected_completion_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusInput {
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
    pub apartment_id: Option<ApartmentId>,
    /// Restricts to one author; forced to the caller for residents.
    pub created_by: Option<UserId>,
    /// Matches subject or description.
    pub q: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Paged for TicketFilter {
    fn page_fields(&self) -> (Option<u32>, Option<u32>) {
        (self.page, self.page_size)
    }
}

/// Finance documents that keep a ticket open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinanceBlockers {
    pub unpaid_invoices: Vec<String>,
    pub unapproved_vouchers: Vec<String>,
}

impl FinanceBlockers {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unpaid_invoices.is_empty() && self.unapproved_vouchers.is_empty()
    }

    /// Message shown when a close is refused.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.unpaid_invoices.is_empty() {
            parts.push(format!(
                "hóa đơn chưa thanh toán: {}",
                self.unpaid_invoices.join(", ")
            ));
        }
        if !self.unapproved_vouchers.is_empty() {
            parts.push(format!(
                "phiếu chi chưa duyệt: {}",
                self.unapproved_vouchers.join(", ")
            ));
        }
        format!("Không thể đóng yêu cầu khi còn {}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finance_blockers_message() {
        let blockers = FinanceBlockers {
            unpaid_invoices: vec!["INV-202503-A1001".to_string()],
            unapproved_vouchers: vec!["PC-0001".to_string(), "PC-0002".to_string()],
        };
        assert!(!blockers.is_empty());
        assert_eq!(
            blockers.describe(),
            "Không thể đóng yêu cầu khi còn hóa đơn chưa thanh toán: INV-202503-A1001; \
             phiếu chi chưa duyệt: PC-0001, PC-0002"
        );
        assert!(FinanceBlockers::default().is_empty());
    }
}
