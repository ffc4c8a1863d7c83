//! Service ticket workflow.
//!
//! Tickets move strictly one step at a time through
//! Mới tạo → Đã tiếp nhận → Đang xử lý → Hoàn thành → Đã đóng. Every status
//! change and edit leaves a system comment on the ticket.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sams_core::{
    TicketId, TicketPriority, TicketScope, TicketStatus, Page,
    types::ticket::{
        status_change_comment, update_comment, validate_comment, validate_description,
        validate_expected_completion, validate_subject,
    },
};

use super::ServiceError;
use crate::clock::BuildingClock;
use crate::db::{ApartmentRepository, TicketRepository};
use crate::models::session::CurrentUser;
use crate::models::ticket::{
    NewTicket, Ticket, TicketChanges, TicketComment, TicketFilter, TicketInput, TicketUpdateInput,
};

/// Ticket business rules.
pub struct TicketService<'a> {
    tickets: TicketRepository<'a>,
    apartments: ApartmentRepository<'a>,
    clock: BuildingClock,
}

impl<'a> TicketService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            tickets: TicketRepository::new(pool),
            apartments: ApartmentRepository::new(pool),
            clock,
        }
    }

    /// Search tickets. Residents only ever see their own.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(
        &self,
        mut filter: TicketFilter,
        caller: &CurrentUser,
    ) -> Result<Page<Ticket>, ServiceError> {
        if !caller.is_staff() {
            filter.created_by = Some(caller.id);
        }
        Ok(self.tickets.list(&filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the ticket does not exist or the
    /// caller is a resident who did not create it.
    pub async fn get(&self, id: TicketId, caller: &CurrentUser) -> Result<Ticket, ServiceError> {
        let ticket = self.load(id).await?;
        if !can_view(&ticket, caller) {
            return Err(ServiceError::not_found("Không tìm thấy yêu cầu"));
        }
        Ok(ticket)
    }

    /// Open a ticket.
    ///
    /// Without an explicit completion date the priority's SLA applies.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for invalid text, a missing
    /// apartment on an apartment-scoped ticket or a completion date less
    /// than 30 minutes away, and `ServiceError::NotFound` for an unknown
    /// apartment.
    pub async fn create(
        &self,
        input: &TicketInput,
        caller: &CurrentUser,
    ) -> Result<Ticket, ServiceError> {
        let now = self.clock.now();
        let subject = validate_subject(&input.subject)?;
        let description = validate_description(input.description.as_deref())?;
        let priority = input.priority.unwrap_or_default();
        let scope = input.scope.unwrap_or_default();
        let apartment_id = scope.resolve_apartment(input.apartment_id)?;
        if let Some(apartment_id) = apartment_id {
            self.apartments
                .get(apartment_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Không tìm thấy căn hộ"))?;
        }

        let expected_completion_at = match input.expected_completion_at {
            Some(at) => {
                validate_expected_completion(&at, &now)?;
                at
            }
            None => priority.expected_completion(now),
        };

        let ticket = self
            .tickets
            .create(&NewTicket {
                created_by_user_id: Some(caller.id),
                category: input.category,
                priority,
                subject,
                description,
                scope,
                apartment_id,
                expected_completion_at,
            })
            .await?;

        tracing::info!(
            ticket_id = %ticket.id,
            category = %ticket.category,
            priority = %ticket.priority,
            created_by = %caller.username,
            "Ticket created"
        );
        Ok(ticket)
    }

    /// Edit a ticket and record what changed as a system comment.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a closed ticket or a
    /// priority change on a completed one, and `ServiceError::Validation`
    /// for invalid fields.
    pub async fn update(
        &self,
        id: TicketId,
        input: &TicketUpdateInput,
        caller: &CurrentUser,
    ) -> Result<Ticket, ServiceError> {
        let now = self.clock.now();
        let current = self.get(id, caller).await?;
        ensure_open(&current)?;

        let changes = merge_changes(&current, input, now)?;
        if changes.priority != current.priority && current.status == TicketStatus::Completed {
            return Err(ServiceError::invalid_state(
                "Không thể đổi mức độ ưu tiên của yêu cầu đã hoàn thành",
            ));
        }
        if let Some(apartment_id) = changes.apartment_id
            && Some(apartment_id) != current.apartment_id
        {
            self.apartments
                .get(apartment_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Không tìm thấy căn hộ"))?;
        }

        let summary = describe_changes(&current, &changes);
        let updated = self.tickets.update(id, &changes).await?;

        if let Some(comment) = update_comment(&summary) {
            self.tickets.add_comment(id, Some(caller.id), &comment, true).await?;
        }

        tracing::info!(ticket_id = %id, changes = summary.len(), "Ticket updated");
        Ok(updated)
    }

    /// Move a ticket one step along its workflow.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` when the move skips a step, goes
    /// backwards, repeats the current status, or closes a ticket that still
    /// has unpaid invoices or unapproved vouchers.
    pub async fn change_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        caller: &CurrentUser,
    ) -> Result<Ticket, ServiceError> {
        let current = self.load(id).await?;
        current.status.check_transition(status)?;

        if status.is_closed() {
            let blockers = self.tickets.finance_blockers(id).await?;
            if !blockers.is_empty() {
                return Err(ServiceError::invalid_state(blockers.describe()));
            }
        }

        self.tickets.set_status(id, status, self.clock.now()).await?;
        let comment = status_change_comment(current.status.as_str(), status.as_str());
        self.tickets.add_comment(id, Some(caller.id), &comment, true).await?;

        tracing::info!(
            ticket_id = %id,
            from = %current.status,
            to = %status,
            by = %caller.username,
            "Ticket status changed"
        );
        self.load(id).await
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the ticket is missing.
    pub async fn comments(
        &self,
        id: TicketId,
        caller: &CurrentUser,
    ) -> Result<Vec<TicketComment>, ServiceError> {
        self.get(id, caller).await?;
        Ok(self.tickets.comments(id).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` on a closed ticket and
    /// `ServiceError::Validation` for empty or oversized content.
    pub async fn add_comment(
        &self,
        id: TicketId,
        content: &str,
        caller: &CurrentUser,
    ) -> Result<TicketComment, ServiceError> {
        let ticket = self.get(id, caller).await?;
        ensure_open(&ticket)?;
        let content = validate_comment(content)?;
        Ok(self
            .tickets
            .add_comment(id, Some(caller.id), &content, false)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` with a conflict if finance
    /// documents reference the ticket.
    pub async fn delete(&self, id: TicketId) -> Result<(), ServiceError> {
        self.tickets.delete(id).await?;
        tracing::info!(ticket_id = %id, "Ticket deleted");
        Ok(())
    }

    async fn load(&self, id: TicketId) -> Result<Ticket, ServiceError> {
        self.tickets
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy yêu cầu"))
    }
}

fn can_view(ticket: &Ticket, caller: &CurrentUser) -> bool {
    caller.is_staff() || ticket.created_by_user_id == Some(caller.id)
}

fn ensure_open(ticket: &Ticket) -> Result<(), ServiceError> {
    if ticket.status.is_closed() {
        return Err(ServiceError::invalid_state("Yêu cầu đã đóng, không thể thay đổi"));
    }
    Ok(())
}

/// Apply a partial update on top of the stored ticket.
///
/// A new priority without an explicit completion date moves the expected
/// completion to the new SLA counted from creation.
fn merge_changes(
    current: &Ticket,
    input: &TicketUpdateInput,
    now: DateTime<Utc>,
) -> Result<TicketChanges, ServiceError> {
    let subject = match input.subject.as_deref() {
        Some(subject) => validate_subject(subject)?,
        None => current.subject.clone(),
    };
    let description = match input.description.as_deref() {
        Some(text) => validate_description(Some(text))?,
        None => current.description.clone(),
    };
    let priority = input.priority.unwrap_or(current.priority);
    let scope = input.scope.unwrap_or(current.scope);
    let apartment = input.apartment_id.or(current.apartment_id);
    let apartment_id = scope.resolve_apartment(apartment)?;

    let expected_completion_at = match input.expected_completion_at {
        Some(at) => {
            validate_expected_completion(&at, &now)?;
            Some(at)
        }
        None if priority != current.priority => {
            Some(priority.expected_completion(current.created_at))
        }
        None => None,
    };

    Ok(TicketChanges {
        category: input.category.unwrap_or(current.category),
        priority,
        subject,
        description,
        scope,
        apartment_id,
        expected_completion_at,
    })
}

/// Human-readable list of edited fields.
fn describe_changes(current: &Ticket, changes: &TicketChanges) -> Vec<String> {
    let mut out = Vec::new();
    if changes.subject != current.subject {
        out.push(format!("Tiêu đề: \"{}\" → \"{}\"", current.subject, changes.subject));
    }
    if changes.description != current.description {
        out.push("Mô tả".to_owned());
    }
    if changes.category != current.category {
        out.push(format!("Danh mục: {} → {}", current.category, changes.category));
    }
    if changes.priority != current.priority {
        out.push(priority_change(current.priority, changes.priority));
    }
    if changes.scope != current.scope {
        out.push(format!("Phạm vi: {} → {}", current.scope, changes.scope));
    }
    if changes.apartment_id != current.apartment_id && changes.scope == TicketScope::Apartment {
        out.push("Căn hộ".to_owned());
    }
    if let Some(at) = changes.expected_completion_at
        && current.expected_completion_at != Some(at)
    {
        out.push("Thời hạn hoàn thành".to_owned());
    }
    out
}

fn priority_change(from: TicketPriority, to: TicketPriority) -> String {
    format!("Mức độ ưu tiên: {from} → {to}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use sams_core::{ApartmentId, TicketCategory, UserId, UserRole};

    use super::*;

    fn ticket(status: TicketStatus) -> Ticket {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        Ticket {
            id: TicketId::new_v4(),
            created_by_user_id: None,
            created_by_name: None,
            category: TicketCategory::ALL[0],
            priority: TicketPriority::Normal,
            subject: "Rò rỉ nước".to_string(),
            description: None,
            status,
            scope: TicketScope::Building,
            apartment_id: None,
            apartment_number: None,
            has_invoice: false,
            expected_completion_at: Some(created + Duration::days(3)),
            created_at: created,
            updated_at: None,
            closed_at: None,
        }
    }

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new_v4(),
            username: "lan".to_string(),
            full_name: "Lan".to_string(),
            role,
        }
    }

    #[test]
    fn test_closed_ticket_is_frozen() {
        assert!(ensure_open(&ticket(TicketStatus::Completed)).is_ok());
        let err = ensure_open(&ticket(TicketStatus::Closed)).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn test_residents_only_view_own_tickets() {
        let resident = user(UserRole::Resident);
        let mut t = ticket(TicketStatus::New);
        assert!(!can_view(&t, &resident));
        t.created_by_user_id = Some(resident.id);
        assert!(can_view(&t, &resident));
        assert!(can_view(&ticket(TicketStatus::New), &user(UserRole::Receptionist)));
    }

    #[test]
    fn test_priority_change_moves_sla() {
        let current = ticket(TicketStatus::Received);
        let input = TicketUpdateInput {
            priority: Some(TicketPriority::Urgent),
            ..Default::default()
        };
        let changes = merge_changes(&current, &input, current.created_at).unwrap();
        assert_eq!(
            changes.expected_completion_at,
            Some(current.created_at + Duration::days(1))
        );

        let summary = describe_changes(&current, &changes);
        assert_eq!(summary, vec![
            "Mức độ ưu tiên: Bình thường → Khẩn cấp".to_string(),
            "Thời hạn hoàn thành".to_string(),
        ]);
    }

    #[test]
    fn test_unchanged_update_has_no_summary() {
        let current = ticket(TicketStatus::New);
        let changes = merge_changes(&current, &TicketUpdateInput::default(), current.created_at)
            .unwrap();
        assert_eq!(changes.expected_completion_at, None);
        assert!(describe_changes(&current, &changes).is_empty());
        assert_eq!(update_comment(&describe_changes(&current, &changes)), None);
    }

    #[test]
    fn test_apartment_scope_requires_apartment() {
        let current = ticket(TicketStatus::New);
        let input = TicketUpdateInput {
            scope: Some(TicketScope::Apartment),
            ..Default::default()
        };
        let err = merge_changes(&current, &input, current.created_at).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let input = TicketUpdateInput {
            scope: Some(TicketScope::Apartment),
            apartment_id: Some(ApartmentId::new_v4()),
            ..Default::default()
        };
        let changes = merge_changes(&current, &input, current.created_at).unwrap();
        assert!(changes.apartment_id.is_some());
        assert!(describe_changes(&current, &changes).contains(&"Căn hộ".to_string()));
    }

    #[test]
    fn test_explicit_completion_too_soon() {
        let current = ticket(TicketStatus::New);
        let now = current.created_at;
        let input = TicketUpdateInput {
            expected_completion_at: Some(now + Duration::minutes(10)),
            ..Default::default()
        };
        assert!(merge_changes(&current, &input, now).is_err());
    }
}
