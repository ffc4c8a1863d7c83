//! Invoices: numbering, editing rules, status workflow and the monthly run.
//!
//! An apartment gets at most one regular (non-ticket, non-cancelled)
//! invoice per calendar month, keyed on the issue date. Ticket invoices are
//! outside that rule.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, NaiveDateTime};
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;

use sams_core::{
    ApartmentId, InvoiceId, InvoiceStatus, InvoiceTotals, MonthPeriod, Page, ServiceTypeId, TicketId,
    VehicleType, line_amounts,
};

use super::email::{EmailService, InvoiceNotice};
use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::{
    ApartmentRepository, InvoiceConfigRepository, InvoiceRepository, RepositoryError,
    ResidentRepository, ServicePriceRepository, ServiceTypeRepository, TicketRepository,
    VehicleRepository,
};
use crate::models::building::Apartment;
use crate::models::invoice::{
    Invoice, InvoiceDetailInput, InvoiceFilter, InvoiceInput, InvoiceUpdateInput,
    InvoiceWithDetails, MonthlyGenerationReport, NewInvoice, NewInvoiceDetail, ServiceType,
    TicketInvoiceInput,
};
use crate::models::session::CurrentUser;
use crate::models::vehicle::VehicleCounts;

/// Attempts at a timestamped number before falling back to a random suffix.
const NUMBER_ATTEMPTS: usize = 5;

/// Highest `-NN` suffix tried for a monthly invoice number.
const MAX_MONTHLY_SUFFIX: u32 = 99;

/// VAT applied to generated monthly lines, in percent.
const MONTHLY_VAT_RATE: u32 = 10;

/// Days a ticket invoice stays payable when no due date is given.
const TICKET_INVOICE_DUE_DAYS: u64 = 7;

/// Invoice business rules.
pub struct InvoiceService<'a> {
    pool: &'a PgPool,
    invoices: InvoiceRepository<'a>,
    email: Option<&'a EmailService>,
    clock: BuildingClock,
}

impl<'a> InvoiceService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        email: Option<&'a EmailService>,
        clock: BuildingClock,
    ) -> Self {
        Self {
            pool,
            invoices: InvoiceRepository::new(pool),
            email,
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &InvoiceFilter) -> Result<Page<Invoice>, ServiceError> {
        Ok(self.invoices.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the invoice does not exist.
    pub async fn get(&self, id: InvoiceId) -> Result<InvoiceWithDetails, ServiceError> {
        self.invoices
            .get_with_details(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy hóa đơn"))
    }

    /// Create a DRAFT invoice with its lines in one transaction.
    ///
    /// A blank or already used invoice number is replaced with a generated
    /// one.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` when the due date precedes the
    /// issue date or a line is invalid, `ServiceError::NotFound` for an
    /// unknown apartment or service type, and `ServiceError::Conflict` when
    /// the apartment already has an invoice issued in that month.
    pub async fn create(
        &self,
        input: &InvoiceInput,
        actor: &CurrentUser,
    ) -> Result<InvoiceWithDetails, ServiceError> {
        ensure_due_after_issue(input.issue_date, input.due_date)?;
        self.apartment(input.apartment_id).await?;

        let period = MonthPeriod::of(input.issue_date);
        if let Some(existing) = self.invoices.find_in_period(input.apartment_id, period).await? {
            return Err(ServiceError::Conflict(format!(
                "Căn hộ đã có hóa đơn {} trong tháng {period}",
                existing.invoice_no
            )));
        }

        let details = self.price_lines(&input.details, input.issue_date).await?;
        let invoice_no = match non_blank(input.invoice_no.as_deref()) {
            Some(requested) if !self.invoices.exists_invoice_no(&requested).await? => requested,
            Some(requested) => {
                tracing::warn!(invoice_no = %requested, "Invoice number taken, generating a new one");
                self.generate_invoice_no().await?
            }
            None => self.generate_invoice_no().await?,
        };

        let new_invoice = NewInvoice {
            invoice_no,
            apartment_id: input.apartment_id,
            ticket_id: None,
            issue_date: input.issue_date,
            due_date: input.due_date,
            status: InvoiceStatus::Draft,
            note: non_blank(input.note.as_deref()),
            created_by: Some(actor.username.clone()),
            totals: InvoiceTotals::from_lines(details.iter().map(|d| &d.amounts))?,
            details,
        };

        Ok(self.insert_retrying_number(new_invoice).await?)
    }

    /// Edit dates and note.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for PAID or CANCELLED invoices
    /// and `ServiceError::Validation` when the due date precedes the issue
    /// date.
    pub async fn update(
        &self,
        id: InvoiceId,
        input: &InvoiceUpdateInput,
        actor: &CurrentUser,
    ) -> Result<Invoice, ServiceError> {
        let current = self.get(id).await?.invoice;
        ensure_editable(current.status)?;
        ensure_due_after_issue(input.issue_date, input.due_date)?;

        let note = non_blank(input.note.as_deref()).or(current.note);
        Ok(self
            .invoices
            .update_header(id, input.issue_date, input.due_date, note.as_deref(), &actor.username)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` unless the invoice is a DRAFT.
    pub async fn delete(&self, id: InvoiceId) -> Result<(), ServiceError> {
        let current = self.get(id).await?.invoice;
        if !current.status.is_deletable() {
            return Err(ServiceError::invalid_state("Chỉ có thể xóa hóa đơn ở trạng thái DRAFT"));
        }
        self.invoices.delete(id).await?;
        tracing::info!(invoice_id = %id, invoice_no = %current.invoice_no, "Invoice deleted");
        Ok(())
    }

    /// Move an invoice through its workflow.
    ///
    /// A note is appended to the invoice's note as `[Status A → B] note`.
    /// Moving into ISSUED emails the apartment's primary resident when
    /// email is configured.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a transition the workflow
    /// forbids.
    pub async fn change_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        note: Option<&str>,
        actor: &CurrentUser,
    ) -> Result<Invoice, ServiceError> {
        let current = self.get(id).await?.invoice;
        current.status.check_transition(status)?;

        let note = append_status_note(current.note.as_deref(), current.status, status, note);
        let updated = self
            .invoices
            .update_status(id, status, note.as_deref(), &actor.username)
            .await?;

        tracing::info!(
            invoice_id = %id,
            from = %current.status,
            to = %status,
            by = %actor.username,
            "Invoice status changed"
        );

        if status == InvoiceStatus::Issued {
            self.notify_issued(&updated).await;
        }
        Ok(updated)
    }

    /// Add a line to an editable invoice and recompute its totals.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for PAID or CANCELLED invoices
    /// and `ServiceError::Validation` for an invalid line.
    pub async fn add_detail(
        &self,
        id: InvoiceId,
        input: &InvoiceDetailInput,
        actor: &CurrentUser,
    ) -> Result<InvoiceWithDetails, ServiceError> {
        let current = self.get(id).await?.invoice;
        ensure_editable(current.status)?;
        let detail = self.price_line(input, current.issue_date).await?;
        Ok(self.invoices.add_detail(id, &detail, &actor.username).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self.invoices.list_for_ticket(ticket_id).await?)
    }

    /// Bill the apartment behind a ticket.
    ///
    /// The invoice is ISSUED straight away, the ticket is flagged
    /// `has_invoice` and a system comment records the new invoice.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` when the ticket has no apartment
    /// or no lines are given, and `ServiceError::InvalidState` when the
    /// ticket is closed.
    pub async fn create_from_ticket(
        &self,
        ticket_id: TicketId,
        input: &TicketInvoiceInput,
        actor: &CurrentUser,
    ) -> Result<InvoiceWithDetails, ServiceError> {
        let tickets = TicketRepository::new(self.pool);
        let ticket = tickets
            .get(ticket_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy yêu cầu"))?;
        let Some(apartment_id) = ticket.apartment_id else {
            return Err(ServiceError::validation("Yêu cầu không gắn với căn hộ nào"));
        };
        if ticket.status.is_closed() {
            return Err(ServiceError::invalid_state(
                "Yêu cầu đã đóng, không thể tạo hóa đơn",
            ));
        }
        if input.details.is_empty() {
            return Err(ServiceError::validation("Hóa đơn phải có ít nhất một dòng"));
        }

        let today = self.clock.today();
        let issue_date = input.issue_date.unwrap_or(today);
        let due_date = input.due_date.unwrap_or_else(|| {
            issue_date
                .checked_add_days(Days::new(TICKET_INVOICE_DUE_DAYS))
                .unwrap_or(issue_date)
        });
        ensure_due_after_issue(issue_date, due_date)?;

        let details = self.price_lines(&input.details, issue_date).await?;
        let new_invoice = NewInvoice {
            invoice_no: self.generate_invoice_no().await?,
            apartment_id,
            ticket_id: Some(ticket_id),
            issue_date,
            due_date,
            status: InvoiceStatus::Issued,
            note: non_blank(input.note.as_deref()),
            created_by: Some(actor.username.clone()),
            totals: InvoiceTotals::from_lines(details.iter().map(|d| &d.amounts))?,
            details,
        };

        let created = self.insert_retrying_number(new_invoice).await?;
        tickets.mark_has_invoice(ticket_id).await?;
        let comment = format!(
            "Đã tạo hóa đơn {} (trạng thái {}, tổng {}).",
            created.invoice.invoice_no,
            created.invoice.status,
            super::email::format_vnd(created.invoice.total_amount)
        );
        tickets
            .add_comment(ticket_id, Some(actor.id), &comment, true)
            .await?;

        self.notify_issued(&created.invoice).await;
        Ok(created)
    }

    /// Issue the monthly fixed-fee invoices for every active apartment.
    ///
    /// Apartments that already have an invoice issued in the month are
    /// skipped, as are apartments for which no line applies. Failures are
    /// reported per apartment and do not stop the run.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an invalid month and
    /// `ServiceError::Repository` if the apartments, service types or
    /// configuration cannot be loaded.
    pub async fn generate_monthly(
        &self,
        year: i32,
        month: u32,
        actor: &str,
    ) -> Result<MonthlyGenerationReport, ServiceError> {
        let period = MonthPeriod::new(year, month)?;
        let mut report = MonthlyGenerationReport {
            period: period.to_string(),
            ..MonthlyGenerationReport::default()
        };

        let config = InvoiceConfigRepository::new(self.pool).current().await?;
        if !config.is_enabled {
            tracing::info!(period = %period, "Invoice generation is disabled by configuration");
            return Ok(report);
        }

        let issue_date = period.clamp_day(config.generation_day_of_month);
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(config.due_days_after_issue)))
            .unwrap_or(issue_date);
        let apartments = ApartmentRepository::new(self.pool).list_active().await?;
        let services = ServiceTypeRepository::new(self.pool).list_recurring().await?;
        let prices = ServicePriceRepository::new(self.pool).prices_on(issue_date).await?;
        let run = MonthlyRun {
            services: priced_services(&services, &prices),
            vehicles: VehicleRepository::new(self.pool).active_counts().await?,
            period,
            issue_date,
            due_date,
        };

        for apartment in &apartments {
            match self.generate_for_apartment(apartment, &run, actor).await
            {
                Ok(GenerationOutcome::Created(invoice_no)) => report.created.push(invoice_no),
                Ok(GenerationOutcome::AlreadyInvoiced) => report.skipped_existing += 1,
                Ok(GenerationOutcome::NothingToBill) => report.skipped_empty += 1,
                Err(e) => {
                    tracing::error!(
                        apartment = %apartment.number,
                        error = %e,
                        "Monthly invoice generation failed"
                    );
                    report.failed.push(apartment.number.clone());
                }
            }
        }

        tracing::info!(
            period = %period,
            created = report.created.len(),
            skipped_existing = report.skipped_existing,
            skipped_empty = report.skipped_empty,
            failed = report.failed.len(),
            "Monthly invoice generation finished"
        );
        Ok(report)
    }

    /// Run the monthly generation when `today` is the configured day.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::generate_monthly`].
    pub async fn run_scheduled_generation(
        &self,
        today: NaiveDate,
    ) -> Result<Option<MonthlyGenerationReport>, ServiceError> {
        let config = InvoiceConfigRepository::new(self.pool).current().await?;
        let period = MonthPeriod::of(today);
        if !config.is_enabled || period.clamp_day(config.generation_day_of_month) != today {
            return Ok(None);
        }
        self.generate_monthly(period.year(), period.month(), "system")
            .await
            .map(Some)
    }

    /// Move issued invoices past their due date to OVERDUE.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the update fails.
    pub async fn mark_overdue(&self) -> Result<u64, ServiceError> {
        Ok(self.invoices.mark_overdue(self.clock.today()).await?)
    }

    // ===== Internals =====

    async fn generate_for_apartment(
        &self,
        apartment: &Apartment,
        run: &MonthlyRun<'_>,
        actor: &str,
    ) -> Result<GenerationOutcome, ServiceError> {
        let period = run.period;
        if self.invoices.find_in_period(apartment.id, period).await?.is_some() {
            return Ok(GenerationOutcome::AlreadyInvoiced);
        }

        let vehicles = run.vehicles.get(&apartment.id).copied().unwrap_or_default();
        let details = monthly_lines(apartment, &run.services, vehicles, period)?;
        if details.is_empty() {
            tracing::warn!(apartment = %apartment.number, "No billable services, skipping invoice");
            return Ok(GenerationOutcome::NothingToBill);
        }

        let mut invoice_no = None;
        for candidate in monthly_invoice_numbers(period, &apartment.number) {
            if !self.invoices.exists_invoice_no(&candidate).await? {
                invoice_no = Some(candidate);
                break;
            }
        }
        let invoice_no = match invoice_no {
            Some(n) => n,
            None => self.generate_invoice_no().await?,
        };

        let created = self
            .insert_retrying_number(NewInvoice {
                invoice_no,
                apartment_id: apartment.id,
                ticket_id: None,
                issue_date: run.issue_date,
                due_date: run.due_date,
                status: InvoiceStatus::Issued,
                note: Some(format!(
                    "Tự động tạo hóa đơn tháng {}/{}",
                    period.month(),
                    period.year()
                )),
                created_by: Some(actor.to_owned()),
                totals: InvoiceTotals::from_lines(details.iter().map(|d| &d.amounts))?,
                details,
            })
            .await?;
        Ok(GenerationOutcome::Created(created.invoice.invoice_no))
    }

    /// Insert, replacing the number once if it was taken concurrently.
    async fn insert_retrying_number(
        &self,
        mut invoice: NewInvoice,
    ) -> Result<InvoiceWithDetails, ServiceError> {
        match self.invoices.create_with_details(&invoice).await {
            Err(RepositoryError::Conflict(_)) => {
                tracing::warn!(invoice_no = %invoice.invoice_no, "Duplicate invoice number, retrying");
                invoice.invoice_no = self.generate_invoice_no().await?;
                Ok(self.invoices.create_with_details(&invoice).await?)
            }
            other => Ok(other?),
        }
    }

    async fn generate_invoice_no(&self) -> Result<String, ServiceError> {
        for _ in 0..NUMBER_ATTEMPTS {
            let candidate = timestamped_invoice_no(self.clock.now_local());
            if !self.invoices.exists_invoice_no(&candidate).await? {
                return Ok(candidate);
            }
        }
        Ok(fallback_invoice_no(self.clock.now_local()))
    }

    async fn apartment(&self, id: ApartmentId) -> Result<Apartment, ServiceError> {
        ApartmentRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy căn hộ"))
    }

    async fn price_lines(
        &self,
        inputs: &[InvoiceDetailInput],
        as_of: NaiveDate,
    ) -> Result<Vec<NewInvoiceDetail>, ServiceError> {
        let mut details = Vec::with_capacity(inputs.len());
        for input in inputs {
            details.push(self.price_line(input, as_of).await?);
        }
        Ok(details)
    }

    /// Price a line, defaulting the unit price to the one in effect on
    /// `as_of`.
    async fn price_line(
        &self,
        input: &InvoiceDetailInput,
        as_of: NaiveDate,
    ) -> Result<NewInvoiceDetail, ServiceError> {
        let service = ServiceTypeRepository::new(self.pool)
            .get(input.service_type_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy loại dịch vụ"))?;
        let unit_price = match input.unit_price {
            Some(price) => price,
            None => {
                let scheduled = ServicePriceRepository::new(self.pool)
                    .price_on(service.id, as_of)
                    .await?;
                effective_price(&service, scheduled).ok_or_else(|| {
                    ServiceError::Validation(format!(
                        "Chưa cấu hình đơn giá cho dịch vụ {}",
                        service.name
                    ))
                })?
            }
        };
        let amounts = line_amounts(input.quantity, unit_price, input.vat_rate)?;
        Ok(NewInvoiceDetail {
            service_type_id: service.id,
            description: non_blank(input.description.as_deref()),
            quantity: input.quantity,
            unit_price,
            vat_rate: input.vat_rate,
            amounts,
        })
    }

    /// Email the apartment's primary resident. Failures are logged only.
    async fn notify_issued(&self, invoice: &Invoice) {
        let Some(email) = self.email else {
            return;
        };
        let contact = match ResidentRepository::new(self.pool)
            .primary_contact(invoice.apartment_id)
            .await
        {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::info!(invoice_no = %invoice.invoice_no, "No resident email for invoice notice");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up invoice recipient");
                return;
            }
        };

        let notice = InvoiceNotice {
            resident_name: &contact.full_name,
            invoice_no: &invoice.invoice_no,
            apartment_number: invoice.apartment_number.as_deref().unwrap_or("N/A"),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            total_amount: invoice.total_amount,
        };
        if let Err(e) = email.send_invoice_issued(&contact.email, &notice).await {
            tracing::warn!(invoice_no = %invoice.invoice_no, error = %e, "Failed to send invoice email");
        }
    }
}

enum GenerationOutcome {
    Created(String),
    AlreadyInvoiced,
    NothingToBill,
}

fn ensure_due_after_issue(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), ServiceError> {
    if due_date < issue_date {
        return Err(ServiceError::validation(
            "Hạn thanh toán không được trước ngày phát hành",
        ));
    }
    Ok(())
}

fn ensure_editable(status: InvoiceStatus) -> Result<(), ServiceError> {
    if !status.is_editable() {
        return Err(ServiceError::InvalidState(format!(
            "Không thể sửa hóa đơn ở trạng thái {status}"
        )));
    }
    Ok(())
}

/// Append `[Status A → B] note` on its own line. Without a note the
/// existing note is kept as is.
fn append_status_note(
    existing: Option<&str>,
    from: InvoiceStatus,
    to: InvoiceStatus,
    note: Option<&str>,
) -> Option<String> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return existing.map(ToOwned::to_owned);
    };
    let entry = format!("[Status {from} → {to}] {note}");
    Some(match existing.filter(|e| !e.is_empty()) {
        Some(existing) => format!("{existing}\n{entry}"),
        None => entry,
    })
}

/// `INV-{yyyyMMddHHmmssfff}-{100..999}`.
fn timestamped_invoice_no(now: NaiveDateTime) -> String {
    let suffix: u32 = rand::rng().random_range(100..=999);
    format!("INV-{}-{suffix}", now.format("%Y%m%d%H%M%S%3f"))
}

fn fallback_invoice_no(now: NaiveDateTime) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("INV-{}-{}", now.format("%Y%m%d%H%M%S%3f"), &token[..8])
}

/// `INV-{yyyyMM}-{apartment}`, then `-01` up to `-99`.
fn monthly_invoice_numbers(period: MonthPeriod, apartment_number: &str) -> impl Iterator<Item = String> {
    let base = format!("INV-{}-{apartment_number}", period.compact());
    std::iter::once(base.clone())
        .chain((1..=MAX_MONTHLY_SUFFIX).map(move |n| format!("{base}-{n:02}")))
}

/// A recurring service with the unit price in effect for the run.
#[derive(Debug, Clone, Copy)]
struct PricedService<'s> {
    service: &'s ServiceType,
    unit_price: Decimal,
}

/// The scheduled price, else the service type's own positive list price.
fn effective_price(service: &ServiceType, scheduled: Option<Decimal>) -> Option<Decimal> {
    scheduled.or_else(|| (service.unit_price > Decimal::ZERO).then_some(service.unit_price))
}

/// Inputs shared by every apartment in one monthly generation.
struct MonthlyRun<'s> {
    services: Vec<PricedService<'s>>,
    vehicles: HashMap<ApartmentId, VehicleCounts>,
    period: MonthPeriod,
    issue_date: NaiveDate,
    due_date: NaiveDate,
}

/// Attach prices to the recurring services; unpriced services are left out.
fn priced_services<'s>(
    services: &'s [ServiceType],
    prices: &HashMap<ServiceTypeId, Decimal>,
) -> Vec<PricedService<'s>> {
    services
        .iter()
        .filter_map(|service| match effective_price(service, prices.get(&service.id).copied()) {
            Some(unit_price) => Some(PricedService { service, unit_price }),
            None => {
                tracing::info!(service = %service.code, "No price in effect, service not billed");
                None
            }
        })
        .collect()
}

/// Lines for one apartment from the recurring service types.
///
/// Area-based services are billed per m² and skipped for apartments with
/// no recorded area. Parking services are billed per ACTIVE vehicle of
/// their kind and skipped when there is none. Everything else is one unit.
fn monthly_lines(
    apartment: &Apartment,
    services: &[PricedService<'_>],
    vehicles: VehicleCounts,
    period: MonthPeriod,
) -> Result<Vec<NewInvoiceDetail>, ServiceError> {
    let vat_rate = Decimal::from(MONTHLY_VAT_RATE);
    let mut lines = Vec::with_capacity(services.len());

    for &PricedService { service, unit_price } in services {
        let price = super::email::format_vnd(unit_price);
        let (quantity, description) = if let Some(kind) = VehicleType::for_parking_service(&service.code) {
            match vehicles.of(kind) {
                0 => continue,
                n => (
                    Decimal::from(n),
                    format!("{} - {n} xe × {price}/xe", service.name),
                ),
            }
        } else if service.is_area_based {
            match apartment.area_m2.filter(|a| *a > Decimal::ZERO) {
                Some(area) => (
                    area,
                    format!("{} - {}m² × {price}/m²", service.name, area.normalize()),
                ),
                None => {
                    tracing::warn!(
                        apartment = %apartment.number,
                        service = %service.code,
                        "Apartment has no area, skipping area-based fee"
                    );
                    continue;
                }
            }
        } else {
            (
                Decimal::ONE,
                format!("{} - Tháng {}/{}", service.name, period.month(), period.year()),
            )
        };

        let amounts = line_amounts(quantity, unit_price, Some(vat_rate))?;
        lines.push(NewInvoiceDetail {
            service_type_id: service.id,
            description: Some(description),
            quantity,
            unit_price,
            vat_rate: Some(vat_rate),
            amounts,
        });
    }
    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveTime, Utc};
    use sams_core::{ApartmentStatus, FloorId};

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn apartment(area: Option<&str>) -> Apartment {
        Apartment {
            id: ApartmentId::new_v4(),
            floor_id: FloorId::new_v4(),
            floor_number: 10,
            number: "A1001".to_string(),
            area_m2: area.map(|a| a.parse().unwrap()),
            bedrooms: Some(2),
            apartment_type: None,
            status: ApartmentStatus::ALL[0],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(code: &str, price: i64, area_based: bool) -> ServiceType {
        ServiceType {
            id: ServiceTypeId::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            unit: None,
            unit_price: Decimal::from(price),
            is_recurring: true,
            is_area_based: area_based,
            is_active: true,
        }
    }

    #[test]
    fn test_due_date_order() {
        assert!(ensure_due_after_issue(d(2025, 3, 1), d(2025, 3, 1)).is_ok());
        assert!(matches!(
            ensure_due_after_issue(d(2025, 3, 2), d(2025, 3, 1)),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_editable_statuses() {
        assert!(ensure_editable(InvoiceStatus::Overdue).is_ok());
        assert!(matches!(
            ensure_editable(InvoiceStatus::Paid),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn test_status_note_appended() {
        let note = append_status_note(
            Some("Tháng 3"),
            InvoiceStatus::Issued,
            InvoiceStatus::Paid,
            Some("chuyển khoản"),
        );
        assert_eq!(note.as_deref(), Some("Tháng 3\n[Status ISSUED → PAID] chuyển khoản"));

        let note = append_status_note(None, InvoiceStatus::Draft, InvoiceStatus::Issued, Some("ok"));
        assert_eq!(note.as_deref(), Some("[Status DRAFT → ISSUED] ok"));

        let note = append_status_note(Some("keep"), InvoiceStatus::Draft, InvoiceStatus::Issued, Some("  "));
        assert_eq!(note.as_deref(), Some("keep"));
    }

    #[test]
    fn test_timestamped_number_format() {
        let now = d(2025, 3, 7).and_time(NaiveTime::from_hms_milli_opt(9, 5, 3, 42).unwrap());
        let number = timestamped_invoice_no(now);
        assert!(number.starts_with("INV-20250307090503042-"));
        let suffix: u32 = number.rsplit('-').next().unwrap().parse().unwrap();
        assert!((100..=999).contains(&suffix));
        assert_ne!(fallback_invoice_no(now), fallback_invoice_no(now));
    }

    #[test]
    fn test_monthly_numbers() {
        let period = MonthPeriod::new(2025, 3).unwrap();
        let numbers: Vec<String> = monthly_invoice_numbers(period, "A1001").collect();
        assert_eq!(numbers.len(), 100);
        assert_eq!(numbers[0], "INV-202503-A1001");
        assert_eq!(numbers[1], "INV-202503-A1001-01");
        assert_eq!(numbers[99], "INV-202503-A1001-99");
    }

    fn priced(services: &[ServiceType]) -> Vec<PricedService<'_>> {
        priced_services(services, &HashMap::new())
    }

    #[test]
    fn test_monthly_lines_area_based() {
        let period = MonthPeriod::new(2025, 3).unwrap();
        let services = [service("MGMT_FEE", 12_000, true), service("WASTE", 50_000, false)];

        let lines = monthly_lines(
            &apartment(Some("75.5")),
            &priced(&services),
            VehicleCounts::default(),
            period,
        )
        .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].amounts.amount, Decimal::from(906_000));
        assert_eq!(lines[0].amounts.vat_amount, Decimal::from(90_600));
        assert_eq!(lines[1].quantity, Decimal::ONE);
        assert_eq!(lines[1].description.as_deref(), Some("WASTE - Tháng 3/2025"));

        let totals = InvoiceTotals::from_lines(lines.iter().map(|l| &l.amounts)).unwrap();
        assert_eq!(totals.total_amount, Decimal::from(1_051_600));
    }

    #[test]
    fn test_monthly_lines_skip_area_fee_without_area() {
        let period = MonthPeriod::new(2025, 3).unwrap();
        let services = [service("MGMT_FEE", 12_000, true)];
        let services = priced(&services);
        let none = VehicleCounts::default();
        assert!(monthly_lines(&apartment(None), &services, none, period).unwrap().is_empty());
        assert!(monthly_lines(&apartment(Some("0")), &services, none, period).unwrap().is_empty());
    }

    #[test]
    fn test_monthly_parking_lines_follow_active_vehicles() {
        let period = MonthPeriod::new(2025, 3).unwrap();
        let services = [service("PARKING_BIKE", 120_000, false), service("PARKING_CAR", 1_500_000, false)];
        let services = priced(&services);

        let mut vehicles = VehicleCounts::default();
        vehicles.add(VehicleType::Motorbike, 2);
        let lines = monthly_lines(&apartment(Some("75.5")), &services, vehicles, period).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, Decimal::from(2));
        assert_eq!(lines[0].amounts.amount, Decimal::from(240_000));
        assert_eq!(
            lines[0].description.as_deref(),
            Some("PARKING_BIKE - 2 xe × 120.000 ₫/xe")
        );

        let lines = monthly_lines(&apartment(None), &services, VehicleCounts::default(), period).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_scheduled_price_wins_and_unpriced_services_are_dropped() {
        let services = [
            service("MGMT_FEE", 12_000, true),
            service("WASTE", 0, false),
            service("WATER", 0, false),
        ];
        let prices = HashMap::from([
            (services[0].id, Decimal::from(15_000)),
            (services[1].id, Decimal::from(40_000)),
        ]);

        let priced = priced_services(&services, &prices);
        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].unit_price, Decimal::from(15_000));
        assert_eq!(priced[1].service.code, "WASTE");

        assert_eq!(effective_price(&services[0], None), Some(Decimal::from(12_000)));
        assert_eq!(effective_price(&services[2], None), None);
    }
}
