//! Domain rules composed the way the services use them.
//!
//! Each test walks one business flow across `sams-core` rules and the
//! building clock from `sams-api`, without a database.

#![allow(clippy::unwrap_used)]

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;

use sams_api::clock::BuildingClock;
use sams_core::log::extract_username;
use sams_core::{
    BookingStatus, CardNumber, CardNumberError, DateRange, InvoiceStatus, InvoiceTotals,
    MonthPeriod, PeriodUnit, TicketPriority, TicketStatus, TimedRange, VoucherStatus,
    line_amounts, package_end_date, voucher_total,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn vnd(amount: i64) -> Decimal {
    Decimal::from(amount)
}

// ============================================================================
// Tickets
// ============================================================================

#[test]
fn test_ticket_walks_the_whole_workflow() {
    let mut status = TicketStatus::default();
    let mut visited = vec![status];
    while let Some(next) = status.next() {
        status.check_transition(next).unwrap();
        status = next;
        visited.push(status);
    }
    assert_eq!(visited, TicketStatus::WORKFLOW.to_vec());
    assert!(status.is_closed());
}

#[test]
fn test_ticket_cannot_skip_or_go_back() {
    assert!(TicketStatus::New.check_transition(TicketStatus::InProgress).is_err());
    assert!(TicketStatus::Completed.check_transition(TicketStatus::Received).is_err());
    assert!(TicketStatus::Received.check_transition(TicketStatus::Received).is_err());
    assert!(TicketStatus::Pending.next().is_none());
}

#[test]
fn test_ticket_sla_in_building_time() {
    let offset = FixedOffset::east_opt(7 * 3600).unwrap();
    let created = offset.with_ymd_and_hms(2025, 3, 10, 23, 30, 0).unwrap();

    let due = TicketPriority::Urgent.expected_completion(created);
    assert_eq!(due.date_naive(), d(2025, 3, 11));
    assert_eq!(
        TicketPriority::Low.expected_completion(created).date_naive(),
        d(2025, 3, 15)
    );
}

// ============================================================================
// Invoices
// ============================================================================

#[test]
fn test_monthly_invoice_totals() {
    // 85 m² management fee plus 2 motorbike slots, both at 10% VAT
    let vat = Some(vnd(10));
    let lines = [
        line_amounts(vnd(85), vnd(12_000), vat).unwrap(),
        line_amounts(vnd(2), vnd(120_000), vat).unwrap(),
    ];
    let totals = InvoiceTotals::from_lines(&lines).unwrap();

    assert_eq!(totals.subtotal_amount, vnd(1_260_000));
    assert_eq!(totals.tax_amount, vnd(126_000));
    assert_eq!(totals.total_amount, vnd(1_386_000));
}

#[test]
fn test_invoice_settles_once() {
    let mut status = InvoiceStatus::default();
    for next in [InvoiceStatus::Issued, InvoiceStatus::Overdue, InvoiceStatus::Paid] {
        status.check_transition(next).unwrap();
        status = next;
    }
    assert!(!status.is_unpaid());
    assert!(!status.is_editable());
    assert!(status.check_transition(InvoiceStatus::Cancelled).is_err());
}

#[test]
fn test_generation_day_clamps_to_month_end() {
    let february = MonthPeriod::new(2025, 2).unwrap();
    assert_eq!(february.clamp_day(31), d(2025, 2, 28));
    assert_eq!(february.to_string(), "02/2025");
    assert_eq!(february.compact(), "202502");

    let leap = MonthPeriod::new(2024, 2).unwrap();
    assert_eq!(leap.clamp_day(30), d(2024, 2, 29));

    assert!(MonthPeriod::new(2025, 13).is_err());
}

#[test]
fn test_voucher_approval_and_total() {
    assert_eq!(
        voucher_total([vnd(350_000), vnd(150_000)]).unwrap(),
        vnd(500_000)
    );
    assert!(voucher_total([]).is_err());

    assert!(VoucherStatus::Draft.can_transition_to(VoucherStatus::Pending));
    assert!(VoucherStatus::Pending.can_transition_to(VoucherStatus::Approved));
    assert!(!VoucherStatus::Approved.can_transition_to(VoucherStatus::Draft));
}

// ============================================================================
// Bookings
// ============================================================================

#[test]
fn test_package_bookings_overlap_by_day() {
    let start = d(2025, 1, 31);
    let monthly_end = package_end_date(start, PeriodUnit::Month, 1, None);
    assert_eq!(monthly_end, d(2025, 2, 28));

    let trial_end = package_end_date(d(2025, 2, 28), PeriodUnit::Day, 0, Some(7));
    assert_eq!(trial_end, d(2025, 3, 7));

    let monthly = DateRange::new(start, monthly_end).unwrap();
    let trial = DateRange::new(d(2025, 2, 28), trial_end).unwrap();
    let later = DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap();

    // Sharing a single day counts as a clash
    assert!(monthly.overlaps(&trial));
    assert!(!monthly.overlaps(&later));
}

#[test]
fn test_booking_lifecycle() {
    assert!(BookingStatus::Pending.check_transition(BookingStatus::Confirmed).is_ok());
    assert!(BookingStatus::Confirmed.check_transition(BookingStatus::Completed).is_ok());
    assert!(BookingStatus::Completed.check_transition(BookingStatus::Cancelled).is_err());
    assert!(!BookingStatus::Cancelled.is_active());
}

// ============================================================================
// Maintenance windows
// ============================================================================

#[test]
fn test_back_to_back_maintenance_windows() {
    let morning = TimedRange::new(d(2025, 4, 5), d(2025, 4, 5), Some(t(8, 0)), Some(t(10, 0))).unwrap();
    let late_morning =
        TimedRange::new(d(2025, 4, 5), d(2025, 4, 5), Some(t(10, 0)), Some(t(12, 0))).unwrap();
    let all_day = TimedRange::new(d(2025, 4, 5), d(2025, 4, 5), None, None).unwrap();

    assert!(!morning.overlaps(&late_morning));
    assert!(morning.overlaps(&all_day));

    assert!(TimedRange::new(d(2025, 4, 5), d(2025, 4, 5), Some(t(9, 0)), None).is_err());
    assert!(TimedRange::new(d(2025, 4, 5), d(2025, 4, 5), Some(t(9, 0)), Some(t(9, 0))).is_err());
}

#[test]
fn test_window_in_building_time() {
    let clock = BuildingClock::new(FixedOffset::east_opt(7 * 3600).unwrap());
    let window = TimedRange::new(d(2025, 4, 5), d(2025, 4, 5), Some(t(8, 0)), Some(t(10, 0))).unwrap();

    // 01:30 UTC is 08:30 in the building
    let now = clock.local(Utc.with_ymd_and_hms(2025, 4, 5, 1, 30, 0).unwrap());
    assert!(window.is_active_at(now));

    let start_utc = clock.to_utc(window.start_at());
    assert_eq!(start_utc, Utc.with_ymd_and_hms(2025, 4, 5, 1, 0, 0).unwrap());
    assert_eq!(clock.local(start_utc).date().day(), 5);
}

// ============================================================================
// Access cards
// ============================================================================

#[test]
fn test_card_numbers() {
    let card = CardNumber::parse(" CARD-B1203-02 ").unwrap();
    assert_eq!(card.as_str(), "CARD-B1203-02");
    assert_eq!(card.apartment_code(), "B1203");
    assert_eq!(card.sequence(), 2);

    assert_eq!(CardNumber::parse(""), Err(CardNumberError::Empty));
    assert_eq!(
        CardNumber::parse("card-B1203-02"),
        Err(CardNumberError::LowercasePrefix)
    );
    assert_eq!(
        CardNumber::parse("CARD-B1203-00"),
        Err(CardNumberError::InvalidSequence)
    );
}

// ============================================================================
// Document logs
// ============================================================================

#[test]
fn test_log_actor_extraction() {
    assert_eq!(
        extract_username("Phê duyệt bởi ngocanh").as_deref(),
        Some("ngocanh")
    );
    assert_eq!(
        extract_username("v2 uploaded by quocthe").as_deref(),
        Some("quocthe")
    );
    assert_eq!(extract_username("Hệ thống tự động ẩn"), None);
    assert_eq!(extract_username("   "), None);
}
