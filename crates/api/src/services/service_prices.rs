//! Service price list.
//!
//! A service type carries a sequence of prices, each over a span of days.
//! Live (non-cancelled) spans of one service never overlap. Adding a price
//! that starts after the current open-ended one ends that one the day
//! before.

use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;

use sams_core::{DateRange, Page, PriceStatus, ServicePriceId, ServiceTypeId};

use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::{ServicePriceRepository, ServiceTypeRepository};
use crate::models::invoice::{
    CurrentPrice, ServicePrice, ServicePriceFilter, ServicePriceInput,
};
use crate::models::session::CurrentUser;

/// Service price business rules.
pub struct ServicePriceService<'a> {
    pool: &'a PgPool,
    prices: ServicePriceRepository<'a>,
    clock: BuildingClock,
}

impl<'a> ServicePriceService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            pool,
            prices: ServicePriceRepository::new(pool),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Validation` when `fromDate` is after
    /// `toDate`.
    pub async fn list(
        &self,
        service_type_id: ServiceTypeId,
        filter: &ServicePriceFilter,
    ) -> Result<Page<ServicePrice>, ServiceError> {
        if let (Some(from), Some(to)) = (filter.from_date, filter.to_date)
            && from > to
        {
            return Err(ServiceError::validation("Từ ngày phải trước hoặc bằng đến ngày"));
        }
        Ok(self.prices.list(service_type_id, filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the price does not exist.
    pub async fn get(&self, id: ServicePriceId) -> Result<ServicePrice, ServiceError> {
        self.prices
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy đơn giá"))
    }

    /// Add a price to a service type.
    ///
    /// When the new span collides only with the open-ended price and starts
    /// after it, that price is ended the day before the new one starts.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a non-positive price or
    /// reversed dates, `ServiceError::NotFound` for an unknown service
    /// type, and `ServiceError::Conflict` for any other overlap.
    pub async fn create(
        &self,
        service_type_id: ServiceTypeId,
        input: &ServicePriceInput,
        caller: &CurrentUser,
    ) -> Result<ServicePrice, ServiceError> {
        let (input, period) = validate(input)?;
        ServiceTypeRepository::new(self.pool)
            .get(service_type_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy loại dịch vụ"))?;

        let open = self.prices.open_ended(service_type_id).await?;
        let close = open
            .as_ref()
            .and_then(|open| auto_close(open, period.start()).map(|end| (open.id, end)));

        let exclude = close.map(|(id, _)| id);
        if let Some(conflict) = self.prices.overlapping(service_type_id, period, exclude).await? {
            return Err(overlap_error(&conflict));
        }

        let created = self
            .prices
            .create(service_type_id, &input, close, &caller.username)
            .await?;
        tracing::info!(
            service_type_id = %service_type_id,
            price_id = %created.id,
            unit_price = %created.unit_price,
            effective_date = %created.effective_date,
            closed_previous = close.is_some(),
            by = %caller.username,
            "Service price added"
        );
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a cancelled price and
    /// `ServiceError::Conflict` when the new span overlaps another price.
    pub async fn update(
        &self,
        id: ServicePriceId,
        input: &ServicePriceInput,
    ) -> Result<ServicePrice, ServiceError> {
        let (input, period) = validate(input)?;
        let existing = self.get(id).await?;
        if existing.status == PriceStatus::Cancelled {
            return Err(ServiceError::invalid_state(
                "Đơn giá đã hủy, không thể cập nhật",
            ));
        }
        if let Some(conflict) = self
            .prices
            .overlapping(existing.service_type_id, period, Some(id))
            .await?
        {
            return Err(overlap_error(&conflict));
        }
        Ok(self.prices.update(id, &input).await?)
    }

    /// Cancel a price. Cancelling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the price does not exist.
    pub async fn cancel(&self, id: ServicePriceId) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if existing.status == PriceStatus::Cancelled {
            return Ok(());
        }
        self.prices.cancel(id, self.clock.today()).await?;
        tracing::info!(price_id = %id, service_type_id = %existing.service_type_id, "Service price cancelled");
        Ok(())
    }

    /// Unit price in effect on `date` (today by default).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn current_price(
        &self,
        service_type_id: ServiceTypeId,
        date: Option<NaiveDate>,
    ) -> Result<CurrentPrice, ServiceError> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let unit_price = self.prices.price_on(service_type_id, date).await?;
        Ok(CurrentPrice {
            service_type_id,
            date,
            unit_price,
        })
    }
}

/// Check amounts and dates; prices keep two decimals.
fn validate(input: &ServicePriceInput) -> Result<(ServicePriceInput, DateRange), ServiceError> {
    if input.unit_price <= Decimal::ZERO {
        return Err(ServiceError::validation("Đơn giá phải lớn hơn 0"));
    }
    let period = DateRange::open_ended(input.effective_date, input.end_date)
        .map_err(|_| ServiceError::validation("Ngày kết thúc phải sau hoặc bằng ngày hiệu lực"))?;
    let normalized = ServicePriceInput {
        unit_price: input
            .unit_price
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        effective_date: input.effective_date,
        end_date: input.end_date,
        notes: non_blank(input.notes.as_deref()),
    };
    Ok((normalized, period))
}

/// Day on which the open-ended `open` price should end so that a price
/// starting on `new_start` can follow it. `None` when the new price does
/// not start after it.
fn auto_close(open: &ServicePrice, new_start: NaiveDate) -> Option<NaiveDate> {
    if open.end_date.is_some() || new_start <= open.effective_date {
        return None;
    }
    new_start.checked_sub_days(Days::new(1))
}

fn overlap_error(conflict: &ServicePrice) -> ServiceError {
    let period = match conflict.end_date {
        Some(end) => format!(
            "{} - {}",
            conflict.effective_date.format("%d/%m/%Y"),
            end.format("%d/%m/%Y")
        ),
        None => format!("từ {}", conflict.effective_date.format("%d/%m/%Y")),
    };
    ServiceError::Conflict(format!("Khoảng thời gian trùng với đơn giá đã có ({period})"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn price(start: NaiveDate, end: Option<NaiveDate>) -> ServicePrice {
        ServicePrice {
            id: ServicePriceId::new_v4(),
            service_type_id: ServiceTypeId::new_v4(),
            unit_price: Decimal::from(12_000),
            effective_date: start,
            end_date: end,
            status: PriceStatus::Approved,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn input(price: &str, start: NaiveDate, end: Option<NaiveDate>) -> ServicePriceInput {
        ServicePriceInput {
            unit_price: price.parse().unwrap(),
            effective_date: start,
            end_date: end,
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_auto_close_ends_the_day_before() {
        let open = price(d(2025, 1, 1), None);
        assert_eq!(auto_close(&open, d(2025, 7, 1)), Some(d(2025, 6, 30)));
        assert_eq!(auto_close(&open, d(2025, 1, 1)), None);
        assert_eq!(auto_close(&open, d(2024, 12, 1)), None);

        let closed = price(d(2025, 1, 1), Some(d(2025, 3, 31)));
        assert_eq!(auto_close(&closed, d(2025, 7, 1)), None);
    }

    #[test]
    fn test_closed_previous_no_longer_overlaps() {
        let open = price(d(2025, 1, 1), None);
        let new_start = d(2025, 7, 1);
        let end = auto_close(&open, new_start).unwrap();

        let before = DateRange::new(open.effective_date, end).unwrap();
        let after = DateRange::open_ended(new_start, None).unwrap();
        assert!(open.period().unwrap().overlaps(&after));
        assert!(!before.overlaps(&after));
    }

    #[test]
    fn test_validate_price_input() {
        let (normalized, period) = validate(&input("12000.125", d(2025, 1, 1), None)).unwrap();
        assert_eq!(normalized.unit_price, "12000.13".parse::<Decimal>().unwrap());
        assert_eq!(normalized.notes, None);
        assert!(period.is_open_ended());

        assert!(matches!(
            validate(&input("0", d(2025, 1, 1), None)),
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(
            validate(&input("1", d(2025, 2, 1), Some(d(2025, 1, 31))))
                .unwrap_err()
                .to_string(),
            "Ngày kết thúc phải sau hoặc bằng ngày hiệu lực"
        );
    }

    #[test]
    fn test_overlap_message() {
        let open = price(d(2025, 1, 1), None);
        assert_eq!(
            overlap_error(&open).to_string(),
            "Khoảng thời gian trùng với đơn giá đã có (từ 01/01/2025)"
        );
        let closed = price(d(2025, 1, 1), Some(d(2025, 3, 31)));
        assert!(overlap_error(&closed).to_string().ends_with("(01/01/2025 - 31/03/2025)"));
    }
}
