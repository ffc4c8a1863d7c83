//! Amenity bookings.
//!
//! A booking buys one package of an amenity starting today (building
//! time). A resident may not hold two active bookings on the same amenity
//! whose date ranges overlap; bookings by other residents never conflict.

use chrono::NaiveDate;
use sqlx::PgPool;

use sams_core::{
    AmenityStatus, ApartmentId, BookingId, BookingStatus, DateRange, PackageId, Page,
    PaymentStatus, UserId, package_end_date,
};

use super::email::{BookingNotice, EmailService};
use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::{
    AmenityRepository, BookingRepository, MaintenanceRepository, ResidentRepository,
    UserRepository,
};
use crate::models::amenity::{
    Amenity, AmenityPackage, Booking, BookingFilter, BookingInput, BookingQuote,
    BookingUpdateInput, NewBooking,
};
use crate::models::session::CurrentUser;

/// Booking business rules.
pub struct BookingService<'a> {
    pool: &'a PgPool,
    bookings: BookingRepository<'a>,
    amenities: AmenityRepository<'a>,
    email: Option<&'a EmailService>,
    clock: BuildingClock,
}

impl<'a> BookingService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        email: Option<&'a EmailService>,
        clock: BuildingClock,
    ) -> Self {
        Self {
            pool,
            bookings: BookingRepository::new(pool),
            amenities: AmenityRepository::new(pool),
            email,
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &BookingFilter) -> Result<Page<Booking>, ServiceError> {
        Ok(self.bookings.list(filter).await?)
    }

    /// The caller's own bookings.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list_mine(
        &self,
        mut filter: BookingFilter,
        caller: &CurrentUser,
    ) -> Result<Page<Booking>, ServiceError> {
        filter.user_id = Some(caller.id);
        Ok(self.bookings.list(&filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the booking does not exist or
    /// belongs to another resident.
    pub async fn get(&self, id: BookingId, caller: &CurrentUser) -> Result<Booking, ServiceError> {
        let booking = self.load(id).await?;
        if !caller.is_staff() && booking.user_id != Some(caller.id) {
            return Err(ServiceError::not_found("Không tìm thấy đăng ký"));
        }
        Ok(booking)
    }

    /// Book a package.
    ///
    /// Residents book for themselves and their primary apartment. Staff
    /// must name the apartment and book on behalf of one of its residents,
    /// the primary one unless `user_id` says otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` when the amenity or package is
    /// not bookable, the amenity is under maintenance, or the owner
    /// already holds an overlapping booking on it.
    pub async fn create(
        &self,
        input: &BookingInput,
        caller: &CurrentUser,
    ) -> Result<Booking, ServiceError> {
        let apartment_id = self.booking_apartment(input.apartment_id, caller).await?;
        let owner = self.booking_owner(apartment_id, input.user_id, caller).await?;
        let amenity = self.amenity(input).await?;
        let package = self.package(input.package_id).await?;
        check_bookable(&amenity, &package)?;

        if let Some(asset_id) = amenity.asset_id
            && MaintenanceRepository::new(self.pool)
                .is_under_maintenance(asset_id, self.clock.now_local())
                .await?
        {
            return Err(ServiceError::InvalidState(format!(
                "Tiện ích {} hiện đang trong thời gian bảo trì. Vui lòng quay lại sau khi bảo trì hoàn tất.",
                amenity.name
            )));
        }

        let range = booking_range(self.clock.today(), &package)?;
        if let Some(conflict) = self
            .bookings
            .overlapping(amenity.id, owner, range, None)
            .await?
        {
            return Err(overlap_error(&conflict)?);
        }

        let booking = self
            .bookings
            .create(&NewBooking {
                amenity_id: amenity.id,
                package_id: package.id,
                apartment_id,
                user_id: owner,
                start_date: range.start(),
                end_date: range.end(),
                price: package.price,
                notes: non_blank(input.notes.as_deref()),
                created_by: caller.username.clone(),
            })
            .await?;

        tracing::info!(
            booking_id = %booking.id,
            amenity = %amenity.code,
            package = %package.name,
            owner = %owner,
            by = %caller.username,
            "Booking created"
        );
        Ok(booking)
    }

    /// Switch a pending booking to another package of the same amenity.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` unless the booking is Pending
    /// and the package is active, and `ServiceError::Validation` for a
    /// package of a different amenity.
    pub async fn update(
        &self,
        id: BookingId,
        input: &BookingUpdateInput,
        caller: &CurrentUser,
    ) -> Result<Booking, ServiceError> {
        let booking = self.get(id, caller).await?;
        if booking.status != BookingStatus::Pending {
            return Err(ServiceError::invalid_state("Chỉ có thể sửa đăng ký đang chờ duyệt"));
        }

        let package = self.package(input.package_id).await?;
        if package.amenity_id != booking.amenity_id {
            return Err(ServiceError::validation(
                "Không thể đổi sang gói của tiện ích khác",
            ));
        }
        if package.status != AmenityStatus::Active {
            return Err(ServiceError::invalid_state("Gói không còn hoạt động"));
        }

        let range = booking_range(booking.start_date, &package)?;
        if let Some(user_id) = booking.user_id
            && let Some(conflict) = self
                .bookings
                .overlapping(booking.amenity_id, user_id, range, Some(id))
                .await?
        {
            return Err(overlap_error(&conflict)?);
        }

        let notes = non_blank(input.notes.as_deref()).or(booking.notes);
        Ok(self
            .bookings
            .update(id, package.id, range.end(), package.price, notes.as_deref(), &caller.username)
            .await?)
    }

    /// Cancel a booking. Only its owner or staff may cancel.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Forbidden` for someone else's booking and
    /// `ServiceError::InvalidState` unless it is Pending or Confirmed.
    pub async fn cancel(
        &self,
        id: BookingId,
        reason: Option<&str>,
        caller: &CurrentUser,
    ) -> Result<Booking, ServiceError> {
        let booking = self.load(id).await?;
        if booking.user_id != Some(caller.id) && !caller.is_staff() {
            return Err(ServiceError::Forbidden(
                "Bạn không có quyền hủy đăng ký này".to_owned(),
            ));
        }
        booking.status.check_transition(BookingStatus::Cancelled)?;

        let reason = non_blank(reason).unwrap_or_else(|| "Cancelled by user".to_owned());
        let cancelled = self.bookings.cancel(id, Some(&reason), &caller.username).await?;
        tracing::info!(booking_id = %id, by = %caller.username, "Booking cancelled");
        Ok(cancelled)
    }

    /// Confirm a pending booking and email the resident.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` unless the booking is Pending.
    pub async fn confirm(&self, id: BookingId, caller: &CurrentUser) -> Result<Booking, ServiceError> {
        let booking = self.load(id).await?;
        booking.status.check_transition(BookingStatus::Confirmed)?;
        let confirmed = self
            .bookings
            .set_status(id, BookingStatus::Confirmed, &caller.username)
            .await?;
        tracing::info!(booking_id = %id, by = %caller.username, "Booking confirmed");
        self.notify_confirmed(&confirmed).await;
        Ok(confirmed)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` unless the booking is Confirmed.
    pub async fn complete(&self, id: BookingId, caller: &CurrentUser) -> Result<Booking, ServiceError> {
        let booking = self.load(id).await?;
        booking.status.check_transition(BookingStatus::Completed)?;
        Ok(self
            .bookings
            .set_status(id, BookingStatus::Completed, &caller.username)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the booking does not exist.
    pub async fn set_payment_status(
        &self,
        id: BookingId,
        payment_status: PaymentStatus,
        caller: &CurrentUser,
    ) -> Result<Booking, ServiceError> {
        self.load(id).await?;
        Ok(self
            .bookings
            .set_payment_status(id, payment_status, &caller.username)
            .await?)
    }

    /// Price and dates a package would get if booked today.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown package.
    pub async fn quote(&self, package_id: PackageId) -> Result<BookingQuote, ServiceError> {
        let package = self.package(package_id).await?;
        let range = booking_range(self.clock.today(), &package)?;
        Ok(BookingQuote {
            package_id,
            start_date: range.start(),
            end_date: range.end(),
            price: package.price,
            total_price: package.price,
        })
    }

    /// Complete confirmed bookings whose end date has passed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the update fails.
    pub async fn complete_expired(&self) -> Result<u64, ServiceError> {
        Ok(self.bookings.complete_due(self.clock.today()).await?)
    }

    // ===== Internals =====

    async fn load(&self, id: BookingId) -> Result<Booking, ServiceError> {
        self.bookings
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy đăng ký"))
    }

    async fn amenity(&self, input: &BookingInput) -> Result<Amenity, ServiceError> {
        self.amenities
            .get(input.amenity_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy tiện ích"))
    }

    async fn package(&self, id: PackageId) -> Result<AmenityPackage, ServiceError> {
        self.amenities
            .get_package(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy gói"))
    }

    async fn booking_apartment(
        &self,
        requested: Option<ApartmentId>,
        caller: &CurrentUser,
    ) -> Result<ApartmentId, ServiceError> {
        if caller.is_staff() {
            return requested.ok_or_else(|| ServiceError::validation("Cần chọn căn hộ"));
        }
        let linked = ResidentRepository::new(self.pool)
            .apartments_for_user(caller.id)
            .await?;
        match requested {
            Some(id) if linked.contains(&id) => Ok(id),
            Some(_) => Err(ServiceError::Forbidden(
                "Bạn không thuộc căn hộ này".to_owned(),
            )),
            None => linked
                .first()
                .copied()
                .ok_or_else(|| ServiceError::validation("Tài khoản chưa gắn với căn hộ nào")),
        }
    }

    async fn booking_owner(
        &self,
        apartment_id: ApartmentId,
        requested: Option<UserId>,
        caller: &CurrentUser,
    ) -> Result<UserId, ServiceError> {
        if !caller.is_staff() {
            return Ok(caller.id);
        }
        let residents = ResidentRepository::new(self.pool)
            .users_for_apartment(apartment_id)
            .await?;
        pick_owner(requested, &residents)
    }

    async fn notify_confirmed(&self, booking: &Booking) {
        let Some(email) = self.email else {
            return;
        };
        let Some(user_id) = booking.user_id else {
            return;
        };
        let user = match UserRepository::new(self.pool).get_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up booking owner");
                return;
            }
        };
        let Some(address) = user.email.as_ref() else {
            tracing::info!(booking_id = %booking.id, "Booking owner has no email");
            return;
        };

        let notice = BookingNotice {
            resident_name: &user.full_name,
            amenity_name: booking.amenity_name.as_deref().unwrap_or("tiện ích"),
            package_name: booking.package_name.as_deref().unwrap_or(""),
            start_date: booking.start_date,
            end_date: booking.end_date,
            price: booking.price,
        };
        if let Err(e) = email.send_booking_confirmed(address.as_str(), &notice).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "Failed to send booking email");
        }
    }
}

fn check_bookable(amenity: &Amenity, package: &AmenityPackage) -> Result<(), ServiceError> {
    if amenity.status != AmenityStatus::Active {
        return Err(ServiceError::invalid_state("Tiện ích hiện không nhận đăng ký"));
    }
    if package.amenity_id != amenity.id {
        return Err(ServiceError::validation("Gói không thuộc tiện ích đã chọn"));
    }
    if package.status != AmenityStatus::Active {
        return Err(ServiceError::invalid_state("Gói không còn hoạt động"));
    }
    Ok(())
}

/// Dates covered by a package booked on `start`.
fn booking_range(start: NaiveDate, package: &AmenityPackage) -> Result<DateRange, ServiceError> {
    let end = package_end_date(
        start,
        package.period_unit,
        package.month_count,
        package.duration_days,
    );
    Ok(DateRange::new(start, end)?)
}

/// Staff book for a resident of the apartment: the requested one, or the
/// primary resident.
fn pick_owner(requested: Option<UserId>, residents: &[UserId]) -> Result<UserId, ServiceError> {
    match requested {
        Some(id) if residents.contains(&id) => Ok(id),
        Some(_) => Err(ServiceError::validation("Cư dân không thuộc căn hộ đã chọn")),
        None => residents.first().copied().ok_or_else(|| {
            ServiceError::validation("Căn hộ chưa có cư dân có tài khoản để đăng ký")
        }),
    }
}

fn overlap_error(conflict: &Booking) -> Result<ServiceError, ServiceError> {
    let range = DateRange::new(conflict.start_date, conflict.end_date)?;
    Ok(ServiceError::Conflict(format!(
        "Bạn đang sử dụng {} trong khoảng thời gian {}.",
        conflict.amenity_name.as_deref().unwrap_or("tiện ích"),
        range.display_vn()
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use sams_core::{AmenityId, PeriodUnit};

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn amenity(status: AmenityStatus) -> Amenity {
        Amenity {
            id: AmenityId::new_v4(),
            asset_id: None,
            code: "POOL".to_string(),
            name: "Hồ bơi".to_string(),
            category_name: None,
            location: None,
            has_monthly_package: true,
            fee_type: "Paid".to_string(),
            status,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn package(amenity_id: AmenityId, unit: PeriodUnit, months: u32, days: Option<u32>) -> AmenityPackage {
        AmenityPackage {
            id: PackageId::new_v4(),
            amenity_id,
            name: "Gói".to_string(),
            month_count: months,
            duration_days: days,
            period_unit: unit,
            price: 500_000,
            description: None,
            status: AmenityStatus::Active,
        }
    }

    #[test]
    fn test_booking_range_months_and_days() {
        let a = amenity(AmenityStatus::Active);
        let monthly = package(a.id, PeriodUnit::Month, 1, None);
        let range = booking_range(d(2025, 1, 31), &monthly).unwrap();
        assert_eq!(range.end(), d(2025, 2, 28));

        let daily = package(a.id, PeriodUnit::Day, 1, Some(10));
        let range = booking_range(d(2025, 3, 1), &daily).unwrap();
        assert_eq!(range.end(), d(2025, 3, 11));
    }

    #[test]
    fn test_staff_booking_owner_is_a_resident() {
        let primary = UserId::new_v4();
        let other = UserId::new_v4();
        let residents = [primary, other];

        assert_eq!(pick_owner(None, &residents).unwrap(), primary);
        assert_eq!(pick_owner(Some(other), &residents).unwrap(), other);
        assert!(matches!(
            pick_owner(Some(UserId::new_v4()), &residents),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(pick_owner(None, &[]), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_check_bookable() {
        let a = amenity(AmenityStatus::Active);
        let p = package(a.id, PeriodUnit::Month, 1, None);
        assert!(check_bookable(&a, &p).is_ok());

        let closed = amenity(AmenityStatus::Maintenance);
        let p2 = package(closed.id, PeriodUnit::Month, 1, None);
        assert!(matches!(check_bookable(&closed, &p2), Err(ServiceError::InvalidState(_))));

        let other = package(AmenityId::new_v4(), PeriodUnit::Month, 1, None);
        assert!(matches!(check_bookable(&a, &other), Err(ServiceError::Validation(_))));

        let mut inactive = package(a.id, PeriodUnit::Month, 1, None);
        inactive.status = AmenityStatus::Inactive;
        assert!(check_bookable(&a, &inactive).is_err());
    }

    #[test]
    fn test_overlap_message() {
        let booking = Booking {
            id: BookingId::new_v4(),
            amenity_id: AmenityId::new_v4(),
            amenity_name: Some("Phòng gym".to_string()),
            package_id: PackageId::new_v4(),
            package_name: None,
            apartment_id: ApartmentId::new_v4(),
            apartment_number: None,
            user_id: Some(UserId::new_v4()),
            start_date: d(2025, 3, 1),
            end_date: d(2025, 4, 1),
            price: 300_000,
            total_price: 300_000,
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            notes: None,
            created_at: Utc::now(),
            created_by: None,
            updated_at: None,
            updated_by: None,
        };
        let err = overlap_error(&booking).unwrap();
        assert_eq!(
            err.to_string(),
            "Bạn đang sử dụng Phòng gym trong khoảng thời gian 01/03/2025 - 01/04/2025."
        );
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }
}
