//! Payment vouchers (phiếu chi).
//!
//! Manual vouchers start as DRAFT and are the only ones that can be edited
//! or deleted. Vouchers raised from a ticket start as PENDING, waiting for
//! an accountant's approval.

use chrono::NaiveDateTime;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;

use sams_core::{
    MoneyError, Page, TicketId, VoucherId, VoucherStatus, checked_product, round_vnd,
    voucher_total,
};

use super::{ServiceError, non_blank};
use crate::clock::BuildingClock;
use crate::db::{ServiceTypeRepository, TicketRepository, VoucherRepository};
use crate::models::session::CurrentUser;
use crate::models::voucher::{
    NewVoucher, NewVoucherItem, TicketVoucherInput, Voucher, VoucherFilter, VoucherInput,
    VoucherItemInput, VoucherWithItems,
};

const NUMBER_ATTEMPTS: usize = 5;

/// Voucher business rules.
pub struct VoucherService<'a> {
    pool: &'a PgPool,
    vouchers: VoucherRepository<'a>,
    clock: BuildingClock,
}

impl<'a> VoucherService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, clock: BuildingClock) -> Self {
        Self {
            pool,
            vouchers: VoucherRepository::new(pool),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the query fails.
    pub async fn list(&self, filter: &VoucherFilter) -> Result<Page<Voucher>, ServiceError> {
        Ok(self.vouchers.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the voucher does not exist.
    pub async fn get(&self, id: VoucherId) -> Result<VoucherWithItems, ServiceError> {
        self.vouchers
            .get_with_items(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy phiếu chi"))
    }

    /// Create a DRAFT voucher.
    ///
    /// Without items, `totalAmount` becomes a single item. The total is the
    /// sum of the items and must be positive.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a non-positive total or a
    /// negative item.
    pub async fn create(
        &self,
        input: &VoucherInput,
        actor: &CurrentUser,
    ) -> Result<VoucherWithItems, ServiceError> {
        let items = build_items(input)?;
        let total_amount = voucher_total(items.iter().map(|i| i.amount))?;
        let voucher_number = self.ensure_unique_number(input.voucher_number.as_deref()).await?;

        let created = self
            .vouchers
            .create(&NewVoucher {
                voucher_number,
                company_info: non_blank(input.company_info.as_deref()),
                voucher_date: input.voucher_date.unwrap_or_else(|| self.clock.today()),
                description: non_blank(input.description.as_deref()),
                status: VoucherStatus::Draft,
                ticket_id: None,
                created_by: Some(actor.id),
                total_amount,
                items,
            })
            .await?;

        tracing::info!(
            voucher_id = %created.voucher.id,
            voucher_number = %created.voucher.voucher_number,
            total = %total_amount,
            "Voucher created"
        );
        Ok(created)
    }

    /// Replace a DRAFT voucher's header and items.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` unless the voucher is a DRAFT.
    pub async fn update(
        &self,
        id: VoucherId,
        input: &VoucherInput,
    ) -> Result<VoucherWithItems, ServiceError> {
        let current = self.get(id).await?.voucher;
        ensure_editable(current.status)?;

        let items = build_items(input)?;
        let total_amount = voucher_total(items.iter().map(|i| i.amount))?;
        let voucher_number = match non_blank(input.voucher_number.as_deref()) {
            Some(number) if number != current.voucher_number => {
                self.ensure_unique_number(Some(&number)).await?
            }
            _ => current.voucher_number.clone(),
        };

        Ok(self
            .vouchers
            .update(
                id,
                &NewVoucher {
                    voucher_number,
                    company_info: non_blank(input.company_info.as_deref()),
                    voucher_date: input.voucher_date.unwrap_or(current.voucher_date),
                    description: non_blank(input.description.as_deref()),
                    status: current.status,
                    ticket_id: current.ticket_id,
                    created_by: current.created_by,
                    total_amount,
                    items,
                },
            )
            .await?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` unless the voucher is a DRAFT.
    pub async fn delete(&self, id: VoucherId) -> Result<(), ServiceError> {
        let current = self.get(id).await?.voucher;
        ensure_editable(current.status)?;
        self.vouchers.delete(id).await?;
        tracing::info!(voucher_id = %id, "Voucher deleted");
        Ok(())
    }

    /// Move a voucher through its approval workflow.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a forbidden transition or
    /// when approving a voucher without a positive item total.
    pub async fn change_status(
        &self,
        id: VoucherId,
        status: VoucherStatus,
        actor: &CurrentUser,
    ) -> Result<Voucher, ServiceError> {
        let current = self.get(id).await?;
        current.voucher.status.check_transition(status)?;

        if status == VoucherStatus::Approved {
            if current.items.is_empty() {
                return Err(ServiceError::invalid_state(
                    "Không thể duyệt phiếu chi chưa có dòng chi nào",
                ));
            }
            voucher_total(current.items.iter().map(|i| i.amount)).map_err(|_| {
                ServiceError::invalid_state("Tổng tiền phiếu chi phải lớn hơn 0")
            })?;
        }

        let updated = self
            .vouchers
            .set_status(id, status, actor.id, self.clock.now())
            .await?;
        tracing::info!(
            voucher_id = %id,
            from = %current.voucher.status,
            to = %status,
            by = %actor.username,
            "Voucher status changed"
        );
        Ok(updated)
    }

    /// Record an expense against a ticket.
    ///
    /// The first expense creates a PENDING voucher; later ones add items to
    /// it. The ticket gets a system comment either way.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidState` for a closed ticket and
    /// `ServiceError::Validation` for a non-positive amount.
    pub async fn create_from_ticket(
        &self,
        ticket_id: TicketId,
        input: &TicketVoucherInput,
        actor: &CurrentUser,
    ) -> Result<VoucherWithItems, ServiceError> {
        let tickets = TicketRepository::new(self.pool);
        let ticket = tickets
            .get(ticket_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Không tìm thấy yêu cầu"))?;
        if ticket.status.is_closed() {
            return Err(ServiceError::invalid_state(
                "Yêu cầu đã đóng, không thể tạo phiếu chi",
            ));
        }

        let (quantity, unit_price, amount) =
            expense_amounts(input.quantity, input.unit_price, input.amount)?;
        let item = NewVoucherItem {
            description: non_blank(input.note.as_deref()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            amount,
            service_type_id: input.service_type_id,
            apartment_id: ticket.apartment_id,
        };

        let voucher = match self.vouchers.find_by_ticket(ticket_id).await? {
            Some(existing) => {
                if existing.status != VoucherStatus::Pending && !existing.status.is_editable() {
                    return Err(ServiceError::InvalidState(format!(
                        "Phiếu chi {} đã {}, không thể thêm dòng chi",
                        existing.voucher_number, existing.status
                    )));
                }
                self.vouchers.add_item(existing.id, &item).await?
            }
            None => {
                let service_name = match input.service_type_id {
                    Some(id) => ServiceTypeRepository::new(self.pool)
                        .get(id)
                        .await?
                        .map(|s| s.name),
                    None => None,
                };
                self.vouchers
                    .create(&NewVoucher {
                        voucher_number: self.generate_number().await?,
                        company_info: None,
                        voucher_date: self.clock.today(),
                        description: Some(
                            service_name.map_or_else(|| "Phiếu chi".to_owned(), |n| format!("Chi phí {n}")),
                        ),
                        status: VoucherStatus::Pending,
                        ticket_id: Some(ticket_id),
                        created_by: Some(actor.id),
                        total_amount: amount,
                        items: vec![item],
                    })
                    .await?
            }
        };

        tickets.mark_has_invoice(ticket_id).await?;
        let comment = format!(
            "Đã tạo phiếu chi {} (trạng thái {}).",
            voucher.voucher.voucher_number, voucher.voucher.status
        );
        tickets
            .add_comment(ticket_id, Some(actor.id), &comment, true)
            .await?;

        tracing::info!(
            ticket_id = %ticket_id,
            voucher_number = %voucher.voucher.voucher_number,
            amount = %amount,
            "Ticket expense recorded"
        );
        Ok(voucher)
    }

    async fn ensure_unique_number(&self, requested: Option<&str>) -> Result<String, ServiceError> {
        match non_blank(requested) {
            Some(number) if !self.vouchers.exists_number(&number).await? => Ok(number),
            _ => self.generate_number().await,
        }
    }

    async fn generate_number(&self) -> Result<String, ServiceError> {
        for _ in 0..NUMBER_ATTEMPTS {
            let candidate = timestamped_voucher_no(self.clock.now_local());
            if !self.vouchers.exists_number(&candidate).await? {
                return Ok(candidate);
            }
        }
        let token = uuid::Uuid::new_v4().simple().to_string();
        Ok(format!(
            "VOU-{}-{token}",
            self.clock.now_local().format("%Y%m%d%H%M%S%3f")
        ))
    }
}

fn ensure_editable(status: VoucherStatus) -> Result<(), ServiceError> {
    if !status.is_editable() {
        return Err(ServiceError::InvalidState(format!(
            "Chỉ phiếu chi ở trạng thái DRAFT mới được sửa hoặc xóa (hiện tại: {status})"
        )));
    }
    Ok(())
}

/// `VOU-{yyyyMMddHHmmssfff}-{100..999}`.
fn timestamped_voucher_no(now: NaiveDateTime) -> String {
    let suffix: u32 = rand::rng().random_range(100..=999);
    format!("VOU-{}-{suffix}", now.format("%Y%m%d%H%M%S%3f"))
}

fn build_items(input: &VoucherInput) -> Result<Vec<NewVoucherItem>, ServiceError> {
    if input.items.is_empty() {
        let Some(amount) = input.total_amount else {
            return Err(ServiceError::validation("Phiếu chi phải có ít nhất một dòng chi"));
        };
        return Ok(vec![NewVoucherItem {
            description: non_blank(input.description.as_deref()),
            quantity: Some(Decimal::ONE),
            unit_price: Some(amount),
            amount,
            service_type_id: None,
            apartment_id: None,
        }]);
    }
    input.items.iter().map(build_item).collect()
}

fn build_item(input: &VoucherItemInput) -> Result<NewVoucherItem, ServiceError> {
    let amount = match (input.amount, input.quantity, input.unit_price) {
        (Some(amount), _, _) => amount,
        (None, Some(quantity), Some(price)) => round_vnd(checked_product(quantity, price)?),
        (None, None, Some(price)) => price,
        _ => return Err(ServiceError::validation("Dòng chi thiếu số tiền")),
    };
    if amount < Decimal::ZERO {
        return Err(ServiceError::validation("Số tiền không được âm"));
    }
    Ok(NewVoucherItem {
        description: non_blank(input.description.as_deref()),
        quantity: input.quantity,
        unit_price: input.unit_price,
        amount,
        service_type_id: input.service_type_id,
        apartment_id: input.apartment_id,
    })
}

/// Quantity, unit price and amount of a ticket expense.
///
/// Quantity defaults to 1. A missing unit price is derived from the
/// amount; a missing amount from quantity × unit price.
fn expense_amounts(
    quantity: Option<Decimal>,
    unit_price: Option<Decimal>,
    amount: Option<Decimal>,
) -> Result<(Decimal, Decimal, Decimal), ServiceError> {
    let quantity = quantity.unwrap_or(Decimal::ONE);
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::validation("Số lượng phải lớn hơn 0"));
    }
    let amount = amount.filter(|a| *a > Decimal::ZERO);
    let unit_price = match (unit_price, amount) {
        (Some(price), _) if price < Decimal::ZERO => {
            return Err(ServiceError::validation("Đơn giá không được nhỏ hơn 0"));
        }
        (Some(price), _) => price,
        (None, Some(amount)) => amount.checked_div(quantity).ok_or(MoneyError::Overflow)?,
        (None, None) => {
            return Err(ServiceError::validation(
                "Cần nhập đơn giá khi không có số tiền",
            ));
        }
    };
    let amount = match amount {
        Some(amount) => amount,
        None => round_vnd(checked_product(quantity, unit_price)?),
    };
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation("Số tiền của phiếu chi phải lớn hơn 0"));
    }
    Ok((quantity, unit_price, amount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn input(total: Option<&str>, items: Vec<VoucherItemInput>) -> VoucherInput {
        VoucherInput {
            voucher_number: None,
            company_info: None,
            voucher_date: None,
            description: Some("Sửa bơm nước".to_string()),
            total_amount: total.map(dec),
            items,
        }
    }

    fn item(quantity: Option<&str>, price: Option<&str>, amount: Option<&str>) -> VoucherItemInput {
        VoucherItemInput {
            description: None,
            quantity: quantity.map(dec),
            unit_price: price.map(dec),
            amount: amount.map(dec),
            service_type_id: None,
            apartment_id: None,
        }
    }

    #[test]
    fn test_total_becomes_single_item() {
        let items = build_items(&input(Some("1500000"), vec![])).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, dec("1500000"));
        assert_eq!(items[0].description.as_deref(), Some("Sửa bơm nước"));
        assert!(build_items(&input(None, vec![])).is_err());
    }

    #[test]
    fn test_item_amount_derivation() {
        let items = build_items(&input(None, vec![
            item(Some("3"), Some("20000"), None),
            item(None, None, Some("5000")),
        ]))
        .unwrap();
        assert_eq!(items[0].amount, dec("60000"));
        assert_eq!(voucher_total(items.iter().map(|i| i.amount)).unwrap(), dec("65000"));
        assert!(build_item(&item(Some("2"), None, None)).is_err());
        assert!(build_item(&item(None, None, Some("-1"))).is_err());
    }

    #[test]
    fn test_expense_amounts() {
        assert_eq!(
            expense_amounts(None, Some(dec("250000")), None).unwrap(),
            (Decimal::ONE, dec("250000"), dec("250000"))
        );
        assert_eq!(
            expense_amounts(Some(dec("4")), None, Some(dec("100000"))).unwrap(),
            (dec("4"), dec("25000"), dec("100000"))
        );
        assert!(expense_amounts(Some(Decimal::ZERO), Some(dec("1")), None).is_err());
        assert!(expense_amounts(None, None, None).is_err());
        assert!(expense_amounts(None, Some(dec("-5")), None).is_err());
        assert!(expense_amounts(None, Some(Decimal::ZERO), None).is_err());
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let huge = "100000000000000000";
        assert!(matches!(
            build_item(&item(Some(huge), Some(huge), None)),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            expense_amounts(Some(dec(huge)), Some(dec(huge)), None),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            build_items(&input(None, vec![
                item(None, None, Some("79228162514264337593543950335")),
                item(None, None, Some("1")),
            ]))
            .map(|items| voucher_total(items.iter().map(|i| i.amount))),
            Ok(Err(MoneyError::Overflow))
        ));
    }

    #[test]
    fn test_only_drafts_are_editable() {
        assert!(ensure_editable(VoucherStatus::Draft).is_ok());
        assert!(ensure_editable(VoucherStatus::Pending).is_err());
        assert!(ensure_editable(VoucherStatus::Approved).is_err());
    }

    #[test]
    fn test_voucher_number_format() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_milli_opt(9, 5, 3, 42)
            .unwrap();
        assert!(timestamped_voucher_no(now).starts_with("VOU-20250307090503042-"));
    }
}
