//! Status enums and their workflow tables.
//!
//! Statuses are stored as `TEXT` columns carrying the wire values below
//! (some of them Vietnamese, as the residents' app displays them verbatim).
//! Parsing is case-insensitive and tolerant of surrounding whitespace.

/// Errors produced when parsing a status or applying a transition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The value is not one of the known wire values.
    #[error("invalid {kind}: {value}")]
    Unknown {
        /// Which status family was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
    /// The entity is already in the requested status.
    #[error("already {0}")]
    Unchanged(&'static str),
    /// The workflow table does not allow this move.
    #[error("cannot change status from \"{from}\" to \"{to}\"")]
    InvalidTransition {
        /// Current status.
        from: &'static str,
        /// Requested status.
        to: &'static str,
    },
}

/// Declares a status enum backed by string wire values.
///
/// Generates `as_str`, `ALL`, `Display`, case-insensitive `FromStr`
/// (with optional aliases) and string-based serde impls.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $wire:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored wire value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::status::StatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_lowercase();
                $(
                    if needle == $wire.to_lowercase() $(|| needle == $alias.to_lowercase())* {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::types::status::StatusError::Unknown { kind: $kind, value: s.to_owned() })
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(<D::Error as ::serde::de::Error>::custom)
            }
        }
    };
}

pub(crate) use wire_enum;

fn check(
    from: &'static str,
    to: &'static str,
    same: bool,
    allowed: bool,
) -> Result<(), StatusError> {
    if same {
        return Err(StatusError::Unchanged(from));
    }
    if allowed {
        Ok(())
    } else {
        Err(StatusError::InvalidTransition { from, to })
    }
}

// =============================================================================
// Tickets
// =============================================================================

wire_enum! {
    /// Service ticket lifecycle. Moves strictly one step forward.
    #[derive(Default)]
    pub enum TicketStatus ("ticket status") {
        #[default]
        New => "Mới tạo",
        Received => "Đã tiếp nhận",
        InProgress => "Đang xử lý",
        Completed => "Hoàn thành",
        Closed => "Đã đóng",
        /// Legacy value found in old rows. Has no outgoing transitions.
        Pending => "Chờ xử lý",
    }
}

impl TicketStatus {
    /// Statuses a client may request.
    pub const WORKFLOW: [Self; 5] = [
        Self::New,
        Self::Received,
        Self::InProgress,
        Self::Completed,
        Self::Closed,
    ];

    /// The only status this one may move to.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Received),
            Self::Received => Some(Self::InProgress),
            Self::InProgress => Some(Self::Completed),
            Self::Completed => Some(Self::Closed),
            Self::Closed | Self::Pending => None,
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next() == Some(next)
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `Unchanged` for a same-state request and `InvalidTransition`
    /// for anything other than the single next step.
    pub fn check_transition(self, next: Self) -> Result<(), StatusError> {
        check(
            self.as_str(),
            next.as_str(),
            self == next,
            self.can_transition_to(next),
        )
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

// =============================================================================
// Invoices
// =============================================================================

wire_enum! {
    /// Invoice lifecycle.
    #[derive(Default)]
    pub enum InvoiceStatus ("invoice status") {
        #[default]
        Draft => "DRAFT",
        Issued => "ISSUED",
        Overdue => "OVERDUE",
        Paid => "PAID",
        Cancelled => "CANCELLED",
    }
}

impl InvoiceStatus {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Issued | Self::Cancelled)
                | (Self::Issued, Self::Paid | Self::Overdue | Self::Cancelled)
                | (Self::Overdue, Self::Paid | Self::Cancelled)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `Unchanged` when `next == self`, `InvalidTransition` when the
    /// table forbids the move (PAID and CANCELLED are terminal).
    pub fn check_transition(self, next: Self) -> Result<(), StatusError> {
        check(
            self.as_str(),
            next.as_str(),
            self == next,
            self.can_transition_to(next),
        )
    }

    /// Header and details may be edited.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Issued | Self::Overdue)
    }

    #[must_use]
    pub const fn is_deletable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Still owed by the resident. Blocks closing a linked ticket.
    #[must_use]
    pub const fn is_unpaid(self) -> bool {
        !matches!(self, Self::Paid)
    }
}

// =============================================================================
// Vouchers
// =============================================================================

wire_enum! {
    /// Payment voucher (phiếu chi) approval workflow.
    #[derive(Default)]
    pub enum VoucherStatus ("voucher status") {
        #[default]
        Draft => "DRAFT",
        Pending => "PENDING",
        Approved => "APPROVED",
        Cancelled => "CANCELLED",
    }
}

impl VoucherStatus {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Pending | Self::Cancelled)
                | (Self::Pending, Self::Approved | Self::Draft | Self::Cancelled)
                | (Self::Cancelled, Self::Draft)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `Unchanged` or `InvalidTransition`; APPROVED is final.
    pub fn check_transition(self, next: Self) -> Result<(), StatusError> {
        check(
            self.as_str(),
            next.as_str(),
            self == next,
            self.can_transition_to(next),
        )
    }

    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }
}

// =============================================================================
// Service prices and receipts
// =============================================================================

wire_enum! {
    /// A service price row. Cancelled rows never apply.
    #[derive(Default)]
    pub enum PriceStatus ("price status") {
        #[default]
        Approved => "APPROVED",
        Cancelled => "CANCELED" | "CANCELLED",
    }
}

wire_enum! {
    /// How a receipted payment was made.
    #[derive(Default)]
    pub enum PaymentMethod ("payment method") {
        #[default]
        Cash => "CASH",
        BankTransfer => "BANK_TRANSFER" | "TRANSFER",
        Card => "CARD",
        EWallet => "EWALLET" | "MOMO" | "VIETQR",
    }
}

// =============================================================================
// Amenity bookings
// =============================================================================

wire_enum! {
    #[derive(Default)]
    pub enum BookingStatus ("booking status") {
        #[default]
        Pending => "Pending",
        Confirmed => "Confirmed",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
}

impl BookingStatus {
    /// Statuses that occupy the booked range for overlap checks.
    pub const ACTIVE: [Self; 3] = [Self::Pending, Self::Confirmed, Self::Completed];

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Completed | Self::Cancelled)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `Unchanged` or `InvalidTransition`.
    pub fn check_transition(self, next: Self) -> Result<(), StatusError> {
        check(
            self.as_str(),
            next.as_str(),
            self == next,
            self.can_transition_to(next),
        )
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum PaymentStatus ("payment status") {
        #[default]
        Unpaid => "Unpaid",
        Paid => "Paid",
        Refunded => "Refunded",
    }
}

wire_enum! {
    /// Unit of an amenity package's duration.
    #[derive(Default)]
    pub enum PeriodUnit ("period unit") {
        Day => "Day",
        #[default]
        Month => "Month",
    }
}

// =============================================================================
// Maintenance schedules
// =============================================================================

wire_enum! {
    /// Asset maintenance schedule lifecycle.
    #[derive(Default)]
    pub enum ScheduleStatus ("schedule status") {
        #[default]
        Scheduled => "SCHEDULED",
        InProgress => "IN_PROGRESS",
        Done => "DONE",
        Cancelled => "CANCELLED",
    }
}

impl ScheduleStatus {
    /// Statuses considered when checking for overlapping schedules.
    pub const ACTIVE: [Self; 2] = [Self::Scheduled, Self::InProgress];

    /// `SCHEDULED -> SCHEDULED` is a reschedule and is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Scheduled,
                Self::InProgress | Self::Cancelled | Self::Scheduled
            ) | (Self::InProgress, Self::Done | Self::Scheduled | Self::Cancelled)
                | (Self::Cancelled, Self::Scheduled)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the table forbids the move. DONE is
    /// terminal.
    pub fn check_transition(self, next: Self) -> Result<(), StatusError> {
        check(
            self.as_str(),
            next.as_str(),
            self == next && !matches!(self, Self::Scheduled),
            self.can_transition_to(next),
        )
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }
}

// =============================================================================
// Documents
// =============================================================================

wire_enum! {
    /// Document approval status. Vietnamese display names parse as aliases.
    #[derive(Default)]
    pub enum DocumentStatus ("document status") {
        #[default]
        PendingApproval => "PENDING_APPROVAL" | "Chờ duyệt",
        Active => "ACTIVE" | "Hoạt động",
        Rejected => "REJECTED" | "Bị từ chối",
        Inactive => "INACTIVE" | "Ngừng hiển thị",
        Deleted => "DELETED" | "Đã xóa",
    }
}

impl DocumentStatus {
    /// Metadata may not be edited while awaiting approval or hidden.
    #[must_use]
    pub const fn allows_metadata_edit(self) -> bool {
        !matches!(self, Self::PendingApproval | Self::Inactive | Self::Deleted)
    }
}

wire_enum! {
    /// Kinds of entries in a document's action log.
    pub enum DocumentAction ("document action") {
        Create => "CREATE",
        UploadVersion => "UPLOAD_VERSION" | "NEW_VERSION",
        ChangeStatus => "CHANGE_STATUS",
        RequestReactivate => "REQUEST_REACTIVATE",
        UpdateMetadata => "UPDATE_METADATA",
        /// First delete step: the document is hidden.
        SoftDelete => "SOFT_DELETE",
        /// Second delete step on a hidden document.
        HardDelete => "HARD_DELETE",
    }
}

// =============================================================================
// Announcements
// =============================================================================

wire_enum! {
    #[derive(Default)]
    pub enum AnnouncementStatus ("announcement status") {
        Scheduled => "SCHEDULED",
        #[default]
        Active => "ACTIVE",
        Expired => "EXPIRED",
        Inactive => "INACTIVE",
    }
}

impl AnnouncementStatus {
    /// Derive the status from a visibility window.
    ///
    /// A start in the future means `Scheduled`, an end in the past means
    /// `Expired`, anything else is `Active`.
    #[must_use]
    pub fn derive<T: PartialOrd>(visible_from: &T, visible_to: Option<&T>, now: &T) -> Self {
        if visible_from > now {
            Self::Scheduled
        } else if visible_to.is_some_and(|to| to < now) {
            Self::Expired
        } else {
            Self::Active
        }
    }
}

wire_enum! {
    /// Announcement kinds. Only user-facing kinds get a derived status.
    #[derive(Default)]
    pub enum AnnouncementType ("announcement type") {
        #[default]
        Announcement => "ANNOUNCEMENT",
        Event => "EVENT",
        MaintenanceReminder => "MAINTENANCE_REMINDER",
        System => "SYSTEM",
    }
}

impl AnnouncementType {
    #[must_use]
    pub const fn derives_status(self) -> bool {
        matches!(self, Self::Announcement | Self::Event)
    }
}

// =============================================================================
// Access cards, assets, amenities
// =============================================================================

wire_enum! {
    #[derive(Default)]
    pub enum CardStatus ("card status") {
        #[default]
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Lost => "LOST",
        Expired => "EXPIRED",
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum AssetStatus ("asset status") {
        #[default]
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Maintenance => "MAINTENANCE",
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum AmenityStatus ("amenity status") {
        #[default]
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Maintenance => "MAINTENANCE",
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum ApartmentStatus ("apartment status") {
        #[default]
        Active => "ACTIVE",
        Inactive => "INACTIVE",
    }
}

// =============================================================================
// Vehicles
// =============================================================================

wire_enum! {
    pub enum VehicleType ("vehicle type") {
        Motorbike => "MOTORBIKE" | "BIKE",
        Car => "CAR",
    }
}

impl VehicleType {
    /// Code of the service type billing a month of parking for this kind
    /// of vehicle.
    #[must_use]
    pub const fn parking_service_code(self) -> &'static str {
        match self {
            Self::Motorbike => "PARKING_BIKE",
            Self::Car => "PARKING_CAR",
        }
    }

    /// The vehicle kind a parking service code bills, if any.
    #[must_use]
    pub fn for_parking_service(code: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.parking_service_code().eq_ignore_ascii_case(code.trim()))
    }
}

wire_enum! {
    /// Only ACTIVE vehicles are billed for parking.
    #[derive(Default)]
    pub enum VehicleStatus ("vehicle status") {
        #[default]
        Active => "ACTIVE",
        Inactive => "INACTIVE",
    }
}

// =============================================================================
// Roles
// =============================================================================

wire_enum! {
    /// Account role. Everything except `Resident` is building staff.
    pub enum UserRole ("role") {
        Admin => "admin",
        Manager => "manager",
        Accountant => "accountant",
        Receptionist => "receptionist",
        Resident => "resident",
    }
}

impl UserRole {
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Resident)
    }

    /// May create, edit and approve invoices and vouchers.
    #[must_use]
    pub const fn is_finance(self) -> bool {
        matches!(self, Self::Admin | Self::Manager | Self::Accountant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_moves_one_step_only() {
        assert!(TicketStatus::New.can_transition_to(TicketStatus::Received));
        assert!(!TicketStatus::New.can_transition_to(TicketStatus::InProgress));
        assert!(!TicketStatus::Received.can_transition_to(TicketStatus::New));
        assert!(TicketStatus::Completed.can_transition_to(TicketStatus::Closed));
        assert_eq!(TicketStatus::Closed.next(), None);
        assert_eq!(TicketStatus::Pending.next(), None);
    }

    #[test]
    fn test_ticket_check_transition_errors() {
        assert_eq!(
            TicketStatus::New.check_transition(TicketStatus::New),
            Err(StatusError::Unchanged("Mới tạo"))
        );
        assert!(matches!(
            TicketStatus::New.check_transition(TicketStatus::Closed),
            Err(StatusError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_ticket_status_parse_vietnamese() {
        assert_eq!(
            "  đang xử lý ".parse::<TicketStatus>(),
            Ok(TicketStatus::InProgress)
        );
        assert_eq!("Đã đóng".parse::<TicketStatus>(), Ok(TicketStatus::Closed));
        assert!("Open".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_invoice_transitions() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition_to(Issued));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(!Draft.can_transition_to(Paid));
        assert!(Issued.can_transition_to(Overdue));
        assert!(Overdue.can_transition_to(Paid));
        assert!(!Overdue.can_transition_to(Issued));
        for next in InvoiceStatus::ALL {
            assert!(!Paid.can_transition_to(*next));
            assert!(!Cancelled.can_transition_to(*next));
        }
        assert_eq!(
            Issued.check_transition(Issued),
            Err(StatusError::Unchanged("ISSUED"))
        );
    }

    #[test]
    fn test_invoice_editable_and_deletable() {
        assert!(InvoiceStatus::Overdue.is_editable());
        assert!(!InvoiceStatus::Paid.is_editable());
        assert!(InvoiceStatus::Draft.is_deletable());
        assert!(!InvoiceStatus::Issued.is_deletable());
    }

    #[test]
    fn test_voucher_transitions() {
        use VoucherStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Draft));
        assert!(Pending.can_transition_to(Approved));
        assert!(Cancelled.can_transition_to(Draft));
        assert!(!Cancelled.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Draft));
        assert!(!Approved.can_transition_to(Cancelled));
    }

    #[test]
    fn test_booking_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert_eq!(BookingStatus::ACTIVE.len(), 3);
        assert!(!Cancelled.is_active());
    }

    #[test]
    fn test_schedule_transitions() {
        use ScheduleStatus::*;
        assert!(Scheduled.check_transition(Scheduled).is_ok());
        assert!(InProgress.can_transition_to(Done));
        assert!(Cancelled.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(InProgress));
        assert!(!Done.can_transition_to(Scheduled));
        assert_eq!(
            Done.check_transition(Done),
            Err(StatusError::Unchanged("DONE"))
        );
    }

    #[test]
    fn test_document_status_aliases() {
        assert_eq!(
            "Chờ duyệt".parse::<DocumentStatus>(),
            Ok(DocumentStatus::PendingApproval)
        );
        assert_eq!(
            "ngừng hiển thị".parse::<DocumentStatus>(),
            Ok(DocumentStatus::Inactive)
        );
        assert_eq!("active".parse::<DocumentStatus>(), Ok(DocumentStatus::Active));
        assert_eq!(DocumentStatus::Rejected.to_string(), "REJECTED");
    }

    #[test]
    fn test_announcement_derive() {
        let now = 100;
        assert_eq!(
            AnnouncementStatus::derive(&150, None, &now),
            AnnouncementStatus::Scheduled
        );
        assert_eq!(
            AnnouncementStatus::derive(&10, Some(&50), &now),
            AnnouncementStatus::Expired
        );
        assert_eq!(
            AnnouncementStatus::derive(&10, Some(&200), &now),
            AnnouncementStatus::Active
        );
        assert_eq!(
            AnnouncementStatus::derive(&10, None, &now),
            AnnouncementStatus::Active
        );
    }

    #[test]
    fn test_role_parse_and_staff() {
        assert_eq!("Admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert!(UserRole::Receptionist.is_staff());
        assert!(!UserRole::Resident.is_staff());
        assert!(UserRole::Accountant.is_finance());
        assert!(!UserRole::Receptionist.is_finance());
    }

    #[test]
    fn test_parking_service_codes() {
        assert_eq!(VehicleType::Motorbike.parking_service_code(), "PARKING_BIKE");
        assert_eq!(
            VehicleType::for_parking_service("parking_car"),
            Some(VehicleType::Car)
        );
        assert_eq!(VehicleType::for_parking_service("MGMT_FEE"), None);
        assert_eq!("bike".parse::<VehicleType>(), Ok(VehicleType::Motorbike));
    }

    #[test]
    fn test_price_status_accepts_both_spellings() {
        assert_eq!("CANCELLED".parse::<PriceStatus>(), Ok(PriceStatus::Cancelled));
        assert_eq!(PriceStatus::Cancelled.as_str(), "CANCELED");
    }

    #[test]
    fn test_status_serde_uses_wire_values() {
        let json = serde_json::to_string(&TicketStatus::Received).expect("serialize");
        assert_eq!(json, "\"Đã tiếp nhận\"");
        let parsed: InvoiceStatus = serde_json::from_str("\"overdue\"").expect("deserialize");
        assert_eq!(parsed, InvoiceStatus::Overdue);
        assert!(serde_json::from_str::<CardStatus>("\"BROKEN\"").is_err());
    }
}
