//! Newtype IDs for type-safe entity references.
//!
//! Every table in the building schema is keyed by a UUID. Use the
//! `define_id!` macro to create wrappers that prevent accidentally passing a
//! `TicketId` where an `InvoiceId` is expected.

use uuid::Uuid;

/// Macro to define a type-safe UUID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `new_v4()`, `as_uuid()`
/// - `From<Uuid>` and `Into<Uuid>` implementations, `FromStr`
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use sams_core::define_id;
/// define_id!(TenantId);
/// define_id!(LeaseId);
///
/// let tenant = TenantId::new_v4();
/// let lease = LeaseId::new_v4();
///
/// // These are different types, so this won't compile:
/// // let _: TenantId = lease;
/// # let _ = (tenant, lease);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <::uuid::Uuid as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <::uuid::Uuid as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <::uuid::Uuid as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <::uuid::Uuid as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Accounts
define_id!(UserId);
define_id!(ResidentId);

// Building structure
define_id!(FloorId);
define_id!(ApartmentId);

// Tickets
define_id!(TicketId);
define_id!(CommentId);

// Finance
define_id!(InvoiceId);
define_id!(InvoiceDetailId);
define_id!(ServiceTypeId);
define_id!(VoucherId);
define_id!(VoucherItemId);
define_id!(ServicePriceId);
define_id!(ReceiptId);

// Amenities
define_id!(AmenityId);
define_id!(PackageId);
define_id!(BookingId);

// Assets
define_id!(AssetId);
define_id!(ScheduleId);

// Access control
define_id!(CardId);
define_id!(CardHistoryId);

// Parking
define_id!(VehicleId);

// Documents
define_id!(DocumentId);
define_id!(DocumentVersionId);
define_id!(ActionLogId);

// Announcements
define_id!(AnnouncementId);

/// Parse an ID from a path segment or query value, returning `None` for
/// anything that is not a UUID.
#[must_use]
pub fn parse_uuid(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_matches_uuid() {
        let raw = Uuid::new_v4();
        let id = TicketId::new(raw);
        assert_eq!(id.to_string(), raw.to_string());
        assert_eq!(Uuid::from(id), raw);
    }

    #[test]
    fn test_id_from_str() {
        let id: InvoiceId = "6f1c1b2e-8e55-4c3f-9d9a-0c7f5b1e2a10".parse().expect("valid uuid");
        assert_eq!(
            id.as_uuid().to_string(),
            "6f1c1b2e-8e55-4c3f-9d9a-0c7f5b1e2a10"
        );
        assert!("not-a-uuid".parse::<InvoiceId>().is_err());
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id = ApartmentId::new_v4();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_parse_uuid_trims() {
        assert!(parse_uuid(" 6f1c1b2e-8e55-4c3f-9d9a-0c7f5b1e2a10 ").is_some());
        assert!(parse_uuid("42").is_none());
    }
}
