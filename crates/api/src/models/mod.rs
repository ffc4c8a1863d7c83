//! Domain models returned by repositories and serialized to the SPA.
//!
//! Request bodies (`*Input`) and list filters (`*Filter`) live next to the
//! model they create or query.

pub mod access_card;
pub mod amenity;
pub mod announcement;
pub mod asset;
pub mod building;
pub mod document;
pub mod invoice;
pub mod receipt;
pub mod session;
pub mod ticket;
pub mod user;
pub mod vehicle;
pub mod voucher;

use sams_core::{PageRequest, SortOrder};

/// Paging fields accepted on every list query string.
///
/// Kept as plain optional fields because `serde_urlencoded` cannot
/// deserialize numbers through `#[serde(flatten)]`.
pub trait Paged {
    fn page_fields(&self) -> (Option<u32>, Option<u32>);

    fn page_request(&self) -> PageRequest {
        let (page, page_size) = self.page_fields();
        PageRequest::new(page.unwrap_or(1), page_size.unwrap_or(PageRequest::DEFAULT_PAGE_SIZE))
    }
}

/// Resolve a client-supplied sort column against a whitelist.
///
/// Matching is case-insensitive; unknown columns fall back to `default`.
#[must_use]
pub fn sort_column(
    requested: Option<&str>,
    whitelist: &[(&str, &'static str)],
    default: &'static str,
) -> &'static str {
    requested
        .map(str::trim)
        .and_then(|key| {
            whitelist
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, column)| *column)
        })
        .unwrap_or(default)
}

/// `ORDER BY` direction from an optional `asc`/`desc` query value.
#[must_use]
pub fn sort_direction(requested: Option<&str>) -> &'static str {
    SortOrder::from_query(requested).as_sql()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_column_whitelist() {
        let whitelist = [("dueDate", "i.due_date"), ("total", "i.total_amount")];
        assert_eq!(sort_column(Some("DUEDATE"), &whitelist, "i.created_at"), "i.due_date");
        assert_eq!(
            sort_column(Some("id; DROP TABLE x"), &whitelist, "i.created_at"),
            "i.created_at"
        );
        assert_eq!(sort_column(None, &whitelist, "i.created_at"), "i.created_at");
        assert_eq!(sort_direction(Some("asc")), "ASC");
        assert_eq!(sort_direction(None), "DESC");
    }
}
