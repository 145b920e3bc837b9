use serde::Serialize;

use crate::core::types::Status;
use crate::core::validate::{Validator, permitted_value};

/// Sort values accepted for goal and task listings; a leading `-` flips the
/// direction.
pub const GOAL_SORT_SAFELIST: &[&str] = &[
    "serial_id",
    "title",
    "created_at",
    "due_date",
    "last_active",
    "-serial_id",
    "-title",
    "-created_at",
    "-due_date",
    "-last_active",
];

pub const TASK_SORT_SAFELIST: &[&str] = GOAL_SORT_SAFELIST;

pub const SESSION_SORT_SAFELIST: &[&str] = &[
    "serial_id",
    "starts_at",
    "created_at",
    "updated_at",
    "-serial_id",
    "-starts_at",
    "-created_at",
    "-updated_at",
];

const MAX_PAGE: u32 = 10_000_000;
const MAX_PAGE_SIZE: u32 = 100;

/// Listing parameters shared by every resource kind. An empty search phrase
/// and an empty status set mean "no restriction".
#[derive(Debug, Clone)]
pub struct Filters {
    pub search: String,
    pub statuses: Vec<Status>,
    pub page: u32,
    pub page_size: u32,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            search: String::new(),
            statuses: Vec::new(),
            page: 1,
            page_size: 20,
            sort: "-last_active".to_string(),
        }
    }
}

impl Filters {
    pub fn sort_field(&self) -> &str {
        self.sort.strip_prefix('-').unwrap_or(&self.sort)
    }

    pub fn descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

/// Validates filters against the per-kind safelists. Invalid sort or status
/// values are validation errors, never silently ignored.
pub fn validate_filters(
    filters: &Filters,
    sort_safelist: &[&str],
    status_safelist: &[Status],
) -> crate::core::error::Result<()> {
    let mut v = Validator::new();

    v.check(filters.page > 0, "page", "must be greater than zero");
    v.check(filters.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
    v.check(filters.page_size > 0, "page_size", "must be greater than zero");
    v.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    v.check(
        permitted_value(&filters.sort.as_str(), sort_safelist),
        "sort",
        "invalid sort value",
    );
    for status in &filters.statuses {
        v.check(
            permitted_value(status, status_safelist),
            "status",
            "invalid status filter value",
        );
    }

    v.finish()
}

/// Pagination summary computed over the full filtered set before paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub current_page: u32,
    pub page_size: u32,
    pub first_page: u32,
    pub last_page: u32,
    pub total_records: usize,
}

pub fn calculate_metadata(total_records: usize, page: u32, page_size: u32) -> Metadata {
    if total_records == 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records as u32).div_ceil(page_size),
        total_records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::STATUS_SAFELIST;

    #[test]
    fn default_filters_validate() {
        let filters = Filters::default();
        assert!(validate_filters(&filters, GOAL_SORT_SAFELIST, STATUS_SAFELIST).is_ok());
    }

    #[test]
    fn rejects_unlisted_sort() {
        let filters = Filters {
            sort: "password".to_string(),
            ..Filters::default()
        };
        let err = validate_filters(&filters, GOAL_SORT_SAFELIST, STATUS_SAFELIST).unwrap_err();
        match err.kind {
            ErrorKind::Validation(fields) => assert!(fields.contains_key("sort")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_out_of_range_paging() {
        let filters = Filters {
            page: 0,
            page_size: 500,
            ..Filters::default()
        };
        let err = validate_filters(&filters, GOAL_SORT_SAFELIST, STATUS_SAFELIST).unwrap_err();
        match err.kind {
            ErrorKind::Validation(fields) => {
                assert!(fields.contains_key("page"));
                assert!(fields.contains_key("page_size"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_session_status_outside_safelist() {
        use crate::core::types::{SESSION_STATUS_SAFELIST, Status};
        let filters = Filters {
            statuses: vec![Status::Queued],
            sort: "-starts_at".to_string(),
            ..Filters::default()
        };
        assert!(
            validate_filters(&filters, SESSION_SORT_SAFELIST, SESSION_STATUS_SAFELIST).is_err()
        );
    }

    #[test]
    fn sort_direction_parsing() {
        let filters = Filters {
            sort: "-due_date".to_string(),
            ..Filters::default()
        };
        assert_eq!(filters.sort_field(), "due_date");
        assert!(filters.descending());
    }

    #[test]
    fn metadata_math() {
        let m = calculate_metadata(101, 3, 20);
        assert_eq!(m.first_page, 1);
        assert_eq!(m.last_page, 6);
        assert_eq!(m.total_records, 101);

        assert_eq!(calculate_metadata(0, 1, 20), Metadata::default());
    }
}
