use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};

use crate::search::filters::{Filters, Metadata, calculate_metadata};

/// A single sortable value extracted from a record for the listing's primary
/// sort key. Missing optional values compare as greatest, so an ascending
/// sort puts them last and a descending sort puts them first.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    OptTime(Option<DateTime<Utc>>),
    OptDate(Option<NaiveDate>),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            (SortValue::OptTime(a), SortValue::OptTime(b)) => compare_optional(a, b),
            (SortValue::OptDate(a), SortValue::OptDate(b)) => compare_optional(a, b),
            // Mixed variants only arise from a programming error in the key
            // extractor; treat them as equal so the stable tie-breaks decide.
            _ => Ordering::Equal,
        }
    }
}

fn compare_optional<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A candidate row: the materialized item plus everything ordering needs.
pub struct Hit<T> {
    pub item: T,
    pub sort: SortValue,
    pub score: f32,
    pub serial: i64,
}

/// Orders candidates by the primary sort key in the requested direction,
/// breaking ties by relevance score (highest first) and then serial
/// (newest first), and slices out the requested page. The metadata counts
/// the full set, not the page.
pub fn order_and_page<T>(mut hits: Vec<Hit<T>>, filters: &Filters) -> (Vec<T>, Metadata) {
    let descending = filters.descending();

    hits.sort_by(|a, b| {
        let primary = a.sort.compare(&b.sort);
        let primary = if descending { primary.reverse() } else { primary };
        primary
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| b.serial.cmp(&a.serial))
    });

    let total = hits.len();
    let metadata = calculate_metadata(total, filters.page, filters.page_size);

    let page: Vec<T> = hits
        .into_iter()
        .skip(filters.offset())
        .take(filters.limit())
        .map(|hit| hit.item)
        .collect();

    (page, metadata)
}
