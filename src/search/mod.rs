pub mod filters;
pub mod ranker;

pub use filters::{Filters, Metadata, calculate_metadata, validate_filters};
pub use ranker::{Hit, SortValue, order_and_page};
