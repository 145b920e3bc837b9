pub mod entry;

pub use entry::IndexEntry;
