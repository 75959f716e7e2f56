//! Authoritative record services, one instance per entity type.

mod records;

pub use records::RecordService;
