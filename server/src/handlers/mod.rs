//! Request-handling logic, composed over the record services.
//!
//! The cross-entity lifecycle rules live here, not in the services:
//! deleting a mileage log zeroes its linked trip, restoring a mileage
//! log requires an active parent, and mileage writes against a missing
//! or deleted trip are rejected. Direct service calls bypass those
//! guards.

mod records;
mod trash;

pub use records::{create_record, delete_record, list_records, update_record};
pub use trash::{list_trash, purge_record, restore_record};
