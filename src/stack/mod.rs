//! Active-record stack: field bag, persistence operations, typed models.

mod model;
mod record;
pub use model::Model;
pub use record::{FindAll, Record, Saved};
