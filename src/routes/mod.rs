mod common;
mod controller;

pub use common::common_routes;
pub use controller::{controller_routes, FromState};
