//! MVC SDK: verb-dispatched controllers and active-record persistence over PostgreSQL.

pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod method;
pub mod request;
pub mod response;
pub mod routes;
pub mod sql;
pub mod stack;
pub mod state;

pub use config::{init_tracing, load_env, DatabaseConfig, ServerConfig, StackConfig};
pub use controller::{Action, ActionFuture, Controller, Dispatcher, VerbTable};
pub use db::{connect, Batch, DatabaseAgent, Outcome, PgAgent, Row, Vendor};
pub use error::{AppError, ConfigError, DbError};
pub use method::Verb;
pub use request::Request;
pub use response::{success_many, success_one, success_one_ok, success_page};
pub use routes::{common_routes, controller_routes, FromState};
pub use sql::{Limit, Order, Statement, StatementKind};
pub use stack::{FindAll, Model, Record, Saved};
pub use state::AppState;
