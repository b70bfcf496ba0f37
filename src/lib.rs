pub mod auth;
pub mod board;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod geo;
pub mod import;
pub mod models;
pub mod push;
pub mod realtime;
pub mod reconcile;
pub mod retry;
pub mod routes;
pub mod schema;
pub mod shares;
pub mod state;
pub mod stats;
pub mod store;

pub use board::{BoardFilter, BoardMode, BoardSession};
pub use reconcile::{Reconciler, StatusOutcome};
pub use store::{DataStore, PgStore};
