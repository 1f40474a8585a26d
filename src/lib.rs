pub mod config;
pub mod error;
pub mod loan;
pub mod middleware;
pub mod routes;
pub mod telemetry;
