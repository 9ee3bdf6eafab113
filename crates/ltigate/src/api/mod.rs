//! HTTP handlers.

mod execute;
mod grade;
mod health;
mod jwks;
mod launch;
mod legacy;
mod login;
mod metrics;
mod request;
mod router;


pub use router::{create_router, AppState};
