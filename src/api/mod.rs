// API module
//
// Thin HTTP layer over the core ledger: request/response marshaling only,
// all rules live in the blockchain module

pub mod handlers;
pub mod routes;
pub mod schema;

// Re-export main components for easier access
pub use routes::configure_routes;
