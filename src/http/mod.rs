//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, client address)
//!     → route handlers (auth, upload, files.rs, health)
//!     → response.rs (JSON envelope)
//!     → Send to client
//! ```

pub mod files;
pub mod request;
pub mod response;
pub mod server;

pub use request::{client_ip, MakeRequestUuid, X_REQUEST_ID};
pub use response::ApiResponse;
pub use server::{AppServer, AppState, ServerError};
