pub mod request;
pub mod response;
pub mod routes;

pub use response::{ApiError, ErrorResponse};
pub use routes::{create_router, AppState};
