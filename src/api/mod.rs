mod handlers;
mod request_id;
mod routes;
mod session;
mod state;

pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use routes::create_router;
pub use session::{bearer_token, Session};
pub use state::{AppState, RecommendationRun};
