pub mod bot_detection;
pub mod metrics;
pub mod security_headers;
pub mod tracing;

pub use bot_detection::bot_detection_middleware;
pub use metrics::metrics_middleware;
pub use security_headers::security_headers_middleware;
pub use tracing::{REQUEST_ID_HEADER, request_id_middleware};
