pub mod request_id;

pub use request_id::{generate_request_id, new_order_id};

use chrono::Utc;

/// Get current timestamp in milliseconds (UTC)
pub fn get_current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
