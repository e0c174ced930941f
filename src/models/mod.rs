pub use account::*;
pub use api_response::*;
pub use callback::*;
pub use order::*;
pub use payment_errors::*;

pub mod account;
pub mod api_response;
pub mod callback;
pub mod order;
pub mod payment_errors;
