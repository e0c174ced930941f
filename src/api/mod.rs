pub mod callback_server;

pub use callback_server::*;
