pub mod access;
pub mod health_log;
pub mod history;

pub use access::*;
pub use health_log::*;
pub use history::*;
