pub mod health;
pub mod messages;
pub mod queries;
pub mod utils;
