pub mod core;
pub mod database;
pub mod llm;
pub mod query;
pub mod relations;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
