pub mod store;
pub use store::EntityStore;
pub mod pg_store;
pub use pg_store::PgStore;

pub mod appointment_repo;
pub mod check_log_repo;
pub mod pass_repo;
pub mod user_repo;

#[cfg(test)]
pub mod memory_store;
#[cfg(test)]
pub use memory_store::MemoryStore;
