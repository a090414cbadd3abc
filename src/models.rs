pub mod appointment;
pub mod auth;
pub mod check_log;
pub mod page;
pub mod pass;
pub mod people;
