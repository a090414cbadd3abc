pub mod appointments;
pub mod check_logs;
pub mod passes;
