pub mod appointment_service;
pub mod check_log_service;
pub mod document_service;
pub mod notification_service;
pub mod pass_service;
pub mod qr_service;
pub mod sweeper;
pub mod verification_service;
