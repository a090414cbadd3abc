// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Appointments ---
        handlers::appointments::create_public,
        handlers::appointments::create_appointment,
        handlers::appointments::list_appointments,
        handlers::appointments::appointment_stats,
        handlers::appointments::my_appointments,
        handlers::appointments::appointments_by_visitor,
        handlers::appointments::get_appointment,
        handlers::appointments::update_appointment,
        handlers::appointments::approve_appointment,
        handlers::appointments::reject_appointment,
        handlers::appointments::cancel_appointment,

        // --- Passes ---
        handlers::passes::verify_by_path,
        handlers::passes::verify_by_body,
        handlers::passes::issue_pass,
        handlers::passes::list_passes,
        handlers::passes::pass_stats,
        handlers::passes::my_active_pass,
        handlers::passes::expire_passes,
        handlers::passes::get_pass,
        handlers::passes::revoke_pass,

        // --- Check-in ---
        handlers::check_logs::check_in,
        handlers::check_logs::check_out,
        handlers::check_logs::list_check_logs,
        handlers::check_logs::current_visitors,
        handlers::check_logs::check_log_stats,
        handlers::check_logs::visitor_history,
        handlers::check_logs::get_check_log,
    ),
    components(
        schemas(
            // --- Pessoas ---
            models::auth::Role,
            models::people::VisitorSummary,
            models::people::HostSummary,

            // --- Appointments ---
            models::appointment::AppointmentStatus,
            models::appointment::Appointment,
            models::appointment::AppointmentDetail,
            models::appointment::AppointmentCreated,
            models::appointment::NotificationStatus,
            models::appointment::ApprovalReceipt,
            models::appointment::AppointmentStats,
            models::appointment::CreateAppointmentPayload,
            models::appointment::UpdateAppointmentPayload,
            models::appointment::RejectAppointmentPayload,

            // --- Passes ---
            models::pass::PassStatus,
            models::pass::ValidityWindow,
            models::pass::Pass,
            models::pass::PassDetail,
            models::pass::IssuedPass,
            models::pass::VerificationResult,
            models::pass::ExpiredPasses,
            models::pass::PassStats,
            models::pass::IssuePassPayload,
            services::verification_service::VerifyPassPayload,

            // --- Check-in ---
            models::check_log::DeviceInfo,
            models::check_log::Presence,
            models::check_log::CheckLog,
            models::check_log::CheckLogDetail,
            models::check_log::CheckInReceipt,
            models::check_log::CheckLogStats,
            models::check_log::CheckInPayload,
            models::check_log::CheckOutPayload,
        )
    ),
    tags(
        (name = "Appointments", description = "Solicitação e Aprovação de Visitas"),
        (name = "Passes", description = "Emissão, Verificação e Revogação de Passes"),
        (name = "Check-in", description = "Entrada e Saída de Visitantes")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
