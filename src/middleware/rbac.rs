// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    middleware::auth::{AuthenticatedActor, TokenDecoder},
    models::auth::{Actor, Role},
};

/// 1. O Trait que define um grupo de perfis autorizados
pub trait RoleSet: Send + Sync + 'static {
    fn roles() -> &'static [Role];
    fn label() -> &'static str;
}

/// 2. O Extractor (Guardião). Carrega o ator já verificado.
pub struct RequireRole<T>(pub Actor, pub PhantomData<T>);

impl<T> RequireRole<T> {
    pub fn actor(&self) -> Actor {
        self.0
    }
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleSet,
    S: Send + Sync,
    TokenDecoder: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // A. Token (401 se ausente/inválido)
        let AuthenticatedActor(actor) = AuthenticatedActor::from_request_parts(parts, state).await?;

        // B. Perfil (403)
        if !T::roles().contains(&actor.role) {
            return Err(AppError::forbidden(format!(
                "esta ação exige o perfil {}.",
                T::label()
            )));
        }

        Ok(RequireRole(actor, PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS GRUPOS (TIPOS)
// ---

/// Portaria: verificação, emissão e check-in/out.
pub struct SecurityDesk;
impl RoleSet for SecurityDesk {
    fn roles() -> &'static [Role] { &[Role::Admin, Role::Security] }
    fn label() -> &'static str { "admin ou segurança" }
}

pub struct Approvers;
impl RoleSet for Approvers {
    fn roles() -> &'static [Role] { &[Role::Admin, Role::Employee] }
    fn label() -> &'static str { "admin ou funcionário" }
}

pub struct AppointmentParticipants;
impl RoleSet for AppointmentParticipants {
    fn roles() -> &'static [Role] { &[Role::Admin, Role::Employee, Role::Visitor] }
    fn label() -> &'static str { "admin, funcionário ou visitante" }
}

pub struct AdminOnly;
impl RoleSet for AdminOnly {
    fn roles() -> &'static [Role] { &[Role::Admin] }
    fn label() -> &'static str { "admin" }
}
