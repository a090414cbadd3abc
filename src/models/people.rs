// src/models/people.rs
//
// Visitantes e usuários pertencem ao cadastro externo; aqui só lemos os
// campos que o fluxo de passes precisa.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "Ana Souza")]
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "Carlos Lima")]
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
    #[schema(example = "uploads/visitors/carlos.jpg")]
    pub photo: Option<String>,
    pub visit_count: i32,
    pub last_visit: Option<DateTime<Utc>>,
    pub is_blacklisted: bool,
    pub blacklist_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Projeções usadas nas respostas "populadas" ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo: Option<String>,
}

impl From<&Visitor> for VisitorSummary {
    fn from(v: &Visitor) -> Self {
        Self {
            id: v.id,
            name: v.name.clone(),
            email: v.email.clone(),
            phone: v.phone.clone(),
            photo: v.photo.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
}

impl From<&User> for HostSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            department: u.department.clone(),
        }
    }
}
