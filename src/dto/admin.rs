use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::enums::Role,
    models::{AuditLog, User},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminUpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductApprovalRequest {
    pub is_active: bool,
    /// Shown to the farmer when a listing is rejected or withdrawn
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<User>)]
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct AuditLogList {
    #[schema(value_type = Vec<AuditLog>)]
    pub items: Vec<AuditLog>,
}
