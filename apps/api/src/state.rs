use std::sync::Arc;

use keyward_application::RoleService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub role_service: RoleService,
    pub admin_token: Arc<str>,
}
