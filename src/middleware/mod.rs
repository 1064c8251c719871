pub mod auth;
pub mod request_meta;
pub mod response;
pub mod tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use request_meta::RequestMeta;
pub use response::{ApiResponse, ApiResult};
pub use tenant::{elevated_scope_middleware, tenant_context_middleware};
