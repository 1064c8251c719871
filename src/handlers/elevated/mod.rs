// handlers/elevated/mod.rs - Elevated handlers (Root JWT authentication required)
//
// Administrative endpoints that span every tenant. They run with an empty
// tenant context; anything tenant-scoped must enter a tenant explicitly.
//
// Security Level: Root JWT Authentication Required
// Route Prefix: /api/v1/admin/*
// Middleware: jwt_auth_middleware → elevated_scope_middleware

pub mod archive;
