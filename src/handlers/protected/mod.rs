// handlers/protected/mod.rs - Protected handlers (JWT + tenant context required)
//
// Every request reaching these handlers runs inside the tenant context resolved
// from its token, so tenant-scoped services can be called directly.
//
// Security Level: JWT Authentication + active tenant
// Route Prefix: /api/v1/*
// Middleware: jwt_auth_middleware → tenant_context_middleware

pub mod auditoria;
