use stockline_core::TenantId;

/// Per-request tenant context, extracted from the `X-Tenant-Id` header and
/// inserted as a request extension by the tenant middleware.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: TenantId,
}
