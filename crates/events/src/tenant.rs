use stockline_core::TenantId;

/// Implemented by any message that belongs to exactly one tenant.
///
/// Lets generic consumers (workers, SSE fan-out) partition or filter a
/// stream by tenant without naming the concrete message type.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}
