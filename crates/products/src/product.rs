use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use stockline_events::Event;

/// Stream type identifier for product aggregates.
pub const PRODUCT_AGGREGATE_TYPE: &str = "catalog.product";

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Pricing captured per product, in the smallest currency unit (e.g. cents).
///
/// `unit_cost` feeds the profit side of the sales summary read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub unit_price: u64,
    pub unit_cost: u64,
}

/// Aggregate root: Product.
///
/// A catalog entry owned by one tenant (chain). The `reorder_level` is the
/// threshold at or below which a franchise's stock of this product counts as
/// low (balance <= reorder_level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    pricing: Pricing,
    reorder_level: i64,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            pricing: Pricing {
                unit_price: 0,
                unit_cost: 0,
            },
            reorder_level: 0,
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pricing(&self) -> Pricing {
        self.pricing
    }

    pub fn reorder_level(&self) -> i64 {
        self.reorder_level
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    /// Archived products cannot be sold or restocked.
    pub fn is_sellable(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub pricing: Pricing,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetReorderLevel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReorderLevel {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    SetReorderLevel(SetReorderLevel),
    ArchiveProduct(ArchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub pricing: Pricing,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderLevelSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderLevelSet {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ReorderLevelSet(ReorderLevelSet),
    ProductArchived(ProductArchived),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ReorderLevelSet(_) => "catalog.product.reorder_level_set",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ReorderLevelSet(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.pricing = e.pricing;
                self.reorder_level = e.reorder_level;
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::ReorderLevelSet(e) => {
                self.reorder_level = e.reorder_level;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::SetReorderLevel(cmd) => self.handle_set_reorder_level(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.reorder_level < 0 {
            return Err(DomainError::validation("reorder level cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            pricing: cmd.pricing,
            reorder_level: cmd.reorder_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_reorder_level(
        &self,
        cmd: &SetReorderLevel,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.reorder_level < 0 {
            return Err(DomainError::validation("reorder level cannot be negative"));
        }
        if cmd.reorder_level == self.reorder_level {
            // No-op change: nothing to record.
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ReorderLevelSet(ReorderLevelSet {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            reorder_level: cmd.reorder_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::AggregateId;

    fn tenant() -> TenantId {
        TenantId::new()
    }

    fn product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn pricing() -> Pricing {
        Pricing {
            unit_price: 2_500,
            unit_cost: 1_400,
        }
    }

    fn create_cmd(tenant_id: TenantId, id: ProductId) -> CreateProduct {
        CreateProduct {
            tenant_id,
            product_id: id,
            sku: "SKU-100".to_string(),
            name: "Espresso Beans 1kg".to_string(),
            pricing: pricing(),
            reorder_level: 5,
            occurred_at: Utc::now(),
        }
    }

    fn created_product(tenant_id: TenantId, id: ProductId) -> Product {
        let mut product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(create_cmd(tenant_id, id)))
            .unwrap();
        product.apply(&events[0]);
        product
    }

    #[test]
    fn create_emits_product_created() {
        let (t, id) = (tenant(), product_id());
        let product = Product::empty(id);

        let events = product
            .handle(&ProductCommand::CreateProduct(create_cmd(t, id)))
            .unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            ProductEvent::ProductCreated(e) => {
                assert_eq!(e.tenant_id, t);
                assert_eq!(e.product_id, id);
                assert_eq!(e.sku, "SKU-100");
                assert_eq!(e.reorder_level, 5);
            }
            other => panic!("expected ProductCreated, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_blank_sku_and_name() {
        let (t, id) = (tenant(), product_id());
        let product = Product::empty(id);

        let mut cmd = create_cmd(t, id);
        cmd.sku = "  ".to_string();
        let err = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut cmd = create_cmd(t, id);
        cmd.name = String::new();
        let err = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_negative_reorder_level() {
        let (t, id) = (tenant(), product_id());
        let product = Product::empty(id);

        let mut cmd = create_cmd(t, id);
        cmd.reorder_level = -1;
        let err = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn duplicate_create_conflicts() {
        let (t, id) = (tenant(), product_id());
        let product = created_product(t, id);

        let err = product
            .handle(&ProductCommand::CreateProduct(create_cmd(t, id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn set_reorder_level_updates_state() {
        let (t, id) = (tenant(), product_id());
        let mut product = created_product(t, id);

        let events = product
            .handle(&ProductCommand::SetReorderLevel(SetReorderLevel {
                tenant_id: t,
                product_id: id,
                reorder_level: 12,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply(&events[0]);

        assert_eq!(product.reorder_level(), 12);
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn unchanged_reorder_level_is_a_noop() {
        let (t, id) = (tenant(), product_id());
        let product = created_product(t, id);

        let events = product
            .handle(&ProductCommand::SetReorderLevel(SetReorderLevel {
                tenant_id: t,
                product_id: id,
                reorder_level: product.reorder_level(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn archive_then_archive_again_conflicts() {
        let (t, id) = (tenant(), product_id());
        let mut product = created_product(t, id);

        let archive = ArchiveProduct {
            tenant_id: t,
            product_id: id,
            occurred_at: Utc::now(),
        };
        let events = product
            .handle(&ProductCommand::ArchiveProduct(archive.clone()))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.status(), ProductStatus::Archived);
        assert!(!product.is_sellable());

        let err = product
            .handle(&ProductCommand::ArchiveProduct(archive))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn commands_reject_wrong_tenant() {
        let (t, id) = (tenant(), product_id());
        let product = created_product(t, id);

        let err = product
            .handle(&ProductCommand::SetReorderLevel(SetReorderLevel {
                tenant_id: tenant(),
                product_id: id,
                reorder_level: 3,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn commands_on_missing_product_are_not_found() {
        let id = product_id();
        let product = Product::empty(id);

        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id: tenant(),
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Handle is pure: repeated calls with the same command produce
            /// identical events and leave state untouched.
            #[test]
            fn handle_is_pure(level in 0i64..10_000) {
                let (t, id) = (tenant(), product_id());
                let product = created_product(t, id);
                let before = product.clone();

                let cmd = ProductCommand::SetReorderLevel(SetReorderLevel {
                    tenant_id: t,
                    product_id: id,
                    reorder_level: level,
                    occurred_at: Utc::now(),
                });

                let first = product.handle(&cmd);
                let second = product.handle(&cmd);

                prop_assert_eq!(&product, &before);
                prop_assert_eq!(first.unwrap(), second.unwrap());
            }

            /// Apply is deterministic: replaying the same events yields the
            /// same state.
            #[test]
            fn apply_is_deterministic(levels in proptest::collection::vec(0i64..1_000, 0..8)) {
                let (t, id) = (tenant(), product_id());

                let mut events = vec![ProductEvent::ProductCreated(ProductCreated {
                    tenant_id: t,
                    product_id: id,
                    sku: "SKU-1".to_string(),
                    name: "Widget".to_string(),
                    pricing: pricing(),
                    reorder_level: 0,
                    occurred_at: Utc::now(),
                })];
                for level in levels {
                    events.push(ProductEvent::ReorderLevelSet(ReorderLevelSet {
                        tenant_id: t,
                        product_id: id,
                        reorder_level: level,
                        occurred_at: Utc::now(),
                    }));
                }

                let mut a = Product::empty(id);
                let mut b = Product::empty(id);
                for e in &events {
                    a.apply(e);
                    b.apply(e);
                }

                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.version(), events.len() as u64);
            }
        }
    }
}
