use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use stockline_core::{Aggregate, AggregateId, AggregateRoot, FranchiseId, TenantId};
use stockline_events::Event;
use stockline_products::ProductId;

/// Stream type identifier for stock ledger aggregates.
pub const LEDGER_AGGREGATE_TYPE: &str = "ledger.stock";

/// Namespace for deriving ledger stream IDs (UUIDv5 over product + franchise).
const LEDGER_NAMESPACE: Uuid = Uuid::from_u128(0x7c1f_4d2a_9b63_4e08_8a51_2f0c_d9e4_16b7);

/// Stock ledger identifier: one stream per (franchise, product).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLedgerId(pub AggregateId);

impl StockLedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Derive the ledger stream ID for a product at a franchise.
    ///
    /// Deterministic (UUIDv5), so no lookup table is needed to find the
    /// stream for a given (franchise, product) pair.
    pub fn for_product_at(product_id: ProductId, franchise_id: FranchiseId) -> Self {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(product_id.0.as_uuid().as_bytes());
        name[16..].copy_from_slice(franchise_id.as_uuid().as_bytes());
        Self(AggregateId::from_uuid(Uuid::new_v5(&LEDGER_NAMESPACE, &name)))
    }
}

impl core::fmt::Display for StockLedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Stock operation failure.
///
/// Every variant is detected before any event is appended; a failed
/// operation leaves the ledger untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Referenced product does not exist (raised at the service boundary,
    /// before a ledger command is dispatched).
    #[error("product not found")]
    ProductNotFound,

    /// Quantity must be a positive integer for IN/OUT movements.
    #[error("invalid quantity: {quantity} (must be >= 1)")]
    InvalidQuantity { quantity: i64 },

    /// An adjustment of zero is meaningless.
    #[error("adjustment quantity cannot be zero")]
    ZeroAdjustment,

    /// OUT requested against a zero balance.
    #[error("no stock available")]
    NoStockAvailable,

    /// OUT quantity exceeds the current balance.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// ADJUST would drive the balance negative.
    #[error("adjustment rejected: balance {balance} + delta {delta} would be negative")]
    NegativeBalanceRejected { balance: i64, delta: i64 },

    /// Command is scoped to a different stream than this ledger.
    #[error("ledger stream mismatch: {0}")]
    StreamMismatch(String),
}

/// Event: StockReceived (IN). `quantity` is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued (OUT). `quantity` is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted. `delta` is signed and never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    StockReceived(StockReceived),
    StockIssued(StockIssued),
    StockAdjusted(StockAdjusted),
}

impl LedgerEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            LedgerEvent::StockReceived(e) => e.tenant_id,
            LedgerEvent::StockIssued(e) => e.tenant_id,
            LedgerEvent::StockAdjusted(e) => e.tenant_id,
        }
    }

    pub fn franchise_id(&self) -> FranchiseId {
        match self {
            LedgerEvent::StockReceived(e) => e.franchise_id,
            LedgerEvent::StockIssued(e) => e.franchise_id,
            LedgerEvent::StockAdjusted(e) => e.franchise_id,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            LedgerEvent::StockReceived(e) => e.product_id,
            LedgerEvent::StockIssued(e) => e.product_id,
            LedgerEvent::StockAdjusted(e) => e.product_id,
        }
    }

    /// Signed contribution of this movement to the balance.
    pub fn delta(&self) -> i64 {
        match self {
            LedgerEvent::StockReceived(e) => e.quantity,
            LedgerEvent::StockIssued(e) => -e.quantity,
            LedgerEvent::StockAdjusted(e) => e.delta,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::StockReceived(_) => "ledger.stock.received",
            LedgerEvent::StockIssued(_) => "ledger.stock.issued",
            LedgerEvent::StockAdjusted(_) => "ledger.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::StockReceived(e) => e.occurred_at,
            LedgerEvent::StockIssued(e) => e.occurred_at,
            LedgerEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

/// Compute the current balance as a pure fold over a ledger's movements.
///
/// IN adds its quantity, OUT subtracts, ADJUST adds its signed delta. The
/// result is order-independent (addition commutes); an empty sequence folds
/// to 0.
pub fn compute_balance<'a>(events: impl IntoIterator<Item = &'a LedgerEvent>) -> i64 {
    events.into_iter().map(LedgerEvent::delta).sum()
}

/// Command: RecordStockIn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStockIn {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordStockOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStockOut {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordAdjustment (signed delta, e.g. damage or audit correction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAdjustment {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordStockIn(RecordStockIn),
    RecordStockOut(RecordStockOut),
    RecordAdjustment(RecordAdjustment),
}

/// Low-stock classification for a (franchise, product) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockStatus {
    pub is_low: bool,
    pub balance: i64,
    pub reorder_level: i64,
}

impl LowStockStatus {
    /// Low stock is defined as `balance <= reorder_level`.
    pub fn evaluate(balance: i64, reorder_level: i64) -> Self {
        Self {
            is_low: balance <= reorder_level,
            balance,
            reorder_level,
        }
    }
}

/// Aggregate root: StockLedger.
///
/// The ledger is valid from an empty stream (balance 0); there is no
/// explicit "open" step. Stream scope (tenant, franchise, product) is fixed
/// by the first movement and checked on every subsequent command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: StockLedgerId,
    tenant_id: Option<TenantId>,
    franchise_id: Option<FranchiseId>,
    product_id: Option<ProductId>,
    balance: i64,
    version: u64,
}

impl StockLedger {
    /// Create an empty aggregate instance for rehydration.
    pub fn empty(id: StockLedgerId) -> Self {
        Self {
            id,
            tenant_id: None,
            franchise_id: None,
            product_id: None,
            balance: 0,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> StockLedgerId {
        self.id
    }

    /// Derived balance of the rehydrated stream. Always equals
    /// `compute_balance` over the applied events.
    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn franchise_id(&self) -> Option<FranchiseId> {
        self.franchise_id
    }

    /// Classify this ledger's balance against a product's reorder level.
    pub fn low_stock(&self, reorder_level: i64) -> LowStockStatus {
        LowStockStatus::evaluate(self.balance, reorder_level)
    }
}

impl AggregateRoot for StockLedger {
    type Id = StockLedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for StockLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = StockError;

    fn apply(&mut self, event: &Self::Event) {
        self.tenant_id = Some(event.tenant_id());
        self.franchise_id = Some(event.franchise_id());
        self.product_id = Some(event.product_id());
        self.balance += event.delta();

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::RecordStockIn(cmd) => self.handle_in(cmd),
            LedgerCommand::RecordStockOut(cmd) => self.handle_out(cmd),
            LedgerCommand::RecordAdjustment(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_scope(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
    ) -> Result<(), StockError> {
        if let Some(t) = self.tenant_id {
            if t != tenant_id {
                return Err(StockError::StreamMismatch("tenant mismatch".to_string()));
            }
        }
        if let Some(f) = self.franchise_id {
            if f != franchise_id {
                return Err(StockError::StreamMismatch("franchise mismatch".to_string()));
            }
        }
        if let Some(p) = self.product_id {
            if p != product_id {
                return Err(StockError::StreamMismatch("product mismatch".to_string()));
            }
        }
        Ok(())
    }

    fn handle_in(&self, cmd: &RecordStockIn) -> Result<Vec<LedgerEvent>, StockError> {
        self.ensure_scope(cmd.tenant_id, cmd.franchise_id, cmd.product_id)?;

        if cmd.quantity < 1 {
            return Err(StockError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }
        if self.balance.checked_add(cmd.quantity).is_none() {
            return Err(StockError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }

        Ok(vec![LedgerEvent::StockReceived(StockReceived {
            tenant_id: cmd.tenant_id,
            franchise_id: cmd.franchise_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_out(&self, cmd: &RecordStockOut) -> Result<Vec<LedgerEvent>, StockError> {
        self.ensure_scope(cmd.tenant_id, cmd.franchise_id, cmd.product_id)?;

        if cmd.quantity < 1 {
            return Err(StockError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }
        if self.balance == 0 {
            return Err(StockError::NoStockAvailable);
        }
        if cmd.quantity > self.balance {
            return Err(StockError::InsufficientStock {
                requested: cmd.quantity,
                available: self.balance,
            });
        }

        Ok(vec![LedgerEvent::StockIssued(StockIssued {
            tenant_id: cmd.tenant_id,
            franchise_id: cmd.franchise_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &RecordAdjustment) -> Result<Vec<LedgerEvent>, StockError> {
        self.ensure_scope(cmd.tenant_id, cmd.franchise_id, cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(StockError::ZeroAdjustment);
        }
        match self.balance.checked_add(cmd.delta) {
            Some(next) if next >= 0 => {}
            _ => {
                return Err(StockError::NegativeBalanceRejected {
                    balance: self.balance,
                    delta: cmd.delta,
                });
            }
        }

        Ok(vec![LedgerEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            franchise_id: cmd.franchise_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
