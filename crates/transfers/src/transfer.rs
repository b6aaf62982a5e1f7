use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Aggregate, AggregateId, AggregateRoot, DomainError, FranchiseId, TenantId};
use stockline_events::Event;
use stockline_products::ProductId;

/// Stream type identifier for transfer aggregates.
pub const TRANSFER_AGGREGATE_TYPE: &str = "transfers.transfer";

/// Transfer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub AggregateId);

impl TransferId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: StockTransfer.
///
/// Records a movement of one product between two franchises of the same
/// chain. The ledger legs (issue at source, receive at destination) are
/// orchestrated by the service layer; this aggregate is the audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTransfer {
    id: TransferId,
    tenant_id: Option<TenantId>,
    product_id: Option<ProductId>,
    quantity: i64,
    from_franchise: Option<FranchiseId>,
    to_franchise: Option<FranchiseId>,
    version: u64,
    created: bool,
}

impl StockTransfer {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            tenant_id: None,
            product_id: None,
            quantity: 0,
            from_franchise: None,
            to_franchise: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn is_recorded(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for StockTransfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransfer {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub from_franchise: FranchiseId,
    pub to_franchise: FranchiseId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    RecordTransfer(RecordTransfer),
}

/// Event: TransferRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecorded {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub from_franchise: FranchiseId,
    pub to_franchise: FranchiseId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    TransferRecorded(TransferRecorded),
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::TransferRecorded(_) => "transfers.transfer.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::TransferRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockTransfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::TransferRecorded(e) => {
                self.id = e.transfer_id;
                self.tenant_id = Some(e.tenant_id);
                self.product_id = Some(e.product_id);
                self.quantity = e.quantity;
                self.from_franchise = Some(e.from_franchise);
                self.to_franchise = Some(e.to_franchise);
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::RecordTransfer(cmd) => self.handle_record(cmd),
        }
    }
}

impl StockTransfer {
    fn handle_record(&self, cmd: &RecordTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer already recorded"));
        }
        if cmd.quantity < 1 {
            return Err(DomainError::validation("transfer quantity must be >= 1"));
        }
        if cmd.from_franchise == cmd.to_franchise {
            return Err(DomainError::validation(
                "source and destination franchises must differ",
            ));
        }

        Ok(vec![TransferEvent::TransferRecorded(TransferRecorded {
            tenant_id: cmd.tenant_id,
            transfer_id: cmd.transfer_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            from_franchise: cmd.from_franchise,
            to_franchise: cmd.to_franchise,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
