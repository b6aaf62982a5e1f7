use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Aggregate, AggregateId, AggregateRoot, DomainError, FranchiseId, TenantId};
use stockline_events::Event;
use stockline_products::ProductId;

/// Stream type identifier for sale aggregates.
pub const SALE_AGGREGATE_TYPE: &str = "sales.sale";

/// Sale identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Recorded,
    Voided,
}

/// Sale line: product, quantity, and prices captured at record time.
///
/// Prices are in the smallest currency unit; `unit_cost` feeds profit
/// reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub unit_cost: u64,
}

impl SaleLine {
    pub fn amount(&self) -> u64 {
        self.unit_price.saturating_mul(self.quantity.max(0) as u64)
    }

    pub fn cost(&self) -> u64 {
        self.unit_cost.saturating_mul(self.quantity.max(0) as u64)
    }
}

/// Aggregate root: Sale.
///
/// A sale is recorded in one shot (lines fixed at record time) and can be
/// voided afterwards. Stock issuing happens in the ledger before the sale
/// is recorded; voiding does not restock (that is an explicit adjustment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    tenant_id: Option<TenantId>,
    franchise_id: Option<FranchiseId>,
    lines: Vec<SaleLine>,
    status: SaleStatus,
    version: u64,
    created: bool,
}

impl Sale {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            tenant_id: None,
            franchise_id: None,
            lines: Vec::new(),
            status: SaleStatus::Recorded,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn franchise_id(&self) -> Option<FranchiseId> {
        self.franchise_id
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn total_amount(&self) -> u64 {
        self.lines.iter().map(SaleLine::amount).sum()
    }

    pub fn total_cost(&self) -> u64 {
        self.lines.iter().map(SaleLine::cost).sum()
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub franchise_id: FranchiseId,
    pub lines: Vec<SaleLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
    VoidSale(VoidSale),
}

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub franchise_id: FranchiseId,
    pub lines: Vec<SaleLine>,
    pub total_amount: u64,
    pub total_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleVoided {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
    SaleVoided(SaleVoided),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.sale.recorded",
            SaleEvent::SaleVoided(_) => "sales.sale.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
            SaleEvent::SaleVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.tenant_id = Some(e.tenant_id);
                self.franchise_id = Some(e.franchise_id);
                self.lines = e.lines.clone();
                self.status = SaleStatus::Recorded;
                self.created = true;
            }
            SaleEvent::SaleVoided(_) => {
                self.status = SaleStatus::Voided;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
            SaleCommand::VoidSale(cmd) => self.handle_void(cmd),
        }
    }
}

impl Sale {
    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already recorded"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("sale must have at least one line"));
        }
        for line in &cmd.lines {
            if line.quantity < 1 {
                return Err(DomainError::validation(format!(
                    "line {} quantity must be >= 1",
                    line.line_no
                )));
            }
        }

        let total_amount = cmd.lines.iter().map(SaleLine::amount).sum();
        let total_cost = cmd.lines.iter().map(SaleLine::cost).sum();

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            franchise_id: cmd.franchise_id,
            lines: cmd.lines.clone(),
            total_amount,
            total_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidSale) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.status == SaleStatus::Voided {
            return Err(DomainError::conflict("sale is already voided"));
        }

        Ok(vec![SaleEvent::SaleVoided(SaleVoided {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: u64, cost: u64) -> SaleLine {
        SaleLine {
            line_no: 1,
            product_id: ProductId::new(AggregateId::new()),
            quantity: qty,
            unit_price: price,
            unit_cost: cost,
        }
    }

    fn record(tenant_id: TenantId, id: SaleId, lines: Vec<SaleLine>) -> RecordSale {
        RecordSale {
            tenant_id,
            sale_id: id,
            franchise_id: FranchiseId::new(),
            lines,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn record_computes_totals() {
        let (t, id) = (TenantId::new(), SaleId::new(AggregateId::new()));
        let mut sale = Sale::empty(id);

        let events = sale
            .handle(&SaleCommand::RecordSale(record(
                t,
                id,
                vec![line(3, 500, 300), line(2, 1_000, 600)],
            )))
            .unwrap();

        match &events[0] {
            SaleEvent::SaleRecorded(e) => {
                assert_eq!(e.total_amount, 3 * 500 + 2 * 1_000);
                assert_eq!(e.total_cost, 3 * 300 + 2 * 600);
            }
            other => panic!("expected SaleRecorded, got {other:?}"),
        }

        sale.apply(&events[0]);
        assert_eq!(sale.total_amount(), 3_500);
        assert_eq!(sale.total_cost(), 2_100);
        assert_eq!(sale.status(), SaleStatus::Recorded);
    }

    #[test]
    fn record_rejects_empty_or_invalid_lines() {
        let (t, id) = (TenantId::new(), SaleId::new(AggregateId::new()));
        let sale = Sale::empty(id);

        let err = sale
            .handle(&SaleCommand::RecordSale(record(t, id, vec![])))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = sale
            .handle(&SaleCommand::RecordSale(record(
                t,
                id,
                vec![line(0, 100, 50)],
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn void_recorded_sale() {
        let (t, id) = (TenantId::new(), SaleId::new(AggregateId::new()));
        let mut sale = Sale::empty(id);

        let events = sale
            .handle(&SaleCommand::RecordSale(record(
                t,
                id,
                vec![line(1, 100, 50)],
            )))
            .unwrap();
        sale.apply(&events[0]);

        let void = VoidSale {
            tenant_id: t,
            sale_id: id,
            reason: Some("cashier error".to_string()),
            occurred_at: Utc::now(),
        };
        let events = sale.handle(&SaleCommand::VoidSale(void.clone())).unwrap();
        sale.apply(&events[0]);
        assert_eq!(sale.status(), SaleStatus::Voided);

        let err = sale.handle(&SaleCommand::VoidSale(void)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn void_missing_sale_is_not_found() {
        let sale = Sale::empty(SaleId::new(AggregateId::new()));
        let err = sale
            .handle(&SaleCommand::VoidSale(VoidSale {
                tenant_id: TenantId::new(),
                sale_id: SaleId::new(AggregateId::new()),
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }
}
