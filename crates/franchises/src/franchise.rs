use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{Aggregate, AggregateRoot, DomainError, FranchiseId, TenantId};
use stockline_events::Event;

/// Stream type identifier for franchise aggregates.
pub const FRANCHISE_AGGREGATE_TYPE: &str = "franchises.franchise";

/// Franchise status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FranchiseStatus {
    Open,
    Closed,
}

/// Aggregate root: Franchise (a location within a chain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Franchise {
    id: FranchiseId,
    tenant_id: Option<TenantId>,
    name: String,
    city: Option<String>,
    status: FranchiseStatus,
    version: u64,
    created: bool,
}

impl Franchise {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: FranchiseId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            city: None,
            status: FranchiseStatus::Open,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> FranchiseId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> FranchiseStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.created && self.status == FranchiseStatus::Open
    }
}

impl AggregateRoot for Franchise {
    type Id = FranchiseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterFranchise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFranchise {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub name: String,
    pub city: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseFranchise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFranchise {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FranchiseCommand {
    RegisterFranchise(RegisterFranchise),
    CloseFranchise(CloseFranchise),
}

/// Event: FranchiseRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseRegistered {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub name: String,
    pub city: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FranchiseClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseClosed {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FranchiseEvent {
    FranchiseRegistered(FranchiseRegistered),
    FranchiseClosed(FranchiseClosed),
}

impl Event for FranchiseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FranchiseEvent::FranchiseRegistered(_) => "franchises.franchise.registered",
            FranchiseEvent::FranchiseClosed(_) => "franchises.franchise.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FranchiseEvent::FranchiseRegistered(e) => e.occurred_at,
            FranchiseEvent::FranchiseClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Franchise {
    type Command = FranchiseCommand;
    type Event = FranchiseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FranchiseEvent::FranchiseRegistered(e) => {
                self.id = e.franchise_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.city = e.city.clone();
                self.status = FranchiseStatus::Open;
                self.created = true;
            }
            FranchiseEvent::FranchiseClosed(_) => {
                self.status = FranchiseStatus::Closed;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FranchiseCommand::RegisterFranchise(cmd) => self.handle_register(cmd),
            FranchiseCommand::CloseFranchise(cmd) => self.handle_close(cmd),
        }
    }
}

impl Franchise {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterFranchise) -> Result<Vec<FranchiseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("franchise already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![FranchiseEvent::FranchiseRegistered(
            FranchiseRegistered {
                tenant_id: cmd.tenant_id,
                franchise_id: cmd.franchise_id,
                name: cmd.name.clone(),
                city: cmd.city.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_close(&self, cmd: &CloseFranchise) -> Result<Vec<FranchiseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == FranchiseStatus::Closed {
            return Err(DomainError::conflict("franchise is already closed"));
        }

        Ok(vec![FranchiseEvent::FranchiseClosed(FranchiseClosed {
            tenant_id: cmd.tenant_id,
            franchise_id: cmd.franchise_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(tenant_id: TenantId, id: FranchiseId) -> RegisterFranchise {
        RegisterFranchise {
            tenant_id,
            franchise_id: id,
            name: "Downtown".to_string(),
            city: Some("Lahore".to_string()),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn register_then_close() {
        let (t, id) = (TenantId::new(), FranchiseId::new());
        let mut franchise = Franchise::empty(id);

        let events = franchise
            .handle(&FranchiseCommand::RegisterFranchise(register(t, id)))
            .unwrap();
        franchise.apply(&events[0]);
        assert!(franchise.is_open());

        let events = franchise
            .handle(&FranchiseCommand::CloseFranchise(CloseFranchise {
                tenant_id: t,
                franchise_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        franchise.apply(&events[0]);
        assert_eq!(franchise.status(), FranchiseStatus::Closed);
        assert!(!franchise.is_open());
    }

    #[test]
    fn register_rejects_blank_name() {
        let (t, id) = (TenantId::new(), FranchiseId::new());
        let franchise = Franchise::empty(id);

        let mut cmd = register(t, id);
        cmd.name = " ".to_string();
        let err = franchise
            .handle(&FranchiseCommand::RegisterFranchise(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn duplicate_register_conflicts() {
        let (t, id) = (TenantId::new(), FranchiseId::new());
        let mut franchise = Franchise::empty(id);

        let events = franchise
            .handle(&FranchiseCommand::RegisterFranchise(register(t, id)))
            .unwrap();
        franchise.apply(&events[0]);

        let err = franchise
            .handle(&FranchiseCommand::RegisterFranchise(register(t, id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn close_missing_franchise_is_not_found() {
        let franchise = Franchise::empty(FranchiseId::new());
        let err = franchise
            .handle(&FranchiseCommand::CloseFranchise(CloseFranchise {
                tenant_id: TenantId::new(),
                franchise_id: FranchiseId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }
}
