//! # Boardroom Workers
//!
//! The closed set of workers taking part in a run.
//!
//! ```text
//! Coordinator ── decompose ──► [Task] ──► Specialist::execute (one per task)
//!      ▲                                         │
//!      └──────────── synthesize ◄── [AttributedResult]
//! ```
//!
//! - `Coordinator` - splits the problem and merges the opinions
//! - `Specialist` - one domain analyst, answers one task under a deadline

pub mod coordinator;
pub mod prompts;
pub mod specialist;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::GenerationBackend;

pub use coordinator::Coordinator;
pub use specialist::Specialist;
pub use types::{AttributedResult, Priority, Task, WorkerResult};

/// Id of the coordinator in traces and events
pub const COORDINATOR_ID: &str = "manager";

/// Identity shared by every worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: String,
    pub name: String,
    pub role: String,
    /// One-line description offered to the coordinator's catalog
    pub capability: String,
}

impl WorkerProfile {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        capability: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            capability: capability.into(),
        }
    }

    pub fn coordinator() -> Self {
        Self::new(
            COORDINATOR_ID,
            "Prime Orchestrator",
            "Chief Executive",
            "Decomposes problems and synthesizes the panel's decision",
        )
    }
}

/// The five analysts every default run registers
pub fn default_roster() -> Vec<WorkerProfile> {
    vec![
        WorkerProfile::new(
            "finance",
            "Finance Analyst",
            "CFO",
            "Financial analysis, budgets, costs and profitability",
        ),
        WorkerProfile::new(
            "ops",
            "Operations Analyst",
            "COO",
            "Operations, logistics, supply chain and reliability",
        ),
        WorkerProfile::new(
            "market",
            "Market Strategist",
            "CMO",
            "Market trends, competitors, pricing and growth",
        ),
        WorkerProfile::new(
            "sales",
            "Sales Analyst",
            "CRO",
            "Market, customers and sales data",
        ),
        WorkerProfile::new(
            "hr",
            "People Analyst",
            "CHRO",
            "Headcount, hiring, retention and compliance",
        ),
    ]
}

/// A participant in a run
#[derive(Clone)]
pub enum Worker {
    Coordinator(Arc<Coordinator>),
    Specialist(Arc<Specialist>),
}

impl Worker {
    pub fn profile(&self) -> &WorkerProfile {
        match self {
            Worker::Coordinator(c) => c.profile(),
            Worker::Specialist(s) => s.profile(),
        }
    }

    pub fn id(&self) -> &str {
        &self.profile().id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Worker::Coordinator(_) => "coordinator",
            Worker::Specialist(_) => "specialist",
        }
    }
}

/// Every worker of a run, keyed by id
pub struct WorkerRegistry {
    coordinator: Arc<Coordinator>,
    specialists: Vec<Arc<Specialist>>,
}

impl WorkerRegistry {
    /// Build a coordinator plus one specialist per profile sharing `backend`
    ///
    /// Later profiles with an id already registered are ignored.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        roster: &[WorkerProfile],
        specialist_timeout: Duration,
    ) -> Self {
        let mut catalog: Vec<WorkerProfile> = Vec::with_capacity(roster.len());
        for profile in roster {
            if profile.id == COORDINATOR_ID || catalog.iter().any(|p| p.id == profile.id) {
                tracing::warn!("Ignoring duplicate worker id '{}' in roster", profile.id);
                continue;
            }
            catalog.push(profile.clone());
        }

        let coordinator = Arc::new(Coordinator::new(backend.clone(), catalog.clone()));
        let specialists = catalog
            .into_iter()
            .map(|profile| {
                Arc::new(Specialist::new(
                    profile,
                    backend.clone(),
                    specialist_timeout,
                ))
            })
            .collect();

        Self {
            coordinator,
            specialists,
        }
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    /// The worker registered under `id`, if any
    pub fn worker(&self, id: &str) -> Option<Worker> {
        if id == COORDINATOR_ID {
            return Some(Worker::Coordinator(self.coordinator.clone()));
        }
        self.specialists
            .iter()
            .find(|s| s.profile().id == id)
            .cloned()
            .map(Worker::Specialist)
    }

    /// Profiles of every registered specialist
    pub fn catalog(&self) -> &[WorkerProfile] {
        self.coordinator.catalog()
    }

    /// The coordinator first, then the specialists in roster order
    pub fn workers(&self) -> Vec<Worker> {
        std::iter::once(Worker::Coordinator(self.coordinator.clone()))
            .chain(self.specialists.iter().cloned().map(Worker::Specialist))
            .collect()
    }
}
