//! All-or-nothing execution of multi-step writes.
//!
//! A [`Composite`] is a named, ordered list of steps. [`run_atomic`] runs them inside a
//! single `BEGIN IMMEDIATE` transaction: every step commits together or none does, and
//! the first failing step's error is returned unchanged. When the store is busy the
//! whole composite is retried from the first step on a fresh connection.

use std::collections::BTreeSet;

use rusqlite::{Transaction, TransactionBehavior};
use tracing::{debug, error};

use crate::db::ConnectionManager;
use crate::error::{Result, StoreError};
use crate::knowledge::types::EntityId;

/// Values handed from one step to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepContext {
    /// Row the composite works on; set up front or by the inserting step.
    pub entity_id: Option<EntityId>,
    /// Tag ids resolved by an `ensure tags` step.
    pub tag_ids: BTreeSet<i64>,
    /// Numeric result of the composite, when it has one.
    pub count: Option<u64>,
}

impl StepContext {
    /// The entity id, or [`StoreError::StepOrder`] if no earlier step set it.
    pub fn entity_id(&self, step: &'static str) -> Result<EntityId> {
        self.entity_id.ok_or(StoreError::StepOrder(step))
    }
}

type Step<'a> = Box<dyn FnMut(&Transaction<'_>, &mut StepContext) -> Result<()> + 'a>;

/// A named sequence of steps that must commit together.
pub struct Composite<'a> {
    name: &'static str,
    initial: StepContext,
    steps: Vec<(&'static str, Step<'a>)>,
}

impl<'a> Composite<'a> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            initial: StepContext::default(),
            steps: Vec::new(),
        }
    }

    /// A composite acting on an existing row.
    pub fn for_entity(name: &'static str, id: EntityId) -> Self {
        let mut composite = Self::new(name);
        composite.initial.entity_id = Some(id);
        composite
    }

    /// Append a step.
    pub fn step(
        mut self,
        label: &'static str,
        f: impl FnMut(&Transaction<'_>, &mut StepContext) -> Result<()> + 'a,
    ) -> Self {
        self.steps.push((label, Box::new(f)));
        self
    }

    /// Insert a step before position `index` (clamped to the end).
    pub fn insert_step(
        &mut self,
        index: usize,
        label: &'static str,
        f: impl FnMut(&Transaction<'_>, &mut StepContext) -> Result<()> + 'a,
    ) {
        let index = index.min(self.steps.len());
        self.steps.insert(index, (label, Box::new(f)));
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(label, _)| *label).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for Composite<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composite")
            .field("name", &self.name)
            .field("steps", &self.labels())
            .finish()
    }
}

/// Run every step of `composite` in one immediate transaction.
///
/// On success returns the final [`StepContext`]. On failure the transaction is rolled
/// back and the failing step's error is returned as is. Each retry starts over with a
/// fresh copy of the initial context.
pub fn run_atomic(db: &ConnectionManager, composite: &mut Composite<'_>) -> Result<StepContext> {
    let Composite {
        name,
        initial,
        steps,
    } = composite;
    let name = *name;

    db.with_connection(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut ctx = initial.clone();

        for (label, step) in steps.iter_mut() {
            if let Err(err) = step(&tx, &mut ctx) {
                debug!(composite = name, step = *label, error = %err, "step failed, rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    error!(composite = name, error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        }

        tx.commit()?;
        debug!(composite = name, steps = steps.len(), "composite committed");
        Ok(ctx)
    })
}
