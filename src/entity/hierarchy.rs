//! Ownership hierarchy between processes and their runnables.
//!
//! Entities live in an arena and refer to each other by [`EntityId`]. A node
//! holds its parent's index and its children's indices; nothing owns anything
//! through a pointer.

use super::{Process, Runnable};
use crate::core::{LifecycleEvent, LifecycleState};
use crate::error::TraceError;
use crate::stimulus::EntityKey;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Stable index of an entity in an [`EntityArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Termination blocked by the ownership invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyViolation {
    #[error("runnable '{runnable}' cannot terminate while sub-runnable '{sub_runnable}' is in progress")]
    RunnableWithRunningSubRunnable {
        runnable: String,
        sub_runnable: String,
    },

    #[error("task '{task}' cannot terminate while runnables are in progress: {}", .runnables.join(", "))]
    TaskWithRunningRunnables { task: String, runnables: Vec<String> },
}

impl HierarchyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RunnableWithRunningSubRunnable { .. } => {
                "terminate_on_runnable_with_running_sub_runnable"
            }
            Self::TaskWithRunningRunnables { .. } => "terminate_on_task_with_running_runnables",
        }
    }
}

#[derive(Clone, Debug)]
pub enum EntityBody {
    Process(Process),
    Runnable(Runnable),
}

impl EntityBody {
    pub fn state(&self) -> LifecycleState {
        match self {
            Self::Process(p) => p.state(),
            Self::Runnable(r) => r.state(),
        }
    }

    pub fn peek(&self, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        match self {
            Self::Process(p) => p.peek(event),
            Self::Runnable(r) => r.peek(event),
        }
    }

    fn do_state_transition(&mut self, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        match self {
            Self::Process(p) => p.do_state_transition(event),
            Self::Runnable(r) => r.do_state_transition(event),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntityNode {
    pub key: EntityKey,
    pub body: EntityBody,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
}

/// Arena of processes and runnables keyed by [`EntityKey`].
#[derive(Clone, Debug)]
pub struct EntityArena {
    nodes: Vec<EntityNode>,
    index: HashMap<EntityKey, EntityId>,
    record_history: bool,
}

impl Default for EntityArena {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityArena {
    /// Arena whose entities record their transition history.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            record_history: true,
        }
    }

    /// Arena whose entities track state only.
    pub fn without_history() -> Self {
        Self {
            record_history: false,
            ..Self::new()
        }
    }

    /// Add a process. Returns the existing id if the key is already present.
    pub fn insert_process(&mut self, key: EntityKey) -> Result<EntityId, TraceError> {
        if !key.tag.is_process() {
            return Err(TraceError::TypeMismatch {
                name: key.name,
                registered: key.tag.entity_type(),
                requested: crate::trace::EntityType::Task,
            });
        }
        let process = if self.record_history {
            Process::new()
        } else {
            Process::untracked()
        };
        Ok(self.insert(key, EntityBody::Process(process), None))
    }

    /// Add a runnable owned by `parent`.
    pub fn insert_runnable(&mut self, key: EntityKey, parent: EntityId) -> Result<EntityId, TraceError> {
        if key.tag.is_process() {
            return Err(TraceError::TypeMismatch {
                name: key.name,
                registered: key.tag.entity_type(),
                requested: crate::trace::EntityType::Runnable,
            });
        }
        if parent.0 >= self.nodes.len() {
            return Err(TraceError::UnknownEntity(format!("parent #{}", parent.0)));
        }
        let runnable = if self.record_history {
            Runnable::new()
        } else {
            Runnable::untracked()
        };
        Ok(self.insert(key, EntityBody::Runnable(runnable), Some(parent)))
    }

    fn insert(&mut self, key: EntityKey, body: EntityBody, parent: Option<EntityId>) -> EntityId {
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = EntityId(self.nodes.len());
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.index.insert(key.clone(), id);
        self.nodes.push(EntityNode {
            key,
            body,
            parent,
            children: Vec::new(),
        });
        id
    }

    pub fn find(&self, key: &EntityKey) -> Option<EntityId> {
        self.index.get(key).copied()
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (EntityId(i), n))
    }

    /// The process at the top of `id`'s ownership chain.
    pub fn root(&self, id: EntityId) -> EntityId {
        let mut current = id;
        while let Some(parent) = self.nodes.get(current.0).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }

    /// Every descendant of `id`, parents before children.
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack: Vec<EntityId> = self
            .nodes
            .get(id.0)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(next.0) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Check that `id` may terminate given its descendants' current states.
    pub fn check_terminate(&self, id: EntityId) -> Result<(), HierarchyViolation> {
        self.check_terminate_with(id, |node| node.body.state())
    }

    /// Like [`EntityArena::check_terminate`] with caller-supplied states.
    ///
    /// Used to validate a sequence of events before any of them is applied.
    pub fn check_terminate_with<F>(&self, id: EntityId, state_of: F) -> Result<(), HierarchyViolation>
    where
        F: Fn(&EntityNode) -> LifecycleState,
    {
        let Some(node) = self.nodes.get(id.0) else {
            return Ok(());
        };
        let busy: Vec<&EntityNode> = self
            .descendants(id)
            .into_iter()
            .filter_map(|d| self.nodes.get(d.0))
            .filter(|d| matches!(state_of(d), LifecycleState::Running | LifecycleState::Active))
            .collect();

        if busy.is_empty() {
            return Ok(());
        }
        match node.body {
            EntityBody::Runnable(_) => Err(HierarchyViolation::RunnableWithRunningSubRunnable {
                runnable: node.key.name.clone(),
                sub_runnable: busy[0].key.name.clone(),
            }),
            EntityBody::Process(_) => Err(HierarchyViolation::TaskWithRunningRunnables {
                task: node.key.name.clone(),
                runnables: busy.iter().map(|d| d.key.name.clone()).collect(),
            }),
        }
    }

    /// Apply `event` to `id`, enforcing the termination invariant.
    ///
    /// Every event that ends in `terminated` is checked, including a forced
    /// `mtalimitexceeded`.
    pub fn transition(&mut self, id: EntityId, event: LifecycleEvent) -> Result<LifecycleState, TraceError> {
        let next = self
            .nodes
            .get(id.0)
            .ok_or_else(|| TraceError::UnknownEntity(format!("#{}", id.0)))?
            .body
            .peek(event)?;
        if next == LifecycleState::Terminated {
            if let Err(violation) = self.check_terminate(id) {
                warn!(error = %violation, %event, "termination blocked");
                return Err(violation.into());
            }
        }
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or_else(|| TraceError::UnknownEntity(format!("#{}", id.0)))?;
        node.body.do_state_transition(event)
    }

    pub fn process(&self, id: EntityId) -> Option<&Process> {
        match self.nodes.get(id.0).map(|n| &n.body) {
            Some(EntityBody::Process(p)) => Some(p),
            _ => None,
        }
    }

    pub fn process_mut(&mut self, id: EntityId) -> Option<&mut Process> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.body) {
            Some(EntityBody::Process(p)) => Some(p),
            _ => None,
        }
    }

    pub fn runnable(&self, id: EntityId) -> Option<&Runnable> {
        match self.nodes.get(id.0).map(|n| &n.body) {
            Some(EntityBody::Runnable(r)) => Some(r),
            _ => None,
        }
    }

    pub fn runnable_mut(&mut self, id: EntityId) -> Option<&mut Runnable> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.body) {
            Some(EntityBody::Runnable(r)) => Some(r),
            _ => None,
        }
    }
}
