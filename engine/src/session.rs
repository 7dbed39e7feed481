use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use crate::context::{EvalState, EvaluationContext, ModuleId};
use crate::display::Display;

pub type ProjectId = u64;

/// One checkpointed version of a module's text. Snapshots form an
/// append-only chain through `parent`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub parent: Option<Box<Snapshot>>,
    pub text: String,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub created: SystemTime,
    pub modified: SystemTime,
}

/// A persistent editable script.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub project: ProjectId,
    pub current_text: String,
    pub prior: Option<Box<Snapshot>>,
    pub created: SystemTime,
    pub modified: SystemTime,
}

impl Module {
    /// The user edited the buffer without requesting evaluation.
    pub fn update(&mut self, text: impl Into<String>) {
        self.current_text = text.into();
        self.modified = SystemTime::now();
    }

    /// Checkpoint the current buffer onto the snapshot chain.
    pub fn mark(&mut self) {
        self.prior = Some(Box::new(Snapshot {
            parent: self.prior.take(),
            text: self.current_text.clone(),
            timestamp: SystemTime::now(),
        }));
    }

    /// Number of checkpoints on the snapshot chain.
    pub fn snapshot_count(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.prior.as_deref();
        while let Some(snapshot) = cursor {
            count += 1;
            cursor = snapshot.parent.as_deref();
        }
        count
    }
}

#[derive(Debug)]
pub enum StoreError {
    UnknownProject(ProjectId),
    UnknownModule(ModuleId),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownProject(id) => write!(f, "unknown project: {}", id),
            StoreError::UnknownModule(id) => write!(f, "unknown module: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

/// A claimed evaluation request: everything the worker needs, snapshotted
/// inside the claiming transaction.
#[derive(Debug, Clone)]
pub struct ClaimedRequest {
    pub module: ModuleId,
    pub text: String,
    pub selection: Option<String>,
}

/// In-process stand-in for the durable transactional store the requester
/// and the worker share. Every public operation is one atomic lock scope
/// (a "transaction"); the lock is never held across an evaluation run.
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: u64,
    projects: HashMap<ProjectId, Project>,
    modules: HashMap<ModuleId, Module>,
    context: EvaluationContext,
}

impl StoreInner {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn module_mut(&mut self, id: ModuleId) -> Result<&mut Module, StoreError> {
        self.modules.get_mut(&id).ok_or(StoreError::UnknownModule(id))
    }
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // a poisoned lock means another thread panicked mid-transaction;
        // committed fields are still consistent, so keep serving
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    // -- Content management -------------------------------------------------

    pub fn create_project(&self, name: impl Into<String>) -> ProjectId {
        let mut inner = self.lock();
        let id = inner.allocate_id();
        let now = SystemTime::now();
        inner.projects.insert(
            id,
            Project {
                name: name.into(),
                created: now,
                modified: now,
            },
        );
        id
    }

    pub fn create_module(
        &self,
        project: ProjectId,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<ModuleId, StoreError> {
        let mut inner = self.lock();
        if !inner.projects.contains_key(&project) {
            return Err(StoreError::UnknownProject(project));
        }
        let id = inner.allocate_id();
        let now = SystemTime::now();
        inner.modules.insert(
            id,
            Module {
                name: name.into(),
                project,
                current_text: text.into(),
                prior: None,
                created: now,
                modified: now,
            },
        );
        Ok(id)
    }

    /// Replace a module's buffer without checkpointing.
    pub fn update_module(&self, id: ModuleId, text: impl Into<String>) -> Result<(), StoreError> {
        self.lock().module_mut(id)?.update(text);
        Ok(())
    }

    /// Checkpoint a module's current buffer onto its snapshot chain.
    pub fn mark_module(&self, id: ModuleId) -> Result<(), StoreError> {
        self.lock().module_mut(id)?.mark();
        Ok(())
    }

    pub fn rename_module(&self, id: ModuleId, name: impl Into<String>) -> Result<(), StoreError> {
        self.lock().module_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn remove_module(&self, id: ModuleId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .modules
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::UnknownModule(id))
    }

    /// Remove a project and every module in it.
    pub fn remove_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .projects
            .remove(&id)
            .ok_or(StoreError::UnknownProject(id))?;
        inner.modules.retain(|_, module| module.project != id);
        Ok(())
    }

    /// A read-only snapshot of a module.
    pub fn module(&self, id: ModuleId) -> Result<Module, StoreError> {
        self.lock()
            .modules
            .get(&id)
            .cloned()
            .ok_or(StoreError::UnknownModule(id))
    }

    // -- Evaluation coordination --------------------------------------------

    /// Requester API: point the singleton context at a module and mark it
    /// Dirty. Valid from any state.
    pub fn request(&self, module: ModuleId, selection: Option<String>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.modules.contains_key(&module) {
            return Err(StoreError::UnknownModule(module));
        }
        inner.context.request(module, selection);
        Ok(())
    }

    /// A read-only snapshot of the shared evaluation context.
    pub fn context(&self) -> EvaluationContext {
        self.lock().context.clone()
    }

    /// Worker API: claim a pending request. Sets Calculating and snapshots
    /// the script text and selection in the same transaction.
    pub fn claim(&self) -> Option<ClaimedRequest> {
        let mut inner = self.lock();
        if !matches!(inner.context.state, EvalState::Dirty | EvalState::Calculating) {
            return None;
        }
        let module_id = inner.context.module?;
        let text = inner
            .modules
            .get(&module_id)
            .map(|module| module.current_text.clone());
        let Some(text) = text else {
            // the module was deleted after the request; finish the cycle
            // with an error instead of claiming
            inner.context.error = Some(format!("module {} no longer exists", module_id));
            inner.context.displays.clear();
            inner.context.state = EvalState::Complete;
            return None;
        };
        let selection = inner.context.selection.clone();
        inner.context.state = EvalState::Calculating;
        Some(ClaimedRequest {
            module: module_id,
            text,
            selection,
        })
    }

    /// Worker API: commit a finished run. The output is always written;
    /// the state moves to Complete unless a newer request already
    /// re-dirtied the context, in which case Dirty survives so the next
    /// tick recomputes (and overwrites this output).
    pub fn commit(&self, error: Option<String>, displays: Vec<Display>) {
        let mut inner = self.lock();
        inner.context.error = error;
        inner.context.displays = displays;
        if inner.context.state == EvalState::Calculating {
            inner.context.state = EvalState::Complete;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_builds_an_ordered_snapshot_chain() {
        let store = Store::new();
        let project = store.create_project("research");
        let module = store
            .create_module(project, "analysis", "a = 1")
            .expect("create failed");

        store.mark_module(module).expect("mark failed");
        store.update_module(module, "a = 2").expect("update failed");
        store.mark_module(module).expect("mark failed");

        let module = store.module(module).expect("lookup failed");
        assert_eq!(module.snapshot_count(), 2);
        let head = module.prior.as_deref().expect("no snapshot");
        assert_eq!(head.text, "a = 2");
        assert_eq!(head.parent.as_deref().expect("no parent").text, "a = 1");
        assert_eq!(module.current_text, "a = 2");
    }

    #[test]
    fn removing_a_project_removes_its_modules() {
        let store = Store::new();
        let project = store.create_project("p");
        let module = store.create_module(project, "m", "").expect("create failed");
        store.remove_project(project).expect("remove failed");
        assert!(store.module(module).is_err());
    }

    #[test]
    fn rename_and_remove_module() {
        let store = Store::new();
        let project = store.create_project("p");
        let module = store.create_module(project, "m", "").expect("create failed");
        store.rename_module(module, "m2").expect("rename failed");
        assert_eq!(store.module(module).expect("lookup failed").name, "m2");
        store.remove_module(module).expect("remove failed");
        assert!(store.remove_module(module).is_err());
    }

    #[test]
    fn claim_requires_a_pending_request() {
        let store = Store::new();
        assert!(store.claim().is_none());
    }

    #[test]
    fn claim_on_a_deleted_module_completes_with_an_error() {
        let store = Store::new();
        let project = store.create_project("p");
        let module = store.create_module(project, "m", "1").expect("create failed");
        store.request(module, None).expect("request failed");
        store.remove_module(module).expect("remove failed");

        assert!(store.claim().is_none());
        let ctx = store.context();
        assert_eq!(ctx.state, EvalState::Complete);
        assert!(ctx.error.is_some());
    }

    #[test]
    fn commit_preserves_a_superseding_dirty_state() {
        let store = Store::new();
        let project = store.create_project("p");
        let module = store.create_module(project, "m", "1").expect("create failed");

        store.request(module, None).expect("request failed");
        let claimed = store.claim().expect("claim failed");
        assert_eq!(claimed.text, "1");
        assert_eq!(store.context().state, EvalState::Calculating);

        // a newer request lands while the run is in flight
        store
            .request(module, Some("2".to_string()))
            .expect("request failed");
        store.commit(None, Vec::new());

        // the in-flight output was written, but the fresh request survives
        assert_eq!(store.context().state, EvalState::Dirty);
    }
}
