// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory mirrors of the pending approval UI tokens.
//!
//! The chat front end registers a token when it posts an approval widget
//! and resolves it when the owner interacts with the widget. Tokens are
//! persisted so approvals survive a restart; each job holds at most one
//! token per widget family — registering a replacement deletes the stale
//! one.

use legate_storage::{ApprovalChecklist, ApprovalPoll, StorageError, Store};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Persistence for checklist tokens.
pub trait ChecklistPersistence: Send + Sync {
    fn list_checklists(&self) -> Result<Vec<ApprovalChecklist>, StorageError>;
    fn save_checklist(&self, checklist: &ApprovalChecklist) -> Result<(), StorageError>;
    fn delete_checklist(&self, chat_id: i64, message_id: i64) -> Result<(), StorageError>;
}

/// Persistence for poll tokens.
pub trait PollPersistence: Send + Sync {
    fn list_polls(&self) -> Result<Vec<ApprovalPoll>, StorageError>;
    fn save_poll(&self, poll: &ApprovalPoll) -> Result<(), StorageError>;
    fn delete_poll(&self, poll_id: &str) -> Result<(), StorageError>;
}

impl ChecklistPersistence for Store {
    fn list_checklists(&self) -> Result<Vec<ApprovalChecklist>, StorageError> {
        self.list_approval_checklists()
    }

    fn save_checklist(&self, checklist: &ApprovalChecklist) -> Result<(), StorageError> {
        self.save_approval_checklist(checklist)
    }

    fn delete_checklist(&self, chat_id: i64, message_id: i64) -> Result<(), StorageError> {
        self.delete_approval_checklist(chat_id, message_id)
    }
}

impl PollPersistence for Store {
    fn list_polls(&self) -> Result<Vec<ApprovalPoll>, StorageError> {
        self.list_approval_polls()
    }

    fn save_poll(&self, poll: &ApprovalPoll) -> Result<(), StorageError> {
        self.save_approval_poll(poll)
    }

    fn delete_poll(&self, poll_id: &str) -> Result<(), StorageError> {
        self.delete_approval_poll(poll_id)
    }
}

struct ChecklistState {
    by_key: HashMap<(i64, i64), ApprovalChecklist>,
    key_by_job: HashMap<i64, (i64, i64)>,
}

/// Checklist tokens keyed by `(chat_id, message_id)`.
pub struct ChecklistStore<P: ChecklistPersistence> {
    state: Mutex<ChecklistState>,
    persistence: Arc<P>,
}

impl<P: ChecklistPersistence> ChecklistStore<P> {
    /// Hydrate the mirror from persistence.
    pub fn new(persistence: Arc<P>) -> Result<Self, StorageError> {
        let mut state = ChecklistState {
            by_key: HashMap::new(),
            key_by_job: HashMap::new(),
        };
        for checklist in persistence.list_checklists()? {
            let key = (checklist.chat_id, checklist.message_id);
            if let Some(old_key) = state.key_by_job.insert(checklist.job_id, key) {
                if old_key != key {
                    state.by_key.remove(&old_key);
                }
            }
            state.by_key.insert(key, checklist);
        }
        Ok(Self {
            state: Mutex::new(state),
            persistence,
        })
    }

    /// Register a token, replacing any previous one for the same job.
    pub fn register(&self, checklist: ApprovalChecklist) -> Result<(), StorageError> {
        let key = (checklist.chat_id, checklist.message_id);
        let stale = {
            let mut state = self.state.lock();
            let stale = match state.key_by_job.insert(checklist.job_id, key) {
                Some(old_key) if old_key != key => state.by_key.remove(&old_key).map(|_| old_key),
                _ => None,
            };
            state.by_key.insert(key, checklist.clone());
            stale
        };
        if let Some((chat_id, message_id)) = stale {
            self.persistence.delete_checklist(chat_id, message_id)?;
        }
        self.persistence.save_checklist(&checklist)
    }

    /// Look up the token for a widget interaction.
    pub fn resolve(&self, chat_id: i64, message_id: i64) -> Option<ApprovalChecklist> {
        self.state.lock().by_key.get(&(chat_id, message_id)).cloned()
    }

    /// Drop the token for a job once its approval is settled.
    pub fn discard(&self, job_id: i64) -> Result<(), StorageError> {
        let key = {
            let mut state = self.state.lock();
            let key = state.key_by_job.remove(&job_id);
            if let Some(key) = key {
                state.by_key.remove(&key);
            }
            key
        };
        if let Some((chat_id, message_id)) = key {
            self.persistence.delete_checklist(chat_id, message_id)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct PollState {
    by_poll_id: HashMap<String, ApprovalPoll>,
    poll_id_by_job: HashMap<i64, String>,
}

/// Poll tokens keyed by the poll id.
pub struct PollStore<P: PollPersistence> {
    state: Mutex<PollState>,
    persistence: Arc<P>,
}

impl<P: PollPersistence> PollStore<P> {
    /// Hydrate the mirror from persistence.
    pub fn new(persistence: Arc<P>) -> Result<Self, StorageError> {
        let mut state = PollState {
            by_poll_id: HashMap::new(),
            poll_id_by_job: HashMap::new(),
        };
        for poll in persistence.list_polls()? {
            if let Some(old_id) = state
                .poll_id_by_job
                .insert(poll.job_id, poll.poll_id.clone())
            {
                if old_id != poll.poll_id {
                    state.by_poll_id.remove(&old_id);
                }
            }
            state.by_poll_id.insert(poll.poll_id.clone(), poll);
        }
        Ok(Self {
            state: Mutex::new(state),
            persistence,
        })
    }

    /// Register a token, replacing any previous one for the same job.
    pub fn register(&self, poll: ApprovalPoll) -> Result<(), StorageError> {
        let stale = {
            let mut state = self.state.lock();
            let stale = match state
                .poll_id_by_job
                .insert(poll.job_id, poll.poll_id.clone())
            {
                Some(old_id) if old_id != poll.poll_id => {
                    state.by_poll_id.remove(&old_id);
                    Some(old_id)
                }
                _ => None,
            };
            state.by_poll_id.insert(poll.poll_id.clone(), poll.clone());
            stale
        };
        if let Some(old_id) = stale {
            self.persistence.delete_poll(&old_id)?;
        }
        self.persistence.save_poll(&poll)
    }

    /// Look up the token for a poll answer.
    pub fn resolve(&self, poll_id: &str) -> Option<ApprovalPoll> {
        self.state.lock().by_poll_id.get(poll_id).cloned()
    }

    /// Drop the token for a job once its approval is settled.
    pub fn discard(&self, job_id: i64) -> Result<(), StorageError> {
        let poll_id = {
            let mut state = self.state.lock();
            let poll_id = state.poll_id_by_job.remove(&job_id);
            if let Some(id) = &poll_id {
                state.by_poll_id.remove(id);
            }
            poll_id
        };
        if let Some(id) = poll_id {
            self.persistence.delete_poll(&id)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_poll_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "approvals_tests.rs"]
mod tests;
