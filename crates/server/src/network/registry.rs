//! Bounded registry of authenticated sessions.
//!
//! Every operation takes the single registry lock for its whole
//! read-modify-write span and releases it before returning. Nothing that
//! leaves the registry borrows from it: callers get copies (identities,
//! liveness, cloned outbound senders) and do their network I/O afterwards.

use super::session::{Liveness, Outbound, SessionHandle};
use crate::protocol::SessionIdentity;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry is at capacity ({capacity} sessions)")]
    CapacityExceeded { capacity: usize },
    #[error("{0} is already connected")]
    DuplicateIdentity(SessionIdentity),
}

/// Copy of one session's state, taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// 1-based position in registration order at the time of the snapshot.
    pub ordinal: usize,
    pub handle: SessionHandle,
    pub identity: SessionIdentity,
    pub liveness: Liveness,
}

/// Result of resolving a (campus, department) target.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub handle: SessionHandle,
    pub identity: SessionIdentity,
    pub outbound: Outbound,
    /// False when only the campus matched.
    pub exact: bool,
}

#[derive(Debug)]
struct SessionEntry {
    handle: SessionHandle,
    identity: SessionIdentity,
    outbound: Outbound,
    liveness: Liveness,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    sessions: Vec<SessionEntry>,
}

impl RegistryInner {
    fn position_exact(&self, campus: &str, department: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|entry| entry.identity.matches(campus, department))
    }

    fn position_by_campus(&self, campus: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|entry| entry.identity.campus == campus)
    }

    fn resolve_position(&self, campus: &str, department: &str) -> Option<(usize, bool)> {
        self.position_exact(campus, department)
            .map(|idx| (idx, true))
            .or_else(|| self.position_by_campus(campus).map(|idx| (idx, false)))
    }
}

#[derive(Debug)]
pub struct Registry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a session. Duplicate identities are refused before capacity is
    /// considered, so a full registry still reports a reconnect clash.
    pub fn register(
        &self,
        identity: SessionIdentity,
        outbound: Outbound,
    ) -> Result<SessionHandle, RegistryError> {
        let mut inner = self.inner.lock();

        if inner
            .position_exact(&identity.campus, &identity.department)
            .is_some()
        {
            return Err(RegistryError::DuplicateIdentity(identity));
        }
        if inner.sessions.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        inner.next_id += 1;
        let handle = SessionHandle::new(inner.next_id);
        inner.sessions.push(SessionEntry {
            handle,
            identity,
            outbound,
            liveness: Liveness::default(),
        });
        Ok(handle)
    }

    /// Removes a session and its liveness state; survivors keep their order.
    pub fn remove(&self, handle: SessionHandle) -> Option<SessionIdentity> {
        let mut inner = self.inner.lock();
        let idx = inner
            .sessions
            .iter()
            .position(|entry| entry.handle == handle)?;
        Some(inner.sessions.remove(idx).identity)
    }

    pub fn find_exact(&self, campus: &str, department: &str) -> Option<SessionHandle> {
        let inner = self.inner.lock();
        inner
            .position_exact(campus, department)
            .map(|idx| inner.sessions[idx].handle)
    }

    /// First session of `campus` in registration order, any department.
    pub fn find_by_campus(&self, campus: &str) -> Option<SessionHandle> {
        let inner = self.inner.lock();
        inner
            .position_by_campus(campus)
            .map(|idx| inner.sessions[idx].handle)
    }

    /// Exact match, else the first session of the campus, in one lock span.
    pub fn resolve(&self, campus: &str, department: &str) -> Option<Resolved> {
        let inner = self.inner.lock();
        let (idx, exact) = inner.resolve_position(campus, department)?;
        let entry = &inner.sessions[idx];
        Some(Resolved {
            handle: entry.handle,
            identity: entry.identity.clone(),
            outbound: entry.outbound.clone(),
            exact,
        })
    }

    pub fn identity(&self, handle: SessionHandle) -> Option<SessionIdentity> {
        self.inner
            .lock()
            .sessions
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| entry.identity.clone())
    }

    pub fn liveness(&self, handle: SessionHandle) -> Option<Liveness> {
        self.inner
            .lock()
            .sessions
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| entry.liveness.clone())
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.inner
            .lock()
            .sessions
            .iter()
            .enumerate()
            .map(|(idx, entry)| SessionSnapshot {
                ordinal: idx + 1,
                handle: entry.handle,
                identity: entry.identity.clone(),
                liveness: entry.liveness.clone(),
            })
            .collect()
    }

    /// Resolves a ping's sender and records its source address and time.
    /// Returns the identity that was updated and whether it matched exactly.
    pub fn record_ping(
        &self,
        campus: &str,
        department: &str,
        source: SocketAddr,
        at: DateTime<Local>,
    ) -> Option<(SessionIdentity, bool)> {
        let mut inner = self.inner.lock();
        let (idx, exact) = inner.resolve_position(campus, department)?;
        let entry = &mut inner.sessions[idx];
        entry.liveness.record(source, at);
        Some((entry.identity.clone(), exact))
    }

    /// Sessions with a known reply address, copied for a broadcast.
    pub fn reply_targets(&self) -> Vec<(SessionIdentity, SocketAddr)> {
        self.inner
            .lock()
            .sessions
            .iter()
            .filter_map(|entry| {
                entry
                    .liveness
                    .reply_addr
                    .map(|addr| (entry.identity.clone(), addr))
            })
            .collect()
    }
}
