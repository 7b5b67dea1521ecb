//! Client-side mirror of the remote `trafficStats` collection.
//!
//! Every mutation calls the persistence service first and touches the local
//! collection only once that call has succeeded, so the local copy is always a
//! confirmed subset of server state. Operations take `&self` and may overlap;
//! the lock is never held across a remote call.

use crate::aggregate::aggregate;
use crate::client::StatsApi;
use crate::errors::StatsError;
use crate::models::{parse_date, Bucket, Granularity, NewStat, Record, StatChanges};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// What a mutation is about: the date of a new entry, or an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Date(NaiveDate),
    Record(String),
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationTarget::Date(date) => write!(f, "the entry for {date}"),
            MutationTarget::Record(id) => write!(f, "entry '{id}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Submitting,
    Applied,
    Failed,
}

#[derive(Debug, Default)]
struct Collection {
    records: Vec<Record>,
    in_flight: HashSet<MutationTarget>,
    settled: HashMap<MutationTarget, MutationState>,
}

impl Collection {
    fn holds_date(&self, date: NaiveDate, except_id: Option<&str>) -> bool {
        self.records
            .iter()
            .any(|record| Some(record.id.as_str()) != except_id && parse_date(&record.date) == Some(date))
    }

    /// Stores a confirmed server record. A `load` that overlapped the remote
    /// call may already have brought it in, so it replaces by id.
    fn upsert(&mut self, record: Record) {
        match self.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    /// Drops the state kept for records that no longer exist.
    fn forget(&mut self, ids: &[String]) {
        for id in ids {
            self.settled.remove(&MutationTarget::Record(id.clone()));
        }
    }
}

/// Reservation for an in-flight mutation. Dropping it without settling (the
/// operation's future was dropped) returns its targets to `Idle`.
struct Submission<'a> {
    lock: &'a Mutex<Collection>,
    targets: Vec<MutationTarget>,
    settled: bool,
}

impl<'a> Submission<'a> {
    fn begin(
        lock: &'a Mutex<Collection>,
        collection: &mut Collection,
        targets: Vec<MutationTarget>,
    ) -> Result<Self, StatsError> {
        if let Some(busy) = targets.iter().find(|target| collection.in_flight.contains(*target)) {
            return Err(StatsError::AlreadySubmitting(busy.to_string()));
        }
        for target in &targets {
            collection.in_flight.insert(target.clone());
        }
        Ok(Self {
            lock,
            targets,
            settled: false,
        })
    }

    fn settle(mut self, collection: &mut Collection, state: MutationState) {
        for target in self.targets.drain(..) {
            collection.in_flight.remove(&target);
            collection.settled.insert(target, state);
        }
        self.settled = true;
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut collection = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        for target in &self.targets {
            collection.in_flight.remove(target);
        }
    }
}

pub struct StatsStore<A> {
    api: A,
    state: Mutex<Collection>,
}

impl<A: StatsApi> StatsStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(Collection::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn collection(&self) -> MutexGuard<'_, Collection> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the confirmed records, in no particular order.
    pub fn records(&self) -> Vec<Record> {
        self.collection().records.clone()
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.collection()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.collection().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chart(&self, granularity: Granularity) -> Result<Vec<Bucket>, StatsError> {
        aggregate(&self.records(), granularity)
    }

    pub fn mutation_state(&self, target: &MutationTarget) -> MutationState {
        let collection = self.collection();
        if collection.in_flight.contains(target) {
            return MutationState::Submitting;
        }
        collection
            .settled
            .get(target)
            .copied()
            .unwrap_or(MutationState::Idle)
    }

    /// Replaces the local collection with the server's.
    pub async fn load(&self) -> Result<Vec<Record>, StatsError> {
        match self.api.list().await {
            Ok(records) => {
                info!(count = records.len(), "loaded traffic stats");
                self.collection().records = records.clone();
                Ok(records)
            }
            Err(err) => {
                warn!(error = %err, "failed to load traffic stats");
                Err(StatsError::LoadFailed(err))
            }
        }
    }

    pub async fn add(&self, candidate: &NewStat) -> Result<Record, StatsError> {
        let doc = candidate.validate()?;
        let date = doc.parsed_date()?;
        let submission = {
            let mut collection = self.collection();
            if collection.holds_date(date, None) {
                return Err(StatsError::DuplicateDate(doc.date));
            }
            Submission::begin(&self.state, &mut collection, vec![MutationTarget::Date(date)])?
        };

        match self.api.create(&doc).await {
            Ok(record) => {
                let mut collection = self.collection();
                collection.upsert(record.clone());
                submission.settle(&mut collection, MutationState::Applied);
                info!(id = %record.id, date = %record.date, visits = record.visits, "added traffic stat");
                Ok(record)
            }
            Err(err) => {
                submission.settle(&mut self.collection(), MutationState::Failed);
                warn!(date = %doc.date, error = %err, "failed to add traffic stat");
                Err(StatsError::RemoteFailed(err))
            }
        }
    }

    pub async fn edit(&self, id: &str, changes: &StatChanges) -> Result<Record, StatsError> {
        let patch = changes.validate()?;
        let new_date = patch.date.as_deref().and_then(parse_date);
        let submission = {
            let mut collection = self.collection();
            if !collection.records.iter().any(|record| record.id == id) {
                return Err(StatsError::NotFound(id.to_string()));
            }
            if let Some(date) = new_date {
                if collection.holds_date(date, Some(id)) {
                    return Err(StatsError::DuplicateDate(date.to_string()));
                }
            }
            Submission::begin(
                &self.state,
                &mut collection,
                vec![MutationTarget::Record(id.to_string())],
            )?
        };

        match self.api.update(id, &patch).await {
            Ok(record) => {
                let mut collection = self.collection();
                collection.upsert(record.clone());
                submission.settle(&mut collection, MutationState::Applied);
                info!(id, date = %record.date, visits = record.visits, "updated traffic stat");
                Ok(record)
            }
            Err(err) => {
                submission.settle(&mut self.collection(), MutationState::Failed);
                warn!(id, error = %err, "failed to update traffic stat");
                Err(StatsError::RemoteFailed(err))
            }
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), StatsError> {
        let submission = {
            let mut collection = self.collection();
            Submission::begin(
                &self.state,
                &mut collection,
                vec![MutationTarget::Record(id.to_string())],
            )?
        };

        match self.api.delete(id).await {
            Ok(()) => {
                let mut collection = self.collection();
                collection.records.retain(|record| record.id != id);
                submission.settle(&mut collection, MutationState::Applied);
                collection.forget(&[id.to_string()]);
                info!(id, "deleted traffic stat");
                Ok(())
            }
            Err(err) => {
                submission.settle(&mut self.collection(), MutationState::Failed);
                warn!(id, error = %err, "failed to delete traffic stat");
                Err(StatsError::RemoteFailed(err))
            }
        }
    }

    /// Creates several entries in one remote call. Either every candidate is
    /// accepted or none is sent.
    pub async fn import(&self, candidates: &[NewStat]) -> Result<Vec<Record>, StatsError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::with_capacity(candidates.len());
        let mut dates = HashSet::with_capacity(candidates.len());
        for candidate in candidates {
            let doc = candidate.validate()?;
            if !dates.insert(doc.parsed_date()?) {
                return Err(StatsError::DuplicateDate(doc.date));
            }
            docs.push(doc);
        }

        let submission = {
            let mut collection = self.collection();
            if let Some(doc) = docs
                .iter()
                .find(|doc| parse_date(&doc.date).is_some_and(|date| collection.holds_date(date, None)))
            {
                return Err(StatsError::DuplicateDate(doc.date.clone()));
            }
            let targets = dates.iter().copied().map(MutationTarget::Date).collect();
            Submission::begin(&self.state, &mut collection, targets)?
        };

        match self.api.create_many(&docs).await {
            Ok(created) => {
                let mut collection = self.collection();
                for record in &created {
                    collection.upsert(record.clone());
                }
                submission.settle(&mut collection, MutationState::Applied);
                info!(count = created.len(), "imported traffic stats");
                Ok(created)
            }
            Err(err) => {
                submission.settle(&mut self.collection(), MutationState::Failed);
                warn!(count = docs.len(), error = %err, "failed to import traffic stats");
                Err(StatsError::RemoteFailed(err))
            }
        }
    }

    /// Deletes several entries in one remote call and returns how many the
    /// server removed.
    pub async fn delete_many(&self, ids: &[String]) -> Result<usize, StatsError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let submission = {
            let mut collection = self.collection();
            let targets = ids.iter().cloned().map(MutationTarget::Record).collect();
            Submission::begin(&self.state, &mut collection, targets)?
        };

        match self.api.delete_many(ids).await {
            Ok(response) => {
                let removed: HashSet<&str> = response.ids.iter().map(String::as_str).collect();
                let mut collection = self.collection();
                collection
                    .records
                    .retain(|record| !removed.contains(record.id.as_str()));
                submission.settle(&mut collection, MutationState::Applied);
                collection.forget(&response.ids);
                info!(deleted = response.deleted, "deleted traffic stats");
                Ok(response.deleted)
            }
            Err(err) => {
                submission.settle(&mut self.collection(), MutationState::Failed);
                warn!(count = ids.len(), error = %err, "failed to delete traffic stats");
                Err(StatsError::RemoteFailed(err))
            }
        }
    }
}
