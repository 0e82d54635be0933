use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    clock::ClockState,
    error::{Error, Result, StoreError},
    observe::{Event, ObserverState},
    validation::Validate,
};

/// Timestamps
///
/// The lifecycle columns every stored entity carries. Owned by the lifecycle
/// manager; resource services never set these directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `Some` once the entity has been logically deleted. Set exactly once.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Stamps for a brand-new entity: created and updated at `now`, live.
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Moves `updated_at` forward to `now`, never backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }
}

/// Lifecycle
///
/// An entity governed by the create / update / soft-delete contract.
pub trait Lifecycle: Validate + Clone + Send + Sync + 'static {
    /// Attributes supplied at creation, before an id exists.
    type Draft: Validate + Send + Sync;
    /// Partial update; `None` fields are left alone.
    type Patch: Send;
    /// Caller-side read filter, combined with the live-row predicate.
    type Filter: Default + Send + Sync;

    /// Singular resource name, used in messages and events.
    const KIND: &'static str;

    fn from_draft(id: i64, draft: Self::Draft, stamps: Timestamps) -> Self;
    fn id(&self) -> i64;
    fn timestamps(&self) -> &Timestamps;
    fn timestamps_mut(&mut self) -> &mut Timestamps;
    fn apply(&mut self, patch: Self::Patch);
    fn matches(&self, filter: &Self::Filter) -> bool;

    /// Key that must be unique among live rows, if the entity has one.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// LifecycleStore
///
/// The persistence contract the manager relies on. Every read returns live
/// rows only; there is no method that can observe a soft-deleted row.
#[async_trait]
pub trait LifecycleStore<T: Lifecycle>: Send + Sync {
    async fn insert(&self, draft: T::Draft, stamps: Timestamps) -> std::result::Result<T, StoreError>;

    /// Writes back a live entity. `None` if it is no longer live.
    async fn save(&self, entity: &T) -> std::result::Result<Option<T>, StoreError>;

    /// Sets `deleted_at = at` on the live row with `id`. `false` if there was
    /// no such live row.
    async fn mark_deleted(&self, id: i64, at: DateTime<Utc>) -> std::result::Result<bool, StoreError>;

    async fn find_live(&self, filter: &T::Filter) -> std::result::Result<Vec<T>, StoreError>;

    async fn find_live_by_id(&self, id: i64) -> std::result::Result<Option<T>, StoreError>;
}

pub type StoreState<T> = Arc<dyn LifecycleStore<T>>;

/// LifecycleManager
///
/// Applies the timestamp and soft-delete rules uniformly to one entity type.
/// Validation runs before every write; storage errors other than conflicts
/// are reported to the observer and surface as `Error::Internal`.
pub struct LifecycleManager<T: Lifecycle> {
    store: StoreState<T>,
    clock: ClockState,
    observer: ObserverState,
}

impl<T: Lifecycle> Clone for LifecycleManager<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<T: Lifecycle> LifecycleManager<T> {
    pub fn new(store: StoreState<T>, clock: ClockState, observer: ObserverState) -> Self {
        Self {
            store,
            clock,
            observer,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// create
    ///
    /// New entities start with `created_at == updated_at == now` and no
    /// `deleted_at`.
    pub async fn create(&self, draft: T::Draft) -> Result<T> {
        draft.validate().map_err(Error::Validation)?;

        let stamps = Timestamps::created(self.clock.now());
        let entity = self
            .store
            .insert(draft, stamps)
            .await
            .map_err(|e| self.storage_failure("create", e))?;

        self.observer.observe(&Event::EntityCreated {
            kind: T::KIND,
            id: entity.id(),
        });
        Ok(entity)
    }

    /// update
    ///
    /// Applies `patch` to `existing`, advances `updated_at`, validates the
    /// result and only then writes it. If the row was deleted in the meantime
    /// the write is refused with `NotFound`.
    pub async fn update(&self, existing: T, patch: T::Patch) -> Result<T> {
        if !existing.timestamps().is_live() {
            return Err(self.not_found(existing.id()));
        }

        let mut next = existing;
        next.apply(patch);
        next.timestamps_mut().touch(self.clock.now());
        next.validate().map_err(Error::Validation)?;

        let saved = self
            .store
            .save(&next)
            .await
            .map_err(|e| self.storage_failure("update", e))?
            .ok_or_else(|| self.not_found(next.id()))?;

        self.observer.observe(&Event::EntityUpdated {
            kind: T::KIND,
            id: saved.id(),
        });
        Ok(saved)
    }

    /// soft_delete
    ///
    /// Not idempotent: deleting an id that is missing or already deleted is
    /// `NotFound`.
    pub async fn soft_delete(&self, id: i64) -> Result<()> {
        let deleted = self
            .store
            .mark_deleted(id, self.clock.now())
            .await
            .map_err(|e| self.storage_failure("soft_delete", e))?;

        if !deleted {
            return Err(self.not_found(id));
        }

        self.observer
            .observe(&Event::EntitySoftDeleted { kind: T::KIND, id });
        Ok(())
    }

    pub async fn find_live(&self, filter: &T::Filter) -> Result<Vec<T>> {
        self.store
            .find_live(filter)
            .await
            .map_err(|e| self.storage_failure("find_live", e))
    }

    pub async fn find_live_by_id(&self, id: i64) -> Result<Option<T>> {
        self.store
            .find_live_by_id(id)
            .await
            .map_err(|e| self.storage_failure("find_live_by_id", e))
    }

    /// Like `find_live_by_id`, but a missing row is an error.
    pub async fn get_live(&self, id: i64) -> Result<T> {
        self.find_live_by_id(id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    fn not_found(&self, id: i64) -> Error {
        Error::NotFound(format!("{} {id} not found", T::KIND))
    }

    fn storage_failure(&self, context: &'static str, err: StoreError) -> Error {
        if let StoreError::Backend(detail) = &err {
            self.observer.observe(&Event::InternalFailure {
                context,
                detail: detail.clone(),
            });
        }
        err.into()
    }
}

