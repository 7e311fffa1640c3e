//! Sync engine
//!
//! Every mutation follows the same path: apply optimistically to the local
//! store, attempt the remote call when the transport is up and the target id
//! is permanent, and otherwise queue the operation durably for replay. The
//! caller always gets the optimistic record back; connectivity loss is never
//! surfaced as a mutation failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::ItemStore;
use crate::error::{Error, Result};
use crate::gateway::{ItemFilter, ItemGateway};
use crate::models::{
    Item, ItemDraft, ItemFields, ItemId, ItemPatch, ItemStatus, Operation, WeekKey,
};
use crate::sync::ConnectivityMonitor;
use crate::util::now_millis;

/// Outcome of one queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations confirmed remotely and removed from the queue.
    pub synced: usize,
    /// Operations left in the queue when the drain stopped.
    pub failed: usize,
}

/// Outcome of a full sync: a drain plus the authoritative refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    /// Items fetched from the remote store into the local one.
    pub refreshed: usize,
}

/// Orchestrates optimistic local writes, the operation queue, and replay.
pub struct SyncEngine<S, G> {
    store: S,
    gateway: G,
    monitor: ConnectivityMonitor,
    drain_gate: Mutex<()>,
    drain_pending: AtomicBool,
}

impl<S: ItemStore, G: ItemGateway> SyncEngine<S, G> {
    pub fn new(store: S, gateway: G, monitor: ConnectivityMonitor) -> Self {
        Self {
            store,
            gateway,
            monitor,
            drain_gate: Mutex::new(()),
            drain_pending: AtomicBool::new(false),
        }
    }

    /// The local store behind this engine.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The connectivity handle feeding this engine.
    pub const fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Capture a new item.
    ///
    /// The week key is computed once here and frozen into the record (and
    /// into the queued payload, if one is needed), so a replay after a week
    /// boundary still lands the item in the week it was captured.
    pub async fn create_item(&self, draft: ItemDraft) -> Result<Item> {
        let now = now_millis();
        let fields = draft.into_fields(WeekKey::for_timestamp_millis(now))?;
        let item = Item::optimistic(ItemId::temp(), &fields, now);
        self.store.put(&item).await?;

        if self.monitor.is_online() {
            match self.gateway.create(&fields).await {
                Ok(remote) => {
                    let remote = remote.into_synced();
                    self.store.reconcile(&item.id, &remote).await?;
                    return Ok(remote);
                }
                Err(error) => {
                    tracing::debug!("create not confirmed remotely, queueing: {error}");
                }
            }
        }

        self.store
            .enqueue(&Operation::Create {
                temp_id: item.id.clone(),
                fields,
            })
            .await?;
        Ok(item)
    }

    /// Merge changed fields into an item.
    ///
    /// An item whose create is still pending gets no separate queued update:
    /// the local record is merged and the pending create's payload is
    /// replaced in place with the merged fields.
    pub async fn update_item(&self, id: &ItemId, patch: ItemPatch) -> Result<Item> {
        let mut item = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if patch.is_empty() {
            return Ok(item);
        }

        item.apply_patch(&patch, now_millis());
        self.store.put(&item).await?;

        if id.is_temp() {
            let fields = ItemFields::of(&item);
            if !self.store.replace_queued_create(id, &fields).await? {
                // No pending create to fold into; queue a fresh one carrying
                // the merged fields so the item still reaches the remote.
                self.store
                    .enqueue(&Operation::Create {
                        temp_id: id.clone(),
                        fields,
                    })
                    .await?;
            }
            return Ok(item);
        }

        if self.monitor.is_online() {
            match self.gateway.update(id, &patch).await {
                Ok(remote) => {
                    let remote = remote.into_synced();
                    self.store.put(&remote).await?;
                    return Ok(remote);
                }
                Err(error) => {
                    tracing::debug!("update not confirmed remotely, queueing: {error}");
                }
            }
        }

        self.store
            .enqueue(&Operation::Update {
                id: id.clone(),
                patch,
            })
            .await?;
        Ok(item)
    }

    /// Delete an item.
    ///
    /// An unconfirmed temp item never existed remotely: its record and any
    /// queued operations for it are dropped outright. Anything else is
    /// soft-deleted locally and removed once the remote confirms.
    pub async fn delete_item(&self, id: &ItemId) -> Result<()> {
        let mut item = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if id.is_temp() && !item.synced {
            self.store.delete(id).await?;
            self.store.cancel_ops_for(id.as_str()).await?;
            return Ok(());
        }

        if item.status == ItemStatus::Deleted && !item.synced {
            // A delete is already pending for this id; nothing new to record.
            return Ok(());
        }

        item.soft_delete(now_millis());
        self.store.put(&item).await?;

        if self.monitor.is_online() {
            match self.gateway.soft_delete(id).await {
                Ok(()) => {
                    self.store.delete(id).await?;
                    return Ok(());
                }
                Err(error) => {
                    tracing::debug!("delete not confirmed remotely, queueing: {error}");
                }
            }
        }

        self.store
            .enqueue(&Operation::Delete { id: id.clone() })
            .await?;
        Ok(())
    }

    /// Archive the active items of the current week.
    ///
    /// Returns the week key captured at call time together with the number
    /// of items archived.
    pub async fn archive_current_week(&self) -> Result<(WeekKey, usize)> {
        let week_of = WeekKey::current();
        let archived = self.archive_week(week_of).await?;
        Ok((week_of, archived))
    }

    /// Archive the active items of the given week.
    ///
    /// The remote bulk transition is parameterized by this week key, never
    /// recomputed at replay time.
    pub async fn archive_week(&self, week_of: WeekKey) -> Result<usize> {
        let now = now_millis();
        let mut archived = 0;
        for mut item in self.store.list_by_status(ItemStatus::Active).await? {
            if item.week_of != week_of {
                continue;
            }
            item.archive(now);
            self.store.put(&item).await?;
            archived += 1;
        }
        if archived == 0 {
            tracing::debug!("no active items for week {week_of}; nothing to archive");
            return Ok(0);
        }

        if self.monitor.is_online() {
            match self
                .gateway
                .bulk_transition_status(ItemStatus::Active, week_of, ItemStatus::Archived)
                .await
            {
                Ok(()) => {
                    self.mark_archived_week_synced(week_of).await?;
                    return Ok(archived);
                }
                Err(error) => {
                    tracing::debug!("archive not confirmed remotely, queueing: {error}");
                }
            }
        }

        self.store.enqueue(&Operation::Archive { week_of }).await?;
        Ok(archived)
    }

    /// Replay the operation queue against the gateway.
    ///
    /// At most one drain runs at a time; a trigger that lands during an
    /// active drain schedules a single follow-up pass and returns an empty
    /// report.
    pub async fn drain(&self) -> Result<DrainReport> {
        let Ok(_guard) = self.drain_gate.try_lock() else {
            self.drain_pending.store(true, Ordering::SeqCst);
            tracing::debug!("drain already in progress; follow-up scheduled");
            return Ok(DrainReport::default());
        };

        let mut report = self.drain_once().await?;
        while self.drain_pending.swap(false, Ordering::SeqCst) {
            let follow_up = self.drain_once().await?;
            report.synced += follow_up.synced;
            report.failed = follow_up.failed;
        }
        Ok(report)
    }

    /// Drain the queue, then replace local state with the authoritative
    /// active set for the current week.
    pub async fn full_sync(&self) -> Result<SyncReport> {
        let drained = self.drain().await?;

        let week_of = WeekKey::current();
        let remote = self
            .gateway
            .list(&ItemFilter::active_for_week(week_of))
            .await?;
        let items: Vec<Item> = remote.into_iter().map(Item::into_synced).collect();
        self.store.replace_all(&items).await?;

        tracing::info!(
            "full sync: {} replayed, {} pending, {} items refreshed for week {week_of}",
            drained.synced,
            drained.failed,
            items.len()
        );
        Ok(SyncReport {
            synced: drained.synced,
            failed: drained.failed,
            refreshed: items.len(),
        })
    }

    /// Drain the queue whenever the monitor transitions to online.
    ///
    /// Runs until the monitor is dropped; callers spawn it as a background
    /// task.
    pub async fn run_drain_on_reconnect(self: Arc<Self>) {
        let mut rx = self.monitor.subscribe();
        while rx.changed().await.is_ok() {
            // Only actual transitions are broadcast, so a `true` reading here
            // is an offline-to-online edge.
            if !*rx.borrow_and_update() {
                continue;
            }
            match self.drain().await {
                Ok(report) => {
                    tracing::info!(
                        "reconnect drain: {} synced, {} still pending",
                        report.synced,
                        report.failed
                    );
                }
                Err(error) => tracing::warn!("reconnect drain failed: {error}"),
            }
        }
    }

    /// One sequential pass over the queue in ascending queue-id order.
    ///
    /// The head is re-read from storage each step so that target rewrites
    /// performed by earlier creates are observed.
    async fn drain_once(&self) -> Result<DrainReport> {
        let mut synced = 0;
        while let Some(queued) = self.store.first_queued().await? {
            match self.replay(&queued.op).await {
                Ok(()) => {
                    self.store.dequeue(queued.queue_id).await?;
                    synced += 1;
                }
                Err(Error::Remote(error)) => {
                    let failed = self.store.queue_len().await?;
                    tracing::warn!(
                        "replay stopped at {} op {}: {error}",
                        queued.op.kind(),
                        queued.queue_id
                    );
                    return Ok(DrainReport { synced, failed });
                }
                Err(other) => return Err(other),
            }
        }
        Ok(DrainReport { synced, failed: 0 })
    }

    /// Issue the remote call for one queued operation and reconcile local
    /// state on success.
    async fn replay(&self, op: &Operation) -> Result<()> {
        match op {
            Operation::Create { temp_id, fields } => {
                let remote = self.gateway.create(fields).await?.into_synced();
                self.store.reconcile(temp_id, &remote).await?;
                let rewritten = self
                    .store
                    .rewrite_queue_target(temp_id, &remote.id)
                    .await?;
                if rewritten > 0 {
                    tracing::debug!(
                        "retargeted {rewritten} queued ops from {temp_id} to {}",
                        remote.id
                    );
                }
            }
            Operation::Update { id, patch } => {
                let remote = self.gateway.update(id, patch).await?.into_synced();
                self.store.put(&remote).await?;
            }
            Operation::Delete { id } => {
                self.gateway.soft_delete(id).await?;
                self.store.delete(id).await?;
            }
            Operation::Archive { week_of } => {
                self.gateway
                    .bulk_transition_status(ItemStatus::Active, *week_of, ItemStatus::Archived)
                    .await?;
                self.mark_archived_week_synced(*week_of).await?;
            }
        }
        Ok(())
    }

    async fn mark_archived_week_synced(&self, week_of: WeekKey) -> Result<()> {
        for item in self.store.list_by_status(ItemStatus::Archived).await? {
            if item.week_of == week_of && !item.synced {
                self.store.put(&item.into_synced()).await?;
            }
        }
        Ok(())
    }
}
