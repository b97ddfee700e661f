//! Per-component sync coordinator.

use crate::component::{ConflictResolution, SyncComponent};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::{FlushTicket, IngestReport, SyncCycleResult, SyncState, SyncStats};
use crate::transport::SyncTransport;
use std::collections::HashSet;
use std::time::Instant;
use tether_core::crypto::FieldCipher;
use tether_core::{ConflictRule, IndexAnomaly, LookupKey, RuleSet, SyncItem, UpdateQueue};
use tether_sync_protocol::{Batch, PushAck, RecordWriter};
use tracing::{debug, info, warn};

struct InFlight {
    id: u64,
    batch: UpdateQueue,
}

/// Drives one component's queue, conflict indices, and cipher against a
/// transport.
///
/// Everything here runs on the caller's thread. A flush may be in flight
/// (between [`begin_flush`](Self::begin_flush) and
/// [`complete_flush`](Self::complete_flush) or
/// [`abort_flush`](Self::abort_flush)) while new local changes keep
/// arriving; those are queued behind it, never blocked.
pub struct SyncCoordinator<C: SyncComponent, T: SyncTransport> {
    config: SyncConfig,
    component: C,
    transport: T,
    cipher: Option<FieldCipher>,
    queue: UpdateQueue,
    rules: RuleSet,
    unconfirmed: HashSet<LookupKey>,
    in_flight: Option<InFlight>,
    // In-flight keys removed or replaced since their batch was taken.
    superseded: HashSet<LookupKey>,
    next_flush_id: u64,
    state: SyncState,
    stats: SyncStats,
}

impl<C: SyncComponent, T: SyncTransport> SyncCoordinator<C, T> {
    /// Creates a coordinator with no conflict rules and no cipher.
    pub fn new(config: SyncConfig, component: C, transport: T) -> Self {
        Self {
            config,
            component,
            transport,
            cipher: None,
            queue: UpdateQueue::new(),
            rules: RuleSet::new(),
            unconfirmed: HashSet::new(),
            in_flight: None,
            superseded: HashSet::new(),
            next_flush_id: 0,
            state: SyncState::Idle,
            stats: SyncStats::default(),
        }
    }

    /// Sets the cipher used for sensitive properties.
    pub fn with_cipher(mut self, cipher: FieldCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Adds a conflict rule.
    pub fn with_rule(mut self, rule: ConflictRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Running statistics.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// The component.
    pub fn component(&self) -> &C {
        &self.component
    }

    /// Mutable access to the component, for local edits.
    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Pending local changes, not counting an in-flight batch.
    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    /// The conflict indices.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns true while a flush is in flight.
    pub fn is_flushing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns true if no local change to `key` awaits a successful flush.
    pub fn is_confirmed(&self, key: &LookupKey) -> bool {
        !self.unconfirmed.contains(key)
    }

    /// Keys with local changes the server has not acknowledged.
    pub fn unconfirmed_keys(&self) -> impl Iterator<Item = &LookupKey> {
        self.unconfirmed.iter()
    }

    /// Records a local change, overlaying it onto any pending change.
    ///
    /// `previous` is the item's state before the change (`None` for a new
    /// item) and `item` its full new state. Returns the anomalies found
    /// while moving its fingerprints.
    pub fn record_change(
        &mut self,
        previous: Option<&SyncItem>,
        item: SyncItem,
    ) -> SyncResult<Vec<IndexAnomaly>> {
        self.record(previous, item, false)
    }

    /// Records a local change that replaces any pending change outright.
    pub fn record_replacement(
        &mut self,
        previous: Option<&SyncItem>,
        item: SyncItem,
    ) -> SyncResult<Vec<IndexAnomaly>> {
        self.record(previous, item, true)
    }

    fn record(
        &mut self,
        previous: Option<&SyncItem>,
        item: SyncItem,
        replace: bool,
    ) -> SyncResult<Vec<IndexAnomaly>> {
        self.check_component(&item)?;

        let anomalies = match previous {
            Some(previous) => self.rules.update_fingerprints(previous, &item),
            None if item.is_remove() => Vec::new(),
            None => self.rules.register(&item),
        };
        self.stats.anomalies_reported += anomalies.len() as u64;

        let key = item.lookup_key().clone();
        if replace || item.is_remove() {
            if let Some(in_flight) = &self.in_flight {
                if in_flight.batch.contains(&key) {
                    self.superseded.insert(key.clone());
                }
            }
        }
        let changed = if replace {
            self.queue.replace_item(item)
        } else {
            self.queue.add_item(item)
        };
        debug!(%key, changed, replace, "recorded local change");
        self.unconfirmed.insert(key);
        Ok(anomalies)
    }

    fn check_component(&self, item: &SyncItem) -> SyncResult<()> {
        if item.component_id() == self.config.component_id {
            Ok(())
        } else {
            Err(SyncError::WrongComponent {
                expected: self.config.component_id.clone(),
                found: item.component_id().to_string(),
            })
        }
    }

    /// Takes the oldest pending changes, up to the push batch size, and
    /// encodes them.
    ///
    /// Returns `None` when nothing is pending. The batch stays in flight
    /// until the ticket is completed or aborted.
    pub fn begin_flush(&mut self) -> SyncResult<Option<FlushTicket>> {
        if let Some(in_flight) = &self.in_flight {
            return Err(SyncError::FlushInFlight { id: in_flight.id });
        }
        if !self.queue.has_pending() {
            return Ok(None);
        }

        let batch = self.queue.take_batch(self.config.push_batch_size);
        let encoded = {
            let writer = RecordWriter::new(self.cipher.as_ref(), &self.component);
            Batch::from_queue(&batch).to_body(&writer)
        };
        let body = match encoded {
            Ok(body) => body,
            Err(error) => {
                self.restore(batch);
                return Err(error.into());
            }
        };

        self.next_flush_id += 1;
        let id = self.next_flush_id;
        let items = batch.pending_size();
        info!(component = %self.config.component_id, id, items, "flush started");
        self.in_flight = Some(InFlight { id, batch });
        Ok(Some(FlushTicket { id, body, items }))
    }

    /// Settles a flush the server accepted.
    ///
    /// Keys changed again since the flush began stay unconfirmed. Returns
    /// the number of items flushed.
    pub fn complete_flush(&mut self, id: u64) -> SyncResult<usize> {
        let batch = self.take_in_flight(id)?;
        self.superseded.clear();
        for key in batch.keys() {
            if !self.queue.contains(key) {
                self.unconfirmed.remove(key);
            }
        }

        let items = batch.pending_size();
        self.stats.items_pushed += items as u64;
        info!(component = %self.config.component_id, id, items, "flush completed");
        Ok(items)
    }

    /// Puts an unsent or rejected batch back into the queue.
    ///
    /// The batch goes underneath any change recorded since it was taken,
    /// so newer changes still win. Items removed or replaced since then are
    /// dropped from the batch rather than merged. Returns the number of
    /// items in the aborted batch.
    pub fn abort_flush(&mut self, id: u64) -> SyncResult<usize> {
        let batch = self.take_in_flight(id)?;
        let items = batch.pending_size();
        self.restore(batch);
        self.stats.flushes_aborted += 1;
        warn!(component = %self.config.component_id, id, items, "flush aborted, batch re-queued");
        Ok(items)
    }

    fn take_in_flight(&mut self, id: u64) -> SyncResult<UpdateQueue> {
        match self.in_flight.take() {
            Some(in_flight) if in_flight.id == id => Ok(in_flight.batch),
            other => {
                self.in_flight = other;
                Err(SyncError::UnknownFlush { id })
            }
        }
    }

    fn restore(&mut self, mut batch: UpdateQueue) {
        for key in self.superseded.drain() {
            batch.delete_item_by_lookup_key(&key);
        }
        let newer = std::mem::replace(&mut self.queue, batch);
        self.queue.append(newer);
    }

    /// Pushes every pending change, one batch at a time.
    ///
    /// A failed or rejected batch is aborted and the error returned.
    /// Returns the number of items pushed.
    pub fn flush(&mut self) -> SyncResult<usize> {
        let mut pushed = 0;
        while let Some(count) = self.push_next_batch()? {
            pushed += count;
        }
        Ok(pushed)
    }

    fn push_next_batch(&mut self) -> SyncResult<Option<usize>> {
        let Some(ticket) = self.begin_flush()? else {
            return Ok(None);
        };

        let outcome = self
            .transport
            .push(&ticket.body)
            .and_then(|body| PushAck::parse(&body).map_err(SyncError::from));
        match outcome {
            Ok(ack) if ack.is_ok() => self.complete_flush(ticket.id).map(Some),
            Ok(ack) => {
                self.abort_flush(ticket.id)?;
                Err(SyncError::ServerError(
                    ack.error.unwrap_or_else(|| "push rejected".into()),
                ))
            }
            Err(error) => {
                self.abort_flush(ticket.id)?;
                Err(error)
            }
        }
    }

    /// Flushes, retrying transient failures per the retry configuration.
    ///
    /// Returns the number of items pushed across all attempts.
    pub fn flush_with_retry(&mut self) -> SyncResult<usize> {
        let before = self.stats.items_pushed;
        self.with_retry(|this| this.flush())?;
        Ok((self.stats.items_pushed - before) as usize)
    }

    /// Pulls server changes and ingests them.
    pub fn pull(&mut self) -> SyncResult<IngestReport> {
        let body = self.transport.pull()?;
        self.ingest(&body)
    }

    /// Applies a batch of server changes to the component.
    ///
    /// Each item is checked against the conflict indices first. On a
    /// collision the component chooses to keep its local item or accept
    /// the remote one; accepted items are applied and indexed. Unreadable
    /// records and sealed fields are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Fails on a bad batch header or if the component fails to apply an
    /// item. Items applied before the failure stay applied.
    pub fn ingest(&mut self, body: &str) -> SyncResult<IngestReport> {
        let mut report = IngestReport::default();
        if body.trim().is_empty() {
            return Ok(report);
        }

        let decoded = Batch::from_body(body, self.cipher.as_ref())?;
        report.skipped = decoded.skipped;
        report.unreadable = decoded.unreadable;

        let mut result = Ok(());
        for item in decoded.items {
            if item.component_id() != self.config.component_id {
                warn!(
                    expected = %self.config.component_id,
                    key = %item.lookup_key(),
                    "skipping item of another component"
                );
                report.skipped += 1;
                continue;
            }
            result = self.apply_remote(item, &mut report);
            if result.is_err() {
                break;
            }
        }

        self.stats.items_pulled += report.applied as u64;
        self.stats.conflicts_encountered += report.conflicts.len() as u64;
        self.stats.anomalies_reported += report.anomalies.len() as u64;
        self.stats.unreadable_fields += report.unreadable.len() as u64;
        result.map(|()| report)
    }

    fn apply_remote(&mut self, incoming: SyncItem, report: &mut IngestReport) -> SyncResult<()> {
        let key = incoming.lookup_key().clone();

        let conflicts = self.rules.find_conflicts(&incoming);
        let mut owners: Vec<(LookupKey, Option<SyncItem>)> = Vec::new();
        let mut keep_local = false;
        for conflict in &conflicts {
            match self.component.resolve_conflict(&incoming, conflict) {
                ConflictResolution::KeepLocal => keep_local = true,
                ConflictResolution::AcceptRemote => {
                    if !owners.iter().any(|(owner, _)| *owner == conflict.owner) {
                        let before = self.component.current_item(&conflict.owner);
                        owners.push((conflict.owner.clone(), before));
                    }
                }
            }
        }
        report.conflicts.extend(conflicts);
        if keep_local {
            debug!(%key, "component kept its local item");
            report.kept_local += 1;
            return Ok(());
        }

        let previous = self.component.current_item(&key);
        if let Some(previous) = &previous {
            self.rules.reconcile_pending_update(previous, &incoming);
        }
        if let Err(error) = self.component.apply_incoming(&incoming) {
            if let Some(previous) = &previous {
                report.anomalies.extend(self.rules.register(previous));
            }
            return Err(error);
        }

        // The component may have edited or deleted the items it collided with.
        for (owner, before) in owners {
            let Some(before) = before else {
                continue;
            };
            match self.component.current_item(&owner) {
                Some(after) => report
                    .anomalies
                    .extend(self.rules.update_fingerprints(&before, &after)),
                None => self.rules.unregister(&before),
            }
        }

        if let Some(previous) = &previous {
            self.rules.unregister(previous);
        }
        if let Some(applied) = self.component.current_item(&key) {
            report.anomalies.extend(self.rules.register(&applied));
        }
        report.applied += 1;
        Ok(())
    }

    /// Performs a full sync cycle: pull then push.
    pub fn sync(&mut self) -> SyncResult<SyncCycleResult> {
        let start = Instant::now();
        if let Some(in_flight) = &self.in_flight {
            return Err(SyncError::FlushInFlight { id: in_flight.id });
        }

        self.state = SyncState::Connecting;
        if !self.transport.is_connected() {
            return self.fail(SyncError::NotConnected);
        }

        self.state = SyncState::Pulling;
        let ingest = match self.pull() {
            Ok(report) => report,
            Err(error) => return self.fail(error),
        };

        self.state = SyncState::Pushing;
        let pushed = match self.flush() {
            Ok(pushed) => pushed,
            Err(error) => return self.fail(error),
        };

        self.state = SyncState::Synced;
        self.stats.cycles_completed += 1;
        self.stats.last_sync_time = Some(Instant::now());
        self.stats.last_error = None;
        info!(
            component = %self.config.component_id,
            pulled = ingest.applied,
            pushed,
            "sync cycle completed"
        );

        Ok(SyncCycleResult {
            ingest,
            pushed,
            duration: start.elapsed(),
        })
    }

    /// Performs a sync with retry on transient errors.
    pub fn sync_with_retry(&mut self) -> SyncResult<SyncCycleResult> {
        self.with_retry(|this| this.sync())
    }

    fn with_retry<R>(&mut self, mut op: impl FnMut(&mut Self) -> SyncResult<R>) -> SyncResult<R> {
        let retry = self.config.retry.clone();
        let mut attempt = 0;
        loop {
            match op(&mut *self) {
                Ok(result) => return Ok(result),
                Err(error) if error.is_retryable() && attempt + 1 < retry.max_attempts => {
                    attempt += 1;
                    self.state = SyncState::RetryWait;
                    self.stats.retries += 1;
                    warn!(attempt, %error, "retrying after transient failure");
                    std::thread::sleep(retry.delay_for_attempt(attempt));
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn fail<R>(&mut self, error: SyncError) -> SyncResult<R> {
        self.state = SyncState::Error;
        self.stats.last_error = Some(error.to_string());
        Err(error)
    }

    /// Rebuilds the conflict indices from the component's live items.
    pub fn rebuild_indices(&mut self) -> Vec<IndexAnomaly> {
        let items = self.component.live_items();
        let anomalies = self.rules.rebuild(&items);
        self.stats.anomalies_reported += anomalies.len() as u64;
        anomalies
    }

    /// Evicts fingerprints of items the component no longer has.
    ///
    /// Returns the number of evicted entries.
    pub fn sweep_indices(&mut self) -> usize {
        let component = &self.component;
        self.rules
            .sweep(|key| component.current_item(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::MemoryComponent;
    use crate::config::RetryConfig;
    use crate::transport::MockTransport;
    use std::time::Duration;
    use tether_core::FingerprintConflict;
    use tether_sync_protocol::FieldPolicy;

    const ACK_OK: &str = "status:2:ok\n";

    fn bookmark(id: &str, url: &str) -> SyncItem {
        SyncItem::new("bookmarks", None, id)
            .unwrap()
            .with_property("url", url)
    }

    fn coordinator() -> SyncCoordinator<MemoryComponent, MockTransport> {
        let transport = MockTransport::new();
        transport.set_push_response(ACK_OK);
        let config = SyncConfig::new("bookmarks").with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::ZERO)
                .with_jitter(false),
        );
        SyncCoordinator::new(config, MemoryComponent::new(), transport)
            .with_rule(ConflictRule::new("url", ["url"]))
    }

    #[test]
    fn initial_state() {
        let coordinator = coordinator();
        assert_eq!(coordinator.state(), SyncState::Idle);
        assert_eq!(coordinator.stats().cycles_completed, 0);
        assert!(!coordinator.is_flushing());
    }

    #[test]
    fn record_change_collapses_and_indexes() {
        let mut coordinator = coordinator();
        let first = bookmark("1", "http://a");
        coordinator.record_change(None, first.clone()).unwrap();
        let second = bookmark("1", "http://b");
        coordinator.record_change(Some(&first), second.clone()).unwrap();

        assert_eq!(coordinator.queue().pending_size(), 1);
        let rule = coordinator.rules().get("url").unwrap();
        assert!(!rule.has_fingerprint("http://a"));
        assert_eq!(rule.lookup_key_for("http://b"), Some(second.lookup_key()));
        assert!(!coordinator.is_confirmed(second.lookup_key()));
    }

    #[test]
    fn record_change_reports_collision() {
        let mut coordinator = coordinator();
        coordinator
            .record_change(None, bookmark("1", "http://x"))
            .unwrap();
        let anomalies = coordinator
            .record_change(None, bookmark("2", "http://x"))
            .unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(coordinator.stats().anomalies_reported, 1);
    }

    #[test]
    fn foreign_item_is_rejected() {
        let mut coordinator = coordinator();
        let item = SyncItem::new("history", None, "1").unwrap();
        assert!(matches!(
            coordinator.record_change(None, item),
            Err(SyncError::WrongComponent { .. })
        ));
    }

    #[test]
    fn only_one_flush_in_flight() {
        let mut coordinator = coordinator();
        coordinator
            .record_change(None, bookmark("1", "http://a"))
            .unwrap();
        let ticket = coordinator.begin_flush().unwrap().unwrap();
        assert_eq!(ticket.items, 1);
        assert!(ticket.body.starts_with("version:1:4\ncount:1:1\n"));

        assert!(matches!(
            coordinator.begin_flush(),
            Err(SyncError::FlushInFlight { id }) if id == ticket.id
        ));
        assert!(matches!(
            coordinator.complete_flush(ticket.id + 1),
            Err(SyncError::UnknownFlush { .. })
        ));
        assert!(coordinator.is_flushing());
    }

    #[test]
    fn complete_flush_confirms_untouched_keys() {
        let mut coordinator = coordinator();
        let a = bookmark("a", "http://a");
        let b = bookmark("b", "http://b");
        coordinator.record_change(None, a.clone()).unwrap();
        coordinator.record_change(None, b.clone()).unwrap();

        let ticket = coordinator.begin_flush().unwrap().unwrap();
        let b2 = bookmark("b", "http://b2");
        coordinator.record_change(Some(&b), b2.clone()).unwrap();

        assert_eq!(coordinator.complete_flush(ticket.id).unwrap(), 2);
        assert!(coordinator.is_confirmed(a.lookup_key()));
        assert!(!coordinator.is_confirmed(b.lookup_key()));
        assert_eq!(coordinator.queue().get_pending(), vec![b2]);
    }

    #[test]
    fn abort_flush_remerges_under_newer_changes() {
        let mut coordinator = coordinator();
        let a = bookmark("a", "http://a").with_property("title", "A");
        let b = bookmark("b", "http://b");
        coordinator.record_change(None, a.clone()).unwrap();
        coordinator.record_change(None, b.clone()).unwrap();

        let ticket = coordinator.begin_flush().unwrap().unwrap();
        assert!(!coordinator.queue().has_pending());

        let c = bookmark("c", "http://c");
        coordinator.record_change(None, c.clone()).unwrap();
        let a2 = bookmark("a", "http://a2");
        coordinator.record_change(Some(&a), a2).unwrap();

        assert_eq!(coordinator.abort_flush(ticket.id).unwrap(), 2);
        let keys: Vec<&str> = coordinator
            .queue()
            .iter()
            .map(|item| item.item_id())
            .collect();
        assert_eq!(keys, ["a", "b", "c"]);

        let merged = coordinator.queue().get_item_by_lookup_key(a.lookup_key()).unwrap();
        assert_eq!(merged.property("url"), Some("http://a2"));
        assert_eq!(merged.property("title"), Some("A"));
        assert!(!coordinator.is_confirmed(b.lookup_key()));
        assert_eq!(coordinator.stats().flushes_aborted, 1);
    }

    #[test]
    fn flush_pushes_in_batches() {
        let transport = MockTransport::new();
        transport.set_push_response(ACK_OK);
        let config = SyncConfig::new("bookmarks").with_push_batch_size(2);
        let mut coordinator = SyncCoordinator::new(config, MemoryComponent::new(), transport);
        for id in ["1", "2", "3"] {
            coordinator
                .record_change(None, bookmark(id, &format!("http://{id}")))
                .unwrap();
        }

        assert_eq!(coordinator.flush().unwrap(), 3);
        let bodies = coordinator.transport().pushed_bodies();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("count:1:2\n"));
        assert!(bodies[1].contains("count:1:1\n"));
        assert_eq!(coordinator.unconfirmed_keys().count(), 0);
    }

    #[test]
    fn rejected_push_requeues() {
        let mut coordinator = coordinator();
        coordinator
            .transport()
            .set_push_response("status:5:error\nerror:10:over quota\n");
        coordinator
            .record_change(None, bookmark("1", "http://a"))
            .unwrap();

        let err = coordinator.flush().unwrap_err();
        assert!(matches!(err, SyncError::ServerError(ref message) if message == "over quota"));
        assert_eq!(coordinator.queue().pending_size(), 1);
        assert!(!coordinator.is_flushing());
    }

    #[test]
    fn flush_with_retry_recovers() {
        let mut coordinator = coordinator();
        coordinator.transport().fail_next_push(SyncError::Timeout);
        coordinator
            .record_change(None, bookmark("1", "http://a"))
            .unwrap();

        assert_eq!(coordinator.flush_with_retry().unwrap(), 1);
        assert_eq!(coordinator.stats().retries, 1);
        let bodies = coordinator.transport().pushed_bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
        assert!(!coordinator.queue().has_pending());
    }

    #[test]
    fn fatal_push_error_is_not_retried() {
        let mut coordinator = coordinator();
        coordinator
            .transport()
            .fail_next_push(SyncError::transport_fatal("bad certificate"));
        coordinator
            .record_change(None, bookmark("1", "http://a"))
            .unwrap();

        assert!(coordinator.flush_with_retry().is_err());
        assert_eq!(coordinator.stats().retries, 0);
        assert_eq!(coordinator.queue().pending_size(), 1);
    }

    #[test]
    fn ingest_applies_and_indexes() {
        let mut coordinator = coordinator();
        let body = "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:1\n0.p.url:8:http://a\n";

        let report = coordinator.ingest(body).unwrap();
        assert_eq!(report.applied, 1);
        assert!(report.conflicts.is_empty());

        let key = LookupKey::new("bookmarks", None, "1").unwrap();
        assert!(coordinator.component().get(&key).is_some());
        assert_eq!(
            coordinator.rules().get("url").unwrap().lookup_key_for("http://a"),
            Some(&key)
        );
    }

    #[test]
    fn ingest_update_moves_own_fingerprint() {
        let mut coordinator = coordinator();
        let local = bookmark("1", "http://a");
        coordinator.component_mut().insert(local.clone());
        coordinator.rebuild_indices();

        let body = "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:1\n0.p.url:8:http://b\n";
        let report = coordinator.ingest(body).unwrap();
        assert!(report.conflicts.is_empty());
        assert!(report.anomalies.is_empty());

        let rule = coordinator.rules().get("url").unwrap();
        assert!(!rule.has_fingerprint("http://a"));
        assert!(rule.has_fingerprint("http://b"));
    }

    #[test]
    fn ingest_removal_evicts_fingerprint() {
        let mut coordinator = coordinator();
        coordinator.component_mut().insert(bookmark("1", "http://a"));
        coordinator.rebuild_indices();

        let body = "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:1\n0.remove:1:1\n";
        coordinator.ingest(body).unwrap();
        assert!(coordinator.component().is_empty());
        assert!(coordinator.rules().get("url").unwrap().is_empty());
    }

    #[test]
    fn ingest_conflict_keep_local() {
        let mut coordinator = coordinator();
        *coordinator.component_mut() =
            MemoryComponent::new().with_resolution(ConflictResolution::KeepLocal);
        coordinator.component_mut().insert(bookmark("1", "http://x"));
        coordinator.rebuild_indices();

        let body = "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:2\n0.p.url:8:http://x\n";
        let report = coordinator.ingest(body).unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.kept_local, 1);
        assert_eq!(report.applied, 0);
        assert_eq!(coordinator.component().len(), 1);
        assert_eq!(coordinator.component().conflicts_seen().len(), 1);
    }

    #[test]
    fn ingest_conflict_accept_remote_reports_anomaly() {
        let mut coordinator = coordinator();
        let owner = bookmark("1", "http://x");
        coordinator.component_mut().insert(owner.clone());
        coordinator.rebuild_indices();

        let body = "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:2\n0.p.url:8:http://x\n";
        let report = coordinator.ingest(body).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(
            coordinator.rules().get("url").unwrap().lookup_key_for("http://x"),
            Some(owner.lookup_key())
        );
    }

    #[test]
    fn empty_pull_is_a_no_op() {
        let mut coordinator = coordinator();
        let report = coordinator.pull().unwrap();
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn ingest_skips_foreign_items() {
        let mut coordinator = coordinator();
        let body = "version:1:4\ncount:1:1\n0.component:7:history\n0.item:1:1\n";
        let report = coordinator.ingest(body).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.applied, 0);
    }

    #[test]
    fn sync_pulls_then_pushes() {
        let mut coordinator = coordinator();
        coordinator.transport().set_pull_response(
            "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:r\n0.p.url:8:http://r\n",
        );
        coordinator
            .record_change(None, bookmark("l", "http://l"))
            .unwrap();

        let result = coordinator.sync().unwrap();
        assert_eq!(result.ingest.applied, 1);
        assert_eq!(result.pushed, 1);
        assert_eq!(coordinator.state(), SyncState::Synced);
        assert_eq!(coordinator.stats().cycles_completed, 1);
        assert_eq!(coordinator.stats().items_pulled, 1);
        assert_eq!(coordinator.stats().items_pushed, 1);
    }

    #[test]
    fn sync_not_connected() {
        let mut coordinator = coordinator();
        coordinator.transport().set_connected(false);
        assert!(matches!(coordinator.sync(), Err(SyncError::NotConnected)));
        assert_eq!(coordinator.state(), SyncState::Error);
        assert!(coordinator.stats().last_error.is_some());
    }

    #[test]
    fn sweep_evicts_items_deleted_behind_our_back() {
        let mut coordinator = coordinator();
        let gone = bookmark("1", "http://a");
        coordinator.component_mut().insert(gone.clone());
        coordinator.component_mut().insert(bookmark("2", "http://b"));
        assert!(coordinator.rebuild_indices().is_empty());

        coordinator.component_mut().remove(gone.lookup_key());
        assert_eq!(coordinator.sweep_indices(), 1);
        assert_eq!(coordinator.rules().get("url").unwrap().len(), 1);
    }

    #[test]
    fn abort_drops_batch_entries_removed_since() {
        let mut coordinator = coordinator();
        let a = bookmark("a", "http://a").with_property("title", "A");
        coordinator.record_change(None, a.clone()).unwrap();
        let ticket = coordinator.begin_flush().unwrap().unwrap();

        let removal = SyncItem::removal(a.lookup_key().clone());
        coordinator.record_change(Some(&a), removal).unwrap();
        let again = bookmark("a", "http://a2");
        coordinator.record_change(None, again.clone()).unwrap();

        coordinator.abort_flush(ticket.id).unwrap();
        assert_eq!(coordinator.queue().get_pending(), vec![again]);
    }

    #[test]
    fn abort_drops_batch_entries_replaced_since() {
        let mut coordinator = coordinator();
        let a = bookmark("a", "http://a").with_property("title", "A");
        let b = bookmark("b", "http://b");
        coordinator.record_change(None, a.clone()).unwrap();
        coordinator.record_change(None, b.clone()).unwrap();
        let ticket = coordinator.begin_flush().unwrap().unwrap();

        let replacement = bookmark("a", "http://a2");
        coordinator
            .record_replacement(Some(&a), replacement.clone())
            .unwrap();

        assert_eq!(coordinator.abort_flush(ticket.id).unwrap(), 2);
        assert_eq!(coordinator.queue().get_pending(), vec![b, replacement]);
    }

    #[test]
    fn delimiters_in_property_names_do_not_block_the_queue() {
        let mut coordinator = coordinator();
        coordinator
            .record_change(None, bookmark("good", "http://good"))
            .unwrap();
        let odd = bookmark("odd", "http://odd")
            .with_property("a:b", "1")
            .with_property("two\nlines", "2");
        coordinator.record_change(None, odd.clone()).unwrap();

        assert_eq!(coordinator.flush().unwrap(), 2);
        assert!(!coordinator.queue().has_pending());
        let bodies = coordinator.transport().pushed_bodies();
        let decoded = Batch::from_body(&bodies[0], None).unwrap();
        assert_eq!(decoded.items[1], odd);
    }

    struct BrokenStore(MemoryComponent);

    impl FieldPolicy for BrokenStore {
        fn is_sensitive(&self, _key: &LookupKey, _property: &str) -> bool {
            false
        }
    }

    impl SyncComponent for BrokenStore {
        fn current_item(&self, key: &LookupKey) -> Option<SyncItem> {
            self.0.current_item(key)
        }

        fn apply_incoming(&mut self, _item: &SyncItem) -> SyncResult<()> {
            Err(SyncError::Component("disk full".into()))
        }

        fn resolve_conflict(
            &mut self,
            incoming: &SyncItem,
            conflict: &FingerprintConflict,
        ) -> ConflictResolution {
            self.0.resolve_conflict(incoming, conflict)
        }

        fn live_items(&self) -> Vec<SyncItem> {
            self.0.live_items()
        }
    }

    #[test]
    fn failed_apply_keeps_local_fingerprint() {
        let local = bookmark("1", "http://a");
        let mut store = MemoryComponent::new();
        store.insert(local.clone());
        let mut coordinator = SyncCoordinator::new(
            SyncConfig::new("bookmarks"),
            BrokenStore(store),
            MockTransport::new(),
        )
        .with_rule(ConflictRule::new("url", ["url"]));
        coordinator.rebuild_indices();

        let body = "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:1\n0.p.url:8:http://b\n";
        let err = coordinator.ingest(body).unwrap_err();
        assert!(matches!(err, SyncError::Component(_)));

        let rule = coordinator.rules().get("url").unwrap();
        assert_eq!(rule.lookup_key_for("http://a"), Some(local.lookup_key()));
        assert!(!rule.has_fingerprint("http://b"));
    }
}
