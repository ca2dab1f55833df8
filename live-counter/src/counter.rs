//! The live unread-message counter.
//!
//! A mounted counter owns one tokio task. The task issues the authoritative
//! fetch and opens the push subscription at the same time and applies
//! whichever lands first against the current value; there is no ordering
//! between the two. Transient inconsistency (a redelivered insert, an insert
//! racing the mount fetch) is corrected by the next reconciliation, which any
//! `Updated` change triggers.

use crate::count_source::CountSource;
use crate::error::Error;
use crate::push_channel::{PushChannel, Subscription};
use events::{ChangeEvent, ChangeFilter, ChangeKind, Id};
use futures_util::stream::{FuturesUnordered, StreamExt};
use log::*;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// What a change event asks of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Incremented,
    Ignored,
    /// Fetch the authoritative count and replace the local value with it.
    Reconcile,
}

/// The count itself and the rules for changing it. No I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadCount {
    subject_id: Id,
    value: u64,
}

impl UnreadCount {
    pub fn new(subject_id: Id, value: u64) -> Self {
        Self { subject_id, value }
    }

    pub fn subject_id(&self) -> Id {
        self.subject_id
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Messages the subject sent are never unread from its own point of view.
    /// Updates are not decremented locally; the caller re-fetches instead.
    pub fn apply(&mut self, event: &ChangeEvent) -> Reaction {
        match event {
            ChangeEvent::Inserted(row) if row.sender_id != self.subject_id => {
                self.value = self.value.saturating_add(1);
                Reaction::Incremented
            }
            ChangeEvent::Inserted(_) => Reaction::Ignored,
            ChangeEvent::Updated(_) => Reaction::Reconcile,
        }
    }

    pub fn reconcile(&mut self, authoritative: u64) {
        self.value = authoritative;
    }
}

/// Handle to a mounted counter.
///
/// Dropping the handle tears the counter down as well; `unmount` additionally
/// waits until the subscription has been released.
pub struct LiveCounter {
    count: watch::Receiver<u64>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LiveCounter {
    pub fn mount(
        subject_id: Id,
        source: Arc<dyn CountSource>,
        channel: Arc<dyn PushChannel>,
    ) -> Self {
        Self::mount_with(subject_id, source, channel, 0)
    }

    /// Mounts with `initial` shown until the first fetch lands, e.g. the value
    /// a previous instance displayed.
    pub fn mount_with(
        subject_id: Id,
        source: Arc<dyn CountSource>,
        channel: Arc<dyn PushChannel>,
        initial: u64,
    ) -> Self {
        let (count_tx, count_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run(
            UnreadCount::new(subject_id, initial),
            source,
            channel,
            count_tx,
            shutdown_rx,
        ));

        Self {
            count: count_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.count.clone()
    }

    /// Stops the counter. Once this returns the subscription is closed and no
    /// in-flight fetch can change the count any more.
    pub async fn unmount(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Live counter task ended abnormally: {e}");
            }
        }
    }
}

async fn run(
    mut unread: UnreadCount,
    source: Arc<dyn CountSource>,
    channel: Arc<dyn PushChannel>,
    count_tx: watch::Sender<u64>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let subject_id = unread.subject_id();
    let filter = ChangeFilter::new(vec![ChangeKind::Inserted, ChangeKind::Updated]);

    let mut fetches = FuturesUnordered::new();
    fetches.push(source.fetch_unread_count(subject_id));

    let mut pending_subscription = Some(channel.subscribe(&filter));
    let mut subscription: Option<Subscription> = None;

    debug!("Live counter mounted for subject {subject_id}");

    loop {
        tokio::select! {
            // Fires on unmount and when the handle is dropped.
            _ = &mut shutdown => break,

            Some(result) = fetches.next(), if !fetches.is_empty() => match result {
                Ok(count) => {
                    unread.reconcile(count);
                    count_tx.send_replace(unread.value());
                }
                Err(e) => warn!("Keeping unread count at {}: {e}", unread.value()),
            },

            result = until_ready(&mut pending_subscription) => {
                pending_subscription = None;
                match result {
                    Ok(opened) => subscription = Some(opened),
                    Err(e) => warn!("Live updates unavailable, count reflects fetches only: {e}"),
                }
            }

            event = next_change(&mut subscription) => match event {
                Some(event) => match unread.apply(&event) {
                    Reaction::Incremented => {
                        count_tx.send_replace(unread.value());
                    }
                    Reaction::Reconcile => {
                        fetches.push(source.fetch_unread_count(subject_id));
                    }
                    Reaction::Ignored => trace!("Ignoring self-authored message {}", event.row().id),
                },
                None => {
                    warn!("{}", Error::subscription_dropped());
                    subscription = None;
                }
            },
        }
    }

    if let Some(subscription) = subscription.take() {
        subscription.unsubscribe();
    }
    debug!("Live counter unmounted for subject {subject_id}");
}

/// Resolves with the future's output, or never when there is no future.
async fn until_ready<F>(future: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match future {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use events::MessageRow;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    enum Fetch {
        Value(u64),
        Fail,
        Gated(oneshot::Receiver<u64>),
    }

    /// Plays back queued fetch results; an empty queue answers `fallback`.
    struct FakeSource {
        steps: Mutex<VecDeque<Fetch>>,
        fallback: u64,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(steps: Vec<Fetch>, fallback: u64) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                fallback,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CountSource for FakeSource {
        async fn fetch_unread_count(&self, _subject_id: Id) -> Result<u64, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Fetch::Value(count)) => Ok(count),
                Some(Fetch::Fail) => Err(Error::fetch_failed("backend unavailable")),
                Some(Fetch::Gated(rx)) => rx.await.map_err(|_| Error::fetch_failed("gate dropped")),
                None => Ok(self.fallback),
            }
        }
    }

    /// Hands every subscriber a fresh feed and tracks how many are open.
    struct FakeChannel {
        feeds: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
        active: Arc<AtomicUsize>,
        fail: bool,
    }

    impl FakeChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                feeds: Mutex::new(Vec::new()),
                active: Arc::new(AtomicUsize::new(0)),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                feeds: Mutex::new(Vec::new()),
                active: Arc::new(AtomicUsize::new(0)),
                fail: true,
            })
        }

        fn active(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }

        fn push(&self, event: ChangeEvent) {
            for feed in self.feeds.lock().unwrap().iter() {
                let _ = feed.send(event.clone());
            }
        }

        fn close_feeds(&self) {
            self.feeds.lock().unwrap().clear();
        }

        async fn wait_for_active(&self, expected: usize) {
            timeout(WAIT, async {
                while self.active() != expected {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("subscription count never settled");
        }
    }

    #[async_trait]
    impl PushChannel for FakeChannel {
        async fn subscribe(&self, _filter: &ChangeFilter) -> Result<Subscription, Error> {
            if self.fail {
                return Err(Error::subscription_failed("feed offline"));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            self.feeds.lock().unwrap().push(tx);
            self.active.fetch_add(1, Ordering::SeqCst);
            let active = self.active.clone();
            Ok(Subscription::new(rx, move || {
                active.fetch_sub(1, Ordering::SeqCst);
            }))
        }
    }

    fn inserted(sender_id: Id, receiver_id: Id) -> ChangeEvent {
        ChangeEvent::Inserted(MessageRow {
            id: Id::new_v4(),
            sender_id,
            receiver_id,
            read: false,
        })
    }

    fn updated(sender_id: Id, receiver_id: Id) -> ChangeEvent {
        ChangeEvent::Updated(MessageRow {
            id: Id::new_v4(),
            sender_id,
            receiver_id,
            read: true,
        })
    }

    async fn wait_for_count(rx: &mut watch::Receiver<u64>, expected: u64) {
        timeout(WAIT, rx.wait_for(|count| *count == expected))
            .await
            .expect("count never reached expected value")
            .expect("counter task ended");
    }

    #[test]
    fn foreign_insert_increments_and_self_insert_does_not() {
        let me = Id::new_v4();
        let mut unread = UnreadCount::new(me, 3);

        assert_eq!(unread.apply(&inserted(Id::new_v4(), me)), Reaction::Incremented);
        assert_eq!(unread.value(), 4);

        assert_eq!(unread.apply(&inserted(me, Id::new_v4())), Reaction::Ignored);
        assert_eq!(unread.value(), 4);
    }

    #[test]
    fn update_asks_for_reconciliation_without_touching_the_count() {
        let me = Id::new_v4();
        let mut unread = UnreadCount::new(me, 4);

        assert_eq!(unread.apply(&updated(Id::new_v4(), me)), Reaction::Reconcile);
        assert_eq!(unread.value(), 4);

        unread.reconcile(1);
        assert_eq!(unread.value(), 1);
    }

    #[tokio::test]
    async fn baseline_then_foreign_insert_then_self_insert() {
        let me = Id::new_v4();
        let channel = FakeChannel::new();
        let counter = LiveCounter::mount(me, FakeSource::new(vec![Fetch::Value(3)], 3), channel.clone());
        let mut rx = counter.watch();

        wait_for_count(&mut rx, 3).await;
        channel.wait_for_active(1).await;

        channel.push(inserted(Id::new_v4(), me));
        wait_for_count(&mut rx, 4).await;

        // Feed order is preserved, so once the next foreign insert shows up
        // the self-authored one has already been handled.
        channel.push(inserted(me, Id::new_v4()));
        channel.push(inserted(Id::new_v4(), me));
        wait_for_count(&mut rx, 5).await;
        assert_eq!(counter.count(), 5);

        counter.unmount().await;
    }

    #[tokio::test]
    async fn update_replaces_local_increments_with_the_next_fetch() {
        let me = Id::new_v4();
        let channel = FakeChannel::new();
        let source = FakeSource::new(vec![Fetch::Value(3), Fetch::Value(1)], 1);
        let counter = LiveCounter::mount(me, source.clone(), channel.clone());
        let mut rx = counter.watch();

        wait_for_count(&mut rx, 3).await;
        channel.wait_for_active(1).await;

        channel.push(inserted(Id::new_v4(), me));
        channel.push(inserted(Id::new_v4(), me));
        wait_for_count(&mut rx, 5).await;

        channel.push(updated(Id::new_v4(), me));
        wait_for_count(&mut rx, 1).await;

        assert_eq!(counter.count(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        counter.unmount().await;
    }

    #[tokio::test]
    async fn fetch_resolving_after_unmount_changes_nothing() {
        let me = Id::new_v4();
        let (gate, gated) = oneshot::channel();
        let source = FakeSource::new(vec![Fetch::Gated(gated)], 0);
        let channel = FakeChannel::new();
        let counter = LiveCounter::mount_with(me, source.clone(), channel.clone(), 2);
        let rx = counter.watch();

        channel.wait_for_active(1).await;
        timeout(WAIT, async {
            while source.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("mount fetch never started");

        counter.unmount().await;

        // The in-flight fetch was dropped with the task, so nobody is listening.
        assert!(gate.send(9).is_err());
        assert_eq!(*rx.borrow(), 2);
    }

    #[tokio::test]
    async fn one_subscription_per_mounted_instance() {
        let me = Id::new_v4();
        let channel = FakeChannel::new();
        let source = FakeSource::new(vec![], 0);

        for _ in 0..5 {
            let counter = LiveCounter::mount(me, source.clone(), channel.clone());
            channel.wait_for_active(1).await;
            assert_eq!(channel.active(), 1);

            counter.unmount().await;
            assert_eq!(channel.active(), 0);
        }

        let first = LiveCounter::mount(me, source.clone(), channel.clone());
        let second = LiveCounter::mount(me, source.clone(), channel.clone());
        channel.wait_for_active(2).await;

        drop(first);
        channel.wait_for_active(1).await;
        second.unmount().await;
        assert_eq!(channel.active(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_the_last_value() {
        let me = Id::new_v4();
        let channel = FakeChannel::new();
        let source = FakeSource::new(vec![Fetch::Fail], 0);
        let counter = LiveCounter::mount_with(me, source.clone(), channel.clone(), 2);
        let mut rx = counter.watch();

        channel.wait_for_active(1).await;
        channel.push(inserted(Id::new_v4(), me));
        wait_for_count(&mut rx, 3).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        counter.unmount().await;
    }

    #[tokio::test]
    async fn failed_subscription_still_shows_the_fetched_count() {
        let me = Id::new_v4();
        let counter = LiveCounter::mount(
            me,
            FakeSource::new(vec![Fetch::Value(6)], 6),
            FakeChannel::failing(),
        );
        let mut rx = counter.watch();

        wait_for_count(&mut rx, 6).await;
        counter.unmount().await;
    }

    #[tokio::test]
    async fn dropped_subscription_is_released_and_not_reopened() {
        let me = Id::new_v4();
        let channel = FakeChannel::new();
        let counter = LiveCounter::mount(me, FakeSource::new(vec![Fetch::Value(1)], 1), channel.clone());
        let mut rx = counter.watch();

        wait_for_count(&mut rx, 1).await;
        channel.wait_for_active(1).await;

        channel.close_feeds();
        channel.wait_for_active(0).await;

        assert_eq!(counter.count(), 1);
        counter.unmount().await;
        assert_eq!(channel.active(), 0);
    }
}
