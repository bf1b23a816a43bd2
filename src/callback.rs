//! Delivery of native notifications to Rust handlers.
//!
//! A [`Registration`] owns one worker thread. The native notification thread
//! only enqueues: it takes a reference on the event's extra handle, pushes the
//! event and wakes the worker, all under the queue lock and after checking the
//! release flag. The worker pops one event at a time, runs the handler outside
//! the lock and re-checks the flag after every wake, so nothing is delivered
//! once [`Registration::release`] has been observed.
//!
//! Per job, events are delivered in arrival order and anything arriving after
//! that job's completion event is dropped.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace, warn};

use crate::backend::NotificationSink;
use crate::codes;
use crate::error::{Error, Result};
use crate::handle::{Handle, OwnedHandle};
use crate::property::{PropertyId, PropertyValue};
use crate::vix::Vix;

/// Kind of a native notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    JobCompleted,
    JobProgress,
    FindItem,
    HostInitialized,
    /// Anything else the library sends. Handlers should ignore it.
    Other(i32),
}

impl EventType {
    /// Decode a native `VixEventType`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            2 => EventType::JobCompleted,
            3 => EventType::JobProgress,
            7 => EventType::HostInitialized,
            8 => EventType::FindItem,
            other => EventType::Other(other),
        }
    }

    /// The native `VixEventType`.
    pub fn raw(self) -> i32 {
        match self {
            EventType::JobCompleted => 2,
            EventType::JobProgress => 3,
            EventType::HostInitialized => 7,
            EventType::FindItem => 8,
            EventType::Other(raw) => raw,
        }
    }
}

/// One notification as seen by a handler.
pub struct Event<'a, C> {
    job: Handle,
    kind: EventType,
    more_info: Option<Handle>,
    client_data: &'a C,
    vix: &'a Vix,
}

impl<'a, C> Event<'a, C> {
    /// Job the notification belongs to.
    pub fn job(&self) -> Handle {
        self.job
    }

    pub fn kind(&self) -> EventType {
        self.kind
    }

    /// Extra handle carrying event data, valid for the handler call only.
    pub fn more_info(&self) -> Option<Handle> {
        self.more_info
    }

    /// The value given to [`Registration::new`].
    pub fn client_data(&self) -> &'a C {
        self.client_data
    }

    /// Read `ids` off the extra handle.
    pub fn properties(&self, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
        match self.more_info {
            Some(handle) => self.vix.properties(handle, ids),
            None => Err(Error::new(codes::VIX_E_INVALID_HANDLE, "Vix_GetProperties")),
        }
    }
}

impl<C> fmt::Debug for Event<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("job", &self.job)
            .field("kind", &self.kind)
            .field("more_info", &self.more_info)
            .finish()
    }
}

/// Handler signature.
pub type EventProc<C> = dyn FnMut(&Event<'_, C>) -> Result<()> + Send;

/// Lifecycle of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Waiting for a notification.
    Armed,
    /// The handler is running.
    Delivering,
    /// Told to stop; the handler will not run again.
    Released,
}

struct Pending {
    job: Handle,
    kind: EventType,
    more_info: Option<OwnedHandle>,
}

#[derive(Default)]
struct Queue {
    events: VecDeque<Pending>,
    released: bool,
    delivering: bool,
    /// Jobs whose completion event has been enqueued.
    completed: HashSet<Handle>,
    /// Jobs whose completion event has been through the handler.
    finished: HashSet<Handle>,
}

struct Shared<C> {
    vix: Vix,
    client_data: C,
    queue: Mutex<Queue>,
    wake: Condvar,
    delivered: AtomicUsize,
    failures: AtomicUsize,
}

impl<C> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Send + Sync + 'static> NotificationSink for Shared<C> {
    fn notify(&self, job: Handle, event_type: i32, more_info: Handle) {
        let kind = EventType::from_raw(event_type);
        let mut queue = self.lock();

        if queue.released {
            trace!(%job, ?kind, "registration released, dropping event");
            return;
        }
        if queue.completed.contains(&job) {
            warn!(%job, ?kind, "event after job completion, dropping");
            return;
        }

        let more_info = more_info.is_valid().then(|| self.vix.retain(more_info));
        if kind == EventType::JobCompleted {
            queue.completed.insert(job);
        }
        queue.events.push_back(Pending {
            job,
            kind,
            more_info,
        });
        self.wake.notify_all();
    }
}

/// Binds a handler and its client data to one notification thread.
pub struct Registration<C: Send + Sync + 'static> {
    shared: Arc<Shared<C>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: Send + Sync + 'static> Registration<C> {
    /// Arm a registration and start its notification thread.
    pub fn new<F>(vix: &Vix, client_data: C, handler: F) -> Result<Self>
    where
        F: FnMut(&Event<'_, C>) -> Result<()> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            vix: vix.clone(),
            client_data,
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
            delivered: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        });

        let worker = {
            let shared = shared.clone();
            let handler: Box<EventProc<C>> = Box::new(handler);
            thread::Builder::new()
                .name("vix-notify".into())
                .spawn(move || run(shared, handler))
                .map_err(|e| {
                    error!(error = %e, "failed to spawn notification thread");
                    Error::new(codes::VIX_E_OUT_OF_MEMORY, "Registration::new")
                })?
        };

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub(crate) fn sink(&self) -> Arc<dyn NotificationSink> {
        self.shared.clone()
    }

    /// The client data handed to every handler call.
    pub fn client_data(&self) -> &C {
        &self.shared.client_data
    }

    pub fn state(&self) -> RegistrationState {
        let queue = self.shared.lock();
        if queue.released {
            RegistrationState::Released
        } else if queue.delivering {
            RegistrationState::Delivering
        } else {
            RegistrationState::Armed
        }
    }

    /// Stop delivery.
    ///
    /// Returns at once; a handler already running finishes, nothing after it
    /// runs. Queued events are discarded.
    pub fn release(&self) {
        let mut queue = self.shared.lock();
        if !queue.released {
            debug!("releasing callback registration");
            queue.released = true;
            self.shared.wake.notify_all();
        }
    }

    /// Block until the completion event of `job` has been through the handler.
    ///
    /// Returns `false` if the registration was released first. A `true`
    /// return consumes the job's completion record, so a later job that
    /// reuses the same handle value is tracked afresh.
    pub fn wait_completed(&self, job: Handle) -> bool {
        let mut queue = self.shared.lock();
        loop {
            if queue.finished.remove(&job) {
                queue.completed.remove(&job);
                return true;
            }
            if queue.released {
                return false;
            }
            queue = self
                .shared
                .wake
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Number of handler calls made so far.
    pub fn delivered(&self) -> usize {
        self.shared.delivered.load(Ordering::SeqCst)
    }

    /// Number of handler calls that returned an error or panicked.
    pub fn failures(&self) -> usize {
        self.shared.failures.load(Ordering::SeqCst)
    }
}

impl<C: Send + Sync + 'static> fmt::Debug for Registration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("state", &self.state())
            .field("delivered", &self.delivered())
            .finish()
    }
}

impl<C: Send + Sync + 'static> Drop for Registration<C> {
    fn drop(&mut self) {
        self.release();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

fn run<C>(shared: Arc<Shared<C>>, mut handler: Box<EventProc<C>>) {
    loop {
        let pending = {
            let mut queue = shared.lock();
            loop {
                if queue.released {
                    break None;
                }
                if let Some(pending) = queue.events.pop_front() {
                    queue.delivering = true;
                    break Some(pending);
                }
                queue = shared
                    .wake
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        let Some(pending) = pending else {
            break;
        };

        deliver(&shared, handler.as_mut(), &pending);
        drop(pending.more_info);

        let mut queue = shared.lock();
        queue.delivering = false;
        if pending.kind == EventType::JobCompleted {
            queue.finished.insert(pending.job);
        }
        shared.wake.notify_all();
    }

    let leftover: Vec<Pending> = shared.lock().events.drain(..).collect();
    if !leftover.is_empty() {
        debug!(count = leftover.len(), "discarding undelivered events");
    }
}

fn deliver<C>(shared: &Shared<C>, handler: &mut EventProc<C>, pending: &Pending) {
    let event = Event {
        job: pending.job,
        kind: pending.kind,
        more_info: pending.more_info.as_ref().map(OwnedHandle::get),
        client_data: &shared.client_data,
        vix: &shared.vix,
    };
    trace!(?event, "delivering event");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
    shared.delivered.fetch_add(1, Ordering::SeqCst);
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            shared.failures.fetch_add(1, Ordering::SeqCst);
            error!(error = %err, job = %pending.job, kind = ?pending.kind, "event handler failed");
        }
        Err(_) => {
            shared.failures.fetch_add(1, Ordering::SeqCst);
            error!(job = %pending.job, kind = ?pending.kind, "event handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<(Handle, EventType)>>>;

    fn recorder(vix: &Vix) -> (Registration<Seen>, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let reg = Registration::new(vix, seen.clone(), |event: &Event<'_, Seen>| {
            event
                .client_data()
                .lock()
                .unwrap()
                .push((event.job(), event.kind()));
            Ok(())
        })
        .expect("registration should start");
        (reg, seen)
    }

    #[test]
    fn test_event_type_raw() {
        assert_eq!(EventType::from_raw(2), EventType::JobCompleted);
        assert_eq!(EventType::from_raw(3), EventType::JobProgress);
        assert_eq!(EventType::from_raw(8), EventType::FindItem);
        assert_eq!(EventType::from_raw(99), EventType::Other(99));
        assert_eq!(EventType::HostInitialized.raw(), 7);
    }

    #[test]
    fn test_progress_then_completed_in_order() {
        let (vix, _sim) = Vix::simulated();
        let (reg, seen) = recorder(&vix);
        let job = Handle::from_raw(500);
        let sink = reg.sink();

        sink.notify(job, 3, Handle::INVALID);
        sink.notify(job, 3, Handle::INVALID);
        sink.notify(job, 2, Handle::INVALID);
        sink.notify(job, 3, Handle::INVALID);

        assert!(reg.wait_completed(job));
        drop(reg);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (job, EventType::JobProgress),
                (job, EventType::JobProgress),
                (job, EventType::JobCompleted),
            ]
        );
    }

    #[test]
    fn test_release_mid_handler_stops_next_event() {
        let (vix, _sim) = Vix::simulated();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = mpsc::channel();

        let reg = Registration::new(&vix, seen.clone(), move |event: &Event<'_, Seen>| {
            event
                .client_data()
                .lock()
                .unwrap()
                .push((event.job(), event.kind()));
            let _ = entered_tx.send(());
            thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .expect("registration should start");

        let job = Handle::from_raw(600);
        let sink = reg.sink();
        sink.notify(job, 3, Handle::INVALID);
        sink.notify(job, 3, Handle::INVALID);

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("handler should start");
        assert_eq!(reg.state(), RegistrationState::Delivering);
        reg.release();
        assert_eq!(reg.state(), RegistrationState::Released);
        drop(reg);

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_handler_failures_are_contained() {
        let (vix, _sim) = Vix::simulated();
        let calls = Arc::new(AtomicUsize::new(0));
        let reg = Registration::new(&vix, calls.clone(), |event: &Event<'_, Arc<AtomicUsize>>| {
            let n = event.client_data().fetch_add(1, Ordering::SeqCst);
            match n {
                0 => panic!("handler blew up"),
                1 => Err(Error::new(codes::VIX_E_FAIL, "handler")),
                _ => Ok(()),
            }
        })
        .expect("registration should start");

        let job = Handle::from_raw(700);
        let sink = reg.sink();
        sink.notify(job, 3, Handle::INVALID);
        sink.notify(job, 3, Handle::INVALID);
        sink.notify(job, 2, Handle::INVALID);

        assert!(reg.wait_completed(job));
        assert_eq!(reg.delivered(), 3);
        assert_eq!(reg.failures(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_completion_record_pruned_after_wait() {
        let (vix, _sim) = Vix::simulated();
        let (reg, seen) = recorder(&vix);
        let job = Handle::from_raw(550);
        let sink = reg.sink();

        sink.notify(job, 2, Handle::INVALID);
        assert!(reg.wait_completed(job));
        {
            let queue = reg.shared.lock();
            assert!(queue.completed.is_empty());
            assert!(queue.finished.is_empty());
        }

        // Same handle value, new job.
        sink.notify(job, 3, Handle::INVALID);
        sink.notify(job, 2, Handle::INVALID);
        assert!(reg.wait_completed(job));
        drop(reg);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (job, EventType::JobCompleted),
                (job, EventType::JobProgress),
                (job, EventType::JobCompleted),
            ]
        );
    }

    #[test]
    fn test_wait_completed_returns_false_after_release() {
        let (vix, _sim) = Vix::simulated();
        let (reg, _seen) = recorder(&vix);
        reg.release();
        assert!(!reg.wait_completed(Handle::from_raw(800)));
        assert_eq!(reg.state(), RegistrationState::Released);
    }

    #[test]
    fn test_events_after_release_are_dropped() {
        let (vix, _sim) = Vix::simulated();
        let (reg, seen) = recorder(&vix);
        reg.release();
        reg.sink().notify(Handle::from_raw(900), 2, Handle::INVALID);
        drop(reg);
        assert!(seen.lock().unwrap().is_empty());
    }
}
