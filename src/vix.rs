//! The library context every façade and job hangs off.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{Backend, Count, Lookup, NotificationSink, Operation};
use crate::callback::Registration;
use crate::codes::{self, ErrorCode};
use crate::error::{Error, Result};
use crate::handle::{Handle, HandleTable, OwnedHandle};
use crate::job::Job;
use crate::property::{self, PropertyId, PropertyValue};
use crate::sim::SimBackend;

/// A backend plus the table of handles the binding holds on it.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct Vix {
    backend: Arc<dyn Backend>,
    handles: Arc<HandleTable>,
}

impl Vix {
    /// Create a context over any backend.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        let handles = Arc::new(HandleTable::new(backend.clone()));
        Self { backend, handles }
    }

    /// Create a context over the VIX shared library.
    #[cfg(feature = "native")]
    pub fn native() -> Self {
        Self::with_backend(Arc::new(crate::ffi::NativeLibrary::new()))
    }

    /// Create a context over a fresh in-process simulator.
    ///
    /// The returned [`SimBackend`] shares state with the context and can be
    /// used to script outcomes and inspect native calls.
    pub fn simulated() -> (Self, SimBackend) {
        let sim = SimBackend::new();
        (Self::with_backend(Arc::new(sim.clone())), sim)
    }

    /// Table of live handles.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Start `op` with no callback.
    pub fn dispatch(&self, op: Operation) -> Result<Job> {
        self.start(op, None)
    }

    /// Start `op`, routing its notifications to `registration`.
    pub fn dispatch_with<C>(&self, op: Operation, registration: &Registration<C>) -> Result<Job>
    where
        C: Send + Sync + 'static,
    {
        self.start(op, Some(registration.sink()))
    }

    fn start(&self, op: Operation, sink: Option<Arc<dyn NotificationSink>>) -> Result<Job> {
        let name = op.name();
        let target = op.target();
        debug!(op = name, %target, "begin");

        let job = self
            .backend
            .dispatch(&op, sink)
            .map_err(|code| self.error(code, name, target))?;
        if !job.is_valid() {
            return Err(Error::new(codes::VIX_E_FAIL, name));
        }

        debug!(op = name, %job, "end");
        Ok(Job::new(self.clone(), self.adopt(job), name, target))
    }

    /// Run a synchronous lookup and take ownership of the returned reference.
    pub fn lookup(&self, query: Lookup) -> Result<OwnedHandle> {
        let name = query.name();
        let target = query.target();
        debug!(op = name, %target, "begin");
        let handle = self
            .backend
            .lookup(&query)
            .map_err(|code| self.error(code, name, target))?;
        if !handle.is_valid() {
            return Err(Error::new(codes::VIX_E_FAIL, name));
        }
        debug!(op = name, %handle, "end");
        Ok(self.adopt(handle))
    }

    /// Run a synchronous count query.
    pub fn lookup_count(&self, query: Count) -> Result<usize> {
        let name = query.name();
        let n = self
            .backend
            .count(&query)
            .map_err(|code| self.error(code, name, query.target()))?;
        usize::try_from(n).map_err(|_| Error::new(codes::VIX_E_FAIL, name))
    }

    /// Track a handle the caller received from the library and wrap it.
    pub fn adopt(&self, handle: Handle) -> OwnedHandle {
        self.handles.track(handle);
        OwnedHandle::new(self.handles.clone(), handle)
    }

    /// Take an extra reference on a handle the library lent us.
    pub(crate) fn retain(&self, handle: Handle) -> OwnedHandle {
        self.handles.add_ref(handle);
        OwnedHandle::new(self.handles.clone(), handle)
    }

    /// Read `ids` off `handle`, in request order.
    pub fn properties(&self, handle: Handle, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
        property::decode(self, handle, ids)
    }

    /// Read `ids` off the `index`-th element of a job's result set.
    pub fn nth_properties(
        &self,
        job: Handle,
        index: usize,
        ids: &[PropertyId],
    ) -> Result<Vec<PropertyValue>> {
        property::decode_nth(self, job, index, ids)
    }

    /// Number of result-set elements on `job` carrying `id`.
    pub fn count(&self, job: Handle, id: PropertyId) -> Result<usize> {
        property::count(self, job, id)
    }

    /// Drive pending callbacks on a host opened with `HOSTOPTION_USE_EVENT_PUMP`.
    pub fn pump_events(&self, host: Handle, options: i32) {
        self.backend.pump_events(host, options);
    }

    /// Turn a native failure into an [`Error`].
    ///
    /// A handle the table still holds but the library calls invalid has
    /// outlived the library's serial numbers; that gets its own code.
    pub(crate) fn error(&self, code: ErrorCode, op: &'static str, target: Handle) -> Error {
        if code == codes::VIX_E_INVALID_HANDLE && target.is_valid() && self.handles.is_live(target)
        {
            warn!(op, %target, "live handle rejected, possible serial number expiry");
            return Error::new(
                codes::VIX_E_BINDING_INVALID_HANDLE_POSSIBLE_SERIALNUMBER_EXPIRY,
                op,
            );
        }
        Error::new(code, op)
    }
}

impl fmt::Debug for Vix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vix").field("handles", &self.handles).finish()
    }
}
