//! In-process stand-in for the VIX library.
//!
//! [`SimBackend`] keeps reference-counted objects, jobs that move from
//! pending to a terminal status, indexed result sets and a snapshot tree,
//! and sends notifications from its own thread the way the library does.
//! Outcomes are scripted per native function with [`SimBackend::respond`];
//! every call is recorded for inspection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, trace, warn};

use crate::backend::{Backend, Count, Lookup, NotificationSink, Operation};
use crate::callback::EventType;
use crate::codes::{self, ErrorCode};
use crate::handle::Handle;
use crate::property::{
    HandleType, PropertyId, PropertyType, PropertyValue, VIX_PROPERTY_FOUND_ITEM_LOCATION,
    VIX_PROPERTY_JOB_RESULT_HANDLE, VIX_PROPERTY_SNAPSHOT_DESCRIPTION,
    VIX_PROPERTY_SNAPSHOT_DISPLAYNAME, VIX_PROPERTY_SNAPSHOT_POWERSTATE,
    VIX_PROPERTY_VM_POWER_STATE, VIX_PROPERTY_VM_VMX_PATHNAME,
};

/// Scripted result of one native call.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    status: Option<ErrorCode>,
    properties: Vec<(PropertyId, PropertyValue)>,
    items: Vec<Vec<(PropertyId, PropertyValue)>>,
    progress: usize,
    found: Vec<String>,
    deferred: bool,
    result: Option<HandleType>,
}

impl Outcome {
    /// Succeed with no properties.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Resolve the job to `code`.
    pub fn fail(code: ErrorCode) -> Self {
        Self {
            status: Some(code),
            ..Self::default()
        }
    }

    /// Attach a completion property to the job.
    pub fn property(mut self, id: PropertyId, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((id, value.into()));
        self
    }

    /// Append one element to the job's indexed result set.
    pub fn item(mut self, values: Vec<(PropertyId, PropertyValue)>) -> Self {
        self.items.push(values);
        self
    }

    /// Send `n` progress notifications before completion.
    pub fn progress(mut self, n: usize) -> Self {
        self.progress = n;
        self
    }

    /// Send a find-item notification carrying `location`.
    pub fn found_item(mut self, location: impl Into<String>) -> Self {
        self.found.push(location.into());
        self
    }

    /// Leave the job pending until [`SimBackend::finish`].
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Create a new object of `kind` and return it as the job's result handle.
    pub fn returns_handle(mut self, kind: HandleType) -> Self {
        self.result = Some(kind);
        self
    }

    fn code(&self) -> ErrorCode {
        self.status.unwrap_or(codes::VIX_OK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Pending,
    Done(ErrorCode),
}

#[derive(Debug)]
struct Object {
    kind: HandleType,
    refs: usize,
    props: HashMap<PropertyId, PropertyValue>,
    items: Vec<HashMap<PropertyId, PropertyValue>>,
    job: Option<JobState>,
    parent: Option<Handle>,
    children: Vec<Handle>,
    current: Option<Handle>,
}

impl Object {
    fn new(kind: HandleType) -> Self {
        Self {
            kind,
            refs: 1,
            props: HashMap::new(),
            items: Vec::new(),
            job: None,
            parent: None,
            children: Vec::new(),
            current: None,
        }
    }
}

/// Work left for the notification thread of one job.
struct Completion {
    status: ErrorCode,
    progress: usize,
    found: Vec<String>,
    sink: Option<Arc<dyn NotificationSink>>,
}

#[derive(Default)]
struct State {
    next: i32,
    objects: HashMap<Handle, Object>,
    expired: HashSet<Handle>,
    untyped: HashSet<(Handle, PropertyId)>,
    bad_counts: HashSet<(Handle, PropertyId)>,
    outcomes: HashMap<&'static str, Outcome>,
    deferred: HashMap<Handle, Completion>,
    calls: Vec<Operation>,
    releases: HashMap<Handle, usize>,
    rejected_releases: usize,
    disconnected: Vec<Handle>,
    pumped: usize,
}

impl State {
    fn alloc(&mut self, object: Object) -> Handle {
        self.next += 1;
        let handle = Handle::from_raw(self.next);
        self.objects.insert(handle, object);
        handle
    }

    fn usable(&self, handle: Handle) -> Option<&Object> {
        if self.expired.contains(&handle) {
            return None;
        }
        self.objects.get(&handle)
    }

    fn retain(&mut self, handle: Handle) -> Handle {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.refs += 1;
        }
        handle
    }

    fn drop_ref(&mut self, handle: Handle) {
        match self.objects.get_mut(&handle) {
            Some(obj) if obj.refs > 1 => obj.refs -= 1,
            Some(_) => {
                let Some(obj) = self.objects.remove(&handle) else {
                    return;
                };
                trace!(%handle, "sim object destroyed");
                // A job owns one reference to each object it reports.
                if obj.job.is_some() {
                    for value in obj.props.values() {
                        if let PropertyValue::Handle(h) = value {
                            self.drop_ref(*h);
                        }
                    }
                }
            }
            None => {
                self.rejected_releases += 1;
                warn!(%handle, "sim release of unknown handle");
            }
        }
    }

    fn new_snapshot(
        &mut self,
        vm: Handle,
        parent: Option<Handle>,
        name: &str,
        desc: &str,
    ) -> Handle {
        let mut snap = Object::new(HandleType::Snapshot);
        snap.parent = parent;
        snap.props
            .insert(VIX_PROPERTY_SNAPSHOT_DISPLAYNAME, PropertyValue::from(name));
        snap.props
            .insert(VIX_PROPERTY_SNAPSHOT_DESCRIPTION, PropertyValue::from(desc));
        snap.props
            .insert(VIX_PROPERTY_SNAPSHOT_POWERSTATE, PropertyValue::Integer(0x0002));
        let handle = self.alloc(snap);

        let owner = parent.unwrap_or(vm);
        if let Some(obj) = self.objects.get_mut(&owner) {
            obj.children.push(handle);
        }
        if let Some(obj) = self.objects.get_mut(&vm) {
            obj.current = Some(handle);
        }
        handle
    }

    fn find_snapshot(&self, root: &[Handle], name: &str) -> Option<Handle> {
        root.iter().find_map(|&h| {
            let obj = self.objects.get(&h)?;
            let matches = obj
                .props
                .get(&VIX_PROPERTY_SNAPSHOT_DISPLAYNAME)
                .and_then(|v| v.as_str().ok())
                == Some(name);
            if matches {
                Some(h)
            } else {
                self.find_snapshot(&obj.children, name)
            }
        })
    }

    fn detach_snapshot(&mut self, vm: Handle, snapshot: Handle) {
        let parent = self.objects.get(&snapshot).and_then(|o| o.parent);
        let owner = parent.unwrap_or(vm);
        if let Some(obj) = self.objects.get_mut(&owner) {
            obj.children.retain(|&c| c != snapshot);
        }
        if let Some(obj) = self.objects.get_mut(&vm) {
            if obj.current == Some(snapshot) {
                obj.current = parent;
            }
        }
        self.drop_ref(snapshot);
    }
}

struct Inner {
    state: Mutex<State>,
    jobs: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send progress and find-item notifications, mark the job terminal, then
    /// send the completion notification.
    fn complete(&self, job: Handle, completion: Completion) {
        let Completion {
            status,
            progress,
            found,
            sink,
        } = completion;

        if let Some(sink) = &sink {
            for _ in 0..progress {
                sink.notify(job, EventType::JobProgress.raw(), Handle::INVALID);
            }
            for location in found {
                let info = {
                    let mut st = self.lock();
                    let mut obj = Object::new(HandleType::PropertyList);
                    obj.props
                        .insert(VIX_PROPERTY_FOUND_ITEM_LOCATION, PropertyValue::from(location));
                    st.alloc(obj)
                };
                sink.notify(job, EventType::FindItem.raw(), info);
                self.lock().drop_ref(info);
            }
        }

        {
            let mut st = self.lock();
            if let Some(obj) = st.objects.get_mut(&job) {
                obj.job = Some(JobState::Done(status));
            }
            self.jobs.notify_all();
        }
        debug!(%job, code = status.value(), "sim job done");

        if let Some(sink) = &sink {
            sink.notify(job, EventType::JobCompleted.raw(), Handle::INVALID);
        }
    }
}

/// In-process implementation of [`Backend`].
///
/// Clones share state, so a test can keep one clone for scripting and
/// inspection while a [`Vix`](crate::Vix) context drives the other.
#[derive(Clone)]
pub struct SimBackend {
    inner: Arc<Inner>,
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                jobs: Condvar::new(),
            }),
        }
    }

    /// Script the outcome of every later call to native function `op`.
    pub fn respond(&self, op: &'static str, outcome: Outcome) {
        self.inner.lock().outcomes.insert(op, outcome);
    }

    /// Create a host object owned by the caller.
    pub fn create_host(&self) -> Handle {
        self.inner.lock().alloc(Object::new(HandleType::Host))
    }

    /// Create a VM object owned by the caller.
    pub fn create_vm(&self, vmx_path: &str) -> Handle {
        let mut vm = Object::new(HandleType::Vm);
        vm.props
            .insert(VIX_PROPERTY_VM_VMX_PATHNAME, PropertyValue::from(vmx_path));
        vm.props
            .insert(VIX_PROPERTY_VM_POWER_STATE, PropertyValue::Integer(0x0002));
        self.inner.lock().alloc(vm)
    }

    /// Add a snapshot under `parent`, or as a root snapshot of `vm`.
    ///
    /// The snapshot becomes the VM's current one and is owned by the VM.
    pub fn add_snapshot(&self, vm: Handle, parent: Option<Handle>, name: &str) -> Handle {
        self.inner.lock().new_snapshot(vm, parent, name, "")
    }

    /// Set a property on any object.
    pub fn set_property(&self, handle: Handle, id: PropertyId, value: impl Into<PropertyValue>) {
        if let Some(obj) = self.inner.lock().objects.get_mut(&handle) {
            obj.props.insert(id, value.into());
        }
    }

    /// Make the library report `VIX_PROPERTYTYPE_ANY` for `id` on `handle`.
    pub fn set_untyped(&self, handle: Handle, id: PropertyId) {
        self.inner.lock().untyped.insert((handle, id));
    }

    /// Make the library report a negative result-set count for `id` on `job`.
    pub fn set_bad_count(&self, job: Handle, id: PropertyId) {
        self.inner.lock().bad_counts.insert((job, id));
    }

    /// Invalidate `handle` on the library side only, as serial-number expiry does.
    pub fn expire(&self, handle: Handle) {
        self.inner.lock().expired.insert(handle);
    }

    /// Resolve a job created from a deferred outcome.
    pub fn finish(&self, job: Handle) {
        let completion = self.inner.lock().deferred.remove(&job);
        if let Some(completion) = completion {
            self.spawn_completion(job, completion);
        }
    }

    /// Every asynchronous call made so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        self.inner.lock().calls.clone()
    }

    /// The most recent asynchronous call.
    pub fn last_call(&self) -> Option<Operation> {
        self.inner.lock().calls.last().cloned()
    }

    /// Number of `Vix_ReleaseHandle` calls made for `handle`.
    pub fn release_count(&self, handle: Handle) -> usize {
        self.inner.lock().releases.get(&handle).copied().unwrap_or(0)
    }

    /// Number of `Vix_ReleaseHandle` calls made for any handle.
    pub fn total_releases(&self) -> usize {
        self.inner.lock().releases.values().sum()
    }

    /// Releases the library rejected because the object was already gone.
    pub fn rejected_releases(&self) -> usize {
        self.inner.lock().rejected_releases
    }

    /// Check if the object behind `handle` still exists.
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.inner.lock().objects.contains_key(&handle)
    }

    /// Library-side reference count of `handle`.
    pub fn refs(&self, handle: Handle) -> usize {
        self.inner
            .lock()
            .objects
            .get(&handle)
            .map(|o| o.refs)
            .unwrap_or(0)
    }

    /// Hosts passed to `VixHost_Disconnect`.
    pub fn disconnected(&self) -> Vec<Handle> {
        self.inner.lock().disconnected.clone()
    }

    /// Number of `Vix_PumpEvents` calls.
    pub fn pumped(&self) -> usize {
        self.inner.lock().pumped
    }

    fn spawn_completion(&self, job: Handle, completion: Completion) {
        if completion.sink.is_none() {
            self.inner.complete(job, completion);
            return;
        }
        let inner = self.inner.clone();
        thread::spawn(move || inner.complete(job, completion));
    }

    /// Apply the side effects of a successful call and build its result.
    fn perform(st: &mut State, op: &Operation, job: Handle, outcome: &Outcome) {
        let result = match op {
            Operation::HostConnect { .. } if outcome.result.is_none() => {
                Some(st.alloc(Object::new(HandleType::Host)))
            }
            Operation::VmOpen { vmx_path, .. } if outcome.result.is_none() => {
                let mut vm = Object::new(HandleType::Vm);
                vm.props
                    .insert(VIX_PROPERTY_VM_VMX_PATHNAME, PropertyValue::from(vmx_path.as_str()));
                vm.props
                    .insert(VIX_PROPERTY_VM_POWER_STATE, PropertyValue::Integer(0x0002));
                Some(st.alloc(vm))
            }
            Operation::VmPowerOn { vm, .. } => {
                if let Some(obj) = st.objects.get_mut(vm) {
                    obj.props
                        .insert(VIX_PROPERTY_VM_POWER_STATE, PropertyValue::Integer(0x0008));
                }
                None
            }
            Operation::VmPowerOff { vm, .. } => {
                if let Some(obj) = st.objects.get_mut(vm) {
                    obj.props
                        .insert(VIX_PROPERTY_VM_POWER_STATE, PropertyValue::Integer(0x0002));
                }
                None
            }
            Operation::VmCreateSnapshot {
                vm,
                name,
                description,
                ..
            } if outcome.result.is_none() => {
                let parent = st.objects.get(vm).and_then(|o| o.current);
                let snap = st.new_snapshot(*vm, parent, name, description);
                Some(st.retain(snap))
            }
            Operation::VmRemoveSnapshot { vm, snapshot, .. } => {
                st.detach_snapshot(*vm, *snapshot);
                None
            }
            Operation::VmRevertToSnapshot { vm, snapshot, .. } => {
                if let Some(obj) = st.objects.get_mut(vm) {
                    obj.current = Some(*snapshot);
                }
                None
            }
            _ => outcome.result.map(|kind| st.alloc(Object::new(kind))),
        };

        if let Some(obj) = st.objects.get_mut(&job) {
            if let Some(handle) = result {
                obj.props
                    .insert(VIX_PROPERTY_JOB_RESULT_HANDLE, PropertyValue::Handle(handle));
            }
        }
    }
}

impl fmt::Debug for SimBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.lock();
        f.debug_struct("SimBackend")
            .field("objects", &st.objects.len())
            .field("calls", &st.calls.len())
            .finish()
    }
}

impl Backend for SimBackend {
    fn dispatch(
        &self,
        op: &Operation,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Handle, ErrorCode> {
        let (job, completion, deferred) = {
            let mut st = self.inner.lock();
            st.calls.push(op.clone());

            let outcome = st.outcomes.get(op.name()).cloned().unwrap_or_default();
            let target = op.target();
            let status = if target.is_valid() && st.usable(target).is_none() {
                codes::VIX_E_INVALID_HANDLE
            } else {
                outcome.code()
            };

            let mut obj = Object::new(HandleType::Job);
            obj.job = Some(JobState::Pending);
            obj.props.extend(outcome.properties.iter().cloned());
            obj.items = outcome
                .items
                .iter()
                .map(|item| item.iter().cloned().collect())
                .collect();
            let job = st.alloc(obj);

            if status.is_ok() {
                Self::perform(&mut st, op, job, &outcome);
            }
            trace!(op = op.name(), %job, code = status.value(), "sim dispatch");

            let completion = Completion {
                status,
                progress: outcome.progress,
                found: if status.is_ok() { outcome.found.clone() } else { Vec::new() },
                sink,
            };
            (job, completion, outcome.deferred)
        };

        if deferred {
            self.inner.lock().deferred.insert(job, completion);
        } else {
            self.spawn_completion(job, completion);
        }
        Ok(job)
    }

    fn lookup(&self, query: &Lookup) -> Result<Handle, ErrorCode> {
        let mut st = self.inner.lock();
        let target = query.target();
        let obj = st.usable(target).ok_or(codes::VIX_E_INVALID_HANDLE)?;

        let found = match query {
            Lookup::VmRootSnapshot { index, .. } | Lookup::SnapshotChild { index, .. } => {
                usize::try_from(*index)
                    .ok()
                    .and_then(|i| obj.children.get(i).copied())
                    .ok_or(codes::VIX_E_INVALID_ARG)?
            }
            Lookup::VmCurrentSnapshot { .. } => obj.current.ok_or(codes::VIX_E_SNAPSHOT_NOTFOUND)?,
            Lookup::VmNamedSnapshot { name, .. } => {
                let roots = obj.children.clone();
                st.find_snapshot(&roots, name)
                    .ok_or(codes::VIX_E_SNAPSHOT_NOTFOUND)?
            }
            Lookup::SnapshotParent { .. } => obj.parent.ok_or(codes::VIX_E_SNAPSHOT_NOTFOUND)?,
        };
        Ok(st.retain(found))
    }

    fn count(&self, query: &Count) -> Result<i32, ErrorCode> {
        let st = self.inner.lock();
        let obj = st.usable(query.target()).ok_or(codes::VIX_E_INVALID_HANDLE)?;
        Ok(obj.children.len() as i32)
    }

    fn add_ref(&self, handle: Handle) {
        self.inner.lock().retain(handle);
    }

    fn release(&self, handle: Handle) {
        let mut st = self.inner.lock();
        *st.releases.entry(handle).or_insert(0) += 1;
        st.drop_ref(handle);
    }

    fn handle_type(&self, handle: Handle) -> HandleType {
        self.inner
            .lock()
            .usable(handle)
            .map(|o| o.kind)
            .unwrap_or(HandleType::None)
    }

    fn property_type(&self, handle: Handle, id: PropertyId) -> Result<PropertyType, ErrorCode> {
        let st = self.inner.lock();
        let obj = st.usable(handle).ok_or(codes::VIX_E_INVALID_HANDLE)?;
        if st.untyped.contains(&(handle, id)) {
            return Ok(PropertyType::Any);
        }
        obj.props
            .get(&id)
            .map(PropertyValue::property_type)
            .ok_or(codes::VIX_E_UNRECOGNIZED_PROPERTY)
    }

    fn property(
        &self,
        handle: Handle,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<PropertyValue, ErrorCode> {
        let st = self.inner.lock();
        let obj = st.usable(handle).ok_or(codes::VIX_E_INVALID_HANDLE)?;
        let value = obj
            .props
            .get(&id)
            .ok_or(codes::VIX_E_UNRECOGNIZED_PROPERTY)?;
        if value.property_type() != ty {
            return Err(codes::VIX_E_TYPE_MISMATCH);
        }
        let value = value.clone();
        // A handle read out of a property is a new reference for the reader.
        drop(st);
        if let PropertyValue::Handle(h) = value {
            self.inner.lock().retain(h);
        }
        Ok(value)
    }

    fn job_wait(&self, job: Handle) -> ErrorCode {
        let mut st = self.inner.lock();
        loop {
            match st.usable(job).and_then(|o| o.job) {
                None => return codes::VIX_E_INVALID_HANDLE,
                Some(JobState::Done(code)) => return code,
                Some(JobState::Pending) => {
                    st = self
                        .inner
                        .jobs
                        .wait(st)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn job_check_completion(&self, job: Handle) -> Result<bool, ErrorCode> {
        let st = self.inner.lock();
        match st.usable(job).and_then(|o| o.job) {
            None => Err(codes::VIX_E_INVALID_HANDLE),
            Some(state) => Ok(state != JobState::Pending),
        }
    }

    fn job_num_properties(&self, job: Handle, id: PropertyId) -> i32 {
        let st = self.inner.lock();
        if st.bad_counts.contains(&(job, id)) {
            return -1;
        }
        st.usable(job)
            .map(|o| o.items.iter().filter(|item| item.contains_key(&id)).count() as i32)
            .unwrap_or(0)
    }

    fn job_nth_property(
        &self,
        job: Handle,
        index: i32,
        id: PropertyId,
        _ty: PropertyType,
    ) -> Result<PropertyValue, ErrorCode> {
        let st = self.inner.lock();
        let obj = st.usable(job).ok_or(codes::VIX_E_INVALID_HANDLE)?;
        let item = usize::try_from(index)
            .ok()
            .and_then(|i| obj.items.get(i))
            .ok_or(codes::VIX_E_INVALID_ARG)?;
        item.get(&id)
            .cloned()
            .ok_or(codes::VIX_E_UNRECOGNIZED_PROPERTY)
    }

    fn disconnect(&self, host: Handle) {
        let mut st = self.inner.lock();
        st.disconnected.push(host);
        st.objects.remove(&host);
    }

    fn pump_events(&self, _host: Handle, _options: i32) {
        self.inner.lock().pumped += 1;
    }
}
