//! Jobs: the handles asynchronous native calls return.
//!
//! A [`Job`] is consumed by exactly one wait. A failed wait turns the
//! terminal status into an [`Error`]; a successful one yields a
//! [`CompletedJob`] whose properties and indexed result set may be read.
//! Either way the job handle is released when the value goes away.

use std::fmt;

use tracing::debug;

use crate::codes;
use crate::error::{Error, Result};
use crate::handle::{Handle, OwnedHandle};
use crate::property::{self, PropertyId, PropertyValue, VIX_PROPERTY_JOB_RESULT_HANDLE};
use crate::vix::Vix;

/// An asynchronous operation that has not been waited on yet.
pub struct Job {
    vix: Vix,
    handle: OwnedHandle,
    op: &'static str,
    target: Handle,
}

impl Job {
    pub(crate) fn new(vix: Vix, handle: OwnedHandle, op: &'static str, target: Handle) -> Self {
        Self {
            vix,
            handle,
            op,
            target,
        }
    }

    /// The job handle.
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    /// Native function that started the job.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Non-blocking poll for a terminal state.
    pub fn check_completion(&self) -> Result<bool> {
        self.vix
            .backend()
            .job_check_completion(self.handle.get())
            .map_err(|code| self.vix.error(code, "VixJob_CheckCompletion", self.handle.get()))
    }

    /// Read properties without waiting.
    ///
    /// Fails with `VIX_E_BINDING_JOB_NOT_COMPLETE` while the job is pending;
    /// the job stays usable.
    pub fn properties(&self, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
        if !self.check_completion()? {
            return Err(Error::new(codes::VIX_E_BINDING_JOB_NOT_COMPLETE, self.op));
        }
        self.vix.properties(self.handle.get(), ids)
    }

    /// Block until the job is terminal, then read `ids`.
    pub fn wait(self, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
        self.wait_completed()?.properties(ids)
    }

    /// Block until the job is terminal and keep it for further reads.
    ///
    /// There is no timeout here; operations that take one pass it to the
    /// native call instead.
    pub fn wait_completed(self) -> Result<CompletedJob> {
        let job = self.handle.get();
        debug!(op = self.op, %job, "VixJob_Wait");

        let status = self.vix.backend().job_wait(job);
        if !status.is_ok() {
            debug!(op = self.op, %job, code = status.value(), name = status.name(), "job failed");
            return Err(self.vix.error(status, self.op, self.target));
        }
        Ok(CompletedJob { job: self })
    }

    /// Wait for a job whose result is an object, and take ownership of it.
    pub fn wait_handle(self) -> Result<OwnedHandle> {
        let vix = self.vix.clone();
        let op = self.op;
        let [value] = property::fixed::<1>(self.wait(&[VIX_PROPERTY_JOB_RESULT_HANDLE])?, op)?;
        let handle = value.as_handle()?;
        if !handle.is_valid() {
            return Err(Error::new(codes::VIX_E_FAIL, op));
        }
        Ok(vix.adopt(handle))
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("handle", &self.handle.get())
            .field("op", &self.op)
            .finish()
    }
}

/// A job that finished successfully.
#[derive(Debug)]
pub struct CompletedJob {
    job: Job,
}

impl CompletedJob {
    /// The job handle.
    pub fn handle(&self) -> Handle {
        self.job.handle()
    }

    /// Read completion properties, in request order.
    pub fn properties(&self, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
        self.job.vix.properties(self.handle(), ids)
    }

    /// Number of result-set elements carrying `id`.
    pub fn count(&self, id: PropertyId) -> Result<usize> {
        self.job.vix.count(self.handle(), id)
    }

    /// Read `ids` off the `index`-th result-set element.
    pub fn nth_properties(&self, index: usize, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
        self.job.vix.nth_properties(self.handle(), index, ids)
    }

    /// Read `ids` off every result-set element.
    ///
    /// The element count is taken from the first id.
    pub fn rows(&self, ids: &[PropertyId]) -> Result<Vec<Vec<PropertyValue>>> {
        let Some(&first) = ids.first() else {
            return Ok(Vec::new());
        };
        let n = self.count(first)?;
        (0..n).map(|i| self.nth_properties(i, ids)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Operation;
    use crate::property::*;
    use crate::sim::Outcome;

    fn listing(vix: &Vix, sim: &crate::SimBackend) -> Job {
        let vm = sim.create_vm("/vms/a.vmx");
        let _vm = vix.adopt(vm);
        sim.respond(
            "VixVM_ListDirectoryInGuest",
            Outcome::ok()
                .item(vec![
                    (VIX_PROPERTY_JOB_RESULT_ITEM_NAME, "a".into()),
                    (VIX_PROPERTY_JOB_RESULT_FILE_FLAGS, 1.into()),
                ])
                .item(vec![
                    (VIX_PROPERTY_JOB_RESULT_ITEM_NAME, "b".into()),
                    (VIX_PROPERTY_JOB_RESULT_FILE_FLAGS, 0.into()),
                ])
                .item(vec![
                    (VIX_PROPERTY_JOB_RESULT_ITEM_NAME, "c".into()),
                    (VIX_PROPERTY_JOB_RESULT_FILE_FLAGS, 2.into()),
                ]),
        );
        vix.dispatch(Operation::VmListDirectoryInGuest {
            vm,
            path: "/".into(),
            options: 0,
        })
        .expect("dispatch should succeed")
    }

    #[test]
    fn test_indexed_result_set() {
        let (vix, sim) = Vix::simulated();
        let done = listing(&vix, &sim)
            .wait_completed()
            .expect("wait should succeed");

        assert_eq!(done.count(VIX_PROPERTY_JOB_RESULT_ITEM_NAME).expect("count should succeed"), 3);
        let ids = [VIX_PROPERTY_JOB_RESULT_ITEM_NAME, VIX_PROPERTY_JOB_RESULT_FILE_FLAGS];
        for (i, (name, flags)) in [("a", 1), ("b", 0), ("c", 2)].into_iter().enumerate() {
            let row = done.nth_properties(i, &ids).expect("nth should succeed");
            assert_eq!(row, vec![PropertyValue::from(name), PropertyValue::Integer(flags)]);
        }

        let err = done.nth_properties(3, &ids).expect_err("index 3 is out of range");
        assert_eq!(err.code(), codes::VIX_E_INVALID_ARG);
    }

    #[test]
    fn test_rows_with_no_ids() {
        let (vix, sim) = Vix::simulated();
        let done = listing(&vix, &sim)
            .wait_completed()
            .expect("wait should succeed");
        assert!(done.rows(&[]).expect("rows should succeed").is_empty());
    }

    #[test]
    fn test_wait_releases_job_on_failure() {
        let (vix, sim) = Vix::simulated();
        let vm = sim.create_vm("/vms/a.vmx");
        let _vm = vix.adopt(vm);
        sim.respond("VixVM_Reset", Outcome::fail(codes::VIX_E_VM_NOT_RUNNING));

        let job = vix
            .dispatch(Operation::VmReset { vm, options: 0 })
            .expect("dispatch should succeed");
        let handle = job.handle();
        assert_eq!(job.op(), "VixVM_Reset");

        let err = job.wait(&[]).expect_err("wait should fail");
        assert_eq!(err.code(), codes::VIX_E_VM_NOT_RUNNING);
        assert_eq!(sim.release_count(handle), 1);
        assert!(!vix.handles().is_live(handle));
    }
}
