//! VM snapshots.

use std::fmt;

use crate::backend::{Count, Lookup};
use crate::error::Result;
use crate::handle::{Handle, OwnedHandle};
use crate::property::{
    self, PropertyId, PropertyValue, VIX_PROPERTY_SNAPSHOT_DESCRIPTION,
    VIX_PROPERTY_SNAPSHOT_DISPLAYNAME, VIX_PROPERTY_SNAPSHOT_POWERSTATE,
};
use crate::types::PowerState;
use crate::vix::Vix;
use crate::vm::native_index;

/// A node in a VM's snapshot tree.
///
/// Two `Snapshot` values are equal when they refer to the same native handle.
///
/// # Example
///
/// ```no_run
/// # use vix::Vm;
/// # fn example(vm: &Vm) -> vix::Result<()> {
/// let snap = vm.create_snapshot("clean", "before upgrade", 0)?;
/// println!("{} has {} children", snap.display_name()?, snap.num_children()?);
///
/// // Roll back later
/// vm.revert_to_snapshot(&snap, 0)?;
/// # Ok(())
/// # }
/// ```
pub struct Snapshot {
    vix: Vix,
    handle: OwnedHandle,
}

impl Snapshot {
    pub(crate) fn from_handle(vix: Vix, handle: OwnedHandle) -> Self {
        Self { vix, handle }
    }

    /// The snapshot handle.
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    pub fn num_children(&self) -> Result<usize> {
        self.vix
            .lookup_count(Count::SnapshotChildren { snapshot: self.handle() })
    }

    /// Child at `index`, counted from 0.
    pub fn child(&self, index: usize) -> Result<Snapshot> {
        let index = native_index(index, "VixSnapshot_GetChild")?;
        let handle = self.vix.lookup(Lookup::SnapshotChild {
            snapshot: self.handle(),
            index,
        })?;
        Ok(Self::from_handle(self.vix.clone(), handle))
    }

    /// Parent snapshot. Fails with `VIX_E_SNAPSHOT_NOTFOUND` on a root.
    pub fn parent(&self) -> Result<Snapshot> {
        let handle = self
            .vix
            .lookup(Lookup::SnapshotParent { snapshot: self.handle() })?;
        Ok(Self::from_handle(self.vix.clone(), handle))
    }

    pub fn display_name(&self) -> Result<String> {
        self.read(VIX_PROPERTY_SNAPSHOT_DISPLAYNAME)?.into_string()
    }

    pub fn description(&self) -> Result<String> {
        self.read(VIX_PROPERTY_SNAPSHOT_DESCRIPTION)?.into_string()
    }

    /// Power state the VM was in when the snapshot was taken.
    pub fn power_state(&self) -> Result<PowerState> {
        Ok(PowerState::from_bits(
            self.read(VIX_PROPERTY_SNAPSHOT_POWERSTATE)?.as_int()?,
        ))
    }

    /// Release the snapshot handle now.
    pub fn close(self) {
        self.handle.release();
    }

    fn read(&self, id: PropertyId) -> Result<PropertyValue> {
        let values = self.vix.properties(self.handle(), &[id])?;
        let [value] = property::fixed::<1>(values, "Vix_GetProperties")?;
        Ok(value)
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for Snapshot {}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("handle", &self.handle())
            .finish()
    }
}
