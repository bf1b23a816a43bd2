//! The seam between the binding and the library that does the work.
//!
//! [`Backend`] is the whole native contract: asynchronous calls that return a
//! job handle, synchronous lookups, reference counting and property access.
//! The real library implements it behind the `native` feature; the
//! [`SimBackend`](crate::sim::SimBackend) implements it in process.

use std::sync::Arc;

use crate::codes::ErrorCode;
use crate::handle::Handle;
use crate::property::{HandleType, PropertyId, PropertyType, PropertyValue};

/// Receives native notifications for one dispatched call.
///
/// Called on whatever thread the library uses for notifications. `more_info`
/// is only valid for the duration of the call; implementations that keep it
/// must take their own reference.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, job: Handle, event_type: i32, more_info: Handle);
}

/// Native library contract.
pub trait Backend: Send + Sync + 'static {
    /// Start an asynchronous operation and return its job handle.
    ///
    /// The returned handle carries one reference owned by the caller.
    fn dispatch(
        &self,
        op: &Operation,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Handle, ErrorCode>;

    /// Synchronous call returning a new reference to an object.
    fn lookup(&self, query: &Lookup) -> Result<Handle, ErrorCode>;

    /// Synchronous call returning a count.
    fn count(&self, query: &Count) -> Result<i32, ErrorCode>;

    /// `Vix_AddRefHandle`.
    fn add_ref(&self, handle: Handle);

    /// `Vix_ReleaseHandle`.
    fn release(&self, handle: Handle);

    /// `Vix_GetHandleType`.
    fn handle_type(&self, handle: Handle) -> HandleType;

    /// `Vix_GetPropertyType`.
    fn property_type(&self, handle: Handle, id: PropertyId) -> Result<PropertyType, ErrorCode>;

    /// `Vix_GetProperties` for one id read as `ty`.
    fn property(
        &self,
        handle: Handle,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<PropertyValue, ErrorCode>;

    /// `VixJob_Wait` without result properties. Blocks until the job is terminal.
    fn job_wait(&self, job: Handle) -> ErrorCode;

    /// `VixJob_CheckCompletion`.
    fn job_check_completion(&self, job: Handle) -> Result<bool, ErrorCode>;

    /// `VixJob_GetNumProperties`.
    fn job_num_properties(&self, job: Handle, id: PropertyId) -> i32;

    /// `VixJob_GetNthProperties` for one id read as `ty`.
    fn job_nth_property(
        &self,
        job: Handle,
        index: i32,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<PropertyValue, ErrorCode>;

    /// `VixHost_Disconnect`. Destroys the host handle.
    fn disconnect(&self, host: Handle);

    /// `Vix_PumpEvents`.
    fn pump_events(&self, host: Handle, options: i32);
}

/// An asynchronous native call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    HostConnect {
        api_version: i32,
        provider: i32,
        host_name: Option<String>,
        port: i32,
        user_name: Option<String>,
        password: Option<String>,
        options: i32,
    },
    HostRegisterVm { host: Handle, vmx_path: String },
    HostUnregisterVm { host: Handle, vmx_path: String },
    HostFindItems { host: Handle, search_type: i32, timeout_secs: i32 },

    VmOpen { host: Handle, vmx_path: String },
    VmPowerOn { vm: Handle, options: i32 },
    VmPowerOff { vm: Handle, options: i32 },
    VmReset { vm: Handle, options: i32 },
    VmSuspend { vm: Handle, options: i32 },
    VmDelete { vm: Handle, options: i32 },
    VmUpgradeVirtualHardware { vm: Handle, options: i32 },
    VmInstallTools { vm: Handle, options: i32, command_line: Option<String> },
    VmWaitForToolsInGuest { vm: Handle, timeout_secs: i32 },

    VmLoginInGuest { vm: Handle, user_name: String, password: String, options: i32 },
    VmLogoutFromGuest { vm: Handle },
    VmRunProgramInGuest { vm: Handle, program: String, args: String, options: i32 },
    VmRunScriptInGuest { vm: Handle, interpreter: String, script: String, options: i32 },
    VmOpenUrlInGuest { vm: Handle, url: String, window_state: i32 },
    VmListProcessesInGuest { vm: Handle, options: i32 },
    VmKillProcessInGuest { vm: Handle, pid: u64, options: i32 },

    VmCopyFileFromHostToGuest { vm: Handle, host_path: String, guest_path: String, options: i32 },
    VmCopyFileFromGuestToHost { vm: Handle, guest_path: String, host_path: String, options: i32 },
    VmCreateDirectoryInGuest { vm: Handle, path: String },
    VmDeleteDirectoryInGuest { vm: Handle, path: String, options: i32 },
    VmDirectoryExistsInGuest { vm: Handle, path: String },
    VmDeleteFileInGuest { vm: Handle, path: String },
    VmFileExistsInGuest { vm: Handle, path: String },
    VmListDirectoryInGuest { vm: Handle, path: String, options: i32 },
    VmRenameFileInGuest { vm: Handle, old_name: String, new_name: String, options: i32 },
    VmCreateTempFileInGuest { vm: Handle, options: i32 },

    VmEnableSharedFolders { vm: Handle, enabled: bool, options: i32 },
    VmAddSharedFolder { vm: Handle, share_name: String, host_path: String, flags: i32 },
    VmRemoveSharedFolder { vm: Handle, share_name: String, flags: i32 },
    VmGetNumSharedFolders { vm: Handle },
    VmGetSharedFolderState { vm: Handle, index: i32 },
    VmSetSharedFolderState { vm: Handle, share_name: String, host_path: String, flags: i32 },

    VmCreateSnapshot { vm: Handle, name: String, description: String, options: i32 },
    VmRemoveSnapshot { vm: Handle, snapshot: Handle, options: i32 },
    VmRevertToSnapshot { vm: Handle, snapshot: Handle, options: i32 },
}

impl Operation {
    /// Name of the native function this call maps to.
    pub fn name(&self) -> &'static str {
        use Operation::*;
        match self {
            HostConnect { .. } => "VixHost_Connect",
            HostRegisterVm { .. } => "VixHost_RegisterVM",
            HostUnregisterVm { .. } => "VixHost_UnregisterVM",
            HostFindItems { .. } => "VixHost_FindItems",
            VmOpen { .. } => "VixVM_Open",
            VmPowerOn { .. } => "VixVM_PowerOn",
            VmPowerOff { .. } => "VixVM_PowerOff",
            VmReset { .. } => "VixVM_Reset",
            VmSuspend { .. } => "VixVM_Suspend",
            VmDelete { .. } => "VixVM_Delete",
            VmUpgradeVirtualHardware { .. } => "VixVM_UpgradeVirtualHardware",
            VmInstallTools { .. } => "VixVM_InstallTools",
            VmWaitForToolsInGuest { .. } => "VixVM_WaitForToolsInGuest",
            VmLoginInGuest { .. } => "VixVM_LoginInGuest",
            VmLogoutFromGuest { .. } => "VixVM_LogoutFromGuest",
            VmRunProgramInGuest { .. } => "VixVM_RunProgramInGuest",
            VmRunScriptInGuest { .. } => "VixVM_RunScriptInGuest",
            VmOpenUrlInGuest { .. } => "VixVM_OpenUrlInGuest",
            VmListProcessesInGuest { .. } => "VixVM_ListProcessesInGuest",
            VmKillProcessInGuest { .. } => "VixVM_KillProcessInGuest",
            VmCopyFileFromHostToGuest { .. } => "VixVM_CopyFileFromHostToGuest",
            VmCopyFileFromGuestToHost { .. } => "VixVM_CopyFileFromGuestToHost",
            VmCreateDirectoryInGuest { .. } => "VixVM_CreateDirectoryInGuest",
            VmDeleteDirectoryInGuest { .. } => "VixVM_DeleteDirectoryInGuest",
            VmDirectoryExistsInGuest { .. } => "VixVM_DirectoryExistsInGuest",
            VmDeleteFileInGuest { .. } => "VixVM_DeleteFileInGuest",
            VmFileExistsInGuest { .. } => "VixVM_FileExistsInGuest",
            VmListDirectoryInGuest { .. } => "VixVM_ListDirectoryInGuest",
            VmRenameFileInGuest { .. } => "VixVM_RenameFileInGuest",
            VmCreateTempFileInGuest { .. } => "VixVM_CreateTempFileInGuest",
            VmEnableSharedFolders { .. } => "VixVM_EnableSharedFolders",
            VmAddSharedFolder { .. } => "VixVM_AddSharedFolder",
            VmRemoveSharedFolder { .. } => "VixVM_RemoveSharedFolder",
            VmGetNumSharedFolders { .. } => "VixVM_GetNumSharedFolders",
            VmGetSharedFolderState { .. } => "VixVM_GetSharedFolderState",
            VmSetSharedFolderState { .. } => "VixVM_SetSharedFolderState",
            VmCreateSnapshot { .. } => "VixVM_CreateSnapshot",
            VmRemoveSnapshot { .. } => "VixVM_RemoveSnapshot",
            VmRevertToSnapshot { .. } => "VixVM_RevertToSnapshot",
        }
    }

    /// Handle the call operates on; invalid for connection-establishing calls.
    pub fn target(&self) -> Handle {
        use Operation::*;
        match self {
            HostConnect { .. } => Handle::INVALID,
            HostRegisterVm { host, .. }
            | HostUnregisterVm { host, .. }
            | HostFindItems { host, .. }
            | VmOpen { host, .. } => *host,
            VmPowerOn { vm, .. }
            | VmPowerOff { vm, .. }
            | VmReset { vm, .. }
            | VmSuspend { vm, .. }
            | VmDelete { vm, .. }
            | VmUpgradeVirtualHardware { vm, .. }
            | VmInstallTools { vm, .. }
            | VmWaitForToolsInGuest { vm, .. }
            | VmLoginInGuest { vm, .. }
            | VmLogoutFromGuest { vm }
            | VmRunProgramInGuest { vm, .. }
            | VmRunScriptInGuest { vm, .. }
            | VmOpenUrlInGuest { vm, .. }
            | VmListProcessesInGuest { vm, .. }
            | VmKillProcessInGuest { vm, .. }
            | VmCopyFileFromHostToGuest { vm, .. }
            | VmCopyFileFromGuestToHost { vm, .. }
            | VmCreateDirectoryInGuest { vm, .. }
            | VmDeleteDirectoryInGuest { vm, .. }
            | VmDirectoryExistsInGuest { vm, .. }
            | VmDeleteFileInGuest { vm, .. }
            | VmFileExistsInGuest { vm, .. }
            | VmListDirectoryInGuest { vm, .. }
            | VmRenameFileInGuest { vm, .. }
            | VmCreateTempFileInGuest { vm, .. }
            | VmEnableSharedFolders { vm, .. }
            | VmAddSharedFolder { vm, .. }
            | VmRemoveSharedFolder { vm, .. }
            | VmGetNumSharedFolders { vm }
            | VmGetSharedFolderState { vm, .. }
            | VmSetSharedFolderState { vm, .. }
            | VmCreateSnapshot { vm, .. }
            | VmRemoveSnapshot { vm, .. }
            | VmRevertToSnapshot { vm, .. } => *vm,
        }
    }
}

/// A synchronous native call that hands back an object reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    VmRootSnapshot { vm: Handle, index: i32 },
    VmCurrentSnapshot { vm: Handle },
    VmNamedSnapshot { vm: Handle, name: String },
    SnapshotChild { snapshot: Handle, index: i32 },
    SnapshotParent { snapshot: Handle },
}

impl Lookup {
    /// Name of the native function this call maps to.
    pub fn name(&self) -> &'static str {
        match self {
            Lookup::VmRootSnapshot { .. } => "VixVM_GetRootSnapshot",
            Lookup::VmCurrentSnapshot { .. } => "VixVM_GetCurrentSnapshot",
            Lookup::VmNamedSnapshot { .. } => "VixVM_GetNamedSnapshot",
            Lookup::SnapshotChild { .. } => "VixSnapshot_GetChild",
            Lookup::SnapshotParent { .. } => "VixSnapshot_GetParent",
        }
    }

    /// Handle the call operates on.
    pub fn target(&self) -> Handle {
        match self {
            Lookup::VmRootSnapshot { vm, .. }
            | Lookup::VmCurrentSnapshot { vm }
            | Lookup::VmNamedSnapshot { vm, .. } => *vm,
            Lookup::SnapshotChild { snapshot, .. } | Lookup::SnapshotParent { snapshot } => {
                *snapshot
            }
        }
    }
}

/// A synchronous native call that returns a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    VmRootSnapshots { vm: Handle },
    SnapshotChildren { snapshot: Handle },
}

impl Count {
    /// Name of the native function this call maps to.
    pub fn name(&self) -> &'static str {
        match self {
            Count::VmRootSnapshots { .. } => "VixVM_GetNumRootSnapshots",
            Count::SnapshotChildren { .. } => "VixSnapshot_GetNumChildren",
        }
    }

    /// Handle the call operates on.
    pub fn target(&self) -> Handle {
        match self {
            Count::VmRootSnapshots { vm } => *vm,
            Count::SnapshotChildren { snapshot } => *snapshot,
        }
    }
}
