//! Raw C function bindings for the VIX library.
//!
//! Direct declarations of the C API. Users should prefer the safe wrappers
//! in the parent modules.

#![allow(non_snake_case, non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

pub type VixHandle = c_int;
pub type VixError = u64;
pub type VixPropertyID = c_int;
pub type VixPropertyType = c_int;
pub type VixHandleType = c_int;
pub type VixEventType = c_int;
pub type Bool = c_char;

/// Notification callback.
pub type VixEventProc = Option<
    unsafe extern "C" fn(
        handle: VixHandle,
        event_type: VixEventType,
        more_event_info: VixHandle,
        client_data: *mut c_void,
    ),
>;

pub const VIX_INVALID_HANDLE: VixHandle = 0;
pub const VIX_OK: VixError = 0;
pub const VIX_PROPERTY_NONE: VixPropertyID = 0;

// Event types
pub const VIX_EVENTTYPE_JOB_COMPLETED: VixEventType = 2;
pub const VIX_EVENTTYPE_JOB_PROGRESS: VixEventType = 3;
pub const VIX_EVENTTYPE_FIND_ITEM: VixEventType = 8;

// Property types
pub const VIX_PROPERTYTYPE_ANY: VixPropertyType = 0;
pub const VIX_PROPERTYTYPE_INTEGER: VixPropertyType = 1;
pub const VIX_PROPERTYTYPE_STRING: VixPropertyType = 2;
pub const VIX_PROPERTYTYPE_BOOL: VixPropertyType = 3;
pub const VIX_PROPERTYTYPE_HANDLE: VixPropertyType = 4;
pub const VIX_PROPERTYTYPE_INT64: VixPropertyType = 5;
pub const VIX_PROPERTYTYPE_BLOB: VixPropertyType = 6;

// External C functions
extern "C" {
    // Handles and memory
    pub fn Vix_ReleaseHandle(handle: VixHandle);
    pub fn Vix_AddRefHandle(handle: VixHandle);
    pub fn Vix_GetHandleType(handle: VixHandle) -> VixHandleType;
    pub fn Vix_FreeBuffer(p: *mut c_void);
    pub fn Vix_PumpEvents(host: VixHandle, options: c_int);

    // Properties. The variadic list holds one out-pointer per id (two for
    // blobs) and ends with VIX_PROPERTY_NONE.
    pub fn Vix_GetProperties(handle: VixHandle, first: VixPropertyID, ...) -> VixError;
    pub fn Vix_GetPropertyType(
        handle: VixHandle,
        id: VixPropertyID,
        out: *mut VixPropertyType,
    ) -> VixError;

    // Jobs
    pub fn VixJob_Wait(job: VixHandle, first: VixPropertyID, ...) -> VixError;
    pub fn VixJob_CheckCompletion(job: VixHandle, complete: *mut Bool) -> VixError;
    pub fn VixJob_GetNumProperties(job: VixHandle, id: VixPropertyID) -> c_int;
    pub fn VixJob_GetNthProperties(
        job: VixHandle,
        index: c_int,
        first: VixPropertyID,
        ...
    ) -> VixError;

    // Host
    pub fn VixHost_Connect(
        api_version: c_int,
        host_type: c_int,
        host_name: *const c_char,
        host_port: c_int,
        user_name: *const c_char,
        password: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixHost_Disconnect(host: VixHandle);
    pub fn VixHost_RegisterVM(
        host: VixHandle,
        vmx_path: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixHost_UnregisterVM(
        host: VixHandle,
        vmx_path: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixHost_FindItems(
        host: VixHandle,
        search_type: c_int,
        search_criteria: VixHandle,
        timeout: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;

    // VM lifecycle
    pub fn VixVM_Open(
        host: VixHandle,
        vmx_path: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_PowerOn(
        vm: VixHandle,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_PowerOff(
        vm: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_Reset(
        vm: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_Suspend(
        vm: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_Delete(
        vm: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_UpgradeVirtualHardware(
        vm: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_InstallTools(
        vm: VixHandle,
        options: c_int,
        command_line: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_WaitForToolsInGuest(
        vm: VixHandle,
        timeout_secs: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;

    // Guest session and processes
    pub fn VixVM_LoginInGuest(
        vm: VixHandle,
        user_name: *const c_char,
        password: *const c_char,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_LogoutFromGuest(
        vm: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_RunProgramInGuest(
        vm: VixHandle,
        program: *const c_char,
        args: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_RunScriptInGuest(
        vm: VixHandle,
        interpreter: *const c_char,
        script: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_OpenUrlInGuest(
        vm: VixHandle,
        url: *const c_char,
        window_state: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_ListProcessesInGuest(
        vm: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_KillProcessInGuest(
        vm: VixHandle,
        pid: u64,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;

    // Guest files
    pub fn VixVM_CopyFileFromHostToGuest(
        vm: VixHandle,
        host_path: *const c_char,
        guest_path: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_CopyFileFromGuestToHost(
        vm: VixHandle,
        guest_path: *const c_char,
        host_path: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_CreateDirectoryInGuest(
        vm: VixHandle,
        path: *const c_char,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_DeleteDirectoryInGuest(
        vm: VixHandle,
        path: *const c_char,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_DirectoryExistsInGuest(
        vm: VixHandle,
        path: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_DeleteFileInGuest(
        vm: VixHandle,
        path: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_FileExistsInGuest(
        vm: VixHandle,
        path: *const c_char,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_ListDirectoryInGuest(
        vm: VixHandle,
        path: *const c_char,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_RenameFileInGuest(
        vm: VixHandle,
        old_name: *const c_char,
        new_name: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_CreateTempFileInGuest(
        vm: VixHandle,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;

    // Shared folders
    pub fn VixVM_EnableSharedFolders(
        vm: VixHandle,
        enabled: Bool,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_AddSharedFolder(
        vm: VixHandle,
        share_name: *const c_char,
        host_path: *const c_char,
        flags: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_RemoveSharedFolder(
        vm: VixHandle,
        share_name: *const c_char,
        flags: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_GetNumSharedFolders(
        vm: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_GetSharedFolderState(
        vm: VixHandle,
        index: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_SetSharedFolderState(
        vm: VixHandle,
        share_name: *const c_char,
        host_path: *const c_char,
        flags: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;

    // Snapshots
    pub fn VixVM_CreateSnapshot(
        vm: VixHandle,
        name: *const c_char,
        description: *const c_char,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_RemoveSnapshot(
        vm: VixHandle,
        snapshot: VixHandle,
        options: c_int,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_RevertToSnapshot(
        vm: VixHandle,
        snapshot: VixHandle,
        options: c_int,
        property_list: VixHandle,
        callback: VixEventProc,
        client_data: *mut c_void,
    ) -> VixHandle;
    pub fn VixVM_GetNumRootSnapshots(vm: VixHandle, result: *mut c_int) -> VixError;
    pub fn VixVM_GetRootSnapshot(vm: VixHandle, index: c_int, snapshot: *mut VixHandle)
        -> VixError;
    pub fn VixVM_GetCurrentSnapshot(vm: VixHandle, snapshot: *mut VixHandle) -> VixError;
    pub fn VixVM_GetNamedSnapshot(
        vm: VixHandle,
        name: *const c_char,
        snapshot: *mut VixHandle,
    ) -> VixError;
    pub fn VixSnapshot_GetNumChildren(parent: VixHandle, count: *mut c_int) -> VixError;
    pub fn VixSnapshot_GetChild(
        parent: VixHandle,
        index: c_int,
        child: *mut VixHandle,
    ) -> VixError;
    pub fn VixSnapshot_GetParent(snapshot: VixHandle, parent: *mut VixHandle) -> VixError;
}
