//! [`Backend`] over the VIX shared library.

use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use tracing::{error, trace};

use super::error::{c_string, c_string_opt, check, opt_ptr, take_blob, take_string};
use super::raw::*;
use crate::backend::{Backend, Count, Lookup, NotificationSink, Operation};
use crate::codes::{self, ErrorCode};
use crate::handle::Handle;
use crate::property::{HandleType, PropertyId, PropertyType, PropertyValue};

/// Client data handed to the library with every call that has a sink.
///
/// Boxed per dispatch and freed by the trampoline on the job's completion
/// event.
struct CallbackData {
    sink: Arc<dyn NotificationSink>,
}

unsafe extern "C" fn trampoline(
    job: VixHandle,
    event_type: VixEventType,
    more_info: VixHandle,
    client_data: *mut c_void,
) {
    if client_data.is_null() {
        return;
    }
    let data = &*(client_data as *const CallbackData);
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
        data.sink.notify(
            Handle::from_raw(job),
            event_type,
            Handle::from_raw(more_info),
        )
    }));
    if delivered.is_err() {
        error!(job, event_type, "notification sink panicked");
    }
    if event_type == VIX_EVENTTYPE_JOB_COMPLETED {
        drop(Box::from_raw(client_data as *mut CallbackData));
    }
}

/// Out-pointer for one property read.
enum Slot<'a> {
    Int(&'a mut c_int),
    Int64(&'a mut i64),
    Bool(&'a mut Bool),
    Str(&'a mut *mut c_char),
    Handle(&'a mut VixHandle),
    Blob(&'a mut c_int, &'a mut *mut c_char),
}

/// Read one property as `ty` through `get`, which issues the variadic call.
fn read_typed<F>(ty: PropertyType, mut get: F) -> Result<PropertyValue, ErrorCode>
where
    F: FnMut(Slot<'_>) -> VixError,
{
    match ty {
        PropertyType::Integer => {
            let mut v: c_int = 0;
            check(get(Slot::Int(&mut v)))?;
            Ok(PropertyValue::Integer(v))
        }
        PropertyType::Int64 => {
            let mut v: i64 = 0;
            check(get(Slot::Int64(&mut v)))?;
            Ok(PropertyValue::Int64(v))
        }
        PropertyType::Bool => {
            let mut v: Bool = 0;
            check(get(Slot::Bool(&mut v)))?;
            Ok(PropertyValue::Bool(v != 0))
        }
        PropertyType::String => {
            let mut p: *mut c_char = ptr::null_mut();
            check(get(Slot::Str(&mut p)))?;
            Ok(PropertyValue::String(unsafe { take_string(p) }))
        }
        PropertyType::Handle => {
            let mut h: VixHandle = VIX_INVALID_HANDLE;
            check(get(Slot::Handle(&mut h)))?;
            Ok(PropertyValue::Handle(Handle::from_raw(h)))
        }
        PropertyType::Blob => {
            let mut len: c_int = 0;
            let mut p: *mut c_char = ptr::null_mut();
            check(get(Slot::Blob(&mut len, &mut p)))?;
            Ok(PropertyValue::Blob(unsafe { take_blob(p, len) }))
        }
        PropertyType::Any => Err(codes::VIX_E_TYPE_MISMATCH),
    }
}

/// The VIX shared library.
#[derive(Debug, Default)]
pub struct NativeLibrary {
    _private: (),
}

impl NativeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `op`. `cb` and `cd` are the callback and its client data.
    ///
    /// # Safety
    ///
    /// `cd` must be null or a pointer the trampoline can consume.
    unsafe fn call(
        &self,
        op: &Operation,
        cb: VixEventProc,
        cd: *mut c_void,
    ) -> Result<VixHandle, ErrorCode> {
        use Operation::*;
        let none = VIX_INVALID_HANDLE;

        let job = match op {
            HostConnect {
                api_version,
                provider,
                host_name,
                port,
                user_name,
                password,
                options,
            } => {
                let host_name = c_string_opt(host_name.as_deref())?;
                let user_name = c_string_opt(user_name.as_deref())?;
                let password = c_string_opt(password.as_deref())?;
                VixHost_Connect(
                    *api_version,
                    *provider,
                    opt_ptr(&host_name),
                    *port,
                    opt_ptr(&user_name),
                    opt_ptr(&password),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            HostRegisterVm { host, vmx_path } => {
                let path = c_string(vmx_path)?;
                VixHost_RegisterVM(host.raw(), path.as_ptr(), cb, cd)
            }
            HostUnregisterVm { host, vmx_path } => {
                let path = c_string(vmx_path)?;
                VixHost_UnregisterVM(host.raw(), path.as_ptr(), cb, cd)
            }
            HostFindItems {
                host,
                search_type,
                timeout_secs,
            } => VixHost_FindItems(host.raw(), *search_type, none, *timeout_secs, cb, cd),

            VmOpen { host, vmx_path } => {
                let path = c_string(vmx_path)?;
                VixVM_Open(host.raw(), path.as_ptr(), cb, cd)
            }
            VmPowerOn { vm, options } => VixVM_PowerOn(vm.raw(), *options, none, cb, cd),
            VmPowerOff { vm, options } => VixVM_PowerOff(vm.raw(), *options, cb, cd),
            VmReset { vm, options } => VixVM_Reset(vm.raw(), *options, cb, cd),
            VmSuspend { vm, options } => VixVM_Suspend(vm.raw(), *options, cb, cd),
            VmDelete { vm, options } => VixVM_Delete(vm.raw(), *options, cb, cd),
            VmUpgradeVirtualHardware { vm, options } => {
                VixVM_UpgradeVirtualHardware(vm.raw(), *options, cb, cd)
            }
            VmInstallTools {
                vm,
                options,
                command_line,
            } => {
                let command_line = c_string_opt(command_line.as_deref())?;
                VixVM_InstallTools(vm.raw(), *options, opt_ptr(&command_line), cb, cd)
            }
            VmWaitForToolsInGuest { vm, timeout_secs } => {
                VixVM_WaitForToolsInGuest(vm.raw(), *timeout_secs, cb, cd)
            }

            VmLoginInGuest {
                vm,
                user_name,
                password,
                options,
            } => {
                let user_name = c_string(user_name)?;
                let password = c_string(password)?;
                VixVM_LoginInGuest(
                    vm.raw(),
                    user_name.as_ptr(),
                    password.as_ptr(),
                    *options,
                    cb,
                    cd,
                )
            }
            VmLogoutFromGuest { vm } => VixVM_LogoutFromGuest(vm.raw(), cb, cd),
            VmRunProgramInGuest {
                vm,
                program,
                args,
                options,
            } => {
                let program = c_string(program)?;
                let args = c_string(args)?;
                VixVM_RunProgramInGuest(
                    vm.raw(),
                    program.as_ptr(),
                    args.as_ptr(),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            VmRunScriptInGuest {
                vm,
                interpreter,
                script,
                options,
            } => {
                let interpreter = c_string(interpreter)?;
                let script = c_string(script)?;
                VixVM_RunScriptInGuest(
                    vm.raw(),
                    interpreter.as_ptr(),
                    script.as_ptr(),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            VmOpenUrlInGuest {
                vm,
                url,
                window_state,
            } => {
                let url = c_string(url)?;
                VixVM_OpenUrlInGuest(vm.raw(), url.as_ptr(), *window_state, none, cb, cd)
            }
            VmListProcessesInGuest { vm, options } => {
                VixVM_ListProcessesInGuest(vm.raw(), *options, cb, cd)
            }
            VmKillProcessInGuest { vm, pid, options } => {
                VixVM_KillProcessInGuest(vm.raw(), *pid, *options, cb, cd)
            }

            VmCopyFileFromHostToGuest {
                vm,
                host_path,
                guest_path,
                options,
            } => {
                let host_path = c_string(host_path)?;
                let guest_path = c_string(guest_path)?;
                VixVM_CopyFileFromHostToGuest(
                    vm.raw(),
                    host_path.as_ptr(),
                    guest_path.as_ptr(),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            VmCopyFileFromGuestToHost {
                vm,
                guest_path,
                host_path,
                options,
            } => {
                let guest_path = c_string(guest_path)?;
                let host_path = c_string(host_path)?;
                VixVM_CopyFileFromGuestToHost(
                    vm.raw(),
                    guest_path.as_ptr(),
                    host_path.as_ptr(),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            VmCreateDirectoryInGuest { vm, path } => {
                let path = c_string(path)?;
                VixVM_CreateDirectoryInGuest(vm.raw(), path.as_ptr(), none, cb, cd)
            }
            VmDeleteDirectoryInGuest { vm, path, options } => {
                let path = c_string(path)?;
                VixVM_DeleteDirectoryInGuest(vm.raw(), path.as_ptr(), *options, cb, cd)
            }
            VmDirectoryExistsInGuest { vm, path } => {
                let path = c_string(path)?;
                VixVM_DirectoryExistsInGuest(vm.raw(), path.as_ptr(), cb, cd)
            }
            VmDeleteFileInGuest { vm, path } => {
                let path = c_string(path)?;
                VixVM_DeleteFileInGuest(vm.raw(), path.as_ptr(), cb, cd)
            }
            VmFileExistsInGuest { vm, path } => {
                let path = c_string(path)?;
                VixVM_FileExistsInGuest(vm.raw(), path.as_ptr(), cb, cd)
            }
            VmListDirectoryInGuest { vm, path, options } => {
                let path = c_string(path)?;
                VixVM_ListDirectoryInGuest(vm.raw(), path.as_ptr(), *options, cb, cd)
            }
            VmRenameFileInGuest {
                vm,
                old_name,
                new_name,
                options,
            } => {
                let old_name = c_string(old_name)?;
                let new_name = c_string(new_name)?;
                VixVM_RenameFileInGuest(
                    vm.raw(),
                    old_name.as_ptr(),
                    new_name.as_ptr(),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            VmCreateTempFileInGuest { vm, options } => {
                VixVM_CreateTempFileInGuest(vm.raw(), *options, none, cb, cd)
            }

            VmEnableSharedFolders {
                vm,
                enabled,
                options,
            } => VixVM_EnableSharedFolders(vm.raw(), Bool::from(*enabled), *options, cb, cd),
            VmAddSharedFolder {
                vm,
                share_name,
                host_path,
                flags,
            } => {
                let share_name = c_string(share_name)?;
                let host_path = c_string(host_path)?;
                VixVM_AddSharedFolder(
                    vm.raw(),
                    share_name.as_ptr(),
                    host_path.as_ptr(),
                    *flags,
                    cb,
                    cd,
                )
            }
            VmRemoveSharedFolder {
                vm,
                share_name,
                flags,
            } => {
                let share_name = c_string(share_name)?;
                VixVM_RemoveSharedFolder(vm.raw(), share_name.as_ptr(), *flags, cb, cd)
            }
            VmGetNumSharedFolders { vm } => VixVM_GetNumSharedFolders(vm.raw(), cb, cd),
            VmGetSharedFolderState { vm, index } => {
                VixVM_GetSharedFolderState(vm.raw(), *index, cb, cd)
            }
            VmSetSharedFolderState {
                vm,
                share_name,
                host_path,
                flags,
            } => {
                let share_name = c_string(share_name)?;
                let host_path = c_string(host_path)?;
                VixVM_SetSharedFolderState(
                    vm.raw(),
                    share_name.as_ptr(),
                    host_path.as_ptr(),
                    *flags,
                    cb,
                    cd,
                )
            }

            VmCreateSnapshot {
                vm,
                name,
                description,
                options,
            } => {
                let name = c_string(name)?;
                let description = c_string(description)?;
                VixVM_CreateSnapshot(
                    vm.raw(),
                    name.as_ptr(),
                    description.as_ptr(),
                    *options,
                    none,
                    cb,
                    cd,
                )
            }
            VmRemoveSnapshot {
                vm,
                snapshot,
                options,
            } => VixVM_RemoveSnapshot(vm.raw(), snapshot.raw(), *options, cb, cd),
            VmRevertToSnapshot {
                vm,
                snapshot,
                options,
            } => VixVM_RevertToSnapshot(vm.raw(), snapshot.raw(), *options, none, cb, cd),
        };
        Ok(job)
    }
}

impl Backend for NativeLibrary {
    fn dispatch(
        &self,
        op: &Operation,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Handle, ErrorCode> {
        let (cb, cd): (VixEventProc, *mut c_void) = match sink {
            Some(sink) => (
                Some(trampoline),
                Box::into_raw(Box::new(CallbackData { sink })).cast(),
            ),
            None => (None, ptr::null_mut()),
        };

        let job = unsafe { self.call(op, cb, cd) };
        match job {
            Ok(job) if job != VIX_INVALID_HANDLE => {
                trace!(op = op.name(), job, "native call issued");
                Ok(Handle::from_raw(job))
            }
            failed => {
                // No job means no completion event; take the box back.
                if !cd.is_null() {
                    drop(unsafe { Box::from_raw(cd as *mut CallbackData) });
                }
                Err(failed.err().unwrap_or(codes::VIX_E_FAIL))
            }
        }
    }

    fn lookup(&self, query: &Lookup) -> Result<Handle, ErrorCode> {
        let mut out: VixHandle = VIX_INVALID_HANDLE;
        let err = unsafe {
            match query {
                Lookup::VmRootSnapshot { vm, index } => {
                    VixVM_GetRootSnapshot(vm.raw(), *index, &mut out)
                }
                Lookup::VmCurrentSnapshot { vm } => VixVM_GetCurrentSnapshot(vm.raw(), &mut out),
                Lookup::VmNamedSnapshot { vm, name } => {
                    let name = c_string(name)?;
                    VixVM_GetNamedSnapshot(vm.raw(), name.as_ptr(), &mut out)
                }
                Lookup::SnapshotChild { snapshot, index } => {
                    VixSnapshot_GetChild(snapshot.raw(), *index, &mut out)
                }
                Lookup::SnapshotParent { snapshot } => {
                    VixSnapshot_GetParent(snapshot.raw(), &mut out)
                }
            }
        };
        check(err)?;
        Ok(Handle::from_raw(out))
    }

    fn count(&self, query: &Count) -> Result<i32, ErrorCode> {
        let mut n: c_int = 0;
        let err = unsafe {
            match query {
                Count::VmRootSnapshots { vm } => VixVM_GetNumRootSnapshots(vm.raw(), &mut n),
                Count::SnapshotChildren { snapshot } => {
                    VixSnapshot_GetNumChildren(snapshot.raw(), &mut n)
                }
            }
        };
        check(err)?;
        Ok(n)
    }

    fn add_ref(&self, handle: Handle) {
        unsafe { Vix_AddRefHandle(handle.raw()) }
    }

    fn release(&self, handle: Handle) {
        unsafe { Vix_ReleaseHandle(handle.raw()) }
    }

    fn handle_type(&self, handle: Handle) -> HandleType {
        HandleType::from_raw(unsafe { Vix_GetHandleType(handle.raw()) })
    }

    fn property_type(&self, handle: Handle, id: PropertyId) -> Result<PropertyType, ErrorCode> {
        let mut raw: VixPropertyType = VIX_PROPERTYTYPE_ANY;
        check(unsafe { Vix_GetPropertyType(handle.raw(), id.raw(), &mut raw) })?;
        Ok(PropertyType::from_raw(raw).unwrap_or(PropertyType::Any))
    }

    fn property(
        &self,
        handle: Handle,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<PropertyValue, ErrorCode> {
        let (h, id) = (handle.raw(), id.raw());
        read_typed(ty, |slot| unsafe {
            match slot {
                Slot::Int(v) => Vix_GetProperties(h, id, v as *mut c_int, VIX_PROPERTY_NONE),
                Slot::Int64(v) => Vix_GetProperties(h, id, v as *mut i64, VIX_PROPERTY_NONE),
                Slot::Bool(v) => Vix_GetProperties(h, id, v as *mut Bool, VIX_PROPERTY_NONE),
                Slot::Str(p) => Vix_GetProperties(h, id, p as *mut *mut c_char, VIX_PROPERTY_NONE),
                Slot::Handle(v) => Vix_GetProperties(h, id, v as *mut VixHandle, VIX_PROPERTY_NONE),
                Slot::Blob(len, p) => Vix_GetProperties(
                    h,
                    id,
                    len as *mut c_int,
                    p as *mut *mut c_char,
                    VIX_PROPERTY_NONE,
                ),
            }
        })
    }

    fn job_wait(&self, job: Handle) -> ErrorCode {
        match check(unsafe { VixJob_Wait(job.raw(), VIX_PROPERTY_NONE) }) {
            Ok(()) => codes::VIX_OK,
            Err(code) => code,
        }
    }

    fn job_check_completion(&self, job: Handle) -> Result<bool, ErrorCode> {
        let mut complete: Bool = 0;
        check(unsafe { VixJob_CheckCompletion(job.raw(), &mut complete) })?;
        Ok(complete != 0)
    }

    fn job_num_properties(&self, job: Handle, id: PropertyId) -> i32 {
        unsafe { VixJob_GetNumProperties(job.raw(), id.raw()) }
    }

    fn job_nth_property(
        &self,
        job: Handle,
        index: i32,
        id: PropertyId,
        ty: PropertyType,
    ) -> Result<PropertyValue, ErrorCode> {
        let (j, id) = (job.raw(), id.raw());
        read_typed(ty, |slot| unsafe {
            match slot {
                Slot::Int(v) => {
                    VixJob_GetNthProperties(j, index, id, v as *mut c_int, VIX_PROPERTY_NONE)
                }
                Slot::Int64(v) => {
                    VixJob_GetNthProperties(j, index, id, v as *mut i64, VIX_PROPERTY_NONE)
                }
                Slot::Bool(v) => {
                    VixJob_GetNthProperties(j, index, id, v as *mut Bool, VIX_PROPERTY_NONE)
                }
                Slot::Str(p) => VixJob_GetNthProperties(
                    j,
                    index,
                    id,
                    p as *mut *mut c_char,
                    VIX_PROPERTY_NONE,
                ),
                Slot::Handle(v) => {
                    VixJob_GetNthProperties(j, index, id, v as *mut VixHandle, VIX_PROPERTY_NONE)
                }
                Slot::Blob(len, p) => VixJob_GetNthProperties(
                    j,
                    index,
                    id,
                    len as *mut c_int,
                    p as *mut *mut c_char,
                    VIX_PROPERTY_NONE,
                ),
            }
        })
    }

    fn disconnect(&self, host: Handle) {
        unsafe { VixHost_Disconnect(host.raw()) }
    }

    fn pump_events(&self, host: Handle, options: i32) {
        unsafe { Vix_PumpEvents(host.raw(), options) }
    }
}
