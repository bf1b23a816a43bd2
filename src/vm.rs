//! Virtual machine operations.

use std::fmt;

use tracing::debug;

use crate::backend::{Count, Lookup, Operation};
use crate::codes;
use crate::error::{Error, Result};
use crate::handle::{Handle, OwnedHandle};
use crate::property::{
    self, PropertyId, PropertyValue, VIX_PROPERTY_JOB_RESULT_FILE_FLAGS,
    VIX_PROPERTY_JOB_RESULT_GUEST_OBJECT_EXISTS, VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_ELAPSED_TIME,
    VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_EXIT_CODE, VIX_PROPERTY_JOB_RESULT_ITEM_NAME,
    VIX_PROPERTY_JOB_RESULT_PROCESS_BEING_DEBUGGED, VIX_PROPERTY_JOB_RESULT_PROCESS_COMMAND,
    VIX_PROPERTY_JOB_RESULT_PROCESS_ID, VIX_PROPERTY_JOB_RESULT_PROCESS_OWNER,
    VIX_PROPERTY_JOB_RESULT_PROCESS_START_TIME, VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_COUNT,
    VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_FLAGS, VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_HOST,
    VIX_PROPERTY_VM_IS_RUNNING, VIX_PROPERTY_VM_MEMORY_SIZE, VIX_PROPERTY_VM_NUM_VCPUS,
    VIX_PROPERTY_VM_POWER_STATE, VIX_PROPERTY_VM_READ_ONLY, VIX_PROPERTY_VM_SUPPORTED_FEATURES,
    VIX_PROPERTY_VM_TOOLS_STATE, VIX_PROPERTY_VM_VMX_PATHNAME,
};
use crate::snapshot::Snapshot;
use crate::types::{
    GuestFile, GuestProcess, PowerState, ProgramResult, SharedFolderState, ToolsState,
};
use crate::vix::Vix;

/// An open virtual machine.
///
/// Obtained from [`Host::open_vm`](crate::Host::open_vm). Guest operations
/// need running tools and, for most of them, a prior
/// [`login_in_guest`](Vm::login_in_guest).
///
/// # Example
///
/// ```no_run
/// use vix::{flags, ConnectOptions, Host, Vix};
///
/// # fn example(vix: &Vix) -> vix::Result<()> {
/// let host = Host::connect(vix, ConnectOptions::default())?;
/// let vm = host.open_vm("/vms/ubuntu/ubuntu.vmx")?;
///
/// vm.power_on(flags::VMPOWEROP_NORMAL)?;
/// vm.wait_for_tools_in_guest(300)?;
/// vm.login_in_guest("user", "secret", 0)?;
///
/// let result = vm.run_program_in_guest("/bin/true", "", 0)?;
/// println!("exit code {}", result.exit_code);
///
/// for entry in vm.list_directory_in_guest("/etc", 0)? {
///     println!("{} dir={}", entry.name, entry.is_directory());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Vm {
    vix: Vix,
    handle: OwnedHandle,
}

impl Vm {
    pub(crate) fn from_handle(vix: Vix, handle: OwnedHandle) -> Self {
        Self { vix, handle }
    }

    /// The VM handle.
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    fn run(&self, op: Operation) -> Result<()> {
        self.vix.dispatch(op)?.wait_completed()?;
        Ok(())
    }

    fn read(&self, id: PropertyId) -> Result<PropertyValue> {
        let values = self.vix.properties(self.handle(), &[id])?;
        let [value] = property::fixed::<1>(values, "Vix_GetProperties")?;
        Ok(value)
    }

    // Power

    pub fn power_on(&self, options: i32) -> Result<()> {
        self.run(Operation::VmPowerOn { vm: self.handle(), options })
    }

    pub fn power_off(&self, options: i32) -> Result<()> {
        self.run(Operation::VmPowerOff { vm: self.handle(), options })
    }

    pub fn reset(&self, options: i32) -> Result<()> {
        self.run(Operation::VmReset { vm: self.handle(), options })
    }

    pub fn suspend(&self, options: i32) -> Result<()> {
        self.run(Operation::VmSuspend { vm: self.handle(), options })
    }

    /// Delete the VM. Pass `VMDELETE_DISK_FILES` to remove its disks too.
    pub fn delete(&self, options: i32) -> Result<()> {
        self.run(Operation::VmDelete { vm: self.handle(), options })
    }

    pub fn upgrade_virtual_hardware(&self, options: i32) -> Result<()> {
        self.run(Operation::VmUpgradeVirtualHardware { vm: self.handle(), options })
    }

    // Tools

    /// Mount the tools installer, or run it with `command_line` if given.
    pub fn install_tools(&self, options: i32, command_line: Option<&str>) -> Result<()> {
        self.run(Operation::VmInstallTools {
            vm: self.handle(),
            options,
            command_line: command_line.map(str::to_owned),
        })
    }

    /// Wait until tools are running in the guest.
    ///
    /// Fails with `VIX_E_TIMEOUT_WAITING_FOR_TOOLS` after `timeout_secs`.
    pub fn wait_for_tools_in_guest(&self, timeout_secs: i32) -> Result<()> {
        self.run(Operation::VmWaitForToolsInGuest { vm: self.handle(), timeout_secs })
    }

    // Guest session

    /// Authenticate for later guest operations.
    ///
    /// `user_name` may be one of the [`guest_user`](crate::guest_user) names.
    pub fn login_in_guest(&self, user_name: &str, password: &str, options: i32) -> Result<()> {
        self.run(Operation::VmLoginInGuest {
            vm: self.handle(),
            user_name: user_name.to_owned(),
            password: password.to_owned(),
            options,
        })
    }

    pub fn logout_from_guest(&self) -> Result<()> {
        self.run(Operation::VmLogoutFromGuest { vm: self.handle() })
    }

    // Processes

    /// Run a program in the guest and wait for it unless
    /// `RUNPROGRAM_RETURN_IMMEDIATELY` is set.
    pub fn run_program_in_guest(
        &self,
        program: &str,
        args: &str,
        options: i32,
    ) -> Result<ProgramResult> {
        let job = self.vix.dispatch(Operation::VmRunProgramInGuest {
            vm: self.handle(),
            program: program.to_owned(),
            args: args.to_owned(),
            options,
        })?;
        program_result(job.wait(&PROGRAM_RESULT)?)
    }

    /// Run `script` through `interpreter` in the guest.
    pub fn run_script_in_guest(
        &self,
        interpreter: &str,
        script: &str,
        options: i32,
    ) -> Result<ProgramResult> {
        let job = self.vix.dispatch(Operation::VmRunScriptInGuest {
            vm: self.handle(),
            interpreter: interpreter.to_owned(),
            script: script.to_owned(),
            options,
        })?;
        program_result(job.wait(&PROGRAM_RESULT)?)
    }

    pub fn open_url_in_guest(&self, url: &str, window_state: i32) -> Result<()> {
        self.run(Operation::VmOpenUrlInGuest {
            vm: self.handle(),
            url: url.to_owned(),
            window_state,
        })
    }

    pub fn list_processes_in_guest(&self, options: i32) -> Result<Vec<GuestProcess>> {
        let job = self
            .vix
            .dispatch(Operation::VmListProcessesInGuest { vm: self.handle(), options })?
            .wait_completed()?;
        job.rows(&[
            VIX_PROPERTY_JOB_RESULT_ITEM_NAME,
            VIX_PROPERTY_JOB_RESULT_PROCESS_ID,
            VIX_PROPERTY_JOB_RESULT_PROCESS_OWNER,
            VIX_PROPERTY_JOB_RESULT_PROCESS_COMMAND,
            VIX_PROPERTY_JOB_RESULT_PROCESS_START_TIME,
            VIX_PROPERTY_JOB_RESULT_PROCESS_BEING_DEBUGGED,
        ])?
        .into_iter()
        .map(|row| {
            let [name, pid, owner, command, start_time, debugged] =
                property::fixed::<6>(row, "VixVM_ListProcessesInGuest")?;
            Ok(GuestProcess {
                name: name.into_string()?,
                pid: pid.as_int64()?,
                owner: owner.into_string()?,
                command: command.into_string()?,
                start_time: start_time.as_int()?,
                being_debugged: debugged.as_bool()?,
            })
        })
        .collect()
    }

    pub fn kill_process_in_guest(&self, pid: u64, options: i32) -> Result<()> {
        self.run(Operation::VmKillProcessInGuest { vm: self.handle(), pid, options })
    }

    // Files

    /// Copy `host_path` on the host to `guest_path` in the guest.
    pub fn copy_file_from_host_to_guest(
        &self,
        host_path: &str,
        guest_path: &str,
        options: i32,
    ) -> Result<()> {
        self.run(Operation::VmCopyFileFromHostToGuest {
            vm: self.handle(),
            host_path: host_path.to_owned(),
            guest_path: guest_path.to_owned(),
            options,
        })
    }

    /// Copy `guest_path` in the guest to `host_path` on the host.
    pub fn copy_file_from_guest_to_host(
        &self,
        guest_path: &str,
        host_path: &str,
        options: i32,
    ) -> Result<()> {
        self.run(Operation::VmCopyFileFromGuestToHost {
            vm: self.handle(),
            guest_path: guest_path.to_owned(),
            host_path: host_path.to_owned(),
            options,
        })
    }

    pub fn create_directory_in_guest(&self, path: &str) -> Result<()> {
        self.run(Operation::VmCreateDirectoryInGuest {
            vm: self.handle(),
            path: path.to_owned(),
        })
    }

    pub fn delete_directory_in_guest(&self, path: &str, options: i32) -> Result<()> {
        self.run(Operation::VmDeleteDirectoryInGuest {
            vm: self.handle(),
            path: path.to_owned(),
            options,
        })
    }

    pub fn directory_exists_in_guest(&self, path: &str) -> Result<bool> {
        let job = self.vix.dispatch(Operation::VmDirectoryExistsInGuest {
            vm: self.handle(),
            path: path.to_owned(),
        })?;
        exists(job.wait(&[VIX_PROPERTY_JOB_RESULT_GUEST_OBJECT_EXISTS])?)
    }

    pub fn delete_file_in_guest(&self, path: &str) -> Result<()> {
        self.run(Operation::VmDeleteFileInGuest { vm: self.handle(), path: path.to_owned() })
    }

    pub fn file_exists_in_guest(&self, path: &str) -> Result<bool> {
        let job = self.vix.dispatch(Operation::VmFileExistsInGuest {
            vm: self.handle(),
            path: path.to_owned(),
        })?;
        exists(job.wait(&[VIX_PROPERTY_JOB_RESULT_GUEST_OBJECT_EXISTS])?)
    }

    /// List the entries of a guest directory in the order the guest reports them.
    pub fn list_directory_in_guest(&self, path: &str, options: i32) -> Result<Vec<GuestFile>> {
        let job = self
            .vix
            .dispatch(Operation::VmListDirectoryInGuest {
                vm: self.handle(),
                path: path.to_owned(),
                options,
            })?
            .wait_completed()?;
        let rows = job.rows(&[
            VIX_PROPERTY_JOB_RESULT_ITEM_NAME,
            VIX_PROPERTY_JOB_RESULT_FILE_FLAGS,
        ])?;
        debug!(path, entries = rows.len(), "listed guest directory");
        rows.into_iter()
            .map(|row| {
                let [name, flags] = property::fixed::<2>(row, "VixVM_ListDirectoryInGuest")?;
                Ok(GuestFile {
                    name: name.into_string()?,
                    flags: flags.as_int()?,
                })
            })
            .collect()
    }

    pub fn rename_file_in_guest(&self, old_name: &str, new_name: &str, options: i32) -> Result<()> {
        self.run(Operation::VmRenameFileInGuest {
            vm: self.handle(),
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned(),
            options,
        })
    }

    /// Create a temporary file in the guest and return its path.
    pub fn create_temp_file_in_guest(&self, options: i32) -> Result<String> {
        let job = self
            .vix
            .dispatch(Operation::VmCreateTempFileInGuest { vm: self.handle(), options })?;
        let values = job.wait(&[VIX_PROPERTY_JOB_RESULT_ITEM_NAME])?;
        let [name] = property::fixed::<1>(values, "VixVM_CreateTempFileInGuest")?;
        name.into_string()
    }

    // Shared folders

    pub fn enable_shared_folders(&self, enabled: bool, options: i32) -> Result<()> {
        self.run(Operation::VmEnableSharedFolders { vm: self.handle(), enabled, options })
    }

    /// Share `host_path` with the guest as `share_name`.
    pub fn add_shared_folder(&self, share_name: &str, host_path: &str, flags: i32) -> Result<()> {
        self.run(Operation::VmAddSharedFolder {
            vm: self.handle(),
            share_name: share_name.to_owned(),
            host_path: host_path.to_owned(),
            flags,
        })
    }

    pub fn remove_shared_folder(&self, share_name: &str, flags: i32) -> Result<()> {
        self.run(Operation::VmRemoveSharedFolder {
            vm: self.handle(),
            share_name: share_name.to_owned(),
            flags,
        })
    }

    pub fn num_shared_folders(&self) -> Result<usize> {
        let job = self.vix.dispatch(Operation::VmGetNumSharedFolders { vm: self.handle() })?;
        let [count] = property::fixed::<1>(
            job.wait(&[VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_COUNT])?,
            "VixVM_GetNumSharedFolders",
        )?;
        Ok(usize::try_from(count.as_int()?).unwrap_or(0))
    }

    /// State of the shared folder at `index`, counted from 0.
    pub fn shared_folder_state(&self, index: usize) -> Result<SharedFolderState> {
        const OP: &str = "VixVM_GetSharedFolderState";
        let index = native_index(index, OP)?;
        let job = self
            .vix
            .dispatch(Operation::VmGetSharedFolderState { vm: self.handle(), index })?;
        let [name, host_path, flags] = property::fixed::<3>(
            job.wait(&[
                VIX_PROPERTY_JOB_RESULT_ITEM_NAME,
                VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_HOST,
                VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_FLAGS,
            ])?,
            OP,
        )?;
        Ok(SharedFolderState {
            name: name.into_string()?,
            host_path: host_path.into_string()?,
            flags: flags.as_int()?,
        })
    }

    pub fn set_shared_folder_state(
        &self,
        share_name: &str,
        host_path: &str,
        flags: i32,
    ) -> Result<()> {
        self.run(Operation::VmSetSharedFolderState {
            vm: self.handle(),
            share_name: share_name.to_owned(),
            host_path: host_path.to_owned(),
            flags,
        })
    }

    // Snapshots

    /// Take a snapshot. Pass `SNAPSHOT_INCLUDE_MEMORY` to capture memory.
    pub fn create_snapshot(&self, name: &str, description: &str, options: i32) -> Result<Snapshot> {
        let handle = self
            .vix
            .dispatch(Operation::VmCreateSnapshot {
                vm: self.handle(),
                name: name.to_owned(),
                description: description.to_owned(),
                options,
            })?
            .wait_handle()?;
        Ok(Snapshot::from_handle(self.vix.clone(), handle))
    }

    /// Remove a snapshot. Pass `SNAPSHOT_REMOVE_CHILDREN` to remove its subtree.
    pub fn remove_snapshot(&self, snapshot: &Snapshot, options: i32) -> Result<()> {
        self.run(Operation::VmRemoveSnapshot {
            vm: self.handle(),
            snapshot: snapshot.handle(),
            options,
        })
    }

    pub fn revert_to_snapshot(&self, snapshot: &Snapshot, options: i32) -> Result<()> {
        self.run(Operation::VmRevertToSnapshot {
            vm: self.handle(),
            snapshot: snapshot.handle(),
            options,
        })
    }

    pub fn current_snapshot(&self) -> Result<Snapshot> {
        let handle = self.vix.lookup(Lookup::VmCurrentSnapshot { vm: self.handle() })?;
        Ok(Snapshot::from_handle(self.vix.clone(), handle))
    }

    /// Find a snapshot by display name anywhere in the tree.
    pub fn named_snapshot(&self, name: &str) -> Result<Snapshot> {
        let handle = self.vix.lookup(Lookup::VmNamedSnapshot {
            vm: self.handle(),
            name: name.to_owned(),
        })?;
        Ok(Snapshot::from_handle(self.vix.clone(), handle))
    }

    pub fn num_root_snapshots(&self) -> Result<usize> {
        self.vix.lookup_count(Count::VmRootSnapshots { vm: self.handle() })
    }

    pub fn root_snapshot(&self, index: usize) -> Result<Snapshot> {
        let index = native_index(index, "VixVM_GetRootSnapshot")?;
        let handle = self.vix.lookup(Lookup::VmRootSnapshot { vm: self.handle(), index })?;
        Ok(Snapshot::from_handle(self.vix.clone(), handle))
    }

    // Properties

    pub fn power_state(&self) -> Result<PowerState> {
        Ok(PowerState::from_bits(self.read(VIX_PROPERTY_VM_POWER_STATE)?.as_int()?))
    }

    pub fn tools_state(&self) -> Result<ToolsState> {
        Ok(ToolsState::from_raw(self.read(VIX_PROPERTY_VM_TOOLS_STATE)?.as_int()?))
    }

    pub fn num_vcpus(&self) -> Result<i32> {
        self.read(VIX_PROPERTY_VM_NUM_VCPUS)?.as_int()
    }

    /// Configured memory in megabytes.
    pub fn memory_size(&self) -> Result<i32> {
        self.read(VIX_PROPERTY_VM_MEMORY_SIZE)?.as_int()
    }

    pub fn vmx_path(&self) -> Result<String> {
        self.read(VIX_PROPERTY_VM_VMX_PATHNAME)?.into_string()
    }

    pub fn is_running(&self) -> Result<bool> {
        self.read(VIX_PROPERTY_VM_IS_RUNNING)?.as_bool()
    }

    pub fn read_only(&self) -> Result<bool> {
        self.read(VIX_PROPERTY_VM_READ_ONLY)?.as_bool()
    }

    /// `VM_SUPPORT_*` bits.
    pub fn supported_features(&self) -> Result<i32> {
        self.read(VIX_PROPERTY_VM_SUPPORTED_FEATURES)?.as_int()
    }

    /// Release the VM handle now.
    pub fn close(self) {
        self.handle.release();
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm").field("handle", &self.handle()).finish()
    }
}

const PROGRAM_RESULT: [PropertyId; 3] = [
    VIX_PROPERTY_JOB_RESULT_PROCESS_ID,
    VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_ELAPSED_TIME,
    VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_EXIT_CODE,
];

fn program_result(values: Vec<PropertyValue>) -> Result<ProgramResult> {
    let [pid, elapsed, exit_code] = property::fixed::<3>(values, "VixVM_RunProgramInGuest")?;
    Ok(ProgramResult {
        pid: pid.as_int64()?,
        elapsed_ms: elapsed.as_int64()?,
        exit_code: exit_code.as_int()?,
    })
}

fn exists(values: Vec<PropertyValue>) -> Result<bool> {
    let [value] = property::fixed::<1>(values, "Vix_GetProperties")?;
    value.as_bool()
}

/// Convert a caller index to the native `int`.
pub(crate) fn native_index(index: usize, op: &'static str) -> Result<i32> {
    i32::try_from(index).map_err(|_| Error::new(codes::VIX_E_INVALID_ARG, op))
}
