//! Type definitions, option structs and value records.

/// API version passed to `VixHost_Connect` unless overridden.
pub const VIX_API_VERSION: i32 = 2;

/// Which VMware product a host connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceProvider {
    /// Let the library pick.
    #[default]
    Default,
    /// VMware Server.
    Server,
    /// VMware Workstation.
    Workstation,
}

impl From<ServiceProvider> for i32 {
    fn from(provider: ServiceProvider) -> i32 {
        match provider {
            ServiceProvider::Default => 1,
            ServiceProvider::Server => 2,
            ServiceProvider::Workstation => 3,
        }
    }
}

/// What `Host::find_items` searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindItemType {
    /// VMs that are currently powered on.
    RunningVms,
    /// VMs registered with the host.
    RegisteredVms,
}

impl From<FindItemType> for i32 {
    fn from(kind: FindItemType) -> i32 {
        match kind {
            FindItemType::RunningVms => 1,
            FindItemType::RegisteredVms => 4,
        }
    }
}

/// Option bits accepted by the native calls.
pub mod flags {
    /// Host connect: the caller drives callbacks with `Vix_PumpEvents`.
    pub const HOSTOPTION_USE_EVENT_PUMP: i32 = 0x0008;

    /// Power operations: default behavior.
    pub const VMPOWEROP_NORMAL: i32 = 0x0000;
    /// Power on: do not power on a snapshot's saved state.
    pub const VMPOWEROP_SUPPRESS_SNAPSHOT_POWERON: i32 = 0x0080;
    /// Power on: open the VM in the product UI.
    pub const VMPOWEROP_LAUNCH_GUI: i32 = 0x0200;

    /// Delete: also remove the VM's disk files.
    pub const VMDELETE_DISK_FILES: i32 = 0x0002;

    /// Run program: return as soon as the program starts.
    pub const RUNPROGRAM_RETURN_IMMEDIATELY: i32 = 0x0001;
    /// Run program: bring the program window to the front.
    pub const RUNPROGRAM_ACTIVATE_WINDOW: i32 = 0x0002;

    /// Login: require an interactive session in the guest.
    pub const LOGIN_IN_GUEST_REQUIRE_INTERACTIVE_ENVIRONMENT: i32 = 0x0008;

    /// Remove snapshot: also remove all children.
    pub const SNAPSHOT_REMOVE_CHILDREN: i32 = 0x0001;
    /// Create snapshot: capture memory state.
    pub const SNAPSHOT_INCLUDE_MEMORY: i32 = 0x0002;

    /// Shared folder is writable from the guest.
    pub const SHAREDFOLDER_WRITE_ACCESS: i32 = 0x0004;

    /// Guest file attribute: directory.
    pub const FILE_ATTRIBUTES_DIRECTORY: i32 = 0x0001;
    /// Guest file attribute: symbolic link.
    pub const FILE_ATTRIBUTES_SYMLINK: i32 = 0x0002;

    /// Pump events: no options.
    pub const PUMPEVENTOPTION_NONE: i32 = 0;

    /// VM feature: shared folders.
    pub const VM_SUPPORT_SHARED_FOLDERS: i32 = 0x0001;
    /// VM feature: more than one snapshot.
    pub const VM_SUPPORT_MULTIPLE_SNAPSHOTS: i32 = 0x0002;
    /// VM feature: tools installation.
    pub const VM_SUPPORT_TOOLS_INSTALL: i32 = 0x0004;
    /// VM feature: virtual hardware upgrade.
    pub const VM_SUPPORT_HARDWARE_UPGRADE: i32 = 0x0008;
}

/// Special guest user names understood by `VixVM_LoginInGuest`.
pub mod guest_user {
    /// Log in as the anonymous guest user.
    pub const ANONYMOUS: &str = "__VMware_Vix_Guest_User_Anonymous__";
    /// Log in as the guest administrator.
    pub const ADMINISTRATOR: &str = "__VMware_Vix_Guest_User_Admin__";
    /// Log in as whoever owns the guest console.
    pub const CONSOLE: &str = "__VMware_Vix_Guest_Console_User__";
}

/// Power state bit set reported by `VIX_PROPERTY_VM_POWER_STATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerState(i32);

impl PowerState {
    pub const POWERING_OFF: PowerState = PowerState(0x0001);
    pub const POWERED_OFF: PowerState = PowerState(0x0002);
    pub const POWERING_ON: PowerState = PowerState(0x0004);
    pub const POWERED_ON: PowerState = PowerState(0x0008);
    pub const SUSPENDING: PowerState = PowerState(0x0010);
    pub const SUSPENDED: PowerState = PowerState(0x0020);
    pub const TOOLS_RUNNING: PowerState = PowerState(0x0040);
    pub const RESETTING: PowerState = PowerState(0x0080);
    pub const BLOCKED_ON_MSG: PowerState = PowerState(0x0100);

    /// Wrap raw bits.
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Check if every bit of `other` is set.
    pub const fn contains(self, other: PowerState) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Guest tools state reported by `VIX_PROPERTY_VM_TOOLS_STATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolsState {
    Unknown,
    Running,
    NotInstalled,
}

impl ToolsState {
    /// Decode the native value; anything unexpected maps to `Unknown`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0x0002 => ToolsState::Running,
            0x0004 => ToolsState::NotInstalled,
            _ => ToolsState::Unknown,
        }
    }
}

/// Options for `Host::connect`.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Requested API version.
    pub api_version: i32,
    /// Product to talk to.
    pub provider: ServiceProvider,
    /// Host name; `None` for the local host.
    pub host_name: Option<String>,
    /// Port; ignored for the local host.
    pub port: i32,
    /// User name; ignored for the local host.
    pub user_name: Option<String>,
    /// Password; ignored for the local host.
    pub password: Option<String>,
    /// `HOSTOPTION_*` bits.
    pub options: i32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            api_version: VIX_API_VERSION,
            provider: ServiceProvider::Workstation,
            host_name: None,
            port: 0,
            user_name: None,
            password: None,
            options: 0,
        }
    }
}

/// One entry of a guest directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestFile {
    /// File name, without the directory part.
    pub name: String,
    /// `FILE_ATTRIBUTES_*` bits.
    pub flags: i32,
}

impl GuestFile {
    /// Check if the entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.flags & flags::FILE_ATTRIBUTES_DIRECTORY != 0
    }

    /// Check if the entry is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.flags & flags::FILE_ATTRIBUTES_SYMLINK != 0
    }
}

/// One entry of a guest process listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestProcess {
    pub name: String,
    pub pid: i64,
    pub owner: String,
    pub command: String,
    /// Start time in seconds since the epoch, as the guest reports it.
    pub start_time: i32,
    pub being_debugged: bool,
}

/// State of one shared folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFolderState {
    /// Share name as seen by the guest.
    pub name: String,
    /// Host path behind the share.
    pub host_path: String,
    /// `SHAREDFOLDER_*` bits.
    pub flags: i32,
}

impl SharedFolderState {
    /// Check if the guest may write to the share.
    pub fn is_writable(&self) -> bool {
        self.flags & flags::SHAREDFOLDER_WRITE_ACCESS != 0
    }
}

/// Outcome of a program or script run in the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramResult {
    /// Guest process id.
    pub pid: i64,
    /// Wall-clock run time in milliseconds.
    pub elapsed_ms: i64,
    /// Exit code, or 0 if the program was started with `RUNPROGRAM_RETURN_IMMEDIATELY`.
    pub exit_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_file_flags() {
        let dir = GuestFile { name: "etc".into(), flags: flags::FILE_ATTRIBUTES_DIRECTORY };
        let link = GuestFile { name: "lib".into(), flags: flags::FILE_ATTRIBUTES_SYMLINK };
        assert!(dir.is_directory() && !dir.is_symlink());
        assert!(link.is_symlink() && !link.is_directory());
    }

    #[test]
    fn test_power_state_contains() {
        let state = PowerState::from_bits(0x0008 | 0x0040);
        assert!(state.contains(PowerState::POWERED_ON));
        assert!(state.contains(PowerState::TOOLS_RUNNING));
        assert!(!state.contains(PowerState::SUSPENDED));
    }

    #[test]
    fn test_connect_defaults() {
        let opts = ConnectOptions::default();
        assert_eq!(opts.api_version, VIX_API_VERSION);
        assert_eq!(i32::from(opts.provider), 3);
        assert!(opts.host_name.is_none());
    }
}
