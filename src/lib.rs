//! Rust bindings for the VMware VIX handle/job API.
//!
//! This crate provides a safe Rust interface to VIX: connect to a host, open
//! VMs, drive power and guest operations, and walk snapshot trees. Every
//! native object is reached through a reference-counted handle, every
//! operation through an asynchronous job, and every result through typed
//! properties read off those handles.
//!
//! # Example
//!
//! ```no_run
//! use vix::{flags, ConnectOptions, Host, Vix};
//!
//! fn provision(vix: &Vix) -> vix::Result<()> {
//!     // Connect to the local Workstation host
//!     let host = Host::connect(vix, ConnectOptions::default())?;
//!
//!     // Open a VM and start it
//!     let vm = host.open_vm("/vms/ubuntu/ubuntu.vmx")?;
//!     vm.power_on(flags::VMPOWEROP_NORMAL)?;
//!     vm.wait_for_tools_in_guest(300)?;
//!
//!     // Guest operations
//!     vm.login_in_guest("user", "secret", 0)?;
//!     vm.copy_file_from_host_to_guest("/tmp/setup.sh", "/tmp/setup.sh", 0)?;
//!     let result = vm.run_program_in_guest("/bin/sh", "/tmp/setup.sh", 0)?;
//!     println!("exit code: {}", result.exit_code);
//!
//!     // Snapshot, then shut down
//!     let snap = vm.create_snapshot("configured", "after setup", 0)?;
//!     println!("snapshot: {}", snap.display_name()?);
//!     vm.power_off(flags::VMPOWEROP_NORMAL)?;
//!
//!     host.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! With the `native` feature the context comes from `Vix::native()`; tests
//! use [`Vix::simulated`].
//!
//! # Native library
//!
//! The VIX SDK is only linked with the `native` feature. Without it the crate
//! carries [`SimBackend`], an in-process stand-in with the same handle, job
//! and notification model, which is what the test suite runs against.

pub mod backend;
pub mod callback;
pub mod codes;
pub mod error;
#[cfg(feature = "native")]
mod ffi;
pub mod handle;
pub mod host;
pub mod job;
pub mod property;
pub mod sim;
pub mod snapshot;
pub mod types;
mod vix;
pub mod vm;

// Re-export main types at the crate root
pub use backend::{Backend, Count, Lookup, NotificationSink, Operation};
pub use callback::{Event, EventProc, EventType, Registration, RegistrationState};
pub use codes::ErrorCode;
pub use error::{Error, Result};
#[cfg(feature = "native")]
pub use ffi::NativeLibrary;
pub use handle::{Handle, HandleTable, OwnedHandle};
pub use host::Host;
pub use job::{CompletedJob, Job};
pub use property::{HandleType, PropertyId, PropertyType, PropertyValue, MAX_PROPERTIES};
pub use sim::{Outcome, SimBackend};
pub use snapshot::Snapshot;
pub use types::{
    flags, guest_user, ConnectOptions, FindItemType, GuestFile, GuestProcess, PowerState,
    ProgramResult, ServiceProvider, SharedFolderState, ToolsState, VIX_API_VERSION,
};
pub use vix::Vix;
pub use vm::Vm;

/// API version constants.
pub mod version {
    /// Crate version.
    pub const CRATE: &str = env!("CARGO_PKG_VERSION");
    /// VIX API version requested on connect by default.
    pub const API: i32 = crate::types::VIX_API_VERSION;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version::API, 2);
        assert!(!version::CRATE.is_empty());
    }

    #[test]
    fn test_simulated_context_starts_empty() {
        let (vix, _sim) = Vix::simulated();
        assert_eq!(vix.handles().live_count(), 0);
    }
}
