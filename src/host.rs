//! Host connections.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::Operation;
use crate::callback::{Event, EventType, Registration};
use crate::codes;
use crate::error::{Error, Result};
use crate::handle::{Handle, OwnedHandle};
use crate::property::VIX_PROPERTY_FOUND_ITEM_LOCATION;
use crate::types::{flags, ConnectOptions, FindItemType};
use crate::vix::Vix;
use crate::vm::Vm;

/// A connection to a VMware host.
///
/// Dropping a `Host` releases its handle; [`Host::disconnect`] also tears
/// down the connection.
///
/// # Example
///
/// ```no_run
/// use vix::{ConnectOptions, FindItemType, Host, Vix};
///
/// # fn example(vix: &Vix) -> vix::Result<()> {
/// let host = Host::connect(vix, ConnectOptions::default())?;
///
/// for path in host.find_items(FindItemType::RunningVms, 30)? {
///     println!("running: {path}");
/// }
///
/// let vm = host.open_vm("/vms/ubuntu/ubuntu.vmx")?;
/// println!("power state: {:?}", vm.power_state()?);
/// host.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct Host {
    vix: Vix,
    handle: OwnedHandle,
}

impl Host {
    /// Connect to a host and wait for the connection.
    pub fn connect(vix: &Vix, options: ConnectOptions) -> Result<Self> {
        let op = Operation::HostConnect {
            api_version: options.api_version,
            provider: options.provider.into(),
            host_name: options.host_name,
            port: options.port,
            user_name: options.user_name,
            password: options.password,
            options: options.options,
        };
        let handle = vix.dispatch(op)?.wait_handle()?;
        info!(host = %handle.get(), "connected");
        Ok(Self {
            vix: vix.clone(),
            handle,
        })
    }

    /// The host handle.
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    /// Open the VM stored at `vmx_path`.
    pub fn open_vm(&self, vmx_path: &str) -> Result<Vm> {
        let op = Operation::VmOpen {
            host: self.handle(),
            vmx_path: vmx_path.to_owned(),
        };
        let handle = self.vix.dispatch(op)?.wait_handle()?;
        Ok(Vm::from_handle(self.vix.clone(), handle))
    }

    /// Add a VM to the host's inventory.
    pub fn register_vm(&self, vmx_path: &str) -> Result<()> {
        let op = Operation::HostRegisterVm {
            host: self.handle(),
            vmx_path: vmx_path.to_owned(),
        };
        self.vix.dispatch(op)?.wait_completed()?;
        Ok(())
    }

    /// Remove a VM from the host's inventory.
    pub fn unregister_vm(&self, vmx_path: &str) -> Result<()> {
        let op = Operation::HostUnregisterVm {
            host: self.handle(),
            vmx_path: vmx_path.to_owned(),
        };
        self.vix.dispatch(op)?.wait_completed()?;
        Ok(())
    }

    /// Locate VMs on the host.
    ///
    /// Each match arrives as a find-item notification; the returned paths
    /// are in arrival order. `timeout_secs` bounds the search on the host
    /// side.
    pub fn find_items(&self, kind: FindItemType, timeout_secs: i32) -> Result<Vec<String>> {
        let registration = Registration::new(
            &self.vix,
            Mutex::new(Vec::new()),
            |event: &Event<'_, Mutex<Vec<String>>>| {
                if event.kind() != EventType::FindItem {
                    return Ok(());
                }
                let location = event
                    .properties(&[VIX_PROPERTY_FOUND_ITEM_LOCATION])?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::new(codes::VIX_E_FAIL, "VixHost_FindItems"))?
                    .into_string()?;
                debug!(%location, "found item");
                event
                    .client_data()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(location);
                Ok(())
            },
        )?;

        let op = Operation::HostFindItems {
            host: self.handle(),
            search_type: kind.into(),
            timeout_secs,
        };
        let job = self.vix.dispatch_with(op, &registration)?;
        let job_handle = job.handle();
        job.wait_completed()?;

        // The completion notification can trail the job's terminal state.
        if !registration.wait_completed(job_handle) {
            warn!(job = %job_handle, "find items registration released before completion");
        }
        registration.release();

        let found = registration
            .client_data()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(found)
    }

    /// Deliver pending notifications on a host connected with
    /// `HOSTOPTION_USE_EVENT_PUMP`.
    pub fn pump_events(&self) {
        self.vix
            .pump_events(self.handle(), flags::PUMPEVENTOPTION_NONE);
    }

    /// Tear down the connection.
    ///
    /// The library destroys the host handle itself, so the binding only
    /// forgets it.
    pub fn disconnect(self) {
        let raw = self.handle.into_raw();
        debug!(host = %raw, "VixHost_Disconnect");
        self.vix.backend().disconnect(raw);
        self.vix.handles().forget(raw);
    }

    /// Release the host handle without disconnecting.
    pub fn close(self) {
        self.handle.release();
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").field("handle", &self.handle()).finish()
    }
}
