//! Host integration tests.
//!
//! These tests need the VIX SDK and a VMware host with a VM to drive.
//! Run with: VIX_RUN_HOST_TESTS=1 VIX_TEST_VMX=/path/to/vm.vmx cargo test --features native
//!
//! Optional: VIX_TEST_HOST (remote host name), VIX_TEST_GUEST_USER and
//! VIX_TEST_GUEST_PASSWORD (guest credentials for the guest tests).

#![cfg(feature = "native")]

mod common;

use std::env;

use vix::{flags, ConnectOptions, FindItemType, Host, PowerState, Vix};

fn should_run_host_tests() -> bool {
    env::var("VIX_RUN_HOST_TESTS").map(|v| v == "1").unwrap_or(false)
}

fn test_vmx() -> Option<String> {
    env::var("VIX_TEST_VMX").ok().filter(|v| !v.is_empty())
}

fn guest_credentials() -> Option<(String, String)> {
    let user = env::var("VIX_TEST_GUEST_USER").ok()?;
    let password = env::var("VIX_TEST_GUEST_PASSWORD").unwrap_or_default();
    Some((user, password))
}

fn connect() -> (Vix, Host) {
    common::init_tracing();
    let vix = Vix::native();
    let options = ConnectOptions {
        host_name: env::var("VIX_TEST_HOST").ok(),
        ..Default::default()
    };
    let host = Host::connect(&vix, options).expect("connect should succeed");
    (vix, host)
}

#[test]
fn test_connect_and_find_running() {
    if !should_run_host_tests() {
        println!("Skipping host test (VIX_RUN_HOST_TESTS not set)");
        return;
    }

    let (vix, host) = connect();
    let running = host
        .find_items(FindItemType::RunningVms, 30)
        .expect("find_items should succeed");
    println!("Running VMs: {:?}", running);

    host.disconnect();
    assert_eq!(vix.handles().live_count(), 0);
}

#[test]
fn test_open_vm_properties() {
    if !should_run_host_tests() {
        println!("Skipping host test (VIX_RUN_HOST_TESTS not set)");
        return;
    }
    let Some(vmx) = test_vmx() else {
        println!("Skipping: VIX_TEST_VMX not set");
        return;
    };

    let (_vix, host) = connect();
    let vm = host.open_vm(&vmx).expect("open_vm should succeed");

    assert_eq!(vm.vmx_path().expect("vmx_path should succeed"), vmx);
    let cpus = vm.num_vcpus().expect("num_vcpus should succeed");
    assert!(cpus >= 1, "a VM has at least one vCPU, got {}", cpus);
    let memory = vm.memory_size().expect("memory_size should succeed");
    println!("VM: {} vCPUs, {} MB", cpus, memory);
    println!("Power state: {:?}", vm.power_state().expect("power_state should succeed"));

    vm.close();
    host.disconnect();
}

#[test]
fn test_power_cycle_and_guest_listing() {
    if !should_run_host_tests() {
        println!("Skipping host test (VIX_RUN_HOST_TESTS not set)");
        return;
    }
    let Some(vmx) = test_vmx() else {
        println!("Skipping: VIX_TEST_VMX not set");
        return;
    };
    let Some((user, password)) = guest_credentials() else {
        println!("Skipping: VIX_TEST_GUEST_USER not set");
        return;
    };

    let (_vix, host) = connect();
    let vm = host.open_vm(&vmx).expect("open_vm should succeed");

    let was_on = vm
        .power_state()
        .expect("power_state should succeed")
        .contains(PowerState::POWERED_ON);
    if !was_on {
        vm.power_on(flags::VMPOWEROP_NORMAL).expect("power_on should succeed");
    }
    vm.wait_for_tools_in_guest(300).expect("tools should come up");
    vm.login_in_guest(&user, &password, 0).expect("login should succeed");

    let temp = vm.create_temp_file_in_guest(0).expect("temp file should succeed");
    assert!(vm.file_exists_in_guest(&temp).expect("file_exists should succeed"));
    vm.delete_file_in_guest(&temp).expect("delete should succeed");
    assert!(!vm.file_exists_in_guest(&temp).expect("file_exists should succeed"));

    let procs = vm.list_processes_in_guest(0).expect("list_processes should succeed");
    assert!(!procs.is_empty(), "a running guest has processes");

    vm.logout_from_guest().expect("logout should succeed");
    if !was_on {
        vm.power_off(flags::VMPOWEROP_NORMAL).expect("power_off should succeed");
    }
    host.disconnect();
}

#[test]
fn test_snapshot_roundtrip() {
    if !should_run_host_tests() {
        println!("Skipping host test (VIX_RUN_HOST_TESTS not set)");
        return;
    }
    let Some(vmx) = test_vmx() else {
        println!("Skipping: VIX_TEST_VMX not set");
        return;
    };

    let (_vix, host) = connect();
    let vm = host.open_vm(&vmx).expect("open_vm should succeed");

    let before = vm.num_root_snapshots().expect("root count should succeed");
    let snap = vm
        .create_snapshot("vix-bridge-test", "created by the integration tests", 0)
        .expect("create_snapshot should succeed");
    assert_eq!(snap.display_name().expect("name should succeed"), "vix-bridge-test");

    let found = vm
        .named_snapshot("vix-bridge-test")
        .expect("named_snapshot should succeed");
    assert_eq!(found, snap);

    vm.remove_snapshot(&snap, 0).expect("remove_snapshot should succeed");
    assert_eq!(vm.num_root_snapshots().expect("root count should succeed"), before);
    host.disconnect();
}
