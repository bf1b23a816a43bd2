//! Host connection tests against the in-process simulator.

mod common;

use vix::{FindItemType, Operation, Outcome, ServiceProvider};

#[test]
fn test_connect_adopts_host_handle() {
    let (vix, sim, host) = common::connected();
    let h = host.handle();

    assert!(h.is_valid());
    assert!(vix.handles().is_live(h));
    assert_eq!(vix.handles().live_count(), 1, "only the host should be held");
    assert_eq!(sim.refs(h), 1, "the connect job's reference should be gone");

    match sim.last_call() {
        Some(Operation::HostConnect { api_version, provider, host_name, .. }) => {
            assert_eq!(api_version, vix::VIX_API_VERSION);
            assert_eq!(provider, i32::from(ServiceProvider::Workstation));
            assert!(host_name.is_none());
        }
        other => panic!("expected a connect call, got {other:?}"),
    }
}

#[test]
fn test_open_vm_reads_vmx_path() {
    let (vix, _sim, host) = common::connected();
    let vm = host.open_vm("/vms/ubuntu/ubuntu.vmx").expect("open_vm should succeed");

    assert_eq!(vm.vmx_path().expect("vmx_path should succeed"), "/vms/ubuntu/ubuntu.vmx");
    assert_eq!(vix.handles().live_count(), 2);

    vm.close();
    assert_eq!(vix.handles().live_count(), 1);
}

#[test]
fn test_register_and_unregister() {
    let (_vix, sim, host) = common::connected();

    host.register_vm("/vms/a.vmx").expect("register_vm should succeed");
    assert_eq!(
        sim.last_call(),
        Some(Operation::HostRegisterVm { host: host.handle(), vmx_path: "/vms/a.vmx".into() })
    );

    host.unregister_vm("/vms/a.vmx").expect("unregister_vm should succeed");
    assert_eq!(
        sim.last_call(),
        Some(Operation::HostUnregisterVm { host: host.handle(), vmx_path: "/vms/a.vmx".into() })
    );
}

#[test]
fn test_find_items_collects_locations_in_order() {
    let (vix, sim, host) = common::connected();
    sim.respond(
        "VixHost_FindItems",
        Outcome::ok()
            .progress(1)
            .found_item("/vms/a/a.vmx")
            .found_item("/vms/b/b.vmx")
            .found_item("/vms/c/c.vmx"),
    );

    let found = host
        .find_items(FindItemType::RunningVms, 10)
        .expect("find_items should succeed");
    assert_eq!(found, vec!["/vms/a/a.vmx", "/vms/b/b.vmx", "/vms/c/c.vmx"]);

    match sim.last_call() {
        Some(Operation::HostFindItems { search_type, timeout_secs, .. }) => {
            assert_eq!(search_type, i32::from(FindItemType::RunningVms));
            assert_eq!(timeout_secs, 10);
        }
        other => panic!("expected a find call, got {other:?}"),
    }

    // Every event handle the callback retained has been given back.
    assert_eq!(vix.handles().live_count(), 1);
}

#[test]
fn test_find_items_failure() {
    let (_vix, sim, host) = common::connected();
    sim.respond("VixHost_FindItems", Outcome::fail(vix::codes::VIX_E_HOST_SERVER_NOT_FOUND));

    let err = host
        .find_items(FindItemType::RegisteredVms, 5)
        .expect_err("find_items should fail");
    assert_eq!(err.code(), vix::codes::VIX_E_HOST_SERVER_NOT_FOUND);
    assert_eq!(err.op(), "VixHost_FindItems");
}

#[test]
fn test_find_items_back_to_back() {
    let (vix, sim, host) = common::connected();
    sim.respond("VixHost_FindItems", Outcome::ok().found_item("/vms/a/a.vmx"));

    for _ in 0..3 {
        let found = host
            .find_items(FindItemType::RegisteredVms, 5)
            .expect("find_items should succeed");
        assert_eq!(found, vec!["/vms/a/a.vmx"]);
    }
    assert_eq!(vix.handles().live_count(), 1);
}

#[test]
fn test_disconnect_forgets_without_release() {
    let (vix, sim, host) = common::connected();
    let h = host.handle();

    host.disconnect();

    assert_eq!(sim.disconnected(), vec![h]);
    assert!(!vix.handles().is_live(h));
    assert_eq!(sim.release_count(h), 0, "disconnect destroys the handle itself");
}

#[test]
fn test_close_releases_once() {
    let (vix, sim, host) = common::connected();
    let h = host.handle();

    host.close();

    assert_eq!(sim.release_count(h), 1);
    assert!(!sim.is_alive(h));
    assert_eq!(vix.handles().live_count(), 0);
}

#[test]
fn test_pump_events() {
    let (_vix, sim, host) = common::connected();
    host.pump_events();
    host.pump_events();
    assert_eq!(sim.pumped(), 2);
}
