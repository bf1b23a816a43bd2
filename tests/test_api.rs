//! Error registry, property table and handle table tests.
//!
//! These tests do not require a VMware host.

mod common;

use std::sync::Arc;

use vix::codes::{self, ErrorCode};
use vix::property::{self, PropertyId};
use vix::{Error, HandleTable, PropertyType, SimBackend, Vix};

#[test]
fn test_error_names() {
    assert_eq!(codes::name_of(0), "VIX_OK");
    assert_eq!(codes::name_of(1000), "VIX_E_INVALID_HANDLE");
    assert_eq!(codes::name_of(3000), "VIX_E_TIMEOUT_WAITING_FOR_TOOLS");
    assert_eq!(codes::name_of(30003), "VIX_E_BINDING_INVALID_HANDLE_POSSIBLE_SERIALNUMBER_EXPIRY");
}

#[test]
fn test_error_code_masking() {
    // Upper bits are flags; only the low 16 bits pick the name.
    let raw = 0x0007_0000_0000_03E8u64;
    assert_eq!(ErrorCode::from_raw(raw), codes::VIX_E_INVALID_HANDLE);
    assert_eq!(codes::name_of(raw), codes::name_of(1000));
}

#[test]
fn test_unknown_code() {
    assert_eq!(codes::name_of(29999), codes::UNKNOWN);
    assert!(!ErrorCode::from_raw(29999).is_registered());

    let err = Error::new(ErrorCode::from_raw(29999), "VixVM_PowerOn");
    let msg = err.to_string();
    assert!(msg.contains("VixVM_PowerOn"), "message should name the call: {msg}");
    assert!(msg.contains("29999"), "message should carry the code: {msg}");
    assert!(msg.contains("unknown"), "message should say unknown: {msg}");
}

#[test]
fn test_reverse_lookup() {
    assert_eq!(codes::code_of("VIX_E_FAIL"), Some(codes::VIX_E_FAIL));
    assert_eq!(codes::code_of("VIX_E_NOT_A_REAL_CODE"), None);
    for (code, name) in codes::registry() {
        assert_eq!(code.name(), name);
    }
}

#[test]
fn test_error_message_has_name() {
    let err = Error::new(codes::VIX_E_FILE_NOT_FOUND, "VixVM_Open");
    assert_eq!(err.name(), "VIX_E_FILE_NOT_FOUND");
    assert!(err.to_string().contains("VIX_E_FILE_NOT_FOUND"));
}

#[test]
fn test_property_table() {
    assert_eq!(
        property::VIX_PROPERTY_VM_VMX_PATHNAME.name(),
        Some("VIX_PROPERTY_VM_VMX_PATHNAME")
    );
    assert_eq!(
        property::VIX_PROPERTY_JOB_RESULT_SCREEN_IMAGE_DATA.expected_type(),
        Some(PropertyType::Blob)
    );
    assert_eq!(PropertyId::from_raw(12345).name(), None);
}

#[test]
fn test_double_acquire_releases_twice() {
    common::init_tracing();
    let sim = SimBackend::new();
    let table = Arc::new(HandleTable::new(Arc::new(sim.clone())));
    let vm = sim.create_vm("/vms/a.vmx");

    table.track(vm);
    table.track(vm);
    assert_eq!(table.references(vm), 2);

    assert!(table.release(vm));
    assert!(table.release(vm));
    assert!(!table.release(vm), "third release should not reach the library");
    assert_eq!(sim.release_count(vm), 2);
    assert!(!table.is_live(vm));
}

#[test]
fn test_invalid_handle_release_is_ignored() {
    let (vix, sim) = Vix::simulated();
    assert!(!vix.handles().release(vix::Handle::INVALID));
    assert_eq!(sim.total_releases(), 0);
}

#[test]
fn test_owned_handle_releases_on_drop() {
    let (vix, sim) = Vix::simulated();
    let vm = sim.create_vm("/vms/a.vmx");
    {
        let _owned = vix.adopt(vm);
        assert!(vix.handles().is_live(vm));
    }
    assert!(!vix.handles().is_live(vm));
    assert_eq!(sim.release_count(vm), 1);
    assert!(!sim.is_alive(vm));
}
