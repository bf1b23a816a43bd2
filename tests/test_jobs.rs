//! Job, property decoding and callback tests against the in-process simulator.

mod common;

use std::sync::{Arc, Mutex};

use vix::codes;
use vix::property::*;
use vix::{Event, EventType, Handle, Operation, Outcome, Registration};

#[test]
fn test_pending_job_properties_not_complete() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.respond("VixVM_Suspend", Outcome::ok().deferred());

    let job = vix
        .dispatch(Operation::VmSuspend { vm: vm.handle(), options: 0 })
        .expect("dispatch should succeed");
    assert!(!job.check_completion().expect("check_completion should succeed"));

    let err = job
        .properties(&[VIX_PROPERTY_JOB_RESULT_ERROR_CODE])
        .expect_err("a pending job has no properties");
    assert_eq!(err.code(), codes::VIX_E_BINDING_JOB_NOT_COMPLETE);

    // Still usable afterwards.
    sim.finish(job.handle());
    job.wait_completed().expect("wait should succeed once finished");
}

#[test]
fn test_raw_reads_on_pending_job_not_complete() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.respond(
        "VixVM_RunProgramInGuest",
        Outcome::ok()
            .property(VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_EXIT_CODE, 42)
            .item(vec![(VIX_PROPERTY_JOB_RESULT_ITEM_NAME, "x".into())])
            .deferred(),
    );

    let job = vix
        .dispatch(Operation::VmRunProgramInGuest {
            vm: vm.handle(),
            program: "/bin/true".into(),
            args: String::new(),
            options: 0,
        })
        .expect("dispatch should succeed");
    assert!(!job.check_completion().expect("check_completion should succeed"));

    let err = vix
        .properties(job.handle(), &[VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_EXIT_CODE])
        .expect_err("a pending job has no properties");
    assert_eq!(err.code(), codes::VIX_E_BINDING_JOB_NOT_COMPLETE);

    let err = vix
        .count(job.handle(), VIX_PROPERTY_JOB_RESULT_ITEM_NAME)
        .expect_err("a pending job has no result set");
    assert_eq!(err.code(), codes::VIX_E_BINDING_JOB_NOT_COMPLETE);

    let err = vix
        .nth_properties(job.handle(), 0, &[VIX_PROPERTY_JOB_RESULT_ITEM_NAME])
        .expect_err("a pending job has no result set");
    assert_eq!(err.code(), codes::VIX_E_BINDING_JOB_NOT_COMPLETE);

    sim.finish(job.handle());
    let done = job.wait_completed().expect("wait should succeed once finished");
    assert_eq!(
        done.properties(&[VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_EXIT_CODE])
            .expect("properties should succeed"),
        vec![PropertyValue::Integer(42)]
    );
    assert_eq!(done.count(VIX_PROPERTY_JOB_RESULT_ITEM_NAME).expect("count should succeed"), 1);
}

#[test]
fn test_negative_result_count_is_an_error() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.respond(
        "VixVM_ListDirectoryInGuest",
        Outcome::ok().item(vec![(VIX_PROPERTY_JOB_RESULT_ITEM_NAME, "a".into())]),
    );

    let done = vix
        .dispatch(Operation::VmListDirectoryInGuest {
            vm: vm.handle(),
            path: "/".into(),
            options: 0,
        })
        .expect("dispatch should succeed")
        .wait_completed()
        .expect("wait should succeed");
    sim.set_bad_count(done.handle(), VIX_PROPERTY_JOB_RESULT_ITEM_NAME);

    let err = done
        .count(VIX_PROPERTY_JOB_RESULT_ITEM_NAME)
        .expect_err("a negative count is not an empty set");
    assert_eq!(err.code(), codes::VIX_E_FAIL);
    assert_eq!(err.op(), "VixJob_GetNumProperties");
}

#[test]
fn test_expired_handle_reports_possible_expiry() {
    let (_vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");

    sim.expire(vm.handle());

    let err = vm.power_on(0).expect_err("power_on should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_INVALID_HANDLE_POSSIBLE_SERIALNUMBER_EXPIRY);
    assert!(err.is_handle_expired());

    let err = vm.vmx_path().expect_err("property read should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_INVALID_HANDLE_POSSIBLE_SERIALNUMBER_EXPIRY);
}

#[test]
fn test_unknown_handle_is_plain_invalid() {
    let (vix, _sim) = vix::Vix::simulated();
    let err = vix
        .properties(Handle::from_raw(4711), &[VIX_PROPERTY_VM_VMX_PATHNAME])
        .expect_err("read should fail");
    assert_eq!(err.code(), codes::VIX_E_INVALID_HANDLE);
    assert!(!err.is_handle_expired());
}

#[test]
fn test_unrecognized_property() {
    let (vix, _sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");

    // Not in the table at all.
    let err = vix
        .properties(vm.handle(), &[PropertyId::from_raw(9999)])
        .expect_err("unknown id should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_UNRECOGNIZED_PROPERTY);

    // Defined, but not on a VM.
    let err = vix
        .properties(vm.handle(), &[VIX_PROPERTY_JOB_RESULT_EXIT_CODE])
        .expect_err("job property on a VM should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_UNRECOGNIZED_PROPERTY);

    // Defined on a VM, but this one does not carry it.
    let err = vm.num_vcpus().expect_err("missing property should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_UNRECOGNIZED_PROPERTY);
}

#[test]
fn test_type_mismatch() {
    let (_vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.set_property(vm.handle(), VIX_PROPERTY_VM_NUM_VCPUS, "two");

    let err = vm.num_vcpus().expect_err("string for an integer should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH);
    assert!(err.is_marshaling());
}

#[test]
fn test_untyped_property() {
    let (_vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.set_property(vm.handle(), VIX_PROPERTY_VM_MEMORY_SIZE, 1024);
    assert_eq!(vm.memory_size().expect("memory_size should succeed"), 1024);

    sim.set_untyped(vm.handle(), VIX_PROPERTY_VM_MEMORY_SIZE);
    let err = vm.memory_size().expect_err("untyped property should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_CANNOT_RETURN_UNKNOWN_PROPERTYTYPE);
}

#[test]
fn test_too_many_properties() {
    let (vix, _sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");

    let ids = [
        VIX_PROPERTY_VM_NUM_VCPUS,
        VIX_PROPERTY_VM_VMX_PATHNAME,
        VIX_PROPERTY_VM_MEMORY_SIZE,
        VIX_PROPERTY_VM_READ_ONLY,
        VIX_PROPERTY_VM_POWER_STATE,
        VIX_PROPERTY_VM_TOOLS_STATE,
        VIX_PROPERTY_VM_IS_RUNNING,
    ];
    assert_eq!(ids.len(), MAX_PROPERTIES + 1);

    let err = vix.properties(vm.handle(), &ids).expect_err("seven ids should fail");
    assert_eq!(err.code(), codes::VIX_E_BINDING_TOO_MANY_PROPERTIES);
}

#[test]
fn test_properties_in_request_order() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.set_property(vm.handle(), VIX_PROPERTY_VM_NUM_VCPUS, 4);
    sim.set_property(vm.handle(), VIX_PROPERTY_VM_READ_ONLY, true);

    let values = vix
        .properties(
            vm.handle(),
            &[VIX_PROPERTY_VM_READ_ONLY, VIX_PROPERTY_VM_VMX_PATHNAME, VIX_PROPERTY_VM_NUM_VCPUS],
        )
        .expect("properties should succeed");
    assert_eq!(
        values,
        vec![
            PropertyValue::Bool(true),
            PropertyValue::String("/vms/a.vmx".into()),
            PropertyValue::Integer(4),
        ]
    );
}

type Seen = Arc<Mutex<Vec<EventType>>>;

#[test]
fn test_callback_progress_then_completed() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.respond("VixVM_PowerOff", Outcome::ok().progress(3));

    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let registration = Registration::new(&vix, seen.clone(), |event: &Event<'_, Seen>| {
        event.client_data().lock().unwrap().push(event.kind());
        Ok(())
    })
    .expect("registration should start");

    let job = vix
        .dispatch_with(Operation::VmPowerOff { vm: vm.handle(), options: 0 }, &registration)
        .expect("dispatch should succeed");
    let job_handle = job.handle();
    job.wait_completed().expect("wait should succeed");

    assert!(registration.wait_completed(job_handle));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            EventType::JobProgress,
            EventType::JobProgress,
            EventType::JobProgress,
            EventType::JobCompleted,
        ]
    );
    assert_eq!(registration.delivered(), 4);
    assert_eq!(registration.failures(), 0);
}

#[test]
fn test_client_data_reaches_every_call() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    sim.respond("VixVM_Reset", Outcome::ok().progress(1));

    let registration = Registration::new(
        &vix,
        (String::from("ctx-7"), Mutex::new(Vec::new())),
        |event: &Event<'_, (String, Mutex<Vec<String>>)>| {
            let (tag, log) = event.client_data();
            log.lock().unwrap().push(tag.clone());
            Ok(())
        },
    )
    .expect("registration should start");

    let job = vix
        .dispatch_with(Operation::VmReset { vm: vm.handle(), options: 0 }, &registration)
        .expect("dispatch should succeed");
    let job_handle = job.handle();
    job.wait_completed().expect("wait should succeed");
    assert!(registration.wait_completed(job_handle));

    let log = registration.client_data().1.lock().unwrap().clone();
    assert_eq!(log, vec!["ctx-7", "ctx-7"]);
}

#[test]
fn test_jobs_release_their_handles() {
    let (vix, sim, host) = common::connected();
    let vm = host.open_vm("/vms/a.vmx").expect("open_vm should succeed");
    let before = sim.total_releases();

    for _ in 0..5 {
        vm.suspend(0).expect("suspend should succeed");
    }

    assert_eq!(sim.total_releases(), before + 5, "one release per job");
    assert_eq!(vix.handles().live_count(), 2);
    assert_eq!(sim.rejected_releases(), 0);
}
