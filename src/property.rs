//! Typed properties and the codec that reads them off native handles.
//!
//! Every property id has one expected type and a set of handle types it is
//! defined on. The codec checks both before reading, and checks the native
//! type tag against the expected one; nothing is coerced.

use std::fmt;

use tracing::{debug, trace};

use crate::codes::{self, ErrorCode};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::vix::Vix;

/// Most property ids one read may ask for.
pub const MAX_PROPERTIES: usize = 6;

/// Native type tag of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// `VIX_PROPERTYTYPE_ANY`; the library could not say.
    Any,
    Integer,
    String,
    Bool,
    Handle,
    Int64,
    Blob,
}

impl PropertyType {
    /// Decode a native `VixPropertyType`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => PropertyType::Any,
            1 => PropertyType::Integer,
            2 => PropertyType::String,
            3 => PropertyType::Bool,
            4 => PropertyType::Handle,
            5 => PropertyType::Int64,
            6 => PropertyType::Blob,
            _ => return None,
        })
    }

    /// The native `VixPropertyType`.
    pub fn raw(self) -> i32 {
        match self {
            PropertyType::Any => 0,
            PropertyType::Integer => 1,
            PropertyType::String => 2,
            PropertyType::Bool => 3,
            PropertyType::Handle => 4,
            PropertyType::Int64 => 5,
            PropertyType::Blob => 6,
        }
    }
}

/// Kind of native object behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    None,
    Host,
    Vm,
    Network,
    Job,
    Snapshot,
    PropertyList,
    MetadataContainer,
    Other(i32),
}

impl HandleType {
    /// Decode a native `VixHandleType`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => HandleType::None,
            2 => HandleType::Host,
            3 => HandleType::Vm,
            5 => HandleType::Network,
            6 => HandleType::Job,
            7 => HandleType::Snapshot,
            9 => HandleType::PropertyList,
            11 => HandleType::MetadataContainer,
            other => HandleType::Other(other),
        }
    }

    /// The native `VixHandleType`.
    pub fn raw(self) -> i32 {
        match self {
            HandleType::None => 0,
            HandleType::Host => 2,
            HandleType::Vm => 3,
            HandleType::Network => 5,
            HandleType::Job => 6,
            HandleType::Snapshot => 7,
            HandleType::PropertyList => 9,
            HandleType::MetadataContainer => 11,
            HandleType::Other(raw) => raw,
        }
    }
}

/// Identifier of a property (`VixPropertyID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(i32);

impl PropertyId {
    /// Wrap a raw property id.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw property id.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Symbolic name, if the binding knows this id.
    pub fn name(self) -> Option<&'static str> {
        self.descriptor().map(|d| d.name)
    }

    /// Type the binding expects this id to carry.
    pub fn expected_type(self) -> Option<PropertyType> {
        self.descriptor().map(|d| d.ty)
    }

    /// Check if this id is defined on handles of `kind`.
    pub fn is_defined_on(self, kind: HandleType) -> bool {
        self.descriptor()
            .is_some_and(|d| d.scope.contains(&kind))
    }

    fn descriptor(self) -> Option<&'static Descriptor> {
        PROPERTIES
            .binary_search_by_key(&self.0, |d| d.id)
            .ok()
            .map(|idx| &PROPERTIES[idx])
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "property {}", self.0),
        }
    }
}

struct Descriptor {
    id: i32,
    name: &'static str,
    ty: PropertyType,
    scope: &'static [HandleType],
}

const ANY_OBJECT: &[HandleType] = &[
    HandleType::Host,
    HandleType::Vm,
    HandleType::Job,
    HandleType::Snapshot,
    HandleType::PropertyList,
];
const HOST: &[HandleType] = &[HandleType::Host];
const VM: &[HandleType] = &[HandleType::Vm];
const JOB: &[HandleType] = &[HandleType::Job];
const EVENT_INFO: &[HandleType] = &[HandleType::Job, HandleType::PropertyList];
const SNAPSHOT: &[HandleType] = &[HandleType::Snapshot];

macro_rules! properties {
    ($( $name:ident = $id:expr, $ty:ident, $scope:expr; )*) => {
        $(
            pub const $name: PropertyId = PropertyId($id);
        )*

        static PROPERTIES: &[Descriptor] = &[
            $(
                Descriptor {
                    id: $id,
                    name: stringify!($name),
                    ty: PropertyType::$ty,
                    scope: $scope,
                },
            )*
        ];
    };
}

properties! {
    VIX_PROPERTY_META_DATA_CONTAINER = 2, Handle, ANY_OBJECT;

    VIX_PROPERTY_HOST_HOSTTYPE = 50, Integer, HOST;
    VIX_PROPERTY_HOST_API_VERSION = 51, Integer, HOST;

    VIX_PROPERTY_VM_NUM_VCPUS = 101, Integer, VM;
    VIX_PROPERTY_VM_VMX_PATHNAME = 103, String, VM;
    VIX_PROPERTY_VM_VMTEAM_PATHNAME = 105, String, VM;
    VIX_PROPERTY_VM_MEMORY_SIZE = 106, Integer, VM;
    VIX_PROPERTY_VM_READ_ONLY = 107, Bool, VM;
    VIX_PROPERTY_VM_IN_VMTEAM = 128, Bool, VM;
    VIX_PROPERTY_VM_POWER_STATE = 129, Integer, VM;
    VIX_PROPERTY_VM_TOOLS_STATE = 152, Integer, VM;
    VIX_PROPERTY_VM_IS_RUNNING = 196, Bool, VM;
    VIX_PROPERTY_VM_SUPPORTED_FEATURES = 197, Integer, VM;

    VIX_PROPERTY_JOB_RESULT_ERROR_CODE = 3000, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_VM_IN_GROUP = 3001, Bool, JOB;
    VIX_PROPERTY_JOB_RESULT_USER_MESSAGE = 3002, String, JOB;
    VIX_PROPERTY_JOB_RESULT_EXIT_CODE = 3004, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_COMMAND_OUTPUT = 3005, String, JOB;
    VIX_PROPERTY_JOB_RESULT_HANDLE = 3010, Handle, JOB;
    VIX_PROPERTY_JOB_RESULT_GUEST_OBJECT_EXISTS = 3011, Bool, JOB;
    VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_ELAPSED_TIME = 3017, Int64, JOB;
    VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_EXIT_CODE = 3018, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_SCREEN_IMAGE_SIZE = 3019, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_SCREEN_IMAGE_DATA = 3020, Blob, JOB;
    VIX_PROPERTY_JOB_RESULT_ITEM_NAME = 3035, String, EVENT_INFO;
    VIX_PROPERTY_JOB_RESULT_FOUND_ITEM_DESCRIPTION = 3036, String, EVENT_INFO;
    VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_COUNT = 3046, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_HOST = 3048, String, JOB;
    VIX_PROPERTY_JOB_RESULT_SHARED_FOLDER_FLAGS = 3049, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_PROCESS_ID = 3051, Int64, JOB;
    VIX_PROPERTY_JOB_RESULT_PROCESS_OWNER = 3052, String, JOB;
    VIX_PROPERTY_JOB_RESULT_PROCESS_COMMAND = 3053, String, JOB;
    VIX_PROPERTY_JOB_RESULT_FILE_FLAGS = 3054, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_PROCESS_START_TIME = 3055, Integer, JOB;
    VIX_PROPERTY_JOB_RESULT_VM_VARIABLE_STRING = 3056, String, JOB;
    VIX_PROPERTY_JOB_RESULT_PROCESS_BEING_DEBUGGED = 3057, Bool, JOB;

    VIX_PROPERTY_FOUND_ITEM_LOCATION = 4010, String, EVENT_INFO;

    VIX_PROPERTY_SNAPSHOT_DISPLAYNAME = 4200, String, SNAPSHOT;
    VIX_PROPERTY_SNAPSHOT_DESCRIPTION = 4201, String, SNAPSHOT;
    VIX_PROPERTY_SNAPSHOT_POWERSTATE = 4205, Integer, SNAPSHOT;
}

/// Terminator of native property lists (`VIX_PROPERTY_NONE`).
pub const VIX_PROPERTY_NONE: PropertyId = PropertyId(0);

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Integer(i32),
    Int64(i64),
    Bool(bool),
    String(String),
    Handle(Handle),
    Blob(Vec<u8>),
}

fn mismatch() -> Error {
    Error::new(codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH, "PropertyValue")
}

impl PropertyValue {
    /// Type tag of this value.
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Int64(_) => PropertyType::Int64,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Handle(_) => PropertyType::Handle,
            PropertyValue::Blob(_) => PropertyType::Blob,
        }
    }

    pub fn as_int(&self) -> Result<i32> {
        match self {
            PropertyValue::Integer(v) => Ok(*v),
            _ => Err(mismatch()),
        }
    }

    pub fn as_int64(&self) -> Result<i64> {
        match self {
            PropertyValue::Int64(v) => Ok(*v),
            _ => Err(mismatch()),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            PropertyValue::Bool(v) => Ok(*v),
            _ => Err(mismatch()),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            PropertyValue::String(v) => Ok(v),
            _ => Err(mismatch()),
        }
    }

    pub fn as_handle(&self) -> Result<Handle> {
        match self {
            PropertyValue::Handle(v) => Ok(*v),
            _ => Err(mismatch()),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            PropertyValue::Blob(v) => Ok(v),
            _ => Err(mismatch()),
        }
    }

    /// Take the string out of a string value.
    pub fn into_string(self) -> Result<String> {
        match self {
            PropertyValue::String(v) => Ok(v),
            _ => Err(mismatch()),
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int64(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Handle> for PropertyValue {
    fn from(v: Handle) -> Self {
        PropertyValue::Handle(v)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        PropertyValue::Blob(v)
    }
}

/// Split a decoded list into exactly `N` values.
pub(crate) fn fixed<const N: usize>(
    values: Vec<PropertyValue>,
    op: &'static str,
) -> Result<[PropertyValue; N]> {
    values
        .try_into()
        .map_err(|_| Error::new(codes::VIX_E_FAIL, op))
}

fn check_request(ids: &[PropertyId], op: &'static str) -> Result<()> {
    if ids.len() > MAX_PROPERTIES {
        return Err(Error::new(codes::VIX_E_BINDING_TOO_MANY_PROPERTIES, op));
    }
    Ok(())
}

fn unrecognized(op: &'static str) -> Error {
    Error::new(codes::VIX_E_BINDING_UNRECOGNIZED_PROPERTY, op)
}

/// Expected type of `id` on a handle of `kind`.
///
/// `HandleType::None` means the library could not classify the handle; the
/// scope check is left to the native call, which reports the bad handle.
fn expected(id: PropertyId, kind: HandleType, op: &'static str) -> Result<PropertyType> {
    let desc = id.descriptor().ok_or_else(|| unrecognized(op))?;
    if kind != HandleType::None && !desc.scope.contains(&kind) {
        return Err(unrecognized(op));
    }
    Ok(desc.ty)
}

/// Refuse reads on a job that has not reached a terminal state.
fn ensure_complete(vix: &Vix, handle: Handle, kind: HandleType, op: &'static str) -> Result<()> {
    if kind != HandleType::Job {
        return Ok(());
    }
    let done = vix
        .backend()
        .job_check_completion(handle)
        .map_err(|code| vix.error(code, "VixJob_CheckCompletion", handle))?;
    if !done {
        trace!(job = %handle, op, "job still pending");
        return Err(Error::new(codes::VIX_E_BINDING_JOB_NOT_COMPLETE, op));
    }
    Ok(())
}

/// Read `ids` off `handle`, in request order.
pub(crate) fn decode(vix: &Vix, handle: Handle, ids: &[PropertyId]) -> Result<Vec<PropertyValue>> {
    const OP: &str = "Vix_GetProperties";
    check_request(ids, OP)?;

    let backend = vix.backend();
    let kind = backend.handle_type(handle);
    ensure_complete(vix, handle, kind, OP)?;

    ids.iter()
        .map(|&id| {
            let want = expected(id, kind, OP)?;
            let native = backend
                .property_type(handle, id)
                .map_err(|code| native_error(vix, code, OP, handle))?;
            match native {
                PropertyType::Any => {
                    return Err(Error::new(
                        codes::VIX_E_BINDING_CANNOT_RETURN_UNKNOWN_PROPERTYTYPE,
                        OP,
                    ))
                }
                t if t != want => {
                    return Err(Error::new(codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH, OP))
                }
                _ => {}
            }
            let value = backend
                .property(handle, id, want)
                .map_err(|code| native_error(vix, code, OP, handle))?;
            checked(value, want, OP, |v| trace!(%handle, %id, ?v, "decoded property"))
        })
        .collect()
}

/// Read `ids` off the `index`-th element of a job's result set.
pub(crate) fn decode_nth(
    vix: &Vix,
    job: Handle,
    index: usize,
    ids: &[PropertyId],
) -> Result<Vec<PropertyValue>> {
    const OP: &str = "VixJob_GetNthProperties";
    check_request(ids, OP)?;

    let index = i32::try_from(index).map_err(|_| Error::new(codes::VIX_E_INVALID_ARG, OP))?;
    let backend = vix.backend();
    let kind = backend.handle_type(job);
    ensure_complete(vix, job, kind, OP)?;

    ids.iter()
        .map(|&id| {
            let want = expected(id, kind, OP)?;
            let value = backend
                .job_nth_property(job, index, id, want)
                .map_err(|code| native_error(vix, code, OP, job))?;
            checked(value, want, OP, |v| trace!(%job, index, %id, ?v, "decoded nth property"))
        })
        .collect()
}

/// Number of result-set elements carrying `id`.
pub(crate) fn count(vix: &Vix, job: Handle, id: PropertyId) -> Result<usize> {
    const OP: &str = "VixJob_GetNumProperties";
    let kind = vix.backend().handle_type(job);
    expected(id, kind, OP)?;
    ensure_complete(vix, job, kind, OP)?;
    let n = vix.backend().job_num_properties(job, id);
    usize::try_from(n).map_err(|_| {
        debug!(%job, %id, n, "negative result-set count");
        Error::new(codes::VIX_E_FAIL, OP)
    })
}

fn checked(
    value: PropertyValue,
    want: PropertyType,
    op: &'static str,
    log: impl FnOnce(&PropertyValue),
) -> Result<PropertyValue> {
    if value.property_type() != want {
        return Err(Error::new(codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH, op));
    }
    log(&value);
    Ok(value)
}

fn native_error(vix: &Vix, code: ErrorCode, op: &'static str, handle: Handle) -> Error {
    match code {
        codes::VIX_E_UNRECOGNIZED_PROPERTY => unrecognized(op),
        codes::VIX_E_PROPERTY_TYPE_MISMATCH | codes::VIX_E_TYPE_MISMATCH => {
            Error::new(codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH, op)
        }
        _ => vix.error(code, op, handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sorted() {
        for pair in PROPERTIES.windows(2) {
            assert!(pair[0].id < pair[1].id, "{} out of order", pair[1].name);
        }
    }

    #[test]
    fn test_expected_types() {
        assert_eq!(VIX_PROPERTY_JOB_RESULT_PROCESS_ID.expected_type(), Some(PropertyType::Int64));
        assert_eq!(
            VIX_PROPERTY_JOB_RESULT_GUEST_PROGRAM_ELAPSED_TIME.expected_type(),
            Some(PropertyType::Int64)
        );
        assert_eq!(VIX_PROPERTY_VM_POWER_STATE.expected_type(), Some(PropertyType::Integer));
        assert_eq!(VIX_PROPERTY_VM_IS_RUNNING.expected_type(), Some(PropertyType::Bool));
        assert_eq!(PropertyId::from_raw(9999).expected_type(), None);
    }

    #[test]
    fn test_scopes() {
        assert!(VIX_PROPERTY_VM_VMX_PATHNAME.is_defined_on(HandleType::Vm));
        assert!(!VIX_PROPERTY_VM_VMX_PATHNAME.is_defined_on(HandleType::Job));
        assert!(VIX_PROPERTY_FOUND_ITEM_LOCATION.is_defined_on(HandleType::PropertyList));
    }

    #[test]
    fn test_value_accessors_reject_wrong_tag() {
        let v = PropertyValue::from(7);
        assert_eq!(v.as_int().expect("integer should decode"), 7);
        let err = v.as_int64().unwrap_err();
        assert_eq!(err.code(), codes::VIX_E_BINDING_PROPERTY_TYPE_MISMATCH);
        assert!(PropertyValue::from("x").as_bool().is_err());
        assert!(PropertyValue::from(true).as_bool().expect("bool should decode"));
    }

    #[test]
    fn test_type_roundtrip() {
        for raw in 0..=6 {
            let ty = PropertyType::from_raw(raw).expect("known property type");
            assert_eq!(ty.raw(), raw);
        }
        assert_eq!(PropertyType::from_raw(42), None);
        assert_eq!(HandleType::from_raw(99), HandleType::Other(99));
        assert_eq!(HandleType::from_raw(3), HandleType::Vm);
    }

    #[test]
    fn test_fixed() {
        let [a, b] = fixed::<2>(vec![1.into(), "x".into()], "t").expect("two values");
        assert_eq!(a, PropertyValue::Integer(1));
        assert_eq!(b.as_str().expect("string"), "x");
        assert!(fixed::<3>(vec![1.into()], "t").is_err());
    }
}
