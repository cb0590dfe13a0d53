//! SAP NetWeaver RFC SDK backend (`libsapnwrfc`).
//!
//! Only the handful of SDK entry points needed for one logon, one metadata
//! lookup and one call are declared here. `SAP_UC` is UTF-16 on every
//! platform the SDK ships for, so strings are converted with the standard
//! library's UTF-16 codecs instead of the SDK converters.
//!
//! Handles returned by the SDK are only used on the thread that opened the
//! connection, except for `RfcCancel`, which the SDK documents as callable
//! from any thread.
#![allow(non_camel_case_types, non_snake_case)]

use serde_json::{Map, Number, Value};
use std::ffi::c_void;
use std::iter;
use std::os::raw::{c_int, c_uint};
use std::ptr;
use std::sync::{Arc, Mutex};

use super::{
    Cancel, Connection, ConnectionAttributes, Connector, Diagnostic, Direction, FieldDescription,
    FunctionDescription, ParameterDescription, RfcError, RfcType, TypeDescription,
};
use crate::config::ConnectionParams;
use crate::log_trace;

/* ---- SDK Types ---- */

type SAP_UC = u16;
type RFC_RC = c_int;
type RFC_ERROR_GROUP = c_int;
type RFCTYPE = c_int;
type RFC_DIRECTION = c_int;
type RFC_CONNECTION_HANDLE = *mut c_void;
type RFC_FUNCTION_DESC_HANDLE = *mut c_void;
type RFC_TYPE_DESC_HANDLE = *mut c_void;
/// Function, structure and table handles are all data containers.
type DATA_CONTAINER_HANDLE = *mut c_void;

const RFC_OK: RFC_RC = 0;
const RFC_CANCELED: RFC_RC = 7;
const RFC_NOT_FOUND: RFC_RC = 17;

const RFC_IMPORT: RFC_DIRECTION = 0x01;
const RFC_EXPORT: RFC_DIRECTION = 0x02;
const RFC_CHANGING: RFC_DIRECTION = RFC_IMPORT | RFC_EXPORT;

const ABAP_NAME_LEN: usize = 30 + 1;

#[allow(dead_code)]
#[repr(C)]
struct RFC_ERROR_INFO {
    code: RFC_RC,
    group: RFC_ERROR_GROUP,
    key: [SAP_UC; 128],
    message: [SAP_UC; 512],
    abapMsgClass: [SAP_UC; 20 + 1],
    abapMsgType: [SAP_UC; 1 + 1],
    abapMsgNumber: [SAP_UC; 3 + 1],
    abapMsgV1: [SAP_UC; 50 + 1],
    abapMsgV2: [SAP_UC; 50 + 1],
    abapMsgV3: [SAP_UC; 50 + 1],
    abapMsgV4: [SAP_UC; 50 + 1],
}

#[allow(dead_code)]
#[repr(C)]
struct RFC_CONNECTION_PARAMETER {
    name: *const SAP_UC,
    value: *const SAP_UC,
}

#[allow(dead_code)]
#[repr(C)]
struct RFC_ATTRIBUTES {
    dest: [SAP_UC; 64 + 1],
    host: [SAP_UC; 100 + 1],
    partnerHost: [SAP_UC; 100 + 1],
    sysNumber: [SAP_UC; 2 + 1],
    sysId: [SAP_UC; 8 + 1],
    client: [SAP_UC; 3 + 1],
    user: [SAP_UC; 12 + 1],
    language: [SAP_UC; 2 + 1],
    trace: [SAP_UC; 1 + 1],
    isoLanguage: [SAP_UC; 2 + 1],
    codepage: [SAP_UC; 4 + 1],
    partnerCodepage: [SAP_UC; 4 + 1],
    rfcRole: [SAP_UC; 1 + 1],
    type_: [SAP_UC; 1 + 1],
    partnerType: [SAP_UC; 1 + 1],
    rel: [SAP_UC; 4 + 1],
    partnerRel: [SAP_UC; 4 + 1],
    kernelRel: [SAP_UC; 4 + 1],
    cpicConvId: [SAP_UC; 8 + 1],
    progName: [SAP_UC; 128 + 1],
    partnerBytesPerChar: [SAP_UC; 1 + 1],
    partnerSystemCodepage: [SAP_UC; 4 + 1],
    partnerIP: [SAP_UC; 15 + 1],
    partnerIPv6: [SAP_UC; 45 + 1],
    reserved: [SAP_UC; 17],
}

#[allow(dead_code)]
#[repr(C)]
struct RFC_PARAMETER_DESC {
    name: [SAP_UC; ABAP_NAME_LEN],
    type_: RFCTYPE,
    direction: RFC_DIRECTION,
    nucLength: c_uint,
    ucLength: c_uint,
    decimals: c_uint,
    typeDescHandle: RFC_TYPE_DESC_HANDLE,
    defaultValue: [SAP_UC; 30 + 1],
    parameterText: [SAP_UC; 79 + 1],
    optional: u8,
    extendedDescription: *mut c_void,
}

#[allow(dead_code)]
#[repr(C)]
struct RFC_FIELD_DESC {
    name: [SAP_UC; ABAP_NAME_LEN],
    type_: RFCTYPE,
    nucLength: c_uint,
    nucOffset: c_uint,
    ucLength: c_uint,
    ucOffset: c_uint,
    decimals: c_uint,
    typeDescHandle: RFC_TYPE_DESC_HANDLE,
    extendedDescription: *mut c_void,
}

#[link(name = "sapnwrfc")]
unsafe extern "C" {
    fn RfcOpenConnection(
        connectionParams: *const RFC_CONNECTION_PARAMETER,
        paramCount: c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_CONNECTION_HANDLE;
    fn RfcCloseConnection(rfcHandle: RFC_CONNECTION_HANDLE, errorInfo: *mut RFC_ERROR_INFO) -> RFC_RC;
    fn RfcCancel(rfcHandle: RFC_CONNECTION_HANDLE, errorInfo: *mut RFC_ERROR_INFO) -> RFC_RC;
    fn RfcGetConnectionAttributes(
        rfcHandle: RFC_CONNECTION_HANDLE,
        attr: *mut RFC_ATTRIBUTES,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;

    fn RfcGetFunctionDesc(
        rfcHandle: RFC_CONNECTION_HANDLE,
        funcName: *const SAP_UC,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_FUNCTION_DESC_HANDLE;
    fn RfcGetParameterCount(
        funcDesc: RFC_FUNCTION_DESC_HANDLE,
        count: *mut c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetParameterDescByIndex(
        funcDesc: RFC_FUNCTION_DESC_HANDLE,
        index: c_uint,
        paramDesc: *mut RFC_PARAMETER_DESC,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetTypeName(
        typeHandle: RFC_TYPE_DESC_HANDLE,
        bufferForName: *mut SAP_UC,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetTypeLength(
        typeHandle: RFC_TYPE_DESC_HANDLE,
        nucByteLength: *mut c_uint,
        ucByteLength: *mut c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetFieldCount(
        typeHandle: RFC_TYPE_DESC_HANDLE,
        count: *mut c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetFieldDescByIndex(
        typeHandle: RFC_TYPE_DESC_HANDLE,
        index: c_uint,
        fieldDescr: *mut RFC_FIELD_DESC,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetFieldDescByName(
        typeHandle: RFC_TYPE_DESC_HANDLE,
        name: *const SAP_UC,
        fieldDescr: *mut RFC_FIELD_DESC,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;

    fn RfcCreateFunction(
        funcDescHandle: RFC_FUNCTION_DESC_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> DATA_CONTAINER_HANDLE;
    fn RfcDestroyFunction(funcHandle: DATA_CONTAINER_HANDLE, errorInfo: *mut RFC_ERROR_INFO) -> RFC_RC;
    fn RfcInvoke(
        rfcHandle: RFC_CONNECTION_HANDLE,
        funcHandle: DATA_CONTAINER_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcDescribeType(
        dataHandle: DATA_CONTAINER_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_TYPE_DESC_HANDLE;

    fn RfcSetString(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        value: *const SAP_UC,
        valueLength: c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetStringLength(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        stringLength: *mut c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetString(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        stringBuffer: *mut SAP_UC,
        bufferLength: c_uint,
        stringLength: *mut c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetInt(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        value: *mut i32,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetInt8(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        value: *mut i64,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetFloat(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        value: *mut f64,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetStructure(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        structHandle: *mut DATA_CONTAINER_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetTable(
        dataHandle: DATA_CONTAINER_HANDLE,
        name: *const SAP_UC,
        tableHandle: *mut DATA_CONTAINER_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetRowCount(
        tableHandle: DATA_CONTAINER_HANDLE,
        rowCount: *mut c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcMoveTo(
        tableHandle: DATA_CONTAINER_HANDLE,
        index: c_uint,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> RFC_RC;
    fn RfcGetCurrentRow(
        tableHandle: DATA_CONTAINER_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> DATA_CONTAINER_HANDLE;
    fn RfcAppendNewRow(
        tableHandle: DATA_CONTAINER_HANDLE,
        errorInfo: *mut RFC_ERROR_INFO,
    ) -> DATA_CONTAINER_HANDLE;
}

/* ---- String / Error Helpers ---- */

fn to_sap_uc(s: &str) -> Vec<SAP_UC> {
    s.encode_utf16().chain(iter::once(0)).collect()
}

fn from_sap_uc(buf: &[SAP_UC]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

fn rc_name(code: RFC_RC) -> String {
    let name = match code {
        0 => "RFC_OK",
        1 => "RFC_COMMUNICATION_FAILURE",
        2 => "RFC_LOGON_FAILURE",
        3 => "RFC_ABAP_RUNTIME_FAILURE",
        4 => "RFC_ABAP_MESSAGE",
        5 => "RFC_ABAP_EXCEPTION",
        6 => "RFC_CLOSED",
        7 => "RFC_CANCELED",
        8 => "RFC_TIMEOUT",
        9 => "RFC_MEMORY_INSUFFICIENT",
        10 => "RFC_VERSION_MISMATCH",
        11 => "RFC_INVALID_PROTOCOL",
        12 => "RFC_SERIALIZATION_FAILURE",
        13 => "RFC_INVALID_HANDLE",
        14 => "RFC_RETRY",
        15 => "RFC_EXTERNAL_FAILURE",
        16 => "RFC_EXECUTED",
        17 => "RFC_NOT_FOUND",
        18 => "RFC_NOT_SUPPORTED",
        19 => "RFC_ILLEGAL_STATE",
        20 => "RFC_INVALID_PARAMETER",
        21 => "RFC_CODEPAGE_CONVERSION_FAILURE",
        22 => "RFC_CONVERSION_FAILURE",
        23 => "RFC_BUFFER_TOO_SMALL",
        24 => "RFC_TABLE_MOVE_BOF",
        25 => "RFC_TABLE_MOVE_EOF",
        other => return format!("RFC_RC({other})"),
    };
    name.to_string()
}

impl RFC_ERROR_INFO {
    fn new() -> Self {
        // all-integer struct; zero is the SDK's "no error" state
        unsafe { std::mem::zeroed() }
    }

    fn diagnostic(&self) -> Diagnostic {
        let mut message = from_sap_uc(&self.message);
        let class = from_sap_uc(&self.abapMsgClass);
        if message.is_empty() && !class.is_empty() {
            message = format!(
                "{}({}) {} {} {} {}",
                class,
                from_sap_uc(&self.abapMsgNumber),
                from_sap_uc(&self.abapMsgV1),
                from_sap_uc(&self.abapMsgV2),
                from_sap_uc(&self.abapMsgV3),
                from_sap_uc(&self.abapMsgV4),
            )
            .trim_end()
            .to_string();
        }
        Diagnostic {
            code: rc_name(self.code),
            key: from_sap_uc(&self.key),
            message,
        }
    }

    fn to_error(&self) -> RfcError {
        classify(self.code, self.group, self.diagnostic())
    }

    fn is_unknown_function(&self) -> bool {
        self.code == RFC_NOT_FOUND || from_sap_uc(&self.key) == "FU_NOT_FOUND"
    }
}

fn classify(code: RFC_RC, group: RFC_ERROR_GROUP, diag: Diagnostic) -> RfcError {
    if code == RFC_CANCELED {
        return RfcError::Cancelled(diag);
    }
    match group {
        1 => RfcError::Application(diag),
        2 => RfcError::Runtime(diag),
        3 => RfcError::Logon(diag),
        4 => RfcError::Communication(diag),
        _ => RfcError::Other(diag),
    }
}

fn check(rc: RFC_RC, err: &RFC_ERROR_INFO) -> Result<(), RfcError> {
    if rc == RFC_OK { Ok(()) } else { Err(err.to_error()) }
}

fn marshal(name: &str, reason: impl Into<String>) -> RfcError {
    RfcError::Marshal {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn direction_from(code: RFC_DIRECTION) -> Direction {
    match code {
        RFC_IMPORT => Direction::Importing,
        RFC_EXPORT => Direction::Exporting,
        RFC_CHANGING => Direction::Changing,
        _ => Direction::Tables,
    }
}

/* ---- Connector / Connection ---- */

/// Connector backed by the SDK.
#[derive(Debug, Default)]
pub struct NwRfc;

struct RawHandle(RFC_CONNECTION_HANDLE);

// The SDK permits RfcCancel from a foreign thread; every other use stays on
// the opening thread.
unsafe impl Send for RawHandle {}

struct SharedHandle(Mutex<RawHandle>);

impl SharedHandle {
    fn get(&self) -> RFC_CONNECTION_HANDLE {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn take(&self) -> RFC_CONNECTION_HANDLE {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut guard.0, ptr::null_mut())
    }
}

impl Cancel for SharedHandle {
    fn cancel(&self) {
        let guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if guard.0.is_null() {
            return;
        }
        let mut err = RFC_ERROR_INFO::new();
        unsafe {
            RfcCancel(guard.0, &mut err);
        }
    }
}

struct NwConnection {
    handle: Arc<SharedHandle>,
}

impl Connector for NwRfc {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, RfcError> {
        let owned: Vec<(Vec<SAP_UC>, Vec<SAP_UC>)> = params
            .logon_parameters()
            .into_iter()
            .map(|(k, v)| (to_sap_uc(k), to_sap_uc(v)))
            .collect();
        let raw: Vec<RFC_CONNECTION_PARAMETER> = owned
            .iter()
            .map(|(k, v)| RFC_CONNECTION_PARAMETER {
                name: k.as_ptr(),
                value: v.as_ptr(),
            })
            .collect();

        let mut err = RFC_ERROR_INFO::new();
        let handle = unsafe { RfcOpenConnection(raw.as_ptr(), raw.len() as c_uint, &mut err) };
        if handle.is_null() {
            return Err(err.to_error());
        }
        Ok(Box::new(NwConnection {
            handle: Arc::new(SharedHandle(Mutex::new(RawHandle(handle)))),
        }))
    }
}

impl NwConnection {
    fn raw(&self) -> Result<RFC_CONNECTION_HANDLE, RfcError> {
        let h = self.handle.get();
        if h.is_null() {
            return Err(RfcError::Communication(Diagnostic {
                code: rc_name(6),
                key: String::new(),
                message: "connection already closed".into(),
            }));
        }
        Ok(h)
    }

    fn function_desc(&self, function: &str) -> Result<Option<RFC_FUNCTION_DESC_HANDLE>, RfcError> {
        let h = self.raw()?;
        let name = to_sap_uc(function);
        let mut err = RFC_ERROR_INFO::new();
        let desc = unsafe { RfcGetFunctionDesc(h, name.as_ptr(), &mut err) };
        if !desc.is_null() {
            return Ok(Some(desc));
        }
        if err.is_unknown_function() {
            return Ok(None);
        }
        Err(err.to_error())
    }
}

impl Connection for NwConnection {
    fn attributes(&self) -> Result<ConnectionAttributes, RfcError> {
        let h = self.raw()?;
        let mut attr: RFC_ATTRIBUTES = unsafe { std::mem::zeroed() };
        let mut err = RFC_ERROR_INFO::new();
        check(unsafe { RfcGetConnectionAttributes(h, &mut attr, &mut err) }, &err)?;
        Ok(ConnectionAttributes {
            sys_id: from_sap_uc(&attr.sysId),
            host: from_sap_uc(&attr.host),
            partner_host: from_sap_uc(&attr.partnerHost),
            sys_number: from_sap_uc(&attr.sysNumber),
            client: from_sap_uc(&attr.client),
            user: from_sap_uc(&attr.user),
            language: from_sap_uc(&attr.language),
            partner_release: from_sap_uc(&attr.partnerRel),
            kernel_release: from_sap_uc(&attr.kernelRel),
        })
    }

    fn describe(&mut self, function: &str) -> Result<Option<FunctionDescription>, RfcError> {
        let Some(desc) = self.function_desc(function)? else {
            return Ok(None);
        };
        let parameters = unsafe { read_parameters(desc)? };
        Ok(Some(FunctionDescription {
            name: function.to_string(),
            parameters,
        }))
    }

    fn invoke(
        &mut self,
        function: &str,
        params: &Map<String, Value>,
    ) -> Result<Map<String, Value>, RfcError> {
        let h = self.raw()?;
        let desc = self.function_desc(function)?.ok_or_else(|| {
            RfcError::Application(Diagnostic {
                code: rc_name(RFC_NOT_FOUND),
                key: "FU_NOT_FOUND".into(),
                message: format!("function module {function} not found"),
            })
        })?;

        unsafe {
            let declared = read_parameters(desc)?;
            let mut err = RFC_ERROR_INFO::new();
            let func = RfcCreateFunction(desc, &mut err);
            if func.is_null() {
                return Err(err.to_error());
            }
            let func = FunctionGuard(func);

            for (name, value) in params {
                let param = declared
                    .iter()
                    .find(|p| p.name == *name)
                    .ok_or_else(|| marshal(name, format!("not a parameter of {function}")))?;
                fill_value(func.0, name, param.parameter_type, value)?;
            }

            let mut err = RFC_ERROR_INFO::new();
            check(RfcInvoke(h, func.0, &mut err), &err)?;

            let mut out = Map::new();
            for param in declared.iter().filter(|p| p.direction.is_output()) {
                let name = to_sap_uc(&param.name);
                let value = read_value(func.0, &name, param.parameter_type)?;
                out.insert(param.name.clone(), value);
            }
            Ok(out)
        }
    }

    fn canceller(&self) -> Option<Arc<dyn Cancel>> {
        Some(self.handle.clone())
    }

    fn close(&mut self) {
        let h = self.handle.take();
        if h.is_null() {
            return;
        }
        let mut err = RFC_ERROR_INFO::new();
        let rc = unsafe { RfcCloseConnection(h, &mut err) };
        if rc != RFC_OK {
            log_trace!("RfcCloseConnection: {}", err.diagnostic());
        }
    }
}

impl Drop for NwConnection {
    fn drop(&mut self) {
        self.close();
    }
}

struct FunctionGuard(DATA_CONTAINER_HANDLE);

impl Drop for FunctionGuard {
    fn drop(&mut self) {
        let mut err = RFC_ERROR_INFO::new();
        unsafe {
            RfcDestroyFunction(self.0, &mut err);
        }
    }
}

/* ---- Metadata ---- */

unsafe fn read_parameters(
    desc: RFC_FUNCTION_DESC_HANDLE,
) -> Result<Vec<ParameterDescription>, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let mut count: c_uint = 0;
    check(unsafe { RfcGetParameterCount(desc, &mut count, &mut err) }, &err)?;

    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let mut p: RFC_PARAMETER_DESC = unsafe { std::mem::zeroed() };
        check(unsafe { RfcGetParameterDescByIndex(desc, i, &mut p, &mut err) }, &err)?;
        let type_description = if p.typeDescHandle.is_null() {
            None
        } else {
            Some(unsafe { read_type(p.typeDescHandle)? })
        };
        out.push(ParameterDescription {
            name: from_sap_uc(&p.name),
            parameter_type: RfcType::from_code(p.type_),
            direction: direction_from(p.direction),
            nuc_length: p.nucLength,
            uc_length: p.ucLength,
            decimals: p.decimals,
            default_value: from_sap_uc(&p.defaultValue),
            optional: p.optional != 0,
            type_description,
            parameter_text: from_sap_uc(&p.parameterText),
        });
    }
    Ok(out)
}

unsafe fn type_name(t: RFC_TYPE_DESC_HANDLE) -> Result<String, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let mut buf = [0 as SAP_UC; ABAP_NAME_LEN];
    check(unsafe { RfcGetTypeName(t, buf.as_mut_ptr(), &mut err) }, &err)?;
    Ok(from_sap_uc(&buf))
}

unsafe fn read_type(t: RFC_TYPE_DESC_HANDLE) -> Result<TypeDescription, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let (mut nuc, mut uc): (c_uint, c_uint) = (0, 0);
    check(unsafe { RfcGetTypeLength(t, &mut nuc, &mut uc, &mut err) }, &err)?;

    let mut fields = Vec::new();
    for f in unsafe { field_descs(t)? } {
        let nested = if f.typeDescHandle.is_null() {
            None
        } else {
            Some(unsafe { type_name(f.typeDescHandle)? })
        };
        fields.push(FieldDescription {
            name: from_sap_uc(&f.name),
            field_type: RfcType::from_code(f.type_),
            nuc_length: f.nucLength,
            nuc_offset: f.nucOffset,
            uc_length: f.ucLength,
            uc_offset: f.ucOffset,
            decimals: f.decimals,
            type_description: nested,
        });
    }
    Ok(TypeDescription {
        name: unsafe { type_name(t)? },
        nuc_length: nuc,
        uc_length: uc,
        fields,
    })
}

unsafe fn field_descs(t: RFC_TYPE_DESC_HANDLE) -> Result<Vec<RFC_FIELD_DESC>, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let mut count: c_uint = 0;
    check(unsafe { RfcGetFieldCount(t, &mut count, &mut err) }, &err)?;
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let mut f: RFC_FIELD_DESC = unsafe { std::mem::zeroed() };
        check(unsafe { RfcGetFieldDescByIndex(t, i, &mut f, &mut err) }, &err)?;
        out.push(f);
    }
    Ok(out)
}

unsafe fn describe_container(c: DATA_CONTAINER_HANDLE) -> Result<RFC_TYPE_DESC_HANDLE, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let t = unsafe { RfcDescribeType(c, &mut err) };
    if t.is_null() {
        return Err(err.to_error());
    }
    Ok(t)
}

/* ---- Import Marshaling ---- */

unsafe fn fill_value(
    c: DATA_CONTAINER_HANDLE,
    name: &str,
    ty: RfcType,
    value: &Value,
) -> Result<(), RfcError> {
    let uc_name = to_sap_uc(name);
    let mut err = RFC_ERROR_INFO::new();
    match (ty, value) {
        (_, Value::Null) => Ok(()),
        (RfcType::Structure, Value::Object(fields)) => {
            let mut s: DATA_CONTAINER_HANDLE = ptr::null_mut();
            check(unsafe { RfcGetStructure(c, uc_name.as_ptr(), &mut s, &mut err) }, &err)?;
            unsafe { fill_container(s, fields) }
        }
        (RfcType::Structure, _) => Err(marshal(name, "expected an object")),
        (RfcType::Table, Value::Array(rows)) => {
            let mut t: DATA_CONTAINER_HANDLE = ptr::null_mut();
            check(unsafe { RfcGetTable(c, uc_name.as_ptr(), &mut t, &mut err) }, &err)?;
            for row in rows {
                let Value::Object(fields) = row else {
                    return Err(marshal(name, "table rows must be objects"));
                };
                let r = unsafe { RfcAppendNewRow(t, &mut err) };
                if r.is_null() {
                    return Err(err.to_error());
                }
                unsafe { fill_container(r, fields)? };
            }
            Ok(())
        }
        (RfcType::Table, _) => Err(marshal(name, "expected an array of rows")),
        (_, Value::Object(_) | Value::Array(_)) => Err(marshal(name, "expected a scalar value")),
        (_, scalar) => {
            let text = match scalar {
                Value::String(s) => s.clone(),
                // ABAP flag convention
                Value::Bool(b) => if *b { "X".into() } else { String::new() },
                other => other.to_string(),
            };
            let uc_value: Vec<SAP_UC> = text.encode_utf16().collect();
            let rc = unsafe {
                RfcSetString(
                    c,
                    uc_name.as_ptr(),
                    uc_value.as_ptr(),
                    uc_value.len() as c_uint,
                    &mut err,
                )
            };
            check(rc, &err).map_err(|e| marshal(name, e.to_string()))
        }
    }
}

unsafe fn fill_container(
    c: DATA_CONTAINER_HANDLE,
    fields: &Map<String, Value>,
) -> Result<(), RfcError> {
    let t = unsafe { describe_container(c)? };
    for (name, value) in fields {
        let uc_name = to_sap_uc(name);
        let mut err = RFC_ERROR_INFO::new();
        let mut f: RFC_FIELD_DESC = unsafe { std::mem::zeroed() };
        if unsafe { RfcGetFieldDescByName(t, uc_name.as_ptr(), &mut f, &mut err) } != RFC_OK {
            return Err(marshal(name, "unknown field"));
        }
        unsafe { fill_value(c, name, RfcType::from_code(f.type_), value)? };
    }
    Ok(())
}

/* ---- Export Unmarshaling ---- */

unsafe fn read_value(
    c: DATA_CONTAINER_HANDLE,
    name: &[SAP_UC],
    ty: RfcType,
) -> Result<Value, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    match ty {
        RfcType::Structure => {
            let mut s: DATA_CONTAINER_HANDLE = ptr::null_mut();
            check(unsafe { RfcGetStructure(c, name.as_ptr(), &mut s, &mut err) }, &err)?;
            Ok(Value::Object(unsafe { read_container(s)? }))
        }
        RfcType::Table => {
            let mut t: DATA_CONTAINER_HANDLE = ptr::null_mut();
            check(unsafe { RfcGetTable(c, name.as_ptr(), &mut t, &mut err) }, &err)?;
            Ok(Value::Array(unsafe { read_table(t)? }))
        }
        RfcType::Int | RfcType::Int1 | RfcType::Int2 => {
            let mut v: i32 = 0;
            check(unsafe { RfcGetInt(c, name.as_ptr(), &mut v, &mut err) }, &err)?;
            Ok(Value::from(v))
        }
        RfcType::Int8 => {
            let mut v: i64 = 0;
            check(unsafe { RfcGetInt8(c, name.as_ptr(), &mut v, &mut err) }, &err)?;
            Ok(Value::from(v))
        }
        RfcType::Float => {
            let mut v: f64 = 0.0;
            check(unsafe { RfcGetFloat(c, name.as_ptr(), &mut v, &mut err) }, &err)?;
            Ok(Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null))
        }
        other => {
            let text = unsafe { read_string(c, name)? };
            if other.is_padded_text() {
                Ok(Value::String(text.trim_end().to_string()))
            } else {
                Ok(Value::String(text))
            }
        }
    }
}

unsafe fn read_string(c: DATA_CONTAINER_HANDLE, name: &[SAP_UC]) -> Result<String, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let mut len: c_uint = 0;
    check(unsafe { RfcGetStringLength(c, name.as_ptr(), &mut len, &mut err) }, &err)?;
    let mut buf: Vec<SAP_UC> = vec![0; len as usize + 1];
    let mut written: c_uint = 0;
    let rc = unsafe {
        RfcGetString(
            c,
            name.as_ptr(),
            buf.as_mut_ptr(),
            buf.len() as c_uint,
            &mut written,
            &mut err,
        )
    };
    check(rc, &err)?;
    buf.truncate(written as usize);
    Ok(String::from_utf16_lossy(&buf))
}

unsafe fn read_container(c: DATA_CONTAINER_HANDLE) -> Result<Map<String, Value>, RfcError> {
    let t = unsafe { describe_container(c)? };
    let mut out = Map::new();
    for f in unsafe { field_descs(t)? } {
        let value = unsafe { read_value(c, &f.name, RfcType::from_code(f.type_))? };
        out.insert(from_sap_uc(&f.name), value);
    }
    Ok(out)
}

unsafe fn read_table(t: DATA_CONTAINER_HANDLE) -> Result<Vec<Value>, RfcError> {
    let mut err = RFC_ERROR_INFO::new();
    let mut rows: c_uint = 0;
    check(unsafe { RfcGetRowCount(t, &mut rows, &mut err) }, &err)?;
    let mut out = Vec::with_capacity(rows as usize);
    for i in 0..rows {
        check(unsafe { RfcMoveTo(t, i, &mut err) }, &err)?;
        let row = unsafe { RfcGetCurrentRow(t, &mut err) };
        if row.is_null() {
            return Err(err.to_error());
        }
        out.push(Value::Object(unsafe { read_container(row)? }));
    }
    Ok(out)
}
