//! Entry Point message model.
//!
//! A [`Message`] is a fixed [`Header`] plus a [`Body`] whose variant selects
//! the message type. Values of name/value pairs borrow from the message's
//! [`MemoryPool`], which in turn borrows the caller's buffer.
use std::{fmt, net::Ipv4Addr};

use super::{FrontApiError, MemoryPool};

/// Maximum number of names in a GetParamValue request.
pub const MAX_GET_PARAMS: usize = 32;
/// Maximum number of pairs in a SetParamValue request, its fault list and
/// an AddObject request.
pub const MAX_SET_PARAMS: usize = 32;
pub const MAX_ADDOBJ_PARAMS: usize = MAX_SET_PARAMS;
pub const MAX_DELOBJ_PARAMS: usize = 16;
pub const MAX_RESPONSE_VALUES: usize = 96;
pub const MAX_GPN_RESPONSE_VALUES: usize = 128;

/// Size of a parameter name field, terminator included.
pub const NVP_MAX_NAME_LEN: usize = 256;
/// Size of path, object and backend name fields, terminator included.
pub const MSG_MAX_STR_LEN: usize = 128;

/// Element and attribute names of the wire format.
pub mod tag {
    pub const ROOT: &str = "EP_ApiMsg";

    pub const HEADER: &str = "hdr";
    pub const CALLER_ID: &str = "callerId";
    pub const TXN_ID: &str = "txaId";
    pub const RESP_FLAG: &str = "respFlag";
    pub const RESP_MODE: &str = "respMode";
    pub const RESP_ADDR: &str = "respIpAddr";
    pub const RESP_PORT: &str = "respPort";
    pub const RESP_CODE: &str = "resCode";
    pub const MORE_FLAG: &str = "moreFlag";
    pub const MSG_TYPE: &str = "msgType";
    pub const DB_TYPE: &str = "dbType";

    pub const BODY: &str = "body";
    pub const GET_PARAM_VALUE: &str = "GetParamValue";
    pub const GET_PARAM_VALUE_RESP: &str = "GetParamValueResponse";
    pub const SET_PARAM_VALUE: &str = "SetParamValue";
    pub const SET_PARAM_VALUE_RESP: &str = "SetParamValueResponse";
    pub const GET_PARAM_NAMES: &str = "GetParamNames";
    pub const GET_PARAM_NAMES_RESP: &str = "GetParamNamesResponse";
    pub const ADD_OBJECT: &str = "AddObject";
    pub const ADD_OBJECT_RESP: &str = "AddObjectResponse";
    pub const DEL_OBJECT: &str = "DelObject";
    pub const DEL_OBJECT_RESP: &str = "DelObjectResponse";
    pub const DISCOVER_CONFIG: &str = "DiscoverConfig";
    pub const DISCOVER_CONFIG_RESP: &str = "DiscoverConfigResponse";
    pub const INIT_ACTIONS: &str = "InitActions";
    pub const REBOOT: &str = "Reboot";
    pub const RESET: &str = "FactoryReset";

    pub const BACKEND_NAME: &str = "backendName";
    pub const PARAM_NAMES: &str = "paramNames";
    pub const PARAM_VALUES: &str = "paramValues";
    pub const PARAM_FAULTS: &str = "paramFaults";
    pub const PARAM_FAULT: &str = "paramFault";
    pub const NAME: &str = "name";
    pub const NAME_VALUE_PAIR: &str = "nameValuePair";
    pub const VALUE: &str = "value";
    pub const FAULT_CODE: &str = "faultcode";
    pub const PATH_NAME: &str = "pathName";
    pub const NEXT_LEVEL: &str = "nextLevel";
    pub const CONFIG_ONLY: &str = "configOnly";
    pub const OBJ_NAME: &str = "objName";
    pub const OBJECTS: &str = "objects";
    pub const STATUS: &str = "status";
    pub const PARAM_LIST: &str = "paramList";
    pub const PARAM_INFO: &str = "paramInfo";
    pub const WRITABLE: &str = "writable";
    pub const DELAY_SECONDS: &str = "delaySeconds";
    pub const RESET_TYPE: &str = "resetType";
    pub const INSTANCE_NUMBER: &str = "objInstanceNumber";
    pub const SET_TYPE: &str = "setType";

    pub const ARRAY_SIZE: &str = "arraySize";
}

/// Empty header and body; the encoder fills in the placeholders.
pub const MESSAGE_SKELETON: &str = "<EP_ApiMsg>\
    <hdr>\
        <callerId></callerId>\
        <txaId></txaId>\
        <respFlag></respFlag>\
        <respMode></respMode>\
        <respPort></respPort>\
        <respIpAddr></respIpAddr>\
        <resCode></resCode>\
        <moreFlag></moreFlag>\
        <msgType></msgType>\
        <dbType></dbType>\
    </hdr>\
    <body></body>\
</EP_ApiMsg>";

/// `TRUE`, `True`, `true` and `1` are true; anything else is false.
pub fn parse_bool(s: &str) -> bool {
    matches!(s, "TRUE" | "True" | "true" | "1")
}

pub fn bool_str(flag: bool) -> &'static str {
    if flag { "true" } else { "false" }
}

/// Copies at most `cap - 1` bytes of `s`, cutting on a char boundary.
pub(crate) fn bounded(s: &str, cap: usize) -> (String, bool) {
    let limit = cap.saturating_sub(1);
    if s.len() <= limit {
        return (s.to_string(), false);
    }

    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    GetParamValue,
    GetParamValueResponse,
    SetParamValue,
    SetParamValueResponse,
    GetParamNames,
    GetParamNamesResponse,
    AddObject,
    AddObjectResponse,
    DelObject,
    DelObjectResponse,
    DiscoverConfig,
    DiscoverConfigResponse,
    InitActions,
    Reboot,
    Reset,
}

impl MsgType {
    pub const ALL: [MsgType; 15] = [
        MsgType::GetParamValue,
        MsgType::GetParamValueResponse,
        MsgType::SetParamValue,
        MsgType::SetParamValueResponse,
        MsgType::GetParamNames,
        MsgType::GetParamNamesResponse,
        MsgType::AddObject,
        MsgType::AddObjectResponse,
        MsgType::DelObject,
        MsgType::DelObjectResponse,
        MsgType::DiscoverConfig,
        MsgType::DiscoverConfigResponse,
        MsgType::InitActions,
        MsgType::Reboot,
        MsgType::Reset,
    ];

    /// Tag used for this type in the `msgType` header field and as the body
    /// element name.
    pub fn as_str(self) -> &'static str {
        match self {
            MsgType::GetParamValue => tag::GET_PARAM_VALUE,
            MsgType::GetParamValueResponse => tag::GET_PARAM_VALUE_RESP,
            MsgType::SetParamValue => tag::SET_PARAM_VALUE,
            MsgType::SetParamValueResponse => tag::SET_PARAM_VALUE_RESP,
            MsgType::GetParamNames => tag::GET_PARAM_NAMES,
            MsgType::GetParamNamesResponse => tag::GET_PARAM_NAMES_RESP,
            MsgType::AddObject => tag::ADD_OBJECT,
            MsgType::AddObjectResponse => tag::ADD_OBJECT_RESP,
            MsgType::DelObject => tag::DEL_OBJECT,
            MsgType::DelObjectResponse => tag::DEL_OBJECT_RESP,
            MsgType::DiscoverConfig => tag::DISCOVER_CONFIG,
            MsgType::DiscoverConfigResponse => tag::DISCOVER_CONFIG_RESP,
            MsgType::InitActions => tag::INIT_ACTIONS,
            MsgType::Reboot => tag::REBOOT,
            MsgType::Reset => tag::RESET,
        }
    }

    pub fn from_tag(tag: &str) -> Option<MsgType> {
        MsgType::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration database targeted by a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DbType {
    #[default]
    Running,
    Startup,
    Candidate,
}

impl DbType {
    pub fn as_str(self) -> &'static str {
        match self {
            DbType::Running => "running",
            DbType::Startup => "startup",
            DbType::Candidate => "candidate",
        }
    }

    /// Unknown or empty tags select the running database.
    pub fn from_tag(tag: &str) -> DbType {
        match tag {
            "startup" => DbType::Startup,
            "candidate" => DbType::Candidate,
            _ => DbType::Running,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of front end issuing a request. Informative only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallerId(pub i32);

impl CallerId {
    pub const WEB: CallerId = CallerId(1);
    pub const CLI: CallerId = CallerId(2);
    pub const NETCONF: CallerId = CallerId(4);
    pub const TR069: CallerId = CallerId(8);
    pub const SNMP: CallerId = CallerId(16);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RespMode {
    /// Caller blocks for the reply.
    #[default]
    Sync,
    /// Reply is sent to the response address later.
    NoSync,
    /// No reply is wanted.
    NoResp,
    Other(i32),
}

impl From<i32> for RespMode {
    fn from(value: i32) -> Self {
        match value {
            0 => RespMode::Sync,
            1 => RespMode::NoSync,
            2 => RespMode::NoResp,
            n => RespMode::Other(n),
        }
    }
}

impl From<RespMode> for i32 {
    fn from(value: RespMode) -> Self {
        match value {
            RespMode::Sync => 0,
            RespMode::NoSync => 1,
            RespMode::NoResp => 2,
            RespMode::Other(n) => n,
        }
    }
}

/// Bit flags of a SetParamValue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetType(pub i32);

impl SetType {
    pub const FLAG_APPLY: i32 = 0x1;
    pub const FLAG_SAVE: i32 = 0x2;
    pub const FLAG_TEST: i32 = 0x4;

    pub const APPLY: SetType = SetType(Self::FLAG_APPLY);
    pub const APPLY_SAVE: SetType = SetType(Self::FLAG_APPLY | Self::FLAG_SAVE);
    pub const TEST: SetType = SetType(Self::FLAG_TEST);
    pub const TEST_APPLY: SetType = SetType(Self::FLAG_TEST | Self::FLAG_APPLY);
    pub const TEST_APPLY_SAVE: SetType =
        SetType(Self::FLAG_TEST | Self::FLAG_APPLY | Self::FLAG_SAVE);

    pub fn apply(self) -> bool {
        self.0 & Self::FLAG_APPLY != 0
    }

    pub fn save(self) -> bool {
        self.0 & Self::FLAG_SAVE != 0
    }

    pub fn test(self) -> bool {
        self.0 & Self::FLAG_TEST != 0
    }

    /// Whether this is one of the five combinations the Entry Point accepts.
    pub fn is_valid(self) -> bool {
        matches!(self.0, 1 | 3 | 4 | 5 | 7)
    }
}

impl Default for SetType {
    fn default() -> Self {
        SetType::APPLY
    }
}

pub mod reset_type {
    pub const FACTORY: u32 = 0;
    pub const KEEP_IP: u32 = 1;
    pub const GHN: u32 = 2;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub caller_id: CallerId,
    pub txn_id: i32,
    pub resp_flag: i32,
    pub resp_mode: RespMode,
    pub resp_addr: Ipv4Addr,
    pub resp_port: u16,
    /// 0 on success, otherwise a fault code.
    pub resp_code: i32,
    /// Set when more reply fragments follow this one.
    pub more: bool,
    pub db_type: DbType,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            caller_id: CallerId::default(),
            txn_id: 0,
            resp_flag: 0,
            resp_mode: RespMode::Sync,
            resp_addr: Ipv4Addr::UNSPECIFIED,
            resp_port: 0,
            resp_code: 0,
            more: false,
            db_type: DbType::Running,
        }
    }
}

impl Header {
    /// Header of a synchronous request answered on loopback.
    pub fn request(caller_id: CallerId, txn_id: i32, resp_port: u16) -> Self {
        Self {
            caller_id,
            txn_id,
            resp_addr: Ipv4Addr::LOCALHOST,
            resp_port,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameValue<'buf> {
    pub name: String,
    pub value: &'buf str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub writable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamFault {
    pub name: String,
    pub fault_code: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetParamValueReq {
    pub next_level: bool,
    pub config_only: bool,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetParamValueResp<'buf> {
    pub values: Vec<NameValue<'buf>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetParamValueReq<'buf> {
    pub set_type: SetType,
    pub values: Vec<NameValue<'buf>>,
}

/// Reply to a SetParamValue request.
///
/// The header response code selects the shape: `Status` when it is 0,
/// `Faults` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetParamValueResp {
    /// 0 = ok, 1 = failed.
    Status(i32),
    Faults(Vec<ParamFault>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetParamNamesReq {
    pub path: String,
    pub next_level: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetParamNamesResp {
    pub params: Vec<ParamInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddObjectReq<'buf> {
    pub object: String,
    pub values: Vec<NameValue<'buf>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddObjectResp {
    pub instance: i32,
    pub status: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelObjectReq {
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelObjectResp {
    pub status: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverConfigReq {
    pub backend: String,
    pub object: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebootReq {
    pub delay_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReq {
    pub reset_type: u32,
    pub delay_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body<'buf> {
    GetParamValue(GetParamValueReq),
    GetParamValueResponse(GetParamValueResp<'buf>),
    SetParamValue(SetParamValueReq<'buf>),
    SetParamValueResponse(SetParamValueResp),
    GetParamNames(GetParamNamesReq),
    GetParamNamesResponse(GetParamNamesResp),
    AddObject(AddObjectReq<'buf>),
    AddObjectResponse(AddObjectResp),
    DelObject(DelObjectReq),
    DelObjectResponse(DelObjectResp),
    DiscoverConfig(DiscoverConfigReq),
    DiscoverConfigResponse,
    InitActions,
    Reboot(RebootReq),
    Reset(ResetReq),
}

impl Default for Body<'_> {
    fn default() -> Self {
        Body::InitActions
    }
}

impl Body<'_> {
    pub fn msg_type(&self) -> MsgType {
        match self {
            Body::GetParamValue(_) => MsgType::GetParamValue,
            Body::GetParamValueResponse(_) => MsgType::GetParamValueResponse,
            Body::SetParamValue(_) => MsgType::SetParamValue,
            Body::SetParamValueResponse(_) => MsgType::SetParamValueResponse,
            Body::GetParamNames(_) => MsgType::GetParamNames,
            Body::GetParamNamesResponse(_) => MsgType::GetParamNamesResponse,
            Body::AddObject(_) => MsgType::AddObject,
            Body::AddObjectResponse(_) => MsgType::AddObjectResponse,
            Body::DelObject(_) => MsgType::DelObject,
            Body::DelObjectResponse(_) => MsgType::DelObjectResponse,
            Body::DiscoverConfig(_) => MsgType::DiscoverConfig,
            Body::DiscoverConfigResponse => MsgType::DiscoverConfigResponse,
            Body::InitActions => MsgType::InitActions,
            Body::Reboot(_) => MsgType::Reboot,
            Body::Reset(_) => MsgType::Reset,
        }
    }
}

impl fmt::Display for Body<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::GetParamValueResponse(resp) => {
                for pair in &resp.values {
                    writeln!(f, "{} = {}", pair.name, pair.value)?;
                }
                Ok(())
            }
            Body::SetParamValueResponse(SetParamValueResp::Status(status)) => {
                writeln!(f, "status: {status}")
            }
            Body::SetParamValueResponse(SetParamValueResp::Faults(faults)) => {
                for fault in faults {
                    writeln!(
                        f,
                        "{}: fault {} ({})",
                        fault.name,
                        fault.fault_code,
                        super::fault::describe(fault.fault_code)
                    )?;
                }
                Ok(())
            }
            Body::GetParamNamesResponse(resp) => {
                for param in &resp.params {
                    let access = if param.writable { "rw" } else { "ro" };
                    writeln!(f, "{access} {}", param.name)?;
                }
                Ok(())
            }
            Body::AddObjectResponse(resp) => {
                writeln!(f, "instance: {}, status: {}", resp.instance, resp.status)
            }
            Body::DelObjectResponse(resp) => writeln!(f, "status: {}", resp.status),
            other => writeln!(f, "{}", other.msg_type()),
        }
    }
}

/// A header, a body and the pool backing the body's values.
#[derive(Debug, Default)]
pub struct Message<'buf> {
    pub header: Header,
    pub body: Body<'buf>,
    pub pool: MemoryPool<'buf>,
}

impl<'buf> Message<'buf> {
    pub fn new(header: Header, body: Body<'buf>) -> Self {
        Self {
            header,
            body,
            pool: MemoryPool::default(),
        }
    }

    /// Creates an empty message whose values will be stored in `buffer`.
    pub fn with_pool(buffer: &'buf mut [u8]) -> Result<Self, FrontApiError> {
        let mut message = Self::default();
        message.pool.init(buffer)?;
        Ok(message)
    }

    pub fn msg_type(&self) -> MsgType {
        self.body.msg_type()
    }
}
