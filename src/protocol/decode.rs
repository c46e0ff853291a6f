//! Text to [`Message`] decoding.
//!
//! Decoding stops at the first problem and reports it as
//! [`FrontApiError::InvalidFormat`], except for a missing memory pool
//! (`BadInput`) and an exhausted one (`NotEnoughMemory`).
use std::net::Ipv4Addr;

use log::debug;
use roxmltree::{Document, Node};

use super::{
    FrontApiError, MemoryPool, fault,
    message::*,
    xml::{find_element, leading_int, opaque},
};

/// Decodes `text` into `message`, replacing its header and body.
///
/// Name/value pair values are stored in the message's pool, which must be
/// initialized for the message types that carry them.
pub fn decode_message<'buf>(
    text: &str,
    message: &mut Message<'buf>,
) -> Result<(), FrontApiError> {
    let doc = parse_document(text)?;
    let root = doc.root_element();

    let (header, type_tag) = read_header(root)?;
    let msg_type = MsgType::from_tag(&type_tag)
        .ok_or_else(|| FrontApiError::invalid(format!("unknown message type `{type_tag}`")))?;
    let resp_code = header.resp_code;
    message.header = header;

    let pool = &mut message.pool;
    message.body = match msg_type {
        MsgType::GetParamValue => Body::GetParamValue(get_value(root)?),
        MsgType::GetParamValueResponse => Body::GetParamValueResponse(get_value_resp(root, pool)?),
        MsgType::SetParamValue => Body::SetParamValue(set_value(root, pool)?),
        MsgType::SetParamValueResponse => {
            Body::SetParamValueResponse(set_value_resp(root, resp_code)?)
        }
        MsgType::GetParamNames => Body::GetParamNames(get_param_names(root)?),
        MsgType::GetParamNamesResponse => {
            Body::GetParamNamesResponse(get_param_names_resp(root)?)
        }
        MsgType::AddObject => Body::AddObject(add_object(root, pool)?),
        MsgType::AddObjectResponse => Body::AddObjectResponse(add_object_resp(root)?),
        MsgType::DelObject => Body::DelObject(del_object(root)?),
        MsgType::DelObjectResponse => Body::DelObjectResponse(del_object_resp(root)?),
        MsgType::DiscoverConfig => Body::DiscoverConfig(discover_config(root)?),
        MsgType::DiscoverConfigResponse => Body::DiscoverConfigResponse,
        MsgType::InitActions => Body::InitActions,
        MsgType::Reboot => Body::Reboot(reboot(root)?),
        MsgType::Reset => Body::Reset(reset(root)?),
    };

    Ok(())
}

/// Decodes only the header of `text`.
///
/// The message type tag must be present but its value is not checked.
pub fn decode_header(text: &str) -> Result<Header, FrontApiError> {
    let doc = parse_document(text)?;
    let (header, _) = read_header(doc.root_element())?;
    Ok(header)
}

fn parse_document(text: &str) -> Result<Document<'_>, FrontApiError> {
    let text = text.trim_end_matches('\0');
    let doc = Document::parse(text)
        .map_err(|e| FrontApiError::invalid(format!("incorrect format of the message: {e}")))?;

    let root = doc.root_element().tag_name().name();
    if root != tag::ROOT {
        return Err(FrontApiError::invalid(format!(
            "incorrect format of the message: root element `{root}`"
        )));
    }
    Ok(doc)
}

fn read_header(root: Node) -> Result<(Header, String), FrontApiError> {
    let caller_id = CallerId(to_i32(required_int(root, tag::CALLER_ID)?));
    let txn_id = to_i32(required_int(root, tag::TXN_ID)?);
    let resp_flag = to_i32(required_int(root, tag::RESP_FLAG)?);
    let resp_mode = RespMode::from(to_i32(required_int(root, tag::RESP_MODE)?));

    let resp_port = required_int(root, tag::RESP_PORT)?;
    let resp_port = u16::try_from(resp_port)
        .map_err(|_| FrontApiError::invalid(format!("response port {resp_port} out of range")))?;

    let addr = required_text(root, tag::RESP_ADDR)?;
    let resp_addr = addr
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| FrontApiError::invalid(format!("could not parse IP address `{addr}`")))?;

    let header = Header {
        caller_id,
        txn_id,
        resp_flag,
        resp_mode,
        resp_addr,
        resp_port,
        resp_code: optional_int(root, tag::RESP_CODE).map_or(0, to_i32),
        more: optional_int(root, tag::MORE_FLAG).is_some_and(|more| more != 0),
        db_type: find_element(root, tag::DB_TYPE)
            .map_or(DbType::Running, |n| DbType::from_tag(opaque(n))),
    };

    let msg_type = required_text(root, tag::MSG_TYPE)?.to_string();
    Ok((header, msg_type))
}

fn to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn required_node<'a, 'input>(
    scope: Node<'a, 'input>,
    name: &str,
) -> Result<Node<'a, 'input>, FrontApiError> {
    find_element(scope, name)
        .ok_or_else(|| FrontApiError::invalid(format!("could not find tag `{name}`")))
}

fn required_text<'a>(scope: Node<'a, '_>, name: &str) -> Result<&'a str, FrontApiError> {
    required_node(scope, name).map(opaque)
}

fn required_int(scope: Node, name: &str) -> Result<i64, FrontApiError> {
    required_text(scope, name).map(leading_int)
}

fn optional_int(scope: Node, name: &str) -> Option<i64> {
    find_element(scope, name).map(|n| leading_int(opaque(n)))
}

/// Optional unsigned field; absent or negative values become 0.
fn non_negative(scope: Node, name: &str) -> u32 {
    optional_int(scope, name)
        .map_or(0, |v| v.clamp(0, i64::from(u32::MAX)) as u32)
}

fn bounded_text(node: Node, cap: usize) -> String {
    bounded(opaque(node), cap).0
}

/// Validates the `arraySize` attribute of `container` against `[lower, max]`.
fn array_size(container: Node, lower: usize, max: usize) -> Result<usize, FrontApiError> {
    let name = container.tag_name().name();
    let raw = container.attribute(tag::ARRAY_SIZE).ok_or_else(|| {
        FrontApiError::invalid(format!("attribute `{}` of `{name}` is not set", tag::ARRAY_SIZE))
    })?;

    let size = leading_int(raw);
    if size < lower as i64 {
        return Err(FrontApiError::invalid(format!(
            "incorrect value of attribute {} - {size} (min value is {lower})",
            tag::ARRAY_SIZE
        )));
    }
    if size > max as i64 {
        return Err(FrontApiError::invalid(format!(
            "incorrect value of attribute {} - {size} (max value is {max})",
            tag::ARRAY_SIZE
        )));
    }
    Ok(size as usize)
}

/// Reads `arraySize` from the `container` element under `scope` and returns
/// that many `item` elements.
fn array_items<'a, 'input>(
    scope: Node<'a, 'input>,
    container: &str,
    item: &str,
    lower: usize,
    max: usize,
) -> Result<Vec<Node<'a, 'input>>, FrontApiError> {
    let container = required_node(scope, container)?;
    let size = array_size(container, lower, max)?;

    let items: Vec<_> = container
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == item)
        .take(size)
        .collect();

    if items.len() != size {
        return Err(FrontApiError::invalid(format!(
            "count mismatch: {} `{item}` elements, arraySize attribute is {size}",
            items.len()
        )));
    }
    Ok(items)
}

fn name_value_pairs<'buf>(
    scope: Node,
    pool: &mut MemoryPool<'buf>,
    lower: usize,
    max: usize,
) -> Result<Vec<NameValue<'buf>>, FrontApiError> {
    let items = array_items(scope, tag::PARAM_VALUES, tag::NAME_VALUE_PAIR, lower, max)?;

    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let name = find_element(item, tag::NAME)
            .ok_or_else(|| FrontApiError::invalid("incorrect syntax: pair name missing"))?;
        let value = find_element(item, tag::VALUE)
            .ok_or_else(|| FrontApiError::invalid("incorrect syntax: pair value missing"))?;

        let mut pair = NameValue {
            name: bounded_text(name, NVP_MAX_NAME_LEN),
            ..Default::default()
        };
        pool.insert_value(&mut pair, Some(opaque(value)))?;
        pairs.push(pair);
    }
    Ok(pairs)
}

fn get_value(root: Node) -> Result<GetParamValueReq, FrontApiError> {
    let body = required_node(root, tag::GET_PARAM_VALUE)?;

    let flag = |name| find_element(body, name).is_some_and(|n| parse_bool(opaque(n)));
    let next_level = flag(tag::NEXT_LEVEL);
    let config_only = flag(tag::CONFIG_ONLY);

    let names = array_items(body, tag::PARAM_NAMES, tag::NAME, 1, MAX_GET_PARAMS)?
        .into_iter()
        .map(|n| bounded_text(n, NVP_MAX_NAME_LEN))
        .collect();

    Ok(GetParamValueReq {
        next_level,
        config_only,
        names,
    })
}

fn get_value_resp<'buf>(
    root: Node,
    pool: &mut MemoryPool<'buf>,
) -> Result<GetParamValueResp<'buf>, FrontApiError> {
    pool.ensure_initialized("GetParamValueResponse")?;

    let body = required_node(root, tag::GET_PARAM_VALUE_RESP)?;
    let values = name_value_pairs(body, pool, 0, MAX_RESPONSE_VALUES)?;
    Ok(GetParamValueResp { values })
}

fn set_value<'buf>(
    root: Node,
    pool: &mut MemoryPool<'buf>,
) -> Result<SetParamValueReq<'buf>, FrontApiError> {
    pool.ensure_initialized("SetParamValue")?;

    let body = required_node(root, tag::SET_PARAM_VALUE)?;
    let set_type = SetType(to_i32(required_int(body, tag::SET_TYPE)?));
    let values = name_value_pairs(body, pool, 1, MAX_SET_PARAMS)?;
    Ok(SetParamValueReq { set_type, values })
}

fn set_value_resp(root: Node, resp_code: i32) -> Result<SetParamValueResp, FrontApiError> {
    let body = required_node(root, tag::SET_PARAM_VALUE_RESP)?;

    if resp_code == 0 {
        let status = required_text(body, tag::STATUS)?.trim();
        let status = match status {
            "0" => 0,
            "1" => 1,
            other => {
                debug!("incorrect value of status: {other} (expected 0 or 1)");
                1
            }
        };
        return Ok(SetParamValueResp::Status(status));
    }

    let items = array_items(body, tag::PARAM_FAULTS, tag::PARAM_FAULT, 1, MAX_SET_PARAMS)?;
    let mut faults = Vec::with_capacity(items.len());
    for item in items {
        let name = find_element(item, tag::NAME)
            .ok_or_else(|| FrontApiError::invalid("incorrect syntax: pair name missing"))?;
        let code = find_element(item, tag::FAULT_CODE)
            .ok_or_else(|| FrontApiError::invalid("incorrect syntax: pair faultcode missing"))?;

        let fault_code = to_i32(leading_int(opaque(code)));
        if !fault::is_set_fault(fault_code) {
            debug!(
                "value of faultcode: {fault_code} (expected to be between {} and {})",
                fault::SET_FAULT_FROM,
                fault::SET_FAULT_TO
            );
        }
        faults.push(ParamFault {
            name: bounded_text(name, NVP_MAX_NAME_LEN),
            fault_code,
        });
    }
    Ok(SetParamValueResp::Faults(faults))
}

fn get_param_names(root: Node) -> Result<GetParamNamesReq, FrontApiError> {
    let body = required_node(root, tag::GET_PARAM_NAMES)?;
    let path = bounded_text(required_node(body, tag::PATH_NAME)?, MSG_MAX_STR_LEN);
    let next_level = parse_bool(required_text(body, tag::NEXT_LEVEL)?);
    Ok(GetParamNamesReq { path, next_level })
}

fn get_param_names_resp(root: Node) -> Result<GetParamNamesResp, FrontApiError> {
    let body = required_node(root, tag::GET_PARAM_NAMES_RESP)?;
    let items = array_items(
        body,
        tag::PARAM_LIST,
        tag::PARAM_INFO,
        0,
        MAX_GPN_RESPONSE_VALUES,
    )?;

    let mut params = Vec::with_capacity(items.len());
    for item in items {
        let name = find_element(item, tag::NAME)
            .ok_or_else(|| FrontApiError::invalid("incorrect syntax: pair name missing"))?;
        let writable = find_element(item, tag::WRITABLE)
            .ok_or_else(|| FrontApiError::invalid("incorrect syntax: pair writable missing"))?;
        params.push(ParamInfo {
            name: bounded_text(name, NVP_MAX_NAME_LEN),
            writable: parse_bool(opaque(writable)),
        });
    }
    Ok(GetParamNamesResp { params })
}

fn add_object<'buf>(
    root: Node,
    pool: &mut MemoryPool<'buf>,
) -> Result<AddObjectReq<'buf>, FrontApiError> {
    pool.ensure_initialized("AddObject")?;

    let body = required_node(root, tag::ADD_OBJECT)?;
    let object = bounded_text(required_node(body, tag::OBJ_NAME)?, MSG_MAX_STR_LEN);
    let values = name_value_pairs(body, pool, 0, MAX_ADDOBJ_PARAMS)?;
    Ok(AddObjectReq { object, values })
}

fn add_object_resp(root: Node) -> Result<AddObjectResp, FrontApiError> {
    let body = required_node(root, tag::ADD_OBJECT_RESP)?;
    Ok(AddObjectResp {
        instance: to_i32(required_int(body, tag::INSTANCE_NUMBER)?),
        status: to_i32(required_int(body, tag::STATUS)?),
    })
}

fn del_object(root: Node) -> Result<DelObjectReq, FrontApiError> {
    let body = required_node(root, tag::DEL_OBJECT)?;
    let objects = array_items(body, tag::OBJECTS, tag::OBJ_NAME, 1, MAX_DELOBJ_PARAMS)?
        .into_iter()
        .map(|n| bounded_text(n, MSG_MAX_STR_LEN))
        .collect();
    Ok(DelObjectReq { objects })
}

fn del_object_resp(root: Node) -> Result<DelObjectResp, FrontApiError> {
    let body = required_node(root, tag::DEL_OBJECT_RESP)?;
    Ok(DelObjectResp {
        status: to_i32(required_int(body, tag::STATUS)?),
    })
}

fn discover_config(root: Node) -> Result<DiscoverConfigReq, FrontApiError> {
    let body = required_node(root, tag::DISCOVER_CONFIG)?;
    Ok(DiscoverConfigReq {
        backend: bounded_text(required_node(body, tag::BACKEND_NAME)?, MSG_MAX_STR_LEN),
        object: bounded_text(required_node(body, tag::OBJ_NAME)?, MSG_MAX_STR_LEN),
    })
}

fn reboot(root: Node) -> Result<RebootReq, FrontApiError> {
    let body = required_node(root, tag::REBOOT)?;
    Ok(RebootReq {
        delay_seconds: non_negative(body, tag::DELAY_SECONDS),
    })
}

fn reset(root: Node) -> Result<ResetReq, FrontApiError> {
    let body = required_node(root, tag::RESET)?;
    Ok(ResetReq {
        reset_type: non_negative(body, tag::RESET_TYPE),
        delay_seconds: non_negative(body, tag::DELAY_SECONDS),
    })
}
