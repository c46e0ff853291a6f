//! [`Message`] to text encoding.
//!
//! The encoder fills a parsed copy of [`MESSAGE_SKELETON`], appends the body
//! for the message type and serializes the tree into a caller buffer.
use log::debug;

use super::{
    FrontApiError,
    message::*,
    xml::Element,
};

/// Encodes `message` into `out` as NUL-terminated text.
///
/// Returns the text length, not counting the terminator.
pub fn encode_message(message: &Message<'_>, out: &mut [u8]) -> Result<usize, FrontApiError> {
    let tree = build_tree(message)?;
    tree.save_into(out).ok_or_else(|| {
        FrontApiError::invalid(format!(
            "could not save message to string ({} byte buffer)",
            out.len()
        ))
    })
}

/// Encodes `message` without a size bound.
pub fn encode_to_string(message: &Message<'_>) -> Result<String, FrontApiError> {
    Ok(build_tree(message)?.to_xml_string())
}

fn build_tree(message: &Message<'_>) -> Result<Element, FrontApiError> {
    let mut tree = Element::parse(MESSAGE_SKELETON)
        .map_err(|e| FrontApiError::invalid(format!("could not load message skeleton: {e}")))?;

    let header = &message.header;
    let hdr = placeholder(&mut tree, tag::HEADER)?;
    write_field(hdr, tag::CALLER_ID, header.caller_id.0)?;
    write_field(hdr, tag::TXN_ID, header.txn_id)?;
    write_field(hdr, tag::RESP_FLAG, header.resp_flag)?;
    write_field(hdr, tag::RESP_MODE, i32::from(header.resp_mode))?;
    write_field(hdr, tag::RESP_PORT, header.resp_port)?;
    write_field(hdr, tag::RESP_ADDR, header.resp_addr)?;
    write_field(hdr, tag::RESP_CODE, header.resp_code)?;
    write_field(hdr, tag::MORE_FLAG, u8::from(header.more))?;
    write_field(hdr, tag::MSG_TYPE, message.msg_type())?;
    write_field(hdr, tag::DB_TYPE, header.db_type)?;

    let body = placeholder(&mut tree, tag::BODY)?;
    if !matches!(message.body, Body::DiscoverConfigResponse | Body::InitActions) {
        write_body(body.add_child(message.msg_type().as_str()), message)?;
    }

    if let Some(c) = tree.find_unrepresentable() {
        return Err(FrontApiError::invalid(format!(
            "character {c:?} cannot be carried in a message"
        )));
    }
    Ok(tree)
}

fn write_body(node: &mut Element, message: &Message<'_>) -> Result<(), FrontApiError> {
    match &message.body {
        Body::GetParamValue(req) => get_value(node, req)?,
        Body::GetParamValueResponse(resp) => {
            message.pool.ensure_initialized("GetParamValueResponse")?;
            check_count(tag::PARAM_VALUES, resp.values.len(), 0, MAX_RESPONSE_VALUES)?;
            name_value_pairs(node, &resp.values);
        }
        Body::SetParamValue(req) => {
            message.pool.ensure_initialized("SetParamValue")?;
            check_count(tag::PARAM_VALUES, req.values.len(), 1, MAX_SET_PARAMS)?;
            node.add_text_child(tag::SET_TYPE, req.set_type.0);
            name_value_pairs(node, &req.values);
        }
        Body::SetParamValueResponse(resp) => {
            set_value_resp(node, message.header.resp_code, resp)?
        }
        Body::GetParamNames(req) => {
            node.add_text_child(tag::PATH_NAME, &req.path);
            node.add_text_child(tag::NEXT_LEVEL, bool_str(req.next_level));
        }
        Body::GetParamNamesResponse(resp) => {
            check_count(tag::PARAM_LIST, resp.params.len(), 0, MAX_GPN_RESPONSE_VALUES)?;
            let list = array(node, tag::PARAM_LIST, resp.params.len());
            for param in &resp.params {
                let info = list.add_child(tag::PARAM_INFO);
                info.add_text_child(tag::NAME, &param.name);
                info.add_text_child(tag::WRITABLE, bool_str(param.writable));
            }
        }
        Body::AddObject(req) => {
            message.pool.ensure_initialized("AddObject")?;
            check_count(tag::PARAM_VALUES, req.values.len(), 0, MAX_ADDOBJ_PARAMS)?;
            node.add_text_child(tag::OBJ_NAME, &req.object);
            name_value_pairs(node, &req.values);
        }
        Body::AddObjectResponse(resp) => {
            node.add_text_child(tag::INSTANCE_NUMBER, resp.instance);
            node.add_text_child(tag::STATUS, resp.status);
        }
        Body::DelObject(req) => {
            check_count(tag::OBJECTS, req.objects.len(), 1, MAX_DELOBJ_PARAMS)?;
            let objects = array(node, tag::OBJECTS, req.objects.len());
            for object in &req.objects {
                objects.add_text_child(tag::OBJ_NAME, object);
            }
        }
        Body::DelObjectResponse(resp) => {
            node.add_text_child(tag::STATUS, resp.status);
        }
        Body::DiscoverConfig(req) => {
            node.add_text_child(tag::BACKEND_NAME, &req.backend);
            node.add_text_child(tag::OBJ_NAME, &req.object);
        }
        Body::DiscoverConfigResponse | Body::InitActions => {}
        Body::Reboot(req) => {
            node.add_text_child(tag::DELAY_SECONDS, req.delay_seconds);
        }
        Body::Reset(req) => {
            node.add_text_child(tag::RESET_TYPE, req.reset_type);
            node.add_text_child(tag::DELAY_SECONDS, req.delay_seconds);
        }
    }
    Ok(())
}

fn placeholder<'t>(tree: &'t mut Element, name: &str) -> Result<&'t mut Element, FrontApiError> {
    tree.find_mut(name)
        .ok_or_else(|| FrontApiError::invalid(format!("could not find tag `{name}`")))
}

fn write_field(hdr: &mut Element, name: &str, value: impl ToString) -> Result<(), FrontApiError> {
    placeholder(hdr, name)?.set_text(value);
    Ok(())
}

fn check_count(container: &str, count: usize, lower: usize, max: usize) -> Result<(), FrontApiError> {
    if count < lower || count > max {
        return Err(FrontApiError::bad_input(format!(
            "`{container}` holds {count} entries (allowed range is {lower}..={max})"
        )));
    }
    Ok(())
}

/// Appends an array container carrying its `arraySize`.
fn array<'t>(parent: &'t mut Element, name: &str, size: usize) -> &'t mut Element {
    let container = parent.add_child(name);
    container.set_attribute(tag::ARRAY_SIZE, size);
    container
}

fn name_value_pairs(node: &mut Element, pairs: &[NameValue<'_>]) {
    let values = array(node, tag::PARAM_VALUES, pairs.len());
    for pair in pairs {
        let item = values.add_child(tag::NAME_VALUE_PAIR);
        item.add_text_child(tag::NAME, &pair.name);
        item.add_text_child(tag::VALUE, pair.value);
    }
}

fn get_value(node: &mut Element, req: &GetParamValueReq) -> Result<(), FrontApiError> {
    check_count(tag::PARAM_NAMES, req.names.len(), 1, MAX_GET_PARAMS)?;

    node.add_text_child(tag::NEXT_LEVEL, bool_str(req.next_level));
    node.add_text_child(tag::CONFIG_ONLY, bool_str(req.config_only));
    let names = array(node, tag::PARAM_NAMES, req.names.len());
    for name in &req.names {
        names.add_text_child(tag::NAME, name);
    }
    Ok(())
}

/// A zero response code carries the plain status; otherwise the fault list.
fn set_value_resp(
    node: &mut Element,
    resp_code: i32,
    resp: &SetParamValueResp,
) -> Result<(), FrontApiError> {
    match (resp_code, resp) {
        (0, SetParamValueResp::Status(status)) => {
            node.add_text_child(tag::STATUS, status);
        }
        (0, SetParamValueResp::Faults(_)) => {
            return Err(FrontApiError::bad_input(
                "parameter faults require a non-zero response code",
            ));
        }
        (_, SetParamValueResp::Status(_)) => {}
        (_, SetParamValueResp::Faults(faults)) => {
            check_count(tag::PARAM_FAULTS, faults.len(), 0, MAX_SET_PARAMS)?;
            if faults.is_empty() {
                return Ok(());
            }

            let list = array(node, tag::PARAM_FAULTS, faults.len());
            for (i, fault) in faults.iter().enumerate() {
                debug!("param fault #{i}: {} = {}", fault.name, fault.fault_code);
                let item = list.add_child(tag::PARAM_FAULT);
                item.add_text_child(tag::NAME, &fault.name);
                item.add_text_child(tag::FAULT_CODE, fault.fault_code);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::protocol::{MemoryPool, decode::decode_message};

    fn header(txn_id: i32) -> Header {
        Header {
            caller_id: CallerId::WEB,
            txn_id,
            resp_flag: 1,
            resp_mode: RespMode::NoSync,
            resp_addr: Ipv4Addr::new(10, 0, 0, 7),
            resp_port: 4321,
            resp_code: 0,
            more: true,
            db_type: DbType::Startup,
        }
    }

    fn round_trip<'buf>(message: &Message<'_>, buffer: &'buf mut [u8]) -> Message<'buf> {
        let text = encode_to_string(message).unwrap();
        let mut decoded = Message::with_pool(buffer).unwrap();
        decode_message(&text, &mut decoded).unwrap();
        decoded
    }

    #[test]
    fn header_fields_are_rendered() {
        let message = Message::new(header(9), Body::InitActions);
        let text = encode_to_string(&message).unwrap();

        assert!(text.starts_with("<EP_ApiMsg><hdr><callerId>1</callerId><txaId>9</txaId>"));
        assert!(text.contains("<respIpAddr>10.0.0.7</respIpAddr>"));
        assert!(text.contains("<moreFlag>1</moreFlag>"));
        assert!(text.contains("<msgType>InitActions</msgType>"));
        assert!(text.contains("<dbType>startup</dbType>"));
        assert!(text.ends_with("<body/></EP_ApiMsg>"));
    }

    #[test]
    fn encode_then_decode_preserves_message() {
        let mut src = [0_u8; 256];
        let mut pool = MemoryPool::default();
        pool.init(&mut src).unwrap();
        let pairs = vec![
            pool.pair("Device.WiFi.SSID", "home & <away>").unwrap(),
            pool.pair("Device.WiFi.Enable", "true").unwrap(),
        ];

        let bodies = vec![
            Body::GetParamValue(GetParamValueReq {
                next_level: true,
                config_only: false,
                names: vec!["Device.A.".into(), "Device.B".into()],
            }),
            Body::GetParamValueResponse(GetParamValueResp {
                values: pairs.clone(),
            }),
            Body::SetParamValue(SetParamValueReq {
                set_type: SetType::TEST_APPLY_SAVE,
                values: pairs.clone(),
            }),
            Body::SetParamValueResponse(SetParamValueResp::Status(0)),
            Body::GetParamNames(GetParamNamesReq {
                path: "Device.WiFi.".into(),
                next_level: true,
            }),
            Body::GetParamNamesResponse(GetParamNamesResp {
                params: vec![
                    ParamInfo {
                        name: "Device.WiFi.Enable".into(),
                        writable: true,
                    },
                    ParamInfo {
                        name: "Device.WiFi.Status".into(),
                        writable: false,
                    },
                ],
            }),
            Body::AddObject(AddObjectReq {
                object: "Device.WiFi.SSID.".into(),
                values: pairs.clone(),
            }),
            Body::AddObjectResponse(AddObjectResp {
                instance: 3,
                status: 0,
            }),
            Body::DelObject(DelObjectReq {
                objects: vec!["Device.WiFi.SSID.3.".into()],
            }),
            Body::DelObjectResponse(DelObjectResp { status: 1 }),
            Body::DiscoverConfig(DiscoverConfigReq {
                backend: "wifi_be".into(),
                object: "Device.WiFi.".into(),
            }),
            Body::DiscoverConfigResponse,
            Body::InitActions,
            Body::Reboot(RebootReq { delay_seconds: 30 }),
            Body::Reset(ResetReq {
                reset_type: reset_type::KEEP_IP,
                delay_seconds: 5,
            }),
        ];

        for (i, body) in bodies.into_iter().enumerate() {
            let mut message = Message::new(header(i as i32), body);
            let mut own = [0_u8; 64];
            message.pool.init(&mut own).unwrap();

            let mut dst = [0_u8; 256];
            let decoded = round_trip(&message, &mut dst);
            assert_eq!(decoded.header, message.header);
            assert_eq!(decoded.body, message.body);
        }
    }

    #[test]
    fn get_value_request_end_to_end() {
        let message = Message::new(
            header(1),
            Body::GetParamValue(GetParamValueReq {
                names: vec!["Device.WiFi.Enable".into()],
                ..Default::default()
            }),
        );
        let mut out = [0_u8; 2048];
        let len = encode_message(&message, &mut out).unwrap();
        let text = std::str::from_utf8(&out[..len]).unwrap();
        assert!(text.contains("<paramNames arraySize=\"1\">"));

        let mut decoded = Message::default();
        decode_message(text, &mut decoded).unwrap();
        let Body::GetParamValue(req) = decoded.body else {
            panic!("wrong body");
        };
        assert_eq!(req.names.len(), 1);
        assert_eq!(req.names[0], "Device.WiFi.Enable");
    }

    #[test]
    fn set_response_fault_path() {
        let mut message = Message::new(
            header(2),
            Body::SetParamValueResponse(SetParamValueResp::Faults(vec![ParamFault {
                name: "Device.WiFi.Enable".into(),
                fault_code: 9003,
            }])),
        );
        message.header.resp_code = 9003;

        let text = encode_to_string(&message).unwrap();
        assert!(!text.contains("<status>"));
        assert!(text.contains("<paramFaults arraySize=\"1\">"));
        assert!(text.contains("<faultcode>9003</faultcode>"));

        let mut decoded = Message::default();
        decode_message(&text, &mut decoded).unwrap();
        assert_eq!(decoded.body, message.body);
    }

    #[test]
    fn faults_need_nonzero_response_code() {
        let message = Message::new(
            header(2),
            Body::SetParamValueResponse(SetParamValueResp::Faults(vec![])),
        );
        let err = encode_to_string(&message).unwrap_err();
        assert!(matches!(err, FrontApiError::BadInput(_)));
    }

    #[test]
    fn empty_fault_list_emits_bare_element() {
        let mut message = Message::new(
            header(2),
            Body::SetParamValueResponse(SetParamValueResp::Faults(vec![])),
        );
        message.header.resp_code = 9002;
        let text = encode_to_string(&message).unwrap();
        assert!(text.contains("<body><SetParamValueResponse/></body>"));
    }

    #[test]
    fn pool_required_for_value_bodies() {
        let message = Message::new(header(3), Body::SetParamValue(SetParamValueReq::default()));
        let err = encode_to_string(&message).unwrap_err();
        assert!(matches!(err, FrontApiError::BadInput(_)));
    }

    #[test]
    fn oversized_arrays_are_rejected() {
        let message = Message::new(
            header(4),
            Body::DelObject(DelObjectReq {
                objects: vec!["Device.X.1.".into(); MAX_DELOBJ_PARAMS + 1],
            }),
        );
        assert!(encode_to_string(&message).is_err());
    }

    #[test]
    fn small_output_buffer_fails() {
        let message = Message::new(header(5), Body::InitActions);
        let mut out = [0_u8; 64];
        let err = encode_message(&message, &mut out).unwrap_err();
        assert!(err.to_string().contains("could not save message"));
    }

    #[test]
    fn line_endings_in_values_round_trip() {
        let mut src = [0_u8; 64];
        let mut message = Message::with_pool(&mut src).unwrap();
        message.header = header(3);
        let value = message.pool.pair("Device.UserInterface.Banner", "line1\r\nline2\r").unwrap();
        message.body = Body::SetParamValue(SetParamValueReq {
            set_type: SetType::APPLY,
            values: vec![value],
        });

        let mut dst = [0_u8; 128];
        let decoded = round_trip(&message, &mut dst);
        let Body::SetParamValue(req) = &decoded.body else {
            panic!("wrong body: {:?}", decoded.body);
        };
        assert_eq!(req.values[0].value, "line1\r\nline2\r");
    }

    #[test]
    fn control_characters_are_rejected() {
        let mut src = [0_u8; 64];
        let mut message = Message::with_pool(&mut src).unwrap();
        message.header = header(4);
        let value = message.pool.pair("Device.A", "a\u{1}b").unwrap();
        message.body = Body::SetParamValue(SetParamValueReq {
            set_type: SetType::APPLY,
            values: vec![value],
        });

        let err = encode_to_string(&message).unwrap_err();
        assert!(matches!(err, FrontApiError::InvalidFormat(_)), "{err}");

        let mut out = [0_u8; 2048];
        let err = encode_message(&message, &mut out).unwrap_err();
        assert_eq!(err.code(), crate::protocol::code::INVALID_FORMAT);

        message.body = Body::GetParamNames(GetParamNamesReq {
            path: "Device.\u{0}".into(),
            next_level: false,
        });
        assert!(encode_to_string(&message).is_err());
    }
}
