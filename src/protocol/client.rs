//! Request/response round trips against the Entry Point.
use log::{debug, info};

use super::{
    CallerId, DbType, FrontApiError, Header, Message,
    decode::{decode_header, decode_message},
    transport::{Connection, ConnectionConfig, PACKET_BUF_SIZE, Packet},
};

/// A [`Connection`] plus the header defaults stamped on every request.
#[derive(Debug)]
pub struct Client {
    connection: Connection,
    caller_id: CallerId,
    db_type: DbType,
    next_txn_id: i32,
}

impl Client {
    pub fn connect(config: &ConnectionConfig, caller_id: CallerId) -> Result<Self, FrontApiError> {
        Ok(Self {
            connection: Connection::connect(config)?,
            caller_id,
            db_type: DbType::Running,
            next_txn_id: 1,
        })
    }

    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = db_type;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Fresh request header carrying the next transaction id and this
    /// connection's reply port.
    pub fn next_header(&mut self) -> Result<Header, FrontApiError> {
        let txn_id = self.next_txn_id;
        self.next_txn_id = self.next_txn_id.wrapping_add(1).max(1);

        let mut header = Header::request(self.caller_id, txn_id, self.connection.local_port()?);
        header.db_type = self.db_type;
        Ok(header)
    }

    /// Sends `message` and replaces it with the matching reply.
    ///
    /// The reply's values are stored in `message`'s pool. Returns the reply's
    /// more flag.
    pub fn make_request(&self, message: &mut Message<'_>) -> Result<bool, FrontApiError> {
        let packet = Packet::encode(message)?;
        debug!(
            "sending {} (transaction {})",
            message.msg_type(),
            message.header.txn_id
        );
        self.connection.send(&packet)?;
        self.next_reply(message)
    }

    /// Waits for another reply to `message`'s transaction and decodes it
    /// into `message`. Used to collect the fragments announced by the more
    /// flag.
    pub fn next_reply(&self, message: &mut Message<'_>) -> Result<bool, FrontApiError> {
        let txn_id = message.header.txn_id;
        let mut buf = [0_u8; PACKET_BUF_SIZE];
        let (len, _) = self
            .connection
            .receive_matching(txn_id, self.connection.timeout(), &mut buf)?;
        let text = std::str::from_utf8(&buf[..len])
            .map_err(|e| FrontApiError::invalid(format!("reply is not UTF-8: {e}")))?;

        decode_message(text, message)?;
        info!(
            "transaction {txn_id} answered with {} (code {})",
            message.msg_type(),
            message.header.resp_code
        );
        Ok(message.header.more)
    }

    /// Raw variant of [`Client::make_request`]: `xml` is sent as is and
    /// overwritten with the reply text.
    pub fn make_xml_request(&self, xml: &mut String) -> Result<bool, FrontApiError> {
        let header = decode_header(xml)?;
        let packet = Packet::from_text(xml)?;
        self.connection.send(&packet)?;

        let mut buf = [0_u8; PACKET_BUF_SIZE];
        let (len, reply) =
            self.connection
                .receive_matching(header.txn_id, self.connection.timeout(), &mut buf)?;

        xml.clear();
        xml.push_str(&String::from_utf8_lossy(&buf[..len]));
        Ok(reply.more)
    }

    pub fn close(&mut self) {
        self.connection.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{SocketAddr, UdpSocket},
        thread::{self, JoinHandle},
        time::Duration,
    };

    use super::*;
    use crate::protocol::{
        Body, DelObjectReq, DelObjectResp, GetParamValueReq, GetParamValueResp, TransportError,
        encode::encode_to_string, transport::FLAGS_LEN,
    };

    /// Loopback stand-in for the Entry Point. Answers one request with the
    /// datagrams produced by `answer`.
    fn entry_point<F>(answer: F) -> (SocketAddr, JoinHandle<String>)
    where
        F: FnOnce(&str) -> Vec<String> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut buf = [0_u8; PACKET_BUF_SIZE];
            let (n, from) = socket.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..FLAGS_LEN], &[0; FLAGS_LEN]);
            assert_eq!(buf[n - 1], 0, "request is not NUL-terminated");
            let request = String::from_utf8(buf[FLAGS_LEN..n - 1].to_vec()).unwrap();

            for reply in answer(&request) {
                socket.send_to(reply.as_bytes(), from).unwrap();
            }
            request
        });
        (addr, handle)
    }

    fn client(entry_point: SocketAddr, timeout: Duration) -> Client {
        let config = ConnectionConfig {
            own_port: 0,
            timeout,
            entry_point,
        };
        Client::connect(&config, CallerId::CLI).unwrap()
    }

    fn reply(header: Header, body: Body<'_>) -> String {
        encode_to_string(&Message::new(header, body)).unwrap()
    }

    #[test]
    fn get_param_value_round_trip() {
        let (addr, handle) = entry_point(|request| {
            let header = decode_header(request).unwrap();
            let mut buffer = [0_u8; 64];
            let mut message = Message::with_pool(&mut buffer).unwrap();
            let value = message.pool.pair("Device.WiFi.Enable", "true").unwrap();
            message.body = Body::GetParamValueResponse(GetParamValueResp {
                values: vec![value],
            });

            message.header = Header {
                txn_id: header.txn_id + 100,
                ..header.clone()
            };
            let stale = encode_to_string(&message).unwrap();
            message.header = header;
            vec![stale, encode_to_string(&message).unwrap()]
        });

        let mut client = client(addr, Duration::from_secs(2));
        let mut buffer = [0_u8; 256];
        let mut message = Message::with_pool(&mut buffer).unwrap();
        message.header = client.next_header().unwrap();
        message.body = Body::GetParamValue(GetParamValueReq {
            names: vec!["Device.WiFi.Enable".to_string()],
            ..Default::default()
        });

        let more = client.make_request(&mut message).unwrap();
        assert!(!more);
        assert_eq!(message.header.txn_id, 1);
        match &message.body {
            Body::GetParamValueResponse(resp) => {
                assert_eq!(resp.values.len(), 1);
                assert_eq!(resp.values[0].name, "Device.WiFi.Enable");
                assert_eq!(resp.values[0].value, "true");
            }
            other => panic!("unexpected reply {other:?}"),
        }

        let request = handle.join().unwrap();
        assert!(request.contains("<txaId>1</txaId>"));
        assert!(request.contains("<name>Device.WiFi.Enable</name>"));
    }

    #[test]
    fn more_flag_is_reported() {
        let (addr, handle) = entry_point(|request| {
            let mut header = decode_header(request).unwrap();
            header.more = true;
            let first = reply(header.clone(), Body::DelObjectResponse(DelObjectResp { status: 1 }));
            header.more = false;
            let last = reply(header, Body::DelObjectResponse(DelObjectResp { status: 0 }));
            vec![first, last]
        });

        let mut client = client(addr, Duration::from_secs(2));
        let mut buffer = [0_u8; 64];
        let mut message = Message::with_pool(&mut buffer).unwrap();
        message.header = client.next_header().unwrap();
        message.body = Body::DelObject(DelObjectReq {
            objects: vec!["Device.NAT.PortMapping.3.".to_string()],
        });

        assert!(client.make_request(&mut message).unwrap());
        assert_eq!(message.body, Body::DelObjectResponse(DelObjectResp { status: 1 }));

        assert!(!client.next_reply(&mut message).unwrap());
        assert_eq!(message.body, Body::DelObjectResponse(DelObjectResp { status: 0 }));
        handle.join().unwrap();
    }

    #[test]
    fn xml_request_returns_reply_text() {
        let (addr, handle) = entry_point(|request| {
            let header = decode_header(request).unwrap();
            vec![reply(header, Body::DiscoverConfigResponse)]
        });

        let mut client = client(addr, Duration::from_secs(2));
        let header = client.next_header().unwrap();
        let mut xml = reply(header, Body::InitActions);

        assert!(!client.make_xml_request(&mut xml).unwrap());
        assert!(xml.contains("<msgType>DiscoverConfigResponse</msgType>"));
        handle.join().unwrap();
    }

    #[test]
    fn xml_request_needs_a_header() {
        let client = client(crate::protocol::transport::ENTRY_POINT_ADDR, Duration::from_secs(1));
        let mut xml = "<EP_ApiMsg><body/></EP_ApiMsg>".to_string();
        let err = client.make_xml_request(&mut xml).unwrap_err();
        assert_eq!(err.code(), crate::protocol::code::INVALID_FORMAT);
    }

    #[test]
    fn silent_entry_point_times_out() {
        let (addr, handle) = entry_point(|_| Vec::new());

        let mut client = client(addr, Duration::from_millis(200));
        let mut message = Message::new(client.next_header().unwrap(), Body::InitActions);
        let err = client.make_request(&mut message).unwrap_err();

        assert!(matches!(
            err,
            FrontApiError::Transport(TransportError::Timeout { txn_id: 1, .. })
        ));
        assert_eq!(err.code(), crate::protocol::code::GENERAL_ERROR);
        handle.join().unwrap();
    }

    #[test]
    fn transaction_ids_advance() {
        let mut client = client(crate::protocol::transport::ENTRY_POINT_ADDR, Duration::from_secs(1));
        let first = client.next_header().unwrap();
        let second = client.next_header().unwrap();
        assert_eq!(second.txn_id, first.txn_id + 1);
        assert_eq!(first.caller_id, CallerId::CLI);
        assert_eq!(first.resp_port, client.connection().local_port().unwrap());

        client.close();
        assert!(client.next_header().is_err());
    }
}
