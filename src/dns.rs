//! DNS message parsing and construction.

use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::error::{Error, Result};

/// The first question of a parsed DNS query.
///
/// Additional questions in the same packet are ignored.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    pub id: u16,
    /// Lowercased question name as sent, including the trailing root dot.
    pub domain: String,
    pub qtype: RecordType,
    question: Query,
    recursion_desired: bool,
}

impl DnsQuery {
    /// Parse a DNS query from raw bytes.
    ///
    /// Returns `Ok(None)` for a well-formed message with no question.
    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        let message = Message::from_vec(data).map_err(Error::Decode)?;
        let Some(question) = message.queries().first() else {
            return Ok(None);
        };

        Ok(Some(Self {
            id: message.id(),
            domain: cache_name(question.name()),
            qtype: question.query_type(),
            question: question.clone(),
            recursion_desired: message.recursion_desired(),
        }))
    }

    /// Build an authoritative response with a single A answer.
    pub fn authoritative_response(&self, addr: Ipv4Addr, ttl: u32) -> Result<Vec<u8>> {
        let mut record = Record::from_rdata(self.question.name().clone(), ttl, RData::A(A(addr)));
        record.set_dns_class(DNSClass::IN);

        let mut response = Message::new();
        response
            .set_id(self.id)
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_authoritative(true)
            .set_recursion_desired(self.recursion_desired)
            .add_query(self.question.clone())
            .add_answer(record);

        response.to_vec().map_err(Error::Encode)
    }

    /// Create a response from cached data, updating the transaction ID.
    ///
    /// Data too short to carry an ID is returned as is.
    pub fn response_from_cache(&self, cached: &[u8]) -> Vec<u8> {
        let mut response = cached.to_vec();
        if let Some(id) = response.get_mut(..2) {
            id.copy_from_slice(&self.id.to_be_bytes());
        }
        response
    }
}

/// Cache placement for an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAnswer {
    pub domain: String,
    pub qtype: RecordType,
    pub ttl: u32,
}

impl UpstreamAnswer {
    /// Read the question and the minimum answer TTL from an upstream response.
    ///
    /// Falls back to `default_ttl` when the response has no answers. Returns
    /// `None` if the response cannot be decoded or carries no question.
    pub fn parse(response: &[u8], default_ttl: u32) -> Option<Self> {
        let message = Message::from_vec(response).ok()?;
        let question = message.queries().first()?;

        let ttl = message
            .answers()
            .iter()
            .map(Record::ttl)
            .min()
            .unwrap_or(default_ttl);

        Some(Self {
            domain: cache_name(question.name()),
            qtype: question.query_type(),
            ttl,
        })
    }
}

/// Cache key form of a DNS name.
pub fn cache_name(name: &Name) -> String {
    name.to_ascii().to_ascii_lowercase()
}
