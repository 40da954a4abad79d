use crate::shared::dns::{self, Question};
use crate::shared::net::*;
use crate::shared::log;
use crate::zone::manager::ZoneManager;
use crate::zone::query::QueryRequest;
use crate::zone::wire;

/// The nameserver handler able to serve dns requests via its [`DnsHandler`]
/// implementation, backed by a [`ZoneManager`]. Decodes the wire request,
/// asks the zone management core for an answer, and re-encodes the result.
pub struct NameserverHandler(pub ZoneManager);

impl DnsHandler for NameserverHandler {
    fn handle_request<R: DnsRead, W: DnsWrite>(&self, req: R, resp: W) {
        handle_dns_request(req, resp, &self.0);
    }
}

fn handle_dns_request<R: DnsRead, W: DnsWrite>(req: R, resp: W, manager: &ZoneManager) {
    let dns_request = match req.read() {
        DnsReadResult::FullMessage(req) => req,
        DnsReadResult::HeaderOnly(hdr, err) => {
            handle_decode_err(resp, hdr, err);
            return;
        }
        DnsReadResult::ParseErr(msg_err, hdr_err) => {
            log::warn!("Decoding request: {:?}, decoding header: {:?}", msg_err, hdr_err);
            return;
        }
        DnsReadResult::IoErr(err) => {
            log::warn!("IO error: {:?}", err);
            return;
        }
    };

    let question = match validate_dns_request(&dns_request) {
        Ok(question) => question,
        Err(err) => {
            log::warn!("[{}] Request malformed: {}.", dns_request.id(), err);
            handle_err(resp, &dns_request, dns::RespCode::FormErr);
            return;
        }
    };

    let Some(rtype) = wire::rtype_from_wire(question.record_type) else {
        log::warn!("[{}] Unsupported question type: {:?}.", dns_request.id(), question.record_type);
        handle_err(resp, &dns_request, dns::RespCode::NotImp);
        return;
    };

    log::info!(
        "[{}] Start handling request: node '{}', type {:?}.",
        dns_request.id(),
        question.node,
        question.record_type
    );

    let query_request = QueryRequest { name: question.node.clone(), rtype, dnssec_ok: false };
    let response = manager.query(&query_request);
    let message = wire::to_message(&dns_request, &response, false);
    reply(resp, message);
}

fn handle_decode_err<W: DnsWrite>(resp: W, req_header: dns::Header, msg_err: dns::MessageErr) {
    let parsing_err = msg_err.inner_err();
    let resp_code = match parsing_err {
        dns::ParsingErr::UnsupportedOpCode(_) => dns::RespCode::NotImp,
        dns::ParsingErr::UnsupportedClass(_) => dns::RespCode::NotImp,
        dns::ParsingErr::UnsupportedType(_) => dns::RespCode::NotImp,
        _ => dns::RespCode::FormErr,
    };
    let resp_header = resp_header_from_req_header(&req_header, resp_code);
    let dns_response =
        dns::Message { header: resp_header, questions: vec![], answers: vec![], authorities: vec![], additionals: vec![] };

    reply(resp, dns_response);
}

fn handle_err<W: DnsWrite>(resp: W, dns_req: &dns::Message, resp_code: dns::RespCode) {
    let mut resp_header = resp_header_from_req_header(&dns_req.header, resp_code);
    resp_header.answers_count = 0;
    resp_header.authorities_count = 0;
    resp_header.additionals_count = 0;
    let dns_resp = dns::Message {
        header: resp_header,
        questions: dns_req.questions.clone(),
        answers: vec![],
        authorities: vec![],
        additionals: vec![],
    };

    reply(resp, dns_resp);
}

fn reply<W: DnsWrite>(resp: W, dns_response: dns::Message) {
    let response_id = dns_response.id();
    let response_code = dns_response.header.resp_code;
    log::debug!("[{}] Complete response: {:?}", response_id, dns_response);
    match resp.reply(dns_response) {
        Ok(_) => log::info!("[{}] Request served [{:?}].", response_id, response_code),
        Err(err) => log::error!("[{}] Error replying: {}", response_id, err),
    };
}

fn resp_header_from_req_header(req_header: &dns::Header, resp_code: dns::RespCode) -> dns::Header {
    dns::Header { query_resp: true, auth_answer: false, recursion_available: false, z: 0, resp_code, ..req_header.clone() }
}

fn validate_dns_request(dns_req: &dns::Message) -> Result<&Question, String> {
    if !dns_req.header.is_request() {
        return Err("resp flag set in query".to_string());
    }
    if dns_req.header.answers_count != 0 {
        return Err(format!("invalid # of answers: {:?}", dns_req.header.answers_count));
    }
    if dns_req.header.authorities_count != 0 {
        return Err(format!("invalid # of authorities: {:?}", dns_req.header.authorities_count));
    }

    match dns_req.questions.as_slice() {
        [question] => Ok(question),
        _ => Err(format!("invalid # of questions: {:?}", dns_req.header.questions_count)),
    }
}
