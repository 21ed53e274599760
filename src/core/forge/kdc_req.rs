use chrono::{TimeZone, Utc};
use kerberos_asn1::{
    AsReq, Asn1Object, HostAddress, KdcReq, KerberosTime, PaData,
    PrincipalName,
};

/// The negotiation state an AS-REQ is serialized from. Time fields hold
/// absolute epoch seconds; zero means unset.
#[derive(Clone, Debug)]
pub struct KdcRequest {
    pub client: PrincipalName,
    pub realm: String,
    pub server: PrincipalName,
    pub kdc_options: u32,
    pub from: i32,
    pub till: i32,
    pub rtime: i32,
    pub nonce: u32,
    pub etypes: Vec<i32>,
    pub addresses: Option<Vec<HostAddress>>,
    pub padata: Vec<PaData>,
}

/// Serialize the wire AS-REQ for the current round.
pub fn build_as_req(request: &KdcRequest) -> AsReq {
    return fill_kdc_req(request).into();
}

/// The canonical KDC-REQ-BODY bytes pre-auth mechanisms bind to.
pub fn build_req_body(request: &KdcRequest) -> Vec<u8> {
    return fill_kdc_req(request).req_body.build();
}

fn fill_kdc_req(request: &KdcRequest) -> KdcReq {
    let mut req = KdcReq::default();

    req.req_body.kdc_options = request.kdc_options.into();
    req.req_body.cname = Some(request.client.clone());
    req.req_body.realm = request.realm.clone();
    req.req_body.sname = Some(request.server.clone());
    if request.from != 0 {
        req.req_body.from = Some(kerberos_time(request.from));
    }
    req.req_body.till = kerberos_time(request.till);
    if request.rtime != 0 {
        req.req_body.rtime = Some(kerberos_time(request.rtime));
    }
    req.req_body.nonce = request.nonce;
    req.req_body.etypes = request.etypes.clone();

    if let Some(addresses) = &request.addresses {
        if !addresses.is_empty() {
            req.req_body.addresses = Some(addresses.clone());
        }
    }

    if !request.padata.is_empty() {
        req.padata = Some(request.padata.clone());
    }

    return req;
}

fn kerberos_time(epoch_seconds: i32) -> KerberosTime {
    return Utc
        .timestamp_opt(i64::from(epoch_seconds), 0)
        .unwrap()
        .into();
}
