use crate::error::{Error, Result};
use kerberos_asn1::{AsRep, Asn1Object, KrbError};
use kerberos_constants::{error_codes, message_types};

const V4_KRB_PROT_VERSION: u8 = 4;
const V4_AUTH_MSG_ERR_REPLY: u8 = 5 << 1;

/// What a raw KDC response turned out to be.
#[derive(Debug)]
pub enum Classified {
    /// KRB-ERROR, to be handled by the negotiation loop.
    Error(KrbError),
    /// KRB_ERR_RESPONSE_TOO_BIG: resend the same request over TCP.
    TooBig,
    /// A well-formed AS-REP.
    AsRep(AsRep),
}

/// Decide what the KDC answered. Unparseable responses are inspected for
/// the Kerberos v4 error signature before being rejected.
pub fn classify_reply(raw: &[u8]) -> Result<Classified> {
    if let Ok((_, krb_error)) = KrbError::parse(raw) {
        if krb_error.error_code == error_codes::KRB_ERR_RESPONSE_TOO_BIG {
            return Ok(Classified::TooBig);
        }
        return Ok(Classified::Error(krb_error));
    }

    match AsRep::parse(raw) {
        Ok((_, as_rep)) => {
            if i32::from(as_rep.msg_type) != message_types::KRB_AS_REP {
                return Err(Error::MsgType);
            }
            return Ok(Classified::AsRep(as_rep));
        }
        Err(_) => {
            if raw.len() >= 2
                && raw[0] == V4_KRB_PROT_VERSION
                && (raw[1] & !1u8) == V4_AUTH_MSG_ERR_REPLY
            {
                return Err(Error::V4Reply);
            }
            return Err(Error::MsgType);
        }
    }
}
