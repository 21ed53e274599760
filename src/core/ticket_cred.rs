//! Structs to handle tickets together with their associated KrbCredInfo

use kerberos_asn1::{
    Asn1Object, EncKdcRepPart, EncKrbCredPart, EncryptedData, KrbCred,
    KrbCredInfo, PrincipalName, Ticket,
};
use kerberos_constants::etypes::NO_ENCRYPTION;

/// A ticket and the client-side info needed to use it, such as the
/// session key.
#[derive(Debug, Clone)]
pub struct TicketCred {
    pub ticket: Ticket,
    pub cred_info: KrbCredInfo,
}

impl TicketCred {
    pub fn new(ticket: Ticket, cred_info: KrbCredInfo) -> Self {
        return Self { ticket, cred_info };
    }
}

impl From<(Ticket, KrbCredInfo)> for TicketCred {
    fn from((ticket, cred_info): (Ticket, KrbCredInfo)) -> Self {
        return Self::new(ticket, cred_info);
    }
}

/// The KrbCredInfo of an AS-REP enc-part, keyed to the (possibly
/// canonicalized) client the KDC answered for.
pub fn new_krb_cred_info(
    enc_as_rep_part: EncKdcRepPart,
    prealm: String,
    pname: PrincipalName,
) -> KrbCredInfo {
    return KrbCredInfo {
        key: enc_as_rep_part.key,
        prealm: Some(prealm),
        pname: Some(pname),
        flags: Some(enc_as_rep_part.flags),
        authtime: Some(enc_as_rep_part.authtime),
        starttime: enc_as_rep_part.starttime,
        endtime: Some(enc_as_rep_part.endtime),
        renew_till: enc_as_rep_part.renew_till,
        srealm: Some(enc_as_rep_part.srealm),
        sname: Some(enc_as_rep_part.sname),
        caddr: enc_as_rep_part.caddr,
    };
}

/// Wrap a single ticket in a plaintext KRB-CRED, the exchangeable form
/// the cache formats understand.
pub fn new_krb_cred(ticket_cred: TicketCred) -> KrbCred {
    let mut enc_krb_cred_part = EncKrbCredPart::default();
    enc_krb_cred_part.ticket_info.push(ticket_cred.cred_info);

    let mut krb_cred = KrbCred::default();
    krb_cred.tickets.push(ticket_cred.ticket);
    krb_cred.enc_part = EncryptedData {
        etype: NO_ENCRYPTION,
        kvno: None,
        cipher: enc_krb_cred_part.build(),
    };

    return krb_cred;
}
