//! Move a validated AS-REP into a credentials record and, when a vault
//! is attached, into the credential cache.

use crate::core::keyblock::Keyblock;
use crate::core::ticket_cred::{new_krb_cred_info, TicketCred};
use crate::core::vault::Vault;
use crate::error::Result;
use kerberos_asn1::{
    AsRep, Asn1Object, EncKdcRepPart, HostAddresses, KerberosTime,
    PrincipalName,
};

/// The lifetime of an issued ticket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketTimes {
    pub authtime: Option<KerberosTime>,
    pub starttime: Option<KerberosTime>,
    pub endtime: Option<KerberosTime>,
    pub renew_till: Option<KerberosTime>,
}

/// The credentials an AS exchange produces. `client`/`server` may be
/// pre-set by the caller; otherwise they are filled from the reply.
#[derive(Debug, Default)]
pub struct Credentials {
    pub client: Option<(String, PrincipalName)>,
    pub server: Option<(String, PrincipalName)>,
    pub keyblock: Keyblock,
    pub times: TicketTimes,
    pub is_skey: bool,
    pub ticket_flags: u32,
    pub addresses: Option<HostAddresses>,
    pub ticket: Vec<u8>,
    pub second_ticket: Vec<u8>,
}

/// Copy the reply into `creds` and, if given, write it to the vault.
/// Every fallible step runs before `creds` is touched, so on error the
/// record keeps its previous state.
pub fn stash_as_reply(
    as_rep: &AsRep,
    enc_part2: &EncKdcRepPart,
    creds: &mut Credentials,
    vault: Option<&dyn Vault>,
) -> Result<()> {
    let ticket_packet = as_rep.ticket.build();
    let keyblock = Keyblock::new(
        enc_part2.key.keytype,
        enc_part2.key.keyvalue.clone(),
    );

    if let Some(vault) = vault {
        let cred_info = new_krb_cred_info(
            enc_part2.clone(),
            as_rep.crealm.clone(),
            as_rep.cname.clone(),
        );
        vault.add(TicketCred::new(as_rep.ticket.clone(), cred_info))?;
    }

    creds.keyblock = keyblock;
    creds.times = TicketTimes {
        authtime: Some(enc_part2.authtime.clone()),
        starttime: enc_part2.starttime.clone(),
        endtime: Some(enc_part2.endtime.clone()),
        renew_till: enc_part2.renew_till.clone(),
    };
    // an AS-REQ reply cannot be encrypted in a session key
    creds.is_skey = false;
    creds.ticket_flags = enc_part2.flags.flags;
    creds.addresses = enc_part2.caddr.clone();
    creds.ticket = ticket_packet;
    creds.second_ticket.clear();

    if creds.client.is_none() {
        creds.client = Some((as_rep.crealm.clone(), as_rep.cname.clone()));
    }
    if creds.server.is_none() {
        creds.server =
            Some((enc_part2.srealm.clone(), enc_part2.sname.clone()));
    }

    return Ok(());
}
