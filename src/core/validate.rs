use crate::core::forge::{is_tgs_principal, principal_eq, KdcRequest};
use crate::error::{Error, Result};
use chrono::Utc;
use kerberos_asn1::{AsRep, EncKdcRepPart};
use kerberos_constants::{kdc_options, principal_names};

/// Check the decrypted AS-REP against the request it answers. Any
/// mismatch is treated as a modified reply. Returns the clock offset to
/// adopt when `sync_kdc_time` is set.
///
/// The only mutation is filling a missing starttime from authtime,
/// which happens before any comparison that reads it.
pub fn verify_as_reply(
    request: &KdcRequest,
    request_time: i32,
    as_rep: &AsRep,
    enc_part2: &mut EncKdcRepPart,
    clockskew: i32,
    sync_kdc_time: bool,
) -> Result<Option<i64>> {
    if enc_part2.starttime.is_none() {
        enc_part2.starttime = Some(enc_part2.authtime.clone());
    }

    // the KDC may only rename client or server when the caller consented
    // to canonicalization and a TGT was both requested and issued
    let canon_req = (request.kdc_options & kdc_options::CANONICALIZE) != 0
        || request.client.name_type == principal_names::NT_ENTERPRISE;
    let canon_ok = canon_req
        && is_tgs_principal(&request.server)
        && is_tgs_principal(&enc_part2.sname);

    if !canon_ok {
        let client_ok = principal_eq(
            &as_rep.cname,
            &as_rep.crealm,
            &request.client,
            &request.realm,
        );
        let server_ok = principal_eq(
            &enc_part2.sname,
            &enc_part2.srealm,
            &request.server,
            &request.realm,
        );
        if !client_ok || !server_ok {
            return Err(Error::KdcRepModified);
        }
    }

    if !principal_eq(
        &enc_part2.sname,
        &enc_part2.srealm,
        &as_rep.ticket.sname,
        &as_rep.ticket.realm,
    ) {
        return Err(Error::KdcRepModified);
    }

    if request.nonce != enc_part2.nonce {
        return Err(Error::KdcRepModified);
    }

    let starttime = match &enc_part2.starttime {
        Some(time) => time.timestamp(),
        None => enc_part2.authtime.timestamp(),
    };

    if (request.kdc_options & kdc_options::POSTDATED) != 0
        && request.from != 0
        && i64::from(request.from) != starttime
    {
        return Err(Error::KdcRepModified);
    }

    if request.till != 0
        && enc_part2.endtime.timestamp() > i64::from(request.till)
    {
        return Err(Error::KdcRepModified);
    }

    let renew_till = enc_part2
        .renew_till
        .as_ref()
        .map(|time| time.timestamp())
        .unwrap_or(0);

    if (request.kdc_options & kdc_options::RENEWABLE) != 0
        && request.rtime != 0
        && renew_till > i64::from(request.rtime)
    {
        return Err(Error::KdcRepModified);
    }

    if (request.kdc_options & kdc_options::RENEWABLE_OK) != 0
        && (request.kdc_options & kdc_options::RENEWABLE) == 0
        && (enc_part2.flags.flags & kdc_options::RENEWABLE) != 0
        && request.till != 0
        && renew_till > i64::from(request.till)
    {
        return Err(Error::KdcRepModified);
    }

    if sync_kdc_time {
        let offset = enc_part2.authtime.timestamp() - Utc::now().timestamp();
        return Ok(Some(offset));
    }

    if request.from == 0
        && (starttime - i64::from(request_time)).abs() > i64::from(clockskew)
    {
        return Err(Error::KdcRepSkew);
    }

    return Ok(None);
}
