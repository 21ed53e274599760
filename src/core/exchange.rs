//! The AS exchange driver: build AS-REQs, react to KDC errors
//! (pre-auth hints, realm referrals, transport upgrades) and turn the
//! final AS-REP into credentials. Network I/O stays with the caller,
//! which feeds every KDC reply back through [`InitCredsContext::step`].

use crate::communication::KdcTransport;
use crate::core::classify::{classify_reply, Classified};
use crate::core::decrypt::decrypt_as_reply;
use crate::core::fast::FastState;
use crate::core::forge::{
    build_in_tkt_name, is_local_tgt, principal2salt, rewrite_server_realm,
    unparse_name, KdcRequest, KrbUser,
};
use crate::core::keyblock::AsKeySource;
use crate::core::preauth::{
    make_preauth_list, prepare, process_reply_padata,
    sort_padata_by_preference, tryagain, PreauthState,
};
use crate::core::stash::{stash_as_reply, Credentials};
use crate::core::validate::verify_as_reply;
use crate::core::vault::Vault;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::utils::{addint32, local_host_addresses};
use chrono::Utc;
use kerberos_asn1::{
    AsRep, EncKdcRepPart, HostAddress, KrbError, PaData, PrincipalName,
};
use kerberos_constants::{error_codes, kdc_options, principal_names};
use kerberos_crypto::supported_etypes;
use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::RngCore;

pub const MAX_IN_TKT_LOOPS: u32 = 16;
pub const MAX_REFERRAL_HOPS: u32 = 10;

const DEFAULT_TICKET_LIFETIME: i32 = 24 * 60 * 60;
const DEFAULT_CLOCKSKEW: i32 = 300;

/// Caller options for one exchange. Unset fields fall back to the
/// profile, then to hard-coded defaults.
#[derive(Debug, Clone, Default)]
pub struct InitCredsOpts {
    pub forwardable: Option<bool>,
    pub proxiable: Option<bool>,
    pub canonicalize: Option<bool>,
    pub tkt_life: Option<i32>,
    pub renew_life: Option<i32>,
    pub etypes: Option<Vec<i32>>,
    pub addresses: Option<Vec<HostAddress>>,
    pub preauth_list: Option<Vec<i32>>,
    pub salt: Option<Vec<u8>>,
}

/// What the caller must do after a step.
#[derive(Debug)]
pub enum StepAction {
    /// Send `request` to a KDC of `realm` and step again with the reply.
    /// `tcp_only` asks for the resend of an oversized UDP answer.
    SendRequest {
        request: Vec<u8>,
        realm: String,
        tcp_only: bool,
    },
    /// Credentials are ready.
    Complete,
}

enum ReplyOutcome {
    Continue,
    Complete,
    ResendTcp,
}

/// State of one initial-credentials exchange. Owned by a single caller;
/// stepping it from several threads is not supported.
pub struct InitCredsContext<'a> {
    profile: &'a Profile,
    key_source: &'a dyn AsKeySource,
    vault: Option<&'a dyn Vault>,

    request: KdcRequest,
    in_tkt_service: Option<String>,
    start_time: i32,
    tkt_life: i32,
    renew_life: i32,
    clockskew: i32,
    sync_kdc_time: bool,
    kdc_time_offset: Option<i64>,

    preauth: PreauthState,
    preauth_to_use: Vec<PaData>,
    fast_state: FastState,

    err_reply: Option<KrbError>,
    last_err: Option<KrbError>,
    reply: Option<AsRep>,
    enc_part2: Option<EncKdcRepPart>,
    encoded_request_body: Option<Vec<u8>>,
    encoded_previous_request: Option<Vec<u8>>,

    request_time: i32,
    loopcount: u32,
    referral_count: u32,

    cred: Credentials,
    complete: bool,
}

impl<'a> InitCredsContext<'a> {
    pub fn new(
        profile: &'a Profile,
        client: PrincipalName,
        realm: String,
        key_source: &'a dyn AsKeySource,
        start_time: i32,
        opts: InitCredsOpts,
    ) -> Result<InitCredsContext<'a>> {
        let mut options = kdc_options::RENEWABLE_OK;

        let forwardable = opts
            .forwardable
            .or_else(|| profile.get_boolean(&realm, "forwardable"))
            .unwrap_or(false);
        if forwardable {
            options |= kdc_options::FORWARDABLE;
        }

        let proxiable = opts
            .proxiable
            .or_else(|| profile.get_boolean(&realm, "proxiable"))
            .unwrap_or(false);
        if proxiable {
            options |= kdc_options::PROXIABLE;
        }

        let canonicalize = opts
            .canonicalize
            .or_else(|| profile.get_boolean(&realm, "canonicalize"))
            .unwrap_or(false);
        if canonicalize {
            options |= kdc_options::CANONICALIZE;
        }

        if start_time > 0 {
            options |= kdc_options::ALLOW_POSTDATE | kdc_options::POSTDATED;
        }

        let tkt_life = match opts.tkt_life {
            Some(life) => life,
            None => profile
                .get_deltat(&realm, "ticket_lifetime")?
                .unwrap_or(DEFAULT_TICKET_LIFETIME),
        };

        let renew_life = match opts.renew_life {
            Some(life) => life,
            None => profile.get_deltat(&realm, "renew_lifetime")?.unwrap_or(0),
        };
        if renew_life > 0 {
            options |= kdc_options::RENEWABLE;
        }

        let etypes = match &opts.etypes {
            Some(requested) => {
                merge_etype_preferences(requested, &supported_etypes())?
            }
            None => supported_etypes(),
        };

        let addresses = match opts.addresses {
            Some(list) => Some(list),
            None => {
                if profile.get_boolean(&realm, "noaddresses").unwrap_or(true) {
                    None
                } else {
                    Some(local_host_addresses())
                }
            }
        };

        let clockskew = profile
            .get_deltat(&realm, "clockskew")?
            .unwrap_or(DEFAULT_CLOCKSKEW);

        let mut preauth = PreauthState::new();
        preauth.salt = opts.salt;

        let preauth_to_use = match &opts.preauth_list {
            Some(ptypes) => make_preauth_list(ptypes),
            None => Vec::new(),
        };

        let server = build_in_tkt_name(None, &realm);

        let request = KdcRequest {
            client,
            realm,
            server,
            kdc_options: options,
            from: 0,
            till: 0,
            rtime: 0,
            nonce: generate_nonce(),
            etypes,
            addresses,
            padata: Vec::new(),
        };

        return Ok(InitCredsContext {
            profile,
            key_source,
            vault: None,
            request,
            in_tkt_service: None,
            start_time,
            tkt_life,
            renew_life,
            clockskew,
            sync_kdc_time: false,
            kdc_time_offset: None,
            preauth,
            preauth_to_use,
            fast_state: FastState::new(),
            err_reply: None,
            last_err: None,
            reply: None,
            enc_part2: None,
            encoded_request_body: None,
            encoded_previous_request: None,
            request_time: 0,
            loopcount: 0,
            referral_count: 0,
            cred: Credentials::default(),
            complete: false,
        });
    }

    /// Ask for a ticket of `service` instead of the realm's TGT. An
    /// explicit "@REALM" suffix must name the client realm; the request
    /// realm always stays the client's.
    pub fn set_service(&mut self, service: &str) -> Result<()> {
        if let Some(at) = service.rfind('@') {
            let service_realm = &service[at + 1..];
            if !service_realm.is_empty()
                && service_realm != self.request.realm
            {
                return Err(Error::RealmMismatch);
            }
        }
        self.in_tkt_service = Some(service.to_string());
        self.request.server = build_in_tkt_name(
            self.in_tkt_service.as_deref(),
            &self.request.realm,
        );
        return Ok(());
    }

    /// Write the credentials to `vault` as part of a successful
    /// exchange.
    pub fn set_vault(&mut self, vault: &'a dyn Vault) {
        self.vault = Some(vault);
    }

    /// Adopt the KDC's clock instead of failing on skewed replies.
    pub fn set_sync_kdc_time(&mut self, sync: bool) {
        self.sync_kdc_time = sync;
    }

    /// Replace the FAST state, attaching an armor backend.
    pub fn set_fast_state(&mut self, fast_state: FastState) {
        self.fast_state = fast_state;
    }

    pub fn is_complete(&self) -> bool {
        return self.complete;
    }

    /// The negotiated credentials, once the exchange is complete.
    pub fn credentials(&self) -> Option<&Credentials> {
        if !self.complete {
            return None;
        }
        return Some(&self.cred);
    }

    /// Consume the context, handing the credentials over.
    pub fn into_credentials(mut self) -> Result<Credentials> {
        if !self.complete {
            return Err(Error::DataError(
                "The exchange has not completed".to_string(),
            ));
        }
        return Ok(std::mem::take(&mut self.cred));
    }

    /// The last KRB-ERROR the KDC sent, whether or not it was fatal.
    pub fn last_error(&self) -> Option<&KrbError> {
        return self.last_err.as_ref();
    }

    /// The final AS-REP, once the exchange is complete.
    pub fn as_reply(&self) -> Option<&AsRep> {
        return self.reply.as_ref();
    }

    /// The canonical request body of the first round, as pre-auth
    /// mechanisms and armor providers bind to it.
    pub fn encoded_request_body(&self) -> Option<&[u8]> {
        return self.encoded_request_body.as_deref();
    }

    /// Offset to the KDC clock, when `sync_kdc_time` was set and a
    /// reply was accepted.
    pub fn kdc_time_offset(&self) -> Option<i64> {
        return self.kdc_time_offset;
    }

    /// Advance the exchange. `in_reply` is empty on the first call and
    /// carries the last KDC answer afterwards.
    pub fn step(&mut self, in_reply: &[u8]) -> Result<StepAction> {
        if self.complete {
            return Ok(StepAction::Complete);
        }

        if !in_reply.is_empty() {
            match self.step_reply(in_reply)? {
                ReplyOutcome::Complete => {
                    self.complete = true;
                    info!(
                        "Obtained initial credentials for {}",
                        unparse_name(&self.request.client, &self.request.realm)
                    );
                    return Ok(StepAction::Complete);
                }
                ReplyOutcome::ResendTcp => {
                    let request = match &self.encoded_previous_request {
                        Some(raw) => raw.clone(),
                        None => {
                            return Err(Error::DataError(
                                "No previous request to resend".to_string(),
                            ))
                        }
                    };
                    debug!("KDC response too big; resending over TCP");
                    return Ok(StepAction::SendRequest {
                        request,
                        realm: self.request.realm.clone(),
                        tcp_only: true,
                    });
                }
                ReplyOutcome::Continue => {}
            }
        }

        let request = self.step_request()?;
        let realm = self.request.realm.clone();
        self.loopcount += 1;
        info!(
            "AS-REQ {} for {} to realm {}",
            self.loopcount,
            unparse_name(&self.request.client, &self.request.realm),
            realm
        );
        return Ok(StepAction::SendRequest {
            request,
            realm,
            tcp_only: false,
        });
    }

    /// Loop step and transport until completion, upgrading to TCP when
    /// the KDC demands it.
    pub fn get(&mut self, transport: &dyn KdcTransport) -> Result<()> {
        let mut in_reply: Vec<u8> = Vec::new();
        let mut tcp_only = false;

        loop {
            match self.step(&in_reply)? {
                StepAction::Complete => return Ok(()),
                StepAction::SendRequest {
                    request,
                    realm,
                    tcp_only: force_tcp,
                } => {
                    if force_tcp {
                        tcp_only = true;
                    }
                    in_reply = transport
                        .send_to_kdc(&request, &realm, tcp_only)
                        .map_err(|err| ("Error sending AS-REQ", err))?;
                }
            }
        }
    }

    fn step_reply(&mut self, in_reply: &[u8]) -> Result<ReplyOutcome> {
        self.reply = None;
        self.enc_part2 = None;

        match classify_reply(in_reply)? {
            Classified::TooBig => {
                return Ok(ReplyOutcome::ResendTcp);
            }
            Classified::Error(err) => {
                return self.process_error_reply(err);
            }
            Classified::AsRep(as_rep) => {
                self.finalize(as_rep)?;
                return Ok(ReplyOutcome::Complete);
            }
        }
    }

    fn process_error_reply(&mut self, err: KrbError) -> Result<ReplyOutcome> {
        debug!("KRB-ERROR {} from KDC", err.error_code);
        self.last_err = Some(err.clone());

        let (padata, retry) = self.fast_state.process_error(&err)?;

        if err.error_code == error_codes::KDC_ERR_PREAUTH_REQUIRED && retry {
            self.preauth_to_use = padata.unwrap_or_default();
            sort_padata_by_preference(
                self.profile,
                &self.request.realm,
                &mut self.preauth_to_use,
            );
            self.err_reply = None;
            return Ok(ReplyOutcome::Continue);
        }

        if self.canonicalize_requested()
            && err.error_code == error_codes::KDC_ERR_WRONG_REALM
        {
            self.referral_count += 1;
            if self.referral_count > MAX_REFERRAL_HOPS {
                return Err(Error::WrongRealm);
            }
            let referred_realm = match &err.crealm {
                Some(realm) if !realm.is_empty() => realm.clone(),
                _ => return Err(Error::WrongRealm),
            };
            info!(
                "Referred from realm {} to realm {}",
                self.request.realm, referred_realm
            );
            self.request.server = rewrite_server_realm(
                &self.request.server,
                &referred_realm,
                self.is_tgt_request(),
            );
            self.request.realm = referred_realm;
            self.err_reply = None;
            return Ok(ReplyOutcome::Continue);
        }

        if retry {
            // leave it to the pre-auth try-again pass of the next
            // request to decide whether the error stands
            self.err_reply = Some(err);
            return Ok(ReplyOutcome::Continue);
        }

        return Err(self.surface_kdc_error(err));
    }

    fn step_request(&mut self) -> Result<Vec<u8>> {
        if self.loopcount >= MAX_IN_TKT_LOOPS {
            return Err(Error::GetInTktLoop);
        }

        self.request.server = build_in_tkt_name(
            self.in_tkt_service.as_deref(),
            &self.request.realm,
        );
        self.request.nonce = generate_nonce();

        if self.loopcount == 0 {
            self.request_time = timeofday();

            self.fast_state.armor_request(&self.request)?;
            self.encoded_request_body =
                Some(self.fast_state.prep_req_body(&self.request)?);

            if self.start_time != 0 {
                self.request.from =
                    addint32(self.request_time, self.start_time);
            }
            let lifetime_base = if self.request.from != 0 {
                self.request.from
            } else {
                self.request_time
            };
            self.request.till = addint32(lifetime_base, self.tkt_life);

            if self.renew_life > 0 {
                self.request.rtime = addint32(lifetime_base, self.renew_life);
                if self.request.rtime < self.request.till {
                    // never ask for a renewable time below the lifetime
                    self.request.rtime = self.request.till;
                }
                self.request.kdc_options &= !kdc_options::RENEWABLE_OK;
            } else {
                self.request.rtime = 0;
            }
        }

        if self.err_reply.is_none() {
            // first attempt, or retrying after PREAUTH_REQUIRED
            self.request.padata = prepare(
                &mut self.preauth,
                &self.preauth_to_use,
                &self.request.etypes,
                &self.request.client,
                &self.request.realm,
                self.key_source,
            )?;
        } else {
            let err = match self.err_reply.take() {
                Some(err) => err,
                None => {
                    return Err(Error::DataError(
                        "No pending error reply".to_string(),
                    ))
                }
            };
            if self.preauth_to_use.is_empty() {
                // no pre-auth negotiated, so nothing can recover this
                return Err(self.surface_kdc_error(err));
            }
            let recovery = tryagain(
                &mut self.preauth,
                err.e_data.as_deref(),
                &self.request.etypes,
                &self.request.client,
                &self.request.realm,
                self.key_source,
            );
            match recovery {
                Ok(Some(padata)) => {
                    self.request.padata = padata;
                }
                _ => {
                    return Err(self.surface_kdc_error(err));
                }
            }
        }

        let encoded = self.fast_state.prep_req(&self.request)?;
        self.encoded_previous_request = Some(encoded.clone());
        return Ok(encoded);
    }

    fn finalize(&mut self, as_rep: AsRep) -> Result<()> {
        let strengthen_key = self.fast_state.process_response(&as_rep)?;

        let mut reply_padata = as_rep.padata.clone().unwrap_or_default();
        sort_padata_by_preference(
            self.profile,
            &self.request.realm,
            &mut reply_padata,
        );
        self.preauth.etype = Some(as_rep.enc_part.etype);
        process_reply_padata(
            &mut self.preauth,
            &reply_padata,
            &self.request.etypes,
        )?;

        // a salt must exist before any key derivation; default to the
        // client principal the KDC answered for
        if self.preauth.salt.is_none() {
            self.preauth.salt =
                Some(principal2salt(&as_rep.crealm, &as_rep.cname));
        }

        let mut decrypted = false;
        if let Some(as_key) = &self.preauth.as_key {
            let encrypting_key = self
                .fast_state
                .reply_key(strengthen_key.as_ref(), as_key)?;
            decrypted = decrypt_as_reply(
                &as_rep,
                &mut self.enc_part2,
                Some(&encrypting_key),
                self.key_source,
            )
            .is_ok();
            if !decrypted {
                warn!("AS-REP does not decrypt with the negotiated key");
            }
        }

        if !decrypted {
            let salt = match &self.preauth.salt {
                Some(salt) => salt.clone(),
                None => Vec::new(),
            };
            let as_key = self.key_source.as_key(
                as_rep.enc_part.etype,
                &salt,
                self.preauth.s2kparams.as_deref(),
            )?;
            let encrypting_key = self
                .fast_state
                .reply_key(strengthen_key.as_ref(), &as_key)?;
            decrypt_as_reply(
                &as_rep,
                &mut self.enc_part2,
                Some(&encrypting_key),
                self.key_source,
            )?;
            self.preauth.as_key = Some(as_key);
        }

        let enc_part2 = match self.enc_part2.as_mut() {
            Some(part) => part,
            None => {
                return Err(Error::DataError(
                    "AS-REP enc-part missing after decryption".to_string(),
                ))
            }
        };

        let offset = verify_as_reply(
            &self.request,
            self.request_time,
            &as_rep,
            enc_part2,
            self.clockskew,
            self.sync_kdc_time,
        )?;
        if offset.is_some() {
            self.kdc_time_offset = offset;
        }

        stash_as_reply(&as_rep, enc_part2, &mut self.cred, self.vault)?;

        self.reply = Some(as_rep);
        return Ok(());
    }

    fn canonicalize_requested(&self) -> bool {
        return (self.request.kdc_options & kdc_options::CANONICALIZE) != 0
            || self.request.client.name_type
                == principal_names::NT_ENTERPRISE;
    }

    fn is_tgt_request(&self) -> bool {
        return is_local_tgt(&self.request.server, &self.request.realm);
    }

    fn surface_kdc_error(&self, err: KrbError) -> Error {
        if err.error_code == error_codes::KDC_ERR_C_PRINCIPAL_UNKNOWN {
            return Error::ClientNotFound(unparse_name(
                &self.request.client,
                &self.request.realm,
            ));
        }
        return Error::KrbError(err);
    }
}

/// One-call driver: run a whole exchange for `user` against `transport`.
pub fn get_init_creds(
    profile: &Profile,
    user: &KrbUser,
    key_source: &dyn AsKeySource,
    opts: InitCredsOpts,
    transport: &dyn KdcTransport,
) -> Result<Credentials> {
    let mut ctx = InitCredsContext::new(
        profile,
        user.principal(),
        user.realm.clone(),
        key_source,
        0,
        opts,
    )?;
    ctx.get(transport)?;
    return ctx.into_credentials();
}

/// Keep the caller list in its order, dropping enctypes the library
/// cannot use and duplicate entries.
fn merge_etype_preferences(
    requested: &[i32],
    supported: &[i32],
) -> Result<Vec<i32>> {
    let mut etypes = Vec::new();
    for etype in requested.iter() {
        if supported.contains(etype) && !etypes.contains(etype) {
            etypes.push(*etype);
        }
    }
    if etypes.is_empty() {
        return Err(Error::DataError(
            "No requested enctype is supported".to_string(),
        ));
    }
    return Ok(etypes);
}

/// 31 bit nonce from the OS generator; wall-clock seconds only if the
/// generator fails.
fn generate_nonce() -> u32 {
    let mut buffer = [0u8; 4];
    match OsRng.try_fill_bytes(&mut buffer) {
        Ok(()) => u32::from_be_bytes(buffer) & 0x7fff_ffff,
        Err(_) => (Utc::now().timestamp() as u32) & 0x7fff_ffff,
    }
}

fn timeofday() -> i32 {
    return Utc::now().timestamp() as i32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forge::{new_nt_enterprise, new_nt_principal};
    use crate::core::keyblock::{Keyblock, Secret};
    use crate::core::ticket_cred::TicketCred;
    use chrono::TimeZone;
    use kerberos_asn1::{
        AsReq, Asn1Object, EncAsRepPart, EncryptedData, EncryptionKey,
        EtypeInfo2, EtypeInfo2Entry, KerberosTime, MethodData, PaEncTsEnc,
        Ticket,
    };
    use kerberos_constants::key_usages::{
        KEY_USAGE_AS_REP_ENC_PART, KEY_USAGE_AS_REQ_TIMESTAMP,
    };
    use kerberos_constants::{etypes, pa_data_types};
    use kerberos_crypto::new_kerberos_cipher;
    use std::cell::RefCell;

    const REALM: &str = "EXAMPLE.COM";
    const USER: &str = "alice";
    const PASSWORD: &str = "Minnie1234";
    const SESSION_KEY: [u8; 32] = [7u8; 32];

    fn krb_time(epoch: i64) -> KerberosTime {
        return Utc.timestamp_opt(epoch, 0).unwrap().into();
    }

    fn secret() -> Secret {
        return Secret::new(PASSWORD.to_string());
    }

    fn new_context<'a>(
        profile: &'a Profile,
        key_source: &'a Secret,
    ) -> InitCredsContext<'a> {
        return InitCredsContext::new(
            profile,
            new_nt_principal(USER),
            REALM.to_string(),
            key_source,
            0,
            InitCredsOpts::default(),
        )
        .unwrap();
    }

    fn user_key(salt: &[u8]) -> Vec<u8> {
        let cipher =
            new_kerberos_cipher(etypes::AES256_CTS_HMAC_SHA1_96).unwrap();
        return cipher.generate_key_from_string(PASSWORD, salt);
    }

    /// A canned KDC: answer `raw_req` with an AS-REP encrypted for the
    /// key derived from `salt`, echoing the request nonce xor
    /// `nonce_xor` and shifting starttime by `start_offset` seconds.
    fn kdc_as_rep(
        raw_req: &[u8],
        crealm: &str,
        cname: kerberos_asn1::PrincipalName,
        salt: &[u8],
        nonce_xor: u32,
        start_offset: i64,
    ) -> Vec<u8> {
        let (_, as_req) = AsReq::parse(raw_req).unwrap();
        let body = &as_req.req_body;
        let now = Utc::now().timestamp();

        let mut enc_part = EncAsRepPart::default();
        enc_part.key = EncryptionKey {
            keytype: etypes::AES256_CTS_HMAC_SHA1_96,
            keyvalue: SESSION_KEY.to_vec(),
        };
        enc_part.nonce = body.nonce ^ nonce_xor;
        enc_part.authtime = krb_time(now);
        enc_part.starttime = Some(krb_time(now + start_offset));
        enc_part.endtime = body.till.clone();
        enc_part.srealm = body.realm.clone();
        enc_part.sname = body.sname.clone().unwrap();

        let cipher =
            new_kerberos_cipher(etypes::AES256_CTS_HMAC_SHA1_96).unwrap();
        let cipher_text = cipher.encrypt(
            &user_key(salt),
            KEY_USAGE_AS_REP_ENC_PART,
            &enc_part.build(),
        );

        let mut ticket = Ticket::default();
        ticket.realm = body.realm.clone();
        ticket.sname = body.sname.clone().unwrap();
        ticket.enc_part = EncryptedData::new(
            etypes::AES256_CTS_HMAC_SHA1_96,
            None,
            vec![0x11; 64],
        );

        let mut as_rep = AsRep::default();
        as_rep.crealm = crealm.to_string();
        as_rep.cname = cname;
        as_rep.ticket = ticket;
        as_rep.enc_part = EncryptedData::new(
            etypes::AES256_CTS_HMAC_SHA1_96,
            None,
            cipher_text,
        );
        return as_rep.build();
    }

    fn default_salt() -> Vec<u8> {
        return format!("{}{}", REALM, USER).into_bytes();
    }

    fn krb_error(error_code: i32) -> KrbError {
        let mut err = KrbError::default();
        err.error_code = error_code;
        return err;
    }

    fn etype_info2_padata(salt: &str) -> PaData {
        let entry = EtypeInfo2Entry {
            etype: etypes::AES256_CTS_HMAC_SHA1_96,
            salt: Some(salt.to_string()),
            s2kparams: None,
        };
        let info: EtypeInfo2 = vec![entry];
        return PaData::new(pa_data_types::PA_ETYPE_INFO2, info.build());
    }

    fn preauth_required_error(salt: &str) -> Vec<u8> {
        let method_data: MethodData = vec![
            PaData::new(16, Vec::new()),
            PaData::new(pa_data_types::PA_ENC_TIMESTAMP, Vec::new()),
            etype_info2_padata(salt),
        ];
        let mut err = krb_error(error_codes::KDC_ERR_PREAUTH_REQUIRED);
        err.e_data = Some(method_data.build());
        return err.build();
    }

    fn send(ctx: &mut InitCredsContext, in_reply: &[u8]) -> (Vec<u8>, String, bool) {
        match ctx.step(in_reply).unwrap() {
            StepAction::SendRequest {
                request,
                realm,
                tcp_only,
            } => (request, realm, tcp_only),
            StepAction::Complete => panic!("Exchange completed too early"),
        }
    }

    fn assert_complete(ctx: &mut InitCredsContext, in_reply: &[u8]) {
        match ctx.step(in_reply).unwrap() {
            StepAction::Complete => {}
            other => panic!("Expected completion, got {:?}", other),
        }
    }

    // Happy path: one round trip, no pre-auth required.
    #[test]
    fn test_exchange_without_preauth() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (request, realm, tcp_only) = send(&mut ctx, &[]);
        assert_eq!(REALM, realm);
        assert!(!tcp_only);
        assert_eq!(1, ctx.loopcount);

        let reply = kdc_as_rep(
            &request,
            REALM,
            new_nt_principal(USER),
            &default_salt(),
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);

        let creds = ctx.credentials().unwrap();
        assert!(!creds.is_skey);
        assert!(creds.second_ticket.is_empty());
        assert_eq!(SESSION_KEY.to_vec(), creds.keyblock.keyvalue);
        assert_eq!(
            Some((REALM.to_string(), new_nt_principal(USER))),
            creds.client
        );
        // nonce echo was verified: the decrypted part matches the request
        assert_eq!(
            ctx.request.nonce,
            ctx.enc_part2.as_ref().unwrap().nonce
        );
    }

    #[test]
    fn test_exchange_writes_vault_once() {
        struct CountingVault {
            added: RefCell<Vec<TicketCred>>,
        }
        impl Vault for CountingVault {
            fn id(&self) -> &str {
                return "memory";
            }
            fn add(&self, ticket_cred: TicketCred) -> Result<()> {
                self.added.borrow_mut().push(ticket_cred);
                return Ok(());
            }
        }

        let profile = Profile::new();
        let key_source = secret();
        let vault = CountingVault {
            added: RefCell::new(Vec::new()),
        };
        let mut ctx = new_context(&profile, &key_source);
        ctx.set_vault(&vault);

        let (request, _, _) = send(&mut ctx, &[]);
        let reply = kdc_as_rep(
            &request,
            REALM,
            new_nt_principal(USER),
            &default_salt(),
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);
        assert_eq!(1, vault.added.borrow().len());
    }

    // PREAUTH_REQUIRED negotiation: hints are sorted, the encrypted
    // timestamp is derived from the hinted salt, and the KDC can verify
    // it.
    #[test]
    fn test_exchange_with_preauth_negotiation() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (first_request, _, _) = send(&mut ctx, &[]);
        let (_, parsed) = AsReq::parse(&first_request).unwrap();
        // round one is optimistic: PAC request only
        let first_padata = parsed.padata.unwrap();
        assert!(first_padata
            .iter()
            .all(|pa| pa.padata_type != pa_data_types::PA_ENC_TIMESTAMP));

        let hinted_salt = format!("{}{}.hinted", REALM, USER);
        let (second_request, _, _) =
            send(&mut ctx, &preauth_required_error(&hinted_salt));
        assert_eq!(2, ctx.loopcount);

        // default preference "17, 16, 15, 14" bubbles 16 to the front
        let hint_types: Vec<i32> = ctx
            .preauth_to_use
            .iter()
            .map(|pa| pa.padata_type)
            .collect();
        assert_eq!(
            vec![
                16,
                pa_data_types::PA_ENC_TIMESTAMP,
                pa_data_types::PA_ETYPE_INFO2
            ],
            hint_types
        );

        // the second request proves the key: the KDC must be able to
        // decrypt the timestamp with the hinted salt
        let (_, parsed) = AsReq::parse(&second_request).unwrap();
        let padata = parsed.padata.unwrap();
        let enc_ts = padata
            .iter()
            .find(|pa| pa.padata_type == pa_data_types::PA_ENC_TIMESTAMP)
            .expect("encrypted timestamp expected");
        let (_, enc_data) =
            EncryptedData::parse(&enc_ts.padata_value).unwrap();
        let cipher =
            new_kerberos_cipher(etypes::AES256_CTS_HMAC_SHA1_96).unwrap();
        let plain = cipher
            .decrypt(
                &user_key(hinted_salt.as_bytes()),
                KEY_USAGE_AS_REQ_TIMESTAMP,
                &enc_data.cipher,
            )
            .expect("KDC side decryption");
        assert!(PaEncTsEnc::parse(&plain).is_ok());

        let reply = kdc_as_rep(
            &second_request,
            REALM,
            new_nt_principal(USER),
            hinted_salt.as_bytes(),
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);
        assert_eq!(2, ctx.loopcount);
    }

    // WRONG_REALM referral: enterprise client follows the KDC to the
    // referred realm and asks for its TGT there.
    #[test]
    fn test_exchange_follows_realm_referral() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = InitCredsContext::new(
            &profile,
            new_nt_enterprise(USER, REALM),
            REALM.to_string(),
            &key_source,
            0,
            InitCredsOpts::default(),
        )
        .unwrap();

        let (_, realm, _) = send(&mut ctx, &[]);
        assert_eq!(REALM, realm);

        let mut referral = krb_error(error_codes::KDC_ERR_WRONG_REALM);
        referral.crealm = Some("REFERRED.COM".to_string());
        let (request, realm, _) = send(&mut ctx, &referral.build());

        assert_eq!("REFERRED.COM", realm);
        assert_eq!(1, ctx.referral_count);
        let (_, parsed) = AsReq::parse(&request).unwrap();
        assert_eq!("REFERRED.COM", parsed.req_body.realm);
        assert_eq!(
            vec!["krbtgt".to_string(), "REFERRED.COM".to_string()],
            parsed.req_body.sname.unwrap().name_string
        );

        // the referred KDC canonicalizes the client
        let salt = b"REFERRED.COMalice".to_vec();
        let reply = kdc_as_rep(
            &request,
            "REFERRED.COM",
            new_nt_principal(USER),
            &salt,
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);

        let creds = ctx.credentials().unwrap();
        assert_eq!(
            Some(("REFERRED.COM".to_string(), new_nt_principal(USER))),
            creds.client
        );
    }

    #[test]
    fn test_referral_without_client_realm_fails() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = InitCredsContext::new(
            &profile,
            new_nt_enterprise(USER, REALM),
            REALM.to_string(),
            &key_source,
            0,
            InitCredsOpts::default(),
        )
        .unwrap();

        let _ = send(&mut ctx, &[]);
        let referral = krb_error(error_codes::KDC_ERR_WRONG_REALM);
        match ctx.step(&referral.build()) {
            Err(Error::WrongRealm) => {}
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_referral_hop_bound() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = InitCredsContext::new(
            &profile,
            new_nt_enterprise(USER, REALM),
            REALM.to_string(),
            &key_source,
            0,
            InitCredsOpts::default(),
        )
        .unwrap();

        let mut referral = krb_error(error_codes::KDC_ERR_WRONG_REALM);
        referral.crealm = Some("ELSEWHERE.COM".to_string());
        let raw_referral = referral.build();

        let _ = send(&mut ctx, &[]);
        let mut hops = 0;
        loop {
            match ctx.step(&raw_referral) {
                Ok(StepAction::SendRequest { .. }) => {
                    hops += 1;
                }
                Err(Error::WrongRealm) => break,
                other => panic!("Unexpected result {:?}", other),
            }
        }
        assert_eq!(MAX_REFERRAL_HOPS, hops);
    }

    // Nonce mismatch: the reply is discarded and nothing is stashed.
    #[test]
    fn test_exchange_rejects_nonce_mismatch() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (request, _, _) = send(&mut ctx, &[]);
        let reply = kdc_as_rep(
            &request,
            REALM,
            new_nt_principal(USER),
            &default_salt(),
            1,
            0,
        );
        match ctx.step(&reply) {
            Err(Error::KdcRepModified) => {}
            other => panic!("Unexpected result {:?}", other),
        }
        assert!(!ctx.is_complete());
        assert!(ctx.credentials().is_none());
        assert!(ctx.cred.keyblock.is_empty());
    }

    // Clock skew: a starttime far from the local clock is rejected when
    // no explicit start was requested.
    #[test]
    fn test_exchange_rejects_skewed_reply() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (request, _, _) = send(&mut ctx, &[]);
        let reply = kdc_as_rep(
            &request,
            REALM,
            new_nt_principal(USER),
            &default_salt(),
            0,
            2 * i64::from(DEFAULT_CLOCKSKEW),
        );
        match ctx.step(&reply) {
            Err(Error::KdcRepSkew) => {}
            other => panic!("Unexpected result {:?}", other),
        }
    }

    // RESPONSE_TOO_BIG: the identical request bytes go out again over
    // TCP and the loop counter does not move.
    #[test]
    fn test_exchange_resends_over_tcp() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (first_request, _, tcp_only) = send(&mut ctx, &[]);
        assert!(!tcp_only);
        assert_eq!(1, ctx.loopcount);

        let too_big = krb_error(error_codes::KRB_ERR_RESPONSE_TOO_BIG);
        let (resent, realm, tcp_only) = send(&mut ctx, &too_big.build());
        assert!(tcp_only);
        assert_eq!(REALM, realm);
        assert_eq!(first_request, resent);
        assert_eq!(1, ctx.loopcount);

        let reply = kdc_as_rep(
            &resent,
            REALM,
            new_nt_principal(USER),
            &default_salt(),
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);
    }

    // Pre-auth loop bound: endless PREAUTH_REQUIRED answers stop after
    // MAX_IN_TKT_LOOPS requests, without another round trip.
    #[test]
    fn test_exchange_loop_bound() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let salt = String::from_utf8(default_salt()).unwrap();
        let challenge = preauth_required_error(&salt);

        let _ = send(&mut ctx, &[]);
        let mut requests = 1;
        loop {
            match ctx.step(&challenge) {
                Ok(StepAction::SendRequest { .. }) => {
                    requests += 1;
                }
                Err(Error::GetInTktLoop) => break,
                other => panic!("Unexpected result {:?}", other),
            }
        }
        assert_eq!(MAX_IN_TKT_LOOPS, requests);
    }

    // An error other than PREAUTH_REQUIRED with usable e-data lets the
    // pre-auth try-again pass recover.
    #[test]
    fn test_exchange_recovers_via_tryagain() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let _ = send(&mut ctx, &[]);

        let first_salt = format!("{}{}", REALM, USER);
        let (_, _, _) = send(&mut ctx, &preauth_required_error(&first_salt));

        // the KDC rejects the pre-auth but names the salt it wants
        let corrected_salt = format!("{}{}.corrected", REALM, USER);
        let method_data: MethodData =
            vec![etype_info2_padata(&corrected_salt)];
        let mut failed = krb_error(error_codes::KDC_ERR_PREAUTH_FAILED);
        failed.e_data = Some(method_data.build());

        let (third_request, _, _) = send(&mut ctx, &failed.build());
        assert_eq!(3, ctx.loopcount);

        let (_, parsed) = AsReq::parse(&third_request).unwrap();
        let padata = parsed.padata.unwrap();
        let enc_ts = padata
            .iter()
            .find(|pa| pa.padata_type == pa_data_types::PA_ENC_TIMESTAMP)
            .expect("encrypted timestamp expected");
        let (_, enc_data) =
            EncryptedData::parse(&enc_ts.padata_value).unwrap();
        let cipher =
            new_kerberos_cipher(etypes::AES256_CTS_HMAC_SHA1_96).unwrap();
        assert!(cipher
            .decrypt(
                &user_key(corrected_salt.as_bytes()),
                KEY_USAGE_AS_REQ_TIMESTAMP,
                &enc_data.cipher,
            )
            .is_ok());

        let reply = kdc_as_rep(
            &third_request,
            REALM,
            new_nt_principal(USER),
            corrected_salt.as_bytes(),
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);
    }

    #[test]
    fn test_exchange_surfaces_unrecoverable_error() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let _ = send(&mut ctx, &[]);

        // an error without e-data and no pre-auth list: nothing to try
        let failed = krb_error(error_codes::KDC_ERR_PREAUTH_FAILED);
        match ctx.step(&failed.build()) {
            Err(Error::KrbError(err)) => {
                assert_eq!(
                    error_codes::KDC_ERR_PREAUTH_FAILED,
                    err.error_code
                );
            }
            other => panic!("Unexpected result {:?}", other),
        }
        assert!(ctx.last_error().is_some());
    }

    #[test]
    fn test_exchange_names_unknown_client() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let _ = send(&mut ctx, &[]);
        let unknown = krb_error(error_codes::KDC_ERR_C_PRINCIPAL_UNKNOWN);
        match ctx.step(&unknown.build()) {
            Err(Error::ClientNotFound(client)) => {
                assert_eq!("alice@EXAMPLE.COM", client);
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }

    // A stale negotiated key is retried once through the key source.
    #[test]
    fn test_exchange_rederives_key_after_decrypt_failure() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (request, _, _) = send(&mut ctx, &[]);
        ctx.preauth.as_key = Some(Keyblock::new(
            etypes::AES256_CTS_HMAC_SHA1_96,
            vec![0xEE; 32],
        ));

        let reply = kdc_as_rep(
            &request,
            REALM,
            new_nt_principal(USER),
            &default_salt(),
            0,
            0,
        );
        assert_complete(&mut ctx, &reply);
    }

    #[test]
    fn test_get_drives_the_whole_exchange() {
        struct ScriptedKdc {
            preauth_done: RefCell<bool>,
            tcp_seen: RefCell<bool>,
        }

        impl KdcTransport for ScriptedKdc {
            fn send_to_kdc(
                &self,
                raw: &[u8],
                _realm: &str,
                tcp_only: bool,
            ) -> std::io::Result<Vec<u8>> {
                if tcp_only {
                    self.tcp_seen.replace(true);
                }
                if !*self.preauth_done.borrow() {
                    self.preauth_done.replace(true);
                    let salt = format!("{}{}", REALM, USER);
                    return Ok(preauth_required_error(&salt));
                }
                return Ok(kdc_as_rep(
                    raw,
                    REALM,
                    new_nt_principal(USER),
                    format!("{}{}", REALM, USER).as_bytes(),
                    0,
                    0,
                ));
            }
        }

        let profile = Profile::new();
        let key_source = secret();
        let transport = ScriptedKdc {
            preauth_done: RefCell::new(false),
            tcp_seen: RefCell::new(false),
        };

        let user = KrbUser::new(USER.to_string(), REALM.to_string());
        let creds = get_init_creds(
            &profile,
            &user,
            &key_source,
            InitCredsOpts::default(),
            &transport,
        )
        .unwrap();

        assert_eq!(SESSION_KEY.to_vec(), creds.keyblock.keyvalue);
        assert!(!*transport.tcp_seen.borrow());
    }

    #[test]
    fn test_set_service_rejects_foreign_realm() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        assert!(ctx.set_service("kadmin/admin").is_ok());
        assert_eq!(
            vec!["kadmin".to_string(), "admin".to_string()],
            ctx.request.server.name_string
        );

        match ctx.set_service("kadmin/admin@OTHER.COM") {
            Err(Error::RealmMismatch) => {}
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_merge_etype_preferences() {
        let supported = vec![
            etypes::RC4_HMAC,
            etypes::AES128_CTS_HMAC_SHA1_96,
            etypes::AES256_CTS_HMAC_SHA1_96,
        ];

        // caller order wins, unsupported and duplicate entries drop out
        let merged = merge_etype_preferences(
            &[
                etypes::AES256_CTS_HMAC_SHA1_96,
                -1,
                etypes::RC4_HMAC,
                etypes::AES256_CTS_HMAC_SHA1_96,
            ],
            &supported,
        )
        .unwrap();
        assert_eq!(
            vec![etypes::AES256_CTS_HMAC_SHA1_96, etypes::RC4_HMAC],
            merged
        );

        assert!(merge_etype_preferences(&[-1, -2], &supported).is_err());
    }

    #[test]
    fn test_nonce_is_31_bits() {
        for _ in 0..64 {
            let nonce = generate_nonce();
            assert_eq!(0, nonce & 0x8000_0000);
        }
    }

    #[test]
    fn test_renew_life_sets_rtime_and_clears_renewable_ok() {
        let profile = Profile::new();
        let key_source = secret();
        let mut opts = InitCredsOpts::default();
        opts.renew_life = Some(7 * 24 * 60 * 60);

        let mut ctx = InitCredsContext::new(
            &profile,
            new_nt_principal(USER),
            REALM.to_string(),
            &key_source,
            0,
            opts,
        )
        .unwrap();

        let (request, _, _) = send(&mut ctx, &[]);
        let (_, parsed) = AsReq::parse(&request).unwrap();
        let body = parsed.req_body;

        assert_ne!(0, body.kdc_options.flags & kdc_options::RENEWABLE);
        assert_eq!(0, body.kdc_options.flags & kdc_options::RENEWABLE_OK);
        let rtime = body.rtime.expect("rtime expected");
        assert!(rtime.timestamp() >= body.till.timestamp());
    }

    #[test]
    fn test_profile_options_reach_the_request() {
        let mut profile = Profile::new();
        profile.set_for_realm(REALM, "forwardable", "true");
        profile.set("proxiable", "yes");
        profile.set("ticket_lifetime", "8h");

        let key_source = secret();
        let mut ctx = new_context(&profile, &key_source);

        let (request, _, _) = send(&mut ctx, &[]);
        let (_, parsed) = AsReq::parse(&request).unwrap();
        let body = parsed.req_body;

        assert_ne!(0, body.kdc_options.flags & kdc_options::FORWARDABLE);
        assert_ne!(0, body.kdc_options.flags & kdc_options::PROXIABLE);
        let lifetime =
            body.till.timestamp() - i64::from(ctx.request_time);
        assert_eq!(8 * 3600, lifetime);
    }

    #[test]
    fn test_postdated_request_sets_from() {
        let profile = Profile::new();
        let key_source = secret();
        let mut ctx = InitCredsContext::new(
            &profile,
            new_nt_principal(USER),
            REALM.to_string(),
            &key_source,
            600,
            InitCredsOpts::default(),
        )
        .unwrap();

        let (request, _, _) = send(&mut ctx, &[]);
        let (_, parsed) = AsReq::parse(&request).unwrap();
        let body = parsed.req_body;

        assert_ne!(0, body.kdc_options.flags & kdc_options::POSTDATED);
        assert_ne!(0, body.kdc_options.flags & kdc_options::ALLOW_POSTDATE);
        let from = body.from.expect("from expected");
        assert_eq!(
            i64::from(ctx.request_time) + 600,
            from.timestamp()
        );
    }
}
