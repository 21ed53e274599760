//! Client pre-authentication: react to KDC hints, keep the negotiation
//! state (salt, s2kparams, etype, AS key) and emit the outbound padata.

use crate::core::forge::{
    new_pa_data_encrypted_timestamp, new_pa_data_fx_cookie,
    new_pa_data_pac_request, principal2salt,
};
use crate::core::keyblock::{AsKeySource, Keyblock};
use crate::error::Result;
use crate::profile::Profile;
use kerberos_asn1::{
    Asn1Object, EtypeInfo, EtypeInfo2, MethodData, PaData, PrincipalName,
};
use kerberos_constants::pa_data_types;
use log::debug;

pub const DEFAULT_PREFERRED_PREAUTH_TYPES: &str = "17, 16, 15, 14";

/// Negotiation state carried across pre-auth rounds.
#[derive(Debug, Default)]
pub struct PreauthState {
    pub salt: Option<Vec<u8>>,
    pub s2kparams: Option<Vec<u8>>,
    pub etype: Option<i32>,
    pub as_key: Option<Keyblock>,
    pub cookie: Option<Vec<u8>>,
}

impl PreauthState {
    pub fn new() -> Self {
        return Self::default();
    }
}

/// Hint-only entries for the pre-auth types the caller wants tried.
pub fn make_preauth_list(ptypes: &[i32]) -> Vec<PaData> {
    return ptypes
        .iter()
        .map(|ptype| PaData::new(*ptype, Vec::new()))
        .collect();
}

/// Move the padata entries named in `preferred_preauth_types` to the
/// front, in the preference order; everything else keeps its relative
/// order behind them.
pub fn sort_padata_by_preference(
    profile: &Profile,
    realm: &str,
    padata: &mut [PaData],
) {
    if padata.is_empty() {
        return;
    }

    let preferred = profile
        .get_string(realm, "preferred_preauth_types")
        .unwrap_or(DEFAULT_PREFERRED_PREAUTH_TYPES)
        .to_string();

    let mut base = 0;
    for token in preferred
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        let ptype: i32 = match token.parse() {
            Ok(value) => value,
            Err(_) => break,
        };
        for i in base..padata.len() {
            if padata[i].padata_type == ptype {
                padata[base..=i].rotate_right(1);
                base += 1;
                break;
            }
        }
    }
}

/// Produce the outbound padata for the next request from the current
/// hints. May update the negotiation state, including the AS key.
pub fn prepare(
    state: &mut PreauthState,
    hints: &[PaData],
    request_etypes: &[i32],
    client: &PrincipalName,
    client_realm: &str,
    key_source: &dyn AsKeySource,
) -> Result<Vec<PaData>> {
    apply_etype_info(state, hints, request_etypes)?;
    harvest_cookie(state, hints);

    let mut padata = vec![new_pa_data_pac_request(true)];
    if let Some(cookie) = &state.cookie {
        padata.push(new_pa_data_fx_cookie(cookie));
    }

    let wants_enc_timestamp = hints
        .iter()
        .any(|pa| pa.padata_type == pa_data_types::PA_ENC_TIMESTAMP);
    if wants_enc_timestamp {
        ensure_as_key(state, request_etypes, client, client_realm, key_source)?;
        if let Some(as_key) = &state.as_key {
            debug!(
                "Attaching encrypted timestamp pre-auth (etype {})",
                as_key.keytype
            );
            padata.push(new_pa_data_encrypted_timestamp(as_key)?);
        }
    }

    return Ok(padata);
}

/// Probe the e-data of a failed request for a recoverable alternative.
/// `None` means the error stands as delivered.
pub fn tryagain(
    state: &mut PreauthState,
    e_data: Option<&[u8]>,
    request_etypes: &[i32],
    client: &PrincipalName,
    client_realm: &str,
    key_source: &dyn AsKeySource,
) -> Result<Option<Vec<PaData>>> {
    let e_data = match e_data {
        Some(data) if !data.is_empty() => data,
        _ => return Ok(None),
    };

    let method_data = match MethodData::parse(e_data) {
        Ok((_, method_data)) => method_data,
        Err(_) => return Ok(None),
    };

    if !apply_etype_info(state, &method_data, request_etypes)? {
        return Ok(None);
    }

    // the KDC corrected our key parameters; rebuild the proof with a key
    // derived from them
    debug!("Retrying pre-auth with corrected etype-info");
    ensure_as_key(state, request_etypes, client, client_realm, key_source)?;

    let mut padata = vec![new_pa_data_pac_request(true)];
    if let Some(cookie) = &state.cookie {
        padata.push(new_pa_data_fx_cookie(cookie));
    }
    if let Some(as_key) = &state.as_key {
        padata.push(new_pa_data_encrypted_timestamp(as_key)?);
    }

    return Ok(Some(padata));
}

/// Let the AS-REP padata finalize the negotiation state before the
/// enc-part is decrypted.
pub fn process_reply_padata(
    state: &mut PreauthState,
    padata: &[PaData],
    request_etypes: &[i32],
) -> Result<()> {
    apply_etype_info(state, padata, request_etypes)?;
    harvest_cookie(state, padata);
    return Ok(());
}

/// Apply the best ETYPE-INFO2/ETYPE-INFO entry to the state. Returns
/// whether the key parameters materially changed (which invalidates any
/// derived AS key).
fn apply_etype_info(
    state: &mut PreauthState,
    padata: &[PaData],
    request_etypes: &[i32],
) -> Result<bool> {
    if let Some(params) = find_etype_info2(padata, request_etypes)? {
        return Ok(update_key_params(state, params));
    }
    if let Some(params) = find_etype_info(padata, request_etypes)? {
        return Ok(update_key_params(state, params));
    }
    return Ok(false);
}

struct KeyParams {
    etype: i32,
    salt: Option<Vec<u8>>,
    s2kparams: Option<Vec<u8>>,
}

fn find_etype_info2(
    padata: &[PaData],
    request_etypes: &[i32],
) -> Result<Option<KeyParams>> {
    for pa in padata.iter() {
        if pa.padata_type != pa_data_types::PA_ETYPE_INFO2 {
            continue;
        }
        let (_, info) = EtypeInfo2::parse(&pa.padata_value)
            .map_err(|_| "Error parsing ETYPE-INFO2")?;
        for entry in info {
            if request_etypes.contains(&entry.etype) {
                return Ok(Some(KeyParams {
                    etype: entry.etype,
                    salt: entry.salt.map(|s| s.into_bytes()),
                    s2kparams: entry.s2kparams,
                }));
            }
        }
    }
    return Ok(None);
}

fn find_etype_info(
    padata: &[PaData],
    request_etypes: &[i32],
) -> Result<Option<KeyParams>> {
    for pa in padata.iter() {
        if pa.padata_type != pa_data_types::PA_ETYPE_INFO {
            continue;
        }
        let (_, info) = EtypeInfo::parse(&pa.padata_value)
            .map_err(|_| "Error parsing ETYPE-INFO")?;
        for entry in info {
            if request_etypes.contains(&entry.etype) {
                return Ok(Some(KeyParams {
                    etype: entry.etype,
                    salt: entry.salt,
                    s2kparams: None,
                }));
            }
        }
    }
    return Ok(None);
}

fn update_key_params(state: &mut PreauthState, params: KeyParams) -> bool {
    let salt = match params.salt {
        Some(salt) => Some(salt),
        None => state.salt.clone(),
    };

    let changed = state.etype != Some(params.etype)
        || state.salt != salt
        || state.s2kparams != params.s2kparams;

    if changed {
        state.etype = Some(params.etype);
        state.salt = salt;
        state.s2kparams = params.s2kparams;
        state.as_key = None;
    }

    return changed;
}

fn harvest_cookie(state: &mut PreauthState, padata: &[PaData]) {
    for pa in padata.iter() {
        if pa.padata_type == pa_data_types::PA_FX_COOKIE {
            state.cookie = Some(pa.padata_value.clone());
        }
    }
}

fn ensure_as_key(
    state: &mut PreauthState,
    request_etypes: &[i32],
    client: &PrincipalName,
    client_realm: &str,
    key_source: &dyn AsKeySource,
) -> Result<()> {
    if state.as_key.is_some() {
        return Ok(());
    }

    let etype = match state.etype {
        Some(etype) => etype,
        None => *request_etypes
            .first()
            .ok_or("No enctype available to derive the pre-auth key")?,
    };

    if state.salt.is_none() {
        state.salt = Some(principal2salt(client_realm, client));
    }
    let salt = match &state.salt {
        Some(salt) => salt.clone(),
        None => Vec::new(),
    };

    let key = key_source.as_key(etype, &salt, state.s2kparams.as_deref())?;
    state.etype = Some(etype);
    state.as_key = Some(key);

    return Ok(());
}
