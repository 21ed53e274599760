use crate::core::keyblock::Keyblock;
use crate::error::Result;
use chrono::Utc;
use kerberos_asn1::{
    Asn1Object, EncryptedData, KerbPaPacRequest, PaData, PaEncTsEnc,
};
use kerberos_constants::key_usages::KEY_USAGE_AS_REQ_TIMESTAMP;
use kerberos_constants::pa_data_types;
use kerberos_crypto::new_kerberos_cipher;

/// Helper to create a PA-DATA that contains a PA-ENC-TS-ENC struct,
/// proving knowledge of the long-term key with a fresh timestamp.
pub fn new_pa_data_encrypted_timestamp(as_key: &Keyblock) -> Result<PaData> {
    let cipher = new_kerberos_cipher(as_key.keytype)
        .map_err(|_| format!("Unknown etype {}", as_key.keytype))?;

    let timestamp = PaEncTsEnc::from(Utc::now());
    let encrypted_timestamp = cipher.encrypt(
        &as_key.keyvalue,
        KEY_USAGE_AS_REQ_TIMESTAMP,
        &timestamp.build(),
    );

    return Ok(PaData::new(
        pa_data_types::PA_ENC_TIMESTAMP,
        EncryptedData::new(as_key.keytype, None, encrypted_timestamp).build(),
    ));
}

/// Helper to create a PA-DATA asking the KDC to include (or skip) a PAC.
pub fn new_pa_data_pac_request(include_pac: bool) -> PaData {
    return PaData::new(
        pa_data_types::PA_PAC_REQUEST,
        KerbPaPacRequest::new(include_pac).build(),
    );
}

/// Helper to echo back the opaque KDC cookie.
pub fn new_pa_data_fx_cookie(cookie: &[u8]) -> PaData {
    return PaData::new(pa_data_types::PA_FX_COOKIE, cookie.to_vec());
}
