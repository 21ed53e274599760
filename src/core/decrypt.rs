use crate::core::forge::principal2salt;
use crate::core::keyblock::{AsKeySource, Keyblock};
use crate::error::Result;
use kerberos_asn1::{
    AsRep, Asn1Object, EncAsRepPart, EncKdcRepPart, EncryptedData,
};
use kerberos_constants::key_usages::KEY_USAGE_AS_REP_ENC_PART;
use kerberos_crypto::new_kerberos_cipher;

/// Decrypt the AS-REP enc-part into `enc_part2`. A second call with the
/// slot already filled is a no-op. Without a caller-supplied key, one is
/// derived for the salt of the client principal the KDC answered with
/// (which may be the canonicalized name; the validator compares it
/// later).
pub fn decrypt_as_reply(
    as_rep: &AsRep,
    enc_part2: &mut Option<EncKdcRepPart>,
    key: Option<&Keyblock>,
    key_source: &dyn AsKeySource,
) -> Result<()> {
    if enc_part2.is_some() {
        return Ok(());
    }

    let decrypted = match key {
        Some(key) => decrypt_enc_part(key, &as_rep.enc_part)?,
        None => {
            let salt = principal2salt(&as_rep.crealm, &as_rep.cname);
            let derived_key =
                key_source.as_key(as_rep.enc_part.etype, &salt, None)?;
            decrypt_enc_part(&derived_key, &as_rep.enc_part)?
        }
    };

    *enc_part2 = Some(decrypted);
    return Ok(());
}

/// Decrypts the AS-REP enc-part by using the user credentials
fn decrypt_enc_part(
    key: &Keyblock,
    enc_part: &EncryptedData,
) -> Result<EncKdcRepPart> {
    if key.keytype != enc_part.etype {
        return Err("Unable to decrypt KDC response AS-REP: mistmach etypes")?;
    }

    let cipher = new_kerberos_cipher(enc_part.etype)
        .map_err(|_| format!("Unknown etype {}", enc_part.etype))?;

    let raw_enc_as_rep_part = cipher
        .decrypt(&key.keyvalue, KEY_USAGE_AS_REP_ENC_PART, &enc_part.cipher)
        .map_err(|error| {
            format!("Error decrypting KDC response AS-REP: {}", error)
        })?;

    let (_, enc_as_rep_part) = EncAsRepPart::parse(&raw_enc_as_rep_part)
        .map_err(|_| format!("Error decoding AS-REP"))?;

    return Ok(enc_as_rep_part.into());
}
