//! Key material and the capabilities used to obtain it.

use crate::error::Result;
use kerberos_crypto::{new_kerberos_cipher, Key};
use std::cell::RefCell;
use std::fmt;
use zeroize::Zeroize;

/// Raw key material tagged with its enctype. Wiped when dropped.
#[derive(Clone, PartialEq)]
pub struct Keyblock {
    pub keytype: i32,
    pub keyvalue: Vec<u8>,
}

impl Keyblock {
    pub fn new(keytype: i32, keyvalue: Vec<u8>) -> Self {
        return Self { keytype, keyvalue };
    }

    pub fn empty() -> Self {
        return Self::new(0, Vec::new());
    }

    pub fn is_empty(&self) -> bool {
        return self.keyvalue.is_empty();
    }

    pub fn wipe(&mut self) {
        self.keyvalue.zeroize();
        self.keytype = 0;
    }
}

impl Default for Keyblock {
    fn default() -> Self {
        return Keyblock::empty();
    }
}

impl Drop for Keyblock {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for Keyblock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Keyblock {{ keytype: {}, keyvalue: <{} bytes> }}",
            self.keytype,
            self.keyvalue.len()
        )
    }
}

/// Interactive prompt callback. May block on user input.
pub trait Prompter {
    fn prompt(&self, prompt: &str, hidden: bool) -> Result<String>;
}

/// Capability to produce the client's long-term AS key for a given
/// enctype and salt. Must be deterministic for fixed inputs.
pub trait AsKeySource {
    fn as_key(
        &self,
        etype: i32,
        salt: &[u8],
        s2kparams: Option<&[u8]>,
    ) -> Result<Keyblock>;
}

/// A plaintext secret; contents are wiped when dropped.
pub struct Secret(String);

impl Secret {
    pub fn new(secret: String) -> Self {
        return Self(secret);
    }

    pub fn as_str(&self) -> &str {
        return &self.0;
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} chars>)", self.0.len())
    }
}

impl AsKeySource for Secret {
    fn as_key(
        &self,
        etype: i32,
        salt: &[u8],
        _s2kparams: Option<&[u8]>,
    ) -> Result<Keyblock> {
        return string_to_key(self.as_str(), etype, salt);
    }
}

/// User credentials already held as a `kerberos_crypto` key: a plaintext
/// secret derives per-request, raw keys are served as-is when the
/// requested enctype matches.
impl AsKeySource for Key {
    fn as_key(
        &self,
        etype: i32,
        salt: &[u8],
        _s2kparams: Option<&[u8]>,
    ) -> Result<Keyblock> {
        match self {
            Key::Secret(secret) => {
                return string_to_key(secret, etype, salt);
            }
            _ => {
                let keytypes = self.etypes();
                if !keytypes.contains(&etype) {
                    return Err(format!(
                        "Stored key of etype {:?} cannot serve etype {}",
                        keytypes, etype
                    ))?;
                }
                return Ok(Keyblock::new(etype, self.as_bytes().to_vec()));
            }
        }
    }
}

/// Asks the prompter for the secret on first use, then derives keys
/// from the cached answer.
pub struct PromptSecretSource<'a> {
    prompter: &'a dyn Prompter,
    prompt: String,
    secret: RefCell<Option<String>>,
}

impl<'a> PromptSecretSource<'a> {
    pub fn new(prompter: &'a dyn Prompter, prompt: String) -> Self {
        return Self {
            prompter,
            prompt,
            secret: RefCell::new(None),
        };
    }
}

impl<'a> AsKeySource for PromptSecretSource<'a> {
    fn as_key(
        &self,
        etype: i32,
        salt: &[u8],
        _s2kparams: Option<&[u8]>,
    ) -> Result<Keyblock> {
        if self.secret.borrow().is_none() {
            let answer = self.prompter.prompt(&self.prompt, true)?;
            self.secret.replace(Some(answer));
        }
        let secret = self.secret.borrow();
        match secret.as_ref() {
            Some(secret) => string_to_key(secret, etype, salt),
            None => Err("No secret available for key derivation")?,
        }
    }
}

impl<'a> Drop for PromptSecretSource<'a> {
    fn drop(&mut self) {
        if let Some(mut secret) = self.secret.replace(None) {
            secret.zeroize();
        }
    }
}

fn string_to_key(secret: &str, etype: i32, salt: &[u8]) -> Result<Keyblock> {
    let cipher = new_kerberos_cipher(etype)
        .map_err(|_| format!("Unknown etype {}", etype))?;
    let keyvalue = cipher.generate_key_from_string(secret, salt);
    return Ok(Keyblock::new(etype, keyvalue));
}
