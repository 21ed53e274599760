//! FAST armor seams of the AS exchange. The exchange only relies on the
//! contracts here; an armor backend (if any) plugs in behind the
//! `ArmorProvider` trait.

use crate::core::forge::{build_as_req, build_req_body, KdcRequest};
use crate::core::keyblock::Keyblock;
use crate::error::Result;
use kerberos_asn1::{AsRep, Asn1Object, KrbError, MethodData, PaData};

/// Armor backend contract. All methods see the request/reply exactly as
/// the exchange does.
pub trait ArmorProvider {
    /// Inspect the request before the first round and stage armor
    /// material; padata returned here is attached to every request.
    fn armor(&mut self, request: &KdcRequest) -> Result<Vec<PaData>>;

    /// Wrap the outgoing request (e.g. into PA-FX-FAST) and serialize it.
    fn wrap_request(&self, request: &KdcRequest) -> Result<Vec<u8>>;

    /// Combine the strengthen key from the reply with the AS key.
    fn reply_key(
        &self,
        strengthen_key: &Keyblock,
        as_key: &Keyblock,
    ) -> Result<Keyblock>;

    /// Unwrap a FAST error. Returns the inner padata hints and whether
    /// the error may be retried.
    fn process_error(
        &self,
        err_reply: &KrbError,
    ) -> Result<(Option<Vec<PaData>>, bool)>;

    /// Digest the reply armor and surface the strengthen key, if any.
    fn process_response(&self, as_rep: &AsRep) -> Result<Option<Keyblock>>;
}

/// Per-exchange FAST state. Without a provider every hook degrades to
/// the plain AS exchange behavior.
#[derive(Default)]
pub struct FastState {
    provider: Option<Box<dyn ArmorProvider>>,
    armor_padata: Vec<PaData>,
}

impl FastState {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn with_provider(provider: Box<dyn ArmorProvider>) -> Self {
        return Self {
            provider: Some(provider),
            armor_padata: Vec::new(),
        };
    }

    /// First-round hook: lets the provider stage its armor material.
    pub fn armor_request(&mut self, request: &KdcRequest) -> Result<()> {
        if let Some(provider) = &mut self.provider {
            self.armor_padata = provider.armor(request)?;
        }
        return Ok(());
    }

    /// The canonical request body bytes pre-auth mechanisms must bind to.
    pub fn prep_req_body(&self, request: &KdcRequest) -> Result<Vec<u8>> {
        return Ok(build_req_body(request));
    }

    /// Serialize the request for the wire, armored when a provider is
    /// present.
    pub fn prep_req(&self, request: &KdcRequest) -> Result<Vec<u8>> {
        match &self.provider {
            Some(provider) => {
                let mut armored = request.clone();
                armored
                    .padata
                    .extend(self.armor_padata.iter().cloned());
                return provider.wrap_request(&armored);
            }
            None => {
                return Ok(build_as_req(request).build());
            }
        }
    }

    /// The key the AS-REP enc-part is encrypted with: the AS key,
    /// strengthened when the reply carried a strengthen key.
    pub fn reply_key(
        &self,
        strengthen_key: Option<&Keyblock>,
        as_key: &Keyblock,
    ) -> Result<Keyblock> {
        match strengthen_key {
            None => Ok(as_key.clone()),
            Some(strengthen_key) => match &self.provider {
                Some(provider) => provider.reply_key(strengthen_key, as_key),
                None => {
                    Err("Strengthen key received outside a FAST exchange")?
                }
            },
        }
    }

    /// Unwrap an error reply. Plain exchanges surface the e-data as
    /// padata hints and always allow a retry decision upstream.
    pub fn process_error(
        &self,
        err_reply: &KrbError,
    ) -> Result<(Option<Vec<PaData>>, bool)> {
        if let Some(provider) = &self.provider {
            return provider.process_error(err_reply);
        }

        let padata = match &err_reply.e_data {
            Some(e_data) if !e_data.is_empty() => {
                match MethodData::parse(e_data) {
                    Ok((_, method_data)) => Some(method_data),
                    Err(_) => None,
                }
            }
            _ => None,
        };
        return Ok((padata, true));
    }

    /// Digest the reply and surface the strengthen key, if any.
    pub fn process_response(
        &self,
        as_rep: &AsRep,
    ) -> Result<Option<Keyblock>> {
        match &self.provider {
            Some(provider) => provider.process_response(as_rep),
            None => Ok(None),
        }
    }
}
