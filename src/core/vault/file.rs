use super::Vault;
use crate::core::ticket_cred::{new_krb_cred, TicketCred};
use crate::error::{Error, Result};
use kerberos_ccache::CCache;
use std::convert::TryInto;
use std::fs;

/// Credential cache backed by a ccache file.
pub struct FileVault {
    file_path: String,
}

impl FileVault {
    pub fn new(file_path: String) -> Self {
        return Self { file_path };
    }
}

impl Vault for FileVault {
    fn id(&self) -> &str {
        return &self.file_path;
    }

    fn add(&self, ticket_cred: TicketCred) -> Result<()> {
        let krb_cred = new_krb_cred(ticket_cred);
        let ccache: CCache = krb_cred.try_into().map_err(|_| {
            Error::DataError(format!("Error converting KrbCred to CCache"))
        })?;

        fs::write(&self.file_path, ccache.build()).map_err(|err| {
            Error::IOError(
                format!("Unable to write credentials in {}", self.file_path),
                err,
            )
        })?;

        return Ok(());
    }
}
