//! Destination for negotiated credentials. The storage format itself is
//! external; the exchange performs at most one `add` per success.

use crate::core::ticket_cred::TicketCred;
use crate::error::Result;

pub trait Vault {
    fn id(&self) -> &str;
    fn add(&self, ticket_cred: TicketCred) -> Result<()>;
}

mod file;
pub use file::FileVault;
