//! Client side of the Kerberos AS exchange: obtain an initial ticket
//! (a TGT by default) and its session key from a KDC, negotiating
//! pre-authentication and following realm referrals along the way.
//!
//! The incremental driver keeps all network I/O with the caller:
//!
//! ```no_run
//! use initcreds::{
//!     AddressTransport, InitCredsContext, InitCredsOpts, Profile, Secret,
//! };
//! use initcreds::forge::new_nt_principal;
//!
//! # fn main() -> initcreds::Result<()> {
//! let profile = Profile::new();
//! let secret = Secret::new("Minnie1234".to_string());
//! let mut ctx = InitCredsContext::new(
//!     &profile,
//!     new_nt_principal("alice"),
//!     "EXAMPLE.COM".to_string(),
//!     &secret,
//!     0,
//!     InitCredsOpts::default(),
//! )?;
//!
//! let transport = AddressTransport::new("10.0.0.1:88".parse().unwrap());
//! ctx.get(&transport)?;
//! let creds = ctx.into_credentials()?;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{Error, Result};

pub mod profile;
pub use profile::Profile;

mod utils;

pub mod communication;
pub use communication::{
    AddressTransport, KdcTransport, KrbChannel, TransportProtocol,
};

pub mod core;
pub use crate::core::forge;
pub use crate::core::{
    get_init_creds, ArmorProvider, AsKeySource, Credentials, FastState,
    FileVault, InitCredsContext, InitCredsOpts, Keyblock, KrbUser,
    PromptSecretSource, Prompter, Secret, StepAction, TicketCred,
    TicketTimes, Vault, MAX_IN_TKT_LOOPS, MAX_REFERRAL_HOPS,
};
