pub mod forge;
pub use forge::KrbUser;

mod keyblock;
pub use keyblock::{AsKeySource, Keyblock, PromptSecretSource, Prompter, Secret};

mod classify;
pub use classify::{classify_reply, Classified};

mod decrypt;
pub use decrypt::decrypt_as_reply;

mod validate;
pub use validate::verify_as_reply;

mod preauth;
pub use preauth::{
    make_preauth_list, sort_padata_by_preference, PreauthState,
    DEFAULT_PREFERRED_PREAUTH_TYPES,
};

mod fast;
pub use fast::{ArmorProvider, FastState};

mod ticket_cred;
pub use ticket_cred::{new_krb_cred, new_krb_cred_info, TicketCred};

mod stash;
pub use stash::{stash_as_reply, Credentials, TicketTimes};

mod exchange;
pub use exchange::{
    get_init_creds, InitCredsContext, InitCredsOpts, StepAction,
    MAX_IN_TKT_LOOPS, MAX_REFERRAL_HOPS,
};

mod vault;
pub use vault::{FileVault, Vault};
