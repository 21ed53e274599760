//! This module provides functionalities to create kerberos structs

pub mod principal;
pub use principal::{
    build_in_tkt_name, is_local_tgt, is_tgs_principal, new_nt_enterprise,
    new_nt_principal, new_nt_srv_inst, new_principal_name, principal2salt,
    principal_eq, rewrite_server_realm, spn_to_service_parts, tgt_principal,
    unparse_name,
};

mod krb_user;
pub use krb_user::KrbUser;

mod kdc_req;
pub use kdc_req::{build_as_req, build_req_body, KdcRequest};

mod pa_data;
pub use pa_data::{
    new_pa_data_encrypted_timestamp, new_pa_data_fx_cookie,
    new_pa_data_pac_request,
};
