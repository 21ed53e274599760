use kerberos_asn1::PrincipalName;
use kerberos_constants::principal_names;

pub const TGS_NAME: &str = "krbtgt";

pub fn new_nt_principal(name: &str) -> PrincipalName {
    return new_principal_name(name, principal_names::NT_PRINCIPAL);
}

pub fn new_nt_srv_inst(service: &str) -> PrincipalName {
    return new_principal_name(service, principal_names::NT_SRV_INST);
}

/// Enterprise principals keep the "name@realm" form in one component.
pub fn new_nt_enterprise(name: &str, realm: &str) -> PrincipalName {
    return PrincipalName {
        name_type: principal_names::NT_ENTERPRISE,
        name_string: vec![format!("{}@{}", name, realm)],
    };
}

pub fn new_principal_name(name: &str, name_type: i32) -> PrincipalName {
    return PrincipalName {
        name_type,
        name_string: spn_to_service_parts(name),
    };
}

pub fn spn_to_service_parts(spn: &str) -> Vec<String> {
    spn.split('/').map(|s| s.to_string()).collect()
}

/// The ticket-granting service of `realm`: krbtgt/REALM.
pub fn tgt_principal(realm: &str) -> PrincipalName {
    return PrincipalName {
        name_type: principal_names::NT_SRV_INST,
        name_string: vec![TGS_NAME.to_string(), realm.to_string()],
    };
}

/// A TGS principal has exactly the two components krbtgt/<realm>.
pub fn is_tgs_principal(principal: &PrincipalName) -> bool {
    return principal.name_string.len() == 2
        && principal.name_string[0] == TGS_NAME;
}

/// Whether `server` asks for a TGT of the client's own realm.
pub fn is_local_tgt(server: &PrincipalName, client_realm: &str) -> bool {
    return is_tgs_principal(server)
        && server.name_string[1] == client_realm;
}

/// Principal equality the way the KDC exchange needs it: realm-sensitive
/// and component-wise, ignoring the name type.
pub fn principal_eq(
    a: &PrincipalName,
    a_realm: &str,
    b: &PrincipalName,
    b_realm: &str,
) -> bool {
    return a_realm == b_realm && a.name_string == b.name_string;
}

/// Copy of `old_server` carried over to `realm`. For a TGS principal the
/// crossed-into realm lives in the second component too, so it is
/// replaced along with the realm.
pub fn rewrite_server_realm(
    old_server: &PrincipalName,
    realm: &str,
    tgs: bool,
) -> PrincipalName {
    let mut server = old_server.clone();
    if tgs && server.name_string.len() >= 2 {
        server.name_string[1] = realm.to_string();
    }
    return server;
}

/// Resolve the principal the AS-REQ asks a ticket for. An explicit
/// service keeps its components but is forced into the client realm; the
/// default is the client realm's own TGS.
pub fn build_in_tkt_name(
    in_tkt_service: Option<&str>,
    client_realm: &str,
) -> PrincipalName {
    match in_tkt_service {
        Some(service) => {
            let name = match service.rfind('@') {
                Some(at) => &service[..at],
                None => service,
            };
            let parts = spn_to_service_parts(name);
            let name_type = if parts.len() > 1 {
                principal_names::NT_SRV_INST
            } else {
                principal_names::NT_PRINCIPAL
            };
            return PrincipalName {
                name_type,
                name_string: parts,
            };
        }
        None => {
            return tgt_principal(client_realm);
        }
    }
}

/// Default string-to-key salt: realm followed by every name component,
/// no separators.
pub fn principal2salt(realm: &str, principal: &PrincipalName) -> Vec<u8> {
    let mut salt = realm.to_string();
    for component in principal.name_string.iter() {
        salt.push_str(component);
    }
    return salt.into_bytes();
}

/// Printable form of a principal, for error messages.
pub fn unparse_name(principal: &PrincipalName, realm: &str) -> String {
    return format!("{}@{}", principal.name_string.join("/"), realm);
}
