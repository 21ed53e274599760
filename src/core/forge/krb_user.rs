use super::principal::{new_nt_enterprise, new_nt_principal};
use kerberos_asn1::PrincipalName;
use std::convert::TryFrom;
use std::fmt;

/// The identity an exchange runs for: name plus realm.
#[derive(Clone, Debug, PartialEq)]
pub struct KrbUser {
    pub name: String,
    pub realm: String,
}

impl KrbUser {
    pub fn new(name: String, realm: String) -> Self {
        return Self { name, realm };
    }

    pub fn principal(&self) -> PrincipalName {
        return new_nt_principal(&self.name);
    }

    /// The single-component "name@realm" form used to let the KDC pick
    /// the realm.
    pub fn enterprise_principal(&self) -> PrincipalName {
        return new_nt_enterprise(&self.name, &self.realm);
    }
}

impl fmt::Display for KrbUser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.realm)
    }
}

impl TryFrom<&str> for KrbUser {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = value.split('@').collect();

        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(format!(
                "Invalid user '{}', it must be <username>@<REALM>",
                value
            ));
        }

        return Ok(KrbUser::new(parts[0].to_string(), parts[1].to_string()));
    }
}
