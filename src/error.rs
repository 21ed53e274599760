use kerberos_asn1::KrbError;
use kerberos_constants::error_codes;
use std::fmt;
use std::io;
use std::result;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    String(String),

    /// Non-retriable error returned by the KDC.
    KrbError(KrbError),

    /// KDC_ERR_C_PRINCIPAL_UNKNOWN, enriched with the client principal.
    ClientNotFound(String),

    /// Errors due to IO, such as failures in network or file operations.
    IOError(String, io::Error),

    /// Errors related to handling of raw data, such as parsing, encrypting,
    /// etc.
    DataError(String),

    /// The AS-REP failed the integrity checks against the request.
    KdcRepModified,

    /// The AS-REP start time is too far from the local clock.
    KdcRepSkew,

    /// The client and server realms of the request differ.
    RealmMismatch,

    /// The exchange exceeded the maximum number of request/reply rounds.
    GetInTktLoop,

    /// Referral chasing exceeded the hop limit or the KDC sent an unusable
    /// WRONG_REALM error.
    WrongRealm,

    /// The KDC answered with a Kerberos v4 error packet.
    V4Reply,

    /// The response is neither a KRB-ERROR nor an AS-REP.
    MsgType,
}

impl Error {
    pub fn is_not_found_error(&self) -> bool {
        if let Error::IOError(_, ref io_err) = self {
            return io_err.kind() == io::ErrorKind::NotFound;
        }
        return false;
    }

    pub fn is_data_error(&self) -> bool {
        if let Error::DataError(_) = self {
            return true;
        }
        return false;
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::String(s) => write!(f, "{}", s),
            Error::DataError(s) => write!(f, "{}", s),
            Error::KrbError(krb_error) => {
                write!(f, "{}", create_krb_error_msg(krb_error))
            }
            Error::ClientNotFound(client) => {
                write!(f, "Client '{}' not found in Kerberos database", client)
            }
            Error::IOError(desc, io_error) => {
                write!(f, "{}: {}", desc, io_error)
            }
            Error::KdcRepModified => {
                write!(f, "KDC reply did not match the request")
            }
            Error::KdcRepSkew => {
                write!(f, "Clock skew too great in KDC reply")
            }
            Error::RealmMismatch => {
                write!(f, "Client and server realms do not match")
            }
            Error::GetInTktLoop => {
                write!(f, "Too many retries while getting initial credentials")
            }
            Error::WrongRealm => {
                write!(f, "Unusable realm referral from KDC")
            }
            Error::V4Reply => {
                write!(f, "KDC answered with a Kerberos v4 reply")
            }
            Error::MsgType => {
                write!(f, "Invalid message type from KDC")
            }
        }
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        return Self::String(error);
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        return Self::String(error.to_string());
    }
}

impl From<KrbError> for Error {
    fn from(error: KrbError) -> Self {
        return Self::KrbError(error);
    }
}

impl From<(&str, io::Error)> for Error {
    fn from(error: (&str, io::Error)) -> Self {
        return Self::IOError(error.0.into(), error.1);
    }
}

fn create_krb_error_msg(krb_error: &KrbError) -> String {
    let error_string = error_codes::error_code_to_string(krb_error.error_code);
    return format!("Error {}: {}", krb_error.error_code, error_string);
}
