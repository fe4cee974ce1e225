use secrecy::{ExposeSecret, SecretString};
use strum::{Display, EnumString};

/// Credentials for authenticating with a device's management API.
///
/// The REST API uses HTTP basic auth on every request; there is no login
/// round-trip, so the secret is kept for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Apply basic auth to a request builder.
    pub(crate) fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.username, Some(self.password.expose_secret()))
    }
}

/// Management API flavour exposed by the device.
///
/// Determines the URL layout of RPC endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiFlavor {
    /// On-box REST service (`system services rest`), port 3000/3443.
    #[default]
    OnBox,
    /// Junos Space / proxy in front of the device, rooted at `/api/junos`.
    Proxied,
}

impl ApiFlavor {
    /// The path of the RPC endpoint relative to the base URL.
    pub fn rpc_path(&self) -> &'static str {
        match self {
            Self::OnBox => "/rpc",
            Self::Proxied => "/api/junos/rpc",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flavor_parses_from_profile_strings() {
        assert_eq!("onbox".parse::<ApiFlavor>().unwrap(), ApiFlavor::OnBox);
        assert_eq!("Proxied".parse::<ApiFlavor>().unwrap(), ApiFlavor::Proxied);
        assert!("netconf".parse::<ApiFlavor>().is_err());
        assert_eq!(ApiFlavor::Proxied.rpc_path(), "/api/junos/rpc");
    }
}
