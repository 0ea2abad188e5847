//! Configuration structure
// (c) 2024 Ross Younger

use serde::{Deserialize, Serialize};

/// The set of configurable options supported by skiff.
///
/// `default()` returns the hard-wired configuration defaults. Fields with
/// an empty-string default mean "work it out at run time": the username
/// falls back to the local login name, and an empty identity means the ssh
/// agent and the standard key files are tried.
// Maintainer note: None of the members of this struct should be Option<anything>;
// "unset" is expressed in-band so that the merge logic stays uniform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    /// TCP port the remote ssh daemon listens on.
    pub port: u16,
    /// Socket timeout in seconds, applied to connect, reads and writes.
    pub timeout: u16,
    /// Private key file used for authentication.
    pub identity: String,
    /// Login name on the remote.
    pub username: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            port: 22,
            timeout: 10,
            identity: String::new(),
            username: String::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Configuration;

    #[test]
    fn defaults_are_sane() {
        let config = Configuration::default();
        assert_eq!(config.port, 22);
        assert_ne!(config.timeout, 0);
        assert!(config.username.is_empty());
    }
}
