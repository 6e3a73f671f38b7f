//! Principal identifiers: `user@client`, either half may be empty.

const REALM_SEP: char = '@';

/// The reserved client identifier. Only `@SERVICE_SERVER_ID` may request
/// the service-server secret key.
pub const SERVICE_SERVER_ID: &str = "SERVICE_SERVER_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
    pub client: String,
}

impl Principal {
    /// Parses `user@client`. Either half may be empty; a missing `@`
    /// is treated as a pure-user principal with an empty client half.
    pub fn parse(id: &str) -> Self {
        match id.split_once(REALM_SEP) {
            Some((user, client)) => Self {
                user: user.to_owned(),
                client: client.to_owned(),
            },
            None => Self {
                user: id.to_owned(),
                client: String::new(),
            },
        }
    }

    pub fn unparse(&self) -> String {
        format!("{}{}{}", self.user, REALM_SEP, self.client)
    }

    pub fn is_user(&self) -> bool {
        !self.user.is_empty()
    }

    pub fn is_client(&self) -> bool {
        !self.client.is_empty()
    }

    pub fn is_service_server(&self) -> bool {
        self.user.is_empty() && self.client == SERVICE_SERVER_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pure_user() {
        let p = Principal::parse("alice@");
        assert_eq!(p.user, "alice");
        assert_eq!(p.client, "");
        assert!(p.is_user());
        assert!(!p.is_client());
    }

    #[test]
    fn parses_pure_client() {
        let p = Principal::parse("@front-door");
        assert_eq!(p.user, "");
        assert_eq!(p.client, "front-door");
        assert!(!p.is_user());
        assert!(p.is_client());
    }

    #[test]
    fn parses_service_server() {
        let p = Principal::parse("@SERVICE_SERVER_ID");
        assert!(p.is_service_server());
    }

    #[test]
    fn unparse_round_trips() {
        let id = "alice@client-1";
        assert_eq!(Principal::parse(id).unparse(), id);
    }

    #[test]
    fn no_separator_is_pure_user() {
        let p = Principal::parse("alice");
        assert_eq!(p.user, "alice");
        assert_eq!(p.client, "");
    }
}
