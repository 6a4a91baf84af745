use md5::{Digest, Md5};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_USERNAME: &str = "Player";
const OFFLINE_ACCESS_TOKEN: &str = "0";
const OFFLINE_USER_TYPE: &str = "legacy";

/// Locally generated identity used for every launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfflineIdentity {
    pub username: String,
    pub uuid: Uuid,
    pub access_token: String,
    pub user_type: String,
}

impl Default for OfflineIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME)
    }
}

impl OfflineIdentity {
    /// Blank names fall back to `Player`.
    pub fn new(username: &str) -> Self {
        let username = match username.trim() {
            "" => DEFAULT_USERNAME,
            name => name,
        };
        Self {
            username: username.to_string(),
            uuid: offline_uuid(username),
            access_token: OFFLINE_ACCESS_TOKEN.to_string(),
            user_type: OFFLINE_USER_TYPE.to_string(),
        }
    }

    /// UUID without dashes, as the game expects in `${auth_uuid}`.
    pub fn uuid_simple(&self) -> String {
        self.uuid.simple().to_string()
    }
}

/// Name-based (version 3) UUID of `OfflinePlayer:<username>`.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{}", username).as_bytes());
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_stable_and_name_based() {
        let a = offline_uuid("Steve");
        assert_eq!(a, offline_uuid("Steve"));
        assert_ne!(a, offline_uuid("Alex"));
        assert_eq!(a.get_version_num(), 3);
        assert_eq!(a.get_variant(), uuid::Variant::RFC4122);
    }

    #[test]
    fn uuid_keeps_digest_bits_outside_version_and_variant() {
        let digest = Md5::digest(b"OfflinePlayer:Steve");
        let bytes = *offline_uuid("Steve").as_bytes();
        assert_eq!(bytes[..6], digest[..6]);
        assert_eq!(bytes[6], (digest[6] & 0x0f) | 0x30);
        assert_eq!(bytes[8], (digest[8] & 0x3f) | 0x80);
        assert_eq!(bytes[9..], digest[9..]);
    }

    #[test]
    fn blank_username_becomes_default() {
        let identity = OfflineIdentity::new("   ");
        assert_eq!(identity.username, DEFAULT_USERNAME);
        assert_eq!(identity, OfflineIdentity::default());
        assert_eq!(identity.access_token, "0");
        assert_eq!(identity.user_type, "legacy");
        assert_eq!(identity.uuid_simple().len(), 32);
    }
}
