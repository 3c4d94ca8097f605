use std::fmt;

use renet::transport::NETCODE_USER_DATA_BYTES;
use serde::{Deserialize, Serialize};

const LEN_BYTES: usize = 8;

/// Player identity. Travels in the netcode user data when connecting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn from_string(name: String) -> Self {
        Username(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length-prefixed encoding; names longer than the netcode payload are
    /// cut at a character boundary.
    pub fn to_netcode_user_data(&self) -> [u8; NETCODE_USER_DATA_BYTES] {
        let mut user_data = [0u8; NETCODE_USER_DATA_BYTES];
        let mut len = self.0.len().min(NETCODE_USER_DATA_BYTES - LEN_BYTES);
        while !self.0.is_char_boundary(len) {
            len -= 1;
        }
        user_data[0..LEN_BYTES].copy_from_slice(&(len as u64).to_le_bytes());
        user_data[LEN_BYTES..len + LEN_BYTES].copy_from_slice(&self.0.as_bytes()[..len]);
        user_data
    }

    pub fn from_user_data(user_data: &[u8; NETCODE_USER_DATA_BYTES]) -> Self {
        let mut buffer = [0u8; LEN_BYTES];
        buffer.copy_from_slice(&user_data[0..LEN_BYTES]);
        let len = (u64::from_le_bytes(buffer) as usize).min(NETCODE_USER_DATA_BYTES - LEN_BYTES);
        let data = &user_data[LEN_BYTES..len + LEN_BYTES];
        Username(String::from_utf8_lossy(data).into_owned())
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Username(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::user_name::Username;

    #[test]
    fn user_data_should_round_trip_the_name() {
        let name = Username::from("alice");
        let data = name.to_netcode_user_data();
        assert_eq!(Username::from_user_data(&data), name);
    }

    #[test]
    fn user_data_should_truncate_long_names() {
        let name = Username::from_string("x".repeat(400));
        let decoded = Username::from_user_data(&name.to_netcode_user_data());
        assert_eq!(decoded.as_str().len(), 248);
    }
}
