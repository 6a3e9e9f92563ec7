//! Deterministic identifiers for memories, rooms and platform users.
//!
//! Every id is a name-based UUID over a string, so the same post seen twice
//! (or seen once and replied to once) always lands on the same record.

use sha1::{Digest, Sha1};
use uuid::{Builder, Uuid};

/// Stable UUID for an arbitrary string (SHA-1 digest, version 5 bits).
pub fn string_to_uuid(input: &str) -> Uuid {
    let digest = Sha1::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_sha1_bytes(bytes).into_uuid()
}

/// Memory id for a platform post as seen by one agent
pub fn memory_id(post_id: &str, agent_id: &Uuid) -> Uuid {
    string_to_uuid(&format!("{}-{}", post_id, agent_id))
}

/// Room id for a conversation as seen by one agent
pub fn room_id(conversation_id: &str, agent_id: &Uuid) -> Uuid {
    string_to_uuid(&format!("{}-{}", conversation_id, agent_id))
}

/// Internal user id for a post author.
///
/// The agent's own platform account maps to the agent id so its posts are
/// attributed to itself rather than to an anonymous user.
pub fn author_id(platform_user_id: &str, own_platform_id: &str, agent_id: &Uuid) -> Uuid {
    if platform_user_id == own_platform_id {
        *agent_id
    } else {
        string_to_uuid(platform_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_uuid_is_stable() {
        let a = string_to_uuid("1234567890");
        let b = string_to_uuid("1234567890");
        assert_eq!(a, b);
        assert_ne!(a, string_to_uuid("1234567891"));
        assert_eq!(a.get_version_num(), 5);
    }

    #[test]
    fn test_memory_id_scoped_by_agent() {
        let agent_a = string_to_uuid("agent-a");
        let agent_b = string_to_uuid("agent-b");
        assert_eq!(memory_id("42", &agent_a), memory_id("42", &agent_a));
        assert_ne!(memory_id("42", &agent_a), memory_id("42", &agent_b));
        assert_eq!(
            memory_id("42", &agent_a),
            string_to_uuid(&format!("42-{}", agent_a))
        );
    }

    #[test]
    fn test_author_mapping() {
        let agent = string_to_uuid("confi");
        assert_eq!(author_id("1500", "1500", &agent), agent);
        assert_eq!(author_id("77", "1500", &agent), string_to_uuid("77"));
    }
}
