//! Channel namer (C2): pure functions mapping logical addresses to
//! transport channel strings. These names are the wire contract — they
//! MUST be bit-exact across implementations (spec.md §4.2, §6).

/// Broadcast channel for a topic: `gs.pub.<topic>`.
pub fn public(topic: &str) -> String {
    format!("gs.pub.{topic}")
}

/// Subscribe pattern matching every broadcast.
pub fn public_pattern() -> String {
    "gs.pub.*".to_string()
}

/// Per-identity channel (casts, requests, responses): `gs.<identity>.<topic>`.
pub fn identity(id: &str, topic: &str) -> String {
    format!("gs.{id}.{topic}")
}

/// Subscribe pattern matching everything addressed to `id`.
pub fn identity_pattern(id: &str) -> String {
    format!("gs.{id}.*")
}

/// Group channel: `gs.grp.<group_id>.<topic>`.
pub fn group(group_id: &str, topic: &str) -> String {
    format!("gs.grp.{group_id}.{topic}")
}

/// Subscribe pattern matching everything on a group's channel family.
pub fn group_pattern(group_id: &str) -> String {
    format!("gs.grp.{group_id}.*")
}

/// Match a channel name against a glob pattern whose only metacharacter is
/// `*` (matches zero or more characters, including further `.`), the
/// convention most pub/sub backends use for pattern subscriptions.
pub fn glob_match(pattern: &str, channel: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                inner(&pattern[1..], text)
                    || (!text.is_empty() && inner(pattern, &text[1..]))
            }
            Some(&c) => text.first() == Some(&c) && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), channel.as_bytes())
}
