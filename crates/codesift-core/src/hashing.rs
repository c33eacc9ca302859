use sha2::{Digest, Sha256};

/// Stable hash used for embedding-failure text hashes and knowledge-graph
/// entity ids, so identifiers survive process restarts (spec §3 invariants
/// require stability across retries/reloads, which a random UUID cannot
/// provide).
pub fn stable_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        let a = stable_hash(&["com.example.Foo", "class", "Foo.java"]);
        let b = stable_hash(&["com.example.Foo", "class", "Foo.java"]);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_any_part() {
        let a = stable_hash(&["com.example.Foo", "class", "Foo.java"]);
        let b = stable_hash(&["com.example.Foo", "method", "Foo.java"]);
        assert_ne!(a, b);
    }
}
