use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a 16-character `[0-9A-Za-z]` token identifying one lock
/// acquisition. Collision-resistant per process is sufficient — this need
/// not be cryptographically secure.
pub fn generate_lock_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_16_char_alphanumeric_token() {
        let token = generate_lock_id();
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn two_tokens_are_virtually_never_equal() {
        let a = generate_lock_id();
        let b = generate_lock_id();
        assert_ne!(a, b);
    }
}
