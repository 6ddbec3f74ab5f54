/// Shared secret accepted by the unauthenticated stock-check trigger.
#[derive(Clone)]
pub struct TriggerToken(String);

impl TriggerToken {
    /// `None` for an empty secret: an empty token would match an empty
    /// query parameter.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() { None } else { Some(Self(secret)) }
    }

    /// Compare without short-circuiting on the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl core::fmt::Debug for TriggerToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TriggerToken(***)")
    }
}
