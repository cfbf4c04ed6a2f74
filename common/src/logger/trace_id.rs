use std::fmt;

use uuid::Uuid;

/// Correlation ID that follows one publisher run from provisioning to release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceId(Uuid);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(TraceId::new(), TraceId::new());
    }

    #[test]
    fn displays_as_hyphenated_uuid() {
        let id = TraceId::new();
        let shown = id.to_string();

        assert_eq!(shown.len(), 36);
        assert_eq!(shown, id.as_uuid().to_string());
    }
}
