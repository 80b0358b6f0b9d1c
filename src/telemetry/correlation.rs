// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ids linking a recorded routing request to its response.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Random v4 id minted once per orchestrated request.
///
/// Stored as the hyphenated UUID string in the recording database and shown
/// by `switchyard recordings --id`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        let mut hex = self.0.simple().to_string();
        hex.truncate(8);
        hex
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CorrelationId").field(&self.short()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_ids_are_fresh() {
        let ids: std::collections::HashSet<_> = (0..64).map(|_| CorrelationId::new()).collect();
        assert_eq!(ids.len(), 64);
        assert_ne!(CorrelationId::default(), CorrelationId::default());
    }

    #[test]
    fn test_text_forms() {
        let id: CorrelationId = format!(" {} ", KNOWN).parse().unwrap();
        assert_eq!(id.to_string(), KNOWN);
        assert_eq!(id.short(), "550e8400");
        assert_eq!(format!("{:?}", id), "CorrelationId(\"550e8400\")");
        assert!("not-a-uuid".parse::<CorrelationId>().is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id: CorrelationId = KNOWN.parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", KNOWN));
        assert_eq!(serde_json::from_str::<CorrelationId>(&json).unwrap(), id);
    }
}
