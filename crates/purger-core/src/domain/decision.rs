//! Decision model: one Keep/Delete verdict per revealed asset.

use serde::{Deserialize, Serialize};

/// The verdict the user gave for one revealed asset.
///
/// We serialize as SCREAMING_SNAKE_CASE so logs and `--json` output read
/// KEEP / DELETE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Keep,
    Delete,
}

impl Decision {
    pub fn is_delete(self) -> bool {
        matches!(self, Decision::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serializes_as_screaming_case() {
        assert_eq!(serde_json::to_string(&Decision::Keep).unwrap(), "\"KEEP\"");
        assert_eq!(serde_json::to_string(&Decision::Delete).unwrap(), "\"DELETE\"");
    }
}
