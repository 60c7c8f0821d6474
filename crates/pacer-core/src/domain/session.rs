//! Session - activity source 用の不透明なセッション
//!
//! 中身（session cache file の JSON）はコアからは見ない。
//! 解釈するのは adapter（`impls::connect_api`）だけ。

use serde::{Deserialize, Serialize};

/// Reusable session handle for the activity source.
///
/// Equality is structural so the poll loop can tell a freshly re-established
/// session apart from one the source has already rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(serde_json::Value);

impl Session {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    /// Bearer token stored in the session blob, if any.
    ///
    /// Accepts a top-level `access_token` or one nested under `oauth2_token`.
    pub fn bearer_token(&self) -> Option<&str> {
        self.0
            .get("access_token")
            .or_else(|| self.0.get("oauth2_token")?.get("access_token"))
            .and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_top_level_and_nested_tokens() {
        let flat = Session::new(json!({ "access_token": "abc" }));
        let nested = Session::new(json!({ "oauth2_token": { "access_token": "xyz" } }));
        let empty = Session::new(json!({ "cookies": [] }));

        assert_eq!(flat.bearer_token(), Some("abc"));
        assert_eq!(nested.bearer_token(), Some("xyz"));
        assert_eq!(empty.bearer_token(), None);
    }
}
