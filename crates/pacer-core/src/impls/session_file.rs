//! FileSessionProvider - session cache file からセッションを読む
//!
//! ログインフロー自体はここでは扱わない。外部ツールが書いた JSON をそのまま
//! 不透明な [`Session`] として返すだけ。毎回読み直すので、ファイルが
//! 更新されれば次の `establish` で新しいセッションになる。

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Session, SourceError};
use crate::ports::SessionProvider;

#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    path: PathBuf,
}

impl FileSessionProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionProvider for FileSessionProvider {
    async fn establish(&self) -> Result<Session, SourceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(SourceError::Auth(format!(
                    "session file {} not found; log in to create it",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(SourceError::Transient(format!(
                    "failed to read session file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let raw: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::Auth(format!(
                "session file {} is not valid JSON: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), "session loaded");
        Ok(Session::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_the_cached_session() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"oauth2_token":{{"access_token":"abc"}}}}"#).unwrap();

        let provider = FileSessionProvider::new(file.path());
        let session = provider.establish().await.unwrap();
        assert_eq!(session.bearer_token(), Some("abc"));
    }

    #[tokio::test]
    async fn missing_file_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileSessionProvider::new(dir.path().join("session.json"));

        let err = provider.establish().await.unwrap_err();
        assert!(matches!(err, SourceError::Auth(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_auth_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let provider = FileSessionProvider::new(file.path());
        assert!(matches!(
            provider.establish().await,
            Err(SourceError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn rewritten_file_yields_a_new_session() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"access_token":"old"}"#).unwrap();
        let provider = FileSessionProvider::new(file.path());
        let first = provider.establish().await.unwrap();

        std::fs::write(file.path(), r#"{"access_token":"new"}"#).unwrap();
        let second = provider.establish().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(second.bearer_token(), Some("new"));
    }
}
