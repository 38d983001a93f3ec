use cideldill_codec::Cid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored bytes for `{cid}` do not hash back to that cid")]
    CidMismatch { cid: Cid },
    #[error("store backend error: {source}")]
    Backend {
        #[source]
        source: rusqlite::Error,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(source: rusqlite::Error) -> Self {
        StoreError::Backend { source }
    }
}
