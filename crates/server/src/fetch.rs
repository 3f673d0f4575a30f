use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;

use chunkferry_transfer::{ChunkSource, SourceError, join_base};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches artifacts from a remote base URL over HTTP.
///
/// Blocking: construct, use and drop it on a blocking thread
/// (`tokio::task::spawn_blocking`), never directly on the async runtime.
pub struct HttpSource {
    base: String,
    client: Client,
}

impl HttpSource {
    /// Creates a source for `base`. Requests have no overall timeout, since
    /// a single chunk may be tens of megabytes.
    pub fn new(base: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("chunkferry/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| SourceError::Request(Box::new(e)))?;
        Ok(Self {
            base: base.into(),
            client,
        })
    }
}

impl ChunkSource for HttpSource {
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError> {
        let url = join_base(&self.base, name);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SourceError::Request(Box::new(e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                location: url,
            });
        }
        tracing::trace!(%url, "fetching artifact");
        Ok(Box::new(resp))
    }

    fn describe(&self) -> String {
        self.base.clone()
    }
}
