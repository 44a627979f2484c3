use std::fmt;

use url::Url;

use crate::error::ResourceError;

/// An ingestion resource endpoint with its embedded access scope.
///
/// `https://account.queue.example.net/ingest-queue?sv=...&sig=...` parses to
/// account `account`, object name `ingest-queue` and the query string as the
/// access scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    url: Url,
    account: String,
    object_name: String,
}

impl ResourceUri {
    pub fn parse(raw: &str) -> Result<Self, ResourceError> {
        let invalid = |reason: &str| ResourceError::InvalidUri {
            uri: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        match url.scheme() {
            "https" | "s3" | "file" => {}
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        }

        let account = url
            .host_str()
            .map(|h| h.split('.').next().unwrap_or(h).to_string())
            .unwrap_or_default();

        let object_name = url
            .path_segments()
            .and_then(|mut segs| segs.find(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| invalid("missing object name"))?;

        Ok(Self {
            url,
            account,
            object_name,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Queue, container or table name.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Access scope (SAS / signed query), if any.
    pub fn access_scope(&self) -> Option<&str> {
        self.url.query().filter(|q| !q.is_empty())
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Immutable snapshot of discovered ingestion resources.
///
/// Replaced as a whole on refresh, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSet {
    pub queues: Vec<ResourceUri>,
    pub containers: Vec<ResourceUri>,
    pub tables: Vec<ResourceUri>,
}

impl ResourceSet {
    /// Parse every list, failing on the first malformed URI.
    pub fn from_urls(
        queues: &[String],
        containers: &[String],
        tables: &[String],
    ) -> Result<Self, ResourceError> {
        let parse_all = |urls: &[String]| {
            urls.iter()
                .map(|u| ResourceUri::parse(u))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            queues: parse_all(queues)?,
            containers: parse_all(containers)?,
            tables: parse_all(tables)?,
        })
    }

    pub fn status_table(&self) -> Option<&ResourceUri> {
        self.tables.first()
    }
}
