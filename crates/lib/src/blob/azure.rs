//! Azure Blob Storage over its REST interface, authorized by a SAS token.

use super::{BlobProperties, BlobStore, ChunkStream};
use crate::{constants::BLOB_CHUNK_SIZE, errors::BlobError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    Client as ReqwestClient, RequestBuilder, Response, StatusCode,
};
use tracing::{debug, error};

const MS_VERSION_HEADER: &str = "x-ms-version";
const MS_RANGE_HEADER: &str = "x-ms-range";
const MS_VERSION: &str = "2021-08-06";

#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    client: ReqwestClient,
    container_url: String,
    sas_token: String,
}

impl AzureBlobStore {
    /// `container_url` is e.g. `https://<account>.blob.core.windows.net/<container>`.
    /// The SAS token may be given with or without its leading `?`.
    pub fn new(container_url: &str, sas_token: &str) -> Result<Self, BlobError> {
        let client = ReqwestClient::builder().build()?;
        Ok(Self {
            client,
            container_url: container_url.trim_end_matches('/').to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
        })
    }

    fn blob_url(&self, name: &str) -> String {
        let path = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if self.sas_token.is_empty() {
            format!("{}/{path}", self.container_url)
        } else {
            format!("{}/{path}?{}", self.container_url, self.sas_token)
        }
    }

    fn versioned(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(MS_VERSION_HEADER, MS_VERSION)
    }

    async fn get(&self, name: &str, range: Option<(u64, u64)>) -> Result<Bytes, BlobError> {
        let mut request = self.versioned(self.client.get(self.blob_url(name)));
        if let Some((start, end)) = range {
            request = request.header(MS_RANGE_HEADER, format!("bytes={start}-{end}"));
        }
        let response = check_status(name, request.send().await?).await?;
        Ok(response.bytes().await?)
    }
}

async fn check_status(name: &str, response: Response) -> Result<Response, BlobError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(BlobError::NotFound(name.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(blob = %name, status = %status, "Blob storage request failed");
        return Err(BlobError::Request(format!("status {status}: {body}")));
    }
    Ok(response)
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn properties(&self, name: &str) -> Result<Option<BlobProperties>, BlobError> {
        let response = self
            .versioned(self.client.head(self.blob_url(name)))
            .send()
            .await?;
        let response = match check_status(name, response).await {
            Ok(response) => response,
            Err(BlobError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let headers = response.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| BlobError::Request("missing content-length".to_string()))?;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(blob = %name, size, "Fetched blob properties");
        Ok(Some(BlobProperties { size, content_type }))
    }

    async fn read_range(&self, name: &str, start: u64, len: u64) -> Result<Bytes, BlobError> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        self.get(name, Some((start, start + len - 1))).await
    }

    async fn read_all(&self, name: &str) -> Result<Bytes, BlobError> {
        self.get(name, None).await
    }

    async fn stream_chunks(&self, name: &str) -> Result<ChunkStream, BlobError> {
        let size = self
            .properties(name)
            .await?
            .ok_or_else(|| BlobError::NotFound(name.to_string()))?
            .size;
        let store = self.clone();
        let name = name.to_string();

        Ok(Box::pin(async_stream::stream! {
            let mut offset = 0;
            while offset < size {
                let len = BLOB_CHUNK_SIZE.min(size - offset);
                match store.read_range(&name, offset, len).await {
                    Ok(chunk) => {
                        offset += len;
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_url_encodes_segments_and_appends_sas() {
        let store =
            AzureBlobStore::new("https://acct.blob.core.windows.net/docs/", "?sv=1&sig=x").unwrap();
        assert_eq!(
            store.blob_url("2024/利用 ガイド.pdf"),
            "https://acct.blob.core.windows.net/docs/2024/\
             %E5%88%A9%E7%94%A8%20%E3%82%AC%E3%82%A4%E3%83%89.pdf?sv=1&sig=x"
        );
    }
}
