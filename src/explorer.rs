use crate::{
    abi,
    error::FeedError,
};
use alloy::primitives::Address;
use serde::Deserialize;
use std::{
    future::Future,
    time::Duration,
};

pub const DEFAULT_EXPLORER_URL: &str = "https://api.polygonscan.com/api";
const NO_RECORDS: &str = "No records found";

/// Anything that can answer "all `Roll` logs from block `n` to latest".
pub trait LogSource: Send + Sync + 'static {
    fn fetch_logs(
        &self,
        from_block: u64,
    ) -> impl Future<Output = Result<Vec<RawLog>, FeedError>> + Send;
}

/// One entry of an explorer `getLogs` result, still undecoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub time_stamp: Option<String>,
    pub transaction_hash: String,
}

#[derive(Deserialize)]
struct LogsResponseDto {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Clone)]
pub struct ExplorerClient {
    base_url: String,
    api_key: String,
    contract: Address,
    http: reqwest::Client,
}

impl ExplorerClient {
    /// Fails with `MissingCredential` when no usable API key is given, so the
    /// caller can mount a blocked feed instead of a polling one.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        contract: Address,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(FeedError::MissingCredential)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            api_key,
            contract,
            http,
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn get_logs(&self, from_block: u64) -> Result<Vec<RawLog>, FeedError> {
        let params = [
            ("module", "logs".to_string()),
            ("action", "getLogs".to_string()),
            ("address", self.contract.to_string()),
            ("fromBlock", from_block.to_string()),
            ("toBlock", "latest".to_string()),
            ("topic0", abi::roll_topic().to_string()),
            ("apikey", self.api_key.clone()),
        ];
        tracing::debug!(from_block, contract = %self.contract, "querying explorer logs");
        let res = self.http.get(&self.base_url).query(&params).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(FeedError::Upstream {
                message: format!("explorer responded with {status}"),
            });
        }
        parse_logs_response(&bytes)
    }
}

impl LogSource for ExplorerClient {
    fn fetch_logs(
        &self,
        from_block: u64,
    ) -> impl Future<Output = Result<Vec<RawLog>, FeedError>> + Send {
        self.get_logs(from_block)
    }
}

/// Interpret an Etherscan-style `getLogs` body.
pub fn parse_logs_response(body: &[u8]) -> Result<Vec<RawLog>, FeedError> {
    let dto: LogsResponseDto = serde_json::from_slice(body)
        .map_err(|e| FeedError::UnexpectedResponse(e.to_string()))?;

    if dto.status == "1" {
        return serde_json::from_value(dto.result)
            .map_err(|e| FeedError::UnexpectedResponse(e.to_string()));
    }

    // An empty range is reported as a failure by Etherscan-style APIs.
    let empty_result = dto.result.as_array().is_some_and(|r| r.is_empty());
    if empty_result && dto.message.starts_with(NO_RECORDS) {
        return Ok(Vec::new());
    }

    let message = match dto.result.as_str() {
        Some(detail) if !detail.is_empty() => format!("{} ({detail})", dto.message),
        _ => dto.message,
    };
    Err(FeedError::Upstream { message })
}
