//! Meme token launches on Conflux eSpace.
//!
//! The factory contract is described by an ABI file in the same format as the
//! other ABI files the agent ships (`{name, description, abi, address}`).
//! Launch flow: pin the image through the helper service, call
//! `newToken(name, symbol, meta)` with the creation fee, wait for the receipt,
//! read the new token address from the factory's `TokenCreated` event.

use async_trait::async_trait;
use ethers::abi::{Abi, RawLog, Token};
use ethers::prelude::*;
use ethers::types::{Address, Bytes, Log, TransactionRequest, U64};
use ethers::utils::parse_ether;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MemeConfig;

pub mod subgraph;

pub use subgraph::{SubgraphClient, TokenSource};

pub const CONFLUX_ESPACE_CHAIN_ID: u64 = 1030;
pub const CONFLUX_ESPACE_TESTNET_CHAIN_ID: u64 = 71;

/// Creation fee sent with `newToken`, in CFX
const NEW_TOKEN_VALUE: &str = "10";

/// Delay before asking the helper to pin the image on IPFS
const IPFS_UPLOAD_DELAY: Duration = Duration::from_secs(90);

const NEW_TOKEN_FUNCTION: &str = "newToken";
const TOKEN_CREATED_EVENT: &str = "TokenCreated";

/// ABI file structure
#[derive(Debug, Deserialize)]
pub struct AbiFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub abi: Vec<Value>,
    #[serde(default)]
    pub address: HashMap<String, String>,
}

pub fn load_abi(path: &Path) -> Result<AbiFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to load ABI '{}': {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse ABI '{}': {}", path.display(), e))
}

/// Parse ethers Abi from our ABI file format
pub fn parse_abi(abi_file: &AbiFile) -> Result<Abi, String> {
    let abi_json = serde_json::to_string(&abi_file.abi)
        .map_err(|e| format!("Failed to serialize ABI: {}", e))?;

    serde_json::from_str(&abi_json).map_err(|e| format!("Failed to parse ABI: {}", e))
}

pub fn chain_id(is_testnet: bool) -> u64 {
    if is_testnet {
        CONFLUX_ESPACE_TESTNET_CHAIN_ID
    } else {
        CONFLUX_ESPACE_CHAIN_ID
    }
}

/// Token parameters taken from the user's request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedToken {
    pub address: String,
    pub tx_hash: String,
}

/// Reply text after a successful launch
pub fn success_message(confi_pump_url: &str, name: &str, address: &str) -> String {
    format!(
        "Token {} created successfully!\nCheck: {}/tokens/{}",
        name,
        confi_pump_url.trim_end_matches('/'),
        address
    )
}

#[async_trait]
pub trait TokenLauncher: Send + Sync {
    async fn launch(&self, params: &TokenParams) -> Result<LaunchedToken, String>;
}

/// Calldata for `newToken(name, symbol, meta)`
pub fn encode_new_token(abi: &Abi, name: &str, symbol: &str, meta: &str) -> Result<Bytes, String> {
    let function = abi
        .function(NEW_TOKEN_FUNCTION)
        .map_err(|_| format!("Function '{}' not found in ABI", NEW_TOKEN_FUNCTION))?;

    function
        .encode_input(&[
            Token::String(name.to_string()),
            Token::String(symbol.to_string()),
            Token::String(meta.to_string()),
        ])
        .map(Bytes::from)
        .map_err(|e| format!("Failed to encode {}: {}", NEW_TOKEN_FUNCTION, e))
}

/// The `token` argument of the first `TokenCreated` event emitted by `contract`
pub fn token_from_logs(abi: &Abi, contract: Address, logs: &[Log]) -> Result<Address, String> {
    let event = abi
        .event(TOKEN_CREATED_EVENT)
        .map_err(|_| format!("Event '{}' not found in ABI", TOKEN_CREATED_EVENT))?;
    let signature = event.signature();

    for log in logs.iter().filter(|l| l.address == contract) {
        if log.topics.first() != Some(&signature) {
            continue;
        }
        let parsed = event
            .parse_log(RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            })
            .map_err(|e| format!("Failed to decode {} log: {}", TOKEN_CREATED_EVENT, e))?;

        for param in parsed.params {
            if param.name == "token" {
                if let Token::Address(address) = param.value {
                    return Ok(address);
                }
            }
        }
    }

    Err(format!("No {} event in transaction receipt", TOKEN_CREATED_EVENT))
}

#[derive(Debug, Deserialize)]
struct CidResponse {
    cid: Option<String>,
}

type ConfluxClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Launches tokens through the factory contract with a local signing key
pub struct EthersTokenLauncher {
    client: Arc<ConfluxClient>,
    contract: Address,
    abi: Abi,
    helper_url: String,
    http: reqwest::Client,
}

impl EthersTokenLauncher {
    pub fn new(config: &MemeConfig) -> Result<Self, String> {
        let rpc_url = config
            .rpc_url
            .as_deref()
            .ok_or("CONFLUX_ESPACE_RPC_URL not set")?;
        let private_key = config
            .private_key
            .as_deref()
            .ok_or("CONFLUX_ESPACE_PRIVATE_KEY not set")?;
        let contract_address = config
            .contract_address
            .as_deref()
            .ok_or("CONFLUX_MEME_CONTRACT_ADDRESS not set")?;
        let helper_url = config
            .helper_url
            .clone()
            .ok_or("CONFLUX_ELIZA_HELPER_URL not set")?;

        let chain_id = chain_id(config.is_testnet);
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| format!("Invalid RPC URL {}: {}", rpc_url, e))?;
        let wallet = private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map(|w| w.with_chain_id(chain_id))
            .map_err(|e| format!("Invalid private key: {}", e))?;
        let contract: Address = contract_address
            .parse()
            .map_err(|_| format!("Invalid contract address: {}", contract_address))?;
        let abi = parse_abi(&load_abi(&config.abi_path)?)?;

        log::info!(
            "[CREATE_MEME] Token launcher ready: wallet={:?} contract={:?} chain={}",
            wallet.address(),
            contract,
            chain_id
        );

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            contract,
            abi,
            helper_url: helper_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// Content id of the image, assigned by the helper service
    async fn image_cid(&self, image_url: &str) -> Result<String, String> {
        let response = self
            .http
            .post(format!("{}/api/getCID", self.helper_url))
            .json(&json!({ "imageUrl": image_url }))
            .send()
            .await
            .map_err(|e| format!("Failed to request image CID: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Image CID request failed: HTTP {}", response.status()));
        }

        let body: CidResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse image CID response: {}", e))?;
        body.cid
            .filter(|cid| !cid.is_empty())
            .ok_or_else(|| "Failed to get CID for the image".to_string())
    }

    fn schedule_ipfs_upload(&self, image_url: &str) {
        let http = self.http.clone();
        let url = format!("{}/api/uploadToIPFS", self.helper_url);
        let image_url = image_url.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(IPFS_UPLOAD_DELAY).await;
            match http
                .post(&url)
                .json(&json!({ "imageUrl": image_url }))
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    log::info!("[CREATE_MEME] Uploaded {} to IPFS", image_url)
                }
                Ok(resp) => log::warn!(
                    "[CREATE_MEME] IPFS upload of {} failed: HTTP {}",
                    image_url,
                    resp.status()
                ),
                Err(e) => log::warn!("[CREATE_MEME] IPFS upload of {} failed: {}", image_url, e),
            }
        });
    }
}

#[async_trait]
impl TokenLauncher for EthersTokenLauncher {
    async fn launch(&self, params: &TokenParams) -> Result<LaunchedToken, String> {
        let cid = self.image_cid(&params.image_url).await?;
        let meta = json!({ "description": params.description, "image": cid }).to_string();
        let data = encode_new_token(&self.abi, &params.name, &params.symbol, &meta)?;
        let value =
            parse_ether(NEW_TOKEN_VALUE).map_err(|e| format!("Invalid token fee: {}", e))?;

        let tx = TransactionRequest::new()
            .to(self.contract)
            .data(data)
            .value(value);

        log::info!(
            "[CREATE_MEME] Sending newToken({}, {}) to {:?}",
            params.name,
            params.symbol,
            self.contract
        );

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| format!("Failed to send transaction: {}", e))?;
        let tx_hash = pending.tx_hash();

        let receipt = pending
            .await
            .map_err(|e| format!("Failed waiting for transaction {:?}: {}", tx_hash, e))?
            .ok_or_else(|| format!("Transaction {:?} was dropped", tx_hash))?;

        if receipt.status == Some(U64::zero()) {
            return Err(format!("Transaction {:?} reverted", tx_hash));
        }

        let token = token_from_logs(&self.abi, self.contract, &receipt.logs)?;
        log::info!("[CREATE_MEME] Token {:?} created in {:?}", token, tx_hash);

        self.schedule_ipfs_upload(&params.image_url);

        Ok(LaunchedToken {
            address: format!("0x{}", hex::encode(token.as_bytes())),
            tx_hash: format!("0x{}", hex::encode(tx_hash.as_bytes())),
        })
    }
}

/// Launcher that records calls and returns a scripted result
#[cfg(test)]
#[derive(Clone)]
pub struct MockLauncher {
    result: Result<LaunchedToken, String>,
    calls: Arc<std::sync::Mutex<Vec<TokenParams>>>,
}

#[cfg(test)]
impl MockLauncher {
    pub fn new(result: Result<LaunchedToken, String>) -> Self {
        Self {
            result,
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> Vec<TokenParams> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl TokenLauncher for MockLauncher {
    async fn launch(&self, params: &TokenParams) -> Result<LaunchedToken, String> {
        self.calls.lock().unwrap().push(params.clone());
        self.result.clone()
    }
}
