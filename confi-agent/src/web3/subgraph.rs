//! ConfiPump subgraph queries (GraphQL over HTTP)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const TOKEN_CREATEDS_QUERY: &str = "query GetTokenData($creator: String) { tokenCreateds(where: { creator: $creator }) { ts creator token name symbol meta } }";

const ALL_TOKEN_CREATEDS_QUERY: &str =
    "query GetTokenData { tokenCreateds(where: {}) { ts creator token name symbol meta } }";

/// Token metadata as stored by the launcher: a JSON string, or a bare image reference
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TokenMeta {
    pub description: String,
    pub image: String,
    pub website: Option<String>,
    pub x: Option<String>,
    pub telegram: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    telegram: Option<String>,
}

pub fn parse_metadata(meta: &str) -> TokenMeta {
    match serde_json::from_str::<RawMeta>(meta) {
        Ok(raw) => TokenMeta {
            description: raw.description.unwrap_or_default(),
            image: raw
                .image
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| meta.to_string()),
            website: raw.website,
            x: raw.x,
            telegram: raw.telegram,
        },
        Err(_) => TokenMeta {
            image: meta.to_string(),
            ..Default::default()
        },
    }
}

/// A `TokenCreated` event indexed by the subgraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedToken {
    pub ts: String,
    pub creator: String,
    /// Token contract address
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub meta: TokenMeta,
}

#[derive(Debug, Deserialize)]
struct RawTokenCreated {
    ts: String,
    creator: String,
    token: String,
    name: String,
    symbol: String,
    #[serde(default)]
    meta: String,
}

impl From<RawTokenCreated> for CreatedToken {
    fn from(raw: RawTokenCreated) -> Self {
        CreatedToken {
            meta: parse_metadata(&raw.meta),
            ts: raw.ts,
            creator: raw.creator,
            token: raw.token,
            name: raw.name,
            symbol: raw.symbol,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<TokenCreatedsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenCreatedsData {
    token_createds: Vec<RawTokenCreated>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

fn parse_token_createds(body: &str) -> Result<Vec<CreatedToken>, String> {
    let response: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse subgraph response: {}", e))?;

    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(format!("Subgraph errors: {}", messages.join("; ")));
    }

    response
        .data
        .map(|d| d.token_createds.into_iter().map(CreatedToken::from).collect())
        .ok_or_else(|| "Subgraph returned no data".to_string())
}

/// Source of launched ConfiPump tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// All launched tokens, or only those created by `creator`
    async fn created_tokens(&self, creator: Option<&str>) -> Result<Vec<CreatedToken>, String>;
}

pub struct SubgraphClient {
    url: String,
    http: reqwest::Client,
}

impl SubgraphClient {
    pub fn new(url: &str) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            url: url.to_string(),
            http,
        })
    }

    async fn query(&self, query: &str, variables: Value) -> Result<String, String> {
        log::debug!("[RECOMMEND] Subgraph query: {}", query);
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| format!("Subgraph request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("Subgraph error ({}): {}", status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl TokenSource for SubgraphClient {
    async fn created_tokens(&self, creator: Option<&str>) -> Result<Vec<CreatedToken>, String> {
        let body = match creator {
            Some(creator) => {
                self.query(TOKEN_CREATEDS_QUERY, json!({ "creator": creator }))
                    .await?
            }
            None => self.query(ALL_TOKEN_CREATEDS_QUERY, json!({})).await?,
        };
        parse_token_createds(&body)
    }
}

/// Fixed token list for tests
#[cfg(test)]
#[derive(Clone)]
pub struct MockTokenSource {
    result: Result<Vec<CreatedToken>, String>,
}

#[cfg(test)]
impl MockTokenSource {
    pub fn new(result: Result<Vec<CreatedToken>, String>) -> Self {
        Self { result }
    }

    pub fn token(address: &str, name: &str, symbol: &str, description: &str) -> CreatedToken {
        CreatedToken {
            ts: "1730000000".to_string(),
            creator: "0x0000000000000000000000000000000000000001".to_string(),
            token: address.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            meta: TokenMeta {
                description: description.to_string(),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TokenSource for MockTokenSource {
    async fn created_tokens(&self, creator: Option<&str>) -> Result<Vec<CreatedToken>, String> {
        let tokens = self.result.clone()?;
        Ok(match creator {
            Some(creator) => tokens.into_iter().filter(|t| t.creator == creator).collect(),
            None => tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata_json() {
        let meta = parse_metadata(r#"{"description":"cats on chain","image":"bafy123","x":"@pcat"}"#);
        assert_eq!(meta.description, "cats on chain");
        assert_eq!(meta.image, "bafy123");
        assert_eq!(meta.x.as_deref(), Some("@pcat"));
        assert_eq!(meta.website, None);
    }

    #[test]
    fn test_parse_metadata_plain_string() {
        let meta = parse_metadata("ipfs://bafy456");
        assert_eq!(meta.description, "");
        assert_eq!(meta.image, "ipfs://bafy456");
    }

    #[test]
    fn test_parse_token_createds() {
        let body = r#"{"data":{"tokenCreateds":[
            {"ts":"1730000000","creator":"0x01","token":"0xaa","name":"Pepe Cat","symbol":"PCAT",
             "meta":"{\"description\":\"cats\",\"image\":\"bafy\"}"}
        ]}}"#;
        let tokens = parse_token_createds(body).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "0xaa");
        assert_eq!(tokens[0].symbol, "PCAT");
        assert_eq!(tokens[0].meta.description, "cats");
    }

    #[test]
    fn test_parse_token_createds_errors() {
        let body = r#"{"data":null,"errors":[{"message":"indexer down"}]}"#;
        assert_eq!(
            parse_token_createds(body).unwrap_err(),
            "Subgraph errors: indexer down"
        );
        assert!(parse_token_createds("{}").is_err());
        assert!(parse_token_createds("not json").is_err());
    }
}
