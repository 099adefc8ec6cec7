use crate::data_sync::ledger::{AccountFilter, Commitment, KeyedAccount};
use crate::error::LedgerError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use solana_program::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// JSON-RPC over HTTP for account reads
#[derive(Debug, Clone)]
pub struct RpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    commitment: Commitment,
}

impl RpcClient {
    pub fn new(rpc_url: String, timeout: Duration, commitment: Commitment) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http_client, rpc_url, commitment })
    }

    /// `getAccountInfo` with base64 data. `None` when the account does not exist.
    pub async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let result = self
            .call(
                "getAccountInfo",
                json!([pubkey.to_string(), { "encoding": "base64", "commitment": self.commitment.to_string() }]),
            )
            .await?;

        parse_account_info(&result)
    }

    /// `getProgramAccounts` with base64 data and the given server-side filters.
    pub async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<KeyedAccount>, LedgerError> {
        let filters: Vec<Value> = filters.iter().map(AccountFilter::to_json).collect();
        let result = self
            .call(
                "getProgramAccounts",
                json!([
                    program_id.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.to_string(), "filters": filters }
                ]),
            )
            .await?;

        let accounts = parse_program_accounts(&result)?;
        debug!("getProgramAccounts {} returned {} accounts", program_id, accounts.len());
        Ok(accounts)
    }

    /// `getBalance` in lamports.
    pub async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError> {
        let result = self
            .call("getBalance", json!([pubkey.to_string(), { "commitment": self.commitment.to_string() }]))
            .await?;

        parse_balance(&result)
    }

    /// Issues one request and returns its `result`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let mut response_json: Value = response.json().await?;

        if let Some(error) = response_json.get("error") {
            return Err(LedgerError::from_rpc_error(error));
        }

        response_json
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| LedgerError::UnexpectedResponse(format!("missing result for {method}")))
    }
}

/// Extracts bytes from an account object's `data: [<base64>, "base64"]`.
pub(crate) fn decode_account_data(account: &Value) -> Result<Vec<u8>, LedgerError> {
    let data = account
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| LedgerError::UnexpectedResponse(format!("account without data: {account}")))?;

    match (data.first().and_then(Value::as_str), data.get(1).and_then(Value::as_str)) {
        (Some(encoded), Some("base64")) => Ok(BASE64.decode(encoded)?),
        _ => Err(LedgerError::UnexpectedResponse(format!("unsupported account data encoding: {account}"))),
    }
}

/// `getAccountInfo` result: `{ context, value: null | account }`.
pub(crate) fn parse_account_info(result: &Value) -> Result<Option<Vec<u8>>, LedgerError> {
    match result.get("value") {
        None => Err(LedgerError::UnexpectedResponse(format!("account info without value: {result}"))),
        Some(Value::Null) => Ok(None),
        Some(account) => decode_account_data(account).map(Some),
    }
}

/// `getBalance` result: `{ context, value: <lamports> }`.
pub(crate) fn parse_balance(result: &Value) -> Result<u64, LedgerError> {
    result
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| LedgerError::UnexpectedResponse(format!("balance without value: {result}")))
}

/// `getProgramAccounts` result: `[{ pubkey, account }]`.
pub(crate) fn parse_program_accounts(result: &Value) -> Result<Vec<KeyedAccount>, LedgerError> {
    let entries = result
        .as_array()
        .ok_or_else(|| LedgerError::UnexpectedResponse(format!("program accounts is not a list: {result}")))?;

    entries.iter().map(parse_keyed_account).collect()
}

pub(crate) fn parse_keyed_account(entry: &Value) -> Result<KeyedAccount, LedgerError> {
    let pubkey = entry
        .get("pubkey")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::UnexpectedResponse(format!("keyed account without pubkey: {entry}")))?;
    let pubkey = Pubkey::from_str(pubkey).map_err(|e| LedgerError::InvalidPubkey(format!("{pubkey}: {e}")))?;
    let account = entry
        .get("account")
        .ok_or_else(|| LedgerError::UnexpectedResponse(format!("keyed account without account: {entry}")))?;

    Ok(KeyedAccount { pubkey, data: decode_account_data(account)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_json(data: &[u8]) -> Value {
        json!({
            "data": [BASE64.encode(data), "base64"],
            "executable": false,
            "lamports": 2_282_880,
            "owner": "3gE3AwSm9yVYCTSXHFiqWShzoU5vGjwTXJRL7WLz6vNv",
            "rentEpoch": 18_446_744_073_709_551_615u64,
            "space": data.len(),
        })
    }

    #[test]
    fn test_parse_account_info_present() {
        let result = json!({ "context": { "slot": 341_197_053 }, "value": account_json(&[1, 2, 3]) });
        assert_eq!(parse_account_info(&result).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_parse_account_info_absent() {
        let result = json!({ "context": { "slot": 341_197_053 }, "value": null });
        assert_eq!(parse_account_info(&result).unwrap(), None);
    }

    #[test]
    fn test_parse_account_info_rejects_other_encodings() {
        let result = json!({ "context": {}, "value": { "data": ["3Bxs4h24hBtQy9rw", "base58"] } });
        assert!(matches!(parse_account_info(&result), Err(LedgerError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_parse_balance() {
        let result = json!({ "context": { "slot": 1 }, "value": 1_250_000_000u64 });
        assert_eq!(parse_balance(&result).unwrap(), 1_250_000_000);
        assert!(parse_balance(&json!({ "context": { "slot": 1 }, "value": null })).is_err());
    }

    #[test]
    fn test_parse_program_accounts() {
        let key = Pubkey::new_from_array([7u8; 32]);
        let result = json!([{ "pubkey": key.to_string(), "account": account_json(&[4, 5]) }]);
        let accounts = parse_program_accounts(&result).unwrap();
        assert_eq!(accounts, vec![KeyedAccount { pubkey: key, data: vec![4, 5] }]);
    }

    #[test]
    fn test_parse_program_accounts_bad_pubkey() {
        let result = json!([{ "pubkey": "not-a-key", "account": account_json(&[]) }]);
        assert!(matches!(parse_program_accounts(&result), Err(LedgerError::InvalidPubkey(_))));
    }

    #[test]
    fn test_client_creation() {
        let client = RpcClient::new("https://api.devnet.solana.com".to_string(), Duration::from_secs(10), Commitment::Confirmed)
            .unwrap();
        assert_eq!(client.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(client.commitment, Commitment::Confirmed);
    }
}
