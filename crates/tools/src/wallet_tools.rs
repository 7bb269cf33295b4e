//! Tools acting with the agent's own wallet.
//!
//! Each tool is a thin adapter from validated JSON arguments to a
//! [`WalletBackend`] call; the observation text is what the model sees.

use async_trait::async_trait;
use npcrelay_core::error::{ToolError, WalletError};
use npcrelay_core::tool::{Tool, ToolResult};
use npcrelay_core::wallet::{TxReceipt, WalletBackend};
use std::sync::Arc;

fn failed(tool_name: &str, e: WalletError) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    }
}

fn str_arg<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

fn describe_receipt(receipt: &TxReceipt) -> String {
    match &receipt.transaction_link {
        Some(link) => format!("Transaction hash: {}\nTransaction link: {link}", receipt.transaction_hash),
        None => format!("Transaction hash: {}", receipt.transaction_hash),
    }
}

pub struct GetWalletDetailsTool {
    wallet: Arc<dyn WalletBackend>,
}

impl GetWalletDetailsTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for GetWalletDetailsTool {
    fn name(&self) -> &str {
        "get_wallet_details"
    }

    fn description(&self) -> &str {
        "Get the details of the agent's wallet: wallet id, network and default address."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let details = self.wallet.details().await.map_err(|e| failed(self.name(), e))?;
        let output = format!(
            "Wallet: {} on network: {} with default address: {}",
            details.wallet_id, details.network, details.default_address
        );
        Ok(ToolResult::ok(output).with_data(serde_json::to_value(&details).unwrap_or_default()))
    }
}

pub struct GetBalanceTool {
    wallet: Arc<dyn WalletBackend>,
}

impl GetBalanceTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for GetBalanceTool {
    fn name(&self) -> &str {
        "get_balance"
    }

    fn description(&self) -> &str {
        "Get the balance of an asset in the agent's wallet, e.g. 'eth' or 'usdc'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "asset_id": {
                    "type": "string",
                    "description": "The asset to check, e.g. 'eth', 'usdc'"
                }
            },
            "required": ["asset_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let asset_id = str_arg(&arguments, "asset_id")?;
        let balance = self
            .wallet
            .balance(asset_id)
            .await
            .map_err(|e| failed(self.name(), e))?;
        Ok(ToolResult::ok(format!("Balance of {}: {}", balance.asset_id, balance.amount))
            .with_data(serde_json::to_value(&balance).unwrap_or_default()))
    }
}

pub struct RequestFaucetFundsTool {
    wallet: Arc<dyn WalletBackend>,
}

impl RequestFaucetFundsTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for RequestFaucetFundsTool {
    fn name(&self) -> &str {
        "request_faucet_funds"
    }

    fn description(&self) -> &str {
        "Request test tokens from the faucet. Only available on base-sepolia. \
         Omit asset_id for native ETH, or pass 'usdc'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "asset_id": {
                    "type": "string",
                    "description": "Optional asset to request; defaults to ETH"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let asset_id = arguments["asset_id"].as_str();
        let receipt = self
            .wallet
            .request_faucet_funds(asset_id)
            .await
            .map_err(|e| failed(self.name(), e))?;
        let output = format!(
            "Received {} from the faucet.\n{}",
            asset_id.unwrap_or("ETH"),
            describe_receipt(&receipt)
        );
        Ok(ToolResult::ok(output).with_data(serde_json::to_value(&receipt).unwrap_or_default()))
    }
}

pub struct TransferTool {
    wallet: Arc<dyn WalletBackend>,
}

impl TransferTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for TransferTool {
    fn name(&self) -> &str {
        "transfer"
    }

    fn description(&self) -> &str {
        "Transfer an amount of an asset from the agent's wallet to a destination address or registered name."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "string",
                    "description": "Amount to transfer, as a decimal string"
                },
                "asset_id": {
                    "type": "string",
                    "description": "Asset to transfer, e.g. 'eth', 'usdc'"
                },
                "destination": {
                    "type": "string",
                    "description": "Destination address (0x...) or registered name"
                }
            },
            "required": ["amount", "asset_id", "destination"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let amount = str_arg(&arguments, "amount")?;
        let asset_id = str_arg(&arguments, "asset_id")?;
        let destination = str_arg(&arguments, "destination")?;

        tracing::info!(amount, asset_id, destination, "Transferring funds");
        let receipt = self
            .wallet
            .transfer(amount, asset_id, destination)
            .await
            .map_err(|e| failed(self.name(), e))?;

        let output = format!(
            "Transferred {amount} of {asset_id} to {destination}.\n{}",
            describe_receipt(&receipt)
        );
        Ok(ToolResult::ok(output).with_data(serde_json::to_value(&receipt).unwrap_or_default()))
    }
}

/// Register a name on the L2 name registry, owned by the agent by default.
pub struct RegisterBasenameTool {
    wallet: Arc<dyn WalletBackend>,
}

impl RegisterBasenameTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for RegisterBasenameTool {
    fn name(&self) -> &str {
        "register_basename"
    }

    fn description(&self) -> &str {
        "Register a basename (a human-readable label) that resolves to an address. \
         The owner defaults to the agent's own wallet address."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "basename": {
                    "type": "string",
                    "description": "The label to register, e.g. 'vera'"
                },
                "owner": {
                    "type": "string",
                    "description": "Optional owner address; defaults to the agent wallet"
                }
            },
            "required": ["basename"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let label = str_arg(&arguments, "basename")?.trim();
        if label.is_empty() {
            return Err(ToolError::InvalidArguments("basename must not be empty".into()));
        }

        let owner = match arguments["owner"].as_str() {
            Some(owner) => owner.to_string(),
            None => {
                self.wallet
                    .details()
                    .await
                    .map_err(|e| failed(self.name(), e))?
                    .default_address
            }
        };

        let receipt = self
            .wallet
            .register_name(label, &owner)
            .await
            .map_err(|e| failed(self.name(), e))?;

        let output = format!(
            "Successfully registered basename {label} for address {owner}.\n{}",
            describe_receipt(&receipt)
        );
        Ok(ToolResult::ok(output).with_data(serde_json::to_value(&receipt).unwrap_or_default()))
    }
}

/// Look up the address a registered label points at.
pub struct ResolveBasenameTool {
    wallet: Arc<dyn WalletBackend>,
}

impl ResolveBasenameTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for ResolveBasenameTool {
    fn name(&self) -> &str {
        "resolve_basename"
    }

    fn description(&self) -> &str {
        "Look up the address a registered basename resolves to."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "basename": { "type": "string", "description": "The label to look up" }
            },
            "required": ["basename"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let label = str_arg(&arguments, "basename")?;
        let address = self
            .wallet
            .resolve_name(label)
            .await
            .map_err(|e| failed(self.name(), e))?;
        let output = match &address {
            Some(addr) => format!("Label: {label}\nAddress: {addr}"),
            None => format!("Label {label} is not registered"),
        };
        Ok(ToolResult::ok(output).with_data(serde_json::json!({ "label": label, "address": address })))
    }
}
