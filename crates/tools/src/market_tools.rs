//! Market analytics tools: prediction bets, token analysis, token discovery.
//!
//! These are simulated. They return plausible, deterministic observations so
//! the agent can demonstrate multi-step market reasoning without touching
//! real contracts or indexers.

use async_trait::async_trait;
use npcrelay_core::error::ToolError;
use npcrelay_core::tool::{Tool, ToolResult};

const DEFAULT_METRICS: [&str; 4] = ["liquidity", "volume", "holders", "price_history"];

pub struct PredictionBetTool;

#[async_trait]
impl Tool for PredictionBetTool {
    fn name(&self) -> &str {
        "place_prediction_bet"
    }

    fn description(&self) -> &str {
        "Place a bet on a prediction market with specified position and amount"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "market_id": { "type": "string", "description": "The ID of the prediction market" },
                "position": {
                    "type": "string",
                    "enum": ["long", "short"],
                    "description": "'long' or 'short' position"
                },
                "amount": { "type": "number", "description": "Amount to bet in ETH" },
                "confidence": { "type": "integer", "description": "Confidence level (0-100)" }
            },
            "required": ["market_id", "position", "amount", "confidence"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let market_id = arguments["market_id"].as_str().unwrap_or_default();
        let position = arguments["position"].as_str().unwrap_or_default();
        let amount = arguments["amount"].as_f64().unwrap_or_default();
        let confidence = arguments["confidence"].as_i64().unwrap_or_default();

        if amount <= 0.0 {
            return Err(ToolError::InvalidArguments("amount must be positive".into()));
        }
        if !(0..=100).contains(&confidence) {
            return Err(ToolError::InvalidArguments(
                "confidence must be within 0-100".into(),
            ));
        }

        let output = format!(
            "Bet placed successfully:\nMarket: {market_id}\nPosition: {position}\nAmount: {amount} ETH\nConfidence: {confidence}%"
        );
        Ok(ToolResult::ok(output).with_data(serde_json::json!({
            "market_id": market_id,
            "position": position,
            "amount": amount,
            "confidence": confidence,
        })))
    }
}

pub struct TokenAnalysisTool;

#[async_trait]
impl Tool for TokenAnalysisTool {
    fn name(&self) -> &str {
        "analyze_token"
    }

    fn description(&self) -> &str {
        "Analyze a token's metrics and provide detailed insights"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "token_address": {
                    "type": "string",
                    "description": "The token contract address to analyze"
                },
                "metrics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Metrics to analyze (default: liquidity, volume, holders, price_history)"
                }
            },
            "required": ["token_address"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let token_address = arguments["token_address"].as_str().unwrap_or_default();
        let metrics: Vec<String> = match arguments["metrics"].as_array() {
            Some(list) if !list.is_empty() => list
                .iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect(),
            _ => DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
        };

        let mut output = format!("Token Analysis for {token_address}:\n");
        for metric in &metrics {
            output.push_str(&format!("- {}\n", describe_metric(metric)));
        }
        let risk = risk_assessment(token_address);
        output.push_str(&format!("\nAnalysis complete. Token appears to be {risk}."));

        Ok(ToolResult::ok(output).with_data(serde_json::json!({
            "token_address": token_address,
            "metrics": metrics,
            "risk": risk,
        })))
    }
}

fn describe_metric(metric: &str) -> String {
    match metric {
        "liquidity" => "Liquidity: Analyzing pool depth and stability".into(),
        "volume" => "Volume: Checking 24h trading volume".into(),
        "holders" => "Holders: Analyzing holder distribution".into(),
        "price_history" => "Price History: Examining price movements".into(),
        other => format!("{other}: No data source for this metric"),
    }
}

fn risk_assessment(token_address: &str) -> &'static str {
    const LEVELS: [&str; 3] = [
        "LOW RISK - Deep liquidity, broad holder base",
        "MEDIUM RISK - Moderate liquidity, growing holder base",
        "HIGH RISK - Thin liquidity, concentrated holders",
    ];
    let sum: usize = token_address.bytes().map(usize::from).sum();
    LEVELS[sum % LEVELS.len()]
}

pub struct TokenDiscoveryTool;

struct Listing {
    name: &'static str,
    address: &'static str,
    category: &'static str,
    liquidity_eth: f64,
    age_days: i64,
    holders: i64,
}

const LISTINGS: [Listing; 4] = [
    Listing {
        name: "Token A",
        address: "0x123...",
        category: "New DeFi protocol",
        liquidity_eth: 2000.0,
        age_days: 3,
        holders: 420,
    },
    Listing {
        name: "Token B",
        address: "0x456...",
        category: "GameFi project",
        liquidity_eth: 1500.0,
        age_days: 5,
        holders: 260,
    },
    Listing {
        name: "Token C",
        address: "0x789...",
        category: "DAO governance token",
        liquidity_eth: 3000.0,
        age_days: 6,
        holders: 1100,
    },
    Listing {
        name: "Token D",
        address: "0xabc...",
        category: "Memecoin",
        liquidity_eth: 400.0,
        age_days: 1,
        holders: 90,
    },
];

#[async_trait]
impl Tool for TokenDiscoveryTool {
    fn name(&self) -> &str {
        "discover_tokens"
    }

    fn description(&self) -> &str {
        "Find new tokens matching specified criteria"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "min_liquidity": { "type": "number", "description": "Minimum liquidity in ETH (default 1000)" },
                "max_age": { "type": "integer", "description": "Maximum age in days (default 7)" },
                "min_holders": { "type": "integer", "description": "Minimum number of holders (default 100)" }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let min_liquidity = arguments["min_liquidity"].as_f64().unwrap_or(1000.0);
        let max_age = arguments["max_age"].as_i64().unwrap_or(7);
        let min_holders = arguments["min_holders"].as_i64().unwrap_or(100);

        let matches: Vec<&Listing> = LISTINGS
            .iter()
            .filter(|l| {
                l.liquidity_eth >= min_liquidity && l.age_days <= max_age && l.holders >= min_holders
            })
            .collect();

        if matches.is_empty() {
            return Ok(ToolResult::ok("No tokens matched the criteria."));
        }

        let mut output = String::from("Discovered tokens matching criteria:\n");
        for (i, l) in matches.iter().enumerate() {
            output.push_str(&format!(
                "{}. {} ({}): {}, {} ETH liquidity\n",
                i + 1,
                l.name,
                l.address,
                l.category,
                l.liquidity_eth
            ));
        }
        output.push_str("\nDetailed analysis available using analyze_token tool.");

        let data: Vec<serde_json::Value> = matches
            .iter()
            .map(|l| serde_json::json!({ "name": l.name, "address": l.address }))
            .collect();
        Ok(ToolResult::ok(output).with_data(serde_json::Value::Array(data)))
    }
}
