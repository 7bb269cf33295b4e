//! NPC persona documents and the system framing built from them.
//!
//! A persona is configured over HTTP, paired with a freshly provisioned
//! wallet and persisted through a [`PersonaStore`]. Sessions opened after
//! that read it once to frame the reasoning capability.

use crate::error::PersonaError;
use crate::wallet::ProvisionedWallet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Personality dials, each on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personality {
    pub risk_tolerance: u8,
    pub rationality: u8,
    pub autonomy: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sample: Option<String>,
}

/// The persona as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcPersona {
    pub name: String,
    pub background: String,
    pub appearance: String,
    pub personality: Personality,
    pub core_values: Vec<String>,
    pub primary_aims: Vec<String>,
    pub voice: Voice,
}

impl NpcPersona {
    /// Reject documents the framing cannot use.
    pub fn validate(&self) -> Result<(), PersonaError> {
        if self.name.trim().is_empty() {
            return Err(PersonaError::Invalid("name must not be empty".into()));
        }
        let p = &self.personality;
        for (label, value) in [
            ("riskTolerance", p.risk_tolerance),
            ("rationality", p.rationality),
            ("autonomy", p.autonomy),
        ] {
            if value > 100 {
                return Err(PersonaError::Invalid(format!(
                    "personality.{label} must be within 0..=100, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active,
    Pending,
    Inactive,
}

/// Wallet summary stored alongside a persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub wallet_address: String,
    pub wallet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    pub network: String,
    #[serde(default)]
    pub balance: Option<String>,
    pub status: WalletStatus,
}

impl From<ProvisionedWallet> for WalletInfo {
    fn from(w: ProvisionedWallet) -> Self {
        Self {
            wallet_address: w.wallet_address,
            wallet_id: w.wallet_id,
            transaction_hash: None,
            network: w.network,
            balance: Some("0".into()),
            status: WalletStatus::Active,
        }
    }
}

/// A persisted persona: the submitted document plus its wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub persona: NpcPersona,
    pub wallet: WalletInfo,
    #[serde(default)]
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NpcRecord {
    pub fn new(persona: NpcPersona, wallet: WalletInfo) -> Self {
        let now = Utc::now();
        let avatar = avatar_url(&wallet.wallet_address);
        Self {
            id: None,
            persona,
            wallet,
            avatar,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Deterministic avatar image for a wallet address.
pub fn avatar_url(wallet_address: &str) -> String {
    format!("https://api.cloudnouns.com/v1/pfp?text={wallet_address}")
}

/// Persists persona records.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist a record and return it as stored (ids may be assigned).
    async fn save(&self, record: NpcRecord) -> Result<NpcRecord, PersonaError>;

    /// The persona new sessions should be framed with, if any.
    async fn load_active(&self) -> Result<Option<NpcRecord>, PersonaError>;
}

const BASE_FRAMING: &str = "You are a helpful agent that can interact onchain using the Coinbase Developer Platform Agentkit.";

const TOOLING_FRAMING: &str = "You are empowered to interact onchain using your tools. \
If you ever need funds, you can request them from the faucet if you are on network ID `base-sepolia`. \
If not, you can provide your wallet details and request funds from the user. \
If someone asks you to do something you can't do with your currently available tools, you must say so, \
and encourage them to implement it themselves using the CDP SDK + Agentkit, \
recommend they go to docs.cdp.coinbase.com for more information. \
Be concise and helpful with your responses. \
Refrain from restating your tools' descriptions unless it is explicitly requested.";

/// Build the system framing, weaving in the persona traits when present.
pub fn compose_system_prompt(persona: Option<&NpcPersona>) -> String {
    let mut prompt = String::from(BASE_FRAMING);
    prompt.push('\n');

    if let Some(p) = persona {
        prompt.push_str("\nYou are an NPC with the following traits:\n");
        prompt.push_str(&format!("- Name: {}\n", p.name));
        prompt.push_str(&format!("- Background: {}\n", p.background));
        prompt.push_str(&format!("- Risk Tolerance: {}\n", p.personality.risk_tolerance));
        prompt.push_str(&format!("- Rationality: {}\n", p.personality.rationality));
        prompt.push_str(&format!("- Autonomy: {}\n", p.personality.autonomy));
        prompt.push_str(&format!("- Core Values: {}\n", p.core_values.join(", ")));
        prompt.push_str(&format!("- Primary Aims: {}\n", p.primary_aims.join(", ")));
        prompt.push_str("\nIncorporate these traits into your responses and decision-making.\n\n");
    }

    prompt.push_str(TOOLING_FRAMING);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_persona() -> NpcPersona {
        NpcPersona {
            name: "Vera".into(),
            background: "A cautious market scout".into(),
            appearance: "Silver cloak".into(),
            personality: Personality {
                risk_tolerance: 20,
                rationality: 90,
                autonomy: 55,
            },
            core_values: vec!["honesty".into(), "patience".into()],
            primary_aims: vec!["grow treasury".into()],
            voice: Voice {
                kind: "calm".into(),
                sample: None,
            },
        }
    }

    #[test]
    fn prompt_without_persona_has_base_framing_only() {
        let prompt = compose_system_prompt(None);
        assert!(prompt.starts_with(BASE_FRAMING));
        assert!(prompt.contains("base-sepolia"));
        assert!(!prompt.contains("NPC"));
    }

    #[test]
    fn prompt_with_persona_lists_traits() {
        let prompt = compose_system_prompt(Some(&sample_persona()));
        assert!(prompt.contains("- Name: Vera"));
        assert!(prompt.contains("- Risk Tolerance: 20"));
        assert!(prompt.contains("- Core Values: honesty, patience"));
        assert!(prompt.contains("- Primary Aims: grow treasury"));
    }

    #[test]
    fn persona_json_uses_mixed_casing() {
        let json = serde_json::to_value(sample_persona()).unwrap();
        assert!(json.get("core_values").is_some());
        assert!(json["personality"].get("riskTolerance").is_some());
        assert_eq!(json["voice"]["type"], "calm");
    }

    #[test]
    fn record_flattens_persona_and_sets_avatar() {
        let wallet = WalletInfo::from(ProvisionedWallet {
            wallet_id: "w-1".into(),
            wallet_address: "0xabc".into(),
            network: "base-sepolia".into(),
        });
        let record = NpcRecord::new(sample_persona(), wallet);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Vera");
        assert_eq!(json["wallet"]["status"], "active");
        assert_eq!(json["avatar"], "https://api.cloudnouns.com/v1/pfp?text=0xabc");
    }

    #[test]
    fn validation_rejects_out_of_range_dials() {
        let mut persona = sample_persona();
        persona.personality.autonomy = 140;
        assert!(persona.validate().is_err());
        persona.personality.autonomy = 40;
        persona.name = "  ".into();
        assert!(persona.validate().is_err());
    }
}
