//! Core domain types for node telemetry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

pub type Round = u64;
pub type MicroUnits = u64;

/// Microunits per whole unit of the native asset.
pub const MICROUNITS_PER_UNIT: u64 = 1_000_000;

/// Asset id used for the native asset in balance maps.
pub const PRIMARY_ASSET: u64 = 0;

/// Point-in-time node status, replaced wholesale on every successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStatusSnapshot {
    pub last_round: Round,
    pub time_since_last_round: Duration,
    /// Total time spent catching up since the node started.
    pub catchup_time: Duration,
    pub last_version: String,
    pub next_version: String,
    pub next_version_round: Round,
    pub next_version_supported: bool,
    /// Catchpoint label, empty when no catchpoint catchup is running.
    pub catchpoint: String,
    pub catchpoint_total_accounts: u64,
    pub catchpoint_processed_accounts: u64,
    pub catchpoint_verified_accounts: u64,
    pub catchpoint_total_blocks: u64,
    pub catchpoint_acquired_blocks: u64,
}

impl NodeStatusSnapshot {
    /// Whether the node is running a catchpoint catchup.
    pub fn catchpoint_active(&self) -> bool {
        !self.catchpoint.is_empty()
    }
}

/// Network identity reported by the node, fetched once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
    /// Formatted as `"<channel> <major>.<minor>.<build> (<commit>)"`.
    pub node_version: String,
}

impl NetworkInfo {
    /// False until the identity has been fetched.
    pub fn is_known(&self) -> bool {
        !self.genesis_id.is_empty()
    }

    /// Network name used by the catchpoint service, e.g. `mainnet` for `mainnet-v1.0`.
    pub fn network_name(&self) -> Option<&str> {
        if !self.is_known() {
            return None;
        }
        self.genesis_id.split('-').next().filter(|s| !s.is_empty())
    }
}

/// Protocol upgrade state carried by every block header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeState {
    #[serde(rename = "nextproto", skip_serializing_if = "String::is_empty")]
    pub next_protocol: String,
    #[serde(rename = "nextyes", skip_serializing_if = "is_zero")]
    pub next_protocol_approvals: u64,
    #[serde(rename = "nextbefore", skip_serializing_if = "is_zero")]
    pub next_protocol_vote_before: Round,
    #[serde(rename = "nextswitch", skip_serializing_if = "is_zero")]
    pub next_protocol_switch_on: Round,
}

impl UpgradeState {
    /// A non-empty upgrade state means a vote is open.
    pub fn is_voting(&self) -> bool {
        *self != UpgradeState::default()
    }
}

/// Block header fields the dashboard reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockHeader {
    #[serde(rename = "rnd")]
    pub round: Round,
    #[serde(rename = "gen", skip_serializing_if = "String::is_empty")]
    pub genesis_id: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "proto", skip_serializing_if = "String::is_empty")]
    pub current_protocol: String,
    #[serde(flatten)]
    pub upgrade: UpgradeState,
}

/// Kind of transaction, as tagged on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    #[serde(rename = "pay")]
    Payment,
    #[serde(rename = "keyreg")]
    KeyRegistration,
    #[serde(rename = "acfg")]
    AssetConfig,
    #[serde(rename = "axfer")]
    AssetTransfer,
    #[serde(rename = "afrz")]
    AssetFreeze,
    #[serde(rename = "appl")]
    ApplicationCall,
    #[serde(rename = "stpf")]
    StateProof,
    #[serde(rename = "hb")]
    Heartbeat,
    #[default]
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Payment => "pay",
            TxType::KeyRegistration => "keyreg",
            TxType::AssetConfig => "acfg",
            TxType::AssetTransfer => "axfer",
            TxType::AssetFreeze => "afrz",
            TxType::ApplicationCall => "appl",
            TxType::StateProof => "stpf",
            TxType::Heartbeat => "hb",
            TxType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Transaction body. Only the fields the dashboard reads are typed;
/// anything else on the wire is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: TxType,
    #[serde(rename = "snd")]
    pub sender: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub fee: MicroUnits,
    #[serde(rename = "fv", skip_serializing_if = "is_zero")]
    pub first_valid: Round,
    #[serde(rename = "lv", skip_serializing_if = "is_zero")]
    pub last_valid: Round,
    /// Base64 note bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "rcv", skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(rename = "amt", skip_serializing_if = "is_zero")]
    pub amount: MicroUnits,
    #[serde(rename = "close", skip_serializing_if = "Option::is_none")]
    pub close_remainder_to: Option<String>,
    #[serde(rename = "xaid", skip_serializing_if = "is_zero")]
    pub xfer_asset: u64,
    #[serde(rename = "aamt", skip_serializing_if = "is_zero")]
    pub asset_amount: u64,
    #[serde(rename = "arcv", skip_serializing_if = "Option::is_none")]
    pub asset_receiver: Option<String>,
    #[serde(rename = "caid", skip_serializing_if = "is_zero")]
    pub config_asset: u64,
    #[serde(rename = "faid", skip_serializing_if = "is_zero")]
    pub freeze_asset: u64,
    #[serde(rename = "apid", skip_serializing_if = "is_zero")]
    pub application_id: u64,
    #[serde(rename = "grp", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A transaction as it appears in a block's payset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignedTransaction {
    pub txn: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msig: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lsig: Option<serde_json::Value>,
    /// Application created by this transaction (apply data).
    #[serde(rename = "apid", skip_serializing_if = "is_zero")]
    pub created_application: u64,
    /// Asset created by this transaction (apply data).
    #[serde(rename = "caid", skip_serializing_if = "is_zero")]
    pub created_asset: u64,
}

impl SignedTransaction {
    pub fn signature_kind(&self) -> SignatureKind {
        if self.sig.as_deref().is_some_and(|s| !s.is_empty()) {
            SignatureKind::Ed25519
        } else if self.msig.as_ref().is_some_and(|v| !v.is_null()) {
            SignatureKind::Multisig
        } else if self.lsig.as_ref().is_some_and(|v| !v.is_null()) {
            SignatureKind::LogicSig
        } else {
            SignatureKind::Inner
        }
    }

    /// Asset id touched by an asset transaction, if any.
    pub fn asset_id(&self) -> Option<u64> {
        [
            self.txn.xfer_asset,
            self.created_asset,
            self.txn.config_asset,
            self.txn.freeze_asset,
        ]
        .into_iter()
        .find(|id| *id != 0)
    }

    /// Application id called or created, if any.
    pub fn application_id(&self) -> Option<u64> {
        [self.txn.application_id, self.created_application]
            .into_iter()
            .find(|id| *id != 0)
    }
}

/// How a transaction was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Ed25519,
    Multisig,
    LogicSig,
    /// No outer signature: the transaction was issued by an application.
    Inner,
}

impl SignatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureKind::Ed25519 => "ed25519",
            SignatureKind::Multisig => "msig",
            SignatureKind::LogicSig => "lsig",
            SignatureKind::Inner => "inner-txn",
        }
    }
}

/// A decoded block. The proposer comes from the certificate and is
/// filled in by the block codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    #[serde(rename = "txns", default)]
    pub payset: Vec<SignedTransaction>,
    #[serde(skip)]
    pub proposer: Option<String>,
}

impl Block {
    pub fn round(&self) -> Round {
        self.header.round
    }
}

/// Display row for one transaction, derived on drill-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub tx_type: TxType,
    pub sender: String,
    pub fee: MicroUnits,
    /// Payments in microunits, asset transfers in asset base units.
    pub amount: Option<u64>,
    pub signature: SignatureKind,
    pub has_note: bool,
}

impl From<&SignedTransaction> for TransactionRecord {
    fn from(stxn: &SignedTransaction) -> Self {
        let txn = &stxn.txn;
        let amount = match txn.tx_type {
            TxType::Payment => Some(txn.amount),
            TxType::AssetTransfer => Some(txn.asset_amount),
            _ => None,
        };
        Self {
            tx_type: txn.tx_type,
            sender: txn.sender.clone(),
            fee: txn.fee,
            amount,
            signature: stxn.signature_kind(),
            has_note: txn.note.as_deref().is_some_and(|n| !n.is_empty()),
        }
    }
}

/// Per-block aggregates shown in the block list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub round: Round,
    pub txn_count: usize,
    pub pay_count: usize,
    pub pay_total: MicroUnits,
    pub axfer_count: usize,
    pub acfg_count: usize,
    pub afrz_count: usize,
    pub unique_assets: usize,
    pub appl_count: usize,
    pub unique_apps: usize,
    pub proposer: Option<String>,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        let mut summary = BlockSummary {
            round: block.round(),
            txn_count: block.payset.len(),
            proposer: block.proposer.clone(),
            ..Default::default()
        };
        let mut assets = BTreeSet::new();
        let mut apps = BTreeSet::new();

        for stxn in &block.payset {
            match stxn.txn.tx_type {
                TxType::Payment => {
                    summary.pay_count += 1;
                    summary.pay_total = summary.pay_total.saturating_add(stxn.txn.amount);
                }
                TxType::ApplicationCall => {
                    summary.appl_count += 1;
                    apps.extend(stxn.application_id());
                }
                TxType::AssetTransfer | TxType::AssetConfig | TxType::AssetFreeze => {
                    match stxn.txn.tx_type {
                        TxType::AssetTransfer => summary.axfer_count += 1,
                        TxType::AssetConfig => summary.acfg_count += 1,
                        _ => summary.afrz_count += 1,
                    }
                    assets.extend(stxn.asset_id());
                }
                _ => {}
            }
        }

        summary.unique_assets = assets.len();
        summary.unique_apps = apps.len();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stxn(tx_type: TxType) -> SignedTransaction {
        SignedTransaction {
            txn: Transaction {
                tx_type,
                sender: "SENDER".to_string(),
                fee: 1000,
                ..Default::default()
            },
            sig: Some("c2ln".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_network_name_from_genesis_id() {
        let info = NetworkInfo {
            genesis_id: "testnet-v1.0".to_string(),
            ..Default::default()
        };
        assert_eq!(info.network_name(), Some("testnet"));
        assert_eq!(NetworkInfo::default().network_name(), None);
    }

    #[test]
    fn test_upgrade_state_default_is_not_voting() {
        assert!(!UpgradeState::default().is_voting());
        let state = UpgradeState {
            next_protocol_vote_before: 100,
            ..Default::default()
        };
        assert!(state.is_voting());
    }

    #[test]
    fn test_signature_kind_precedence() {
        let mut t = stxn(TxType::Payment);
        assert_eq!(t.signature_kind(), SignatureKind::Ed25519);

        t.sig = None;
        t.msig = Some(serde_json::json!({"v": 1}));
        assert_eq!(t.signature_kind(), SignatureKind::Multisig);

        t.msig = None;
        t.lsig = Some(serde_json::json!({"l": "AQ=="}));
        assert_eq!(t.signature_kind(), SignatureKind::LogicSig);

        t.lsig = None;
        assert_eq!(t.signature_kind(), SignatureKind::Inner);
        assert_eq!(SignatureKind::Inner.as_str(), "inner-txn");
    }

    #[test]
    fn test_transaction_record_amounts() {
        let mut pay = stxn(TxType::Payment);
        pay.txn.amount = 5_000_000;
        let record = TransactionRecord::from(&pay);
        assert_eq!(record.amount, Some(5_000_000));
        assert!(!record.has_note);

        let mut axfer = stxn(TxType::AssetTransfer);
        axfer.txn.asset_amount = 42;
        axfer.txn.note = Some("aGk=".to_string());
        let record = TransactionRecord::from(&axfer);
        assert_eq!(record.amount, Some(42));
        assert!(record.has_note);

        let record = TransactionRecord::from(&stxn(TxType::ApplicationCall));
        assert_eq!(record.amount, None);
    }

    #[test]
    fn test_block_summary_counts() {
        let mut pay1 = stxn(TxType::Payment);
        pay1.txn.amount = 1_000_000;
        let mut pay2 = stxn(TxType::Payment);
        pay2.txn.amount = 2_500_000;
        let mut axfer = stxn(TxType::AssetTransfer);
        axfer.txn.xfer_asset = 31566704;
        let mut axfer_same = stxn(TxType::AssetTransfer);
        axfer_same.txn.xfer_asset = 31566704;
        let mut acfg_create = stxn(TxType::AssetConfig);
        acfg_create.created_asset = 77;
        let mut appl = stxn(TxType::ApplicationCall);
        appl.txn.application_id = 9;
        let appl_create = stxn(TxType::ApplicationCall);

        let block = Block {
            header: BlockHeader {
                round: 12,
                ..Default::default()
            },
            payset: vec![pay1, pay2, axfer, axfer_same, acfg_create, appl, appl_create],
            proposer: Some("PROPOSER".to_string()),
        };

        let summary = BlockSummary::from(&block);
        assert_eq!(summary.round, 12);
        assert_eq!(summary.txn_count, 7);
        assert_eq!(summary.pay_count, 2);
        assert_eq!(summary.pay_total, 3_500_000);
        assert_eq!(summary.axfer_count, 2);
        assert_eq!(summary.acfg_count, 1);
        assert_eq!(summary.afrz_count, 0);
        assert_eq!(summary.unique_assets, 2);
        assert_eq!(summary.appl_count, 2);
        assert_eq!(summary.unique_apps, 1);
        assert_eq!(summary.proposer.as_deref(), Some("PROPOSER"));
    }

    #[test]
    fn test_block_deserializes_leniently() {
        let json = r#"{
            "rnd": 5,
            "proto": "https://github.com/algorandfoundation/specs/tree/abc",
            "nextbefore": 9000,
            "nextyes": 12,
            "unknown-field": [1, 2, 3],
            "txns": [
                {"txn": {"type": "pay", "snd": "AAA", "amt": 7, "fee": 1000}, "sig": "c2ln"},
                {"txn": {"type": "zzz", "snd": "BBB"}, "hgi": true}
            ]
        }"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block.round(), 5);
        assert_eq!(block.header.upgrade.next_protocol_vote_before, 9000);
        assert_eq!(block.header.upgrade.next_protocol_approvals, 12);
        assert_eq!(block.payset.len(), 2);
        assert_eq!(block.payset[0].txn.tx_type, TxType::Payment);
        assert_eq!(block.payset[1].txn.tx_type, TxType::Unknown);
        assert_eq!(block.payset[1].signature_kind(), SignatureKind::Inner);
    }

    #[test]
    fn test_transaction_serialization_omits_empty_fields() {
        let t = stxn(TxType::Payment);
        let value = serde_json::to_value(&t).unwrap();
        let txn = value.get("txn").unwrap();
        assert_eq!(txn.get("type").unwrap(), "pay");
        assert!(txn.get("amt").is_none());
        assert!(value.get("msig").is_none());
    }
}
