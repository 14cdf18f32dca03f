use {
    crate::chain::ChainId,
    alloy_primitives::Address,
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    std::{
        fmt::{self, Display, Formatter},
        str::FromStr,
    },
};

/// Identity of a Safe: its address on a specific chain.
///
/// The same address can be deployed on many chains, so the chain is always
/// part of the key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SafeRef {
    pub chain_id: ChainId,
    pub address: Address,
}

impl SafeRef {
    pub fn new(chain_id: ChainId, address: Address) -> Self {
        Self { chain_id, address }
    }
}

/// Formats as `<chainId>:<address>`, the form the gateway accepts in its
/// `safes` query parameter.
impl Display for SafeRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{:#x}", self.chain_id, self.address)
    }
}

impl FromStr for SafeRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (chain_id, address) = s
            .split_once(':')
            .context("expected <chainId>:<address>")?;
        Ok(Self {
            chain_id: chain_id.parse()?,
            address: address
                .parse()
                .with_context(|| format!("invalid Safe address {address:?}"))?,
        })
    }
}

/// Query parameters shared by every Safe of one gateway request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OverviewParams {
    /// Fiat currency the balances are denominated in, e.g. `usd`.
    pub currency: String,
    /// The connected wallet. The gateway uses it to count the transactions
    /// still awaiting this wallet's confirmation.
    pub wallet_address: Option<Address>,
}

impl OverviewParams {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            wallet_address: None,
        }
    }

    pub fn with_wallet(mut self, wallet_address: Address) -> Self {
        self.wallet_address = Some(wallet_address);
        self
    }
}

/// Aggregated financial and ownership summary of one Safe on one chain.
///
/// Only `address` and `chain_id` are interpreted by this crate, everything
/// else is forwarded untouched.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeOverview {
    pub address: AddressInfo,
    pub chain_id: ChainId,
    /// The remaining fields as sent by the gateway, e.g. `fiatTotal`,
    /// `owners`, `threshold`, `queued` and `awaitingConfirmation`.
    #[serde(flatten)]
    pub summary: Map<String, Value>,
}

impl SafeOverview {
    pub fn safe(&self) -> SafeRef {
        SafeRef::new(self.chain_id.clone(), self.address.value)
    }

    /// Whether this record describes the requested Safe. Both the address and
    /// the chain have to match, a record for the same address on another chain
    /// is a different Safe.
    pub fn is_for(&self, safe: &SafeRef) -> bool {
        self.address.value == safe.address && self.chain_id == safe.chain_id
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub value: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl From<Address> for AddressInfo {
    fn from(value: Address) -> Self {
        Self {
            value,
            name: None,
            logo_uri: None,
        }
    }
}
