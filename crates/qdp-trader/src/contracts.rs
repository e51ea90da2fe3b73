//! Contract static-data lookup.

use dashmap::DashMap;
use qdp_core::ContractInfo;

/// External source of contract static data.
pub trait ContractLookup: Send + Sync {
    /// Contract for `code`, optionally restricted to `exchange`.
    fn get_contract(&self, code: &str, exchange: Option<&str>) -> Option<ContractInfo>;
}

/// In-memory contract table keyed by code.
#[derive(Debug, Default)]
pub struct ContractTable {
    contracts: DashMap<String, ContractInfo>,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contracts(contracts: impl IntoIterator<Item = ContractInfo>) -> Self {
        let table = Self::new();
        for contract in contracts {
            table.insert(contract);
        }
        table
    }

    pub fn insert(&self, contract: ContractInfo) {
        self.contracts.insert(contract.code.clone(), contract);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl ContractLookup for ContractTable {
    fn get_contract(&self, code: &str, exchange: Option<&str>) -> Option<ContractInfo> {
        let contract = self.contracts.get(code)?;
        match exchange {
            Some(exchange) if !exchange.is_empty() && contract.exchange != exchange => None,
            _ => Some(contract.clone()),
        }
    }
}
