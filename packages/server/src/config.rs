//! Per-contract configuration and the admin-gated config store.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use snapvote_core::Address;

use crate::error::ConfigError;
use crate::hexutil::{encode_address, hex_address};

/// A remote ledger the service can reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRef {
    pub chain_id: u64,
    pub network_name: String,
}

/// Opaque descriptor of how to reach a chain. Only the URL matters to the
/// JSON-RPC client; everything else about the transport is its business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcService {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractType {
    Erc20,
    Erc721,
    Other(String),
}

/// Snapshot configuration for one token contract. A proposal may reference a
/// contract only if a config exists and `enabled` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotContractConfig {
    #[serde(with = "hex_address")]
    pub contract_address: Address,
    pub chain: ChainRef,
    pub rpc_service: RpcService,
    pub contract_type: ContractType,
    pub balance_storage_slot: u64,
    pub enabled: bool,
}

/// Configuration gating which contracts may be targets of executed
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContractConfig {
    #[serde(with = "hex_address")]
    pub contract_address: Address,
    pub chain: ChainRef,
    pub rpc_service: RpcService,
    pub enabled: bool,
}

/// Admin-mutated configuration state. Every mutator takes the caller
/// explicitly; there is no ambient identity.
#[derive(Debug, Default)]
pub struct ConfigStore {
    snapshot_contracts: BTreeMap<Address, SnapshotContractConfig>,
    execution_contracts: BTreeMap<Address, ExecutionContractConfig>,
    admins: HashSet<Address>,
}

impl ConfigStore {
    pub fn new(initial_admins: impl IntoIterator<Item = Address>) -> Self {
        Self {
            snapshot_contracts: BTreeMap::new(),
            execution_contracts: BTreeMap::new(),
            admins: initial_admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admins.contains(caller)
    }

    fn require_admin(&self, caller: &Address) -> Result<(), ConfigError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(ConfigError::Unauthorized)
        }
    }

    /// Insert, replace or (with `None`) delete a snapshot contract config.
    pub fn update_snapshot_contract(
        &mut self,
        caller: &Address,
        address: Address,
        config: Option<SnapshotContractConfig>,
    ) -> Result<(), ConfigError> {
        self.require_admin(caller)?;
        match config {
            Some(config) => {
                self.snapshot_contracts.insert(address, config);
            }
            None => {
                self.snapshot_contracts.remove(&address);
            }
        }
        Ok(())
    }

    pub fn snapshot_contract(&self, address: &Address) -> Option<&SnapshotContractConfig> {
        self.snapshot_contracts.get(address)
    }

    pub fn snapshot_contracts(&self) -> impl Iterator<Item = &SnapshotContractConfig> {
        self.snapshot_contracts.values()
    }

    /// Look up a snapshot contract config, requiring it to exist and be
    /// enabled.
    pub fn approved_snapshot_contract(
        &self,
        address: &Address,
    ) -> Result<&SnapshotContractConfig, ConfigError> {
        let config = self
            .snapshot_contracts
            .get(address)
            .ok_or_else(|| ConfigError::ContractNotApproved(encode_address(address)))?;
        if !config.enabled {
            return Err(ConfigError::ContractDisabled(encode_address(address)));
        }
        Ok(config)
    }

    pub fn update_execution_contract(
        &mut self,
        caller: &Address,
        address: Address,
        config: Option<ExecutionContractConfig>,
    ) -> Result<(), ConfigError> {
        self.require_admin(caller)?;
        match config {
            Some(config) => {
                self.execution_contracts.insert(address, config);
            }
            None => {
                self.execution_contracts.remove(&address);
            }
        }
        Ok(())
    }

    pub fn execution_contracts(&self) -> impl Iterator<Item = &ExecutionContractConfig> {
        self.execution_contracts.values()
    }

    pub fn approved_execution_contract(
        &self,
        address: &Address,
    ) -> Result<&ExecutionContractConfig, ConfigError> {
        let config = self
            .execution_contracts
            .get(address)
            .ok_or_else(|| ConfigError::ContractNotApproved(encode_address(address)))?;
        if !config.enabled {
            return Err(ConfigError::ContractDisabled(encode_address(address)));
        }
        Ok(config)
    }

    /// Add or remove an admin principal. The admin set can never become
    /// empty, which would lock all config mutation forever.
    pub fn update_admin(
        &mut self,
        caller: &Address,
        principal: Address,
        grant: bool,
    ) -> Result<(), ConfigError> {
        self.require_admin(caller)?;
        if grant {
            self.admins.insert(principal);
        } else {
            if self.admins.len() == 1 && self.admins.contains(&principal) {
                return Err(ConfigError::LastAdmin);
            }
            self.admins.remove(&principal);
        }
        Ok(())
    }

    pub fn admins(&self) -> impl Iterator<Item = &Address> {
        self.admins.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_config(address: Address, enabled: bool) -> SnapshotContractConfig {
        SnapshotContractConfig {
            contract_address: address,
            chain: ChainRef {
                chain_id: 31337,
                network_name: "localhost".into(),
            },
            rpc_service: RpcService {
                url: "http://127.0.0.1:8545".into(),
            },
            contract_type: ContractType::Erc20,
            balance_storage_slot: 1,
            enabled,
        }
    }

    const ADMIN: Address = [0xad; 20];
    const OUTSIDER: Address = [0x0f; 20];

    #[test]
    fn non_admin_cannot_mutate() {
        let mut store = ConfigStore::new([ADMIN]);
        let err = store
            .update_snapshot_contract(&OUTSIDER, [0xc0; 20], Some(test_config([0xc0; 20], true)))
            .unwrap_err();
        assert_eq!(err, ConfigError::Unauthorized);
        assert!(store.snapshot_contract(&[0xc0; 20]).is_none());
    }

    #[test]
    fn approved_requires_existence_and_enabled() {
        let mut store = ConfigStore::new([ADMIN]);

        assert!(matches!(
            store.approved_snapshot_contract(&[0xc0; 20]),
            Err(ConfigError::ContractNotApproved(_))
        ));

        store
            .update_snapshot_contract(&ADMIN, [0xc0; 20], Some(test_config([0xc0; 20], false)))
            .unwrap();
        assert!(matches!(
            store.approved_snapshot_contract(&[0xc0; 20]),
            Err(ConfigError::ContractDisabled(_))
        ));

        store
            .update_snapshot_contract(&ADMIN, [0xc0; 20], Some(test_config([0xc0; 20], true)))
            .unwrap();
        assert!(store.approved_snapshot_contract(&[0xc0; 20]).is_ok());
    }

    #[test]
    fn delete_with_none() {
        let mut store = ConfigStore::new([ADMIN]);
        store
            .update_snapshot_contract(&ADMIN, [0xc0; 20], Some(test_config([0xc0; 20], true)))
            .unwrap();
        store
            .update_snapshot_contract(&ADMIN, [0xc0; 20], None)
            .unwrap();
        assert!(store.snapshot_contract(&[0xc0; 20]).is_none());
    }

    #[test]
    fn admin_set_never_empties() {
        let mut store = ConfigStore::new([ADMIN]);
        assert_eq!(
            store.update_admin(&ADMIN, ADMIN, false).unwrap_err(),
            ConfigError::LastAdmin
        );

        store.update_admin(&ADMIN, OUTSIDER, true).unwrap();
        store.update_admin(&OUTSIDER, ADMIN, false).unwrap();
        assert!(!store.is_admin(&ADMIN));
        assert!(store.is_admin(&OUTSIDER));
    }
}
