use alloy::{
    network::EthereumWallet,
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{BlockNumberOrTag, Filter},
    sol,
    sol_types::SolEvent,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::fmt;
use crate::config::{Config, ContractAddresses};
use crate::errors::CliError;
use crate::metrics::{BountyEvent, BountyHistory};
use crate::units::permille_to_percent;

sol! {
    #[sol(rpc)]
    interface ValidatorService {
        struct Validator {
            string name;
            address validatorAddress;
            address requestedAddress;
            string description;
            uint256 feeRate;
            uint256 registrationTime;
            uint256 minimumDelegationAmount;
            bool acceptNewRequests;
        }

        function registerValidator(
            string calldata name,
            string calldata description,
            uint256 feeRate,
            uint256 minimumDelegationAmount
        ) external returns (uint256 validatorId);
        function getValidator(uint256 validatorId) external view returns (Validator memory);
        function numberOfValidators() external view returns (uint256);
        function getTrustedValidators() external view returns (uint256[] memory);
        function validatorExists(uint256 validatorId) external view returns (bool);
        function getValidatorId(address validatorAddress) external view returns (uint256);
        function getNodeAddresses(uint256 validatorId) external view returns (address[] memory);
        function getAndUpdateBondAmount(uint256 validatorId) external returns (uint256);
        function linkNodeAddress(address nodeAddress, bytes calldata sig) external;
        function unlinkNodeAddress(address nodeAddress) external;
        function setValidatorMDA(uint256 minimumDelegationAmount) external;
        function requestForNewAddress(address newValidatorAddress) external;
        function confirmNewAddress(uint256 validatorId) external;
        function setValidatorName(string calldata newName) external;
        function setValidatorDescription(string calldata newDescription) external;
    }
}

sol! {
    #[sol(rpc)]
    interface DelegationController {
        struct Delegation {
            address holder;
            uint256 validatorId;
            uint256 amount;
            uint256 delegationPeriod;
            uint256 created;
            uint256 started;
            uint256 finished;
            string info;
        }

        function getDelegation(uint256 delegationId) external view returns (Delegation memory);
        function getState(uint256 delegationId) external view returns (uint8);
        function getDelegationsByValidatorLength(uint256 validatorId) external view returns (uint256);
        function delegationsByValidator(uint256 validatorId, uint256 index) external view returns (uint256);
        function getDelegationsByHolderLength(address holder) external view returns (uint256);
        function delegationsByHolder(address holder, uint256 index) external view returns (uint256);
        function delegate(
            uint256 validatorId,
            uint256 amount,
            uint256 delegationPeriod,
            string calldata info
        ) external;
        function acceptPendingDelegation(uint256 delegationId) external;
        function cancelPendingDelegation(uint256 delegationId) external;
        function requestUndelegation(uint256 delegationId) external;
    }
}

sol! {
    #[sol(rpc)]
    interface Distributor {
        function getAndUpdateEarnedBountyAmount(uint256 validatorId) external returns (uint256 earned, uint256 endMonth);
        function getAndUpdateEarnedFeeAmount() external returns (uint256 earned, uint256 endMonth);
        function withdrawBounty(uint256 validatorId, address to) external;
        function withdrawFee(address to) external;
    }
}

sol! {
    #[sol(rpc)]
    interface TokenState {
        function getAndUpdateLockedAmount(address holder) external returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface Nodes {
        function getNumberOfNodes() external view returns (uint256);
        function getValidatorNodeIndexes(uint256 validatorId) external view returns (uint256[] memory);
        function getNodeAddress(uint256 nodeIndex) external view returns (address);
    }
}

sol! {
    #[sol(rpc)]
    interface Monitors {
        function getLastBountyBlock(uint256 nodeIndex) external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface SkaleManager {
        event BountyReceived(
            uint256 indexed nodeIndex,
            address owner,
            uint256 averageDowntime,
            uint256 averageLatency,
            uint256 bounty,
            uint256 previousBlockEvent,
            uint256 time,
            uint256 gasSpend
        );
    }
}

sol! {
    #[sol(rpc)]
    interface Wallets {
        function rechargeValidatorWallet(uint256 validatorId) external payable;
        function withdrawFundsFromValidatorWallet(uint256 amount) external;
        function getValidatorBalance(uint256 validatorId) external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface SkaleToken {
        function transfer(address to, uint256 value) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface ConstantsHolder {
        function msr() external view returns (uint256);
    }
}

/// Delegation lifecycle as reported by `DelegationController.getState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationState {
    Proposed,
    Accepted,
    Canceled,
    Rejected,
    Delegated,
    UndelegationRequested,
    Completed,
    Unknown(u8),
}

impl From<u8> for DelegationState {
    fn from(value: u8) -> Self {
        match value {
            0 => DelegationState::Proposed,
            1 => DelegationState::Accepted,
            2 => DelegationState::Canceled,
            3 => DelegationState::Rejected,
            4 => DelegationState::Delegated,
            5 => DelegationState::UndelegationRequested,
            6 => DelegationState::Completed,
            other => DelegationState::Unknown(other),
        }
    }
}

impl fmt::Display for DelegationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegationState::Proposed => write!(f, "PROPOSED"),
            DelegationState::Accepted => write!(f, "ACCEPTED"),
            DelegationState::Canceled => write!(f, "CANCELED"),
            DelegationState::Rejected => write!(f, "REJECTED"),
            DelegationState::Delegated => write!(f, "DELEGATED"),
            DelegationState::UndelegationRequested => write!(f, "UNDELEGATION_REQUESTED"),
            DelegationState::Completed => write!(f, "COMPLETED"),
            DelegationState::Unknown(value) => write!(f, "UNKNOWN({})", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorInfo {
    pub id: u64,
    pub name: String,
    pub address: Address,
    pub requested_address: Address,
    pub description: String,
    /// Percent
    pub fee_rate: f64,
    pub registration_time: DateTime<Utc>,
    pub minimum_delegation_amount: U256,
    pub accept_new_requests: bool,
    pub trusted: bool,
}

impl ValidatorInfo {
    pub fn from_raw(id: u64, raw: ValidatorService::Validator, trusted: bool) -> Self {
        Self {
            id,
            name: raw.name,
            address: raw.validatorAddress,
            requested_address: raw.requestedAddress,
            description: raw.description,
            fee_rate: permille_to_percent(raw.feeRate),
            registration_time: timestamp_to_date(raw.registrationTime),
            minimum_delegation_amount: raw.minimumDelegationAmount,
            accept_new_requests: raw.acceptNewRequests,
            trusted,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegationInfo {
    pub id: u64,
    pub holder: Address,
    pub validator_id: u64,
    pub amount: U256,
    /// Months
    pub delegation_period: u64,
    pub created: DateTime<Utc>,
    pub started: u64,
    pub finished: u64,
    pub info: String,
    pub state: DelegationState,
}

impl DelegationInfo {
    pub fn from_raw(id: u64, raw: DelegationController::Delegation, state: DelegationState) -> Self {
        Self {
            id,
            holder: raw.holder,
            validator_id: to_u64(raw.validatorId),
            amount: raw.amount,
            delegation_period: to_u64(raw.delegationPeriod),
            created: timestamp_to_date(raw.created),
            started: to_u64(raw.started),
            finished: to_u64(raw.finished),
            info: raw.info,
            state,
        }
    }
}

/// A node address linked to a validator
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedAddress {
    pub address: Address,
    pub primary: bool,
    pub balance: U256,
    pub nodes: usize,
}

/// Amount earned and the month it was calculated up to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Earned {
    pub amount: U256,
    pub end_month: U256,
}

pub fn to_u64(value: U256) -> u64 {
    value.saturating_to::<u64>()
}

pub fn timestamp_to_date(value: U256) -> DateTime<Utc> {
    DateTime::from_timestamp(to_u64(value).min(i64::MAX as u64) as i64, 0).unwrap_or_default()
}

/// Connection to the staking contracts
pub struct Skale {
    provider: DynProvider,
    addresses: ContractAddresses,
    sender: Option<Address>,
}

impl Skale {
    /// Read-only connection
    pub async fn connect(endpoint: &str, addresses: ContractAddresses) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect(endpoint)
            .await
            .with_context(|| format!("Failed to connect to {}", endpoint))?
            .erased();
        Ok(Self {
            provider,
            addresses,
            sender: None,
        })
    }

    /// Connection that signs transactions with `wallet`
    pub async fn connect_with_wallet(
        endpoint: &str,
        addresses: ContractAddresses,
        wallet: EthereumWallet,
        sender: Address,
    ) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(endpoint)
            .await
            .with_context(|| format!("Failed to connect to {}", endpoint))?
            .erased();
        Ok(Self {
            provider,
            addresses,
            sender: Some(sender),
        })
    }

    /// Read-only connection using the saved config
    pub async fn from_config() -> Result<Self> {
        let config = Config::load()?;
        let addresses = ContractAddresses::load()?;
        Self::connect(&config.endpoint, addresses).await
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn sender(&self) -> Result<Address> {
        self.sender
            .ok_or_else(|| anyhow::anyhow!("No wallet configured for this connection"))
    }

    pub fn validator_service(&self) -> ValidatorService::ValidatorServiceInstance<DynProvider> {
        ValidatorService::new(self.addresses.validator_service_address, self.provider.clone())
    }

    pub fn delegation_controller(&self) -> DelegationController::DelegationControllerInstance<DynProvider> {
        DelegationController::new(self.addresses.delegation_controller_address, self.provider.clone())
    }

    pub fn distributor(&self) -> Distributor::DistributorInstance<DynProvider> {
        Distributor::new(self.addresses.distributor_address, self.provider.clone())
    }

    pub fn token_state(&self) -> TokenState::TokenStateInstance<DynProvider> {
        TokenState::new(self.addresses.token_state_address, self.provider.clone())
    }

    pub fn nodes(&self) -> Nodes::NodesInstance<DynProvider> {
        Nodes::new(self.addresses.nodes_address, self.provider.clone())
    }

    pub fn wallets(&self) -> Wallets::WalletsInstance<DynProvider> {
        Wallets::new(self.addresses.wallets_address, self.provider.clone())
    }

    pub fn token(&self) -> SkaleToken::SkaleTokenInstance<DynProvider> {
        SkaleToken::new(self.addresses.skale_token_address, self.provider.clone())
    }

    pub fn constants_holder(&self) -> ConstantsHolder::ConstantsHolderInstance<DynProvider> {
        ConstantsHolder::new(self.addresses.constants_holder_address, self.provider.clone())
    }

    pub async fn gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .context("Failed to fetch gas price")
    }

    pub async fn validator_exists(&self, id: u64) -> Result<bool> {
        Ok(self.validator_service().validatorExists(U256::from(id)).call().await?)
    }

    /// Fail with `UnknownId` unless the validator is registered
    pub async fn ensure_validator(&self, id: u64) -> Result<()> {
        if !self.validator_exists(id).await? {
            return Err(CliError::UnknownId { kind: "Validator", id }.into());
        }
        Ok(())
    }

    /// Fail with `UnknownId` unless `id < getNumberOfNodes()`
    pub async fn ensure_node(&self, id: u64) -> Result<()> {
        let count = self.nodes().getNumberOfNodes().call().await?;
        if U256::from(id) >= count {
            return Err(CliError::UnknownId { kind: "Node", id }.into());
        }
        Ok(())
    }

    pub async fn validator_node_ids(&self, validator_id: u64) -> Result<Vec<u64>> {
        let indexes = self
            .nodes()
            .getValidatorNodeIndexes(U256::from(validator_id))
            .call()
            .await?;
        Ok(indexes.into_iter().map(to_u64).collect())
    }

    pub async fn trusted_validator_ids(&self) -> Result<Vec<u64>> {
        let ids = self.validator_service().getTrustedValidators().call().await?;
        Ok(ids.into_iter().map(to_u64).collect())
    }

    pub async fn validator(&self, id: u64) -> Result<ValidatorInfo> {
        self.ensure_validator(id).await?;
        let trusted = self.trusted_validator_ids().await?.contains(&id);
        let raw = self.validator_service().getValidator(U256::from(id)).call().await?;
        Ok(ValidatorInfo::from_raw(id, raw, trusted))
    }

    /// Trusted validators, or every registered one when `all` is set
    pub async fn validators(&self, all: bool) -> Result<Vec<ValidatorInfo>> {
        let trusted = self.trusted_validator_ids().await?;
        let ids: Vec<u64> = if all {
            let count = to_u64(self.validator_service().numberOfValidators().call().await?);
            (1..=count).collect()
        } else {
            trusted.clone()
        };

        let service = self.validator_service();
        let raws = try_join_all(ids.iter().map(|id| {
            let service = service.clone();
            let id = *id;
            async move { service.getValidator(U256::from(id)).call().await }
        }))
        .await?;

        Ok(ids
            .into_iter()
            .zip(raws)
            .map(|(id, raw)| ValidatorInfo::from_raw(id, raw, trusted.contains(&id)))
            .collect())
    }

    pub async fn validator_id_by_address(&self, address: Address) -> Result<u64> {
        let id = self.validator_service().getValidatorId(address).call().await?;
        Ok(to_u64(id))
    }

    pub async fn delegation(&self, id: u64) -> Result<DelegationInfo> {
        let controller = self.delegation_controller();
        let raw = controller.getDelegation(U256::from(id)).call().await?;
        let state = controller.getState(U256::from(id)).call().await?;
        Ok(DelegationInfo::from_raw(id, raw, DelegationState::from(state)))
    }

    async fn delegations_by_ids(&self, ids: Vec<u64>) -> Result<Vec<DelegationInfo>> {
        try_join_all(ids.into_iter().map(|id| self.delegation(id))).await
    }

    pub async fn delegations_by_validator(&self, validator_id: u64) -> Result<Vec<DelegationInfo>> {
        let controller = self.delegation_controller();
        let validator = U256::from(validator_id);
        let count = to_u64(controller.getDelegationsByValidatorLength(validator).call().await?);
        let mut ids = Vec::with_capacity(count as usize);
        for index in 0..count {
            let id = controller
                .delegationsByValidator(validator, U256::from(index))
                .call()
                .await?;
            ids.push(to_u64(id));
        }
        self.delegations_by_ids(ids).await
    }

    pub async fn delegations_by_holder(&self, holder: Address) -> Result<Vec<DelegationInfo>> {
        let controller = self.delegation_controller();
        let count = to_u64(controller.getDelegationsByHolderLength(holder).call().await?);
        let mut ids = Vec::with_capacity(count as usize);
        for index in 0..count {
            let id = controller
                .delegationsByHolder(holder, U256::from(index))
                .call()
                .await?;
            ids.push(to_u64(id));
        }
        self.delegations_by_ids(ids).await
    }

    pub async fn linked_addresses(&self, validator_address: Address) -> Result<Vec<LinkedAddress>> {
        let validator_id = self.validator_id_by_address(validator_address).await?;
        let addresses = self
            .validator_service()
            .getNodeAddresses(U256::from(validator_id))
            .call()
            .await?;

        let nodes = self.nodes();
        let mut node_addresses = Vec::new();
        for node_id in self.validator_node_ids(validator_id).await? {
            node_addresses.push(nodes.getNodeAddress(U256::from(node_id)).call().await?);
        }

        let mut linked = Vec::with_capacity(addresses.len());
        for address in addresses {
            let balance = self.provider.get_balance(address).await?;
            linked.push(LinkedAddress {
                address,
                primary: address == validator_address,
                balance,
                nodes: node_addresses.iter().filter(|a| **a == address).count(),
            });
        }
        Ok(linked)
    }

    pub async fn bond_amount(&self, validator_id: u64) -> Result<U256> {
        Ok(self
            .validator_service()
            .getAndUpdateBondAmount(U256::from(validator_id))
            .call()
            .await?)
    }

    pub async fn msr(&self) -> Result<U256> {
        Ok(self.constants_holder().msr().call().await?)
    }

    pub async fn srw_balance(&self, validator_id: u64) -> Result<U256> {
        Ok(self
            .wallets()
            .getValidatorBalance(U256::from(validator_id))
            .call()
            .await?)
    }

    pub async fn locked_amount(&self, holder: Address) -> Result<U256> {
        Ok(self.token_state().getAndUpdateLockedAmount(holder).call().await?)
    }

    /// Bounty earned by `holder` from delegations to `validator_id`
    pub async fn earned_bounty(&self, validator_id: u64, holder: Address) -> Result<Earned> {
        let result = self
            .distributor()
            .getAndUpdateEarnedBountyAmount(U256::from(validator_id))
            .from(holder)
            .call()
            .await?;
        Ok(Earned {
            amount: result.earned,
            end_month: result.endMonth,
        })
    }

    /// Fee earned by the validator whose address is `validator_address`
    pub async fn earned_fee(&self, validator_address: Address) -> Result<Earned> {
        let result = self
            .distributor()
            .getAndUpdateEarnedFeeAmount()
            .from(validator_address)
            .call()
            .await?;
        Ok(Earned {
            amount: result.earned,
            end_month: result.endMonth,
        })
    }
}

fn decode_bounty_event(log: &alloy::rpc::types::Log) -> Result<BountyEvent> {
    let decoded = log.log_decode::<SkaleManager::BountyReceived>()?;
    let data = decoded.inner.data;
    Ok(BountyEvent {
        node_id: to_u64(data.nodeIndex),
        block_number: log.block_number.unwrap_or_default(),
        timestamp: timestamp_to_date(data.time),
        bounty: data.bounty,
        average_downtime: data.averageDowntime,
        average_latency: data.averageLatency,
        previous_block_event: to_u64(data.previousBlockEvent),
    })
}

#[async_trait]
impl BountyHistory for Skale {
    async fn latest_block(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await?
            .ok_or_else(|| anyhow::anyhow!("Block {} not found", block))?;
        Ok(block.header.timestamp)
    }

    async fn bounty_events(
        &self,
        from_block: u64,
        to_block: u64,
        node_ids: &[u64],
    ) -> Result<Vec<BountyEvent>> {
        let mut filter = Filter::new()
            .address(self.addresses.skale_manager_address)
            .event_signature(SkaleManager::BountyReceived::SIGNATURE_HASH)
            .from_block(BlockNumberOrTag::Number(from_block))
            .to_block(BlockNumberOrTag::Number(to_block));
        if !node_ids.is_empty() {
            let topics: Vec<B256> = node_ids
                .iter()
                .map(|id| B256::from(U256::from(*id)))
                .collect();
            filter = filter.topic1(topics);
        }

        let logs = self.provider.get_logs(&filter).await?;
        logs.iter().map(decode_bounty_event).collect()
    }

    async fn last_bounty_block(&self, node_id: u64) -> Result<Option<u64>> {
        let address = match self.addresses.monitors_address {
            Some(address) => address,
            None => return Ok(None),
        };
        let monitors = Monitors::new(address, self.provider.clone());
        let block = monitors.getLastBountyBlock(U256::from(node_id)).call().await?;
        Ok(Some(to_u64(block)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn raw_validator() -> ValidatorService::Validator {
        ValidatorService::Validator {
            name: "Bob".to_string(),
            validatorAddress: address!("0x1000000000000000000000000000000000000001"),
            requestedAddress: Address::ZERO,
            description: "Validator".to_string(),
            feeRate: U256::from(150u64),
            registrationTime: U256::from(1_600_000_000u64),
            minimumDelegationAmount: U256::from(1000u64),
            acceptNewRequests: true,
        }
    }

    #[test]
    fn test_delegation_state_from_u8() {
        assert_eq!(DelegationState::from(0), DelegationState::Proposed);
        assert_eq!(DelegationState::from(4), DelegationState::Delegated);
        assert_eq!(DelegationState::from(6), DelegationState::Completed);
        assert_eq!(DelegationState::from(42), DelegationState::Unknown(42));
    }

    #[test]
    fn test_delegation_state_display() {
        assert_eq!(DelegationState::UndelegationRequested.to_string(), "UNDELEGATION_REQUESTED");
        assert_eq!(DelegationState::Proposed.to_string(), "PROPOSED");
    }

    #[test]
    fn test_validator_info_from_raw() {
        let info = ValidatorInfo::from_raw(3, raw_validator(), true);

        assert_eq!(info.id, 3);
        assert_eq!(info.name, "Bob");
        assert_eq!(info.fee_rate, 15.0);
        assert_eq!(info.registration_time.timestamp(), 1_600_000_000);
        assert!(info.trusted);
    }

    #[test]
    fn test_delegation_info_from_raw() {
        let raw = DelegationController::Delegation {
            holder: address!("0x2000000000000000000000000000000000000002"),
            validatorId: U256::from(1u64),
            amount: U256::from(5000u64),
            delegationPeriod: U256::from(3u64),
            created: U256::from(1_600_000_000u64),
            started: U256::from(10u64),
            finished: U256::ZERO,
            info: "test".to_string(),
        };
        let info = DelegationInfo::from_raw(7, raw, DelegationState::Accepted);

        assert_eq!(info.id, 7);
        assert_eq!(info.validator_id, 1);
        assert_eq!(info.delegation_period, 3);
        assert_eq!(info.state, DelegationState::Accepted);
    }

    #[test]
    fn test_to_u64_saturates() {
        assert_eq!(to_u64(U256::MAX), u64::MAX);
        assert_eq!(to_u64(U256::from(12u64)), 12);
    }

    #[test]
    fn test_timestamp_to_date() {
        assert_eq!(timestamp_to_date(U256::ZERO).timestamp(), 0);
        assert_eq!(timestamp_to_date(U256::from(86_400u64)).to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }
}
