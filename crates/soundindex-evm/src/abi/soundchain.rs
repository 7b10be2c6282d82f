//! Built-in event definitions for the six SoundChain contracts.

use soundindex_core::{ContractId, ContractVersion, Domain, WatcherError};

use super::{AbiError, ContractAbi};

const MARKETPLACE_COMMON: &[&str] = &[
    "ItemListed(address indexed owner, address indexed nft, uint256 tokenId, uint256 quantity, uint256 pricePerItem, uint256 OGUNPricePerItem, bool acceptsMATIC, bool acceptsOGUN, uint256 startingTime)",
    "ItemSold(address indexed seller, address indexed buyer, address indexed nft, uint256 tokenId, uint256 quantity, uint256 pricePerItem, bool isPaymentOGUN)",
    "ItemUpdated(address indexed owner, address indexed nft, uint256 tokenId, uint256 newPrice, uint256 newOGUNPrice, bool acceptsMATIC, bool acceptsOGUN, uint256 startingTime)",
    "ItemCanceled(address indexed owner, address indexed nft, uint256 tokenId)",
    "OwnershipTransferred(address indexed previousOwner, address indexed newOwner)",
];

const MARKETPLACE_EDITIONS: &[&str] = &[
    "EditionListed(address indexed owner, address indexed nft, uint256 indexed editionId)",
    "EditionCanceled(address indexed owner, address indexed nft, uint256 indexed editionId)",
];

const NFT_COMMON: &[&str] = &[
    "Transfer(address indexed from, address indexed to, uint256 indexed tokenId)",
    "Approval(address indexed owner, address indexed approved, uint256 indexed tokenId)",
    "ApprovalForAll(address indexed owner, address indexed operator, bool approved)",
];

const NFT_EDITIONS: &[&str] =
    &["EditionCreated(uint256 indexed editionId, address indexed owner, uint256 quantity)"];

const AUCTION: &[&str] = &[
    "AuctionCreated(address indexed nftAddress, uint256 indexed tokenId, address owner, uint256 reservePrice, bool isPaymentOGUN, uint256 startTimestamp, uint256 endTimestamp)",
    "BidPlaced(address indexed nftAddress, uint256 indexed tokenId, address indexed bidder, uint256 bid)",
    "AuctionResulted(address oldOwner, address indexed nftAddress, uint256 indexed tokenId, address indexed winner, uint256 winningBid)",
    "AuctionCancelled(address indexed nftAddress, uint256 indexed tokenId)",
    "UpdateAuction(address indexed nftAddress, uint256 indexed tokenId, uint256 reservePrice, uint256 startTime, uint256 endTime)",
    "BidRefunded(address indexed bidder, uint256 bid)",
];

/// Signatures emitted by a given contract.
pub fn signatures(id: ContractId) -> Vec<&'static str> {
    let (base, v2_extra): (&[&str], &[&str]) = match id.domain {
        Domain::Marketplace => (MARKETPLACE_COMMON, MARKETPLACE_EDITIONS),
        Domain::Nft => (NFT_COMMON, NFT_EDITIONS),
        Domain::Auction => (AUCTION, &[]),
    };
    let mut out = base.to_vec();
    if id.version == ContractVersion::V2 {
        out.extend_from_slice(v2_extra);
    }
    out
}

/// The built-in ABI for one of the six contracts.
pub fn contract_abi(id: ContractId) -> Result<ContractAbi, WatcherError> {
    ContractAbi::from_signatures(id.to_string(), &signatures(id)).map_err(|e: AbiError| {
        WatcherError::Decode {
            contract: id.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_abi_parses() {
        for id in ContractId::ALL {
            let abi = contract_abi(id).unwrap();
            assert!(!abi.events().is_empty(), "{id}");
        }
    }

    #[test]
    fn editions_only_on_v2() {
        let v1 = contract_abi(ContractId::MARKETPLACE_V1).unwrap();
        let v2 = contract_abi(ContractId::MARKETPLACE_V2).unwrap();
        assert!(v1.event_by_name("EditionListed").is_none());
        assert!(v2.event_by_name("EditionListed").is_some());

        let nft1 = contract_abi(ContractId::NFT_V1).unwrap();
        let nft2 = contract_abi(ContractId::NFT_V2).unwrap();
        assert!(nft1.event_by_name("EditionCreated").is_none());
        assert!(nft2.event_by_name("EditionCreated").is_some());
    }

    #[test]
    fn nft_transfer_has_standard_topic0() {
        let abi = contract_abi(ContractId::NFT_V2).unwrap();
        assert_eq!(
            abi.event_by_name("Transfer").unwrap().topic0(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }
}
