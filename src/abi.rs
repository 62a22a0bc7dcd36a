use alloy::{
    primitives::B256,
    sol,
    sol_types::SolEvent,
};

sol! {
    #[sol(rpc)]
    contract CoinFlip {
        event Roll(address player, uint256 choice, uint256 outcome, bool won);

        function flip(uint256 choice) external payable;
        function withdrawWinnings() external;
        function getPlayerBalance(address player) external view returns (uint256);
    }
}

/// topic0 of `Roll(address,uint256,uint256,bool)`
pub fn roll_topic() -> B256 {
    CoinFlip::Roll::SIGNATURE_HASH
}
