use alloy_sol_types::sol;

// Deployed sale contracts disagree on method names; the gateway probes the
// candidates below in order and caches whichever set answers.

sol! {
    /// Sale contract, current deployment ABI
    interface ILaunchpad {
        function priceUSDC() external view returns (uint256);
        function startTime() external view returns (uint256);
        function endTime() external view returns (uint256);
        function cap() external view returns (uint256);
        function token() external view returns (address);
        function fundsWallet() external view returns (address);
        function buyWithUSDC(uint256 usdcAmount) external;
    }

    /// Names used by older sale deployments for the same state
    interface ILaunchpadLegacy {
        function price() external view returns (uint256);
        function tokenPrice() external view returns (uint256);
        function saleStart() external view returns (uint256);
        function saleEnd() external view returns (uint256);
        function saleToken() external view returns (address);
        function buy(uint256 amount) external;
        function purchase(uint256 amount) external;
    }

    /// Payment token surface (ERC-20)
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}
