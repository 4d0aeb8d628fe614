//! Protocol error definitions.

use odra::prelude::*;

/// CDP engine errors
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CdpError {
    // Config errors (1xx)
    AlreadyInitialized = 100,
    NotInitialized = 101,
    InvalidParameters = 102,

    // Access control errors (2xx)
    Unauthorized = 200,

    // Position errors (3xx)
    InvalidAmount = 300,
    PositionNotFound = 301,
    InsufficientCollateral = 302,
    InsufficientDebt = 303,
    BelowMinimumHealthFactor = 304,
    PositionHealthy = 305,
    ExcessiveMintAmount = 306,

    // Oracle errors (4xx)
    StalePrice = 400,
    InvalidPrice = 401,
    PriceUnavailable = 402,
    OraclePriceDeviation = 403,

    // Math errors (5xx)
    ArithmeticOverflow = 500,

    // Token errors (6xx)
    InsufficientTokenBalance = 600,
    TokenTransferFailed = 601,
}

impl CdpError {
    pub const fn message(&self) -> &'static str {
        match self {
            // Config
            CdpError::AlreadyInitialized => "Protocol config already initialized",
            CdpError::NotInitialized => "Protocol config not initialized",
            CdpError::InvalidParameters => "Invalid configuration parameters",

            // Access control
            CdpError::Unauthorized => "Unauthorized: caller is not admin",

            // Position
            CdpError::InvalidAmount => "Invalid amount",
            CdpError::PositionNotFound => "Position not found",
            CdpError::InsufficientCollateral => "Insufficient collateral",
            CdpError::InsufficientDebt => "Burn amount exceeds position debt",
            CdpError::BelowMinimumHealthFactor => "Below minimum health factor",
            CdpError::PositionHealthy => "Cannot liquidate a healthy position",
            CdpError::ExcessiveMintAmount => "Mint amount exceeds the per-call cap",

            // Oracle
            CdpError::StalePrice => "Oracle price stale",
            CdpError::InvalidPrice => "Oracle price invalid",
            CdpError::PriceUnavailable => "Oracle price unavailable",
            CdpError::OraclePriceDeviation => "Oracle feeds deviate beyond tolerance",

            // Math
            CdpError::ArithmeticOverflow => "Arithmetic overflow",

            // Token
            CdpError::InsufficientTokenBalance => "Insufficient token balance",
            CdpError::TokenTransferFailed => "Token transfer failed",
        }
    }
}

impl core::fmt::Display for CdpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<CdpError> for OdraError {
    fn from(error: CdpError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}
