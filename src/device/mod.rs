// Licensed under the Apache-2.0 license

//! Device families, their capabilities, and the per-device configuration.

pub mod config;
pub mod state;

pub use config::{Bus, IfaceConfig, IfaceConfigBuilder, WaitPolicy};
pub use state::DeviceState;

/// Supported CryptoAuthentication device families.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DeviceType {
    Atsha204a,
    Atecc108a,
    Atecc508a,
    #[default]
    Atecc608,
    Ecc204,
}

/// Feature groups a command builder may require.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    /// P-256 key generation and signing
    Ecc,
    /// ECDSA verification with an external public key
    Verify,
    /// AES-128 block operations
    Aes,
    /// SHA-256 command with start, update and end modes
    Sha,
    /// Random number generation
    Random,
    /// Nonce command with a random seed
    Nonce,
    /// Configurable clock divider in the ChipMode byte
    ClockDivider,
}

impl DeviceType {
    /// Largest request packet the family accepts.
    #[must_use]
    pub const fn max_packet_size(self) -> usize {
        match self {
            Self::Atsha204a => 84,
            Self::Atecc108a | Self::Atecc508a | Self::Atecc608 | Self::Ecc204 => 151,
        }
    }

    /// Size of the configuration zone in bytes.
    #[must_use]
    pub const fn config_zone_size(self) -> usize {
        match self {
            Self::Atsha204a => 88,
            Self::Ecc204 => 64,
            Self::Atecc108a | Self::Atecc508a | Self::Atecc608 => 128,
        }
    }

    /// Number of data zone slots.
    #[must_use]
    pub const fn slot_count(self) -> u16 {
        match self {
            Self::Ecc204 => 4,
            _ => 16,
        }
    }

    /// Families that go straight back to sleep and must not receive an idle.
    #[must_use]
    pub const fn skips_idle(self) -> bool {
        matches!(self, Self::Ecc204)
    }

    #[must_use]
    pub const fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Random | Capability::Nonce => true,
            Capability::Ecc | Capability::Sha => !matches!(self, Self::Atsha204a),
            Capability::Verify => matches!(self, Self::Atecc508a | Self::Atecc608),
            Capability::Aes | Capability::ClockDivider => matches!(self, Self::Atecc608),
        }
    }
}
