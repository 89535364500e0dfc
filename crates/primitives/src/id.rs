//! Identifier newtypes for servers, branches and contracts.

use core::fmt;
use core::ops::Deref;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::Contract;
use crate::hash::{Error as HashError, Hash};
use crate::region::{KeyRange, StoreKey};
use crate::version::Version;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $invalid:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Default,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            BorshSerialize,
            BorshDeserialize,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Hash);

        impl $name {
            #[must_use]
            pub const fn as_hash(&self) -> &Hash {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(id: [u8; 32]) -> Self {
                Self(id.into())
            }
        }

        impl From<Hash> for $name {
            fn from(hash: Hash) -> Self {
                Self(hash)
            }
        }

        impl Deref for $name {
            type Target = [u8; 32];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&self.0.to_base58())
                    .finish()
            }
        }

        #[derive(Debug, Error)]
        #[error("invalid {}: {}", $label, .0)]
        pub struct $invalid(HashError);

        impl FromStr for $name {
            type Err = $invalid;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse().map_err($invalid)?))
            }
        }
    };
}

define_id!(
    /// Identity of a server hosting replicas.
    ServerId,
    InvalidServerId,
    "server id"
);

define_id!(
    /// Identity of a lineage of writes. The all-zero id is the nil branch, the
    /// ancestor of every branch and the branch of the empty state.
    BranchId,
    InvalidBranchId,
    "branch id"
);

define_id!(
    /// Identity of a published contract.
    ContractId,
    InvalidContractId,
    "contract id"
);

impl ServerId {
    /// Derives a stable server id from a human readable name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Hash::new(name.as_bytes()))
    }
}

impl BranchId {
    pub const NIL: Self = Self(Hash::ZERO);

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_zero()
    }

    /// Derives the id of a branch hosted on `server` that starts at `version` and
    /// whose region begins at `start`.
    ///
    /// `generation` is the size of the branch history the branch is minted
    /// against; a replica elected twice from the same version gets two branches.
    pub fn derive(
        server: ServerId,
        version: &Version,
        start: &StoreKey,
        generation: u64,
    ) -> std::io::Result<Self> {
        Hash::hash_borsh(&(b"branch", server, version, start, generation)).map(Self)
    }
}

impl ContractId {
    /// Derives the id of `contract` over `region`, superseding `predecessors`.
    ///
    /// Predecessors are part of the identity so a region that returns to an
    /// earlier value never revives acks addressed to the earlier contract.
    pub fn derive<'a, I>(
        region: &KeyRange,
        contract: &Contract,
        predecessors: I,
    ) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = &'a ContractId>,
    {
        let mut predecessors: Vec<&ContractId> = predecessors.into_iter().collect();
        predecessors.sort_unstable();
        predecessors.dedup();

        Hash::hash_borsh(&(b"contract", region, contract, predecessors)).map(Self)
    }
}
