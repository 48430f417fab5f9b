//! Content addresses for metadata and source files.
//!
//! A [`SourceAddress`] identifies one retrievable document by its origin
//! network and the hash encoding natural to that origin: base58 for IPFS,
//! hex for Swarm (`bzzr0`/`bzzr1`). Addresses come from two places: the
//! CBOR auxdata at the tail of deployed runtime bytecode, and the `urls`
//! entries of a metadata document.

use std::fmt;
use std::str::FromStr;

use crate::bytecode::split_auxdata;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOrigin {
    Ipfs,
    Bzzr0,
    Bzzr1,
}

impl SourceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOrigin::Ipfs => "ipfs",
            SourceOrigin::Bzzr0 => "bzzr0",
            SourceOrigin::Bzzr1 => "bzzr1",
        }
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ipfs" => Ok(SourceOrigin::Ipfs),
            "bzzr0" => Ok(SourceOrigin::Bzzr0),
            "bzzr1" => Ok(SourceOrigin::Bzzr1),
            other => Err(Error::UnknownOrigin(other.to_string())),
        }
    }
}

/// A content address: origin plus the hash in its origin's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceAddress {
    pub origin: SourceOrigin,
    pub id: String,
}

impl SourceAddress {
    pub fn new(origin: SourceOrigin, id: impl Into<String>) -> Self {
        Self {
            origin,
            id: id.into(),
        }
    }

    /// The deduplication key: `origin:id`.
    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.origin, self.id)
    }

    /// Extract the metadata pointer from the auxdata tail of runtime bytecode.
    ///
    /// The auxdata is a CBOR map carrying one of `ipfs` (multihash bytes),
    /// `bzzr0` or `bzzr1` (32-byte Swarm hashes). Unrecognized keys such as
    /// `solc` are skipped. The first recognized key wins.
    pub fn from_bytecode(code: &[u8]) -> Result<Self> {
        let (_, aux) = split_auxdata(code).ok_or(Error::MissingAuxdata)?;
        let mut decoder = minicbor::Decoder::new(aux);
        let entries = decoder
            .map()
            .map_err(|e| Error::MalformedAuxdata(e.to_string()))?
            .ok_or_else(|| Error::MalformedAuxdata("indefinite-length map".to_string()))?;

        for _ in 0..entries {
            let key = decoder
                .str()
                .map_err(|e| Error::MalformedAuxdata(e.to_string()))?;
            match key {
                "ipfs" => {
                    let hash = decoder
                        .bytes()
                        .map_err(|e| Error::MalformedAuxdata(e.to_string()))?;
                    return Ok(Self::new(
                        SourceOrigin::Ipfs,
                        bs58::encode(hash).into_string(),
                    ));
                }
                "bzzr0" | "bzzr1" => {
                    let origin = if key == "bzzr0" {
                        SourceOrigin::Bzzr0
                    } else {
                        SourceOrigin::Bzzr1
                    };
                    let hash = decoder
                        .bytes()
                        .map_err(|e| Error::MalformedAuxdata(e.to_string()))?;
                    return Ok(Self::new(origin, hex::encode(hash)));
                }
                _ => {
                    decoder
                        .skip()
                        .map_err(|e| Error::MalformedAuxdata(e.to_string()))?;
                }
            }
        }

        Err(Error::NoContentAddress)
    }

    /// Parse a metadata `urls` entry.
    ///
    /// Recognized forms are `dweb:/ipfs/<hash>` and `bzz-raw://<hash>`;
    /// anything else is rejected so the caller can try the next URL.
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(hash) = url.strip_prefix("dweb:/ipfs/") {
            if hash.is_empty() {
                return Err(Error::BadSourceUrl(url.to_string()));
            }
            return Ok(Self::new(SourceOrigin::Ipfs, hash));
        }
        if let Some(hash) = url.strip_prefix("bzz-raw://") {
            if hash.is_empty() {
                return Err(Error::BadSourceUrl(url.to_string()));
            }
            return Ok(Self::new(SourceOrigin::Bzzr1, hash));
        }
        Err(Error::BadSourceUrl(url.to_string()))
    }
}

// Display mirrors unique_id so log lines and map keys agree.
impl fmt::Display for SourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.id)
    }
}
