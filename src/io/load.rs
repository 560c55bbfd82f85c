//! Checkpoint loading

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::model::NetworkState;
use crate::net::Network;

/// Load a network from a JSON checkpoint.
///
/// A missing or corrupt file is an error; callers that treat that case as
/// "no checkpoint" fall back to constructing a fresh network.
pub fn load_network(path: impl AsRef<Path>) -> Result<Network> {
    let content = fs::read_to_string(path.as_ref())?;
    let state: NetworkState = serde_json::from_str(&content)
        .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?;
    state.into_network()
}
