//! Checkpoint saving

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::model::NetworkState;
use crate::net::Network;

/// Save the network to a JSON checkpoint.
///
/// The state is written to a sibling temp file and renamed into place, so a
/// crash mid-write never leaves a truncated checkpoint behind.
pub fn save_network(path: impl AsRef<Path>, net: &Network) -> Result<()> {
    let path = path.as_ref();
    let state = NetworkState::from_network(net);
    let data = serde_json::to_string(&state)
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);
    fs::write(tmp, data)?;
    fs::rename(tmp, path)?;
    Ok(())
}
