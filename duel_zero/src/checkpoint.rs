//! Checkpoint artifacts: an opaque binary blob holding the evaluator's
//! parameters and optimizer state, plus a human-readable JSON metadata
//! sidecar recording hyperparameters and per-iteration history.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::evaluator::{Adam, AlphaZeroNet};

#[derive(Serialize, Deserialize)]
struct CheckpointBlob {
    net: AlphaZeroNet,
    optimizer: Adam,
}

pub fn save_checkpoint(path: &Path, net: &AlphaZeroNet, optimizer: &Adam) -> anyhow::Result<()> {
    let blob = CheckpointBlob { net: net.clone(), optimizer: optimizer.clone() };
    let bytes = rmp_serde::to_vec(&blob).context("serializing checkpoint")?;
    fs::write(path, bytes).with_context(|| format!("writing checkpoint to {}", path.display()))
}

pub fn load_checkpoint(path: &Path) -> anyhow::Result<(AlphaZeroNet, Adam)> {
    let bytes = fs::read(path).with_context(|| format!("reading checkpoint from {}", path.display()))?;
    let blob: CheckpointBlob = rmp_serde::from_slice(&bytes).context("deserializing checkpoint")?;
    Ok((blob.net, blob.optimizer))
}

#[derive(Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub iteration: u32,
    pub self_play_winners: Vec<u8>,
    pub replay_size: usize,
    pub policy_loss: f64,
    pub value_loss: f64,
    pub gating_win_rate: f64,
    pub promoted: bool,
}

#[derive(Serialize, Deserialize)]
pub struct Metadata {
    pub created_at: String,
    pub seed: u64,
    pub hyperparameters: serde_json::Value,
    pub history: Vec<HistoryRecord>,
    pub expectations: serde_json::Value,
}

pub fn write_metadata(path: &Path, metadata: &Metadata) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(metadata).context("serializing metadata")?;
    fs::write(path, json).with_context(|| format!("writing metadata to {}", path.display()))
}

pub fn read_metadata(path: &Path) -> anyhow::Result<Metadata> {
    let text = fs::read_to_string(path).with_context(|| format!("reading metadata from {}", path.display()))?;
    serde_json::from_str(&text).context("parsing metadata")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;
    use tempfile::tempdir;

    #[test]
    fn checkpoint_round_trips_through_disk() {
        let dir = tempdir().expect("tempdir");
        let net = AlphaZeroNet::new(6, 4, 3, 2);
        let optimizer = Adam::new(&net, 1e-3);
        let path = dir.path().join("latest.bin");

        save_checkpoint(&path, &net, &optimizer).expect("save");
        let (restored_net, _restored_optimizer) = load_checkpoint(&path).expect("load");

        let features = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        assert_eq!(net.evaluate(&features), restored_net.evaluate(&features));
    }

    #[test]
    fn metadata_round_trips_through_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("metadata.json");
        let metadata = Metadata {
            created_at: "2026-01-01T00:00:00Z".into(),
            seed: 7,
            hyperparameters: serde_json::json!({"iterations": 20}),
            history: vec![HistoryRecord {
                iteration: 0,
                self_play_winners: vec![1, 2],
                replay_size: 16,
                policy_loss: 1.2,
                value_loss: 0.4,
                gating_win_rate: 0.6,
                promoted: true,
            }],
            expectations: serde_json::json!({}),
        };

        write_metadata(&path, &metadata).expect("write");
        let restored = read_metadata(&path).expect("read");
        assert_eq!(restored.seed, 7);
        assert_eq!(restored.history.len(), 1);
        assert!(restored.history[0].promoted);
    }
}
