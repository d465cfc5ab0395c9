use serde::{Deserialize, Serialize};

use crate::{Address, ChainEpoch, MethodNum, PartitionNumber, SectorNumber};

/// Method number of the builtin miner actor's windowed-PoSt submission.
pub const METHOD_SUBMIT_WINDOWED_POST: MethodNum = 5;

/// An unsigned chain message, as visible in the message pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to: Address,
    pub from: Address,
    pub nonce: u64,
    pub method: MethodNum,
    /// CBOR-encoded parameters of the invoked method.
    pub params: Vec<u8>,
}

/// A signed chain message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Vec<u8>,
}

/// One partition covered by a windowed-PoSt submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoStPartition {
    /// Partition index within the submission's deadline.
    pub index: PartitionNumber,
    /// Sectors skipped (declared faulty) by this submission.
    pub skipped: Vec<SectorNumber>,
}

/// Parameters of [`METHOD_SUBMIT_WINDOWED_POST`], carried CBOR-encoded in
/// [`Message::params`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitWindowedPoStParams {
    /// Deadline index the submission proves.
    pub deadline: u64,
    /// Partitions proved by this submission.
    pub partitions: Vec<PoStPartition>,
    /// Epoch whose tipset the submission commits to for randomness.
    pub chain_commit_epoch: ChainEpoch,
    /// Aggregated proof bytes; opaque to this crate.
    pub proof: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParamsCodecError {
    #[error("failed to encode windowed-PoSt parameters: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to decode windowed-PoSt parameters: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

impl SubmitWindowedPoStParams {
    pub fn to_cbor(&self) -> Result<Vec<u8>, ParamsCodecError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ParamsCodecError> {
        Ok(ciborium::de::from_reader(bytes)?)
    }
}
