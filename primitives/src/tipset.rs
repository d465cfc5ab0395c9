use cid::Cid;

use crate::ChainEpoch;

/// Key of a tipset: the ordered CIDs of the blocks forming it.
///
/// The empty key is a valid query argument meaning "whatever the queried node
/// currently considers its head".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TipsetKey(Vec<Cid>);

impl TipsetKey {
    pub fn new(cids: Vec<Cid>) -> Self {
        Self(cids)
    }

    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One point in the chain's head: a set of blocks at the same height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tipset {
    key: TipsetKey,
    height: ChainEpoch,
}

impl Tipset {
    pub fn new(key: TipsetKey, height: ChainEpoch) -> Self {
        Self { key, height }
    }

    pub fn key(&self) -> &TipsetKey {
        &self.key
    }

    pub fn height(&self) -> ChainEpoch {
        self.height
    }
}
