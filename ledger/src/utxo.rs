//! The authoritative set of spendable outputs.

use std::collections::BTreeMap;

use tessera_transactions::UtxoEntry;
use tessera_types::OutputRef;

use crate::LedgerError;

/// Every output that has been created and not yet spent, as of the last
/// commit.
///
/// The set is owned by the node's [`crate::Ledger`] and changes only inside a
/// commit, after the matching store write succeeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: BTreeMap<OutputRef, UtxoEntry>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: &OutputRef) -> bool {
        self.entries.contains_key(at)
    }

    pub fn get(&self, at: &OutputRef) -> Option<&UtxoEntry> {
        self.entries.get(at)
    }

    /// Remove an output. Spending an absent output is an error and leaves the
    /// set unchanged.
    pub fn spend(&mut self, at: &OutputRef) -> Result<UtxoEntry, LedgerError> {
        self.entries
            .remove(at)
            .ok_or(LedgerError::AlreadySpent(*at))
    }

    pub fn add(&mut self, at: OutputRef, entry: UtxoEntry) {
        self.entries.insert(at, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutputRef, &UtxoEntry)> {
        self.entries.iter()
    }
}

/// Storage encoding of an unspent entry.
pub fn encode_entry(entry: &UtxoEntry) -> Result<Vec<u8>, LedgerError> {
    Ok(bincode::serialize(entry)?)
}

pub fn decode_entry(bytes: &[u8]) -> Result<UtxoEntry, LedgerError> {
    Ok(bincode::deserialize(bytes)?)
}

impl FromIterator<(OutputRef, UtxoEntry)> for UtxoSet {
    fn from_iter<I: IntoIterator<Item = (OutputRef, UtxoEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
