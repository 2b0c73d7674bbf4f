//! JSON file formats read and written by the driver.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::Context as _;
use ethereum_types::H256;
use mpt_step::{
    step::Step,
    store::{MemoryTrieStore, StepAccesses},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Raw bytes, written as `0x`-prefixed hex.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct HexBytes(#[serde(with = "mpt_step::hex")] pub Vec<u8>);

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// A trie root together with the encoded nodes needed to walk it.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct WitnessFile {
    /// The trie root. The zero hash stands for the empty trie.
    pub root: H256,

    /// Encoded trie nodes, in any order.
    pub nodes: Vec<HexBytes>,
}

impl WitnessFile {
    /// Loads every node into `store`, keyed by its hash.
    pub fn load_into(&self, store: &mut MemoryTrieStore) {
        store.insert_proof(&self.nodes);
    }
}

/// The steps and nodes read by the transition that produced `step`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AccessRecord {
    /// Index of the produced step.
    pub step: usize,

    /// Indices of the earlier steps the transition read, ascending.
    #[serde(default)]
    pub read_steps: Vec<usize>,

    /// What the transition fetched and wrote.
    #[serde(flatten)]
    pub accesses: StepAccesses,
}

/// A complete run: every step, the accesses of each transition and the nodes
/// behind those accesses.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TraceFile {
    /// Every step, starting with the one the run was started from.
    pub steps: Vec<Step>,

    /// Accesses per transition, one record for every step after the first.
    pub accesses: Vec<AccessRecord>,

    /// Every node fetched or written during the run, ordered by hash.
    pub nodes: Vec<HexBytes>,
}

impl TraceFile {
    /// The record of the transition producing step `index`.
    pub fn record_of(&self, index: usize) -> Option<&AccessRecord> {
        self.accesses.iter().find(|record| record.step == index)
    }
}

/// A step of a trace together with its index.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexedStep {
    /// Position of the step in its trace.
    pub index: usize,

    /// The step itself.
    pub step: Step,
}

/// Everything needed to check a single disputed step: the earlier steps its
/// transition reads and the nodes it fetches.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StepWitness {
    /// Index of the disputed step.
    pub index: usize,

    /// The disputed step as claimed by the trace.
    pub claimed: Step,

    /// The earlier steps the transition reads.
    pub steps: Vec<IndexedStep>,

    /// The nodes the transition fetches.
    pub nodes: Vec<HexBytes>,
}

/// Parses JSON from `reader`, reporting the path of the offending field on
/// failure.
pub fn read_json<T: DeserializeOwned>(reader: impl Read) -> anyhow::Result<T> {
    let des = &mut serde_json::Deserializer::from_reader(reader);
    Ok(serde_path_to_error::deserialize(des)?)
}

/// Parses the JSON file at `path`.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    read_json(BufReader::new(file)).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Writes `value` as pretty JSON to the file at `path`, or to stdout if no
/// path is given.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;

            tracing::info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ethereum_types::H256;

    use mpt_step::step::Step;

    use super::{read_json, AccessRecord, HexBytes, WitnessFile};

    #[test]
    fn witness_files_accept_hex_with_and_without_prefix() {
        let json = r#"{
            "root": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "nodes": ["0xc482203161", "c482203162"]
        }"#;

        let witness: WitnessFile = read_json(json.as_bytes()).unwrap();
        assert_eq!(witness.root, H256::zero());
        assert_eq!(witness.nodes[0].0, vec![0xc4, 0x82, 0x20, 0x31, 0x61]);
        assert_eq!(witness.nodes[1].0, vec![0xc4, 0x82, 0x20, 0x31, 0x62]);

        let reencoded = serde_json::to_value(&witness).unwrap();
        assert_eq!(reencoded["nodes"][1], "0xc482203162");
    }

    #[test]
    fn parse_errors_name_the_bad_field() {
        let json = r#"{ "root": "0x00", "nodes": ["0xzz"] }"#;

        let err = read_json::<WitnessFile>(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("root"), "{err}");
    }

    #[test]
    fn node_bytes_are_written_with_a_prefix() {
        let json = serde_json::to_string(&HexBytes(vec![0xab, 0x01])).unwrap();
        assert_eq!(json, r#""0xab01""#);

        let step = Step {
            value: vec![0xff],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&step).unwrap();
        assert_eq!(encoded["value"], "0xff");
    }

    #[test]
    fn access_records_without_read_steps_still_parse() {
        let json = r#"{ "step": 3, "fetched": [], "written": [] }"#;

        let record: AccessRecord = read_json(json.as_bytes()).unwrap();
        assert_eq!(record.step, 3);
        assert!(record.read_steps.is_empty());
    }
}
