use crate::{
    common::{CompressValue, DecompressValue, DeserializeValue, SerializeValue},
    KvError,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use snafu::ResultExt;
use std::io::{Read, Write};

/// Decode a stored value: gunzip, then parse the JSON document.
pub fn decode_stored_data<T: DeserializeOwned>(value: &[u8]) -> Result<T, KvError> {
    let mut json = Vec::new();
    GzDecoder::new(value)
        .read_to_end(&mut json)
        .context(DecompressValue {})?;

    serde_json::from_slice(&json).context(DeserializeValue {})
}

/// Encode a value the way it is kept in the store.
pub fn encode_stored_data<T: Serialize>(data: &T) -> Result<Vec<u8>, KvError> {
    let json = serde_json::to_vec(data).context(SerializeValue {})?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).context(CompressValue {})?;
    encoder.finish().context(CompressValue {})
}
