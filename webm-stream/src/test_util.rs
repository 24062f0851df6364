use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use bytes::Bytes;

use crate::{LibraryConfig, error::SinkError, sink::ChunkSink};

pub type Chunks = Arc<Mutex<Vec<Bytes>>>;

/// Sink that keeps every chunk it is given.
pub fn collector() -> (impl ChunkSink, Chunks) {
    let chunks: Chunks = Arc::new(Mutex::new(Vec::new()));
    let chunks_clone = chunks.clone();
    let sink = move |chunk: Bytes| -> Result<(), SinkError> {
        chunks_clone.lock().unwrap().push(chunk);
        Ok(())
    };
    (sink, chunks)
}

pub fn concat(chunks: &Chunks) -> Vec<u8> {
    chunks
        .lock()
        .unwrap()
        .iter()
        .flat_map(|c| c.iter().copied())
        .collect()
}

/// False (with a message) when this ffmpeg build has no VP8 encoder.
pub fn vp8_available() -> bool {
    crate::init(&LibraryConfig::default()).unwrap();
    if ffmpeg_next::encoder::find(crate::encoder::CODEC_ID).is_none() {
        eprintln!("skip: {} not available", crate::encoder::CODEC_NAME);
        return false;
    }
    true
}

/// Writes `data` to a unique file under the temp dir.
pub fn write_temp(name: &str, data: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "webm-stream-{}-{}.webm",
        std::process::id(),
        name
    ));
    std::fs::write(&path, data).unwrap();
    path
}
