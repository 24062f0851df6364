use bytes::Bytes;

use crate::{
    converter::ColorConverter,
    encoder::Encoder,
    error::{Error, LifecycleError, SinkError},
    output::{Muxer, MuxerState},
    settings::Settings,
    test_util::{collector, concat, vp8_available},
};

fn open(settings: &Settings, sink: impl crate::sink::ChunkSink) -> (Muxer, Encoder) {
    let mut muxer = Muxer::new(Box::new(sink), settings.io_buffer_size, &[]).unwrap();
    let encoder = Encoder::open(settings, muxer.needs_global_header()).unwrap();
    muxer.add_track(&encoder).unwrap();
    (muxer, encoder)
}

#[test]
fn header_then_trailer_is_a_valid_empty_webm() {
    if !vp8_available() {
        return;
    }
    let settings = Settings::new(64, 48);
    let (sink, chunks) = collector();
    let (mut muxer, _encoder) = open(&settings, sink);
    assert_eq!(muxer.state(), MuxerState::Unopened);
    assert!(chunks.lock().unwrap().is_empty());

    muxer.write_header().unwrap();
    assert_eq!(muxer.state(), MuxerState::HeaderWritten);
    let track = muxer.track().unwrap();
    assert_eq!((track.width, track.height), (64, 48));
    assert_eq!(track.codec_id, crate::encoder::CODEC_ID);
    assert_eq!(track.time_base, crate::settings::TIME_BASE);

    muxer.write_trailer().unwrap();
    assert_eq!(muxer.state(), MuxerState::Finalized);
    assert!(!muxer.is_writable());

    let bytes = concat(&chunks);
    // EBML magic
    assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
    assert_eq!(bytes.len() as u64, muxer.bytes_written());
}

#[test]
fn enforces_header_packet_trailer_order() {
    if !vp8_available() {
        return;
    }
    let settings = Settings::new(64, 48);
    let (sink, _chunks) = collector();
    let (mut muxer, mut encoder) = open(&settings, sink);

    assert!(matches!(
        muxer.write_trailer(),
        Err(Error::Lifecycle(LifecycleError::TrailerBeforeHeader))
    ));

    let mut converter = ColorConverter::new(64, 48).unwrap();
    let frame = converter.convert(&vec![90u8; settings.frame_len()]).unwrap();
    encoder.send_frame(frame, 0).unwrap();
    encoder.send_eof().unwrap();
    let packet = encoder.receive_packet().unwrap().expect("one packet after eof");

    assert!(matches!(
        muxer.write_packet(packet),
        Err(Error::Lifecycle(LifecycleError::PacketBeforeHeader))
    ));

    muxer.write_header().unwrap();
    assert!(matches!(
        muxer.write_header(),
        Err(Error::Lifecycle(LifecycleError::HeaderAlreadyWritten))
    ));
    muxer.write_trailer().unwrap();
    assert!(matches!(
        muxer.write_trailer(),
        Err(Error::Lifecycle(LifecycleError::WriteAfterTrailer))
    ));
}

#[test]
fn sink_failure_breaks_the_muxer() {
    if !vp8_available() {
        return;
    }
    let settings = Settings::new(64, 48);
    let sink = |_chunk: Bytes| -> Result<(), SinkError> { Err(SinkError::Closed) };
    let (mut muxer, _encoder) = open(&settings, sink);

    // header bytes are flushed to the sink right away
    let err = muxer.write_header().unwrap_err();
    assert!(matches!(err, Error::Sink(SinkError::Closed)));
    assert!(err.is_fatal());
    assert_eq!(muxer.state(), MuxerState::Broken);
    assert!(matches!(
        muxer.write_trailer(),
        Err(Error::Lifecycle(LifecycleError::OutputBroken))
    ));
}

#[test]
fn small_buffer_splits_output_into_many_chunks() {
    if !vp8_available() {
        return;
    }
    let settings = Settings::new(64, 48).with_io_buffer_size(64);
    let (sink, chunks) = collector();
    let (mut muxer, _encoder) = open(&settings, sink);
    muxer.write_header().unwrap();
    muxer.write_trailer().unwrap();

    let chunks = chunks.lock().unwrap();
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 64));
}

fn muxer_with_options(options: &[(&str, &str)]) -> crate::error::Result<Muxer> {
    crate::init(&crate::LibraryConfig::default()).unwrap();
    let (sink, _chunks) = collector();
    let options: Vec<(String, String)> = options
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Muxer::new(Box::new(sink), 4096, &options)
}

#[test]
fn container_options_are_checked_on_construction() {
    assert!(muxer_with_options(&[("cluster_time_limit", "1000")]).is_ok());

    let err = muxer_with_options(&[("cluster_size_limit", "abc")])
        .err()
        .unwrap();
    assert!(matches!(err, Error::Config(_)), "{}", err);
    assert!(err.is_fatal());

    let err = muxer_with_options(&[("no_such_option", "1")]).err().unwrap();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("no_such_option")));
}

#[test]
fn rejected_header_is_not_retried() {
    // no track declared, the muxer refuses to start
    let mut muxer = muxer_with_options(&[]).unwrap();
    let err = muxer.write_header().unwrap_err();
    assert!(matches!(err, Error::Setup(_)), "{}", err);
    assert!(err.is_fatal());
    assert_eq!(muxer.state(), MuxerState::Broken);
    assert!(!muxer.is_writable());
    assert!(matches!(
        muxer.write_header(),
        Err(Error::Lifecycle(LifecycleError::OutputBroken))
    ));
}
