//! Custom AVIO output: the muxer writes into a fixed scratch buffer and every
//! flush of that buffer becomes one `ChunkSink::send` call.

use std::{
    ffi::{c_int, c_void},
    panic::{AssertUnwindSafe, catch_unwind},
    ptr,
};

use bytes::Bytes;
use ffmpeg_next::ffi;

use crate::{
    error::{Error, Result, SinkError},
    sink::ChunkSink,
};

/// State behind the AVIO `opaque` pointer.
struct SinkAdapter {
    sink: Box<dyn ChunkSink>,
    bytes_written: u64,
    chunks_written: u64,
    error: Option<SinkError>,
}

/// Owns the `AVIOContext` and its scratch buffer.
///
/// Must outlive the format context that writes through it.
pub struct ChunkIo {
    context: *mut ffi::AVIOContext,
    adapter: *mut SinkAdapter,
}

impl ChunkIo {
    pub fn new(sink: Box<dyn ChunkSink>, buffer_size: usize) -> Result<Self> {
        let adapter = Box::into_raw(Box::new(SinkAdapter {
            sink,
            bytes_written: 0,
            chunks_written: 0,
            error: None,
        }));

        let context = unsafe {
            let buffer = ffi::av_malloc(buffer_size) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(adapter));
                return Err(Error::Setup(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::util::error::ENOMEM,
                }));
            }
            let context = ffi::avio_alloc_context(
                buffer,
                buffer_size as c_int,
                1,
                adapter as *mut c_void,
                None,
                Some(write_chunk),
                None,
            );
            if context.is_null() {
                ffi::av_free(buffer as *mut c_void);
                drop(Box::from_raw(adapter));
                return Err(Error::Setup(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::util::error::ENOMEM,
                }));
            }
            context
        };

        Ok(Self { context, adapter })
    }

    pub fn as_mut_ptr(&mut self) -> *mut ffi::AVIOContext {
        self.context
    }

    pub fn bytes_written(&self) -> u64 {
        unsafe { (*self.adapter).bytes_written }
    }

    pub fn chunks_written(&self) -> u64 {
        unsafe { (*self.adapter).chunks_written }
    }

    /// First sink failure seen by the write callback, if any.
    pub fn sink_error(&self) -> Option<SinkError> {
        unsafe { (*self.adapter).error.clone() }
    }
}

impl Drop for ChunkIo {
    fn drop(&mut self) {
        unsafe {
            // the muxer may have swapped the buffer, free whatever is current
            ffi::av_freep(ptr::addr_of_mut!((*self.context).buffer) as *mut c_void);
            ffi::avio_context_free(&mut self.context);
            drop(Box::from_raw(self.adapter));
        }
    }
}

unsafe extern "C" fn write_chunk(opaque: *mut c_void, buf: *const u8, buf_size: c_int) -> c_int {
    let adapter = unsafe { &mut *(opaque as *mut SinkAdapter) };
    if adapter.error.is_some() {
        return c_int::from(ffmpeg_next::Error::Exit);
    }
    if buf_size <= 0 {
        return 0;
    }

    let chunk = Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(buf, buf_size as usize) });
    let sent = catch_unwind(AssertUnwindSafe(|| adapter.sink.send(chunk)))
        .unwrap_or_else(|_| {
            log::error!("chunk sink panicked");
            Err(SinkError::Closed)
        });

    match sent {
        Ok(()) => {
            adapter.bytes_written += buf_size as u64;
            adapter.chunks_written += 1;
            buf_size
        }
        Err(e) => {
            log::error!("chunk sink failed after {} bytes: {}", adapter.bytes_written, e);
            adapter.error = Some(e);
            c_int::from(ffmpeg_next::Error::Exit)
        }
    }
}
