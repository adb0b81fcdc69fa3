//! Rust streams exposed to the engine.

use std::ffi::c_void;
use std::io::{self, Seek, SeekFrom};
use std::mem::offset_of;
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex, PoisonError};

use super::com::{
    ComObject, ComPtr, E_ABORT, E_FAIL, E_INVALIDARG, E_NEGATIVE_SEEK, Guid, HRESULT,
    IID_IIN_STREAM, IID_ISEQUENTIAL_IN_STREAM, IID_ISEQUENTIAL_OUT_STREAM, IInStreamVtbl,
    ISequentialInStreamVtbl, ISequentialOutStreamVtbl, IUnknownVtbl, S_OK,
};
use crate::engine::SharedSink;
use crate::source::{ReadSeek, SharedStream, lock_stream, read_up_to};
use crate::string::check_seek_overflow;

/// `IInStream` over a shared Rust reader.
#[repr(C)]
pub(crate) struct InStream {
    vtbl: *const IInStreamVtbl,
    refs: AtomicU32,
    stream: SharedStream,
}

unsafe impl ComObject for InStream {
    fn ref_count(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface_offset(iid: &Guid) -> Option<usize> {
        (*iid == IID_IIN_STREAM || *iid == IID_ISEQUENTIAL_IN_STREAM)
            .then_some(offset_of!(InStream, vtbl))
    }
}

static IN_STREAM_VTBL: IInStreamVtbl = IInStreamVtbl {
    base: ISequentialInStreamVtbl {
        base: IUnknownVtbl::new::<InStream, 0>(),
        read: in_stream_read,
    },
    seek: in_stream_seek,
};

impl InStream {
    /// Creates an engine stream object reading from `stream`.
    pub fn create(stream: SharedStream) -> ComPtr {
        ComPtr::new_object(InStream {
            vtbl: &IN_STREAM_VTBL,
            refs: AtomicU32::new(0),
            stream,
        })
    }
}

unsafe extern "system" fn in_stream_read(
    this: *mut c_void,
    data: *mut c_void,
    size: u32,
    processed: *mut u32,
) -> HRESULT {
    // SAFETY: `this` is an InStream created by `InStream::create`
    let object = unsafe { &*this.cast::<InStream>() };
    if !processed.is_null() {
        // SAFETY: non-null out pointer from the engine
        unsafe { *processed = 0 };
    }
    if size == 0 {
        return S_OK;
    }
    if data.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: the engine provides a writable buffer of `size` bytes
    let buf = unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), size as usize) };
    let mut stream = lock_stream(&object.stream);
    match read_up_to(&mut **stream, buf) {
        Ok(n) => {
            if !processed.is_null() {
                // SAFETY: non-null out pointer from the engine
                unsafe { *processed = n as u32 };
            }
            S_OK
        }
        Err(e) => {
            log::debug!("stream read failed: {}", e);
            E_FAIL
        }
    }
}

unsafe extern "system" fn in_stream_seek(
    this: *mut c_void,
    offset: i64,
    origin: u32,
    new_position: *mut u64,
) -> HRESULT {
    // SAFETY: `this` is an InStream created by `InStream::create`
    let object = unsafe { &*this.cast::<InStream>() };
    if origin > 2 {
        return E_INVALIDARG;
    }
    let mut stream = lock_stream(&object.stream);
    let moved = match seek_target(&mut **stream, offset, origin) {
        Ok(Some(target)) => stream.seek(SeekFrom::Start(target)),
        Ok(None) => return E_NEGATIVE_SEEK,
        Err(e) => Err(e),
    };
    match moved {
        Ok(position) => {
            if !new_position.is_null() {
                // SAFETY: non-null out pointer from the engine
                unsafe { *new_position = position };
            }
            S_OK
        }
        Err(e) => {
            log::debug!("stream seek failed: {}", e);
            E_FAIL
        }
    }
}

/// Resolves a seek request against the start, current position or end.
///
/// Returns `None` for targets before the start or past `u64::MAX`. The
/// stream position is unchanged.
fn seek_target(stream: &mut dyn ReadSeek, offset: i64, origin: u32) -> io::Result<Option<u64>> {
    let base = match origin {
        0 => 0,
        1 => stream.stream_position()?,
        _ => {
            let current = stream.stream_position()?;
            let end = stream.seek(SeekFrom::End(0))?;
            stream.seek(SeekFrom::Start(current))?;
            end
        }
    };
    Ok(check_seek_overflow(base, offset))
}

/// First I/O error raised by a sink during one engine call.
pub(crate) type SinkFailure = Arc<Mutex<Option<io::Error>>>;

/// `ISequentialOutStream` delivering one item's data to an extract sink.
#[repr(C)]
pub(crate) struct OutStream {
    vtbl: *const ISequentialOutStreamVtbl,
    refs: AtomicU32,
    sink: SharedSink,
    index: u32,
    failure: SinkFailure,
}

unsafe impl ComObject for OutStream {
    fn ref_count(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface_offset(iid: &Guid) -> Option<usize> {
        (*iid == IID_ISEQUENTIAL_OUT_STREAM).then_some(offset_of!(OutStream, vtbl))
    }
}

static OUT_STREAM_VTBL: ISequentialOutStreamVtbl = ISequentialOutStreamVtbl {
    base: IUnknownVtbl::new::<OutStream, 0>(),
    write: out_stream_write,
};

impl OutStream {
    /// Creates an engine stream object writing item `index` into `sink`.
    pub fn create(sink: SharedSink, index: u32, failure: SinkFailure) -> ComPtr {
        ComPtr::new_object(OutStream {
            vtbl: &OUT_STREAM_VTBL,
            refs: AtomicU32::new(0),
            sink,
            index,
            failure,
        })
    }
}

unsafe extern "system" fn out_stream_write(
    this: *mut c_void,
    data: *const c_void,
    size: u32,
    processed: *mut u32,
) -> HRESULT {
    // SAFETY: `this` is an OutStream created by `OutStream::create`
    let object = unsafe { &*this.cast::<OutStream>() };
    if !processed.is_null() {
        // SAFETY: non-null out pointer from the engine
        unsafe { *processed = 0 };
    }
    if size == 0 {
        return S_OK;
    }
    if data.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: the engine provides `size` readable bytes
    let buf = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), size as usize) };
    let result = object
        .sink
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .write(object.index, buf);
    match result {
        Ok(()) => {
            if !processed.is_null() {
                // SAFETY: non-null out pointer from the engine
                unsafe { *processed = size };
            }
            S_OK
        }
        Err(e) => {
            record_failure(&object.failure, e);
            E_ABORT
        }
    }
}

/// Stores the first sink error of an engine call.
pub(crate) fn record_failure(failure: &SinkFailure, error: io::Error) {
    let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(error);
    }
}
