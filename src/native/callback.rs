//! Open and extract callbacks handed to the engine.
//!
//! Each callback is a single heap object implementing several interfaces,
//! one vtable pointer per interface. The engine may call back from its own
//! worker threads, so the state shared with the Rust side sits behind a
//! mutex.

use std::ffi::c_void;
use std::fs::File;
use std::io::BufReader;
use std::mem::offset_of;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::com::{
    ComObject, ComPtr, E_ABORT, E_INVALIDARG, E_OUTOFMEMORY, Guid, HRESULT,
    IArchiveExtractCallbackVtbl, IArchiveOpenCallbackVtbl, IArchiveOpenVolumeCallbackVtbl,
    ICryptoGetTextPasswordVtbl, IID_IARCHIVE_EXTRACT_CALLBACK, IID_IARCHIVE_OPEN_CALLBACK,
    IID_IARCHIVE_OPEN_VOLUME_CALLBACK, IID_ICRYPTO_GET_TEXT_PASSWORD, IID_IPROGRESS,
    IProgressVtbl, IUnknownVtbl, S_FALSE, S_OK,
};
use super::propvariant::{Bstr, PropVariant, bstr_alloc};
use super::stream::{InStream, OutStream, SinkFailure, record_failure};
use crate::engine::{AskMode, OpenRequest, OperationResult, PropertyId, SharedSink};
use crate::password::Password;
use crate::source::{ReadSeek, SharedStream};
use crate::string::{LongPathPolicy, WideChar, io_path, path_from_wide, wide_units};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands a password to the engine as a freshly allocated `BSTR`.
///
/// # Safety
///
/// `out` must be null or writable.
unsafe fn give_password(password: &Password, out: *mut Bstr) -> HRESULT {
    if out.is_null() {
        return E_INVALIDARG;
    }
    let bstr = bstr_alloc(password.as_str());
    if bstr.is_null() {
        return E_OUTOFMEMORY;
    }
    // SAFETY: checked non-null above
    unsafe { *out = bstr };
    S_OK
}

/// State observed by the reader after an open call.
#[derive(Debug, Default)]
pub(crate) struct OpenState {
    pub password: Option<Password>,
    pub password_asked: bool,
    /// Archive file the engine opened, for sibling volume lookup.
    pub archive_path: Option<PathBuf>,
    pub policy: LongPathPolicy,
    /// Volumes opened so far, counting the first one.
    pub volumes: u32,
}

impl OpenState {
    pub fn for_request(request: &OpenRequest<'_>) -> Self {
        Self {
            password: request.password.cloned(),
            password_asked: false,
            archive_path: request.volume_path.map(Path::to_path_buf),
            policy: request.long_path_policy,
            volumes: 1,
        }
    }
}

/// `IArchiveOpenCallback` + `ICryptoGetTextPassword` +
/// `IArchiveOpenVolumeCallback`.
#[repr(C)]
pub(crate) struct OpenCallback {
    open_vtbl: *const IArchiveOpenCallbackVtbl,
    password_vtbl: *const ICryptoGetTextPasswordVtbl,
    volume_vtbl: *const IArchiveOpenVolumeCallbackVtbl,
    refs: AtomicU32,
    state: Arc<Mutex<OpenState>>,
}

const OPEN_PASSWORD_OFFSET: usize = offset_of!(OpenCallback, password_vtbl);
const OPEN_VOLUME_OFFSET: usize = offset_of!(OpenCallback, volume_vtbl);

unsafe impl ComObject for OpenCallback {
    fn ref_count(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface_offset(iid: &Guid) -> Option<usize> {
        if *iid == IID_IARCHIVE_OPEN_CALLBACK {
            Some(offset_of!(OpenCallback, open_vtbl))
        } else if *iid == IID_ICRYPTO_GET_TEXT_PASSWORD {
            Some(OPEN_PASSWORD_OFFSET)
        } else if *iid == IID_IARCHIVE_OPEN_VOLUME_CALLBACK {
            Some(OPEN_VOLUME_OFFSET)
        } else {
            None
        }
    }
}

static OPEN_VTBL: IArchiveOpenCallbackVtbl = IArchiveOpenCallbackVtbl {
    base: IUnknownVtbl::new::<OpenCallback, 0>(),
    set_total: open_set_total,
    set_completed: open_set_completed,
};

static OPEN_PASSWORD_VTBL: ICryptoGetTextPasswordVtbl = ICryptoGetTextPasswordVtbl {
    base: IUnknownVtbl::new::<OpenCallback, OPEN_PASSWORD_OFFSET>(),
    crypto_get_text_password: open_get_password,
};

static OPEN_VOLUME_VTBL: IArchiveOpenVolumeCallbackVtbl = IArchiveOpenVolumeCallbackVtbl {
    base: IUnknownVtbl::new::<OpenCallback, OPEN_VOLUME_OFFSET>(),
    get_property: volume_get_property,
    get_stream: volume_get_stream,
};

impl OpenCallback {
    /// Creates the callback object sharing `state` with the caller.
    pub fn create(state: Arc<Mutex<OpenState>>) -> ComPtr {
        ComPtr::new_object(OpenCallback {
            open_vtbl: &OPEN_VTBL,
            password_vtbl: &OPEN_PASSWORD_VTBL,
            volume_vtbl: &OPEN_VOLUME_VTBL,
            refs: AtomicU32::new(0),
            state,
        })
    }

    /// # Safety
    ///
    /// `this` must point `offset` bytes into a live `OpenCallback`.
    unsafe fn from_interface<'a>(this: *mut c_void, offset: usize) -> &'a OpenCallback {
        // SAFETY: guaranteed by the caller
        unsafe { &*this.cast::<u8>().sub(offset).cast::<OpenCallback>() }
    }
}

unsafe extern "system" fn open_set_total(
    _this: *mut c_void,
    _files: *const u64,
    _bytes: *const u64,
) -> HRESULT {
    S_OK
}

unsafe extern "system" fn open_set_completed(
    _this: *mut c_void,
    _files: *const u64,
    _bytes: *const u64,
) -> HRESULT {
    S_OK
}

unsafe extern "system" fn open_get_password(this: *mut c_void, out: *mut Bstr) -> HRESULT {
    // SAFETY: called through OPEN_PASSWORD_VTBL
    let callback = unsafe { OpenCallback::from_interface(this, OPEN_PASSWORD_OFFSET) };
    let mut state = lock(&callback.state);
    state.password_asked = true;
    log::debug!("engine requested the header password");
    match &state.password {
        // SAFETY: `out` comes from the engine
        Some(password) => unsafe { give_password(password, out) },
        None => E_ABORT,
    }
}

unsafe extern "system" fn volume_get_property(
    this: *mut c_void,
    prop_id: u32,
    value: *mut PropVariant,
) -> HRESULT {
    // SAFETY: called through OPEN_VOLUME_VTBL
    let callback = unsafe { OpenCallback::from_interface(this, OPEN_VOLUME_OFFSET) };
    if value.is_null() {
        return E_INVALIDARG;
    }
    let state = lock(&callback.state);
    let name = state
        .archive_path
        .as_deref()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned());
    let variant = match name {
        Some(name) if PropertyId::from_id(prop_id) == PropertyId::Name => {
            PropVariant::from_text(&name)
        }
        _ => PropVariant::new(),
    };
    // SAFETY: the engine passes an empty variant for us to fill
    unsafe { value.write(variant) };
    S_OK
}

unsafe extern "system" fn volume_get_stream(
    this: *mut c_void,
    name: *const WideChar,
    out: *mut *mut c_void,
) -> HRESULT {
    // SAFETY: called through OPEN_VOLUME_VTBL
    let callback = unsafe { OpenCallback::from_interface(this, OPEN_VOLUME_OFFSET) };
    if out.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: checked non-null; `name` is an engine string
    let name = unsafe {
        *out = std::ptr::null_mut();
        path_from_wide(wide_units(name))
    };

    let mut state = lock(&callback.state);
    let Some(dir) = state.archive_path.as_deref().and_then(|p| p.parent()) else {
        return S_FALSE;
    };
    let volume = dir.join(&name);
    log::debug!("engine requested volume {}", volume.display());

    let opened = File::open(io_path(&volume, state.policy));
    match opened {
        Ok(file) => {
            state.volumes += 1;
            let reader: Box<dyn ReadSeek> = Box::new(BufReader::new(file));
            let stream: SharedStream = Arc::new(Mutex::new(reader));
            // SAFETY: checked non-null above; the reference moves to the engine
            unsafe { *out = InStream::create(stream).into_raw() };
            S_OK
        }
        Err(e) => {
            log::debug!("volume {} unavailable: {}", volume.display(), e);
            S_FALSE
        }
    }
}

/// State observed by the reader after an extract call.
#[derive(Debug, Default)]
pub(crate) struct ExtractState {
    pub password: Option<Password>,
    /// The engine asked for a password and none was set.
    pub password_missing: bool,
    /// Item the engine is currently processing.
    pub current: Option<u32>,
}

/// `IArchiveExtractCallback` + `ICryptoGetTextPassword`.
#[repr(C)]
pub(crate) struct ExtractCallback {
    extract_vtbl: *const IArchiveExtractCallbackVtbl,
    password_vtbl: *const ICryptoGetTextPasswordVtbl,
    refs: AtomicU32,
    state: Arc<Mutex<ExtractState>>,
    sink: SharedSink,
    failure: SinkFailure,
}

const EXTRACT_PASSWORD_OFFSET: usize = offset_of!(ExtractCallback, password_vtbl);

unsafe impl ComObject for ExtractCallback {
    fn ref_count(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface_offset(iid: &Guid) -> Option<usize> {
        if *iid == IID_IARCHIVE_EXTRACT_CALLBACK || *iid == IID_IPROGRESS {
            Some(offset_of!(ExtractCallback, extract_vtbl))
        } else if *iid == IID_ICRYPTO_GET_TEXT_PASSWORD {
            Some(EXTRACT_PASSWORD_OFFSET)
        } else {
            None
        }
    }
}

static EXTRACT_VTBL: IArchiveExtractCallbackVtbl = IArchiveExtractCallbackVtbl {
    base: IProgressVtbl {
        base: IUnknownVtbl::new::<ExtractCallback, 0>(),
        set_total: extract_set_total,
        set_completed: extract_set_completed,
    },
    get_stream: extract_get_stream,
    prepare_operation: extract_prepare_operation,
    set_operation_result: extract_set_operation_result,
};

static EXTRACT_PASSWORD_VTBL: ICryptoGetTextPasswordVtbl = ICryptoGetTextPasswordVtbl {
    base: IUnknownVtbl::new::<ExtractCallback, EXTRACT_PASSWORD_OFFSET>(),
    crypto_get_text_password: extract_get_password,
};

impl ExtractCallback {
    /// Creates the callback object feeding `sink`.
    pub fn create(state: Arc<Mutex<ExtractState>>, sink: SharedSink, failure: SinkFailure) -> ComPtr {
        ComPtr::new_object(ExtractCallback {
            extract_vtbl: &EXTRACT_VTBL,
            password_vtbl: &EXTRACT_PASSWORD_VTBL,
            refs: AtomicU32::new(0),
            state,
            sink,
            failure,
        })
    }

    /// # Safety
    ///
    /// `this` must point to the primary interface of a live `ExtractCallback`.
    unsafe fn from_primary<'a>(this: *mut c_void) -> &'a ExtractCallback {
        // SAFETY: guaranteed by the caller
        unsafe { &*this.cast::<ExtractCallback>() }
    }
}

unsafe extern "system" fn extract_set_total(this: *mut c_void, total: u64) -> HRESULT {
    // SAFETY: called through EXTRACT_VTBL
    let callback = unsafe { ExtractCallback::from_primary(this) };
    lock(&callback.sink).total(total);
    S_OK
}

unsafe extern "system" fn extract_set_completed(this: *mut c_void, completed: *const u64) -> HRESULT {
    // SAFETY: called through EXTRACT_VTBL
    let callback = unsafe { ExtractCallback::from_primary(this) };
    if !completed.is_null() {
        // SAFETY: non-null pointer from the engine
        let value = unsafe { *completed };
        lock(&callback.sink).completed(value);
    }
    S_OK
}

unsafe extern "system" fn extract_get_stream(
    this: *mut c_void,
    index: u32,
    out: *mut *mut c_void,
    ask_mode: i32,
) -> HRESULT {
    // SAFETY: called through EXTRACT_VTBL
    let callback = unsafe { ExtractCallback::from_primary(this) };
    if out.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: checked non-null
    unsafe { *out = std::ptr::null_mut() };

    lock(&callback.state).current = Some(index);
    let mode = AskMode::from_code(ask_mode);
    log::trace!("engine processing item {} ({:?})", index, mode);

    let wants_data = match lock(&callback.sink).begin(index, mode) {
        Ok(wants) => wants,
        Err(e) => {
            record_failure(&callback.failure, e);
            return E_ABORT;
        }
    };
    if wants_data && mode == AskMode::Extract {
        let stream = OutStream::create(callback.sink.clone(), index, callback.failure.clone());
        // SAFETY: checked non-null above; the reference moves to the engine
        unsafe { *out = stream.into_raw() };
    }
    S_OK
}

unsafe extern "system" fn extract_prepare_operation(_this: *mut c_void, _ask_mode: i32) -> HRESULT {
    S_OK
}

unsafe extern "system" fn extract_set_operation_result(this: *mut c_void, result: i32) -> HRESULT {
    // SAFETY: called through EXTRACT_VTBL
    let callback = unsafe { ExtractCallback::from_primary(this) };
    let Some(index) = lock(&callback.state).current.take() else {
        return S_OK;
    };
    match lock(&callback.sink).finish(index, OperationResult::from_code(result)) {
        Ok(()) => S_OK,
        Err(e) => {
            record_failure(&callback.failure, e);
            E_ABORT
        }
    }
}

unsafe extern "system" fn extract_get_password(this: *mut c_void, out: *mut Bstr) -> HRESULT {
    // SAFETY: called through EXTRACT_PASSWORD_VTBL
    let callback = unsafe {
        &*this
            .cast::<u8>()
            .sub(EXTRACT_PASSWORD_OFFSET)
            .cast::<ExtractCallback>()
    };
    let mut state = lock(&callback.state);
    if let Some(password) = &state.password {
        // SAFETY: `out` comes from the engine
        return unsafe { give_password(password, out) };
    }
    state.password_missing = true;
    E_ABORT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExtractSink;
    use crate::native::com::ISequentialOutStreamVtbl;
    use crate::native::propvariant::{VT_BSTR, bstr_free, bstr_to_string};
    use std::io;

    fn query(ptr: &ComPtr, iid: &Guid) -> ComPtr {
        let mut out = std::ptr::null_mut();
        let hr = unsafe { (ptr.vtbl::<IUnknownVtbl>().query_interface)(ptr.as_raw(), iid, &mut out) };
        assert_eq!(hr, S_OK);
        unsafe { ComPtr::from_raw(out) }.unwrap()
    }

    #[test]
    fn test_open_callback_password() {
        let state = Arc::new(Mutex::new(OpenState {
            password: Some(Password::new("secret")),
            ..OpenState::default()
        }));
        let callback = OpenCallback::create(state.clone());
        let crypto = query(&callback, &IID_ICRYPTO_GET_TEXT_PASSWORD);
        assert_ne!(crypto.as_raw(), callback.as_raw());

        let mut bstr: Bstr = std::ptr::null_mut();
        let hr = unsafe {
            (crypto.vtbl::<ICryptoGetTextPasswordVtbl>().crypto_get_text_password)(
                crypto.as_raw(),
                &mut bstr,
            )
        };
        assert_eq!(hr, S_OK);
        assert_eq!(unsafe { bstr_to_string(bstr) }, "secret");
        unsafe { bstr_free(bstr) };
        assert!(state.lock().unwrap().password_asked);
    }

    #[test]
    fn test_open_callback_without_password_aborts() {
        let state = Arc::new(Mutex::new(OpenState::default()));
        let callback = OpenCallback::create(state.clone());
        let crypto = query(&callback, &IID_ICRYPTO_GET_TEXT_PASSWORD);
        let mut bstr: Bstr = std::ptr::null_mut();
        let hr = unsafe {
            (crypto.vtbl::<ICryptoGetTextPasswordVtbl>().crypto_get_text_password)(
                crypto.as_raw(),
                &mut bstr,
            )
        };
        assert_eq!(hr, E_ABORT);
        assert!(bstr.is_null());
        assert!(state.lock().unwrap().password_asked);
    }

    #[test]
    fn test_open_state_for_request() {
        let password = Password::new("pw");
        let path = PathBuf::from("dir").join("set.7z.001");
        let request = OpenRequest {
            password: Some(&password),
            volume_path: Some(&path),
            long_path_policy: LongPathPolicy::Never,
            ..OpenRequest::default()
        };
        let state = OpenState::for_request(&request);
        assert_eq!(state.policy, LongPathPolicy::Never);
        assert_eq!(state.archive_path.as_deref(), Some(path.as_path()));
        assert_eq!(state.password.as_ref().map(Password::as_str), Some("pw"));
        assert_eq!(state.volumes, 1);
        assert!(!state.password_asked);

        let state = OpenState::for_request(&OpenRequest::default());
        assert_eq!(state.policy, LongPathPolicy::Auto);
        assert!(state.archive_path.is_none());
    }

    #[test]
    fn test_volume_callback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("set.001"), b"one").unwrap();
        std::fs::write(dir.path().join("set.002"), b"two").unwrap();

        let state = Arc::new(Mutex::new(OpenState {
            archive_path: Some(dir.path().join("set.001")),
            volumes: 1,
            ..OpenState::default()
        }));
        let callback = OpenCallback::create(state.clone());
        let volume = query(&callback, &IID_IARCHIVE_OPEN_VOLUME_CALLBACK);
        let vtbl = unsafe { volume.vtbl::<IArchiveOpenVolumeCallbackVtbl>() };

        let mut value = PropVariant::new();
        let hr = unsafe { (vtbl.get_property)(volume.as_raw(), PropertyId::Name.id(), &mut value) };
        assert_eq!(hr, S_OK);
        assert_eq!(value.vt, VT_BSTR);
        assert_eq!(value.to_value().as_str(), Some("set.001"));

        let name = crate::string::to_wide("set.002");
        let mut out = std::ptr::null_mut();
        let hr = unsafe { (vtbl.get_stream)(volume.as_raw(), name.as_ptr(), &mut out) };
        assert_eq!(hr, S_OK);
        assert!(unsafe { ComPtr::from_raw(out) }.is_some());

        let name = crate::string::to_wide("set.003");
        let hr = unsafe { (vtbl.get_stream)(volume.as_raw(), name.as_ptr(), &mut out) };
        assert_eq!(hr, S_FALSE);
        assert!(out.is_null());

        let state = state.lock().unwrap();
        assert_eq!(state.volumes, 2);
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        data: Vec<u8>,
    }

    impl ExtractSink for Recorder {
        fn total(&mut self, bytes: u64) {
            self.events.push(format!("total {}", bytes));
        }

        fn begin(&mut self, index: u32, mode: AskMode) -> io::Result<bool> {
            self.events.push(format!("begin {} {:?}", index, mode));
            Ok(true)
        }

        fn write(&mut self, _index: u32, data: &[u8]) -> io::Result<()> {
            self.data.extend_from_slice(data);
            Ok(())
        }

        fn finish(&mut self, index: u32, result: OperationResult) -> io::Result<()> {
            self.events.push(format!("finish {} {:?}", index, result));
            Ok(())
        }
    }

    #[test]
    fn test_extract_callback_sequence() {
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let sink: SharedSink = recorder.clone();
        let state = Arc::new(Mutex::new(ExtractState::default()));
        let callback = ExtractCallback::create(state.clone(), sink, SinkFailure::default());
        let vtbl = unsafe { callback.vtbl::<IArchiveExtractCallbackVtbl>() };

        unsafe {
            assert_eq!((vtbl.base.set_total)(callback.as_raw(), 5), S_OK);
            let mut out = std::ptr::null_mut();
            assert_eq!((vtbl.get_stream)(callback.as_raw(), 2, &mut out, 0), S_OK);
            let stream = ComPtr::from_raw(out).unwrap();
            let write = stream.vtbl::<ISequentialOutStreamVtbl>().write;
            let mut processed = 0;
            assert_eq!(write(stream.as_raw(), b"hello".as_ptr().cast(), 5, &mut processed), S_OK);
            assert_eq!(processed, 5);
            drop(stream);
            assert_eq!((vtbl.set_operation_result)(callback.as_raw(), 3), S_OK);
        }

        let recorder = recorder.lock().unwrap();
        assert_eq!(recorder.data, b"hello");
        assert_eq!(
            recorder.events,
            vec!["total 5", "begin 2 Extract", "finish 2 CrcError"]
        );
    }

    #[test]
    fn test_extract_callback_missing_password() {
        let sink: SharedSink = Arc::new(Mutex::new(Recorder::default()));
        let state = Arc::new(Mutex::new(ExtractState::default()));
        let callback = ExtractCallback::create(state.clone(), sink, SinkFailure::default());
        let crypto = query(&callback, &IID_ICRYPTO_GET_TEXT_PASSWORD);
        let mut bstr: Bstr = std::ptr::null_mut();
        let hr = unsafe {
            (crypto.vtbl::<ICryptoGetTextPasswordVtbl>().crypto_get_text_password)(
                crypto.as_raw(),
                &mut bstr,
            )
        };
        assert_eq!(hr, E_ABORT);
        assert!(state.lock().unwrap().password_missing);
    }
}
