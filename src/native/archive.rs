//! Engine-owned input archive.

use std::io::Seek;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use super::Library;
use super::callback::{ExtractCallback, ExtractState, OpenCallback, OpenState};
use super::com::{ComPtr, E_FAIL, HRESULT, IInArchiveVtbl, S_FALSE, S_OK, check};
use super::propvariant::{Bstr, PropVariant, bstr_free};
use super::stream::{InStream, SinkFailure};
use crate::engine::{
    EngineArchive, ExtractMode, OpenRequest, PropValue, PropertyId, SharedSink,
};
use crate::format::ArchiveFormat;
use crate::password::Password;
use crate::source::{SharedStream, lock_stream};
use crate::{Error, Result};

/// How far into a stream the engine scans for a signature by default.
pub const DEFAULT_MAX_CHECK_START_POSITION: u64 = 1 << 22;

/// An `IInArchive` opened by the engine.
///
/// Borrows the [`Library`] so the shared object stays loaded while any
/// archive is alive. Dropping it closes the archive, then releases it.
pub(crate) struct NativeArchive<'lib> {
    archive: ComPtr,
    format: ArchiveFormat,
    volumes: u32,
    _library: PhantomData<&'lib Library>,
}

impl<'lib> NativeArchive<'lib> {
    /// Opens `stream` with a freshly created handler object.
    pub fn open(
        archive: ComPtr,
        format: ArchiveFormat,
        stream: SharedStream,
        request: &OpenRequest<'_>,
    ) -> Result<Self> {
        lock_stream(&stream).rewind()?;

        let state = Arc::new(Mutex::new(OpenState::for_request(request)));
        let in_stream = InStream::create(stream);
        let callback = OpenCallback::create(state.clone());
        let max_check = request
            .max_check_start_position
            .unwrap_or(DEFAULT_MAX_CHECK_START_POSITION);

        // SAFETY: `archive` holds an IInArchive; the engine takes its own
        // references to the stream and callback if it keeps them
        let hr = unsafe {
            let vtbl = archive.vtbl::<IInArchiveVtbl>();
            (vtbl.open)(archive.as_raw(), in_stream.as_raw(), &max_check, callback.as_raw())
        };
        drop(callback);
        drop(in_stream);

        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if hr != S_OK {
            return Err(open_error(format, hr, &state));
        }
        if state.volumes > 1 {
            log::debug!("{} archive spans {} volumes", format, state.volumes);
        }

        Ok(Self {
            archive,
            format,
            volumes: state.volumes,
            _library: PhantomData,
        })
    }

    fn vtbl(&self) -> &IInArchiveVtbl {
        // SAFETY: `archive` was created with IID_IInArchive
        unsafe { self.archive.vtbl::<IInArchiveVtbl>() }
    }
}

fn open_error(format: ArchiveFormat, hr: HRESULT, state: &OpenState) -> Error {
    if state.password_asked {
        return if state.password.is_some() {
            Error::WrongPassword { index: None }
        } else {
            Error::PasswordRequired
        };
    }
    if hr == S_FALSE || hr == E_FAIL {
        log::debug!("{} handler rejected the data ({:#010x})", format, hr as u32);
        return Error::FormatMismatch { format };
    }
    Error::Engine {
        hresult: hr as u32,
        context: "open archive",
    }
}

impl EngineArchive for NativeArchive<'_> {
    fn item_count(&self) -> Result<u32> {
        let mut count = 0u32;
        // SAFETY: valid archive and out pointer
        let hr = unsafe { (self.vtbl().get_number_of_items)(self.archive.as_raw(), &mut count) };
        check(hr, "count items")?;
        Ok(count)
    }

    fn item_property(&self, index: u32, property: PropertyId) -> Result<PropValue> {
        let mut value = PropVariant::new();
        // SAFETY: valid archive and out pointer
        let hr = unsafe {
            (self.vtbl().get_property)(self.archive.as_raw(), index, property.id(), &mut value)
        };
        check(hr, "read item property")?;
        let value = value.to_value();
        log::trace!("item {} {} = {:?}", index, property, value);
        Ok(value)
    }

    fn archive_property(&self, property: PropertyId) -> Result<PropValue> {
        let mut value = PropVariant::new();
        // SAFETY: valid archive and out pointer
        let hr = unsafe {
            (self.vtbl().get_archive_property)(self.archive.as_raw(), property.id(), &mut value)
        };
        check(hr, "read archive property")?;
        Ok(value.to_value())
    }

    fn archive_property_ids(&self) -> Result<Vec<PropertyId>> {
        let vtbl = self.vtbl();
        let mut count = 0u32;
        // SAFETY: valid archive and out pointer
        let hr = unsafe { (vtbl.get_number_of_archive_properties)(self.archive.as_raw(), &mut count) };
        check(hr, "count archive properties")?;

        let mut ids = Vec::with_capacity(count as usize);
        for i in 0..count {
            let mut name: Bstr = std::ptr::null_mut();
            let mut prop_id = 0u32;
            let mut var_type = 0u16;
            // SAFETY: valid archive and out pointers; the name is ours to free
            let hr = unsafe {
                let hr = (vtbl.get_archive_property_info)(
                    self.archive.as_raw(),
                    i,
                    &mut name,
                    &mut prop_id,
                    &mut var_type,
                );
                bstr_free(name);
                hr
            };
            if hr == S_OK {
                ids.push(PropertyId::from_id(prop_id));
            }
        }
        Ok(ids)
    }

    fn opened_volumes(&self) -> u32 {
        self.volumes
    }

    fn extract(
        &self,
        indices: Option<&[u32]>,
        mode: ExtractMode,
        sink: SharedSink,
        password: Option<&Password>,
    ) -> Result<()> {
        let (ptr, count) = match indices {
            Some([]) => return Ok(()),
            Some(list) => (list.as_ptr(), list.len() as u32),
            // All items.
            None => (std::ptr::null(), u32::MAX),
        };

        let state = Arc::new(Mutex::new(ExtractState {
            password: password.cloned(),
            ..ExtractState::default()
        }));
        let failure = SinkFailure::default();
        let callback = ExtractCallback::create(state.clone(), sink, failure.clone());
        let test_mode = i32::from(mode == ExtractMode::Test);

        log::debug!("{:?} {} archive ({} items requested)", mode, self.format, count);
        // SAFETY: `ptr` and `count` describe a sorted index list or request
        // every item; the callback outlives the call
        let hr = unsafe {
            (self.vtbl().extract)(self.archive.as_raw(), ptr, count, test_mode, callback.as_raw())
        };
        drop(callback);

        if let Some(e) = failure.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(Error::Io(e));
        }
        if state.lock().unwrap_or_else(PoisonError::into_inner).password_missing {
            return Err(Error::PasswordRequired);
        }
        check(hr, "extract")
    }
}

impl Drop for NativeArchive<'_> {
    fn drop(&mut self) {
        // SAFETY: the archive is open; Close is valid exactly once here
        let hr = unsafe { (self.vtbl().close)(self.archive.as_raw()) };
        if hr != S_OK {
            log::debug!("closing {} archive returned {:#010x}", self.format, hr as u32);
        }
    }
}
