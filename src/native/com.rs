//! COM-style ABI of the engine.
//!
//! Interface layouts, identifiers and result codes as declared by the
//! engine's headers, plus the plumbing shared by every Rust-implemented
//! engine object: reference counting, interface lookup and the [`ComPtr`]
//! guard that releases an object exactly once.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use super::propvariant::{Bstr, PropVariant};
use crate::string::WideChar;

/// Engine result code.
#[allow(clippy::upper_case_acronyms)]
pub type HRESULT = i32;

pub const S_OK: HRESULT = 0;
pub const S_FALSE: HRESULT = 1;
pub const E_NOTIMPL: HRESULT = 0x8000_4001_u32 as i32;
pub const E_NOINTERFACE: HRESULT = 0x8000_4002_u32 as i32;
pub const E_ABORT: HRESULT = 0x8000_4004_u32 as i32;
pub const E_FAIL: HRESULT = 0x8000_4005_u32 as i32;
pub const E_OUTOFMEMORY: HRESULT = 0x8007_000E_u32 as i32;
pub const E_INVALIDARG: HRESULT = 0x8007_0057_u32 as i32;
pub const CLASS_E_CLASSNOTAVAILABLE: HRESULT = 0x8004_0111_u32 as i32;
/// Win32 `ERROR_NEGATIVE_SEEK` wrapped as an HRESULT.
pub const E_NEGATIVE_SEEK: HRESULT = 0x8007_0083_u32 as i32;

/// A 128-bit interface or class identifier.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    /// First 32 bits.
    pub data1: u32,
    /// Next 16 bits.
    pub data2: u16,
    /// Next 16 bits.
    pub data3: u16,
    /// Final 64 bits as bytes.
    pub data4: [u8; 8],
}

impl Guid {
    const fn engine(data4: [u8; 8]) -> Self {
        Self {
            data1: 0x2317_0F69,
            data2: 0x40C1,
            data3: 0x278A,
            data4,
        }
    }

    /// Interface id `{23170F69-40C1-278A-0000-00gg00ii0000}`.
    pub const fn iid(group: u8, id: u8) -> Self {
        Self::engine([0, 0, 0, group, 0, id, 0, 0])
    }

    /// Format handler class id `{23170F69-40C1-278A-1000-000110xx0000}`.
    pub const fn format_class(id: u8) -> Self {
        Self::engine([0x10, 0, 0, 0x01, 0x10, id, 0, 0])
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

pub const IID_IUNKNOWN: Guid = Guid {
    data1: 0,
    data2: 0,
    data3: 0,
    data4: [0xC0, 0, 0, 0, 0, 0, 0, 0x46],
};
pub const IID_IPROGRESS: Guid = Guid::iid(0x00, 0x05);
pub const IID_ISEQUENTIAL_IN_STREAM: Guid = Guid::iid(0x03, 0x01);
pub const IID_ISEQUENTIAL_OUT_STREAM: Guid = Guid::iid(0x03, 0x02);
pub const IID_IIN_STREAM: Guid = Guid::iid(0x03, 0x03);
pub const IID_ICRYPTO_GET_TEXT_PASSWORD: Guid = Guid::iid(0x05, 0x10);
pub const IID_IARCHIVE_OPEN_CALLBACK: Guid = Guid::iid(0x06, 0x10);
pub const IID_IARCHIVE_EXTRACT_CALLBACK: Guid = Guid::iid(0x06, 0x20);
pub const IID_IARCHIVE_OPEN_VOLUME_CALLBACK: Guid = Guid::iid(0x06, 0x30);
pub const IID_IIN_ARCHIVE: Guid = Guid::iid(0x06, 0x60);

/// `IUnknown` slots, plus the destructor slots of p7zip-derived engines.
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface:
        unsafe extern "system" fn(*mut c_void, *const Guid, *mut *mut c_void) -> HRESULT,
    pub add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
    pub release: unsafe extern "system" fn(*mut c_void) -> u32,
    #[cfg(all(feature = "p7zip-abi", not(windows)))]
    pub destructor: unsafe extern "system" fn(*mut c_void),
    #[cfg(all(feature = "p7zip-abi", not(windows)))]
    pub deleting_destructor: unsafe extern "system" fn(*mut c_void),
}

impl IUnknownVtbl {
    /// `IUnknown` slots for interface `T` whose vtable pointer sits `OFFSET`
    /// bytes into the object.
    pub(crate) const fn new<T: ComObject, const OFFSET: usize>() -> Self {
        Self {
            query_interface: query_interface::<T, OFFSET>,
            add_ref: add_ref::<T, OFFSET>,
            release: release::<T, OFFSET>,
            #[cfg(all(feature = "p7zip-abi", not(windows)))]
            destructor: noop_destructor,
            #[cfg(all(feature = "p7zip-abi", not(windows)))]
            deleting_destructor: noop_destructor,
        }
    }
}

#[repr(C)]
pub struct ISequentialInStreamVtbl {
    pub base: IUnknownVtbl,
    pub read: unsafe extern "system" fn(*mut c_void, *mut c_void, u32, *mut u32) -> HRESULT,
}

#[repr(C)]
pub struct IInStreamVtbl {
    pub base: ISequentialInStreamVtbl,
    pub seek: unsafe extern "system" fn(*mut c_void, i64, u32, *mut u64) -> HRESULT,
}

#[repr(C)]
pub struct ISequentialOutStreamVtbl {
    pub base: IUnknownVtbl,
    pub write: unsafe extern "system" fn(*mut c_void, *const c_void, u32, *mut u32) -> HRESULT,
}

#[repr(C)]
pub struct IProgressVtbl {
    pub base: IUnknownVtbl,
    pub set_total: unsafe extern "system" fn(*mut c_void, u64) -> HRESULT,
    pub set_completed: unsafe extern "system" fn(*mut c_void, *const u64) -> HRESULT,
}

#[repr(C)]
pub struct IArchiveExtractCallbackVtbl {
    pub base: IProgressVtbl,
    pub get_stream: unsafe extern "system" fn(*mut c_void, u32, *mut *mut c_void, i32) -> HRESULT,
    pub prepare_operation: unsafe extern "system" fn(*mut c_void, i32) -> HRESULT,
    pub set_operation_result: unsafe extern "system" fn(*mut c_void, i32) -> HRESULT,
}

#[repr(C)]
pub struct IArchiveOpenCallbackVtbl {
    pub base: IUnknownVtbl,
    pub set_total: unsafe extern "system" fn(*mut c_void, *const u64, *const u64) -> HRESULT,
    pub set_completed: unsafe extern "system" fn(*mut c_void, *const u64, *const u64) -> HRESULT,
}

#[repr(C)]
pub struct IArchiveOpenVolumeCallbackVtbl {
    pub base: IUnknownVtbl,
    pub get_property: unsafe extern "system" fn(*mut c_void, u32, *mut PropVariant) -> HRESULT,
    pub get_stream:
        unsafe extern "system" fn(*mut c_void, *const WideChar, *mut *mut c_void) -> HRESULT,
}

#[repr(C)]
pub struct ICryptoGetTextPasswordVtbl {
    pub base: IUnknownVtbl,
    pub crypto_get_text_password: unsafe extern "system" fn(*mut c_void, *mut Bstr) -> HRESULT,
}

#[repr(C)]
pub struct IInArchiveVtbl {
    pub base: IUnknownVtbl,
    pub open:
        unsafe extern "system" fn(*mut c_void, *mut c_void, *const u64, *mut c_void) -> HRESULT,
    pub close: unsafe extern "system" fn(*mut c_void) -> HRESULT,
    pub get_number_of_items: unsafe extern "system" fn(*mut c_void, *mut u32) -> HRESULT,
    pub get_property:
        unsafe extern "system" fn(*mut c_void, u32, u32, *mut PropVariant) -> HRESULT,
    pub extract:
        unsafe extern "system" fn(*mut c_void, *const u32, u32, i32, *mut c_void) -> HRESULT,
    pub get_archive_property: unsafe extern "system" fn(*mut c_void, u32, *mut PropVariant) -> HRESULT,
    pub get_number_of_properties: unsafe extern "system" fn(*mut c_void, *mut u32) -> HRESULT,
    pub get_property_info:
        unsafe extern "system" fn(*mut c_void, u32, *mut Bstr, *mut u32, *mut u16) -> HRESULT,
    pub get_number_of_archive_properties: unsafe extern "system" fn(*mut c_void, *mut u32) -> HRESULT,
    pub get_archive_property_info:
        unsafe extern "system" fn(*mut c_void, u32, *mut Bstr, *mut u32, *mut u16) -> HRESULT,
}

/// A Rust struct exposed to the engine as a COM object.
///
/// # Safety
///
/// The implementing type must be `#[repr(C)]` with a vtable pointer at every
/// offset returned by [`interface_offset`](Self::interface_offset) and its
/// primary vtable pointer at offset 0. Objects are created through
/// [`ComPtr::new_object`] and freed by the last `Release`.
pub(crate) unsafe trait ComObject: Sized {
    /// Reference counter of the object.
    fn ref_count(&self) -> &AtomicU32;

    /// Byte offset of the vtable pointer implementing `iid`, if supported.
    fn interface_offset(iid: &Guid) -> Option<usize>;
}

unsafe extern "system" fn query_interface<T: ComObject, const OFFSET: usize>(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HRESULT {
    if out.is_null() || iid.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: `this` points OFFSET bytes into a live `T` per the vtable contract
    unsafe {
        let base = this.cast::<u8>().sub(OFFSET);
        let iid = &*iid;
        let offset = if *iid == IID_IUNKNOWN {
            Some(0)
        } else {
            T::interface_offset(iid)
        };
        match offset {
            Some(offset) => {
                (*base.cast::<T>()).ref_count().fetch_add(1, Ordering::Relaxed);
                *out = base.add(offset).cast();
                S_OK
            }
            None => {
                *out = std::ptr::null_mut();
                E_NOINTERFACE
            }
        }
    }
}

unsafe extern "system" fn add_ref<T: ComObject, const OFFSET: usize>(this: *mut c_void) -> u32 {
    // SAFETY: `this` points OFFSET bytes into a live `T`
    let object = unsafe { &*this.cast::<u8>().sub(OFFSET).cast::<T>() };
    object.ref_count().fetch_add(1, Ordering::Relaxed) + 1
}

unsafe extern "system" fn release<T: ComObject, const OFFSET: usize>(this: *mut c_void) -> u32 {
    // SAFETY: `this` points OFFSET bytes into a live `T` created by `Box::into_raw`
    unsafe {
        let base = this.cast::<u8>().sub(OFFSET).cast::<T>();
        let remaining = (*base).ref_count().fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            drop(Box::from_raw(base));
        }
        remaining
    }
}

#[cfg(all(feature = "p7zip-abi", not(windows)))]
unsafe extern "system" fn noop_destructor(_this: *mut c_void) {}

/// Owning pointer to an engine object.
///
/// Holds one reference, released on drop. Works for engine-created objects
/// and for Rust objects handed to the engine alike.
pub(crate) struct ComPtr {
    ptr: NonNull<c_void>,
}

impl ComPtr {
    /// Takes ownership of one reference to `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a valid COM interface pointer with a reference
    /// the caller transfers to the guard.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// Moves a Rust object onto the heap with a reference count of one.
    pub fn new_object<T: ComObject>(object: T) -> Self {
        object.ref_count().store(1, Ordering::Relaxed);
        let raw = Box::into_raw(Box::new(object));
        // SAFETY: Box::into_raw never returns null
        Self {
            ptr: unsafe { NonNull::new_unchecked(raw.cast()) },
        }
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// Releases ownership without decrementing the count.
    pub fn into_raw(self) -> *mut c_void {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// Returns the interface vtable.
    ///
    /// # Safety
    ///
    /// `V` must be the vtable layout of the interface this pointer holds.
    pub unsafe fn vtbl<V>(&self) -> &V {
        // SAFETY: every COM object starts with a pointer to its vtable
        unsafe { &**self.ptr.as_ptr().cast::<*const V>() }
    }
}

impl Drop for ComPtr {
    fn drop(&mut self) {
        // SAFETY: the guard owns exactly one reference
        unsafe {
            let vtbl = self.vtbl::<IUnknownVtbl>();
            (vtbl.release)(self.ptr.as_ptr());
        }
    }
}

/// Converts an engine result code into an `Error::Engine`.
pub(crate) fn check(hr: HRESULT, context: &'static str) -> crate::Result<()> {
    if hr == S_OK {
        Ok(())
    } else {
        Err(crate::Error::Engine {
            hresult: hr as u32,
            context,
        })
    }
}
