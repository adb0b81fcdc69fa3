//! `PROPVARIANT` and `BSTR` marshaling.
//!
//! Property values cross the ABI as tagged unions; strings inside them are
//! length-prefixed `BSTR`s owned by whoever allocated them. On Windows the
//! OLE allocator is used; elsewhere the engine allocates with `malloc` and
//! stores the byte length in the four bytes before the string.

use crate::engine::PropValue;
use crate::string::{WideChar, from_wide};

/// Length-prefixed wide string pointer.
pub type Bstr = *mut WideChar;

pub const VT_EMPTY: u16 = 0;
pub const VT_I2: u16 = 2;
pub const VT_I4: u16 = 3;
pub const VT_BSTR: u16 = 8;
pub const VT_BOOL: u16 = 11;
pub const VT_I1: u16 = 16;
pub const VT_UI1: u16 = 17;
pub const VT_UI2: u16 = 18;
pub const VT_UI4: u16 = 19;
pub const VT_I8: u16 = 20;
pub const VT_UI8: u16 = 21;
pub const VT_INT: u16 = 22;
pub const VT_UINT: u16 = 23;
pub const VT_FILETIME: u16 = 64;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FileTimeParts {
    pub low: u32,
    pub high: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union PropVariantData {
    pub i8_val: i8,
    pub u8_val: u8,
    pub i16_val: i16,
    pub u16_val: u16,
    pub i32_val: i32,
    pub u32_val: u32,
    pub i64_val: i64,
    pub u64_val: u64,
    pub bool_val: i16,
    pub filetime: FileTimeParts,
    pub bstr_val: Bstr,
    /// Widest member of the Windows declaration (`BLOB` and friends).
    #[cfg(windows)]
    pub blob: [usize; 2],
}

/// An owned `PROPVARIANT`. Dropping it frees a contained `BSTR`.
#[repr(C)]
pub struct PropVariant {
    pub vt: u16,
    reserved1: u16,
    reserved2: u16,
    reserved3: u16,
    pub data: PropVariantData,
}

impl PropVariant {
    /// An empty variant ready to be filled by the engine.
    pub fn new() -> Self {
        Self::with(VT_EMPTY, PropVariantData { u64_val: 0 })
    }

    fn with(vt: u16, data: PropVariantData) -> Self {
        Self {
            vt,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            data,
        }
    }

    /// A `VT_BSTR` variant holding a freshly allocated copy of `s`.
    pub fn from_text(s: &str) -> Self {
        Self::with(
            VT_BSTR,
            PropVariantData {
                bstr_val: bstr_alloc(s),
            },
        )
    }

    /// A `VT_UI8` variant.
    pub fn from_u64(value: u64) -> Self {
        Self::with(VT_UI8, PropVariantData { u64_val: value })
    }

    /// Converts the variant into a [`PropValue`].
    ///
    /// Unknown variant types map to [`PropValue::Empty`].
    pub fn to_value(&self) -> PropValue {
        // SAFETY: each arm reads the union member selected by `vt`
        unsafe {
            match self.vt {
                VT_EMPTY => PropValue::Empty,
                VT_BOOL => PropValue::Bool(self.data.bool_val != 0),
                VT_I1 => PropValue::I32(i32::from(self.data.i8_val)),
                VT_I2 => PropValue::I32(i32::from(self.data.i16_val)),
                VT_I4 | VT_INT => PropValue::I32(self.data.i32_val),
                VT_I8 => PropValue::I64(self.data.i64_val),
                VT_UI1 => PropValue::U32(u32::from(self.data.u8_val)),
                VT_UI2 => PropValue::U32(u32::from(self.data.u16_val)),
                VT_UI4 | VT_UINT => PropValue::U32(self.data.u32_val),
                VT_UI8 => PropValue::U64(self.data.u64_val),
                VT_FILETIME => {
                    let ft = self.data.filetime;
                    PropValue::FileTime((u64::from(ft.high) << 32) | u64::from(ft.low))
                }
                VT_BSTR => PropValue::String(bstr_to_string(self.data.bstr_val)),
                other => {
                    log::trace!("unsupported variant type {}", other);
                    PropValue::Empty
                }
            }
        }
    }

    /// Clears the variant, freeing its string if any.
    pub fn clear(&mut self) {
        if self.vt == VT_BSTR {
            // SAFETY: vt says the union holds a BSTR we own
            unsafe { bstr_free(self.data.bstr_val) };
        }
        self.vt = VT_EMPTY;
        self.data = PropVariantData { u64_val: 0 };
    }
}

impl Default for PropVariant {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PropVariant {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Copies a `BSTR` into a Rust string. A null pointer reads as empty.
///
/// # Safety
///
/// `bstr` must be null or a valid `BSTR`.
pub unsafe fn bstr_to_string(bstr: Bstr) -> String {
    if bstr.is_null() {
        return String::new();
    }
    // SAFETY: a BSTR carries its byte length before the first character
    unsafe {
        let bytes = *bstr.cast::<u32>().sub(1) as usize;
        let units = std::slice::from_raw_parts(bstr, bytes / size_of::<WideChar>());
        from_wide(units)
    }
}

#[cfg(windows)]
#[link(name = "oleaut32")]
unsafe extern "system" {
    fn SysAllocStringLen(s: *const u16, len: u32) -> Bstr;
    fn SysFreeString(s: Bstr);
}

/// Allocates a `BSTR` the engine can free with `SysFreeString`.
///
/// Returns null if allocation fails.
#[cfg(windows)]
pub fn bstr_alloc(s: &str) -> Bstr {
    let wide = crate::string::to_wide(s);
    let units = wide.as_slice();
    // SAFETY: the pointer and length describe `units`
    unsafe { SysAllocStringLen(units.as_ptr(), units.len() as u32) }
}

/// Frees a `BSTR`. Null is ignored.
///
/// # Safety
///
/// `bstr` must be null or a `BSTR` allocated by the OLE allocator.
#[cfg(windows)]
pub unsafe fn bstr_free(bstr: Bstr) {
    if !bstr.is_null() {
        // SAFETY: guaranteed by the caller
        unsafe { SysFreeString(bstr) }
    }
}

/// Allocates a `BSTR` the engine can free with `SysFreeString`.
///
/// Returns null if allocation fails.
#[cfg(not(windows))]
pub fn bstr_alloc(s: &str) -> Bstr {
    let wide = crate::string::to_wide(s);
    let units = wide.as_slice();
    let bytes = units.len() * size_of::<WideChar>();
    let total = size_of::<u32>() + bytes + size_of::<WideChar>();
    // SAFETY: the block is large enough for prefix, characters and terminator
    unsafe {
        let block = libc::malloc(total).cast::<u32>();
        if block.is_null() {
            return std::ptr::null_mut();
        }
        block.write(bytes as u32);
        let chars = block.add(1).cast::<WideChar>();
        std::ptr::copy_nonoverlapping(units.as_ptr(), chars, units.len());
        chars.add(units.len()).write(0);
        chars
    }
}

/// Frees a `BSTR`. Null is ignored.
///
/// # Safety
///
/// `bstr` must be null or a `BSTR` allocated with `malloc` and a four-byte
/// length prefix, as the engine and [`bstr_alloc`] do.
#[cfg(not(windows))]
pub unsafe fn bstr_free(bstr: Bstr) {
    if !bstr.is_null() {
        // SAFETY: the allocation starts four bytes before the string
        unsafe { libc::free(bstr.cast::<u32>().sub(1).cast()) }
    }
}
