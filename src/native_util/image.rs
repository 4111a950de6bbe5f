#![cfg_attr(not(windows), allow(dead_code))]

use std::ffi::CStr;
use std::mem::size_of;
use std::os::raw::c_char;

const DOS_MAGIC: u16 = 0x5a4d;
const DOS_NT_HEADERS_OFFSET: usize = 0x3c;
const NT_SIGNATURE: u32 = 0x0000_4550;
const FILE_HEADER_SIZE: usize = 20;
const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;
const IMPORT_DIRECTORY: usize = 1;
const DATA_DIRECTORY_SIZE: usize = 8;
const IMPORT_DESCRIPTOR_SIZE: usize = 20;

/// Why an import slot could not be located in a loaded module.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    /// The headers are not those of a PE image.
    #[error("the module is not a PE image")]
    NotAnImage,
    /// The image was built for processes with a different pointer width.
    #[error("the module is built for {0}-bit processes")]
    PointerWidth(usize),
    /// The image imports nothing.
    #[error("the module has no import directory")]
    NoImports,
    /// Nothing is imported from the requested module.
    #[error("the module does not import anything from {0}")]
    ModuleNotImported(String),
    /// The requested module is imported, but not the requested function (or only by ordinal).
    #[error("the module does not import {function} from {module}")]
    FunctionNotImported {
        /// The module the function was looked up in.
        module: String,
        /// The function that was looked up.
        function: String,
    },
}

struct Image {
    base: *const u8,
}

impl Image {
    unsafe fn read<T: Copy>(&self, rva: usize) -> T {
        std::ptr::read_unaligned(self.base.add(rva) as *const T)
    }

    unsafe fn name(&self, rva: usize) -> &CStr {
        CStr::from_ptr(self.base.add(rva) as *const c_char)
    }

    unsafe fn import_directory(&self) -> Result<usize, ImageError> {
        if self.read::<u16>(0) != DOS_MAGIC {
            return Err(ImageError::NotAnImage);
        }
        let nt_headers = self.read::<u32>(DOS_NT_HEADERS_OFFSET) as usize;
        if self.read::<u32>(nt_headers) != NT_SIGNATURE {
            return Err(ImageError::NotAnImage);
        }
        let optional_header = nt_headers + 4 + FILE_HEADER_SIZE;
        let (thunk_size, directories) = match self.read::<u16>(optional_header) {
            PE32_MAGIC => (4, optional_header + 96),
            PE32_PLUS_MAGIC => (8, optional_header + 112),
            _ => return Err(ImageError::NotAnImage),
        };
        if thunk_size != size_of::<usize>() {
            return Err(ImageError::PointerWidth(thunk_size * 8));
        }
        // NumberOfRvaAndSizes sits right before the data directories.
        let directory_count = self.read::<u32>(directories - 4) as usize;
        if directory_count <= IMPORT_DIRECTORY {
            return Err(ImageError::NoImports);
        }
        match self.read::<u32>(directories + IMPORT_DIRECTORY * DATA_DIRECTORY_SIZE) {
            0 => Err(ImageError::NoImports),
            rva => Ok(rva as usize),
        }
    }

    unsafe fn find_in_thunks(
        &self,
        lookup_table: usize,
        address_table: usize,
        function: &CStr,
    ) -> Option<*mut usize> {
        let ordinal_flag = 1usize << (usize::BITS - 1);
        let mut index = 0;
        loop {
            let entry = self.read::<usize>(lookup_table + index * size_of::<usize>());
            if entry == 0 {
                return None;
            }
            // Skip the two-byte hint in front of the name.
            if entry & ordinal_flag == 0
                && self.name((entry & 0x7fff_ffff) + 2).to_bytes() == function.to_bytes()
            {
                return Some(self.base.add(address_table + index * size_of::<usize>()) as *mut usize);
            }
            index += 1;
        }
    }
}

/// Locates the import address table slot through which the module loaded at `base` calls
/// `function` imported from `module`. Module names compare case-insensitively.
///
/// # Safety
///
/// `base` must point to a module image mapped the way the loader maps it, or to a buffer laid out
/// the same way that stays alive while the returned slot is used.
pub unsafe fn find_import_slot(
    base: *const u8,
    module: &CStr,
    function: &CStr,
) -> Result<*mut usize, ImageError> {
    let image = Image {
        base,
    };
    let mut descriptor = image.import_directory()?;
    let mut module_seen = false;
    loop {
        let lookup_table = image.read::<u32>(descriptor) as usize;
        let name = image.read::<u32>(descriptor + 12) as usize;
        let address_table = image.read::<u32>(descriptor + 16) as usize;
        if name == 0 && address_table == 0 {
            break;
        }
        if image.name(name).to_bytes().eq_ignore_ascii_case(module.to_bytes()) {
            module_seen = true;
            let lookup_table = if lookup_table != 0 { lookup_table } else { address_table };
            if let Some(slot) = image.find_in_thunks(lookup_table, address_table, function) {
                return Ok(slot);
            }
        }
        descriptor += IMPORT_DESCRIPTOR_SIZE;
    }

    let module = module.to_string_lossy().into_owned();
    if module_seen {
        Err(ImageError::FunctionNotImported {
            module,
            function: function.to_string_lossy().into_owned(),
        })
    } else {
        Err(ImageError::ModuleNotImported(module))
    }
}
