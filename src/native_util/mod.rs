mod image;
mod slot;
mod str;

#[cfg(windows)]
pub use self::image::find_import_slot;
pub use self::image::ImageError;
#[cfg(windows)]
pub use self::slot::write_slot;
pub use self::str::{ansi_name, to_native, EncodingError};

/// Reinterprets a pointer-sized address as a function pointer of type `F`.
pub unsafe fn fn_from_addr<F: Copy>(addr: usize) -> F {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
    std::mem::transmute_copy(&addr)
}
