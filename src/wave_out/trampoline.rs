use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{error, warn};

use crate::ducking::DeviceHandle;
use crate::hook::EntryPoint;
use crate::native_util::fn_from_addr;

use super::{WaveOutInterceptor, MMSYSERR_ERROR, MMSYSERR_NOERROR, WAVE_FORMAT_QUERY};

/// The signature of `waveOutOpen`.
pub type WaveOutOpenFn =
    unsafe extern "system" fn(*mut isize, u32, *const c_void, usize, usize, u32) -> u32;

/// The signature of `waveOutClose`.
pub type WaveOutCloseFn = unsafe extern "system" fn(isize) -> u32;

// The engine calls the trampolines through bare function pointers, so this is the only place they
// can find the interceptors and the functions they replace. The most recently activated
// interceptor receives the devices.
static INTERCEPTORS: RwLock<Vec<Arc<WaveOutInterceptor>>> = RwLock::new(Vec::new());
// Never cleared: a trampoline left behind in someone else's chain keeps forwarding.
static REAL_OPEN: AtomicUsize = AtomicUsize::new(0);
static REAL_CLOSE: AtomicUsize = AtomicUsize::new(0);

pub(super) fn activate(interceptor: &Arc<WaveOutInterceptor>) {
    let mut active = INTERCEPTORS.write().unwrap_or_else(PoisonError::into_inner);
    active.retain(|active| !Arc::ptr_eq(active, interceptor));
    active.push(interceptor.clone());
}

pub(super) fn deactivate(interceptor: &Arc<WaveOutInterceptor>) {
    INTERCEPTORS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|active| !Arc::ptr_eq(active, interceptor));
}

pub(super) fn set_real_open(entry: EntryPoint) {
    set_real(&REAL_OPEN, entry, open_entry_point(), "waveOutOpen");
}

pub(super) fn set_real_close(entry: EntryPoint) {
    set_real(&REAL_CLOSE, entry, close_entry_point(), "waveOutClose");
}

fn set_real(real: &AtomicUsize, entry: EntryPoint, trampoline: EntryPoint, name: &str) {
    // Forwarding to ourselves would recurse until the stack runs out.
    if entry == trampoline || entry.is_null() {
        warn!("Keeping the previous target of {}: the slot held {:#x}", name, entry.addr());
        return;
    }
    real.store(entry.addr(), Ordering::SeqCst);
}

pub(super) fn open_entry_point() -> EntryPoint {
    EntryPoint::new(wave_out_open as WaveOutOpenFn as usize)
}

pub(super) fn close_entry_point() -> EntryPoint {
    EntryPoint::new(wave_out_close as WaveOutCloseFn as usize)
}

fn interceptor() -> Option<Arc<WaveOutInterceptor>> {
    INTERCEPTORS.read().unwrap_or_else(PoisonError::into_inner).last().cloned()
}

unsafe extern "system" fn wave_out_open(
    handle_out: *mut isize,
    device_id: u32,
    format: *const c_void,
    callback: usize,
    instance: usize,
    flags: u32,
) -> u32 {
    let real = REAL_OPEN.load(Ordering::SeqCst);
    if real == 0 {
        error!("waveOutOpen was intercepted with no function to forward to");
        return MMSYSERR_ERROR;
    }
    let real: WaveOutOpenFn = fn_from_addr(real);
    let result = real(handle_out, device_id, format, callback, instance, flags);

    let handle = if result == MMSYSERR_NOERROR
        && !handle_out.is_null()
        && flags & WAVE_FORMAT_QUERY == 0
    {
        Some(DeviceHandle(handle_out.read()))
    } else {
        None
    };
    match interceptor() {
        Some(interceptor) => interceptor.device_opened(result, handle),
        None => result,
    }
}

unsafe extern "system" fn wave_out_close(handle: isize) -> u32 {
    let real = REAL_CLOSE.load(Ordering::SeqCst);
    if real == 0 {
        error!("waveOutClose was intercepted with no function to forward to");
        return MMSYSERR_ERROR;
    }
    let real: WaveOutCloseFn = fn_from_addr(real);
    let result = real(handle);

    match interceptor() {
        Some(interceptor) => interceptor.device_closed(result, DeviceHandle(handle)),
        None => result,
    }
}
