use std::os::raw::{c_int, c_void};
use std::sync::{Arc, PoisonError, RwLock};

use log::trace;

use super::{CallbackEvent, PlaybackBridge};

/// The callback the engine raises its playback events through.
pub type NativeCallback = unsafe extern "C" fn(kind: c_int, marker: *mut c_void);

// The engine accepts a bare function pointer, so the callback finds its bridge here.
static ACTIVE: RwLock<Option<Arc<PlaybackBridge>>> = RwLock::new(None);

pub(crate) fn route_to(bridge: &Arc<PlaybackBridge>) {
    *ACTIVE.write().unwrap_or_else(PoisonError::into_inner) = Some(bridge.clone());
}

pub(crate) fn unroute(bridge: &Arc<PlaybackBridge>) {
    let mut active = ACTIVE.write().unwrap_or_else(PoisonError::into_inner);
    if active.as_ref().map_or(false, |active| Arc::ptr_eq(active, bridge)) {
        *active = None;
    }
}

/// Returns the callback to register with the engine.
pub(crate) fn native_callback() -> NativeCallback {
    playback_callback
}

unsafe extern "C" fn playback_callback(kind: c_int, marker: *mut c_void) {
    let bridge = ACTIVE.read().unwrap_or_else(PoisonError::into_inner).clone();
    match (bridge, CallbackEvent::from_native(kind, marker)) {
        (Some(bridge), Some(event)) => bridge.dispatch(event),
        (None, _) => trace!("Playback event {} arrived with no engine session", kind),
        (_, None) => trace!("Ignoring unknown playback event {}", kind),
    }
}
