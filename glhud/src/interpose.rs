//! Exported driver entry points and the interposition table
//!
//! These symbols shadow the real driver's because this library sits ahead
//! of it in the loader's search order. Every export forwards to the real
//! implementation and only adds bookkeeping around the call; any name not
//! in the table passes through untouched. The table is fixed at compile
//! time and [`find`] is a pure lookup over it.

#![allow(non_snake_case)]

use std::ffi::CStr;

use libc::{c_char, c_int, c_uchar, c_void};
use log::debug;

use crate::driver::DriverHandle;
use crate::runtime::OverlayRuntime;

/// One interposed export.
pub struct SymbolBinding {
    name: &'static CStr,
    replacement: *const (),
}

// SAFETY: replacement is a function address; function text is immutable
// for the process lifetime.
unsafe impl Sync for SymbolBinding {}

/// Every symbol this layer interposes. Names are matched exactly and
/// case-sensitively.
static INTERPOSED: [SymbolBinding; 5] = [
    SymbolBinding { name: c"glXGetProcAddress", replacement: glXGetProcAddress as *const () },
    SymbolBinding { name: c"glXGetProcAddressARB", replacement: glXGetProcAddressARB as *const () },
    SymbolBinding { name: c"glXCreateContext", replacement: glXCreateContext as *const () },
    SymbolBinding { name: c"glXMakeCurrent", replacement: glXMakeCurrent as *const () },
    SymbolBinding { name: c"glXSwapBuffers", replacement: glXSwapBuffers as *const () },
];

/// The replacement for `name`, if interposed.
#[must_use]
pub fn find(name: &CStr) -> Option<*const ()> {
    INTERPOSED.iter().find(|binding| binding.name == name).map(|binding| binding.replacement)
}

/// Extension-address lookup. Substitutes interposed names, otherwise
/// falls through to the real lookup chain.
///
/// # Safety
/// `proc_name` must be a valid C string, per the GLX contract.
#[no_mangle]
pub unsafe extern "C" fn glXGetProcAddress(proc_name: *const c_uchar) -> *mut c_void {
    crate::init_logging();
    // SAFETY: the host passed a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(proc_name.cast::<c_char>()) };
    if let Some(replacement) = find(name) {
        debug!("Interposing {}", name.to_string_lossy());
        return replacement.cast_mut().cast::<c_void>();
    }
    // SAFETY: forwarding the caller's own pointer.
    unsafe { DriverHandle::get().resolve_extension(proc_name) }
}

/// ARB-suffixed twin of [`glXGetProcAddress`], identical semantics.
///
/// # Safety
/// `proc_name` must be a valid C string, per the GLX contract.
#[no_mangle]
pub unsafe extern "C" fn glXGetProcAddressARB(proc_name: *const c_uchar) -> *mut c_void {
    // SAFETY: same contract, same chain.
    unsafe { glXGetProcAddress(proc_name) }
}

/// Context creation: forward, then note the new context.
///
/// # Safety
/// Arguments follow the GLX contract and are forwarded verbatim.
#[no_mangle]
pub unsafe extern "C" fn glXCreateContext(
    display: *mut c_void,
    visual: *mut c_void,
    share_list: *mut c_void,
    direct: c_int,
) -> *mut c_void {
    crate::init_logging();
    let driver = DriverHandle::get();
    // SAFETY: real call with the caller's own arguments.
    let context = unsafe { (driver.create_context)(display, visual, share_list, direct) };
    OverlayRuntime::get().context_created(context);
    context
}

/// Context activation: forward, and only on success update the overlay
/// bookkeeping. A null `context` tears every overlay down.
///
/// # Safety
/// Arguments follow the GLX contract and are forwarded verbatim.
#[no_mangle]
pub unsafe extern "C" fn glXMakeCurrent(
    display: *mut c_void,
    drawable: *mut c_void,
    context: *mut c_void,
) -> c_int {
    crate::init_logging();
    let driver = DriverHandle::get();
    // SAFETY: real call with the caller's own arguments.
    let ok = unsafe { (driver.make_current)(display, drawable, context) };
    if ok != 0 {
        OverlayRuntime::get().context_activated(context);
    }
    ok
}

/// Buffer presentation: frame accounting and the HUD draw happen first,
/// then the real swap.
///
/// # Safety
/// Arguments follow the GLX contract and are forwarded verbatim.
#[no_mangle]
pub unsafe extern "C" fn glXSwapBuffers(display: *mut c_void, drawable: *mut c_void) {
    crate::init_logging();
    let driver = DriverHandle::get();
    OverlayRuntime::get().frame_presented();
    // SAFETY: real call with the caller's own arguments.
    unsafe { (driver.swap_buffers)(display, drawable) };
}

/// Generic resolver override. Lookups naming an interposed symbol get the
/// replacement; everything else forwards to the real `dlsym`.
///
/// # Safety
/// Same contract as `dlsym`.
#[cfg(feature = "dlsym-hook")]
#[no_mangle]
pub unsafe extern "C" fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    crate::init_logging();
    if !symbol.is_null() {
        // SAFETY: non-null symbol is NUL-terminated per the dlsym contract.
        let name = unsafe { CStr::from_ptr(symbol) };
        if let Some(replacement) = find(name) {
            debug!("dlsym({}) interposed", name.to_string_lossy());
            return replacement.cast_mut().cast::<c_void>();
        }
    }
    // SAFETY: forwarding the caller's own arguments.
    unsafe { crate::resolver::real_dlsym(handle, symbol) }
}
