//! Function pointers into the real GLX driver
//!
//! Populated once through the recovered loader, all entry points or
//! nothing. A missing symbol is fatal: the host's next call would jump
//! through null, so a loud abort during bootstrap is the only honest
//! failure mode.

use std::ffi::CStr;
use std::sync::OnceLock;

use libc::{c_char, c_int, c_uchar, c_void};
use log::{debug, error};

use crate::domain::{DriverError, GpuVendor, Viewport};
use crate::resolver::{real_dlopen, real_dlsym};

/// `glXCreateContext`
pub type CreateContextFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void, c_int) -> *mut c_void;
/// `glXMakeCurrent`; the return is an X11 Bool, not a Rust bool.
pub type MakeCurrentFn = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void) -> c_int;
/// `glXSwapBuffers`
pub type SwapBuffersFn = unsafe extern "C" fn(*mut c_void, *mut c_void);
/// `glXGetProcAddress` and its ARB twin
pub type GetProcAddressFn = unsafe extern "C" fn(*const c_uchar) -> *mut c_void;

type GetStringFn = unsafe extern "C" fn(u32) -> *const c_uchar;
type GetIntegervFn = unsafe extern "C" fn(u32, *mut i32);

const GL_RENDERER: u32 = 0x1F01;
const GL_VIEWPORT: u32 = 0x0BA2;

/// The driver library by the soname the loader resolves.
const DRIVER_LIBRARY: &CStr = c"libGL.so.1";

/// Real driver entry points, all-or-nothing.
pub struct DriverHandle {
    pub create_context: CreateContextFn,
    pub make_current: MakeCurrentFn,
    pub swap_buffers: SwapBuffersFn,
    pub get_proc_address: GetProcAddressFn,
    pub get_proc_address_arb: GetProcAddressFn,
    get_string: GetStringFn,
    get_integerv: GetIntegervFn,
}

static DRIVER: OnceLock<DriverHandle> = OnceLock::new();

impl DriverHandle {
    /// The process-wide handle, opening the driver on first call.
    ///
    /// Fatal when the driver library or any required symbol is missing.
    pub fn get() -> &'static DriverHandle {
        DRIVER.get_or_init(|| match Self::open() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Driver bootstrap failed: {e}");
                crate::fatal(&format!("cannot bind the real GLX driver: {e}"))
            }
        })
    }

    fn open() -> Result<Self, DriverError> {
        // SAFETY: DRIVER_LIBRARY is a static C string; plain RTLD bits.
        let library =
            unsafe { real_dlopen(DRIVER_LIBRARY.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
        if library.is_null() {
            return Err(DriverError::LibraryOpenFailed(
                DRIVER_LIBRARY.to_string_lossy().into_owned(),
            ));
        }

        let resolve = |name: &'static CStr| -> Result<*mut c_void, DriverError> {
            // SAFETY: name is a static C string, library is a live handle.
            let address = unsafe { real_dlsym(library, name.as_ptr()) };
            if address.is_null() {
                Err(DriverError::SymbolMissing(name.to_string_lossy().into_owned()))
            } else {
                Ok(address)
            }
        };

        let create_context = resolve(c"glXCreateContext")?;
        let make_current = resolve(c"glXMakeCurrent")?;
        let swap_buffers = resolve(c"glXSwapBuffers")?;
        let get_proc_address = resolve(c"glXGetProcAddress")?;
        let get_proc_address_arb = resolve(c"glXGetProcAddressARB")?;
        let get_string = resolve(c"glGetString")?;
        let get_integerv = resolve(c"glGetIntegerv")?;
        debug!("Bound GLX entry points from {DRIVER_LIBRARY:?}");

        // SAFETY: every pointer was resolved non-null from the driver
        // library and is reinterpreted at its documented prototype.
        unsafe {
            Ok(Self {
                create_context: std::mem::transmute::<*mut c_void, CreateContextFn>(create_context),
                make_current: std::mem::transmute::<*mut c_void, MakeCurrentFn>(make_current),
                swap_buffers: std::mem::transmute::<*mut c_void, SwapBuffersFn>(swap_buffers),
                get_proc_address: std::mem::transmute::<*mut c_void, GetProcAddressFn>(
                    get_proc_address,
                ),
                get_proc_address_arb: std::mem::transmute::<*mut c_void, GetProcAddressFn>(
                    get_proc_address_arb,
                ),
                get_string: std::mem::transmute::<*mut c_void, GetStringFn>(get_string),
                get_integerv: std::mem::transmute::<*mut c_void, GetIntegervFn>(get_integerv),
            })
        }
    }

    /// Resolve a symbol the way the driver would: the native lookup, its
    /// ARB twin, then the generic loader as a last resort. Null when
    /// nobody knows the name, which ordinary extension probing expects.
    ///
    /// # Safety
    /// `name` must be a valid C string.
    pub unsafe fn resolve_extension(&self, name: *const c_uchar) -> *mut c_void {
        // SAFETY: forwarded with the caller's contract intact.
        unsafe {
            let mut address = (self.get_proc_address)(name);
            if address.is_null() {
                address = (self.get_proc_address_arb)(name);
            }
            if address.is_null() {
                address = real_dlsym(libc::RTLD_NEXT, name.cast::<c_char>());
            }
            if address.is_null() {
                debug!(
                    "No provider for {}",
                    CStr::from_ptr(name.cast::<c_char>()).to_string_lossy()
                );
            }
            address
        }
    }

    /// Driver-reported renderer string. Null (no current context, exotic
    /// driver) becomes `None`.
    #[must_use]
    pub fn renderer_string(&self) -> Option<String> {
        // SAFETY: GL_RENDERER yields a static NUL-terminated string owned
        // by the driver, or null without a current context.
        unsafe {
            let text = (self.get_string)(GL_RENDERER);
            if text.is_null() {
                return None;
            }
            Some(CStr::from_ptr(text.cast::<c_char>()).to_string_lossy().into_owned())
        }
    }

    /// Host viewport as the driver currently sees it.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        let mut raw = [0i32; 4];
        // SAFETY: GL_VIEWPORT writes exactly four integers.
        unsafe { (self.get_integerv)(GL_VIEWPORT, raw.as_mut_ptr()) };
        Viewport { x: raw[0], y: raw[1], width: raw[2], height: raw[3] }
    }

    /// GPU vendor inferred from the renderer string.
    #[must_use]
    pub fn gpu_vendor(&self) -> Option<GpuVendor> {
        let renderer = self.renderer_string()?;
        let vendor = GpuVendor::from_renderer(&renderer);
        debug!("GL renderer: {renderer} ({vendor:?})");
        Some(vendor)
    }
}
