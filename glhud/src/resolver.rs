//! Recovery of the real loader entry points
//!
//! Once this library is preloaded, asking `dlsym` for `dlsym` is circular
//! (with the dlsym-hook feature it would resolve to us). The bootstrap
//! instead finds the loader library already mapped into the process,
//! parses its ELF image from disk, and rebases the dynamic-symbol values
//! against the mapping base. Runs exactly once behind a `OnceLock`;
//! failure is fatal because nothing downstream can reach the driver
//! without these two pointers.

use std::ffi::CStr;
use std::fs;
use std::sync::OnceLock;

use libc::{c_char, c_int, c_void};
use log::{debug, error};
use object::{Object, ObjectSymbol};

use crate::domain::ResolveError;

/// Signature of the real `dlopen`.
pub type DlopenFn = unsafe extern "C" fn(*const c_char, c_int) -> *mut c_void;
/// Signature of the real `dlsym`.
pub type DlsymFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void;

/// Loader libraries to search, in order. glibc 2.34 merged libdl into
/// libc proper, so the search must not stop at a matching library that
/// lacks the entry points (newer systems still map an empty libdl stub).
const LOADER_PATTERNS: [&str; 2] = ["libdl.so", "libc.so"];

/// The captured loader entry points.
#[derive(Debug, Clone, Copy)]
pub struct RealResolver {
    dlopen: DlopenFn,
    dlsym: DlsymFn,
}

static RESOLVER: OnceLock<RealResolver> = OnceLock::new();

impl RealResolver {
    /// The process-wide resolver, bootstrapping on first call.
    ///
    /// Terminates the process with a diagnostic when the loader cannot be
    /// recovered.
    pub fn get() -> &'static RealResolver {
        RESOLVER.get_or_init(|| match Self::locate() {
            Ok(resolver) => resolver,
            Err(e) => {
                error!("Loader bootstrap failed: {e}");
                crate::fatal(&format!("cannot recover real dlopen/dlsym: {e}"))
            }
        })
    }

    fn locate() -> Result<Self, ResolveError> {
        let maps = fs::read_to_string("/proc/self/maps")?;
        let (library, entry) = select_loader(&maps, extract_entry_points)?;
        debug!(
            "Loader library {} mapped at 0x{:x}; dlopen at 0x{:x}, dlsym at 0x{:x}",
            library.path, library.base, entry.dlopen, entry.dlsym
        );

        // SAFETY: both addresses are exported functions of the mapped
        // loader image, rebased to where the loader actually placed it,
        // and match the declared C prototypes.
        unsafe {
            Ok(Self {
                dlopen: std::mem::transmute::<usize, DlopenFn>(entry.dlopen),
                dlsym: std::mem::transmute::<usize, DlsymFn>(entry.dlsym),
            })
        }
    }
}

/// Rebased addresses of the two loader entry points in one candidate.
#[derive(Debug, Clone, Copy)]
struct LoaderEntryPoints {
    dlopen: usize,
    dlsym: usize,
}

/// Walk [`LOADER_PATTERNS`] in order and return the first mapped
/// candidate that yields both entry points.
///
/// A candidate that is mapped but cannot produce the symbols is skipped:
/// a process on glibc >= 2.34 can map the empty `libdl.so.2`
/// compatibility stub while its real `dlopen`/`dlsym` live in
/// `libc.so.6`.
fn select_loader<F>(
    maps: &str,
    mut extract: F,
) -> Result<(MappedLibrary, LoaderEntryPoints), ResolveError>
where
    F: FnMut(&MappedLibrary) -> Result<LoaderEntryPoints, ResolveError>,
{
    let mut last_error = None;
    for pattern in LOADER_PATTERNS {
        let Some(library) = find_mapped_library(maps, pattern) else { continue };
        match extract(&library) {
            Ok(entry) => return Ok((library, entry)),
            Err(e) => {
                debug!("Skipping loader candidate {}: {e}", library.path);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ResolveError::LoaderNotMapped(LOADER_PATTERNS.join(", "))))
}

/// Read a candidate's ELF image from disk and pull both entry points out
/// of its dynamic symbol table.
fn extract_entry_points(library: &MappedLibrary) -> Result<LoaderEntryPoints, ResolveError> {
    let image = fs::read(&library.path)?;
    Ok(LoaderEntryPoints {
        dlopen: dynamic_symbol(&image, library, "dlopen")?,
        dlsym: dynamic_symbol(&image, library, "dlsym")?,
    })
}

/// Forward a library-open to the real loader.
///
/// # Safety
/// Same contract as `dlopen`: `filename` is null or a valid C string.
pub unsafe fn real_dlopen(filename: *const c_char, flags: c_int) -> *mut c_void {
    let resolver = RealResolver::get();
    // SAFETY: forwarding the caller's own arguments.
    let handle = unsafe { (resolver.dlopen)(filename, flags) };
    if debug_dlopen() {
        // SAFETY: filename validity is the caller's contract.
        let name = unsafe { format_c_str(filename) };
        debug!("dlopen({name}, {}) -> {handle:?}", format_dlopen_flags(flags));
    }
    handle
}

/// Forward a symbol lookup to the real loader.
///
/// # Safety
/// Same contract as `dlsym`: `symbol` is a valid C string and `handle` is
/// a loader handle or one of the `RTLD_*` pseudo-handles.
pub unsafe fn real_dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    let resolver = RealResolver::get();
    // SAFETY: forwarding the caller's own arguments.
    let address = unsafe { (resolver.dlsym)(handle, symbol) };
    if debug_dlsym() {
        // SAFETY: symbol validity is the caller's contract.
        let name = unsafe { format_c_str(symbol) };
        debug!("dlsym({handle:?}, {name}) -> {address:?}");
    }
    address
}

pub(crate) fn debug_dlopen() -> bool {
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| std::env::var_os("GLHUD_DEBUG_DLOPEN").is_some())
}

pub(crate) fn debug_dlsym() -> bool {
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| std::env::var_os("GLHUD_DEBUG_DLSYM").is_some())
}

/// # Safety
/// `ptr` is null or a valid C string.
unsafe fn format_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return "NULL".to_string();
    }
    // SAFETY: non-null per the check above, NUL-terminated per the caller.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Render a dlopen flags word symbolically for the debug log.
fn format_dlopen_flags(flags: c_int) -> String {
    const NAMES: [(c_int, &str); 6] = [
        (libc::RTLD_LAZY, "RTLD_LAZY"),
        (libc::RTLD_NOW, "RTLD_NOW"),
        (libc::RTLD_GLOBAL, "RTLD_GLOBAL"),
        (libc::RTLD_NOLOAD, "RTLD_NOLOAD"),
        (libc::RTLD_DEEPBIND, "RTLD_DEEPBIND"),
        (libc::RTLD_NODELETE, "RTLD_NODELETE"),
    ];
    let parts: Vec<&str> = NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|&(_, name)| name)
        .collect();
    if parts.is_empty() {
        format!("{flags:#x}")
    } else {
        parts.join("|")
    }
}

#[derive(Debug, Clone)]
struct MappedLibrary {
    base: u64,
    path: String,
}

/// Find the lowest mapping base and backing path of the first library
/// whose file name contains `pattern`.
///
/// Lines look like "start-end perms offset dev inode pathname"; the
/// lowest start across a library's mappings is where the ELF header
/// landed, which is what symbol values rebase against.
fn find_mapped_library(maps: &str, pattern: &str) -> Option<MappedLibrary> {
    let mut base: Option<u64> = None;
    let mut path: Option<String> = None;

    for line in maps.lines() {
        let Some(file) = line.split_whitespace().nth(5) else { continue };
        let Some(name) = file.rsplit('/').next() else { continue };
        if !name.contains(pattern) {
            continue;
        }
        // Commit to the first matching library; a second one (another
        // soname revision, a container sysroot) must not skew the base.
        if path.as_deref().is_some_and(|p| p != file) {
            continue;
        }
        let Some((start_hex, _)) = line.split_once('-') else { continue };
        let Ok(start) = u64::from_str_radix(start_hex, 16) else { continue };
        base = Some(base.map_or(start, |b: u64| b.min(start)));
        path.get_or_insert_with(|| file.to_string());
    }

    Some(MappedLibrary { base: base?, path: path? })
}

/// Absolute, rebased address of `name` in the library's dynamic symbol
/// table.
fn dynamic_symbol(
    image: &[u8],
    library: &MappedLibrary,
    name: &'static str,
) -> Result<usize, ResolveError> {
    let file = object::File::parse(image).map_err(|e| ResolveError::ElfParseFailed {
        library: library.path.clone(),
        error: e.to_string(),
    })?;
    let symbol = file
        .dynamic_symbols()
        .filter(|sym| sym.address() != 0)
        .find(|sym| sym.name() == Ok(name))
        .ok_or_else(|| ResolveError::SymbolNotFound {
            symbol: name,
            library: library.path.clone(),
        })?;
    #[allow(clippy::cast_possible_truncation)]
    Ok((library.base + symbol.address()) as usize)
}
