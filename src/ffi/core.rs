use crate::core::Mutrep;
use crate::ffi::selected;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::sync::atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize mutrep diagnostics.
///
/// Optional: mutexes work without it, reporting to stderr. Call it once,
/// before the first mutex operation, to redirect or silence diagnostics.
///
/// # Arguments
/// * `log_path` - Path of a JSON-lines log file as a null-terminated C string,
///   or NULL to configure from the `MUTREP_LOG` environment variable.
///
/// # Returns
/// * `0` on success
/// * `1` if mutrep is already initialized
/// * `-1` if the log path contains invalid UTF-8
/// * `-2` if the logger failed to initialize
///
/// # Safety
/// `log_path` must be NULL or a valid null-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mutrep_init(log_path: *const c_char) -> c_int {
    if INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return 1; // Already initialized
    }

    let config = if log_path.is_null() {
        Mutrep::from_env()
    } else {
        // SAFETY: caller guarantees a valid C string.
        match unsafe { CStr::from_ptr(log_path) }.to_str() {
            Ok(path) => Mutrep::new().with_log(path),
            Err(_) => {
                INITIALIZED.store(false, Ordering::SeqCst);
                return -1; // Invalid UTF-8
            }
        }
    };

    match config.start() {
        Ok(()) => 0,
        Err(_) => {
            INITIALIZED.store(false, Ordering::SeqCst);
            -2
        }
    }
}

/// Name of the compiled-in backend, as a static null-terminated string.
#[unsafe(no_mangle)]
pub extern "C" fn mutrep_backend_name() -> *const c_char {
    selected::NAME.as_ptr()
}
