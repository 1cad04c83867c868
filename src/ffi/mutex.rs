use crate::ffi::{backend, mutrep_mutex_t};
use std::os::raw::c_int;

/// Initialize a mutex.
///
/// Optional for zero-filled storage: every operation initializes lazily.
///
/// # Returns
/// * `0` on success
/// * `-1` if the mutex pointer is NULL
///
/// # Safety
/// `mutex` must be NULL or point to zero-filled storage, or to a mutex only
/// ever used through these functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mutrep_mutex_init(mutex: *mut mutrep_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            m.init();
            0
        }
        None => -1,
    }
}

/// Destroy a mutex, returning it to its zero-filled state.
///
/// Concurrent calls on one mutex are allowed; one of them does the work.
///
/// # Returns
/// * `0` on success
/// * `-1` if the mutex pointer is NULL
///
/// # Safety
/// - `mutex` must satisfy the contract of `mutrep_mutex_init`.
/// - No thread may hold, wait for, or start locking the mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mutrep_mutex_destroy(mutex: *mut mutrep_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            // SAFETY: the caller guarantees nobody holds or waits for the mutex.
            unsafe { m.destroy() };
            0
        }
        None => -1,
    }
}

/// Lock a mutex, spinning until it is acquired.
///
/// # Returns
/// * `0` on success
/// * `-1` if the mutex pointer is NULL
///
/// # Safety
/// `mutex` must satisfy the contract of `mutrep_mutex_init`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mutrep_mutex_lock(mutex: *mut mutrep_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            m.lock();
            0
        }
        None => -1,
    }
}

/// Unlock a mutex.
///
/// # Returns
/// * `0` on success
/// * `-1` if the mutex pointer is NULL
///
/// # Safety
/// - `mutex` must satisfy the contract of `mutrep_mutex_init`.
/// - The calling thread must hold the mutex; with the default backend,
///   mutexes must be unlocked in reverse locking order.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mutrep_mutex_unlock(mutex: *mut mutrep_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            // SAFETY: the caller holds the mutex.
            unsafe { m.unlock() };
            0
        }
        None => -1,
    }
}

/// Try to lock a mutex without waiting.
///
/// # Returns
/// `true` if the mutex was acquired, `false` if it is held or the pointer is
/// NULL
///
/// # Safety
/// `mutex` must satisfy the contract of `mutrep_mutex_init`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mutrep_mutex_trylock(mutex: *mut mutrep_mutex_t) -> bool {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => m.trylock(),
        None => false,
    }
}
