//! `pthread_mutex_*` replacements, for loading the library with `LD_PRELOAD`.
//!
//! The backend lives directly in the `pthread_mutex_t` storage. A statically
//! initialised `pthread_mutex_t` is all zeros with glibc, which is also an
//! uninitialised backend mutex. Mutex attributes are ignored.

use crate::ffi::{Backend, backend};
use std::mem::{align_of, size_of};
use std::os::raw::c_int;

const _: () = {
    assert!(size_of::<Backend>() <= size_of::<libc::pthread_mutex_t>());
    assert!(align_of::<Backend>() <= align_of::<libc::pthread_mutex_t>());
};

/// # Safety
/// `mutex` must be NULL or point to a `pthread_mutex_t` nobody is using.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pthread_mutex_init(
    mutex: *mut libc::pthread_mutex_t,
    _attr: *const libc::pthread_mutexattr_t,
) -> c_int {
    if mutex.is_null() {
        return libc::EINVAL;
    }
    // SAFETY: the storage is large and aligned enough, see above.
    unsafe { mutex.cast::<Backend>().write(Backend::new()) };
    0
}

/// # Safety
/// `mutex` must be NULL or an initialised, unlocked mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pthread_mutex_destroy(mutex: *mut libc::pthread_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            // SAFETY: the caller guarantees nobody holds or waits for the mutex.
            unsafe { m.destroy() };
            0
        }
        None => libc::EINVAL,
    }
}

/// # Safety
/// `mutex` must be NULL or an initialised mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            m.lock();
            0
        }
        None => libc::EINVAL,
    }
}

/// # Safety
/// `mutex` must be NULL or a mutex held by the calling thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) => {
            // SAFETY: the caller holds the mutex.
            unsafe { m.unlock() };
            0
        }
        None => libc::EINVAL,
    }
}

/// # Safety
/// `mutex` must be NULL or an initialised mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pthread_mutex_trylock(mutex: *mut libc::pthread_mutex_t) -> c_int {
    // SAFETY: forwarded caller contract.
    match unsafe { backend(mutex) } {
        Some(m) if m.trylock() => 0,
        Some(_) => libc::EBUSY,
        None => libc::EINVAL,
    }
}
