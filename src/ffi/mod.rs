//! C ABI for mutrep
//!
//! Exposes the lazily initialised mutex to C through an opaque, fixed-size
//! `mutrep_mutex_t`. Exactly one backend (lock algorithm plus context store)
//! is compiled in, chosen by cargo feature; without a backend feature the MCS
//! lock with per-thread context arenas is used.
//!
//! A zero-filled `mutrep_mutex_t` is a valid, uninitialised mutex, so static
//! storage needs no initialiser call.

mod core;
mod mutex;

#[cfg(feature = "interpose")]
mod interpose;

pub use self::core::{mutrep_backend_name, mutrep_init};
pub use self::mutex::{
    mutrep_mutex_destroy, mutrep_mutex_init, mutrep_mutex_lock, mutrep_mutex_trylock,
    mutrep_mutex_unlock,
};

#[cfg(feature = "interpose")]
pub use self::interpose::{
    pthread_mutex_destroy, pthread_mutex_init, pthread_mutex_lock, pthread_mutex_trylock,
    pthread_mutex_unlock,
};

use std::mem::{align_of, size_of};

/// Size of the opaque C mutex, in bytes
pub const MUTREP_MUTEX_SIZE: usize = 40;

/// Opaque storage of a C mutex
#[repr(C, align(8))]
#[allow(non_camel_case_types)]
pub struct mutrep_mutex_t {
    opaque: [u8; MUTREP_MUTEX_SIZE],
}

/// Static initialiser: an all-zero, uninitialised mutex
pub const MUTREP_MUTEX_INITIALIZER: mutrep_mutex_t = mutrep_mutex_t {
    opaque: [0; MUTREP_MUTEX_SIZE],
};

impl Default for mutrep_mutex_t {
    fn default() -> Self {
        MUTREP_MUTEX_INITIALIZER
    }
}

#[cfg(feature = "backend-cas")]
mod selected {
    use crate::core::algo::CasLock;
    use crate::core::context::NoContext;
    pub type Backend = crate::core::LazyMutex<CasLock, NoContext>;
    pub const NAME: &std::ffi::CStr = c"caslock";
}

#[cfg(all(not(feature = "backend-cas"), feature = "backend-ticket"))]
mod selected {
    use crate::core::algo::TicketLock;
    use crate::core::context::NoContext;
    pub type Backend = crate::core::LazyMutex<TicketLock, NoContext>;
    pub const NAME: &std::ffi::CStr = c"ticketlock";
}

#[cfg(all(
    not(any(feature = "backend-cas", feature = "backend-ticket")),
    feature = "backend-fastslow"
))]
mod selected {
    use crate::core::algo::FastSlowLock;
    use crate::core::context::NoContext;
    pub type Backend = crate::core::LazyMutex<FastSlowLock, NoContext>;
    pub const NAME: &std::ffi::CStr = c"fastslowlock";
}

#[cfg(all(
    not(any(
        feature = "backend-cas",
        feature = "backend-ticket",
        feature = "backend-fastslow"
    )),
    feature = "backend-mcs-keyed"
))]
mod selected {
    use crate::core::algo::McsLock;
    use crate::core::context::KeyedContext;
    pub type Backend = crate::core::LazyMutex<McsLock, KeyedContext>;
    pub const NAME: &std::ffi::CStr = c"mcslock+keyed";
}

#[cfg(all(
    not(any(
        feature = "backend-cas",
        feature = "backend-ticket",
        feature = "backend-fastslow",
        feature = "backend-mcs-keyed"
    )),
    feature = "backend-mcs-heap"
))]
mod selected {
    use crate::core::algo::McsLock;
    use crate::core::context::HeapContext;
    pub type Backend = crate::core::LazyMutex<McsLock, HeapContext>;
    pub const NAME: &std::ffi::CStr = c"mcslock+heap";
}

#[cfg(all(
    not(any(
        feature = "backend-cas",
        feature = "backend-ticket",
        feature = "backend-fastslow",
        feature = "backend-mcs-keyed",
        feature = "backend-mcs-heap"
    )),
    feature = "backend-cna"
))]
mod selected {
    use crate::core::context::ArenaContext;
    use crate::core::topology::NumaCnaLock;
    pub type Backend = crate::core::LazyMutex<NumaCnaLock, ArenaContext>;
    pub const NAME: &std::ffi::CStr = c"numa_cnalock";
}

#[cfg(all(
    not(any(
        feature = "backend-cas",
        feature = "backend-ticket",
        feature = "backend-fastslow",
        feature = "backend-mcs-keyed",
        feature = "backend-mcs-heap",
        feature = "backend-cna"
    )),
    feature = "backend-hmcs"
))]
mod selected {
    use crate::core::context::ArenaContext;
    use crate::core::topology::NumaHmcsLock;
    pub type Backend = crate::core::LazyMutex<NumaHmcsLock, ArenaContext>;
    pub const NAME: &std::ffi::CStr = c"numa_hmcslock";
}

#[cfg(not(any(
    feature = "backend-cas",
    feature = "backend-ticket",
    feature = "backend-fastslow",
    feature = "backend-mcs-keyed",
    feature = "backend-mcs-heap",
    feature = "backend-cna",
    feature = "backend-hmcs"
)))]
mod selected {
    use crate::core::algo::McsLock;
    use crate::core::context::ArenaContext;
    pub type Backend = crate::core::LazyMutex<McsLock, ArenaContext>;
    pub const NAME: &std::ffi::CStr = c"mcslock+arena";
}

/// The mutex type behind `mutrep_mutex_t`
pub type Backend = selected::Backend;

const _: () = {
    assert!(size_of::<Backend>() <= MUTREP_MUTEX_SIZE, "backend does not fit mutrep_mutex_t");
    assert!(align_of::<Backend>() <= align_of::<mutrep_mutex_t>());
};

/// View C storage as the backend mutex.
///
/// # Safety
/// `ptr` must be null or point to live storage of at least `Backend`'s size
/// and alignment, which is either zeroed or was only used through this view.
unsafe fn backend<'a, T>(ptr: *mut T) -> Option<&'a Backend> {
    // SAFETY: forwarded caller contract; zeroed memory is a valid Backend.
    unsafe { ptr.cast::<Backend>().as_ref() }
}

