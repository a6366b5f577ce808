//! Process CPU time, as reported by `getrusage(RUSAGE_SELF)`.
//!
//! User and system time of every thread in the process. Spinning waiters show
//! up here while sleeping ones do not.

#![allow(unsafe_code)]

use std::time::Duration;

/// CPU time consumed by this process so far, or `None` where the platform
/// does not report it.
#[cfg(unix)]
#[must_use]
pub fn process_cpu_time() -> Option<Duration> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: `usage` points to writable storage for one `rusage`.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: getrusage returned 0, so it filled in the whole struct.
    let usage = unsafe { usage.assume_init() };
    Some(from_timeval(usage.ru_utime) + from_timeval(usage.ru_stime))
}

/// CPU time consumed by this process so far, or `None` where the platform
/// does not report it.
#[cfg(not(unix))]
#[must_use]
pub fn process_cpu_time() -> Option<Duration> {
    None
}

#[cfg(unix)]
fn from_timeval(tv: libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros)
}

/// CPU time used since `start`, when both readings exist.
#[must_use]
pub fn cpu_time_since(start: Option<Duration>) -> Option<Duration> {
    Some(process_cpu_time()?.saturating_sub(start?))
}
