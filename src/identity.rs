//! Owner and group name resolution.
//!
//! Header encoding needs the user and group *names* behind the numeric
//! ids that `stat` reports. The lookup is behind a trait so the codec
//! can be driven by a fixed id table in tests instead of the process's
//! passwd/group databases.

use std::ffi::CStr;

use crate::error::{Error, Result};

/// Maps numeric owner and group ids to names.
///
/// A failed lookup is a hard stop for the file being encoded; there is
/// no fallback to numeric-only headers.
pub trait IdentityResolver {
    fn user_name(&self, uid: u32) -> Result<String>;
    fn group_name(&self, gid: u32) -> Result<String>;
}

/// Resolver backed by the system passwd and group databases
/// (`getpwuid_r` / `getgrgid_r`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentities;

// Start size for the scratch buffer the reentrant lookups fill; grown
// on ERANGE up to a fixed cap.
const INITIAL_BUF: usize = 1024;
const MAX_BUF: usize = 64 * 1024;

impl IdentityResolver for SystemIdentities {
    fn user_name(&self, uid: u32) -> Result<String> {
        let mut buf = vec![0u8; INITIAL_BUF];
        loop {
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            let rc = unsafe {
                libc::getpwuid_r(
                    uid as libc::uid_t,
                    &mut pwd,
                    buf.as_mut_ptr() as *mut libc::c_char,
                    buf.len(),
                    &mut result,
                )
            };
            if rc == libc::ERANGE && buf.len() < MAX_BUF {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() {
                return Err(Error::UnknownUser(uid));
            }
            // pw_name points into buf, which is still alive here.
            let name = unsafe { CStr::from_ptr(pwd.pw_name) };
            return Ok(name.to_string_lossy().into_owned());
        }
    }

    fn group_name(&self, gid: u32) -> Result<String> {
        let mut buf = vec![0u8; INITIAL_BUF];
        loop {
            let mut grp: libc::group = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::group = std::ptr::null_mut();
            let rc = unsafe {
                libc::getgrgid_r(
                    gid as libc::gid_t,
                    &mut grp,
                    buf.as_mut_ptr() as *mut libc::c_char,
                    buf.len(),
                    &mut result,
                )
            };
            if rc == libc::ERANGE && buf.len() < MAX_BUF {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() {
                return Err(Error::UnknownGroup(gid));
            }
            let name = unsafe { CStr::from_ptr(grp.gr_name) };
            return Ok(name.to_string_lossy().into_owned());
        }
    }
}
