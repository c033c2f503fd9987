use crate::{Error, Result};
use std::ffi::CStr;
use std::io;

/// Release string of the running kernel, e.g. `5.10.0-8-amd64`.
pub fn kernel_release() -> Result<String> {
    let release = unsafe {
        let mut info: libc::utsname = std::mem::zeroed();
        if libc::uname(&mut info as *mut _) != 0 {
            return Err(Error::HostInfo(io::Error::last_os_error()));
        }
        CStr::from_ptr(info.release.as_ptr())
            .to_string_lossy()
            .into_owned()
    };
    Ok(release)
}
