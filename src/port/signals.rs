//! Modem control and status lines.

use serde::Serialize;

/// Point-in-time snapshot of the modem lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Signals {
    /// Data Set Ready (input).
    pub dsr: bool,
    /// Data Terminal Ready (output).
    pub dtr: bool,
    /// Request To Send (output).
    pub rts: bool,
    /// Secondary transmit.
    pub st: bool,
    /// Secondary receive.
    pub sr: bool,
    /// Clear To Send (input).
    pub cts: bool,
    /// Carrier Detect (input).
    pub cd: bool,
    /// Ring Indicator (input).
    pub rng: bool,
}

#[cfg(unix)]
pub(crate) mod modem {
    use super::Signals;
    use crate::port::PortError;
    use std::io;
    use std::os::unix::io::RawFd;

    #[cfg(target_os = "linux")]
    const SECONDARY: (libc::c_int, libc::c_int) = (libc::TIOCM_ST, libc::TIOCM_SR);
    #[cfg(not(target_os = "linux"))]
    const SECONDARY: (libc::c_int, libc::c_int) = (0, 0);

    /// Decode a `TIOCMGET` bit set.
    pub(crate) fn decode(bits: libc::c_int) -> Signals {
        let set = |mask: libc::c_int| mask != 0 && bits & mask != 0;
        Signals {
            dsr: set(libc::TIOCM_DSR),
            dtr: set(libc::TIOCM_DTR),
            rts: set(libc::TIOCM_RTS),
            st: set(SECONDARY.0),
            sr: set(SECONDARY.1),
            cts: set(libc::TIOCM_CTS),
            cd: set(libc::TIOCM_CAR),
            rng: set(libc::TIOCM_RNG),
        }
    }

    /// Read every modem line in one ioctl.
    pub(crate) fn read(fd: RawFd) -> Result<Signals, PortError> {
        let mut bits: libc::c_int = 0;
        // SAFETY: fd is owned by the open port and `bits` outlives the call.
        let rc = unsafe { libc::ioctl(fd, libc::TIOCMGET, &mut bits) };
        if rc < 0 {
            return Err(PortError::Io(io::Error::last_os_error()));
        }
        Ok(decode(bits))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_decode_bits() {
            let signals = decode(libc::TIOCM_DTR | libc::TIOCM_CTS | libc::TIOCM_CAR);
            assert!(signals.dtr);
            assert!(signals.cts);
            assert!(signals.cd);
            assert!(!signals.rts);
            assert!(!signals.dsr);
            assert!(!signals.rng);
        }

        #[test]
        fn test_decode_empty() {
            assert_eq!(decode(0), Signals::default());
        }
    }
}
