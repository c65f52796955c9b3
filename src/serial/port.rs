//! Raw-mode serial device access through termios and poll(2).

use crate::error::{DumpError, Result};
use crate::serial::SerialSettings;
use crate::source::{ChunkRead, ChunkSource, DeferredFault};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::time::{Duration, Instant};

/// A serial device configured for raw 8N1 input with a per-read timeout.
///
/// `read_chunk` keeps reading until the buffer is full or the timeout expires, so a
/// quiet device produces a short or empty chunk rather than an error.
pub struct SerialPort {
    file: File,
    device: String,
    timeout: Duration,
    deferred: DeferredFault,
}

enum Readiness {
    Readable,
    TimedOut,
    HungUp,
}

impl SerialPort {
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let speed = baud_constant(settings.baud)
            .ok_or_else(|| DumpError::Config(format!("unsupported baud rate {}", settings.baud)))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&settings.device)?;
        configure_raw(&file, speed)?;
        Ok(Self {
            file,
            device: settings.device.clone(),
            timeout: settings.timeout,
            deferred: DeferredFault::default(),
        })
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<Readiness> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // Round up so a sub-millisecond remainder doesn't turn into a busy poll
        let ms = timeout
            .as_micros()
            .div_ceil(1000)
            .min(libc::c_int::MAX as u128) as libc::c_int;
        let r = unsafe { libc::poll(&mut pfd, 1, ms) };
        if r < 0 {
            return Err(io::Error::last_os_error());
        }
        if r == 0 {
            return Ok(Readiness::TimedOut);
        }
        if pfd.revents & libc::POLLIN != 0 {
            Ok(Readiness::Readable)
        } else if pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
            Ok(Readiness::HungUp)
        } else {
            Ok(Readiness::TimedOut)
        }
    }
}

impl ChunkSource for SerialPort {
    fn read_chunk(&mut self, buf: &mut [u8]) -> ChunkRead {
        if let Some(err) = self.deferred.take() {
            return ChunkRead::Fault(err);
        }

        let deadline = Instant::now() + self.timeout;
        let mut filled = 0;
        while filled < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.wait_readable(deadline - now) {
                Ok(Readiness::Readable) => {}
                Ok(Readiness::TimedOut) => break,
                Ok(Readiness::HungUp) => {
                    let err = io::Error::new(ErrorKind::BrokenPipe, "device hung up");
                    return self.deferred.settle(filled, err);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return self.deferred.settle(filled, e),
            }
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => {
                    let err = io::Error::new(ErrorKind::UnexpectedEof, "device closed the connection");
                    return self.deferred.settle(filled, err);
                }
                Ok(n) => filled += n,
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                    continue
                }
                Err(e) => return self.deferred.settle(filled, e),
            }
        }

        if filled == 0 {
            ChunkRead::Timeout
        } else {
            ChunkRead::Data(filled)
        }
    }

    fn describe(&self) -> String {
        self.device.clone()
    }
}

fn configure_raw(file: &File, speed: libc::speed_t) -> io::Result<()> {
    let fd = file.as_raw_fd();
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        // Non-blocking reads; the timeout is enforced with poll()
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = 0;
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Map a numeric baud rate to its termios speed constant.
pub fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        460_800 => libc::B460800,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        921_600 => libc::B921600,
        _ => return None,
    };
    Some(speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn common_baud_rates_are_supported() {
        assert_eq!(baud_constant(9600), Some(libc::B9600));
        assert_eq!(baud_constant(115_200), Some(libc::B115200));
        assert_eq!(baud_constant(12345), None);
    }

    #[test]
    fn unsupported_baud_is_a_config_error() {
        let settings = SerialSettings {
            device: "/dev/null".into(),
            baud: 7,
            timeout: Duration::from_millis(10),
        };
        assert!(matches!(SerialPort::open(&settings), Err(DumpError::Config(_))));
    }

    /// Open a pseudo-terminal pair; returns the master fd and the slave path.
    fn open_pty() -> Option<(libc::c_int, String)> {
        unsafe {
            let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            if master < 0 {
                return None;
            }
            if libc::grantpt(master) != 0 || libc::unlockpt(master) != 0 {
                libc::close(master);
                return None;
            }
            let name = libc::ptsname(master);
            if name.is_null() {
                libc::close(master);
                return None;
            }
            let path = CStr::from_ptr(name).to_string_lossy().into_owned();
            Some((master, path))
        }
    }

    #[test]
    fn reads_from_pty_and_times_out_when_quiet() {
        let Some((master, path)) = open_pty() else {
            eprintln!("no pty available, skipping");
            return;
        };
        let settings = SerialSettings {
            device: path,
            baud: 115_200,
            timeout: Duration::from_millis(100),
        };
        let mut port = SerialPort::open(&settings).unwrap();

        let payload = b"blockdata";
        let written = unsafe {
            libc::write(master, payload.as_ptr() as *const libc::c_void, payload.len())
        };
        assert_eq!(written, payload.len() as isize);

        let mut buf = [0u8; 64];
        match port.read_chunk(&mut buf) {
            ChunkRead::Data(n) => assert_eq!(&buf[..n], payload),
            other => panic!("expected data, got {other:?}"),
        }
        assert!(matches!(port.read_chunk(&mut buf), ChunkRead::Timeout));

        unsafe {
            libc::close(master);
        }
        assert!(matches!(port.read_chunk(&mut buf), ChunkRead::Fault(_)));
    }
}
