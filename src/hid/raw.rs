//! Raw hidraw device access: descriptor retrieval and feature reports.
//!
//! Thin ioctl layer over `/dev/hidraw*`. The feature-report ioctls
//! encode the transfer length in bits 16..30 of the request number, so
//! the constants below are bases that get the byte count folded in per
//! call.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

const HIDIOCSFEATURE: libc::c_ulong = 0xC000_4806;
const HIDIOCGFEATURE: libc::c_ulong = 0xC000_4807;
const HIDIOCGRDESCSIZE: libc::c_ulong = 0x8004_4801;
const HIDIOCGRDESC: libc::c_ulong = 0x9004_4802;
const HIDIOCGRAWINFO: libc::c_ulong = 0x8008_4803;

const HID_MAX_DESCRIPTOR_SIZE: usize = 4096;

/// Bus type reported by HIDIOCGRAWINFO for I2C-attached devices.
pub const BUS_I2C: u32 = 0x18;

/// Mirrors `struct hidraw_devinfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub bus: u32,
    pub vendor: i16,
    pub product: i16,
}

/// Mirrors `struct hidraw_report_descriptor`.
#[repr(C)]
struct ReportDescriptor {
    size: u32,
    value: [u8; HID_MAX_DESCRIPTOR_SIZE],
}

/// An open hidraw node, held read-write for the process lifetime.
#[derive(Debug)]
pub struct HidrawDevice {
    file: File,
    path: PathBuf,
}

impl HidrawDevice {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bus / vendor / product identification (HIDIOCGRAWINFO).
    pub fn device_info(&self) -> io::Result<DeviceInfo> {
        let mut info = DeviceInfo {
            bus: 0,
            vendor: 0,
            product: 0,
        };
        // SAFETY: info matches the kernel's hidraw_devinfo layout.
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), HIDIOCGRAWINFO, &mut info)
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(info)
    }

    /// Fetch the raw report descriptor bytes
    /// (HIDIOCGRDESCSIZE + HIDIOCGRDESC).
    pub fn report_descriptor(&self) -> io::Result<Vec<u8>> {
        let mut size: u32 = 0;
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), HIDIOCGRDESCSIZE, &mut size)
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let size = (size as usize).min(HID_MAX_DESCRIPTOR_SIZE);
        let mut desc = ReportDescriptor {
            size: size as u32,
            value: [0u8; HID_MAX_DESCRIPTOR_SIZE],
        };
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), HIDIOCGRDESC, &mut desc)
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(desc.value[..size].to_vec())
    }

    /// Read a feature report: `size` payload bytes after the report id.
    pub fn get_feature(&self, report_id: u8, size: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; 1 + size];
        buf[0] = report_id;
        let request = HIDIOCGFEATURE | ((buf.len() as libc::c_ulong) << 16);
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), request, buf.as_mut_ptr())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        buf.remove(0); // strip the report id
        Ok(buf)
    }

    /// Write a feature report (report id prepended to the payload).
    pub fn set_feature(&self, report_id: u8, payload: &[u8]) -> io::Result<()> {
        let mut buf = Vec::with_capacity(1 + payload.len());
        buf.push(report_id);
        buf.extend_from_slice(payload);
        let request = HIDIOCSFEATURE | ((buf.len() as libc::c_ulong) << 16);
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), request, buf.as_mut_ptr())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
