//! Linux ioctl command channel
//!
//! ATA commands go through `HDIO_DRIVE_CMD`, SCSI commands through `SG_IO`.

use super::channel::{
    CommandBlock, CommandResponse, DeviceCommand, DeviceCommandChannel, ScsiStatus,
};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

const HDIO_DRIVE_CMD: libc::c_ulong = 0x031f;
const SG_IO: libc::c_ulong = 0x2285;

const SG_DXFER_FROM_DEV: libc::c_int = -3;

/// `struct sg_io_hdr` from `<scsi/sg.h>`
#[repr(C)]
struct SgIoHdr {
    interface_id: libc::c_int,
    dxfer_direction: libc::c_int,
    cmd_len: libc::c_uchar,
    mx_sb_len: libc::c_uchar,
    iovec_count: libc::c_ushort,
    dxfer_len: libc::c_uint,
    dxferp: *mut libc::c_void,
    cmdp: *mut libc::c_uchar,
    sbp: *mut libc::c_uchar,
    timeout: libc::c_uint,
    flags: libc::c_uint,
    pack_id: libc::c_int,
    usr_ptr: *mut libc::c_void,
    status: libc::c_uchar,
    masked_status: libc::c_uchar,
    msg_status: libc::c_uchar,
    sb_len_wr: libc::c_uchar,
    host_status: libc::c_ushort,
    driver_status: libc::c_ushort,
    resid: libc::c_int,
    duration: libc::c_uint,
    info: libc::c_uint,
}

/// Sends commands to block devices with ioctl
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxDeviceChannel;

impl LinuxDeviceChannel {
    /// Create the ioctl channel
    pub fn new() -> Self {
        Self
    }

    fn drive_cmd(&self, file: &File, args: [u8; 4]) -> CommandResponse {
        let mut block = args;
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), HDIO_DRIVE_CMD as _, block.as_mut_ptr()) };
        CommandResponse {
            status: ret,
            data: block.to_vec(),
            os_error: last_errno(ret),
            ..CommandResponse::default()
        }
    }

    fn sg_io(
        &self,
        file: &File,
        cdb: &[u8],
        sense_len: usize,
        response_len: usize,
        timeout_ms: u32,
    ) -> CommandResponse {
        let Ok(cmd_len) = u8::try_from(cdb.len()) else {
            return CommandResponse::os_failure(libc::EINVAL);
        };
        let Ok(dxfer_len) = u32::try_from(response_len) else {
            return CommandResponse::os_failure(libc::EINVAL);
        };
        let mx_sb_len = u8::try_from(sense_len).unwrap_or(u8::MAX);

        let mut cdb = cdb.to_vec();
        let mut data = vec![0u8; response_len];
        let mut sense = vec![0u8; usize::from(mx_sb_len)];

        let mut hdr = SgIoHdr {
            interface_id: libc::c_int::from(b'S'),
            dxfer_direction: SG_DXFER_FROM_DEV,
            cmd_len,
            mx_sb_len,
            iovec_count: 0,
            dxfer_len,
            dxferp: data.as_mut_ptr().cast(),
            cmdp: cdb.as_mut_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: timeout_ms,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        let ret = unsafe { libc::ioctl(file.as_raw_fd(), SG_IO as _, &mut hdr as *mut SgIoHdr) };
        if ret < 0 {
            return CommandResponse {
                status: ret,
                os_error: last_errno(ret),
                ..CommandResponse::default()
            };
        }

        let transferred = usize::try_from(hdr.resid)
            .map(|resid| response_len.saturating_sub(resid))
            .unwrap_or(response_len);
        data.truncate(transferred);
        sense.truncate(usize::from(hdr.sb_len_wr));

        CommandResponse {
            status: ret,
            data,
            sense,
            scsi: Some(ScsiStatus {
                status: hdr.status,
                host_status: hdr.host_status,
                driver_status: hdr.driver_status,
            }),
            os_error: 0,
        }
    }
}

fn last_errno(ret: libc::c_int) -> i32 {
    if ret < 0 {
        io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
    } else {
        0
    }
}

impl DeviceCommandChannel for LinuxDeviceChannel {
    type Handle = File;

    fn open(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
    }

    fn send(&self, handle: &mut File, command: &DeviceCommand) -> CommandResponse {
        match &command.block {
            CommandBlock::AtaDrive(args) => self.drive_cmd(handle, *args),
            CommandBlock::Scsi { cdb, sense_len } => self.sg_io(
                handle,
                cdb,
                *sense_len,
                command.response_len,
                u32::try_from(command.timeout.as_millis()).unwrap_or(u32::MAX),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::ata;
    use std::time::Duration;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_sg_io_hdr_layout() {
        assert_eq!(std::mem::size_of::<SgIoHdr>(), 88);
    }

    #[test]
    fn test_open_missing_device() {
        let channel = LinuxDeviceChannel::new();
        let err = channel
            .open(Path::new("/nonexistent/hostpal-test-device"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_commands_on_regular_file_fail() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let channel = LinuxDeviceChannel::new();
        let mut handle = channel.open(file.path()).unwrap();

        let response = channel.send(
            &mut handle,
            &ata::check_power_mode_command(ata::WIN_CHECKPOWERMODE1),
        );
        assert!(!response.is_ok());
        assert_ne!(response.os_error, 0);

        let response = channel.send(
            &mut handle,
            &DeviceCommand {
                block: CommandBlock::Scsi {
                    cdb: vec![0x12, 0, 0, 0, 36, 0],
                    sense_len: 32,
                },
                response_len: 36,
                timeout: Duration::from_secs(1),
            },
        );
        assert!(!response.is_ok());
        assert!(response.scsi.is_none());

        channel.close(handle).unwrap();
    }
}
