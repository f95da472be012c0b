use std::io;

/// `ERROR_NOT_SAME_DEVICE`: MoveFileEx cannot move between volumes.
const ERROR_NOT_SAME_DEVICE: i32 = 17;

pub fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE)
}
