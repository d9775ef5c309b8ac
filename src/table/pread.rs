//! Positional reads, keyed by absolute offset rather than a shared seek
//! cursor, so concurrent lookups on one open table file never contend with
//! each other. Grounded on the `cfg(unix)`/`cfg(windows)` `read_at` split in
//! `other_examples/11e7b11c_Blockchain215-blockchain-parity-db__src-table.rs.rs`.

use std::fs::File;
use std::io;

#[cfg(unix)]
pub fn read_exact_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::os::unix::fs::FileExt;
    let mut buf = vec![0u8; len];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf)
}

#[cfg(windows)]
pub fn read_exact_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::os::windows::fs::FileExt;
    let mut buf = vec![0u8; len];
    let mut filled = 0usize;
    while filled < len {
        let n = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "positional read hit eof before filling buffer",
            ));
        }
        filled += n;
    }
    Ok(buf)
}
