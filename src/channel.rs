//! Command channel to the device
//!
//! The device is reachable through one serial session that supports exactly
//! one outstanding request at a time; everything the sync engine does
//! remotely (listing, upload, delete) is serialized through a
//! [`CommandChannel`] handle that callers pass explicitly.
//!
//! [`SerialChannel`] drives a MicroPython raw-REPL session over any
//! `Read + Write` byte stream. Remote operations are small MicroPython
//! scripts with their arguments bound as safe string literals; nothing the
//! device sends back is ever evaluated on the host.

use crate::error::{Phase, Result, SyncError};
use crate::wire;
use std::io::{Read, Write};
use std::path::Path;

/// Bytes of file content shipped per `exec` during an upload.
const UPLOAD_CHUNK: usize = 512;

/// The narrow request/response surface the sync engine needs from a device.
pub trait CommandChannel {
    /// Run the fixed listing program rooted at `root` and return its output
    /// lines, one wire-format line per entry.
    fn send_listing(&mut self, root: &str) -> Result<Vec<String>>;

    /// Stream a local file's bytes to `remote`, creating parent directories.
    /// Overwrite behavior is unspecified; callers delete first when the
    /// destination may exist.
    fn upload(&mut self, local: &Path, remote: &str) -> Result<()>;

    /// Recursively remove `remote`.
    fn remove(&mut self, remote: &str) -> Result<()>;
}

/// Recursive listing program. Emits the wire format with sorted siblings in
/// preorder; the walk root itself is suppressed (level -1).
const LIST_PROGRAM: &str = "\
import os
def _mps_ls(p, lvl, rel):
    st = os.stat(p)
    if st[0] & 0x4000:
        if lvl >= 0:
            print('D,%d,%r,%d,0' % (lvl, rel, st[8]))
        for n in sorted(os.listdir(p)):
            _mps_ls(p + '/' + n, lvl + 1, rel + '/' + n)
    else:
        print('F,%d,%r,%d,%d' % (lvl, rel, st[8], st[6]))
_mps_ls({root}, -1, '')
";

/// Recursive remove program.
const REMOVE_PROGRAM: &str = "\
import os
def _mps_rm(p):
    st = os.stat(p)
    if st[0] & 0x4000:
        for n in os.listdir(p):
            _mps_rm(p + '/' + n)
        os.rmdir(p)
    else:
        os.remove(p)
_mps_rm({path})
";

/// Raw-REPL command channel over a serial byte stream.
pub struct SerialChannel<S> {
    stream: S,
    raw: bool,
}

impl<S: Read + Write> SerialChannel<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, raw: false }
    }

    /// Interrupt whatever is running and switch the device into raw REPL.
    fn enter_raw(&mut self, phase: Phase) -> Result<()> {
        if self.raw {
            return Ok(());
        }
        self.write(b"\r\x03", phase)?;
        self.write(b"\r\x01", phase)?;
        self.read_until(b"raw REPL; CTRL-B to exit\r\n>", phase)?;
        self.raw = true;
        Ok(())
    }

    /// Execute one snippet on the device and return its stdout.
    ///
    /// Blocks until the device responds; a non-empty device traceback is a
    /// transport error tagged with the phase that issued the request.
    pub fn exec(&mut self, code: &str, phase: Phase) -> Result<String> {
        self.enter_raw(phase)?;
        self.write(code.as_bytes(), phase)?;
        self.write(b"\x04", phase)?;
        self.expect(b"OK", phase)?;
        let output = self.read_until_eot(phase)?;
        let traceback = self.read_until_eot(phase)?;
        self.expect(b">", phase)?;
        let traceback = traceback.trim();
        if !traceback.is_empty() {
            return Err(SyncError::transport(
                phase,
                format!("device error: {}", traceback),
            ));
        }
        Ok(output)
    }

    fn write(&mut self, bytes: &[u8], phase: Phase) -> Result<()> {
        self.stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush())
            .map_err(|e| SyncError::transport(phase, e.to_string()))
    }

    fn read_byte(&mut self, phase: Phase) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => {
                    return Err(SyncError::transport(phase, "unexpected end of stream"));
                }
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SyncError::transport(phase, e.to_string())),
            }
        }
    }

    /// Read until the accumulated tail matches `marker`, discarding echo.
    fn read_until(&mut self, marker: &[u8], phase: Phase) -> Result<()> {
        let mut tail: Vec<u8> = Vec::with_capacity(marker.len());
        loop {
            tail.push(self.read_byte(phase)?);
            if tail.len() > marker.len() {
                tail.remove(0);
            }
            if tail == marker {
                return Ok(());
            }
        }
    }

    /// Read output up to (and consuming) the EOT terminator.
    fn read_until_eot(&mut self, phase: Phase) -> Result<String> {
        let mut buf = Vec::new();
        loop {
            let byte = self.read_byte(phase)?;
            if byte == 0x04 {
                return Ok(String::from_utf8_lossy(&buf).into_owned());
            }
            buf.push(byte);
        }
    }

    fn expect(&mut self, exact: &[u8], phase: Phase) -> Result<()> {
        for &want in exact {
            let got = self.read_byte(phase)?;
            if got != want {
                return Err(SyncError::transport(
                    phase,
                    format!("protocol desync: expected {:?}, got {:?}", want as char, got as char),
                ));
            }
        }
        Ok(())
    }
}

impl<S: Read + Write> CommandChannel for SerialChannel<S> {
    fn send_listing(&mut self, root: &str) -> Result<Vec<String>> {
        let root = normalize_root(root);
        let script = LIST_PROGRAM.replace("{root}", &wire::quote(root));
        let output = self.exec(&script, Phase::ListRemote)?;
        Ok(output.lines().map(str::to_string).collect())
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<()> {
        let data =
            std::fs::read(local).map_err(|e| SyncError::filesystem(local.to_path_buf(), e))?;

        let mut script = String::from("import os\n");
        for dir in ancestor_dirs(remote) {
            script.push_str(&format!(
                "try:\n    os.mkdir({})\nexcept OSError:\n    pass\n",
                wire::quote(&dir)
            ));
        }
        script.push_str(&format!("_mps_f = open({}, 'wb')\n", wire::quote(remote)));
        self.exec(&script, Phase::Upload)?;

        for chunk in data.chunks(UPLOAD_CHUNK) {
            let write = format!("_mps_f.write({})", wire::bytes_literal(chunk));
            self.exec(&write, Phase::Upload)?;
        }
        self.exec("_mps_f.close()", Phase::Upload)?;
        Ok(())
    }

    fn remove(&mut self, remote: &str) -> Result<()> {
        let script = REMOVE_PROGRAM.replace("{path}", &wire::quote(remote));
        self.exec(&script, Phase::Delete)?;
        Ok(())
    }
}

/// Trailing slashes confuse `p + '/' + n` path building on the device.
fn normalize_root(root: &str) -> &str {
    if root == "/" {
        root
    } else {
        root.trim_end_matches('/')
    }
}

/// Every ancestor directory of `path`, shallowest first, excluding the root.
fn ancestor_dirs(path: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut cur = String::new();
    let absolute = path.starts_with('/');
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    for component in components.iter().take(components.len().saturating_sub(1)) {
        if cur.is_empty() {
            if absolute {
                cur.push('/');
            }
        } else {
            cur.push('/');
        }
        cur.push_str(component);
        dirs.push(cur.clone());
    }
    dirs
}
