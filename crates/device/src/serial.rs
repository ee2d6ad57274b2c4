//! Serial transport and the background listener that feeds the input queue.

use std::{
    io::{BufRead, BufReader, Read, Write},
    thread::JoinHandle,
    time::Duration,
};

use {
    serialport::SerialPort,
    tracing::{debug, info, warn},
};

use crate::{Error, Result, channel::DeviceLink, frame::InputFrame, queue::FrameSender};

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Writing half of the serial port.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl DeviceLink for SerialLink {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }
}

/// Open the typewriter's serial port, returning the writer and a reader clone.
pub fn open(path: &str, baud: u32) -> Result<(SerialLink, Box<dyn SerialPort>)> {
    let serial_err = |source: serialport::Error| Error::Serial {
        port: path.to_string(),
        source,
    };
    let port = serialport::new(path, baud)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(serial_err)?;
    let reader = port.try_clone().map_err(serial_err)?;
    info!(port = path, baud, "serial port open");
    Ok((SerialLink { port }, reader))
}

/// Spawn the listener thread.
///
/// Reads newline-terminated frames from `reader` and queues them. Read
/// timeouts are routine and ignored; the thread ends on end of input, a hard
/// read error, or once the queue has been dropped.
pub fn spawn_listener<R>(reader: R, sender: FrameSender) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("device-listener".into())
        .spawn(move || listen(reader, &sender))
}

fn listen<R: Read>(reader: R, sender: &FrameSender) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    sender.put(InputFrame::new(std::mem::take(&mut buf)));
                }
                info!("device input closed");
                return;
            },
            Ok(_) => {
                if buf.last() != Some(&b'\n') {
                    continue;
                }
                let frame = InputFrame::new(std::mem::take(&mut buf));
                debug!(?frame, "frame received");
                if !sender.put(frame) {
                    debug!("input queue dropped, listener exiting");
                    return;
                }
            },
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ) => {},
            Err(e) => {
                warn!(error = %e, "device read failed, listener exiting");
                return;
            },
        }
    }
}
