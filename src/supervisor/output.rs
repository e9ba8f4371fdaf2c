use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread;

use crate::console;

/// Receives each line a child writes, without the trailing newline.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

pub fn console_sink() -> LineSink {
    Arc::new(console::relay)
}

/// Copy `stream` to `sink` line by line on a background thread.
///
/// The thread ends by itself once the child closes its end of the pipe.
/// Invalid UTF-8 is replaced rather than ending the relay.
pub fn spawn_relay<R>(name: &str, stream: R, sink: LineSink)
where
    R: Read + Send + 'static,
{
    let spawned = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || relay_lines(stream, &*sink));

    if let Err(e) = spawned {
        console::warn(format!("Could not relay child output: {}", e));
    }
}

fn relay_lines<R: Read>(stream: R, sink: &(dyn Fn(&str) + Send + Sync)) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                sink(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                console::warn(format!("Error reading child output: {}", e));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[test]
    fn test_relay_lines_splits_and_trims() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = move |line: &str| captured.lock().unwrap().push(line.to_string());

        relay_lines(Cursor::new(b"first\r\nsecond\nlast".to_vec()), &sink);

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "last"]);
    }

    #[test]
    fn test_relay_lines_survives_invalid_utf8() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = move |line: &str| captured.lock().unwrap().push(line.to_string());

        relay_lines(Cursor::new(vec![0xff, b'o', b'k', b'\n']), &sink);

        assert_eq!(seen.lock().unwrap()[0], "\u{fffd}ok");
    }
}
