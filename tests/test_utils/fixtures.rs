//! Loopback collectors standing in for a Graylog input. Each fixture binds an
//! ephemeral port on 127.0.0.1 so tests can run in parallel.

use std::{
    collections::BTreeMap,
    io::{BufRead, BufReader},
    net::{TcpListener, UdpSocket},
    sync::mpsc::{self, Receiver},
    thread,
    time::Duration,
};

use rstest::fixture;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);
const CHUNK_HEADER_LEN: usize = 12;

/// Return a UDP socket acting as the collector.
#[fixture]
pub fn udp_collector() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind udp collector");
    socket
        .set_read_timeout(Some(RECEIVE_TIMEOUT))
        .expect("set read timeout");
    socket
}

/// TCP collector accepting connections and splitting frames on `\0`.
pub struct TcpCollector {
    pub port: u16,
    frames: Receiver<Vec<u8>>,
}

impl TcpCollector {
    /// Wait for the next complete frame, without its delimiter.
    pub fn next_frame(&self) -> Vec<u8> {
        self.frames
            .recv_timeout(RECEIVE_TIMEOUT)
            .expect("frame before timeout")
    }
}

/// Return a collector reading null-delimited frames from every connection.
#[fixture]
pub fn tcp_collector() -> TcpCollector {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind tcp collector");
    let port = listener.local_addr().expect("collector addr").port();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let tx = tx.clone();
            thread::spawn(move || {
                let mut reader = BufReader::new(stream);
                loop {
                    let mut frame = Vec::new();
                    match reader.read_until(0, &mut frame) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            frame.pop();
                            if tx.send(frame).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    TcpCollector { port, frames: rx }
}

/// Receive one GELF message from `socket`, joining chunks when present.
pub fn reassemble(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = vec![0u8; 65_535];
    let mut parts = BTreeMap::new();
    let mut message_id: Option<Vec<u8>> = None;
    loop {
        let len = socket.recv(&mut buf).expect("datagram before timeout");
        let datagram = &buf[..len];
        if !datagram.starts_with(&[0x1e, 0x0f]) {
            assert!(parts.is_empty(), "raw datagram inside a chunked message");
            return datagram.to_vec();
        }
        let id = &datagram[2..10];
        let expected = message_id.get_or_insert_with(|| id.to_vec());
        assert_eq!(expected.as_slice(), id, "chunk from another message");
        let (seq, total) = (datagram[10], datagram[11]);
        parts.insert(seq, datagram[CHUNK_HEADER_LEN..].to_vec());
        if parts.len() == usize::from(total) {
            assert_eq!(
                parts.keys().copied().collect::<Vec<_>>(),
                (0..total).collect::<Vec<_>>()
            );
            return parts.into_values().flatten().collect();
        }
    }
}
