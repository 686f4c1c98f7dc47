//! Scripted fake station for integration tests.
//!
//! Each accepted connection runs the next [`Script`] in order: exact request
//! bytes are checked, crafted reply bytes are written back.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Byte builder for requests and replies, independent of the library codec.
#[derive(Debug, Default, Clone)]
pub struct Wire(Vec<u8>);

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, text: &str) -> Self {
        self.0.extend_from_slice(text.as_bytes());
        self.0.push(b'\n');
        self
    }

    pub fn int(mut self, value: i32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn double(mut self, value: f64) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Item as sent by the client: id only.
    pub fn item_id(mut self, id: u64) -> Self {
        self.0.extend_from_slice(&id.to_be_bytes());
        self
    }

    /// Item as sent by the station: id then type tag.
    pub fn item(self, id: u64, type_code: i32) -> Self {
        self.item_id(id).int(type_code)
    }

    pub fn array(self, values: &[f64]) -> Self {
        values
            .iter()
            .fold(self.int(values.len() as i32), |w, v| w.double(*v))
    }

    /// Pose from row-major rows, written column-major.
    pub fn pose(mut self, rows: [[f64; 4]; 4]) -> Self {
        for col in 0..4 {
            for row in rows {
                self = self.double(row[col]);
            }
        }
        self
    }

    pub fn lines(self, lines: &[&str]) -> Self {
        lines
            .iter()
            .fold(self.int(lines.len() as i32), |w, l| w.line(l))
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn ok(self) -> Self {
        self.int(0)
    }

    pub fn status(self, code: i32, message: &str) -> Self {
        self.int(code).line(message)
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub const IDENTITY: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[derive(Debug, Clone)]
enum Step {
    ApiHandshake { build: i32 },
    EventHandshake,
    Expect(Vec<u8>),
    Send(Vec<u8>),
    Pause(Duration),
    Close,
}

/// What the station does on one connection.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection that answers the API handshake with `build`.
    pub fn api(build: i32) -> Self {
        Self::new().api_handshake(build)
    }

    pub fn api_handshake(mut self, build: i32) -> Self {
        self.steps.push(Step::ApiHandshake { build });
        self
    }

    pub fn event_handshake(mut self) -> Self {
        self.steps.push(Step::EventHandshake);
        self
    }

    /// Read exactly these bytes and fail the test if they differ.
    pub fn expect(mut self, request: Wire) -> Self {
        self.steps.push(Step::Expect(request.build()));
        self
    }

    pub fn send(mut self, reply: Wire) -> Self {
        self.steps.push(Step::Send(reply.build()));
        self
    }

    /// Request then reply.
    pub fn exchange(self, request: Wire, reply: Wire) -> Self {
        self.expect(request).send(reply)
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    /// Close the connection instead of waiting for the client to leave.
    pub fn close(mut self) -> Self {
        self.steps.push(Step::Close);
        self
    }
}

/// A fake station listening on 127.0.0.1.
pub struct FakeStation {
    port: u16,
    handshakes: Arc<AtomicUsize>,
    accepted: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FakeStation {
    pub async fn start(scripts: Vec<Script>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::serve(listener, scripts)
    }

    /// Listen on a specific port.
    pub async fn start_on(port: u16, scripts: Vec<Script>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        Self::serve(listener, scripts)
    }

    fn serve(listener: TcpListener, scripts: Vec<Script>) -> Self {
        let port = listener.local_addr().unwrap().port();
        let handshakes = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));
        let connections = Arc::new(Mutex::new(Vec::new()));

        let accept_task = {
            let handshakes = handshakes.clone();
            let accepted = accepted.clone();
            let connections = connections.clone();
            let mut scripts = VecDeque::from(scripts);
            tokio::spawn(async move {
                while let Some(script) = scripts.pop_front() {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let handshakes = handshakes.clone();
                    let task = tokio::spawn(run_script(stream, script, handshakes));
                    connections.lock().await.push(task);
                }
            })
        };

        Self {
            port,
            handshakes,
            accepted,
            accept_task,
            connections,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Completed API handshakes.
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait for every connection script to finish, surfacing its assertion
    /// failures. Clients must have disconnected first.
    pub async fn finish(self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.connections.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }
        self.accept_task.abort();
    }
}

async fn run_script(mut stream: TcpStream, script: Script, handshakes: Arc<AtomicUsize>) {
    for step in script.steps {
        match step {
            Step::ApiHandshake { build } => {
                expect(&mut stream, &Wire::new().line("RDK_API").int(0).build()).await;
                // Counted before replying so the client never observes a stale count.
                handshakes.fetch_add(1, Ordering::SeqCst);
                let reply = Wire::new().line("RDK_API").int(1).int(build).ok();
                stream.write_all(&reply.build()).await.unwrap();
            }
            Step::EventHandshake => {
                expect(&mut stream, &Wire::new().line("RDK_EVT").int(0).build()).await;
                let reply = Wire::new().line("RDK_EVT").int(1).ok();
                stream.write_all(&reply.build()).await.unwrap();
            }
            Step::Expect(request) => expect(&mut stream, &request).await,
            Step::Send(reply) => {
                // The client may already have given up on this reply.
                if stream.write_all(&reply).await.is_err() {
                    return;
                }
            }
            Step::Pause(duration) => tokio::time::sleep(duration).await,
            Step::Close => return,
        }
    }
    // Stay connected until the client leaves.
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
}

async fn expect(stream: &mut TcpStream, expected: &[u8]) {
    let mut actual = vec![0u8; expected.len()];
    stream.read_exact(&mut actual).await.unwrap();
    assert_eq!(
        actual,
        expected,
        "request mismatch: got {:?}, expected {:?}",
        String::from_utf8_lossy(&actual),
        String::from_utf8_lossy(expected)
    );
}

/// A port nothing is listening on.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
