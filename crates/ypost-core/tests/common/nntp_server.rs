//! Minimal NNTP server that accepts POSTs for integration tests.
//!
//! Greets with 200, optionally requires `AUTHINFO USER/PASS`, and records the
//! raw text of every posted article (everything between the 340 reply and
//! the terminating dot line).

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Default)]
pub struct NntpServerOptions {
    /// Required credentials; `None` accepts POST without authentication.
    pub credentials: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct NntpServerHandle {
    pub port: u16,
    articles: Arc<Mutex<Vec<Vec<u8>>>>,
    sessions: Arc<AtomicUsize>,
}

impl NntpServerHandle {
    pub fn articles(&self) -> Vec<Vec<u8>> {
        self.articles.lock().unwrap().clone()
    }

    /// Connections that completed the greeting.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(opts: NntpServerOptions) -> NntpServerHandle {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let articles = Arc::new(Mutex::new(Vec::new()));
    let sessions = Arc::new(AtomicUsize::new(0));
    let handle = NntpServerHandle {
        port,
        articles: Arc::clone(&articles),
        sessions: Arc::clone(&sessions),
    };
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let articles = Arc::clone(&articles);
            let sessions = Arc::clone(&sessions);
            let opts = opts.clone();
            thread::spawn(move || {
                let _ = self::handle(stream, &opts, &articles, &sessions);
            });
        }
    });
    handle
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().unwrap().port()
}

fn handle(
    stream: TcpStream,
    opts: &NntpServerOptions,
    articles: &Mutex<Vec<Vec<u8>>>,
    sessions: &AtomicUsize,
) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    writer.write_all(b"200 test server ready\r\n")?;
    sessions.fetch_add(1, Ordering::SeqCst);

    let mut user: Option<String> = None;
    let mut authed = opts.credentials.is_none();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        let command = String::from_utf8_lossy(&line).trim_end().to_string();

        if let Some(name) = command.strip_prefix("AUTHINFO USER ") {
            user = Some(name.to_string());
            if opts.credentials.is_some() {
                writer.write_all(b"381 password required\r\n")?;
            } else {
                writer.write_all(b"281 authentication accepted\r\n")?;
            }
        } else if let Some(pass) = command.strip_prefix("AUTHINFO PASS ") {
            let ok = match (&opts.credentials, &user) {
                (Some((u, p)), Some(given)) => u == given && p == pass,
                _ => false,
            };
            if ok {
                authed = true;
                writer.write_all(b"281 authentication accepted\r\n")?;
            } else {
                writer.write_all(b"481 authentication rejected\r\n")?;
            }
        } else if command == "POST" {
            if !authed {
                writer.write_all(b"480 authentication required\r\n")?;
                continue;
            }
            writer.write_all(b"340 send article\r\n")?;
            let mut article = Vec::new();
            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line)? == 0 {
                    return Ok(());
                }
                if line == b".\r\n" {
                    break;
                }
                article.extend_from_slice(&line);
            }
            articles.lock().unwrap().push(article);
            writer.write_all(b"240 article received\r\n")?;
        } else if command == "QUIT" {
            writer.write_all(b"205 bye\r\n")?;
            return Ok(());
        } else {
            writer.write_all(b"500 unknown command\r\n")?;
        }
    }
}
