//! Shared helpers for the integration tests: synthetic catalog images and a
//! throwaway HTTP image host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use catalog_color::Bitmap;
use image::{ImageFormat, Rgb, Rgba};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const RED: Rgba<u8> = Rgba([220, 20, 20, 255]);
pub const BLUE: Rgba<u8> = Rgba([30, 60, 200, 255]);
pub const GREEN: Rgba<u8> = Rgba([34, 139, 34, 255]);

/// A centered `size`x`size` square of `color` on a `background` canvas.
pub fn solid_item(width: u32, height: u32, size: u32, color: Rgba<u8>, background: Rgba<u8>) -> Bitmap {
    let left = (width - size) / 2;
    let top = (height - size) / 2;
    Bitmap::from_fn(width, height, |x, y| {
        if (left..left + size).contains(&x) && (top..top + size).contains(&y) {
            color
        } else {
            background
        }
    })
}

/// Blue body with a smaller green band on white, laid out on a 240x320 grid
/// and stretched to `width`x`height` by nearest-neighbor sampling.
pub fn two_tone_item(width: u32, height: u32) -> Bitmap {
    Bitmap::from_fn(width, height, |x, y| {
        match (x * 240 / width, y * 320 / height) {
            (40..=199, 200..=239) => GREEN,
            (40..=199, 60..=259) => BLUE,
            _ => WHITE,
        }
    })
}

/// Largest per-channel difference between two colors.
pub fn channel_distance(a: Rgb<u8>, b: Rgb<u8>) -> u8 {
    a.0.iter()
        .zip(b.0)
        .map(|(x, y)| x.abs_diff(y))
        .max()
        .unwrap_or(0)
}

/// Routes pipeline logs through the test harness; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn encode(bitmap: &Bitmap, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    bitmap.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

pub fn png(bitmap: &Bitmap) -> Vec<u8> {
    encode(bitmap, ImageFormat::Png)
}

/// Canned response for one path.
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: b"<html>error</html>".to_vec(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Minimal HTTP/1.1 server answering GET requests from a route table.
/// Unknown paths get a 404. The server lives until the test process exits.
pub struct ImageHost {
    addr: SocketAddr,
}

impl ImageHost {
    pub fn start<P: Into<String>>(routes: impl IntoIterator<Item = (P, Route)>) -> Self {
        let routes: Arc<HashMap<String, Route>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.into(), route))
                .collect(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                thread::spawn(move || serve(stream, &routes));
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn serve(stream: TcpStream, routes: &HashMap<String, Route>) {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    // drain headers
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) if line == "\r\n" => break,
            Ok(_) => {}
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let route = routes.get(path).cloned().unwrap_or_else(|| Route::status(404));
    if let Some(delay) = route.delay {
        thread::sleep(delay);
    }

    let mut stream = &stream;
    let header = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        route.body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&route.body);
    let _ = stream.flush();
}

/// A URL on a local port nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/gone.png")
}
