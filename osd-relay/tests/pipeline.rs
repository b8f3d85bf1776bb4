//! Whole-pipeline tests: bytes in, PNG out

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::RgbaImage;
use osd_display::Cell;
use osd_hal::{LinkRx, LinkTx};
use osd_protocol::{checksum, DisplayPortCommand, Frame};
use osd_relay::reader::FrameReader;
use osd_relay::stats::StatsTicker;
use osd_relay::tasks::{relay, serve, ForwardTiming, Forwarder, RenderSession};
use osd_relay::transport::{UdpLink, UdpSender};
use osd_render::{CellMetrics, OsdRenderer, PngOutput};

/// Link replaying queued reads; empty reads as a timeout
#[derive(Default)]
struct Replay(VecDeque<Vec<u8>>);

impl LinkRx for Replay {
    type Error = Infallible;

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, Infallible> {
        let Some(chunk) = self.0.pop_front() else {
            return Ok(0);
        };
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

/// Write-string at (5, 2): attribute 0x00, 'A', terminator
fn write_a_at_5_2() -> Vec<u8> {
    let payload = [0x03, 0x05, 0x02, 0x00, b'A', 0x00];
    let mut bytes = b"$M>".to_vec();
    bytes.extend([payload.len() as u8, 0xB6]);
    bytes.extend(payload);
    bytes.push(checksum(payload.len() as u8, 0xB6, &payload));
    bytes
}

fn draw_screen() -> Vec<u8> {
    DisplayPortCommand::DrawScreen
        .to_frame()
        .unwrap()
        .encode_to_vec()
        .to_vec()
}

fn png_session(path: &Path, fps: f64) -> RenderSession<PngOutput> {
    let renderer = OsdRenderer::new(720, 576, 60, 22, None);
    RenderSession::new(60, 22, PngOutput::new(renderer, path), fps)
}

fn reader<R: LinkRx>(link: R) -> FrameReader<R> {
    FrameReader::new(link, Duration::from_millis(5), Duration::from_secs(1))
}

/// Render-mode reader: one datagram per read
fn udp_reader<R: LinkRx>(link: R) -> FrameReader<R> {
    FrameReader::new(link, Duration::from_millis(200), Duration::from_millis(200)).datagrams()
}

fn ticker() -> StatsTicker {
    StatsTicker::new(Duration::from_secs(3600), Instant::now())
}

fn has_mark(image: &RgbaImage, metrics: CellMetrics, row: u32, col: u32) -> bool {
    let x0 = col * metrics.width;
    let y0 = row * metrics.height;
    (y0..y0 + metrics.height)
        .flat_map(|y| (x0..x0 + metrics.width).map(move |x| (x, y)))
        .any(|(x, y)| image.get_pixel(x, y).0[3] != 0)
}

fn assert_only_5_2_marked(session: &RenderSession<PngOutput>, path: &Path) {
    let canvas = session.canvas();
    assert_eq!(canvas.cell(5, 2), Some(Cell::Code(b'A')));
    for col in (0..60).filter(|&c| c != 2) {
        assert_eq!(canvas.cell(5, col), Some(Cell::Blank));
    }

    let image = image::open(path).unwrap().into_rgba8();
    assert_eq!(image.dimensions(), (720, 576));
    let metrics = session.compositor().backend().renderer().metrics();
    assert!(has_mark(&image, metrics, 5, 2));
    for col in (0..60).filter(|&c| c != 2) {
        assert!(!has_mark(&image, metrics, 5, col), "unexpected mark at col {col}");
    }
}

#[test]
fn test_end_to_end_write_and_draw() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");

    let mut link = Replay::default();
    link.0.push_back(write_a_at_5_2());
    link.0.push_back(draw_screen());

    let mut reader = reader(link);
    let mut session = png_session(&path, 20.0);
    serve(&mut reader, &mut session, &mut ticker(), Some(2)).unwrap();

    assert_eq!(session.stats().rendered, 1);
    assert_eq!(session.canvas().frame_counter(), 1);
    assert!(!session.canvas().is_dirty());
    assert_only_5_2_marked(&session, &path);
}

#[test]
fn test_noisy_chunked_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");

    let mut corrupted = draw_screen();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x5A;

    let mut stream = b"\x00\xFF$M".to_vec();
    stream.extend(&corrupted);
    stream.extend(b"garbage $ M >");
    stream.extend(write_a_at_5_2());
    stream.extend(b"\r\n");
    stream.extend(draw_screen());

    // Three bytes per read, so every frame is split
    let link = Replay(stream.chunks(3).map(<[u8]>::to_vec).collect());
    let chunk_count = link.0.len() as u64;

    let mut reader = reader(link);
    let mut session = png_session(&path, 20.0);
    serve(&mut reader, &mut session, &mut ticker(), Some(3)).unwrap();

    let stats = session.stats();
    assert_eq!(stats.bad_checksum, 1);
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.rendered, 1);
    assert!(stats.noise_bytes > 0);
    assert!(stats.chunks <= chunk_count);
    assert_only_5_2_marked(&session, &path);
}

#[test]
fn test_throttled_draws_commit_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");
    let draw = DisplayPortCommand::DrawScreen.to_frame().unwrap();

    let mut session = png_session(&path, 10.0);
    let t0 = Instant::now();
    session.handle_frame(&draw, t0);
    let first = fs::metadata(&path).unwrap().modified().unwrap();
    session.handle_frame(&draw, t0 + Duration::from_millis(50));

    assert_eq!(session.stats().rendered, 1);
    assert_eq!(session.stats().throttled, 1);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), first);

    let mut session = png_session(&path, 10.0);
    session.handle_frame(&draw, t0);
    session.handle_frame(&draw, t0 + Duration::from_millis(150));
    assert_eq!(session.stats().rendered, 2);
    assert_eq!(session.stats().throttled, 0);
}

#[test]
fn test_concurrent_reader_never_sees_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");
    let done = Arc::new(AtomicBool::new(false));

    let watcher = {
        let path = path.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                match fs::read(&path) {
                    Ok(bytes) => {
                        assert!(!bytes.is_empty(), "zero-length output observed");
                        image::load_from_memory(&bytes).expect("truncated output observed");
                    }
                    Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
                }
            }
        })
    };

    let write = DisplayPortCommand::WriteString {
        row: 3,
        col: 0,
        data: b"\x00ALT 123M",
    }
    .to_frame()
    .unwrap();
    let draw = DisplayPortCommand::DrawScreen.to_frame().unwrap();

    let mut session = png_session(&path, 1000.0);
    let t0 = Instant::now();
    for i in 0..40u64 {
        session.handle_frame(&write, t0);
        session.handle_frame(&draw, t0 + Duration::from_millis(10 * i));
    }
    done.store(true, Ordering::Relaxed);

    watcher.join().unwrap();
    assert_eq!(session.stats().rendered, 40);
    assert_eq!(session.stats().render_errors, 0);
}

#[test]
fn test_udp_datagrams_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");

    let link = UdpLink::bind("127.0.0.1", 0).unwrap();
    let port = link.local_addr().unwrap().port();

    let mut sender = UdpSender::connect("127.0.0.1", port).unwrap();
    sender.write_all(&write_a_at_5_2()).unwrap();
    sender.write_all(&draw_screen()).unwrap();

    let mut reader = udp_reader(link);
    let mut session = png_session(&path, 20.0);
    serve(&mut reader, &mut session, &mut ticker(), Some(2)).unwrap();

    assert_eq!(session.stats().chunks, 2);
    assert_only_5_2_marked(&session, &path);
}

#[test]
fn test_truncated_datagram_then_valid_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");

    let mut link = Replay::default();
    link.0.push_back(b"$M>\x10\xB6\x03".to_vec());
    link.0.push_back(write_a_at_5_2());
    link.0.push_back(draw_screen());

    let mut reader = udp_reader(link);
    let mut session = png_session(&path, 20.0);
    serve(&mut reader, &mut session, &mut ticker(), Some(2)).unwrap();

    let stats = session.stats();
    assert_eq!(stats.bad_checksum, 0);
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.rendered, 1);
    assert_eq!(reader.expired(), 1);
    assert_only_5_2_marked(&session, &path);
}

/// Flight controller answering every request with the next queued burst
#[derive(Default)]
struct FakeFc {
    bursts: VecDeque<Vec<u8>>,
    inbox: VecDeque<Vec<u8>>,
}

impl LinkTx for FakeFc {
    type Error = io::Error;

    fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
        if let Some(burst) = self.bursts.pop_front() {
            self.inbox.push_back(burst);
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LinkRx for FakeFc {
    type Error = io::Error;

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        let Some(chunk) = self.inbox.pop_front() else {
            return Ok(0);
        };
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

#[test]
fn test_forwarded_replies_render() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("osd.png");

    let link = UdpLink::bind("127.0.0.1", 0).unwrap();
    let port = link.local_addr().unwrap().port();

    let api_version = Frame::new(osd_protocol::Direction::Response, 0x01, &[0, 1, 47])
        .unwrap()
        .encode_to_vec()
        .to_vec();
    let mut osd_burst = b"\x11\x22".to_vec();
    osd_burst.extend(write_a_at_5_2());
    osd_burst.extend(draw_screen());

    let mut fc = FakeFc::default();
    fc.bursts.push_back(api_version);
    // FC_VERSION probe gets no answer
    fc.bursts.push_back(Vec::new());
    fc.bursts.push_back(osd_burst);

    let timing = ForwardTiming {
        reply_timeout: Duration::from_millis(20),
        poll_window: Duration::from_millis(10),
        poll_interval: Duration::ZERO,
    };
    let target = UdpSender::connect("127.0.0.1", port).unwrap();
    let mut forwarder = Forwarder::new(reader(fc), target, timing);
    relay(&mut forwarder, &mut ticker(), Some(2)).unwrap();
    assert_eq!(forwarder.stats().forwarded, 3);

    let mut reader = udp_reader(link);
    let mut session = png_session(&path, 20.0);
    serve(&mut reader, &mut session, &mut ticker(), Some(3)).unwrap();

    assert_eq!(session.stats().ignored, 1);
    assert_only_5_2_marked(&session, &path);
}
