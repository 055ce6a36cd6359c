//! Integration tests exercising `TcpDevice` against real sockets.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use logship::{DEFAULT_HOST, DeviceError, TcpDevice};

#[fixture]
fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

fn build_device(addr: SocketAddr) -> TcpDevice {
    TcpDevice::builder()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .build()
        .expect("build device")
}

/// Accept one connection and forward exactly `len` received bytes.
fn spawn_reader(
    listener: &TcpListener,
    len: usize,
) -> (SocketAddr, mpsc::Receiver<Vec<u8>>) {
    let addr = listener.local_addr().expect("listener has address");
    let listener = listener.try_clone().expect("clone listener");
    let (notify_tx, notify_rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).expect("read payload");
        notify_tx.send(payload).expect("send payload");
    });
    (addr, notify_rx)
}

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[rstest]
fn builder_requires_a_port() {
    let err = TcpDevice::builder().build().expect_err("port is required");
    assert!(matches!(err, DeviceError::InvalidConfig(msg) if msg.contains("port")));
}

#[rstest]
fn builder_defaults_to_the_wildcard_host() {
    let device = TcpDevice::builder()
        .with_port(5228)
        .build()
        .expect("port alone is enough");
    assert_eq!(device.host(), DEFAULT_HOST);
    assert_eq!(device.port(), 5228);
    assert!(device.allows_retry());
}

#[rstest]
fn ssl_certificate_implies_tls() {
    let device = TcpDevice::builder()
        .with_port(5228)
        .with_ssl_certificate("/path/cert")
        .build()
        .expect("build device");
    assert!(device.use_ssl());
    assert_eq!(
        device.ssl_certificate().map(|p| p.display().to_string()),
        Some("/path/cert".to_owned())
    );
}

#[rstest]
#[case(false)]
#[case(true)]
fn explicit_tls_flag_is_respected(#[case] enabled: bool) {
    let device = TcpDevice::builder()
        .with_port(5228)
        .with_ssl(enabled)
        .build()
        .expect("build device");
    assert_eq!(device.use_ssl(), enabled);
}

#[rstest]
#[case(false)]
#[case(true)]
fn keepalive_flag_is_reflected(#[case] enabled: bool) {
    let device = TcpDevice::builder()
        .with_port(5228)
        .with_keepalive(enabled)
        .build()
        .expect("build device");
    assert_eq!(device.use_keepalive(), enabled);
}

#[rstest]
fn writes_bytes_over_tcp(tcp_listener: TcpListener) {
    let (addr, notify_rx) = spawn_reader(&tcp_listener, 4);
    let mut device = build_device(addr);

    device.write(b"test").expect("write succeeds");

    let payload = notify_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("payload received");
    assert_eq!(payload, b"test");
    assert!(device.connected());
}

#[rstest]
fn keepalive_is_applied_to_the_raw_socket(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    let mut device = TcpDevice::builder()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .with_keepalive(true)
        .build()
        .expect("build device");

    let handle = device.to_io().expect("connect for handle");
    let keepalive = socket2::SockRef::from(handle.get_ref())
        .keepalive()
        .expect("query keepalive");
    assert!(keepalive);
}

#[rstest]
fn keepalive_is_off_by_default(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    let mut device = build_device(addr);

    let handle = device.to_io().expect("connect for handle");
    let keepalive = socket2::SockRef::from(handle.get_ref())
        .keepalive()
        .expect("query keepalive");
    assert!(!keepalive);
}

#[rstest]
fn sync_toggles_nodelay_on_the_raw_socket(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    let mut device = TcpDevice::builder()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .with_sync(true)
        .build()
        .expect("build device");

    let handle = device.to_io().expect("connect for handle");
    assert!(handle.get_ref().nodelay().expect("query nodelay"));
}

#[rstest]
fn closed_follows_the_connection_lifecycle(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    let (notify_tx, notify_rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = tcp_listener.accept().expect("accept first connection");
        let mut payload = [0u8; 5];
        stream.read_exact(&mut payload).expect("read first payload");
        notify_tx.send(payload.to_vec()).expect("send first payload");
        drop(stream);

        let (mut stream, _) = tcp_listener.accept().expect("accept second connection");
        let mut payload = [0u8; 5];
        stream.read_exact(&mut payload).expect("read second payload");
        notify_tx.send(payload.to_vec()).expect("send second payload");
    });

    let mut device = build_device(addr);
    assert!(device.closed(), "closed before any connection attempt");

    device.write(b"hello").expect("first write");
    assert!(!device.closed(), "live after a successful connect");
    notify_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("first payload received");

    // The server hangs up; the FIN shows up as a half-close on our side.
    assert!(
        wait_until(|| device.server_closed(), Duration::from_secs(2)),
        "half-closed peer detected"
    );
    assert!(device.closed());
    assert!(device.connected(), "local handle still exists");

    device.write(b"again").expect("write reconnects transparently");
    let payload = notify_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("second payload received");
    assert_eq!(payload, b"again");

    device.close();
    assert!(!device.connected());
    assert!(device.closed(), "closed again after an explicit close");
}

#[rstest]
fn pending_server_data_does_not_mark_the_device_closed(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    let (hold_tx, hold_rx) = mpsc::channel::<()>();
    thread::spawn(move || {
        let (mut stream, _) = tcp_listener.accept().expect("accept connection");
        stream.write_all(b"pong").expect("server writes");
        // Keep the socket open until the test is done.
        let _ = hold_rx.recv_timeout(Duration::from_secs(5));
    });

    let mut device = build_device(addr);
    device.write(b"ping").expect("write succeeds");

    assert!(
        wait_until(|| !device.closed(), Duration::from_millis(100)),
        "unread server data must not look like a dead peer"
    );
    device.write(b"ping").expect("device still writable");
    drop(hold_tx);
}

#[rstest]
fn failed_tls_handshake_is_contained_by_the_guard(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    thread::spawn(move || {
        // Accept and hang up immediately; the handshake cannot complete.
        let (stream, _) = tcp_listener.accept().expect("accept connection");
        drop(stream);
    });

    let mut device = TcpDevice::builder()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .with_ssl(true)
        .build()
        .expect("build device");

    device.write(b"test").expect("guard swallows the connect fault");
    assert!(!device.connected());
}

#[rstest]
fn flush_without_a_connection_is_silent(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("listener has address");
    let mut device = build_device(addr);
    device.flush();
    assert!(!device.connected(), "flush never dials out");
}
