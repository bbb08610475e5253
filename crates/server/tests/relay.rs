//! End-to-end checks against a relay bound to loopback ports.

use campus_relay::{BroadcastDispatcher, RelayServer, ServerConfig};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream, UdpSocket,
    },
};

const WAIT: Duration = Duration::from_secs(3);

struct TestRelay {
    tcp: SocketAddr,
    udp: SocketAddr,
    dispatcher: BroadcastDispatcher,
}

async fn start_relay(max_sessions: usize) -> TestRelay {
    let config = ServerConfig {
        tcp_bind: "127.0.0.1:0".into(),
        udp_bind: "127.0.0.1:0".into(),
        max_sessions,
        stats_interval: None,
        ..ServerConfig::default()
    };
    let server = RelayServer::bind(config).await.unwrap();
    let relay = TestRelay {
        tcp: server.local_addr().unwrap(),
        udp: server.datagram_addr().unwrap(),
        dispatcher: server.dispatcher(),
    };
    tokio::spawn(server.run());
    relay
}

struct Endpoint {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Endpoint {
    async fn connect(relay: &TestRelay, credentials: &str) -> (Self, String) {
        let stream = TcpStream::connect(relay.tcp).await.unwrap();
        let (read, write) = stream.into_split();
        let mut endpoint = Self {
            lines: BufReader::new(read).lines(),
            write,
        };
        endpoint.send(credentials).await;
        let reply = endpoint.recv().await.unwrap();
        (endpoint, reply)
    }

    async fn join(relay: &TestRelay, credentials: &str) -> Self {
        let (endpoint, reply) = Self::connect(relay, credentials).await;
        assert_eq!(reply, "AUTH_OK");
        endpoint
    }

    async fn send(&mut self, line: &str) {
        self.write
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    async fn expect_silence(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(200), self.lines.next_line()).await;
        assert!(result.is_err(), "unexpected line: {:?}", result);
    }

    async fn listing(&mut self) -> Vec<String> {
        self.send("LIST_REQUEST").await;
        let mut block = Vec::new();
        loop {
            let line = self.recv().await.unwrap();
            let done = line.starts_with("----");
            block.push(line);
            if done {
                return block;
            }
        }
    }
}

/// Polls the listing until `predicate` holds.
async fn wait_for_listing(endpoint: &mut Endpoint, predicate: impl Fn(&[String]) -> bool) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let block = endpoint.listing().await;
        if predicate(&block) {
            return block;
        }
        assert!(tokio::time::Instant::now() < deadline, "listing never matched: {block:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn exact_routing_delivers_only_to_target() {
    let relay = start_relay(8).await;
    let mut a = Endpoint::join(&relay, "Lahore:Dept1:NU-LHR-123").await;
    let mut b = Endpoint::join(&relay, "Lahore:Dept2:NU-LHR-123").await;
    let mut sender = Endpoint::join(&relay, "Karachi:IT:NU-KHI-123").await;

    sender.send("Lahore,Dept1,hello").await;

    assert_eq!(
        a.recv().await.as_deref(),
        Some("[Karachi IT -> Lahore Dept1] hello")
    );
    b.expect_silence().await;
    sender.expect_silence().await;
}

#[tokio::test]
async fn fallback_routing_uses_any_department_of_campus() {
    let relay = start_relay(8).await;
    let mut b = Endpoint::join(&relay, "Lahore:Dept2:NU-LHR-123").await;
    let mut sender = Endpoint::join(&relay, "Peshawar:Admissions:NU-PSH-123").await;

    sender.send("Lahore,Dept1,hello").await;

    assert_eq!(
        b.recv().await.as_deref(),
        Some("[Peshawar Admissions -> Lahore Dept1] hello")
    );
    sender.expect_silence().await;
}

#[tokio::test]
async fn unreachable_campus_gets_routing_error() {
    let relay = start_relay(8).await;
    let mut a = Endpoint::join(&relay, "Lahore:Dept1:NU-LHR-123").await;
    let mut sender = Endpoint::join(&relay, "Multan:IT:NU-MTN-123").await;

    sender.send("CFD,Dept1,hello").await;

    assert_eq!(
        sender.recv().await.as_deref(),
        Some("[SERVER] Target campus CFD not connected.")
    );
    a.expect_silence().await;
}

#[tokio::test]
async fn ping_updates_listing_and_enables_broadcast() {
    let relay = start_relay(8).await;
    let mut a = Endpoint::join(&relay, "Lahore:Dept1:NU-LHR-123").await;

    let before = a.listing().await;
    assert!(before.contains(&"  1. Lahore - Dept1 (Last seen: never)".to_string()));

    let pinger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    pinger.send_to(b"Lahore|Dept1", relay.udp).await.unwrap();

    let after = wait_for_listing(&mut a, |block| {
        block
            .iter()
            .any(|line| line.starts_with("  1. Lahore - Dept1") && !line.ends_with("never)"))
    })
    .await;
    assert_eq!(after.first().map(String::as_str), Some("[SERVER] Connected Campuses:"));

    let report = relay.dispatcher.broadcast("Campus closed tomorrow").await;
    assert_eq!((report.targets, report.sent), (1, 1));

    let mut buf = [0u8; 128];
    let (n, from) = tokio::time::timeout(WAIT, pinger.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..n], b"Campus closed tomorrow");
    assert_eq!(from, relay.udp);
}

#[tokio::test]
async fn disconnect_removes_session() {
    let relay = start_relay(8).await;
    let a = Endpoint::join(&relay, "Lahore:Dept1:NU-LHR-123").await;
    let mut observer = Endpoint::join(&relay, "Karachi:IT:NU-KHI-123").await;

    drop(a);

    let block = wait_for_listing(&mut observer, |block| {
        !block.iter().any(|line| line.contains("Lahore"))
    })
    .await;
    assert!(block.contains(&"  1. Karachi - IT (Last seen: never)".to_string()));

    observer.send("Lahore,Dept1,are you there").await;
    assert_eq!(
        observer.recv().await.as_deref(),
        Some("[SERVER] Target campus Lahore not connected.")
    );

    // The identity is free again.
    Endpoint::join(&relay, "Lahore:Dept1:NU-LHR-123").await;
}

#[tokio::test]
async fn capacity_rejects_extra_session() {
    let relay = start_relay(2).await;
    let mut a = Endpoint::join(&relay, "Lahore:IT:NU-LHR-123").await;
    let _b = Endpoint::join(&relay, "Karachi:IT:NU-KHI-123").await;

    let (mut extra, reply) = Endpoint::connect(&relay, "Multan:IT:NU-MTN-123").await;
    assert_eq!(reply, "SERVER_FULL");
    assert_eq!(extra.recv().await, None);

    let block = a.listing().await;
    assert_eq!(block.len(), 4);
    assert_eq!(block[1], "  1. Lahore - IT (Last seen: never)");
    assert_eq!(block[2], "  2. Karachi - IT (Last seen: never)");
}

#[tokio::test]
async fn concurrent_duplicate_logins_leave_one_session() {
    let relay = start_relay(8).await;

    let attempts: Vec<_> = (0..6)
        .map(|_| {
            let tcp = relay.tcp;
            tokio::spawn(async move {
                let stream = TcpStream::connect(tcp).await.unwrap();
                let (read, mut write) = stream.into_split();
                write.write_all(b"CFD:IT:NU-CFD-123\n").await.unwrap();
                let mut lines = BufReader::new(read).lines();
                let reply = tokio::time::timeout(WAIT, lines.next_line())
                    .await
                    .unwrap()
                    .unwrap()
                    .unwrap();
                (reply, lines, write)
            })
        })
        .collect();

    let mut ok = 0;
    let mut live = Vec::new();
    for attempt in attempts {
        let (reply, lines, write) = attempt.await.unwrap();
        match reply.as_str() {
            "AUTH_OK" => ok += 1,
            other => assert_eq!(other, "ALREADY_CONNECTED"),
        }
        live.push((lines, write));
    }
    assert_eq!(ok, 1);

    let mut observer = Endpoint::join(&relay, "Karachi:IT:NU-KHI-123").await;
    let block = observer.listing().await;
    assert_eq!(block.iter().filter(|line| line.contains("CFD - IT")).count(), 1);
}

#[tokio::test]
async fn bad_credentials_close_the_connection() {
    let relay = start_relay(8).await;

    let (mut wrong, reply) = Endpoint::connect(&relay, "Lahore:IT:NU-KHI-123").await;
    assert_eq!(reply, "AUTH_FAILED");
    assert_eq!(wrong.recv().await, None);

    let (mut malformed, reply) = Endpoint::connect(&relay, "Lahore").await;
    assert_eq!(reply, "BAD_FORMAT: Use Campus:Dept:Password");
    assert_eq!(malformed.recv().await, None);
}
