//! Yeelight LAN protocol client.
//!
//! Commands are JSON objects, one per line (`\r\n`), sent over TCP to
//! port 55443. Request/response commands open a short-lived control
//! connection. In music mode the bulb connects back to a listener we
//! open, and colour/brightness commands are written to that socket
//! without waiting for a reply.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::flow::Flow;
use super::{BulbClient, BulbProperties, Power};
use crate::error::{with_timeout, AmbiError, Result};

pub const DEFAULT_PORT: u16 = 55443;

/// Fade used for power and brightness changes.
const SMOOTH_MS: u64 = 300;

#[derive(Debug, Serialize)]
struct Command<'a> {
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

impl Command<'_> {
    fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).map_err(|e| AmbiError::Json {
            field: self.method.to_string(),
            detail: e.to_string(),
        })?;
        line.push_str("\r\n");
        Ok(line)
    }
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    code: i64,
    message: String,
}

/// A single Yeelight bulb.
pub struct YeelightBulb {
    host: String,
    port: u16,
    timeout: Duration,
    next_id: AtomicU64,
    music: Mutex<Option<TcpStream>>,
}

impl YeelightBulb {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(5),
            next_id: AtomicU64::new(1),
            music: Mutex::new(None),
        }
    }

    /// Override the control port (default 55443).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Deadline for each request/response exchange (default 5 s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn is_music_active(&self) -> bool {
        self.music.lock().await.is_some()
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn command<'a>(&self, method: &'a str, params: Vec<Value>) -> Command<'a> {
        Command {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let target = self.target();
        with_timeout("bulb connect", self.timeout, async {
            TcpStream::connect(&target)
                .await
                .map_err(|e| AmbiError::Connect {
                    target: target.clone(),
                    detail: e.to_string(),
                })
        })
        .await
    }

    /// Write `cmd` on `stream` and wait for the reply carrying its id.
    async fn exchange(&self, stream: &mut TcpStream, cmd: &Command<'_>) -> Result<Vec<Value>> {
        let line = cmd.to_line()?;
        let (read_half, mut write_half) = stream.split();
        write_half.write_all(line.as_bytes()).await?;

        let mut lines = BufReader::new(read_half).lines();
        loop {
            let Some(raw) = lines.next_line().await? else {
                return Err(AmbiError::Connect {
                    target: self.target(),
                    detail: format!("connection closed before reply to '{}'", cmd.method),
                });
            };
            let reply: Reply = match serde_json::from_str(&raw) {
                Ok(r) => r,
                Err(e) => {
                    debug!(line = %raw, error = %e, "skipping unparseable bulb line");
                    continue;
                }
            };
            // Notifications (`{"method":"props",...}`) carry no id.
            if reply.id != Some(cmd.id) {
                continue;
            }
            if let Some(err) = reply.error {
                return Err(AmbiError::Bulb {
                    method: cmd.method.to_string(),
                    code: err.code,
                    message: err.message,
                });
            }
            return Ok(reply.result.unwrap_or_default());
        }
    }

    /// Send one command over a fresh control connection and return its result.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>> {
        let cmd = self.command(method, params);
        with_timeout("bulb request", self.timeout, async {
            let mut stream = self.connect().await?;
            self.exchange(&mut stream, &cmd).await
        })
        .await
    }

    /// Send over the music socket when it is open, else as a normal request.
    async fn send(&self, method: &str, params: Vec<Value>) -> Result<()> {
        let mut music = self.music.lock().await;
        if let Some(stream) = music.as_mut() {
            let line = self.command(method, params).to_line()?;
            let written =
                with_timeout("music write", self.timeout, async {
                    stream.write_all(line.as_bytes()).await.map_err(AmbiError::from)
                })
                .await;
            if let Err(e) = written {
                warn!(bulb = %self.host, error = %e, "music connection lost");
                *music = None;
                return Err(e);
            }
            return Ok(());
        }
        drop(music);
        self.request(method, params).await.map(|_| ())
    }
}

#[async_trait]
impl BulbClient for YeelightBulb {
    async fn get_properties(&self) -> Result<BulbProperties> {
        let result = self
            .request("get_prop", vec![json!("power"), json!("music_on")])
            .await?;
        let prop = |i: usize| result.get(i).and_then(Value::as_str).unwrap_or_default();
        if result.len() < 2 {
            return Err(AmbiError::Json {
                field: "get_prop".into(),
                detail: format!("expected 2 values, got {}", result.len()),
            });
        }
        Ok(BulbProperties {
            power: Power::from_prop(prop(0)),
            music_on: prop(1).trim() == "1",
        })
    }

    async fn turn_on(&self) -> Result<()> {
        self.send("set_power", vec![json!("on"), json!("smooth"), json!(SMOOTH_MS)])
            .await
    }

    async fn turn_off(&self) -> Result<()> {
        self.send("set_power", vec![json!("off"), json!("smooth"), json!(SMOOTH_MS)])
            .await
    }

    async fn start_music(&self) -> Result<()> {
        let mut music = self.music.lock().await;
        if music.is_some() {
            return Ok(());
        }

        let mut control = self.connect().await?;
        // Listen on the interface the bulb can reach us on.
        let local_ip = control.local_addr()?.ip();
        let listener = TcpListener::bind(SocketAddr::new(local_ip, 0)).await?;
        let port = listener.local_addr()?.port();

        let cmd = self.command(
            "set_music",
            vec![json!(1), json!(local_ip.to_string()), json!(port)],
        );
        with_timeout("set_music", self.timeout, self.exchange(&mut control, &cmd)).await?;

        let (stream, peer) = match tokio::time::timeout(self.timeout, listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(AmbiError::MusicHandshake(self.target())),
        };
        stream.set_nodelay(true)?;
        debug!(bulb = %self.host, peer = %peer, "music mode connected");
        *music = Some(stream);
        Ok(())
    }

    async fn stop_music(&self) -> Result<()> {
        // Closing the socket is what ends music mode on the bulb.
        let had_music = self.music.lock().await.take().is_some();
        match self.request("set_music", vec![json!(0)]).await {
            Ok(_) => Ok(()),
            Err(AmbiError::Bulb { message, .. }) if had_music => {
                debug!(bulb = %self.host, %message, "bulb already left music mode");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_brightness(&self, level: u8) -> Result<()> {
        let level = level.clamp(1, 100);
        self.send("set_bright", vec![json!(level), json!("smooth"), json!(SMOOTH_MS)])
            .await
    }

    async fn start_flow(&self, flow: &Flow) -> Result<()> {
        self.send("start_cf", flow.params()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulb::flow::Transition;
    use crate::color::Rgb;

    /// Accept one control connection, answer its first command with
    /// `reply(id, method, params)` and return the received command.
    async fn fake_bulb_once<F>(listener: TcpListener, reply: F) -> Value
    where
        F: FnOnce(u64, &str, &Value) -> String,
    {
        let (stream, _) = listener.accept().await.unwrap();
        let (r, mut w) = stream.into_split();
        let mut lines = BufReader::new(r).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let cmd: Value = serde_json::from_str(&line).unwrap();
        let id = cmd["id"].as_u64().unwrap();
        let out = reply(id, cmd["method"].as_str().unwrap(), &cmd["params"]);
        w.write_all(out.as_bytes()).await.unwrap();
        cmd
    }

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn command_line_is_crlf_terminated_json() {
        let bulb = YeelightBulb::new("10.0.0.9");
        let line = bulb
            .command("set_power", vec![json!("on"), json!("smooth"), json!(300)])
            .to_line()
            .unwrap();
        assert!(line.ends_with("\r\n"));
        let v: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(v["method"], "set_power");
        assert_eq!(v["params"][0], "on");
        assert_eq!(v["id"], 1);
    }

    #[test]
    fn command_ids_increase() {
        let bulb = YeelightBulb::new("10.0.0.9");
        let a = bulb.command("get_prop", vec![]).id;
        let b = bulb.command("get_prop", vec![]).id;
        assert!(b > a);
    }

    #[tokio::test]
    async fn get_properties_parses_power_and_music() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(fake_bulb_once(listener, |id, _, _| {
            format!("{{\"method\":\"props\",\"params\":{{\"bright\":\"10\"}}}}\r\n{{\"id\":{id},\"result\":[\"on\",\"1\"]}}\r\n")
        }));

        let bulb = YeelightBulb::new("127.0.0.1").with_port(port);
        let props = bulb.get_properties().await.unwrap();
        assert_eq!(props.power, Power::On);
        assert!(props.music_on);

        let cmd = server.await.unwrap();
        assert_eq!(cmd["method"], "get_prop");
        assert_eq!(cmd["params"], json!(["power", "music_on"]));
    }

    #[tokio::test]
    async fn get_properties_without_music_support() {
        let (listener, port) = local_listener().await;
        tokio::spawn(fake_bulb_once(listener, |id, _, _| {
            format!("{{\"id\":{id},\"result\":[\"off\",\"\"]}}\r\n")
        }));
        let bulb = YeelightBulb::new("127.0.0.1").with_port(port);
        let props = bulb.get_properties().await.unwrap();
        assert_eq!(props.power, Power::Off);
        assert!(!props.music_on);
    }

    #[tokio::test]
    async fn bulb_error_reply_is_reported() {
        let (listener, port) = local_listener().await;
        tokio::spawn(fake_bulb_once(listener, |id, _, _| {
            format!("{{\"id\":{id},\"error\":{{\"code\":-1,\"message\":\"client quota exceeded\"}}}}\r\n")
        }));
        let bulb = YeelightBulb::new("127.0.0.1").with_port(port);
        let err = bulb.set_brightness(50).await.unwrap_err();
        match err {
            AmbiError::Bulb { method, code, message } => {
                assert_eq!(method, "set_bright");
                assert_eq!(code, -1);
                assert!(message.contains("quota"));
            }
            other => panic!("expected bulb error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn brightness_zero_is_sent_as_one() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(fake_bulb_once(listener, |id, _, _| {
            format!("{{\"id\":{id},\"result\":[\"ok\"]}}\r\n")
        }));
        let bulb = YeelightBulb::new("127.0.0.1").with_port(port);
        tokio_test::assert_ok!(bulb.set_brightness(0).await);
        let cmd = server.await.unwrap();
        assert_eq!(cmd["params"][0], 1);
    }

    #[tokio::test]
    async fn unreachable_bulb_is_connect_error() {
        let (listener, port) = local_listener().await;
        drop(listener);
        let bulb = YeelightBulb::new("127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_millis(500));
        let err = bulb.get_properties().await.unwrap_err();
        assert!(
            matches!(err, AmbiError::Connect { .. } | AmbiError::Timeout { .. }),
            "unexpected: {err:?}"
        );
    }

    #[tokio::test]
    async fn music_mode_routes_flows_over_callback_socket() {
        let (listener, port) = local_listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, mut w) = stream.into_split();
            let mut lines = BufReader::new(r).lines();
            let cmd: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(cmd["method"], "set_music");
            assert_eq!(cmd["params"][0], 1);
            let host = cmd["params"][1].as_str().unwrap().to_string();
            let cb_port = cmd["params"][2].as_u64().unwrap() as u16;
            let id = cmd["id"].as_u64().unwrap();
            w.write_all(format!("{{\"id\":{id},\"result\":[\"ok\"]}}\r\n").as_bytes())
                .await
                .unwrap();

            // Connect back like the bulb does and read one streamed command.
            let music = TcpStream::connect((host.as_str(), cb_port)).await.unwrap();
            let mut music_lines = BufReader::new(music).lines();
            let streamed: Value =
                serde_json::from_str(&music_lines.next_line().await.unwrap().unwrap()).unwrap();
            streamed
        });

        let bulb = YeelightBulb::new("127.0.0.1").with_port(port);
        bulb.start_music().await.unwrap();
        assert!(bulb.is_music_active().await);
        // Second call is a no-op.
        bulb.start_music().await.unwrap();

        let flow = Flow::single(Transition::rgb(Rgb::new(255, 0, 0), 400));
        bulb.start_flow(&flow).await.unwrap();

        let streamed = server.await.unwrap();
        assert_eq!(streamed["method"], "start_cf");
        assert_eq!(streamed["params"][2], "400,1,16711680,100");
    }
}
