//! SNMP GET transport built on `snmp2`.
//!
//! One session is opened per query so the source carries no connection state
//! and can be shared freely between the scheduler and request handlers. Every
//! fault is mapped onto [`FailureKind`]:
//!
//! - no reply within the timeout → `Timeout` (retried up to the retry budget)
//! - non-zero error-status or an exception value → `ProtocolError`
//! - anything else (bind failure, bad OID, empty reply) → `TransportError`

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value, v3};
use tokio::time::timeout;

use crate::config::{AuthProtocol, PrivProtocol, SnmpSettings, SnmpVersion};
use crate::error::FailureKind;
use crate::source::{MetricSource, RawResult};

/// SNMP metric source for a single agent.
pub struct SnmpSource {
    settings: SnmpSettings,
}

enum Attempt {
    Done(RawResult),
    Retry(RawResult),
}

impl SnmpSource {
    pub fn new(settings: SnmpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SnmpSettings {
        &self.settings
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    fn timed_out(&self, stage: &str) -> Attempt {
        Attempt::Retry(RawResult::failed(
            FailureKind::Timeout,
            format!(
                "no {stage} reply from {} within {} ms",
                self.addr(),
                self.settings.timeout.as_millis()
            ),
        ))
    }

    async fn open_session(&self) -> Result<AsyncSession, Attempt> {
        let addr = self.addr();
        match self.settings.version {
            SnmpVersion::V2c => {
                AsyncSession::new_v2c(addr.as_str(), self.settings.community.as_bytes(), 0)
                    .await
                    .map_err(|e| {
                        Attempt::Done(RawResult::failed(
                            FailureKind::TransportError,
                            format!("cannot open session to {addr}: {e}"),
                        ))
                    })
            }
            SnmpVersion::V3 => {
                let mut session = AsyncSession::new_v3(addr.as_str(), 0, self.security())
                    .await
                    .map_err(|e| {
                        Attempt::Done(RawResult::failed(
                            FailureKind::TransportError,
                            format!("cannot open session to {addr}: {e}"),
                        ))
                    })?;
                // Engine discovery round trip.
                match timeout(self.settings.timeout, session.init()).await {
                    Err(_) => Err(self.timed_out("engine discovery")),
                    Ok(Err(e)) => Err(Attempt::Done(RawResult::failed(
                        FailureKind::TransportError,
                        format!("engine discovery with {addr} failed: {e}"),
                    ))),
                    Ok(Ok(())) => Ok(session),
                }
            }
        }
    }

    fn security(&self) -> v3::Security {
        let s = &self.settings;
        let auth_protocol = match s.auth_protocol {
            AuthProtocol::Md5 => v3::AuthProtocol::Md5,
            AuthProtocol::Sha1 => v3::AuthProtocol::Sha1,
            AuthProtocol::Sha256 => v3::AuthProtocol::Sha256,
        };
        let cipher = match s.priv_protocol {
            PrivProtocol::Des => v3::Cipher::Des,
            PrivProtocol::Aes128 => v3::Cipher::Aes128,
            PrivProtocol::Aes256 => v3::Cipher::Aes256,
        };
        v3::Security::new(s.username.as_bytes(), s.auth_password.as_bytes())
            .with_auth_protocol(auth_protocol)
            .with_auth(v3::Auth::AuthPriv {
                cipher,
                privacy_password: s.priv_password.as_bytes().to_vec(),
            })
    }

    async fn attempt(&self, oid: &Oid<'_>) -> Attempt {
        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(attempt) => return attempt,
        };

        match timeout(self.settings.timeout, session.get(oid)).await {
            Err(_) => self.timed_out("GET"),
            Ok(Err(e)) => Attempt::Done(RawResult::failed(
                FailureKind::TransportError,
                format!("GET failed: {e}"),
            )),
            Ok(Ok(pdu)) => {
                if pdu.error_status != 0 {
                    let status = pdu.error_status as i64;
                    return Attempt::Done(RawResult::failed(
                        FailureKind::ProtocolError,
                        format!("{} (error-index {})", error_status_name(status), pdu.error_index),
                    ));
                }
                match pdu.varbinds.into_iter().next() {
                    Some((_, value)) => Attempt::Done(render_value(&value)),
                    None => Attempt::Done(RawResult::failed(
                        FailureKind::TransportError,
                        "reply carried no variable bindings",
                    )),
                }
            }
        }
    }
}

#[async_trait]
impl MetricSource for SnmpSource {
    async fn query(&self, address: &str) -> RawResult {
        let oid = match parse_oid(address) {
            Ok(oid) => oid,
            Err(detail) => return RawResult::failed(FailureKind::TransportError, detail),
        };

        let attempts = self.settings.retries.saturating_add(1);
        let mut last = RawResult::failed(FailureKind::Timeout, "no attempt made");
        for n in 1..=attempts {
            match self.attempt(&oid).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(result) => {
                    log::debug!("SNMP {address}: attempt {n}/{attempts} timed out");
                    last = result;
                }
            }
        }
        last
    }

    fn target(&self) -> String {
        self.addr()
    }
}

/// Parse a dotted OID string.
pub fn parse_oid(s: &str) -> Result<Oid<'static>, String> {
    let parts: Vec<u64> = s
        .trim()
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid OID '{s}': {e}"))?;
    if parts.is_empty() {
        return Err(format!("invalid OID '{s}': no arcs"));
    }
    Oid::from(&parts).map_err(|e| format!("invalid OID '{s}': {e:?}"))
}

/// Render a varbind value as text, or classify it as a protocol failure.
pub fn render_value(value: &Value<'_>) -> RawResult {
    match value {
        Value::Integer(n) => RawResult::ok(n.to_string()),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
            RawResult::ok(n.to_string())
        }
        Value::Counter64(n) => RawResult::ok(n.to_string()),
        Value::OctetString(bytes) | Value::Opaque(bytes) => {
            RawResult::ok(String::from_utf8_lossy(bytes).into_owned())
        }
        Value::IpAddress(ip) => RawResult::ok(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
        Value::ObjectIdentifier(oid) => RawResult::ok(oid.to_string()),
        Value::Boolean(b) => RawResult::ok(b.to_string()),
        Value::NoSuchObject => RawResult::failed(FailureKind::ProtocolError, "noSuchObject"),
        Value::NoSuchInstance => RawResult::failed(FailureKind::ProtocolError, "noSuchInstance"),
        Value::EndOfMibView => RawResult::failed(FailureKind::ProtocolError, "endOfMibView"),
        Value::Null => RawResult::failed(FailureKind::ProtocolError, "agent returned NULL"),
        _ => RawResult::failed(
            FailureKind::TransportError,
            "unexpected value type in GET reply",
        ),
    }
}

/// RFC 3416 error-status names.
fn error_status_name(status: i64) -> String {
    let name = match status {
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => return format!("error-status {status}"),
    };
    name.to_string()
}
