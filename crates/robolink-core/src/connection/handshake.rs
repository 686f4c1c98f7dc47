//! Opening handshakes for the command and event connections.

use crate::config::ProtocolConfig;
use crate::dispatch::status;
use crate::error::{ConnectError, Result};
use crate::transport::Session;
use crate::wire::codec;
use bytes::BytesMut;
use serde::Serialize;
use tracing::info;

/// What the station reported about itself during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StationInfo {
    pub protocol_version: i32,
    /// Build number, 0 when the station did not report one.
    pub build: u32,
}

/// Command connection handshake.
///
/// Sends the API identifier and reads back the echoed identifier, protocol
/// version, build number and a trailing status.
pub async fn api_handshake(session: &mut Session) -> Result<StationInfo> {
    send_identifier(session, ProtocolConfig::API_HANDSHAKE).await?;

    let echo = codec::read_line(session).await?;
    let protocol_version = codec::read_int(session).await?;
    let build = codec::read_int(session).await?;
    status::read_status(session).await?;

    check_echo(&echo, ProtocolConfig::API_HANDSHAKE)?;
    let info = StationInfo {
        protocol_version,
        build: u32::try_from(build).unwrap_or(0),
    };
    info!(
        "Station on port {} speaks protocol {} (build {})",
        session.port(),
        info.protocol_version,
        info.build
    );
    Ok(info)
}

/// Event connection handshake. Returns the event protocol version.
pub async fn event_handshake(session: &mut Session) -> Result<i32> {
    send_identifier(session, ProtocolConfig::EVENT_HANDSHAKE).await?;

    let echo = codec::read_line(session).await?;
    let version = codec::read_int(session).await?;
    status::read_status(session).await?;

    check_echo(&echo, ProtocolConfig::EVENT_HANDSHAKE)?;
    Ok(version)
}

async fn send_identifier(session: &mut Session, identifier: &str) -> Result<()> {
    let mut buf = BytesMut::new();
    codec::put_line(&mut buf, identifier);
    codec::put_int(&mut buf, ProtocolConfig::HANDSHAKE_ARG);
    session.send_raw(&buf).await
}

fn check_echo(echo: &str, expected: &str) -> Result<()> {
    if echo == expected {
        Ok(())
    } else {
        Err(ConnectError::HandshakeFailed {
            reason: format!("station answered {:?} instead of {:?}", echo, expected),
        }
        .into())
    }
}
