//! Trailing status code interpretation.
//!
//! Every response ends with one status int. Some codes are followed by a
//! message line, which must be consumed to keep the stream aligned.
//!
//! | code      | meaning              | message | outcome            |
//! |-----------|----------------------|---------|--------------------|
//! | 0         | ok                   | no      | success            |
//! | 1         | invalid item         | no      | `RemoteError`      |
//! | 2         | warning              | yes     | success + warning  |
//! | 3         | error                | yes     | `RemoteError`      |
//! | 9         | invalid license      | no      | `RemoteError`      |
//! | 10        | target unreachable   | yes     | `RemoteError`      |
//! | 11        | cancelled by user    | yes     | `RemoteError`      |
//! | 12        | invalid input        | yes     | `RemoteError`      |
//! | 4-99      | other error          | yes     | `RemoteError`      |
//! | <0, >=100 | desync               | no      | `ProtocolError`    |

use crate::config::StatusCodes;
use crate::error::{ProtocolError, RemoteError, Result};
use crate::wire::codec;
use crate::wire::ByteSource;
use tracing::warn;

/// Read and classify one status code.
///
/// Returns `Ok(Some(message))` for a warning, `Ok(None)` for plain success.
pub async fn read_status<S: ByteSource + ?Sized>(src: &mut S) -> Result<Option<String>> {
    let code = codec::read_int(src).await?;
    match code {
        StatusCodes::OK => Ok(None),
        StatusCodes::INVALID_ITEM => Err(RemoteError::InvalidItem.into()),
        StatusCodes::WARNING => {
            let message = read_message(src).await?;
            warn!("Station warning: {}", message);
            Ok(Some(message))
        }
        StatusCodes::ERROR => Err(RemoteError::Failed(read_message(src).await?).into()),
        StatusCodes::INVALID_LICENSE => Err(RemoteError::InvalidLicense.into()),
        StatusCodes::TARGET_UNREACHABLE => {
            Err(RemoteError::TargetUnreachable(read_message(src).await?).into())
        }
        StatusCodes::CANCELLED => Err(RemoteError::Cancelled(read_message(src).await?).into()),
        StatusCodes::INVALID_INPUT => {
            Err(RemoteError::InvalidInput(read_message(src).await?).into())
        }
        code if code > 0 && code < StatusCodes::UPPER_BOUND => Err(RemoteError::Other {
            code,
            message: read_message(src).await?,
        }
        .into()),
        code => Err(ProtocolError::UnexpectedStatusCode(code).into()),
    }
}

/// Status message line. Undecodable bytes are replaced, never rejected.
async fn read_message<S: ByteSource + ?Sized>(src: &mut S) -> Result<String> {
    let raw = src.recv_line().await?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
