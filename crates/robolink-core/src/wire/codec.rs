//! Primitive encoders and decoders.
//!
//! Encoders append to a `BytesMut` so a whole request frame can be built
//! before anything touches the socket. Decoders pull from a [`ByteSource`],
//! which the transport session implements on top of its socket and `Bytes`
//! implements for already-received buffers.
//!
//! ```text
//! int     [i32 BE]
//! double  [f64 BE]
//! line    [UTF-8 bytes]['\n']
//! item    [u64 BE id]            send
//!         [u64 BE id][i32 BE type]  receive
//! array   [i32 BE n][n x f64 BE]
//! pose    [16 x f64 BE, column-major]
//! matrix  [i32 BE rows][i32 BE cols][rows*cols x f64 BE, column-major]
//! lines   [i32 BE n][n x line]
//! items   [i32 BE n][n x item]
//! ```

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, Result, TransportError};
use crate::item::ItemHandle;
use crate::types::{Matrix2D, Pose};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const INT_SIZE: usize = 4;
pub const DOUBLE_SIZE: usize = 8;
pub const ITEM_ID_SIZE: usize = 8;
pub const POSE_VALUES: usize = 16;

/// Anything the decoders can pull bytes from.
#[async_trait::async_trait]
pub trait ByteSource: Send {
    /// Read exactly `n` bytes or fail.
    async fn recv_exact(&mut self, n: usize) -> Result<Bytes>;

    /// Read one `\n`-terminated line, returning it without the terminator.
    async fn recv_line(&mut self) -> Result<Vec<u8>>;
}

#[async_trait::async_trait]
impl ByteSource for Bytes {
    async fn recv_exact(&mut self, n: usize) -> Result<Bytes> {
        if self.len() < n {
            let received = self.len();
            self.clear();
            return Err(TransportError::ConnectionClosed {
                expected: n,
                received,
            }
            .into());
        }
        Ok(self.split_to(n))
    }

    async fn recv_line(&mut self) -> Result<Vec<u8>> {
        match self.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let line = self.split_to(pos).to_vec();
                self.advance(1);
                Ok(line)
            }
            None => {
                let received = self.len();
                self.clear();
                Err(TransportError::ConnectionClosed {
                    expected: received + 1,
                    received,
                }
                .into())
            }
        }
    }
}

// Encoders

pub fn put_int(buf: &mut BytesMut, value: i32) {
    buf.put_i32(value);
}

pub fn put_double(buf: &mut BytesMut, value: f64) {
    buf.put_f64(value);
}

/// Embedded newlines would split the frame, so they become spaces.
pub fn put_line(buf: &mut BytesMut, text: &str) {
    if text.contains('\n') {
        buf.put_slice(text.replace('\n', " ").as_bytes());
    } else {
        buf.put_slice(text.as_bytes());
    }
    buf.put_u8(b'\n');
}

/// Only the id is sent; the station knows the type.
pub fn put_item(buf: &mut BytesMut, item: Option<&ItemHandle>) {
    buf.put_u64(ItemHandle::wire_id(item));
}

pub fn put_array(buf: &mut BytesMut, values: &[f64]) {
    buf.put_i32(values.len() as i32);
    for value in values {
        buf.put_f64(*value);
    }
}

pub fn put_pose(buf: &mut BytesMut, pose: &Pose) {
    for value in pose.to_column_major() {
        buf.put_f64(value);
    }
}

pub fn put_matrix(buf: &mut BytesMut, matrix: &Matrix2D) {
    buf.put_i32(matrix.rows() as i32);
    buf.put_i32(matrix.cols() as i32);
    for value in matrix.as_column_major() {
        buf.put_f64(*value);
    }
}

pub fn put_lines(buf: &mut BytesMut, lines: &[String]) {
    buf.put_i32(lines.len() as i32);
    for line in lines {
        put_line(buf, line);
    }
}

pub fn put_items(buf: &mut BytesMut, items: &[ItemHandle]) {
    buf.put_i32(items.len() as i32);
    for item in items {
        put_item(buf, Some(item));
    }
}

// Decoders

pub async fn read_int<S: ByteSource + ?Sized>(src: &mut S) -> Result<i32> {
    let mut bytes = src.recv_exact(INT_SIZE).await?;
    Ok(bytes.get_i32())
}

pub async fn read_double<S: ByteSource + ?Sized>(src: &mut S) -> Result<f64> {
    let mut bytes = src.recv_exact(DOUBLE_SIZE).await?;
    Ok(bytes.get_f64())
}

pub async fn read_line<S: ByteSource + ?Sized>(src: &mut S) -> Result<String> {
    let raw = src.recv_line().await?;
    String::from_utf8(raw).map_err(|e| ProtocolError::InvalidText(e).into())
}

pub async fn read_item<S: ByteSource + ?Sized>(src: &mut S) -> Result<ItemHandle> {
    let mut bytes = src.recv_exact(ITEM_ID_SIZE + INT_SIZE).await?;
    let id = bytes.get_u64();
    let type_code = bytes.get_i32();
    Ok(ItemHandle::from_wire(id, type_code))
}

/// Read a count prefix, rejecting values no well-behaved station sends.
pub async fn read_count<S: ByteSource + ?Sized>(
    src: &mut S,
    context: &'static str,
) -> Result<usize> {
    let raw = read_int(src).await?;
    check_count(raw, context)
}

fn check_count(raw: i32, context: &'static str) -> Result<usize> {
    if raw < 0 {
        return Err(ProtocolError::FramingMismatch {
            context,
            detail: format!("negative count {}", raw),
        }
        .into());
    }
    let count = raw as usize;
    if count > ProtocolConfig::MAX_ELEMENTS {
        return Err(ProtocolError::FramingMismatch {
            context,
            detail: format!(
                "count {} exceeds maximum {}",
                count,
                ProtocolConfig::MAX_ELEMENTS
            ),
        }
        .into());
    }
    Ok(count)
}

async fn read_doubles<S: ByteSource + ?Sized>(src: &mut S, count: usize) -> Result<Vec<f64>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut bytes = src.recv_exact(count * DOUBLE_SIZE).await?;
    Ok((0..count).map(|_| bytes.get_f64()).collect())
}

/// A zero count decodes to an empty vector, which callers treat as "no data".
pub async fn read_array<S: ByteSource + ?Sized>(src: &mut S) -> Result<Vec<f64>> {
    let count = read_count(src, "array").await?;
    read_doubles(src, count).await
}

pub async fn read_pose<S: ByteSource + ?Sized>(src: &mut S) -> Result<Pose> {
    let values = read_doubles(src, POSE_VALUES).await?;
    pose_from_slice(&values)
}

/// Interpret the first 16 values of a slice as a column-major pose.
pub fn pose_from_slice(values: &[f64]) -> Result<Pose> {
    let column_major: &[f64; POSE_VALUES] = values
        .get(..POSE_VALUES)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ProtocolError::FramingMismatch {
            context: "pose",
            detail: format!("expected {} values, got {}", POSE_VALUES, values.len()),
        })?;
    Ok(Pose::from_column_major(column_major))
}

pub async fn read_matrix<S: ByteSource + ?Sized>(src: &mut S) -> Result<Matrix2D> {
    let rows = read_count(src, "matrix rows").await?;
    let cols = read_count(src, "matrix cols").await?;
    let total = rows
        .checked_mul(cols)
        .filter(|n| *n <= ProtocolConfig::MAX_ELEMENTS)
        .ok_or_else(|| ProtocolError::FramingMismatch {
            context: "matrix",
            detail: format!("{}x{} exceeds maximum size", rows, cols),
        })?;
    let data = read_doubles(src, total).await?;
    Matrix2D::from_column_major(rows, cols, data).ok_or_else(|| {
        ProtocolError::FramingMismatch {
            context: "matrix",
            detail: "payload length does not match shape".to_string(),
        }
        .into()
    })
}

pub async fn read_lines<S: ByteSource + ?Sized>(src: &mut S) -> Result<Vec<String>> {
    let count = read_count(src, "line list").await?;
    let mut lines = Vec::with_capacity(count.min(1024));
    let mut invalid = None;
    // Consume every line even if one is not UTF-8, so the stream stays aligned.
    for _ in 0..count {
        let raw = src.recv_line().await?;
        match String::from_utf8(raw) {
            Ok(line) => lines.push(line),
            Err(e) => {
                invalid.get_or_insert(e);
            }
        }
    }
    match invalid {
        Some(e) => Err(ProtocolError::InvalidText(e).into()),
        None => Ok(lines),
    }
}

pub async fn read_items<S: ByteSource + ?Sized>(src: &mut S) -> Result<Vec<ItemHandle>> {
    let count = read_count(src, "item list").await?;
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(read_item(src).await?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RobolinkError;

    fn encoded(f: impl FnOnce(&mut BytesMut)) -> Bytes {
        let mut buf = BytesMut::new();
        f(&mut buf);
        buf.freeze()
    }

    #[test]
    fn test_int_is_big_endian() {
        let bytes = encoded(|b| put_int(b, 0x0102_0304));
        assert_eq!(&bytes[..], &[0x01, 0x02, 0x03, 0x04]);

        let bytes = encoded(|b| put_int(b, -2));
        assert_eq!(&bytes[..], &[0xff, 0xff, 0xff, 0xfe]);
    }

    #[test]
    fn test_double_is_big_endian() {
        let bytes = encoded(|b| put_double(b, 1.0));
        assert_eq!(&bytes[..], &1.0f64.to_be_bytes());
        assert_eq!(bytes[0], 0x3f);
    }

    #[test]
    fn test_line_replaces_embedded_newlines() {
        let bytes = encoded(|b| put_line(b, "two\nlines"));
        assert_eq!(&bytes[..], b"two lines\n");
    }

    #[test]
    fn test_null_item_is_eight_zero_bytes() {
        let bytes = encoded(|b| put_item(b, None));
        assert_eq!(&bytes[..], &[0u8; 8]);

        let null = ItemHandle::null();
        let bytes = encoded(|b| put_item(b, Some(&null)));
        assert_eq!(&bytes[..], &[0u8; 8]);
    }

    #[test]
    fn test_pose_is_column_major_without_prefix() {
        let pose = Pose::from_translation(10.0, 20.0, 30.0);
        let bytes = encoded(|b| put_pose(b, &pose));
        assert_eq!(bytes.len(), 128);
        // Element 12 is row 0, col 3
        assert_eq!(&bytes[96..104], &10.0f64.to_be_bytes());
    }

    #[tokio::test]
    async fn test_scalar_roundtrip_is_bit_exact() {
        for value in [0.0, -0.0, f64::MIN_POSITIVE, 1e300, -123.456, f64::INFINITY] {
            let mut bytes = encoded(|b| put_double(b, value));
            let back = read_double(&mut bytes).await.unwrap();
            assert_eq!(back.to_bits(), value.to_bits());
        }

        let mut nan = encoded(|b| put_double(b, f64::NAN));
        assert!(read_double(&mut nan).await.unwrap().is_nan());

        for value in [i32::MIN, -1, 0, 1, i32::MAX] {
            let mut bytes = encoded(|b| put_int(b, value));
            assert_eq!(read_int(&mut bytes).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_line_roundtrip_utf8() {
        let mut bytes = encoded(|b| put_line(b, "Bras robotisé ü"));
        assert_eq!(read_line(&mut bytes).await.unwrap(), "Bras robotisé ü");
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_read_item_with_type_tag() {
        let mut bytes = Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 0x2a, 0, 0, 0, 3]);
        let item = read_item(&mut bytes).await.unwrap();
        assert_eq!(item.id(), 42);
        assert_eq!(item.item_type(), crate::item::ItemType::Frame);

        let mut null = Bytes::from_static(&[0u8; 12]);
        assert!(!read_item(&mut null).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_empty_array_is_not_an_error() {
        let mut bytes = encoded(|b| put_array(b, &[]));
        assert_eq!(&bytes[..], &[0, 0, 0, 0]);
        assert!(read_array(&mut bytes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_matrix_roundtrip_preserves_shape() {
        let m = Matrix2D::from_columns(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let mut bytes = encoded(|b| put_matrix(b, &m));
        assert_eq!(bytes.len(), 8 + 6 * 8);
        assert_eq!(read_matrix(&mut bytes).await.unwrap(), m);

        for (rows, cols) in [(0, 0), (0, 5), (4, 0)] {
            let mut bytes = encoded(|b| put_matrix(b, &Matrix2D::zeros(rows, cols)));
            let back = read_matrix(&mut bytes).await.unwrap();
            assert!(back.is_empty());
            assert_eq!((back.rows(), back.cols()), (rows, cols));
        }
    }

    #[tokio::test]
    async fn test_pose_roundtrip() {
        let mut pose = Pose::identity();
        for r in 0..3 {
            for c in 0..4 {
                pose.set(r, c, (r * 4 + c) as f64 + 0.5);
            }
        }
        let mut bytes = encoded(|b| put_pose(b, &pose));
        assert_eq!(read_pose(&mut bytes).await.unwrap(), pose);
    }

    #[tokio::test]
    async fn test_truncated_pose_fails() {
        let mut bytes = Bytes::from(vec![0u8; 100]);
        let err = read_pose(&mut bytes).await.unwrap_err();
        assert!(matches!(
            err,
            RobolinkError::Transport(TransportError::ConnectionClosed {
                expected: 128,
                received: 100
            })
        ));
    }

    #[test]
    fn test_pose_from_short_slice_is_framing_error() {
        let err = pose_from_slice(&[0.0; 10]).unwrap_err();
        assert!(matches!(
            err,
            RobolinkError::Protocol(ProtocolError::FramingMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_negative_count_is_framing_error() {
        let mut bytes = encoded(|b| put_int(b, -3));
        let err = read_array(&mut bytes).await.unwrap_err();
        assert!(err.is_session_fatal());
        assert!(matches!(
            err,
            RobolinkError::Protocol(ProtocolError::FramingMismatch { context: "array", .. })
        ));
    }

    #[tokio::test]
    async fn test_lists_roundtrip() {
        let names = vec!["Frame 1".to_string(), "UR10".to_string()];
        let mut bytes = encoded(|b| put_lines(b, &names));
        assert_eq!(read_lines(&mut bytes).await.unwrap(), names);

        let mut bytes = Bytes::from_static(&[
            0, 0, 0, 2, //
            0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 2, //
            0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 6,
        ]);
        let items = read_items(&mut bytes).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_not_session_fatal() {
        let mut bytes = Bytes::from_static(b"\xff\xfe\n");
        let err = read_line(&mut bytes).await.unwrap_err();
        assert!(matches!(err, RobolinkError::Protocol(ProtocolError::InvalidText(_))));
        assert!(!err.is_session_fatal());
    }
}
