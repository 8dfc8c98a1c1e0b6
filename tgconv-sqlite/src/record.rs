//! Varints and the record format used for every table row.

use crate::header::TextEncoding;
use crate::value::Value;

/// Decode a SQLite varint: big-endian, 7 bits per byte for up to eight bytes,
/// then a full ninth byte. Returns the value and the number of bytes used.
pub(crate) fn read_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut v: u64 = 0;
    for i in 0..8 {
        let b = *buf.get(i)?;
        v = (v << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            return Some((v, i + 1));
        }
    }
    let b = *buf.get(8)?;
    Some(((v << 8) | u64::from(b), 9))
}

/// Decode one record (header of serial types followed by the body).
pub(crate) fn decode_record(payload: &[u8], encoding: TextEncoding) -> Result<Vec<Value>, String> {
    let (header_len, mut pos) = read_varint(payload).ok_or("truncated record header length")?;
    let header_len = usize::try_from(header_len).map_err(|_| "record header too large")?;
    if header_len > payload.len() || header_len < pos {
        return Err(format!("record header length {header_len} out of bounds"));
    }

    let mut body = header_len;
    let mut values = Vec::new();
    while pos < header_len {
        let (serial, n) = read_varint(&payload[pos..header_len]).ok_or("truncated serial type")?;
        pos += n;

        let width = serial_width(serial)?;
        let end = body.checked_add(width).filter(|&e| e <= payload.len())
            .ok_or_else(|| format!("value of serial type {serial} runs past the record"))?;
        values.push(decode_value(serial, &payload[body..end], encoding)?);
        body = end;
    }
    Ok(values)
}

fn serial_width(serial: u64) -> Result<usize, String> {
    Ok(match serial {
        0 | 8 | 9 => 0,
        1 => 1,
        2 => 2,
        3 => 3,
        4 => 4,
        5 => 6,
        6 | 7 => 8,
        10 | 11 => return Err(format!("reserved serial type {serial}")),
        n => usize::try_from((n - 12) / 2).map_err(|_| "oversized value")?,
    })
}

fn decode_value(serial: u64, raw: &[u8], encoding: TextEncoding) -> Result<Value, String> {
    Ok(match serial {
        0 => Value::Null,
        1..=6 => Value::Integer(be_signed(raw)),
        7 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            Value::Real(f64::from_be_bytes(b))
        }
        8 => Value::Integer(0),
        9 => Value::Integer(1),
        n if n % 2 == 0 => Value::Blob(raw.to_vec()),
        _ => Value::Text(decode_text(raw, encoding)),
    })
}

/// Sign-extending big-endian integer of 1..=8 bytes.
fn be_signed(raw: &[u8]) -> i64 {
    let mut v: i64 = if raw.first().is_some_and(|b| b & 0x80 != 0) { -1 } else { 0 };
    for &b in raw {
        v = (v << 8) | i64::from(b);
    }
    v
}

fn decode_text(raw: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(raw).into_owned(),
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| match encoding {
                    TextEncoding::Utf16Le => u16::from_le_bytes([c[0], c[1]]),
                    _ => u16::from_be_bytes([c[0], c[1]]),
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}
