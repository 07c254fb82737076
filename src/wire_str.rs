//! 2-byte length-prefixed modified-UTF-8 strings, used throughout the wire
//! format: meta-info lines, sample ids, chromosome ids, and marker fields.

use nom::bytes::streaming::take;
use nom::number::streaming::be_u16;
use nom::IResult;

use crate::error::{Bref4Error, Result};

pub fn write_wire_string(s: &str, out: &mut Vec<u8>) -> Result<()> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len())
        .map_err(|_| Bref4Error::BadArguments(format!("string too long for wire format: {s}")))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

pub fn read_wire_string(input: &[u8]) -> IResult<&[u8], String> {
    let (input, len) = be_u16(input)?;
    let (input, bytes) = take(len)(input)?;
    let s = String::from_utf8(bytes.to_vec()).map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Char))
    })?;
    Ok((input, s))
}

pub fn write_wire_string_array(strings: &[String], out: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(strings.len())
        .map_err(|_| Bref4Error::BadArguments("string array too long".into()))?;
    out.extend_from_slice(&len.to_be_bytes());
    for s in strings {
        write_wire_string(s, out)?;
    }
    Ok(())
}

pub fn read_wire_string_array(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    let (mut input, len) = nom::number::streaming::be_u32(input)?;
    let mut strings = Vec::with_capacity(len as usize);
    for _ in 0..len {
        let (rest, s) = read_wire_string(input)?;
        input = rest;
        strings.push(s);
    }
    Ok((input, strings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_string() {
        let mut buf = Vec::new();
        write_wire_string("chr1", &mut buf).unwrap();
        let (rest, s) = read_wire_string(&buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(s, "chr1");
    }

    #[test]
    fn roundtrips_string_array() {
        let strings = vec!["S1".to_owned(), "S2".to_owned(), "S3".to_owned()];
        let mut buf = Vec::new();
        write_wire_string_array(&strings, &mut buf).unwrap();
        let (rest, got) = read_wire_string_array(&buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(got, strings);
    }
}
