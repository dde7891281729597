// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The count-then-fill query shape.
//!
//! Most runtime queries that return a variable-length result are made twice: once to
//! learn how many elements there are, then again into a buffer of exactly that size.
//! Platforms, devices, kernels, build logs and kernel names all go through here.

/// Runs a two-call query.
///
/// `count` reports the number of elements. `fill` receives a buffer of that many
/// `placeholder` values and overwrites it. A count of zero skips the second call.
pub(crate) fn enumerate_with<T, E>(
    placeholder: T,
    count: impl FnOnce() -> Result<usize, E>,
    fill: impl FnOnce(&mut [T]) -> Result<(), E>,
) -> Result<Vec<T>, E>
where
    T: Clone,
{
    let n = count()?;
    let mut out = vec![placeholder; n];
    if n > 0 {
        fill(&mut out)?;
    }
    Ok(out)
}

/// Two-call query for the bytes of a C string, trimmed at the first NUL.
///
/// Runtimes report the size including the terminator, and some pad past it.
pub(crate) fn enumerate_c_bytes<E>(
    size: impl FnOnce() -> Result<usize, E>,
    fill: impl FnOnce(&mut [u8]) -> Result<(), E>,
) -> Result<Vec<u8>, E> {
    let mut bytes = enumerate_with(0u8, size, fill)?;
    let end = c_string_len(&bytes);
    bytes.truncate(end);
    Ok(bytes)
}

/// Like [`enumerate_c_bytes`], decoded as text. Bytes that are not UTF-8 are replaced.
pub(crate) fn enumerate_string<E>(
    size: impl FnOnce() -> Result<usize, E>,
    fill: impl FnOnce(&mut [u8]) -> Result<(), E>,
) -> Result<String, E> {
    let bytes = enumerate_c_bytes(size, fill)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn c_string_len(bytes: &[u8]) -> usize {
    bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len())
}

#[cfg(test)]
fn trim_c_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[..c_string_len(bytes)]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_count_skips_fill() {
        let out: Result<Vec<u32>, ()> =
            enumerate_with(0, || Ok(0), |_| panic!("fill called for empty result"));
        assert!(out.unwrap().is_empty());
    }

    #[test]
    fn fill_receives_exact_size() {
        let out: Result<Vec<u32>, ()> = enumerate_with(
            0,
            || Ok(3),
            |buf| {
                assert_eq!(buf.len(), 3);
                buf.copy_from_slice(&[7, 8, 9]);
                Ok(())
            },
        );
        assert_eq!(out.unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn count_error_propagates() {
        let out: Result<Vec<u32>, &str> = enumerate_with(0, || Err("nope"), |_| Ok(()));
        assert_eq!(out, Err("nope"));
    }

    #[test]
    fn strings_trim_at_first_nul() {
        let s: Result<String, ()> = enumerate_string(
            || Ok(16),
            |buf| {
                buf[..6].copy_from_slice(b"kernel");
                Ok(())
            },
        );
        assert_eq!(s.unwrap(), "kernel");
        assert_eq!(trim_c_string(b"abc\0def\0"), "abc");
        assert_eq!(trim_c_string(b"no terminator"), "no terminator");
    }

    #[test]
    fn bytes_survive_when_text_does_not() {
        let driver_log = b"caf\xe9: warning\0\0";
        let fill = |buf: &mut [u8]| {
            buf.copy_from_slice(driver_log);
            Ok(())
        };
        let raw: Result<Vec<u8>, ()> = enumerate_c_bytes(|| Ok(driver_log.len()), fill);
        assert_eq!(raw.unwrap(), b"caf\xe9: warning");
        let text: Result<String, ()> = enumerate_string(|| Ok(driver_log.len()), fill);
        assert_eq!(text.unwrap(), "caf\u{FFFD}: warning");
    }
}
