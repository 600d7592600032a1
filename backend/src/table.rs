//! Bounds-checked decoding of raw kernel tables.
//!
//! A table is an optional fixed header followed by a contiguous run of
//! fixed-size rows. Rows are handed out as borrowed slices of the buffer.

use crate::types::{ProcError, TableKind};

/// Shape of one platform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub kind: TableKind,
    pub header_size: usize,
    pub row_size: usize,
}

/// `DWORD` process identifiers with no header.
pub const PROCESS_ID_LAYOUT: TableLayout = TableLayout {
    kind: TableKind::Processes,
    header_size: 0,
    row_size: 4,
};

/// `MIB_TCPTABLE_OWNER_PID`: entry count, then
/// `{ state, local_addr, local_port, remote_addr, remote_port, owning_pid }` rows.
pub const TCP_OWNER_PID_LAYOUT: TableLayout = TableLayout {
    kind: TableKind::Tcp,
    header_size: 4,
    row_size: 24,
};

/// `MIB_UDPTABLE_OWNER_PID`: entry count, then `{ local_addr, local_port, owning_pid }` rows.
pub const UDP_OWNER_PID_LAYOUT: TableLayout = TableLayout {
    kind: TableKind::Udp,
    header_size: 4,
    row_size: 12,
};

impl TableLayout {
    /// Reads the entry count from the header.
    pub fn entry_count(&self, buffer: &[u8]) -> Result<usize, ProcError> {
        if self.header_size < 4 || buffer.len() < 4 {
            return Err(self.malformed(0, buffer.len()));
        }
        Ok(read_u32(buffer, 0) as usize)
    }

    /// Number of whole rows in a headerless buffer of `used` bytes.
    pub fn rows_in(&self, used: usize) -> usize {
        used.saturating_sub(self.header_size)
            .checked_div(self.row_size)
            .unwrap_or(0)
    }

    fn malformed(&self, entries: usize, len: usize) -> ProcError {
        ProcError::MalformedTable {
            table: self.kind,
            entries,
            header_size: self.header_size,
            row_size: self.row_size,
            len,
        }
    }
}

/// Lazy iterator over the rows of a decoded table.
///
/// Cloning restarts iteration from the current position; [`decode`] can be
/// called again for a fresh pass.
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    region: &'a [u8],
    row_size: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.region.is_empty() {
            return None;
        }
        let (row, rest) = self.region.split_at(self.row_size);
        self.region = rest;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.region.len() / self.row_size;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Rows<'_> {}

/// Splits `buffer` into exactly `entries` rows laid out per `layout`.
///
/// Fails with [`ProcError::MalformedTable`] when the rows would run past the
/// end of the buffer or the layout has zero-sized rows. Trailing bytes
/// beyond the last row are ignored.
pub fn decode<'a>(
    buffer: &'a [u8],
    layout: &TableLayout,
    entries: usize,
) -> Result<Rows<'a>, ProcError> {
    if layout.row_size == 0 {
        return Err(layout.malformed(entries, buffer.len()));
    }
    let end = entries
        .checked_mul(layout.row_size)
        .and_then(|rows| rows.checked_add(layout.header_size))
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| layout.malformed(entries, buffer.len()))?;
    Ok(Rows {
        region: &buffer[layout.header_size..end],
        row_size: layout.row_size,
    })
}

/// Decodes a table whose header carries its own entry count.
pub fn decode_counted<'a>(buffer: &'a [u8], layout: &TableLayout) -> Result<Rows<'a>, ProcError> {
    let entries = layout.entry_count(buffer)?;
    decode(buffer, layout, entries)
}

/// Reads the little-endian `u32` at `offset`. Callers guarantee the bounds.
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// Lays out `rows` as a counted table of little-endian words.
#[cfg_attr(not(any(test, target_os = "linux")), allow(dead_code))]
pub(crate) fn encode_counted<const N: usize>(rows: &[[u32; N]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + rows.len() * N * 4);
    buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    for word in rows.iter().flatten() {
        buf.extend_from_slice(&word.to_le_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted(rows: &[&[u32]]) -> Vec<u8> {
        let mut buf = (rows.len() as u32).to_le_bytes().to_vec();
        for row in rows {
            for word in *row {
                buf.extend_from_slice(&word.to_le_bytes());
            }
        }
        buf
    }

    #[test]
    fn rows_are_contiguous_and_cover_the_row_region() {
        let buf = counted(&[&[1, 2, 3], &[4, 5, 6], &[7, 8, 9]]);
        let rows: Vec<&[u8]> = decode_counted(&buf, &UDP_OWNER_PID_LAYOUT).unwrap().collect();

        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), 12);
            let start = 4 + i * 12;
            assert_eq!(*row, &buf[start..start + 12]);
            assert_eq!(read_u32(row, 0), (i * 3 + 1) as u32);
        }
    }

    #[test]
    fn decode_is_restartable() {
        let buf = counted(&[&[10, 0, 0], &[20, 0, 0]]);
        let rows = decode_counted(&buf, &UDP_OWNER_PID_LAYOUT).unwrap();
        assert_eq!(rows.len(), 2);
        let first: Vec<u32> = rows.clone().map(|r| read_u32(r, 0)).collect();
        let second: Vec<u32> = rows.map(|r| read_u32(r, 0)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn overstated_entry_count_is_malformed() {
        let mut buf = counted(&[&[1, 2, 3]]);
        buf[0] = 2;
        match decode_counted(&buf, &UDP_OWNER_PID_LAYOUT) {
            Err(ProcError::MalformedTable {
                table, entries, len, ..
            }) => {
                assert_eq!(table, TableKind::Udp);
                assert_eq!(entries, 2);
                assert_eq!(len, 16);
            }
            other => panic!("expected MalformedTable, got {other:?}"),
        }
    }

    #[test]
    fn huge_entry_count_does_not_overflow() {
        let buf = u32::MAX.to_le_bytes().to_vec();
        assert!(matches!(
            decode(&buf, &TCP_OWNER_PID_LAYOUT, usize::MAX),
            Err(ProcError::MalformedTable { .. })
        ));
    }

    #[test]
    fn zero_sized_rows_are_malformed() {
        let layout = TableLayout {
            kind: TableKind::Tcp,
            header_size: 4,
            row_size: 0,
        };
        let buf = 5u32.to_le_bytes();
        assert!(matches!(
            decode(&buf, &layout, 5),
            Err(ProcError::MalformedTable {
                entries: 5,
                row_size: 0,
                ..
            })
        ));
        assert!(matches!(
            decode_counted(&buf, &layout),
            Err(ProcError::MalformedTable { .. })
        ));
        assert_eq!(layout.rows_in(64), 0);
    }

    #[test]
    fn missing_header_is_malformed() {
        assert!(matches!(
            decode_counted(&[0, 0], &TCP_OWNER_PID_LAYOUT),
            Err(ProcError::MalformedTable { .. })
        ));
    }

    #[test]
    fn encoder_matches_platform_layout() {
        let rows = [[1u32, 2, 3], [4, 5, 6]];
        assert_eq!(encode_counted(&rows), counted(&[&[1, 2, 3], &[4, 5, 6]]));
    }

    #[test]
    fn empty_table_yields_no_rows() {
        let buf = counted(&[]);
        assert_eq!(decode_counted(&buf, &TCP_OWNER_PID_LAYOUT).unwrap().count(), 0);
    }

    #[test]
    fn headerless_id_table() {
        let buf: Vec<u8> = [0u32, 4, 812].iter().flat_map(|p| p.to_le_bytes()).collect();
        let n = PROCESS_ID_LAYOUT.rows_in(buf.len());
        let ids: Vec<u32> = decode(&buf, &PROCESS_ID_LAYOUT, n)
            .unwrap()
            .map(|r| read_u32(r, 0))
            .collect();
        assert_eq!(ids, vec![0, 4, 812]);
    }
}
