use crc::{CRC_16_XMODEM, Crc, NoTable};

/// Frame checksum: polynomial `0x1021`, initial value `0x0000`, MSB-first, computed bit by bit.
const FRAME_CRC: Crc<u16, NoTable> = Crc::<u16, NoTable>::new(&CRC_16_XMODEM);

/// Computes the frame CRC over `bytes`, returned low byte first.
///
/// Senders and receivers must apply it to the same range: header plus payload,
/// excluding the trailing CRC and postamble.
///
/// ```
/// use tapin::crc16;
///
/// let crc = crc16(&[0x0F, 0x03, 0x01, 0x00, 0x02, 0x00, 0xF8, 0x01]);
/// assert_eq!([0xC1, 0x23], crc);
/// ```
#[must_use]
pub fn crc16(bytes: &[u8]) -> [u8; 2] {
    FRAME_CRC.checksum(bytes).to_le_bytes()
}
