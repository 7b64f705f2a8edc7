//! Key tags (RFC 4034 Appendix B): the 16-bit hint an RRSIG or DS uses to
//! name the DNSKEY it refers to.

/// Offset of the public key within DNSKEY rdata
const KEY_OFFSET: usize = 4;

/// Key tag over complete DNSKEY rdata.
///
/// RSA/MD5 keys use bits 8..24 of the modulus tail instead of the
/// checksum; such a key too short to have a modulus gets tag 0.
pub fn key_tag_from_rdata(algorithm: u8, rdata: &[u8]) -> u16 {
    if algorithm == 1 {
        return match rdata.len() {
            len if len >= KEY_OFFSET + 3 => u16::from_be_bytes([rdata[len - 3], rdata[len - 2]]),
            _ => 0,
        };
    }

    let sum = rdata.chunks(2).fold(0u32, |sum, pair| {
        let high = u32::from(pair[0]) << 8;
        let low = pair.get(1).copied().map_or(0, u32::from);
        sum + high + low
    });
    (sum.wrapping_add(sum >> 16) & 0xFFFF) as u16
}

/// Key tag from the individual DNSKEY fields
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    let header = flags.to_be_bytes();
    let rdata: Vec<u8> = header
        .into_iter()
        .chain([protocol, algorithm])
        .chain(public_key.iter().copied())
        .collect();
    key_tag_from_rdata(algorithm, &rdata)
}
