//! Internet checksums (RFC 1071) for `ICMPv4` messages.
//!
//! The checksum field itself is skipped while summing, so a packet may be checksummed in place
//! without first zeroing the field.

/// Calculate the checksum for an `ICMPv4` message (header and payload).
///
/// The `ICMP` checksum lives in the second 16-bit word.
#[must_use]
pub fn icmp_ipv4_checksum(message: &[u8]) -> u16 {
    checksum(message, 1)
}

fn checksum(data: &[u8], skip_word: usize) -> u16 {
    if data.is_empty() {
        0
    } else {
        fold(sum_be_words(data, skip_word))
    }
}

/// Sum the big-endian 16-bit words of `data`, skipping the word at index `skip_word`.
///
/// A trailing odd byte is padded with a zero low byte.
fn sum_be_words(data: &[u8], skip_word: usize) -> u32 {
    let mut words = data.chunks_exact(2);
    let mut sum = words
        .by_ref()
        .enumerate()
        .filter(|(i, _)| *i != skip_word)
        .map(|(_, word)| u32::from(u16::from_be_bytes([word[0], word[1]])))
        .sum::<u32>();
    if let [last] = words.remainder() {
        if data.len() / 2 != skip_word {
            sum += u32::from(*last) << 8;
        }
    }
    sum
}

/// Fold the carries back into the low 16 bits and take the one's complement.
const fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xffff);
    }
    !sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_empty() {
        assert_eq!(0, icmp_ipv4_checksum(&[]));
    }

    #[test]
    fn test_odd_length() {
        assert_eq!(0x25ff, icmp_ipv4_checksum(&[0xDA]));
    }

    #[test]
    fn test_icmp_time_exceeded_checksum() {
        let mut message = [0_u8; 92];
        message[..36].copy_from_slice(&hex!(
            "0b 00 88 eb 00 00 00 00 45 00 00 54 b0 de 00 00 01 11 75 21
             c0 a8 01 c9 8e fa 42 2e 62 57 81 95 00 40 87 e7"
        ));
        assert_eq!(35051, icmp_ipv4_checksum(&message));
    }

    #[test]
    fn test_icmp_echo_request_checksum() {
        let message = hex!("08 00 00 00 04 d2 00 0a");
        assert_eq!(0xf323, icmp_ipv4_checksum(&message));
    }

    #[test]
    fn test_existing_checksum_is_ignored() {
        let zeroed = hex!("08 00 00 00 04 d2 00 0a da da");
        let stale = hex!("08 00 ab cd 04 d2 00 0a da da");
        assert_eq!(icmp_ipv4_checksum(&zeroed), icmp_ipv4_checksum(&stale));
    }
}
