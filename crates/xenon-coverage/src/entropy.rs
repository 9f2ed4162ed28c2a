//! Shannon entropy over byte windows.

/// Empirical Shannon entropy of `data` in bits per byte:
/// `H = -sum(p_i * log2(p_i))` over the byte value frequencies.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &byte in data {
        counts[usize::from(byte)] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_data_has_zero_entropy() {
        assert_eq!(shannon_entropy(&[0xCD; 4096]), 0.0);
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn uniform_data_has_eight_bits_per_byte() {
        let data: Vec<u8> = (0u32..65_536).map(|value| (value % 256) as u8).collect();
        let entropy = shannon_entropy(&data);
        assert!((entropy - 8.0).abs() < 1e-9);
    }

    #[test]
    fn ascii_text_lands_in_the_structured_band() {
        let text = b"set timer to timer + GetSecondsPassed\nif timer > 5\n  Enable\nendif\n".repeat(64);
        let entropy = shannon_entropy(&text);
        assert!(entropy > 3.0 && entropy < 5.0, "entropy was {entropy}");
    }
}
