use rand::Rng;

/// Uppercase-only alphabet keeps codes easy to read out loud and type.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const CODE_LEN: usize = 4;

/// Draws one candidate room code. Uniqueness against open rooms is the
/// registry's job, checked under its table lock.
pub fn sample_code<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_requested_length_and_alphabet() {
        let mut rng = rand::thread_rng();
        for len in [1, 4, 8] {
            let code = sample_code(&mut rng, len);
            assert_eq!(code.len(), len);
            assert!(code.bytes().all(|b| b.is_ascii_uppercase()));
        }
    }

    #[test]
    fn zero_length_yields_empty_code() {
        let mut rng = rand::thread_rng();
        assert_eq!(sample_code(&mut rng, 0), "");
    }
}
