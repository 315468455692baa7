//! Database user passwords

use rand::Rng;
use rand::distr::Alphanumeric;
use rand::seq::SliceRandom;
use zeroize::Zeroizing;

use crate::core::SecureString;

/// Random alphanumeric password with at least one digit, one lowercase
/// and one uppercase letter, drawn from the thread-local CSPRNG.
///
/// `length` below 3 is raised to 3; the backend config enforces its own minimum.
pub fn generate_password(length: usize) -> SecureString {
    let length = length.max(3);
    let mut rng = rand::rng();

    let mut buf = Zeroizing::new(Vec::with_capacity(length));
    buf.push(rng.random_range(b'0'..=b'9'));
    buf.push(rng.random_range(b'a'..=b'z'));
    buf.push(rng.random_range(b'A'..=b'Z'));
    buf.extend((&mut rng).sample_iter(Alphanumeric).take(length - 3));
    buf.shuffle(&mut rng);

    SecureString::new(buf.iter().map(|&b| char::from(b)).collect::<String>())
}
